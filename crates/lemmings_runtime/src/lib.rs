//! # Lemmings Runtime
//!
//! The layer between the deterministic core and a presentation front
//! end: fixed-tick frame scheduling with speed multipliers, buffered
//! input resolution, and render snapshots.
//!
//! The core never sees wall-clock time; this crate owns the frame timer
//! and feeds the session whole ticks. Input arrives asynchronously from
//! the UI thread into an [`input::InputQueue`] and is drained only at
//! sub-step boundaries, so a click can never land mid-tick.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod input;
pub mod scheduler;
pub mod snapshot;

pub use input::{InputQueue, LogicalAction};
pub use scheduler::{GameLoop, SchedulerState, SpeedFlags, FRAME_NANOS};
pub use snapshot::{LemmingSprite, RenderSnapshot};
