//! # Lemmings Core
//!
//! Deterministic simulation core for a Lemmings-style puzzle platformer.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No wall-clock time
//! - No system randomness
//!
//! This separation enables:
//! - Bit-identical replays
//! - Headless CI runs
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`terrain`] - The mutable terrain bitmap
//! - [`stencil`] - Per-pixel solidity/material classification
//! - [`level`] - Immutable level descriptions
//! - [`lemming`] - The agent state machine
//! - [`skills`] - Skill assignment and cursor selection
//! - [`session`] - The per-level tick pipeline
//! - [`replay`] - Action recording and deterministic playback

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod lemming;
pub mod level;
pub mod replay;
pub mod session;
pub mod skills;
pub mod stencil;
pub mod terrain;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{EngineError, Result};
    pub use crate::lemming::{Action, Direction, Lemming, LemmingId};
    pub use crate::level::{LevelDescriptor, LevelIdentity, LevelObject, ObjectKind};
    pub use crate::replay::{PlayerAction, Recorder, Replay, ReplayPlayer};
    pub use crate::session::{GameSession, SessionCounters, SessionOutcome};
    pub use crate::skills::{CursorSelection, SelectionFilter, Skill, SkillSupply};
    pub use crate::stencil::{MaskOp, Stencil};
    pub use crate::terrain::TerrainBitmap;
}
