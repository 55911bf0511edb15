//! Error types for the simulation core.
//!
//! Recoverable gameplay anomalies (a refused skill assignment, an erase
//! swallowed by steel) are not errors; they resolve silently in place.
//! The variants here cover replay integrity, level validation, and fatal
//! internal invariant violations.

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Level description failed validation.
    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    /// Replay file format version is not supported.
    #[error("Replay version mismatch: expected {expected}, got {found}")]
    ReplayVersionMismatch {
        /// Version this build writes and reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Replay was recorded against a different level.
    #[error("Replay level mismatch: recorded for '{expected}', loaded level is '{found}'")]
    ReplayLevelMismatch {
        /// Level identity stored in the replay.
        expected: String,
        /// Identity of the level being loaded.
        found: String,
    },

    /// Replay event stream is malformed (out-of-order ticks, truncation).
    #[error("Corrupt replay: {0}")]
    ReplayCorrupt(String),

    /// Replayed simulation reached a different state than recorded.
    #[error("Replay diverged at tick {tick}: expected hash {expected_hash}, got {actual_hash}")]
    ReplayDiverged {
        /// Tick at which the divergence was detected.
        tick: u64,
        /// State hash recorded in the replay.
        expected_hash: u64,
        /// State hash produced by this run.
        actual_hash: u64,
    },

    /// Stencil and terrain bitmap disagree about a pixel. Fatal: the
    /// session must be aborted rather than continue inconsistent.
    #[error("Stencil/terrain desync at ({x}, {y})")]
    StencilDesync {
        /// X coordinate of the offending pixel.
        x: i32,
        /// Y coordinate of the offending pixel.
        y: i32,
    },

    /// Invalid internal state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
