//! Action recording and deterministic playback.
//!
//! A replay is the level identity plus the timestamped stream of
//! simulation-affecting player actions. Because the session itself is
//! deterministic, that stream is sufficient to reproduce a whole game;
//! the recorded final state hash lets playback prove it did.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::lemming::LemmingId;
use crate::level::{LevelDescriptor, LevelIdentity};
use crate::session::{GameSession, SessionOutcome, TickEvents};
use crate::skills::Skill;

/// Current replay format version.
pub const REPLAY_VERSION: u32 = 1;

/// A player decision, resolved to simulation terms.
///
/// Skill clicks are recorded with the resolved target id, not the
/// cursor position, so playback does not depend on re-running cursor
/// hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Assign a skill to a specific agent.
    Assign {
        /// Target agent.
        lemming: LemmingId,
        /// Skill to assign.
        skill: Skill,
    },
    /// Trigger the nuke.
    Nuke,
    /// Adjust the release rate by a signed delta.
    ReleaseRate {
        /// Signed rate change.
        delta: i32,
    },
    /// Toggle pause. Cosmetic: playback timing only.
    Pause,
    /// Pan the camera. Cosmetic.
    Pan {
        /// Horizontal pan in pixels.
        dx: i32,
        /// Vertical pan in pixels.
        dy: i32,
    },
}

impl PlayerAction {
    /// Whether this action can change simulation state.
    #[must_use]
    pub const fn affects_simulation(&self) -> bool {
        !matches!(self, Self::Pause | Self::Pan { .. })
    }
}

/// One recorded action with the tick it was applied before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAction {
    /// Tick the action was applied at (before the tick ran).
    pub tick: u64,
    /// The action.
    pub action: PlayerAction,
}

/// A complete recorded game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Format version, checked on load.
    pub version: u32,
    /// Which level this replay belongs to.
    pub identity: LevelIdentity,
    /// Layout hash of that level at record time.
    pub layout_hash: u64,
    /// Terrain-variation seed the level was built with.
    pub seed: u64,
    /// Simulation-affecting actions in tick order.
    pub actions: Vec<ReplayAction>,
    /// Tick the recorded session ended at.
    pub final_tick: u64,
    /// State hash of the recorded session at `final_tick`.
    pub final_hash: u64,
}

impl Replay {
    /// Serialize to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| EngineError::ReplayCorrupt(format!("serialize failed: {e}")))
    }

    /// Deserialize from bytes, checking the format version.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ReplayCorrupt`] on malformed data and
    /// [`EngineError::ReplayVersionMismatch`] on a version we cannot read.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(data)
            .map_err(|e| EngineError::ReplayCorrupt(format!("deserialize failed: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(EngineError::ReplayVersionMismatch {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }
        Ok(replay)
    }

    /// Check that this replay can be played against a level.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ReplayLevelMismatch`] when identity or
    /// layout differ, and [`EngineError::ReplayCorrupt`] when the action
    /// stream is not in tick order.
    pub fn validate(&self, level: &LevelDescriptor) -> Result<()> {
        if self.identity != level.identity || self.layout_hash != level.layout_hash() {
            return Err(EngineError::ReplayLevelMismatch {
                expected: self.identity.to_string(),
                found: level.identity.to_string(),
            });
        }
        let ordered = self.actions.windows(2).all(|w| w[0].tick <= w[1].tick);
        if !ordered {
            return Err(EngineError::ReplayCorrupt(
                "actions out of tick order".into(),
            ));
        }
        if self.actions.last().is_some_and(|a| a.tick > self.final_tick) {
            return Err(EngineError::ReplayCorrupt(
                "action recorded past the final tick".into(),
            ));
        }
        Ok(())
    }
}

/// Records simulation-affecting actions during a live session.
#[derive(Debug, Clone)]
pub struct Recorder {
    replay: Replay,
}

impl Recorder {
    /// Start recording for a level.
    #[must_use]
    pub fn new(level: &LevelDescriptor) -> Self {
        Self {
            replay: Replay {
                version: REPLAY_VERSION,
                identity: level.identity.clone(),
                layout_hash: level.layout_hash(),
                seed: level.seed,
                actions: Vec::new(),
                final_tick: 0,
                final_hash: 0,
            },
        }
    }

    /// Record an action applied before `tick` ran.
    ///
    /// Cosmetic actions are recorded too so playback can mirror pauses
    /// and camera moves; they never affect the simulation. Ticks must be
    /// non-decreasing; a stale tick is dropped with a warning rather
    /// than corrupting the stream.
    pub fn record(&mut self, tick: u64, action: PlayerAction) {
        if let Some(last) = self.replay.actions.last() {
            if tick < last.tick {
                tracing::warn!(tick, last = last.tick, "out-of-order action dropped");
                return;
            }
        }
        self.replay.actions.push(ReplayAction { tick, action });
    }

    /// Seal the recording with the session's final state.
    #[must_use]
    pub fn finalize(mut self, session: &GameSession) -> Replay {
        self.replay.final_tick = session.tick_count();
        self.replay.final_hash = session.state_hash();
        tracing::info!(
            actions = self.replay.actions.len(),
            final_tick = self.replay.final_tick,
            "replay finalized"
        );
        self.replay
    }
}

/// Plays a replay against a fresh session, verifying determinism.
#[derive(Debug)]
pub struct ReplayPlayer {
    session: GameSession,
    replay: Replay,
    cursor: usize,
}

impl ReplayPlayer {
    /// Build a player from a level and a matching replay.
    ///
    /// # Errors
    ///
    /// Fails when the replay does not match the level or the level is
    /// invalid.
    pub fn new(level: LevelDescriptor, replay: Replay) -> Result<Self> {
        replay.validate(&level)?;
        let session = GameSession::new(level)?;
        Ok(Self {
            session,
            replay,
            cursor: 0,
        })
    }

    /// The session being driven.
    #[must_use]
    pub const fn session(&self) -> &GameSession {
        &self.session
    }

    /// Whether the playback reached the recorded final tick.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.session.tick_count() >= self.replay.final_tick
    }

    /// Apply all actions due this tick, then run the tick.
    pub fn advance(&mut self) -> TickEvents {
        let tick = self.session.tick_count();
        while let Some(entry) = self.replay.actions.get(self.cursor) {
            if entry.tick > tick {
                break;
            }
            self.session.apply_action(&entry.action);
            self.cursor += 1;
        }
        self.session.tick()
    }

    /// Play to the recorded final tick and check the state hash.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ReplayDiverged`] when the resimulated
    /// state does not match the recording.
    pub fn verify(&mut self) -> Result<SessionOutcome> {
        while !self.finished() {
            self.advance();
            if matches!(self.session.outcome(), SessionOutcome::Ended { .. }) && !self.finished() {
                // Ended early relative to the recording.
                break;
            }
        }
        let actual_hash = self.session.state_hash();
        let tick = self.session.tick_count();
        if tick != self.replay.final_tick || actual_hash != self.replay.final_hash {
            return Err(EngineError::ReplayDiverged {
                tick,
                expected_hash: self.replay.final_hash,
                actual_hash,
            });
        }
        Ok(self.session.outcome())
    }
}
