//! The per-level game session.
//!
//! [`GameSession`] owns all mutable simulation state: terrain, stencil,
//! agents, supply, and counters. Nothing outside the session mutates
//! that state; the runtime applies buffered player actions through
//! [`GameSession::apply_action`] at sub-step boundaries and reads
//! snapshots after ticks.
//!
//! # Determinism
//!
//! Agents are stepped in id (spawn) order every tick, all physics is
//! exact-integer, and there is no system randomness. Two sessions built
//! from the same level and fed the same actions at the same ticks are
//! bit-identical; [`GameSession::state_hash`] is the witness for that
//! claim.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::lemming::{
    Action, Lemming, LemmingId, StepContext, Terminal, BOMBER_COUNTDOWN, MAX_BRICKS,
};
use crate::level::LevelDescriptor;
use crate::replay::PlayerAction;
use crate::skills::{CursorSelection, Skill, SkillSupply};
use crate::stencil::Stencil;
use crate::terrain::TerrainBitmap;

/// Base subtracted by the release rate to get the spawn interval.
pub const RELEASE_BASE: u32 = 103;
/// Floor for the spawn interval in ticks.
pub const RELEASE_MIN_INTERVAL: u32 = 4;
/// Ticks between successive nuke arms.
pub const NUKE_STAGGER_TICKS: u64 = 4;

/// Spawn interval in ticks for a release rate.
#[must_use]
pub const fn spawn_interval(rate: u32) -> u64 {
    let interval = RELEASE_BASE.saturating_sub(rate);
    if interval < RELEASE_MIN_INTERVAL {
        RELEASE_MIN_INTERVAL as u64
    } else {
        interval as u64
    }
}

/// Session counter snapshot for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Agents released from the hatch so far.
    pub released: u32,
    /// Agents currently in the active simulation.
    pub active: u32,
    /// Agents that reached the exit.
    pub exited: u32,
    /// Agents that died.
    pub dead: u32,
    /// Minimum exits required to win.
    pub required: u32,
}

/// Whether the session is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOutcome {
    /// The level is still in progress.
    Running,
    /// The level ended.
    Ended {
        /// Whether the rescue quota was met.
        success: bool,
    },
}

/// Events generated during one logic tick, for the game layer to
/// trigger sounds and effects.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Agents released this tick.
    pub spawned: Vec<LemmingId>,
    /// Agents that exited this tick.
    pub exited: Vec<LemmingId>,
    /// Agents that died this tick.
    pub deaths: Vec<LemmingId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct NukeState {
    armed: u32,
    next_arm_tick: u64,
}

/// The running state of one level attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    level: LevelDescriptor,
    terrain: TerrainBitmap,
    stencil: Stencil,
    lemmings: Vec<Lemming>,
    supply: SkillSupply,
    tick: u64,
    release_rate: u32,
    next_spawn_tick: u64,
    released: u32,
    exited: u32,
    dead: u32,
    nuke: Option<NukeState>,
    outcome: SessionOutcome,
    /// Agents that already consumed a skill assignment this tick.
    assigned_this_tick: Vec<LemmingId>,
}

impl GameSession {
    /// Start a fresh session for a level.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLevel`] when the description fails
    /// validation.
    pub fn new(level: LevelDescriptor) -> Result<Self> {
        level.validate()?;
        let (terrain, stencil) = level.build();
        tracing::info!(level = %level.identity, "session started");
        Ok(Self {
            release_rate: level.release_rate_initial,
            terrain,
            stencil,
            lemmings: Vec::with_capacity(level.lemming_count as usize),
            supply: level.skills,
            tick: 0,
            next_spawn_tick: 0,
            released: 0,
            exited: 0,
            dead: 0,
            nuke: None,
            outcome: SessionOutcome::Running,
            assigned_this_tick: Vec::new(),
            level,
        })
    }

    /// Current tick number.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// The level this session is running.
    #[must_use]
    pub const fn level(&self) -> &LevelDescriptor {
        &self.level
    }

    /// All agents, including terminal records.
    #[must_use]
    pub fn lemmings(&self) -> &[Lemming] {
        &self.lemmings
    }

    /// Look up an agent by id.
    #[must_use]
    pub fn lemming(&self, id: LemmingId) -> Option<&Lemming> {
        self.lemmings.get(id as usize)
    }

    /// The terrain bitmap (read-only; the renderer copies from here).
    #[must_use]
    pub const fn terrain(&self) -> &TerrainBitmap {
        &self.terrain
    }

    /// The stencil (read-only outside the tick pipeline).
    #[must_use]
    pub const fn stencil(&self) -> &Stencil {
        &self.stencil
    }

    /// Remaining skill supply.
    #[must_use]
    pub const fn supply(&self) -> &SkillSupply {
        &self.supply
    }

    /// Current release rate.
    #[must_use]
    pub const fn release_rate(&self) -> u32 {
        self.release_rate
    }

    /// Whether the nuke has been triggered.
    #[must_use]
    pub const fn nuked(&self) -> bool {
        self.nuke.is_some()
    }

    /// Session outcome so far.
    #[must_use]
    pub const fn outcome(&self) -> SessionOutcome {
        self.outcome
    }

    /// Ticks left on the level clock.
    #[must_use]
    pub const fn time_remaining(&self) -> u64 {
        self.level.time_limit_ticks.saturating_sub(self.tick)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn counters(&self) -> SessionCounters {
        let active = self.lemmings.iter().filter(|l| l.is_active()).count() as u32;
        SessionCounters {
            released: self.released,
            active,
            exited: self.exited,
            dead: self.dead,
            required: self.level.required_rescue,
        }
    }

    /// Advance the simulation by one logic tick.
    ///
    /// Pipeline order is fixed for determinism: spawn, nuke stagger,
    /// agent steps in id order, counter/end-condition bookkeeping.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();
        if matches!(self.outcome, SessionOutcome::Ended { .. }) {
            return events;
        }

        self.assigned_this_tick.clear();

        // 1. Release due agents. A triggered nuke seals the hatch.
        if self.nuke.is_none()
            && self.released < self.level.lemming_count
            && self.tick >= self.next_spawn_tick
        {
            let id = self.released;
            self.lemmings.push(Lemming::new(
                id,
                self.level.spawn_x,
                self.level.spawn_y,
                self.level.spawn_dir,
            ));
            self.released += 1;
            self.next_spawn_tick = self.tick + spawn_interval(self.release_rate);
            events.spawned.push(id);
        }

        // 2. Nuke stagger: arm one more agent per interval, in id order.
        if let Some(mut nuke) = self.nuke {
            if self.tick >= nuke.next_arm_tick {
                if let Some(lemming) = self.lemmings.iter_mut().find(|l| {
                    l.is_active() && l.countdown.is_none() && l.action != Action::Exiting
                }) {
                    lemming.countdown = Some(BOMBER_COUNTDOWN);
                    nuke.armed += 1;
                    nuke.next_arm_tick = self.tick + NUKE_STAGGER_TICKS;
                }
            }
            self.nuke = Some(nuke);
        }

        // 3. Step every agent against the stencil.
        let blockers: Vec<(i32, i32)> = self
            .lemmings
            .iter()
            .filter(|l| l.is_active() && l.action == Action::Blocking)
            .map(|l| (l.x, l.y))
            .collect();

        let mut ctx = StepContext {
            stencil: &mut self.stencil,
            terrain: &mut self.terrain,
            objects: &self.level.objects,
            blockers: &blockers,
        };
        let mut exited_now = 0u32;
        let mut dead_now = 0u32;
        for lemming in &mut self.lemmings {
            match lemming.step(&mut ctx) {
                Some(Terminal::Exited) => {
                    exited_now += 1;
                    events.exited.push(lemming.id);
                }
                Some(Terminal::Dead) => {
                    dead_now += 1;
                    events.deaths.push(lemming.id);
                }
                None => {}
            }
        }
        self.exited += exited_now;
        self.dead += dead_now;

        // 4. Clock and end conditions.
        self.tick += 1;

        let all_released = self.nuke.is_some() || self.released >= self.level.lemming_count;
        let none_active = self.lemmings.iter().all(|l| !l.is_active());
        let time_up = self.tick >= self.level.time_limit_ticks;
        if (all_released && none_active && (self.released > 0 || self.nuke.is_some())) || time_up {
            let success = self.exited >= self.level.required_rescue;
            self.outcome = SessionOutcome::Ended { success };
            tracing::info!(
                tick = self.tick,
                exited = self.exited,
                dead = self.dead,
                success,
                "session ended"
            );
        }

        #[cfg(debug_assertions)]
        {
            tracing::debug!(tick = self.tick, state_hash = self.state_hash(), "tick");
        }
        #[cfg(feature = "debug-validation")]
        if let Err(err) = self.stencil.check_terrain_sync(&self.terrain) {
            panic!("fatal stencil desync: {err}");
        }

        events
    }

    /// Assign a skill to an agent.
    ///
    /// Returns false without side effects when the agent is unknown or
    /// terminal, already consumed an assignment this tick, the skill's
    /// whitelist rejects its current state, the skill is already on the
    /// agent, or the supply is exhausted.
    pub fn assign_skill(&mut self, id: LemmingId, skill: Skill) -> bool {
        if self.assigned_this_tick.contains(&id) {
            return false;
        }
        let Some(lemming) = self.lemmings.get_mut(id as usize) else {
            return false;
        };
        if !lemming.is_active() || !skill.allowed_from(lemming.action) {
            return false;
        }
        let redundant = match skill {
            Skill::Climber => lemming.is_climber,
            Skill::Floater => lemming.is_floater,
            Skill::Bomber => lemming.countdown.is_some(),
            _ => false,
        };
        if redundant || !self.supply.consume(skill) {
            return false;
        }

        match skill {
            Skill::Climber => lemming.is_climber = true,
            Skill::Floater => lemming.is_floater = true,
            Skill::Bomber => lemming.countdown = Some(BOMBER_COUNTDOWN),
            Skill::Blocker => lemming.set_action(Action::Blocking),
            Skill::Builder => {
                lemming.bricks_left = MAX_BRICKS;
                lemming.set_action(Action::Building);
            }
            Skill::Basher => lemming.set_action(Action::Bashing),
            Skill::Miner => lemming.set_action(Action::Mining),
            Skill::Digger => lemming.set_action(Action::Digging),
        }
        self.assigned_this_tick.push(id);
        tracing::debug!(id, ?skill, tick = self.tick, "skill assigned");
        true
    }

    /// Resolve a cursor position to a target and assign a skill to it.
    ///
    /// Returns the target id on success so the caller can record the
    /// assignment for replay; `None` when no candidate was hit or the
    /// assignment was refused.
    pub fn resolve_and_assign(&mut self, cursor: CursorSelection, skill: Skill) -> Option<LemmingId> {
        let id = cursor.resolve_target(&self.lemmings)?;
        self.assign_skill(id, skill).then_some(id)
    }

    /// Update the cursor highlight to whatever the cursor resolves to.
    ///
    /// Purely cosmetic: the highlight is excluded from `state_hash` and
    /// never influences the simulation.
    pub fn update_highlight(&mut self, cursor: Option<CursorSelection>) {
        let target = cursor.and_then(|c| c.resolve_target(&self.lemmings));
        for lemming in &mut self.lemmings {
            lemming.highlighted = target == Some(lemming.id);
        }
    }

    /// Trigger the nuke: every still-active agent is scheduled for a
    /// staggered self-destruct and the hatch is sealed.
    ///
    /// Returns false when already triggered.
    pub fn nuke(&mut self) -> bool {
        if self.nuke.is_some() {
            return false;
        }
        tracing::info!(tick = self.tick, "nuke triggered");
        self.nuke = Some(NukeState {
            armed: 0,
            next_arm_tick: self.tick,
        });
        true
    }

    /// Adjust the release rate, clamped to the level's bounds.
    ///
    /// Returns whether the rate actually changed.
    pub fn adjust_release_rate(&mut self, delta: i32) -> bool {
        let raw = i64::from(self.release_rate) + i64::from(delta);
        let clamped = raw.clamp(
            i64::from(self.level.release_rate_min),
            i64::from(self.level.release_rate_max),
        ) as u32;
        let changed = clamped != self.release_rate;
        self.release_rate = clamped;
        changed
    }

    /// Apply a buffered player action at a sub-step boundary.
    ///
    /// Returns whether the action affected simulation state and must
    /// therefore be replay-recorded.
    pub fn apply_action(&mut self, action: &PlayerAction) -> bool {
        match *action {
            PlayerAction::Assign { lemming, skill } => self.assign_skill(lemming, skill),
            PlayerAction::Nuke => self.nuke(),
            PlayerAction::ReleaseRate { delta } => self.adjust_release_rate(delta),
            // Cosmetic: recorded for playback fidelity, but the
            // simulation does not depend on them.
            PlayerAction::Pause | PlayerAction::Pan { .. } => false,
        }
    }

    /// Hash of the complete simulation state.
    ///
    /// Used by the replay layer for divergence detection. Two sessions
    /// with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.release_rate.hash(&mut hasher);
        self.released.hash(&mut hasher);
        self.exited.hash(&mut hasher);
        self.dead.hash(&mut hasher);
        self.lemmings.len().hash(&mut hasher);
        for lemming in &self.lemmings {
            lemming.id.hash(&mut hasher);
            lemming.x.hash(&mut hasher);
            lemming.y.hash(&mut hasher);
            lemming.dir.hash(&mut hasher);
            lemming.action.discriminant().hash(&mut hasher);
            lemming.frame.hash(&mut hasher);
            lemming.fallen.hash(&mut hasher);
            lemming.bricks_left.hash(&mut hasher);
            lemming.countdown.hash(&mut hasher);
            lemming.is_climber.hash(&mut hasher);
            lemming.is_floater.hash(&mut hasher);
            lemming.terminal.hash(&mut hasher);
        }
        self.terrain.pixels().hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the session state for snapshots or sync.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| EngineError::InvalidState(format!("Failed to serialize session: {e}")))
    }

    /// Deserialize session state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| EngineError::InvalidState(format!("Failed to deserialize session: {e}")))
    }
}
