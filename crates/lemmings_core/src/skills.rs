//! Skill semantics and cursor target resolution.
//!
//! Skills are assigned to exactly one agent at a time, subject to a
//! per-skill supply from the level and a whitelist of states the skill
//! may be assigned from. Failed assignments are silent: no supply is
//! consumed, no event recorded, and the agent is untouched.

use serde::{Deserialize, Serialize};

use crate::lemming::{Action, Direction, Lemming, LemmingId};

/// A player-assignable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    /// Permanent: scale vertical walls.
    Climber,
    /// Permanent: survive any fall under a parachute.
    Floater,
    /// Arm a timed self-destruct.
    Bomber,
    /// Stand still and turn other agents around.
    Blocker,
    /// Lay a staircase of bricks.
    Builder,
    /// Tunnel horizontally.
    Basher,
    /// Tunnel diagonally down.
    Miner,
    /// Tunnel straight down.
    Digger,
}

/// All skills in supply-table order.
pub const ALL_SKILLS: [Skill; 8] = [
    Skill::Climber,
    Skill::Floater,
    Skill::Bomber,
    Skill::Blocker,
    Skill::Builder,
    Skill::Basher,
    Skill::Miner,
    Skill::Digger,
];

impl Skill {
    /// Index into the supply table.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Climber => 0,
            Self::Floater => 1,
            Self::Bomber => 2,
            Self::Blocker => 3,
            Self::Builder => 4,
            Self::Basher => 5,
            Self::Miner => 6,
            Self::Digger => 7,
        }
    }

    /// Permanent skills stick to the agent across actions.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        matches!(self, Self::Climber | Self::Floater)
    }

    /// Whether this skill may be assigned to an agent currently in
    /// `action`. Permanent skills and the bomber apply in almost any
    /// state; working skills only from ambulatory states, and never
    /// while already performing the same action.
    #[must_use]
    pub fn allowed_from(self, action: Action) -> bool {
        // Nothing is assignable to an agent already leaving or dying.
        if matches!(
            action,
            Action::Exiting | Action::Exploding | Action::Drowning | Action::Splatting
        ) {
            return false;
        }
        match self {
            Self::Climber | Self::Floater | Self::Bomber => true,
            Self::Blocker => matches!(
                action,
                Action::Walking
                    | Action::Jumping
                    | Action::Digging
                    | Action::Bashing
                    | Action::Mining
                    | Action::Building
                    | Action::Shrugging
            ),
            Self::Builder => matches!(
                action,
                Action::Walking
                    | Action::Jumping
                    | Action::Digging
                    | Action::Bashing
                    | Action::Mining
                    | Action::Shrugging
            ),
            Self::Basher => matches!(
                action,
                Action::Walking
                    | Action::Jumping
                    | Action::Digging
                    | Action::Mining
                    | Action::Building
                    | Action::Shrugging
            ),
            Self::Miner => matches!(
                action,
                Action::Walking
                    | Action::Jumping
                    | Action::Digging
                    | Action::Bashing
                    | Action::Building
                    | Action::Shrugging
            ),
            Self::Digger => matches!(
                action,
                Action::Walking
                    | Action::Jumping
                    | Action::Bashing
                    | Action::Mining
                    | Action::Building
                    | Action::Shrugging
            ),
        }
    }
}

/// Per-skill remaining supply for a level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillSupply {
    counts: [u32; 8],
}

impl SkillSupply {
    /// Create a supply with the same count for every skill.
    #[must_use]
    pub const fn uniform(count: u32) -> Self {
        Self { counts: [count; 8] }
    }

    /// Remaining uses of a skill.
    #[must_use]
    pub const fn remaining(&self, skill: Skill) -> u32 {
        self.counts[skill.index()]
    }

    /// Set the supply for one skill (level construction).
    pub fn set(&mut self, skill: Skill, count: u32) {
        self.counts[skill.index()] = count;
    }

    /// Consume one use. Returns false (and consumes nothing) when empty.
    pub fn consume(&mut self, skill: Skill) -> bool {
        let slot = &mut self.counts[skill.index()];
        if *slot == 0 {
            false
        } else {
            *slot -= 1;
            true
        }
    }
}

/// Advanced-select sub-modes: a pure filter over candidate agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionFilter {
    /// No restriction.
    Any,
    /// Only agents facing the given direction.
    Facing(Direction),
    /// Only agents currently walking.
    WalkersOnly,
}

impl SelectionFilter {
    fn matches(self, lemming: &Lemming) -> bool {
        match self {
            Self::Any => true,
            Self::Facing(dir) => lemming.dir == dir,
            Self::WalkersOnly => lemming.action == Action::Walking,
        }
    }
}

/// Cursor target resolution.
///
/// Candidates are active agents whose footprint contains the cursor and
/// that pass the filter; among those the highest id wins (newest spawn
/// is drawn topmost, matching reverse-iteration hit testing).
#[derive(Debug, Clone, Copy)]
pub struct CursorSelection {
    /// Cursor x in level pixel space.
    pub x: i32,
    /// Cursor y in level pixel space.
    pub y: i32,
    /// Active sub-mode filter.
    pub filter: SelectionFilter,
}

impl CursorSelection {
    /// Create a selection at a cursor position with no filter.
    #[must_use]
    pub const fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            filter: SelectionFilter::Any,
        }
    }

    /// Resolve the cursor to at most one target agent.
    #[must_use]
    pub fn resolve_target(&self, lemmings: &[Lemming]) -> Option<LemmingId> {
        lemmings
            .iter()
            .filter(|l| l.is_active())
            .filter(|l| l.footprint_contains(self.x, self.y))
            .filter(|l| self.filter.matches(l))
            .map(|l| l.id)
            .max()
    }
}
