//! Render snapshots.
//!
//! A [`RenderSnapshot`] is an owned copy of everything the presentation
//! layer needs for one frame. The renderer never touches the live
//! session, so a slow draw cannot observe a half-stepped tick.

use serde::{Deserialize, Serialize};

use lemmings_core::lemming::{Action, Direction, Lemming, LemmingId};
use lemmings_core::session::{GameSession, SessionCounters, SessionOutcome};

/// One agent as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LemmingSprite {
    /// Agent id.
    pub id: LemmingId,
    /// Foot pixel x.
    pub x: i32,
    /// Foot pixel y.
    pub y: i32,
    /// Facing.
    pub dir: Direction,
    /// Animation to draw.
    pub action: Action,
    /// Ticks left on an armed self-destruct, for the countdown overlay.
    pub countdown: Option<u32>,
    /// Whether the cursor highlight rests on this agent.
    pub highlighted: bool,
}

/// Everything one frame of rendering needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSnapshot {
    /// Tick the snapshot was taken after.
    pub tick: u64,
    /// Playfield width in pixels.
    pub width: i32,
    /// Playfield height in pixels.
    pub height: i32,
    /// Terrain pixels, row-major ARGB.
    pub terrain: Vec<u32>,
    /// Active agents only, in id order.
    pub lemmings: Vec<LemmingSprite>,
    /// Scoreboard counters.
    pub counters: SessionCounters,
    /// Ticks left on the level clock.
    pub time_remaining: u64,
    /// Session outcome so far.
    pub outcome: SessionOutcome,
}

impl RenderSnapshot {
    /// Copy the renderable state out of a session.
    #[must_use]
    pub fn capture(session: &GameSession) -> Self {
        let terrain = session.terrain();
        Self {
            tick: session.tick_count(),
            width: terrain.width(),
            height: terrain.height(),
            terrain: terrain.pixels().to_vec(),
            lemmings: session
                .lemmings()
                .iter()
                .filter(|l| l.is_active())
                .map(LemmingSprite::from)
                .collect(),
            counters: session.counters(),
            time_remaining: session.time_remaining(),
            outcome: session.outcome(),
        }
    }
}

impl From<&Lemming> for LemmingSprite {
    fn from(lemming: &Lemming) -> Self {
        Self {
            id: lemming.id,
            x: lemming.x,
            y: lemming.y,
            dir: lemming.dir,
            action: lemming.action,
            countdown: lemming.countdown,
            highlighted: lemming.highlighted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemmings_core::level::{LevelDescriptor, LevelIdentity, Rect};
    use lemmings_core::skills::SkillSupply;

    fn level() -> LevelDescriptor {
        LevelDescriptor {
            identity: LevelIdentity {
                pack: "runtime".into(),
                rating: "test".into(),
                index: 2,
                name: "snapshot".into(),
            },
            width: 100,
            height: 80,
            terrain_rects: vec![Rect::new(0, 61, 100, 19)],
            steel_rects: vec![],
            one_way_rects: vec![],
            objects: vec![],
            spawn_x: 20,
            spawn_y: 40,
            spawn_dir: Direction::Right,
            lemming_count: 2,
            required_rescue: 0,
            time_limit_ticks: 1_000,
            release_rate_min: 1,
            release_rate_max: 99,
            release_rate_initial: 99,
            skills: SkillSupply::default(),
            classic_steel: false,
            seed: 0,
        }
    }

    #[test]
    fn snapshot_is_detached_from_the_session() {
        let mut session = GameSession::new(level()).unwrap();
        for _ in 0..20 {
            session.tick();
        }
        let snapshot = RenderSnapshot::capture(&session);
        let frozen_tick = snapshot.tick;
        let frozen_positions: Vec<i32> = snapshot.lemmings.iter().map(|l| l.x).collect();

        for _ in 0..20 {
            session.tick();
        }
        assert_eq!(snapshot.tick, frozen_tick);
        assert_eq!(
            snapshot.lemmings.iter().map(|l| l.x).collect::<Vec<_>>(),
            frozen_positions
        );
    }

    #[test]
    fn snapshot_lists_only_active_agents() {
        let mut session = GameSession::new(level()).unwrap();
        for _ in 0..20 {
            session.tick();
        }
        session.nuke();
        for _ in 0..200 {
            session.tick();
        }
        let snapshot = RenderSnapshot::capture(&session);
        assert!(snapshot.lemmings.is_empty());
        assert_eq!(snapshot.counters.dead, 2);
    }
}
