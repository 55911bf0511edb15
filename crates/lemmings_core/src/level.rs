//! Immutable level descriptions.
//!
//! A [`LevelDescriptor`] is the core's view of whatever the (external)
//! level parser produced: a stencil-compatible terrain description,
//! placed objects, spawn data, and the session parameters. The core
//! treats it as an immutable snapshot; [`LevelDescriptor::build`]
//! materialises the mutable terrain/stencil buffers at session start.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::lemming::Direction;
use crate::skills::SkillSupply;
use crate::stencil::{mask, MaskOp, Stencil};
use crate::terrain::TerrainBitmap;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub w: i32,
    /// Height in pixels.
    pub h: i32,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether the rectangle contains a pixel.
    #[must_use]
    pub const fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }
}

/// What a placed level object does when an agent touches its trigger area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Level exit; touching agents leave the level successfully.
    Exit,
    /// Water; touching agents drown.
    Water,
    /// Lethal trap.
    Trap,
    /// One-way terrain arrows (rendering hint, direction for bashers).
    OneWay(Direction),
    /// Pure decoration, no trigger behavior.
    Decoration,
}

/// A placed level object. The object registry owns these; stencil cells
/// only hold the ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelObject {
    /// Object id; also the z-order insertion key.
    pub id: u16,
    /// Behavior class.
    pub kind: ObjectKind,
    /// Trigger area in level pixel space.
    pub trigger: Rect,
}

/// Identity of a level within a pack, used to match replays to levels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelIdentity {
    /// Level pack name.
    pub pack: String,
    /// Difficulty rating within the pack.
    pub rating: String,
    /// Level index within the rating.
    pub index: u32,
    /// Human-readable level name.
    pub name: String,
}

impl fmt::Display for LevelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} ({})",
            self.pack, self.rating, self.index, self.name
        )
    }
}

/// Complete immutable description of a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    /// Level identity for replay matching.
    pub identity: LevelIdentity,
    /// Playfield width in pixels.
    pub width: i32,
    /// Playfield height in pixels.
    pub height: i32,
    /// Filled terrain regions.
    pub terrain_rects: Vec<Rect>,
    /// Regions flagged as indestructible steel (must also be terrain).
    pub steel_rects: Vec<Rect>,
    /// Regions flagged as one-way terrain.
    pub one_way_rects: Vec<Rect>,
    /// Placed objects in z-order.
    pub objects: Vec<LevelObject>,
    /// Agent spawn point (foot pixel).
    pub spawn_x: i32,
    /// Agent spawn point (foot pixel).
    pub spawn_y: i32,
    /// Direction newly released agents face.
    pub spawn_dir: Direction,
    /// Total number of agents released over the level.
    pub lemming_count: u32,
    /// Minimum number of agents that must exit.
    pub required_rescue: u32,
    /// Time limit in logic ticks.
    pub time_limit_ticks: u64,
    /// Lowest allowed release rate.
    pub release_rate_min: u32,
    /// Highest allowed release rate.
    pub release_rate_max: u32,
    /// Release rate at level start.
    pub release_rate_initial: u32,
    /// Skill supply available to the player.
    pub skills: SkillSupply,
    /// Classic-steel compatibility mode for this level.
    pub classic_steel: bool,
    /// Seed for procedural terrain variation applied by the level
    /// pipeline. Zero for levels built from explicit geometry; carried
    /// into replays either way.
    pub seed: u64,
}

impl LevelDescriptor {
    /// Validate internal consistency of the description.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLevel`] describing the first problem
    /// found: non-positive dimensions, an out-of-bounds spawn point, a
    /// rescue quota above the population, or bad release-rate bounds.
    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(EngineError::InvalidLevel(format!(
                "non-positive dimensions {}x{}",
                self.width, self.height
            )));
        }
        if self.spawn_x < 0
            || self.spawn_x >= self.width
            || self.spawn_y < 0
            || self.spawn_y >= self.height
        {
            return Err(EngineError::InvalidLevel(format!(
                "spawn point ({}, {}) outside {}x{} playfield",
                self.spawn_x, self.spawn_y, self.width, self.height
            )));
        }
        if self.required_rescue > self.lemming_count {
            return Err(EngineError::InvalidLevel(format!(
                "required rescue {} exceeds population {}",
                self.required_rescue, self.lemming_count
            )));
        }
        if self.release_rate_min > self.release_rate_max
            || self.release_rate_initial < self.release_rate_min
            || self.release_rate_initial > self.release_rate_max
        {
            return Err(EngineError::InvalidLevel(format!(
                "release rate {} outside bounds {}..={}",
                self.release_rate_initial, self.release_rate_min, self.release_rate_max
            )));
        }
        Ok(())
    }

    /// Hash of the layout a replay depends on: dimensions, terrain,
    /// steel/one-way regions, and object placement. Two levels with the
    /// same layout hash simulate identically for the same action stream.
    #[must_use]
    pub fn layout_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.terrain_rects.hash(&mut hasher);
        self.steel_rects.hash(&mut hasher);
        self.one_way_rects.hash(&mut hasher);
        self.objects.hash(&mut hasher);
        self.spawn_x.hash(&mut hasher);
        self.spawn_y.hash(&mut hasher);
        self.spawn_dir.hash(&mut hasher);
        self.lemming_count.hash(&mut hasher);
        self.classic_steel.hash(&mut hasher);
        self.seed.hash(&mut hasher);
        hasher.finish()
    }

    /// Materialise the mutable terrain and stencil buffers.
    #[must_use]
    pub fn build(&self) -> (TerrainBitmap, Stencil) {
        let mut terrain = TerrainBitmap::new(self.width, self.height);
        let mut stencil = Stencil::new(self.width, self.height);
        stencil.classic_steel = self.classic_steel;

        for rect in &self.terrain_rects {
            stencil.apply_rect_mask(&mut terrain, rect.x, rect.y, rect.w, rect.h, MaskOp::Paint);
        }
        for rect in &self.steel_rects {
            for y in rect.y..rect.y + rect.h {
                for x in rect.x..rect.x + rect.w {
                    stencil.or_mask(x, y, mask::STEEL);
                }
            }
        }
        for rect in &self.one_way_rects {
            for y in rect.y..rect.y + rect.h {
                for x in rect.x..rect.x + rect.w {
                    stencil.or_mask(x, y, mask::ONE_WAY);
                }
            }
        }
        for object in &self.objects {
            let t = object.trigger;
            stencil.add_object(object.id, t.x, t.y, t.w, t.h);
        }

        (terrain, stencil)
    }
}
