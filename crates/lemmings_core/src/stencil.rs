//! Per-pixel classification of the playfield.
//!
//! The stencil is a grid parallel to the terrain bitmap. Each cell holds
//! a material bitmask plus the ids of placed level objects overlapping
//! that pixel (insertion order doubles as z-order for hit testing).
//!
//! # Invariant
//!
//! A pixel is solid in the stencil iff the corresponding terrain pixel
//! is opaque. Every mutation goes through [`Stencil::apply_circular_mask`]
//! or [`Stencil::apply_rect_mask`], which update both buffers together;
//! [`Stencil::check_terrain_sync`] verifies the invariant and reports a
//! fatal [`EngineError::StencilDesync`] on violation.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::terrain::{TerrainBitmap, BRICK_COLOR};

/// Material bits stored per stencil cell.
pub mod mask {
    /// Ordinary diggable terrain.
    pub const BRICK: u8 = 1 << 0;
    /// Indestructible steel.
    pub const STEEL: u8 = 1 << 1;
    /// One-way terrain (bashable only in the arrow direction).
    pub const ONE_WAY: u8 = 1 << 2;
    /// Suppresses the one-way overlay when drawing this pixel.
    pub const NO_ONE_WAY_DRAW: u8 = 1 << 3;
}

/// Object-id slots per cell. Overlaps beyond this are silently dropped;
/// real levels never stack more than two trigger areas on a pixel.
pub const OBJECT_SLOTS: usize = 4;

/// One stencil cell: material mask plus overlapping object ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Material bitmask (see [`mask`]).
    pub mask: u8,
    objects: [u16; OBJECT_SLOTS],
    object_count: u8,
}

impl Cell {
    /// Ids of objects overlapping this pixel, in insertion (z) order.
    #[must_use]
    pub fn objects(&self) -> &[u16] {
        &self.objects[..self.object_count as usize]
    }

    fn push_object(&mut self, id: u16) {
        if (self.object_count as usize) < OBJECT_SLOTS {
            self.objects[self.object_count as usize] = id;
            self.object_count += 1;
        }
    }
}

/// A mutation applied to a pixel region through the stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskOp {
    /// Remove terrain: clear the brick bit and the terrain pixel alpha.
    /// Steel survives unless `allow_steel` is set (debug erase).
    Erase {
        /// Permit erasing steel (and one-way) pixels.
        allow_steel: bool,
    },
    /// Add terrain: set the brick bit and write an opaque pixel.
    Paint,
}

/// Per-pixel classification buffer kept in sync with the terrain bitmap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stencil {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    /// Classic-steel compatibility: when set, erase operations skip
    /// one-way pixels just like steel.
    pub classic_steel: bool,
}

impl Stencil {
    /// Create an all-empty stencil.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "stencil dimensions must be positive");
        Self {
            width,
            height,
            cells: vec![Cell::default(); (width as usize) * (height as usize)],
            classic_steel: false,
        }
    }

    /// Stencil width in pixels.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Stencil height in pixels.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some((y as usize) * (self.width as usize) + (x as usize))
        }
    }

    /// Material bitmask at a pixel, 0 when out of bounds.
    #[must_use]
    pub fn mask(&self, x: i32, y: i32) -> u8 {
        self.index(x, y).map_or(0, |i| self.cells[i].mask)
    }

    /// Whether the pixel blocks movement (brick or steel).
    #[must_use]
    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.mask(x, y) & (mask::BRICK | mask::STEEL) != 0
    }

    /// Whether the pixel is indestructible steel.
    #[must_use]
    pub fn is_steel(&self, x: i32, y: i32) -> bool {
        self.mask(x, y) & mask::STEEL != 0
    }

    /// Object ids overlapping a pixel, empty when out of bounds.
    #[must_use]
    pub fn objects_at(&self, x: i32, y: i32) -> &[u16] {
        self.index(x, y).map_or(&[], |i| self.cells[i].objects())
    }

    /// Set mask bits directly (level construction only).
    pub fn or_mask(&mut self, x: i32, y: i32, bits: u8) {
        if let Some(i) = self.index(x, y) {
            self.cells[i].mask |= bits;
        }
    }

    /// Register an object id over a rectangular trigger area.
    pub fn add_object(&mut self, id: u16, x: i32, y: i32, w: i32, h: i32) {
        for py in y..y + h {
            for px in x..x + w {
                if let Some(i) = self.index(px, py) {
                    self.cells[i].push_object(id);
                }
            }
        }
    }

    /// Whether an erase may touch this pixel. Attempting to erase steel
    /// is a silent no-op, not an error; classic-steel mode extends the
    /// same protection to one-way pixels.
    #[must_use]
    pub fn erasable(&self, x: i32, y: i32, allow_steel: bool) -> bool {
        if allow_steel {
            return true;
        }
        let m = self.mask(x, y);
        if m & mask::STEEL != 0 {
            return false;
        }
        if self.classic_steel && m & mask::ONE_WAY != 0 {
            return false;
        }
        true
    }

    /// Mutate one pixel in both buffers. Returns whether anything changed.
    fn apply_pixel(&mut self, terrain: &mut TerrainBitmap, x: i32, y: i32, op: MaskOp) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        match op {
            MaskOp::Erase { allow_steel } => {
                if !self.erasable(x, y, allow_steel) {
                    return false;
                }
                let cell = &mut self.cells[i];
                let was_solid = cell.mask & (mask::BRICK | mask::STEEL) != 0;
                cell.mask &= !mask::BRICK;
                if allow_steel {
                    cell.mask &= !(mask::STEEL | mask::ONE_WAY);
                }
                terrain.clear_pixel(x, y);
                was_solid
            }
            MaskOp::Paint => {
                self.cells[i].mask |= mask::BRICK;
                terrain.set_pixel(x, y, BRICK_COLOR);
                true
            }
        }
    }

    /// Apply an operation to every pixel within a disc. Digging strokes,
    /// bashing swings, explosions, and debug erase all reduce to this.
    /// Out-of-bounds portions are silently clipped.
    pub fn apply_circular_mask(
        &mut self,
        terrain: &mut TerrainBitmap,
        cx: i32,
        cy: i32,
        radius: i32,
        op: MaskOp,
    ) {
        let r_sq = radius * radius;
        for y in cy - radius..=cy + radius {
            for x in cx - radius..=cx + radius {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= r_sq {
                    self.apply_pixel(terrain, x, y, op);
                }
            }
        }
    }

    /// Apply an operation to every pixel within a rectangle (builder
    /// bricks, digger strips, debug draw).
    pub fn apply_rect_mask(
        &mut self,
        terrain: &mut TerrainBitmap,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        op: MaskOp,
    ) {
        for py in y..y + h {
            for px in x..x + w {
                self.apply_pixel(terrain, px, py, op);
            }
        }
    }

    /// Verify the stencil/terrain sync invariant over the whole grid:
    /// the brick bit must match terrain opacity for every pixel. Steel
    /// and one-way flags are explicit overrides and are exempt.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StencilDesync`] naming the first pixel
    /// that disagrees. Callers must treat this as fatal.
    pub fn check_terrain_sync(&self, terrain: &TerrainBitmap) -> Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let brick = self.mask(x, y) & mask::BRICK != 0;
                if brick != terrain.is_opaque(x, y) {
                    return Err(EngineError::StencilDesync { x, y });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_block(w: i32, h: i32) -> (Stencil, TerrainBitmap) {
        let mut stencil = Stencil::new(w, h);
        let mut terrain = TerrainBitmap::new(w, h);
        stencil.apply_rect_mask(&mut terrain, 0, 0, w, h, MaskOp::Paint);
        (stencil, terrain)
    }

    #[test]
    fn erase_clears_both_buffers() {
        let (mut stencil, mut terrain) = solid_block(20, 20);
        stencil.apply_circular_mask(&mut terrain, 10, 10, 4, MaskOp::Erase { allow_steel: false });

        assert!(!stencil.is_solid(10, 10));
        assert!(!terrain.is_opaque(10, 10));
        // Outside the disc stays solid
        assert!(stencil.is_solid(1, 1));
        assert!(terrain.is_opaque(1, 1));
        stencil.check_terrain_sync(&terrain).unwrap();
    }

    #[test]
    fn erase_on_steel_is_silent_noop() {
        let (mut stencil, mut terrain) = solid_block(10, 10);
        stencil.or_mask(5, 5, mask::STEEL);

        stencil.apply_circular_mask(&mut terrain, 5, 5, 2, MaskOp::Erase { allow_steel: false });
        assert!(stencil.is_solid(5, 5));
        assert!(terrain.is_opaque(5, 5));
        // Non-steel neighbours inside the disc were erased
        assert!(!stencil.is_solid(4, 5));
    }

    #[test]
    fn allow_steel_erases_steel() {
        let (mut stencil, mut terrain) = solid_block(10, 10);
        stencil.or_mask(5, 5, mask::STEEL);

        stencil.apply_circular_mask(&mut terrain, 5, 5, 2, MaskOp::Erase { allow_steel: true });
        assert!(!stencil.is_solid(5, 5));
        assert!(!stencil.is_steel(5, 5));
        stencil.check_terrain_sync(&terrain).unwrap();
    }

    #[test]
    fn classic_steel_protects_one_way() {
        let (mut stencil, mut terrain) = solid_block(10, 10);
        stencil.or_mask(3, 3, mask::ONE_WAY);

        stencil.apply_rect_mask(&mut terrain, 3, 3, 1, 1, MaskOp::Erase { allow_steel: false });
        assert!(!stencil.is_solid(3, 3), "one-way is erasable by default");

        let (mut stencil, mut terrain) = solid_block(10, 10);
        stencil.classic_steel = true;
        stencil.or_mask(3, 3, mask::ONE_WAY);

        stencil.apply_rect_mask(&mut terrain, 3, 3, 1, 1, MaskOp::Erase { allow_steel: false });
        assert!(stencil.is_solid(3, 3), "classic steel protects one-way");
    }

    #[test]
    fn dig_then_build_restores_occupancy() {
        let (mut stencil, mut terrain) = solid_block(20, 20);
        stencil.apply_circular_mask(&mut terrain, 10, 10, 5, MaskOp::Erase { allow_steel: false });
        stencil.apply_circular_mask(&mut terrain, 10, 10, 5, MaskOp::Paint);

        for y in 0..20 {
            for x in 0..20 {
                assert!(stencil.is_solid(x, y), "pixel ({x}, {y}) not restored");
            }
        }
        stencil.check_terrain_sync(&terrain).unwrap();
    }

    #[test]
    fn object_slots_keep_insertion_order() {
        let mut stencil = Stencil::new(8, 8);
        stencil.add_object(3, 0, 0, 4, 4);
        stencil.add_object(7, 2, 2, 4, 4);

        assert_eq!(stencil.objects_at(1, 1), &[3]);
        assert_eq!(stencil.objects_at(2, 2), &[3, 7]);
        assert_eq!(stencil.objects_at(5, 5), &[7]);
        assert_eq!(stencil.objects_at(7, 7), &[] as &[u16]);
    }

    #[test]
    fn object_slot_overflow_is_dropped() {
        let mut stencil = Stencil::new(2, 2);
        for id in 0..10u16 {
            stencil.add_object(id, 0, 0, 1, 1);
        }
        assert_eq!(stencil.objects_at(0, 0), &[0, 1, 2, 3]);
    }

    #[test]
    fn out_of_bounds_mutation_is_noop() {
        let mut stencil = Stencil::new(4, 4);
        let mut terrain = TerrainBitmap::new(4, 4);
        stencil.apply_circular_mask(&mut terrain, -10, -10, 3, MaskOp::Paint);
        stencil.apply_rect_mask(&mut terrain, 100, 100, 5, 5, MaskOp::Paint);
        stencil.check_terrain_sync(&terrain).unwrap();
        assert!(!stencil.is_solid(0, 0));
    }
}
