//! The mutable terrain bitmap.
//!
//! Pixels are packed `0xAARRGGBB`. The simulation owns this buffer
//! exclusively and mutates it in place through the stencil operations;
//! the renderer only ever sees copies taken at snapshot time.

use serde::{Deserialize, Serialize};

/// An opaque placeholder color used when the simulation paints terrain
/// (builder bricks, debug draw) without a source image.
pub const BRICK_COLOR: u32 = 0xFF_B0_B0_B0;

/// Width x height grid of RGBA pixels.
///
/// All accessors treat out-of-bounds coordinates as transparent reads
/// and silent no-op writes; agents routinely probe past the level edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainBitmap {
    width: i32,
    height: i32,
    pixels: Vec<u32>,
}

impl TerrainBitmap {
    /// Create a fully transparent bitmap.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "terrain dimensions must be positive");
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize)],
        }
    }

    /// Create a bitmap from raw pixels. The slice length must be `width * height`.
    #[must_use]
    pub fn from_pixels(width: i32, height: i32, pixels: Vec<u32>) -> Self {
        assert_eq!(pixels.len(), (width as usize) * (height as usize));
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Bitmap width in pixels.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Bitmap height in pixels.
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

    /// Raw pixel value, 0 when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> u32 {
        self.index(x, y).map_or(0, |i| self.pixels[i])
    }

    /// Alpha channel of a pixel, 0 when out of bounds.
    #[must_use]
    pub fn alpha(&self, x: i32, y: i32) -> u8 {
        (self.pixel(x, y) >> 24) as u8
    }

    /// Whether the pixel has any opacity.
    #[must_use]
    pub fn is_opaque(&self, x: i32, y: i32) -> bool {
        self.alpha(x, y) > 0
    }

    /// Write a pixel. Out of bounds is a silent no-op.
    pub fn set_pixel(&mut self, x: i32, y: i32, value: u32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = value;
        }
    }

    /// Clear a pixel to fully transparent. Out of bounds is a silent no-op.
    pub fn clear_pixel(&mut self, x: i32, y: i32) {
        self.set_pixel(x, y, 0);
    }

    /// Fill a rectangle with a pixel value, clipped to the bitmap.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, value: u32) {
        for py in y..y + h {
            for px in x..x + w {
                self.set_pixel(px, py, value);
            }
        }
    }

    /// Borrow the raw pixel buffer (row-major).
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_are_transparent() {
        let bitmap = TerrainBitmap::new(4, 4);
        assert_eq!(bitmap.alpha(-1, 0), 0);
        assert_eq!(bitmap.alpha(0, -1), 0);
        assert_eq!(bitmap.alpha(4, 0), 0);
        assert_eq!(bitmap.alpha(0, 4), 0);
    }

    #[test]
    fn out_of_bounds_writes_are_noops() {
        let mut bitmap = TerrainBitmap::new(4, 4);
        bitmap.set_pixel(-1, -1, BRICK_COLOR);
        bitmap.set_pixel(100, 100, BRICK_COLOR);
        assert!(bitmap.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn fill_rect_clips() {
        let mut bitmap = TerrainBitmap::new(4, 4);
        bitmap.fill_rect(2, 2, 10, 10, BRICK_COLOR);
        assert!(bitmap.is_opaque(2, 2));
        assert!(bitmap.is_opaque(3, 3));
        assert!(!bitmap.is_opaque(1, 1));
    }

    #[test]
    fn clear_pixel_removes_opacity() {
        let mut bitmap = TerrainBitmap::new(2, 2);
        bitmap.set_pixel(1, 1, BRICK_COLOR);
        assert!(bitmap.is_opaque(1, 1));
        bitmap.clear_pixel(1, 1);
        assert!(!bitmap.is_opaque(1, 1));
    }
}
