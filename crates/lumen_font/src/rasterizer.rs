//! Outline rasterizer adapter
//!
//! The glyph cache talks to the font backend only through [`GlyphRasterizer`].
//! Advances, bearings and kerning cross this boundary in 26.6 fixed point
//! (1/64 pixel) and are rounded to whole pixels by the cache.

use crate::config::HintParams;
use crate::Result;

/// One glyph as produced by the rasterizer
#[derive(Debug, Clone, Default)]
pub struct RenderedGlyph {
    /// Coverage bytes, `width * height`, row-major
    pub coverage: Vec<u8>,
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Pen advance (26.6)
    pub advance: i32,
    /// Origin to left edge of the ink (26.6)
    pub bearing_x: i32,
    /// Baseline to top edge of the ink, positive upwards (26.6)
    pub bearing_y: i32,
}

/// Backend that turns codepoints into coverage bitmaps
pub trait GlyphRasterizer: Send {
    /// Replace the current face with one parsed from `data`
    fn load_face(&mut self, data: Vec<u8>) -> Result<()>;

    /// Set the nominal size glyphs are rendered at.
    ///
    /// The em size in pixels is `height * size_ratio`.
    fn set_pixel_size(&mut self, width: u32, height: u32, size_ratio: f32) -> Result<()>;

    /// Render one glyph at the current pixel size
    fn render_glyph(&mut self, ch: char, hint: HintParams) -> Result<RenderedGlyph>;

    /// Ascender at the current pixel size (26.6)
    fn ascender(&self) -> i32;

    /// Kerning adjustment between two glyphs at the current pixel size (26.6)
    fn kerning(&self, left: char, right: char) -> (i32, i32);

    /// Ascender divided by the line height of the face
    fn ascender_to_height_ratio(&self) -> f32;

    fn is_monospaced(&self) -> bool;
}

/// Convert pixels to 26.6 fixed point
pub fn to_f26dot6(pixels: f32) -> i32 {
    (pixels * 64.0).round() as i32
}

/// Round a 26.6 value to the nearest whole pixel
pub fn f26dot6_to_px(value: i32) -> i32 {
    (value + 32).div_euclid(64)
}

/// Em size in whole pixels for a nominal height and size ratio
pub fn em_pixels(height: u32, size_ratio: f32) -> u32 {
    ((height as f32 * size_ratio) as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_round_trip() {
        assert_eq!(to_f26dot6(1.0), 64);
        assert_eq!(to_f26dot6(-2.5), -160);
        assert_eq!(f26dot6_to_px(64), 1);
        assert_eq!(f26dot6_to_px(95), 1);
        assert_eq!(f26dot6_to_px(96), 2);
        assert_eq!(f26dot6_to_px(-64), -1);
        assert_eq!(f26dot6_to_px(-96), -1);
    }

    #[test]
    fn test_em_pixels() {
        assert_eq!(em_pixels(16, 0.8), 12);
        assert_eq!(em_pixels(16, 1.0), 16);
        assert_eq!(em_pixels(1, 0.1), 1);
    }
}
