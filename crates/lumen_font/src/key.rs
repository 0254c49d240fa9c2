//! Glyph identity shared by the glyph cache and the font texture.

use serde::{Deserialize, Serialize};

/// Requested pixel size of a glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GlyphSize {
    pub width: u32,
    pub height: u32,
}

impl GlyphSize {
    /// The size callers pass when they do not care; always collapses to the
    /// cell dimensions.
    pub const DEFAULT: GlyphSize = GlyphSize::new(32, 32);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Composite cache key: (requested size, codepoint)
///
/// The size is always clamped with [`clamp_glyph_size`] before a key is
/// built, so "default", zero and oversized requests share one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub size: GlyphSize,
    pub codepoint: char,
}

impl GlyphKey {
    pub fn new(codepoint: char, size: GlyphSize) -> Self {
        Self { size, codepoint }
    }
}

/// Collapse a requested glyph size onto the cell's maximum dimensions.
///
/// Zero, default and oversized requests all map to `(cell_width, cell_height)`;
/// anything strictly inside the cell passes through unchanged. The result is
/// a fixed point: clamping twice gives the same size.
pub fn clamp_glyph_size(requested: GlyphSize, cell_width: u32, cell_height: u32) -> GlyphSize {
    let max = GlyphSize::new(cell_width, cell_height);
    if requested.is_zero()
        || requested == GlyphSize::DEFAULT
        || requested.width > cell_width
        || requested.height > cell_height
    {
        max
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_default_collapse_to_cell() {
        let cell = GlyphSize::new(16, 16);
        assert_eq!(clamp_glyph_size(GlyphSize::new(0, 0), 16, 16), cell);
        assert_eq!(clamp_glyph_size(GlyphSize::new(0, 8), 16, 16), cell);
        assert_eq!(clamp_glyph_size(GlyphSize::DEFAULT, 16, 16), cell);
        assert_eq!(clamp_glyph_size(GlyphSize::DEFAULT, 64, 64), GlyphSize::new(64, 64));
    }

    #[test]
    fn test_oversized_collapses_to_cell() {
        assert_eq!(
            clamp_glyph_size(GlyphSize::new(17, 4), 16, 16),
            GlyphSize::new(16, 16)
        );
        assert_eq!(
            clamp_glyph_size(GlyphSize::new(4, 100), 16, 16),
            GlyphSize::new(16, 16)
        );
    }

    #[test]
    fn test_smaller_sizes_pass_through() {
        assert_eq!(
            clamp_glyph_size(GlyphSize::new(12, 10), 16, 16),
            GlyphSize::new(12, 10)
        );
        assert_eq!(
            clamp_glyph_size(GlyphSize::new(16, 16), 16, 16),
            GlyphSize::new(16, 16)
        );
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let cells = [(0, 0), (1, 1), (16, 16), (32, 32), (24, 48), (64, 31)];
        for &(cw, ch) in &cells {
            for w in 0..70 {
                for h in (0..70).step_by(7) {
                    let once = clamp_glyph_size(GlyphSize::new(w, h), cw, ch);
                    let twice = clamp_glyph_size(once, cw, ch);
                    assert_eq!(once, twice, "size {}x{} cell {}x{}", w, h, cw, ch);
                }
            }
        }
    }

    #[test]
    fn test_keys_for_equivalent_requests_match() {
        let a = GlyphKey::new('A', clamp_glyph_size(GlyphSize::new(0, 0), 16, 16));
        let b = GlyphKey::new('A', clamp_glyph_size(GlyphSize::DEFAULT, 16, 16));
        assert_eq!(a, b);
    }
}
