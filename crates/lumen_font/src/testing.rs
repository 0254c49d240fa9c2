//! Deterministic rasterizer for headless tests
//!
//! [`MockRasterizer`] needs no font file: every glyph is a solid rectangle
//! whose size depends on the em size and the codepoint, so atlas contents
//! and metrics can be asserted exactly.

use crate::config::HintParams;
use crate::rasterizer::{em_pixels, to_f26dot6, GlyphRasterizer, RenderedGlyph};
use crate::{Result, TextError};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::{Arc, Mutex};

/// Coverage value written for every inked pixel
pub const MOCK_INK: u8 = 0xC8;

/// Rectangle-drawing [`GlyphRasterizer`] with failure injection
#[derive(Debug, Clone)]
pub struct MockRasterizer {
    em_px: u32,
    failing: FxHashSet<char>,
    kerning: FxHashMap<(char, char), i32>,
    em_kerning: FxHashMap<(char, char), f32>,
    oversized: bool,
    monospaced: bool,
    renders: Arc<Mutex<Vec<(char, u32)>>>,
}

impl MockRasterizer {
    pub fn new() -> Self {
        Self {
            em_px: 16,
            failing: FxHashSet::default(),
            kerning: FxHashMap::default(),
            em_kerning: FxHashMap::default(),
            oversized: false,
            monospaced: false,
            renders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `render_glyph` fail for `ch`
    pub fn fail_on(mut self, ch: char) -> Self {
        self.failing.insert(ch);
        self
    }

    /// Kerning between `left` and `right`, in whole pixels
    pub fn with_kerning(mut self, left: char, right: char, pixels: i32) -> Self {
        self.kerning.insert((left, right), pixels);
        self
    }

    /// Kerning between `left` and `right` as a fraction of the em size
    pub fn with_em_kerning(mut self, left: char, right: char, em_fraction: f32) -> Self {
        self.em_kerning.insert((left, right), em_fraction);
        self
    }

    /// Emit bitmaps three times larger than the em box
    pub fn oversized(mut self) -> Self {
        self.oversized = true;
        self
    }

    pub fn monospaced(mut self) -> Self {
        self.monospaced = true;
        self
    }

    /// Shared log of `(codepoint, em size)` for every render call
    pub fn render_log(&self) -> Arc<Mutex<Vec<(char, u32)>>> {
        Arc::clone(&self.renders)
    }

    /// Ink size of `ch` at an em size of `em_px`
    pub fn glyph_extent(ch: char, em_px: u32) -> (u32, u32) {
        if ch.is_whitespace() {
            return (0, 0);
        }
        let width = (em_px / 2 + (ch as u32 % 3)).max(1);
        let height = (em_px * 3 / 4).max(1);
        (width, height)
    }

    /// Advance of `ch` at an em size of `em_px`, in whole pixels
    pub fn glyph_advance(ch: char, em_px: u32) -> u32 {
        if ch.is_whitespace() {
            return (em_px / 3).max(1);
        }
        Self::glyph_extent(ch, em_px).0 + 1
    }
}

impl Default for MockRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphRasterizer for MockRasterizer {
    fn load_face(&mut self, data: Vec<u8>) -> Result<()> {
        if data.is_empty() {
            return Err(TextError::InvalidFontData);
        }
        Ok(())
    }

    fn set_pixel_size(&mut self, _width: u32, height: u32, size_ratio: f32) -> Result<()> {
        if height == 0 {
            return Err(TextError::InvalidConfig(
                "glyph pixel height must be non-zero".to_string(),
            ));
        }
        self.em_px = em_pixels(height, size_ratio);
        Ok(())
    }

    fn render_glyph(&mut self, ch: char, _hint: HintParams) -> Result<RenderedGlyph> {
        if let Ok(mut renders) = self.renders.lock() {
            renders.push((ch, self.em_px));
        }
        if self.failing.contains(&ch) {
            return Err(TextError::Rasterization {
                codepoint: ch,
                reason: "mock failure".to_string(),
            });
        }

        let (width, height) = if self.oversized && !ch.is_whitespace() {
            (self.em_px * 3, self.em_px * 3)
        } else {
            Self::glyph_extent(ch, self.em_px)
        };

        Ok(RenderedGlyph {
            coverage: vec![MOCK_INK; width as usize * height as usize],
            width,
            height,
            advance: Self::glyph_advance(ch, self.em_px) as i32 * 64,
            bearing_x: 64,
            bearing_y: height as i32 * 64,
        })
    }

    fn ascender(&self) -> i32 {
        (self.em_px * 3 / 4) as i32 * 64
    }

    fn kerning(&self, left: char, right: char) -> (i32, i32) {
        if let Some(fraction) = self.em_kerning.get(&(left, right)) {
            return (to_f26dot6(self.em_px as f32 * fraction), 0);
        }
        let pixels = self.kerning.get(&(left, right)).copied().unwrap_or(0);
        (pixels * 64, 0)
    }

    fn ascender_to_height_ratio(&self) -> f32 {
        0.75
    }

    fn is_monospaced(&self) -> bool {
        self.monospaced
    }
}
