//! Glyph rasterization using swash
//!
//! Outlines are scaled and rendered by swash; the character map, vertical
//! metrics and legacy `kern` pairs come from ttf-parser. Both parse the same
//! borrowed font bytes on demand, which is cheap compared to rendering.

use crate::config::HintParams;
use crate::rasterizer::{em_pixels, to_f26dot6, GlyphRasterizer, RenderedGlyph};
use crate::{Result, TextError};
use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::zeno::Format;

/// Production [`GlyphRasterizer`] backed by swash
pub struct SwashRasterizer {
    /// Raw font file bytes
    data: Option<Vec<u8>>,
    /// Face index within a collection
    face_index: u32,
    /// Swash scale context (caches scaling state)
    context: ScaleContext,
    /// Current em size in pixels
    em_px: f32,
}

impl SwashRasterizer {
    /// Create a rasterizer with no face loaded
    pub fn new() -> Self {
        Self {
            data: None,
            face_index: 0,
            context: ScaleContext::new(),
            em_px: 16.0,
        }
    }

    /// Create a rasterizer and load the first face of `data`
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        let mut rasterizer = Self::new();
        rasterizer.load_face(data)?;
        Ok(rasterizer)
    }

    /// Select a face inside a font collection (TTC); takes effect on the next load
    pub fn with_face_index(mut self, face_index: u32) -> Self {
        self.face_index = face_index;
        self
    }

    /// Current em size in pixels
    pub fn em_size(&self) -> f32 {
        self.em_px
    }

    fn face(&self) -> Result<ttf_parser::Face<'_>> {
        let data = self.data.as_deref().ok_or(TextError::FontNotLoaded)?;
        ttf_parser::Face::parse(data, self.face_index).map_err(|_| TextError::InvalidFontData)
    }

    fn units_to_px(&self, face: &ttf_parser::Face<'_>) -> f32 {
        self.em_px / face.units_per_em().max(1) as f32
    }
}

impl Default for SwashRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphRasterizer for SwashRasterizer {
    fn load_face(&mut self, data: Vec<u8>) -> Result<()> {
        ttf_parser::Face::parse(&data, self.face_index).map_err(|_| TextError::InvalidFontData)?;
        swash::FontRef::from_index(&data, self.face_index as usize)
            .ok_or(TextError::InvalidFontData)?;
        self.data = Some(data);
        tracing::debug!("Loaded font face {}", self.face_index);
        Ok(())
    }

    fn set_pixel_size(&mut self, _width: u32, height: u32, size_ratio: f32) -> Result<()> {
        if height == 0 {
            return Err(TextError::InvalidConfig(
                "glyph pixel height must be non-zero".to_string(),
            ));
        }
        self.em_px = em_pixels(height, size_ratio) as f32;
        Ok(())
    }

    fn render_glyph(&mut self, ch: char, hint: HintParams) -> Result<RenderedGlyph> {
        let data = self.data.as_deref().ok_or(TextError::FontNotLoaded)?;
        let face = ttf_parser::Face::parse(data, self.face_index)
            .map_err(|_| TextError::InvalidFontData)?;
        let font = swash::FontRef::from_index(data, self.face_index as usize)
            .ok_or(TextError::InvalidFontData)?;

        // Missing characters render the .notdef glyph
        let glyph_id = face.glyph_index(ch).map(|id| id.0).unwrap_or(0);

        let advance = font
            .glyph_metrics(&[])
            .scale(self.em_px)
            .advance_width(glyph_id);

        let mut scaler = self
            .context
            .builder(font)
            .size(self.em_px)
            .hint(hint.hinted())
            .build();

        let mut render = Render::new(&[
            Source::ColorOutline(0),
            Source::ColorBitmap(StrikeWith::BestFit),
            Source::Outline,
        ]);
        render.format(Format::Alpha);

        let Some(image) = render.render(&mut scaler, glyph_id) else {
            // Empty glyph (like space) - no bitmap but has advance
            return Ok(RenderedGlyph {
                advance: to_f26dot6(advance),
                ..Default::default()
            });
        };

        let width = image.placement.width;
        let height = image.placement.height;
        let pixel_count = width as usize * height as usize;

        // Color sources come back as RGBA; keep only the alpha channel
        let coverage = if image.data.len() == pixel_count * 4 {
            image.data.chunks_exact(4).map(|px| px[3]).collect()
        } else if image.data.len() >= pixel_count {
            image.data
        } else {
            return Err(TextError::Rasterization {
                codepoint: ch,
                reason: format!(
                    "short coverage buffer: {} bytes for {}x{}",
                    image.data.len(),
                    width,
                    height
                ),
            });
        };

        Ok(RenderedGlyph {
            coverage,
            width,
            height,
            advance: to_f26dot6(advance),
            bearing_x: image.placement.left * 64,
            bearing_y: image.placement.top * 64,
        })
    }

    fn ascender(&self) -> i32 {
        match self.face() {
            Ok(face) => to_f26dot6(face.ascender() as f32 * self.units_to_px(&face)),
            Err(_) => 0,
        }
    }

    fn kerning(&self, left: char, right: char) -> (i32, i32) {
        let Ok(face) = self.face() else {
            return (0, 0);
        };
        let (Some(left), Some(right)) = (face.glyph_index(left), face.glyph_index(right)) else {
            return (0, 0);
        };
        let Some(kern) = face.tables().kern else {
            return (0, 0);
        };

        let units = kern
            .subtables
            .into_iter()
            .filter(|subtable| subtable.horizontal && !subtable.variable)
            .find_map(|subtable| subtable.glyphs_kerning(left, right))
            .unwrap_or(0);

        (to_f26dot6(units as f32 * self.units_to_px(&face)), 0)
    }

    fn ascender_to_height_ratio(&self) -> f32 {
        let Ok(face) = self.face() else {
            return 0.0;
        };
        let ascender = face.ascender() as f32;
        let height = ascender - face.descender() as f32 + face.line_gap() as f32;
        if height <= 0.0 {
            0.0
        } else {
            ascender / height
        }
    }

    fn is_monospaced(&self) -> bool {
        self.face().map(|face| face.is_monospaced()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rasterizer_creation() {
        let rasterizer = SwashRasterizer::new();
        assert_eq!(rasterizer.em_size(), 16.0);
        assert!(!rasterizer.is_monospaced());
        assert_eq!(rasterizer.kerning('A', 'V'), (0, 0));
    }

    #[test]
    fn test_render_without_face_fails() {
        let mut rasterizer = SwashRasterizer::new();
        assert!(matches!(
            rasterizer.render_glyph('A', HintParams::default()),
            Err(TextError::FontNotLoaded)
        ));
    }

    #[test]
    fn test_garbage_data_is_rejected() {
        assert!(matches!(
            SwashRasterizer::from_data(vec![0, 1, 2, 3]),
            Err(TextError::InvalidFontData)
        ));
    }

    const SYSTEM_FONTS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];

    /// A rasterizer at a 25px em, or `None` when no known font is installed
    fn system_rasterizer() -> Option<SwashRasterizer> {
        let data = SYSTEM_FONTS.iter().find_map(|path| std::fs::read(path).ok());
        let Some(data) = data else {
            println!("No system font found, skipping");
            return None;
        };
        let mut rasterizer = SwashRasterizer::from_data(data).ok()?;
        rasterizer.set_pixel_size(32, 32, 0.8).ok()?;
        Some(rasterizer)
    }

    #[test]
    fn test_render_glyph_with_system_font() {
        let Some(mut rasterizer) = system_rasterizer() else {
            return;
        };

        let glyph = rasterizer.render_glyph('A', HintParams::default()).unwrap();
        assert!(glyph.width > 0 && glyph.height > 0);
        assert!(glyph.width <= 32 && glyph.height <= 32);
        assert!(glyph.coverage.len() >= (glyph.width * glyph.height) as usize);
        assert!(glyph.coverage.iter().any(|&c| c > 0));
        assert!(glyph.advance > 0);
        assert!(glyph.bearing_y > 0);
        // Whole pixels in 26.6
        assert_eq!(glyph.bearing_x % 64, 0);
        assert_eq!(glyph.bearing_y % 64, 0);
    }

    #[test]
    fn test_unmapped_codepoint_renders_notdef() {
        let Some(mut rasterizer) = system_rasterizer() else {
            return;
        };
        let face = rasterizer.face().unwrap();
        assert!(face.glyph_index('\u{10FFFD}').is_none());
        assert!(face.glyph_index('\u{10FFFC}').is_none());

        let first = rasterizer
            .render_glyph('\u{10FFFD}', HintParams::default())
            .unwrap();
        let second = rasterizer
            .render_glyph('\u{10FFFC}', HintParams::default())
            .unwrap();
        assert!(first.advance > 0);
        assert_eq!(first.advance, second.advance);
        assert_eq!((first.width, first.height), (second.width, second.height));
        assert_eq!(first.coverage, second.coverage);
    }

    #[test]
    fn test_space_has_advance_but_no_bitmap() {
        let Some(mut rasterizer) = system_rasterizer() else {
            return;
        };

        let space = rasterizer.render_glyph(' ', HintParams::default()).unwrap();
        assert_eq!(space.width, 0);
        assert_eq!(space.height, 0);
        assert!(space.coverage.is_empty());
        assert!(space.advance > 0);
    }

    #[test]
    fn test_ascender_is_f26dot6() {
        let Some(mut rasterizer) = system_rasterizer() else {
            return;
        };
        let face = rasterizer.face().unwrap();
        let expected = face.ascender() as f32 * (25.0 / face.units_per_em() as f32);

        let ascender = rasterizer.ascender();
        assert!(ascender > 0);
        assert_eq!(ascender, to_f26dot6(expected));

        let ratio = rasterizer.ascender_to_height_ratio();
        assert!(ratio > 0.0 && ratio < 1.0);

        // Doubling the em doubles the ascender, within rounding
        rasterizer.set_pixel_size(64, 64, 0.78125).unwrap();
        assert!((rasterizer.ascender() - ascender * 2).abs() <= 1);
    }

    #[test]
    fn test_kern_table_pairs() {
        let Some(mut rasterizer) = system_rasterizer() else {
            return;
        };
        if rasterizer.face().unwrap().tables().kern.is_none() {
            println!("Font has no kern table, skipping");
            return;
        }

        let (av, vertical) = rasterizer.kerning('A', 'V');
        assert!(av < 0, "expected a negative A/V pair, got {av}");
        assert_eq!(vertical, 0);
        // Unmapped characters never kern
        assert_eq!(rasterizer.kerning('A', '\u{10FFFD}'), (0, 0));

        rasterizer.set_pixel_size(64, 64, 0.78125).unwrap();
        let (av_large, _) = rasterizer.kerning('A', 'V');
        assert!((av_large - av * 2).abs() <= 1);
    }

    #[test]
    fn test_pixel_size_uses_size_ratio() {
        let mut rasterizer = SwashRasterizer::new();
        rasterizer.set_pixel_size(32, 32, 0.8).unwrap();
        assert_eq!(rasterizer.em_size(), 25.0);
        assert!(rasterizer.set_pixel_size(32, 0, 0.8).is_err());
    }
}
