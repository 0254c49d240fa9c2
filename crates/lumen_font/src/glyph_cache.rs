//! LRU cache of rasterized glyph bitmaps
//!
//! Sits between the rasterizer and the font texture. The pool is a fixed
//! list of slots created up front; each slot owns one bitmap of the cell's
//! dimensions that is cleared and reused whenever a different glyph is
//! evicted into it. Lookups go through a hash map keyed by [`GlyphKey`],
//! eviction is a linear scan for the smallest usage stamp.

use crate::bitmap::{GlyphBitmap, ScaleFilter};
use crate::config::{HintParams, SmoothAmount, SmoothMethod};
use crate::key::{clamp_glyph_size, GlyphKey, GlyphSize};
use crate::rasterizer::{f26dot6_to_px, GlyphRasterizer, RenderedGlyph};
use crate::{Result, TextError};
use rustc_hash::FxHashMap;

/// One reusable entry of the glyph cache pool
#[derive(Debug)]
pub struct CacheSlot {
    bitmap: GlyphBitmap,
    codepoint: Option<char>,
    glyph_size: GlyphSize,
    horizontal_advance: i32,
    width: u32,
    height: u32,
    offset_x: i32,
    offset_y: i32,
    /// Usage stamp; 0 means never used
    usage: u64,
}

impl CacheSlot {
    fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            bitmap: GlyphBitmap::new(width, height)?,
            codepoint: None,
            glyph_size: GlyphSize::default(),
            horizontal_advance: 0,
            width: 0,
            height: 0,
            offset_x: 0,
            offset_y: 0,
            usage: 0,
        })
    }

    fn reset(&mut self) {
        self.bitmap.clear();
        self.codepoint = None;
        self.glyph_size = GlyphSize::default();
        self.horizontal_advance = 0;
        self.width = 0;
        self.height = 0;
        self.offset_x = 0;
        self.offset_y = 0;
        self.usage = 0;
    }

    /// Key of the glyph currently held, if any
    pub fn key(&self) -> Option<GlyphKey> {
        self.codepoint.map(|ch| GlyphKey::new(ch, self.glyph_size))
    }

    pub fn codepoint(&self) -> Option<char> {
        self.codepoint
    }

    pub fn glyph_size(&self) -> GlyphSize {
        self.glyph_size
    }

    pub fn usage(&self) -> u64 {
        self.usage
    }

    pub fn bitmap(&self) -> &GlyphBitmap {
        &self.bitmap
    }
}

/// Borrowed view of a cached glyph
#[derive(Debug, Clone, Copy)]
pub struct CachedGlyph<'a> {
    /// Coverage, glyph ink at the top-left corner, zero elsewhere
    pub bitmap: &'a GlyphBitmap,
    /// Pen advance in pixels
    pub horizontal_advance: i32,
    /// Ink width in pixels
    pub width: u32,
    /// Ink height in pixels
    pub height: u32,
    /// Horizontal offset of the ink from the pen position
    pub offset_x: i32,
    /// Vertical offset of the ink from the top of the cell
    pub offset_y: i32,
}

/// Fixed-capacity LRU cache of glyph bitmaps
pub struct GlyphCache {
    rasterizer: Box<dyn GlyphRasterizer>,
    slots: Vec<CacheSlot>,
    table: FxHashMap<GlyphKey, usize>,
    /// Last usage stamp handed out
    usage: u64,
    bitmap_width: u32,
    bitmap_height: u32,
    smooth_method: SmoothMethod,
    smooth_amount: SmoothAmount,
    size_ratio: f32,
    /// Oversized render target for supersampling
    scale_bitmap: Option<GlyphBitmap>,
    /// Pixel size last pushed to the rasterizer
    pixel_size: Option<(u32, u32, f32)>,
}

impl GlyphCache {
    /// Create a cache with `slot_count` bitmaps of `bitmap_width × bitmap_height`
    pub fn new(
        rasterizer: Box<dyn GlyphRasterizer>,
        slot_count: usize,
        bitmap_width: u32,
        bitmap_height: u32,
        smooth_method: SmoothMethod,
        smooth_amount: SmoothAmount,
        size_ratio: f32,
    ) -> Result<Self> {
        if slot_count == 0 {
            return Err(TextError::InvalidConfig(
                "glyph cache needs at least one slot".to_string(),
            ));
        }

        let slots = (0..slot_count)
            .map(|_| CacheSlot::new(bitmap_width, bitmap_height))
            .collect::<Result<Vec<_>>>()?;

        let factor = smooth_amount.supersample_factor();
        let scale_bitmap = if smooth_method == SmoothMethod::Supersample && factor > 1 {
            Some(GlyphBitmap::new(bitmap_width * factor, bitmap_height * factor)?)
        } else {
            None
        };

        tracing::debug!(
            "Created glyph cache: {} slots of {}x{}, smoothing {:?} {:?}",
            slot_count,
            bitmap_width,
            bitmap_height,
            smooth_method,
            smooth_amount
        );

        Ok(Self {
            rasterizer,
            slots,
            table: FxHashMap::default(),
            usage: 0,
            bitmap_width,
            bitmap_height,
            smooth_method,
            smooth_amount,
            size_ratio,
            scale_bitmap,
            pixel_size: None,
        })
    }

    /// Make sure `(ch, glyph_size)` is resident, rasterizing it on a miss
    pub fn pre_cache_glyph(
        &mut self,
        ch: char,
        glyph_size: GlyphSize,
        hint: HintParams,
    ) -> Result<()> {
        self.resident_slot(ch, glyph_size, hint).map(|_| ())
    }

    /// Bitmap and metrics for `(ch, glyph_size)`, rasterizing it on a miss
    pub fn get_glyph(
        &mut self,
        ch: char,
        glyph_size: GlyphSize,
        hint: HintParams,
    ) -> Result<CachedGlyph<'_>> {
        let index = self.resident_slot(ch, glyph_size, hint)?;
        let slot = &self.slots[index];
        Ok(CachedGlyph {
            bitmap: &slot.bitmap,
            horizontal_advance: slot.horizontal_advance,
            width: slot.width,
            height: slot.height,
            offset_x: slot.offset_x,
            offset_y: slot.offset_y,
        })
    }

    /// Evict `(ch, glyph_size)` if resident. Returns whether anything was evicted.
    pub fn uncache_glyph(&mut self, ch: char, glyph_size: GlyphSize) -> bool {
        let key = self.key(ch, glyph_size);
        match self.table.remove(&key) {
            Some(index) => {
                self.slots[index].reset();
                true
            }
            None => false,
        }
    }

    /// Whether `(ch, glyph_size)` is resident
    pub fn glyph_cached(&self, ch: char, glyph_size: GlyphSize) -> bool {
        self.table.contains_key(&self.key(ch, glyph_size))
    }

    /// Drop every cached glyph, keeping the slot pool
    pub fn clear(&mut self) {
        self.table.clear();
        for slot in &mut self.slots {
            slot.reset();
        }
        self.usage = 0;
    }

    /// Change the em-to-cell ratio; cached glyphs rendered at the old ratio
    /// are dropped.
    pub fn set_size_ratio(&mut self, size_ratio: f32) {
        if self.size_ratio != size_ratio {
            self.size_ratio = size_ratio;
            self.pixel_size = None;
            self.clear();
        }
    }

    pub fn size_ratio(&self) -> f32 {
        self.size_ratio
    }

    /// Kerning between two characters rendered at `glyph_size`, in pixels.
    ///
    /// Queried at the clamped size, never the supersampled one.
    pub fn kerning(&mut self, left: char, right: char, glyph_size: GlyphSize) -> Result<(i32, i32)> {
        let size = clamp_glyph_size(glyph_size, self.bitmap_width, self.bitmap_height);
        self.configure_pixel_size(size.width, size.height)?;
        let (x, y) = self.rasterizer.kerning(left, right);
        Ok((f26dot6_to_px(x), f26dot6_to_px(y)))
    }

    pub fn ascender_to_height_ratio(&self) -> f32 {
        self.rasterizer.ascender_to_height_ratio()
    }

    pub fn is_monospaced(&self) -> bool {
        self.rasterizer.is_monospaced()
    }

    pub fn slots(&self) -> &[CacheSlot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn bitmap_width(&self) -> u32 {
        self.bitmap_width
    }

    pub fn bitmap_height(&self) -> u32 {
        self.bitmap_height
    }

    pub fn smooth_method(&self) -> SmoothMethod {
        self.smooth_method
    }

    pub fn smooth_amount(&self) -> SmoothAmount {
        self.smooth_amount
    }

    fn key(&self, ch: char, glyph_size: GlyphSize) -> GlyphKey {
        GlyphKey::new(
            ch,
            clamp_glyph_size(glyph_size, self.bitmap_width, self.bitmap_height),
        )
    }

    fn next_usage(&mut self) -> u64 {
        self.usage += 1;
        self.usage
    }

    /// Slot index holding `(ch, glyph_size)` after making it resident
    fn resident_slot(&mut self, ch: char, glyph_size: GlyphSize, hint: HintParams) -> Result<usize> {
        let key = self.key(ch, glyph_size);

        if let Some(&index) = self.table.get(&key) {
            let usage = self.next_usage();
            self.slots[index].usage = usage;
            return Ok(index);
        }

        let index = self.lru_slot().ok_or(TextError::NoEvictableSlot)?;
        if let Some(old) = self.slots[index].key() {
            tracing::trace!("Glyph cache evicting {:?} from slot {}", old, index);
            self.table.remove(&old);
        }
        self.slots[index].reset();

        if let Err(e) = self.rasterize_into(index, key, hint) {
            tracing::warn!("Failed to rasterize {:?}: {}", key.codepoint, e);
            self.slots[index].reset();
            return Err(e);
        }

        let usage = self.next_usage();
        let slot = &mut self.slots[index];
        slot.usage = usage;
        slot.codepoint = Some(key.codepoint);
        slot.glyph_size = key.size;
        self.table.insert(key, index);
        Ok(index)
    }

    /// Never-used slots win outright; otherwise the smallest stamp, first in
    /// list order on ties.
    fn lru_slot(&self) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.usage == 0 {
                return Some(index);
            }
            if best.map_or(true, |(_, usage)| slot.usage < usage) {
                best = Some((index, slot.usage));
            }
        }
        best.map(|(index, _)| index)
    }

    fn configure_pixel_size(&mut self, width: u32, height: u32) -> Result<()> {
        let wanted = (width, height, self.size_ratio);
        if self.pixel_size != Some(wanted) {
            self.rasterizer
                .set_pixel_size(width, height, self.size_ratio)?;
            self.pixel_size = Some(wanted);
        }
        Ok(())
    }

    fn rasterize_into(&mut self, index: usize, key: GlyphKey, hint: HintParams) -> Result<()> {
        let factor = if self.scale_bitmap.is_some() {
            self.smooth_amount.supersample_factor()
        } else {
            1
        };
        self.configure_pixel_size(key.size.width * factor, key.size.height * factor)?;

        let glyph = self.rasterizer.render_glyph(key.codepoint, hint)?;
        let ascender = self.rasterizer.ascender();

        let max_width = self.bitmap_width * factor;
        let max_height = self.bitmap_height * factor;
        if glyph.width > max_width || glyph.height > max_height {
            tracing::warn!(
                "Glyph {:?} is {}x{}, truncating to {}x{}",
                key.codepoint,
                glyph.width,
                glyph.height,
                max_width,
                max_height
            );
        }

        let slot = &mut self.slots[index];
        let (width, height) = match self.scale_bitmap.as_mut() {
            Some(scratch) => {
                scratch.clear();
                let (w, h) = scratch.copy_from(&glyph.coverage, glyph.width, glyph.height);
                scratch.scale_into(&mut slot.bitmap, ScaleFilter::Bilinear);
                (w.div_ceil(factor), h.div_ceil(factor))
            }
            None => slot
                .bitmap
                .copy_from(&glyph.coverage, glyph.width, glyph.height),
        };

        let (width, height) = if self.smooth_method == SmoothMethod::Blur {
            let iterations = self.smooth_amount.blur_iterations();
            slot.bitmap.blur(iterations);
            (
                (width + iterations).min(self.bitmap_width),
                (height + iterations).min(self.bitmap_height),
            )
        } else {
            (width, height)
        };

        store_metrics(slot, &glyph, ascender, factor, width, height);
        Ok(())
    }
}

/// Convert rasterizer metrics (26.6, possibly supersampled) to cell pixels
fn store_metrics(
    slot: &mut CacheSlot,
    glyph: &RenderedGlyph,
    ascender: i32,
    factor: u32,
    width: u32,
    height: u32,
) {
    let factor = factor as i32;
    slot.width = width;
    slot.height = height;
    slot.horizontal_advance = f26dot6_to_px(glyph.advance / factor);
    slot.offset_x = f26dot6_to_px(glyph.bearing_x / factor);
    slot.offset_y = f26dot6_to_px((ascender - glyph.bearing_y) / factor);
}

impl std::fmt::Debug for GlyphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphCache")
            .field("slots", &self.slots.len())
            .field("resident", &self.table.len())
            .field("bitmap_width", &self.bitmap_width)
            .field("bitmap_height", &self.bitmap_height)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}
