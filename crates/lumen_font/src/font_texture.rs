//! Font texture atlas
//!
//! A single-channel pixel buffer split into a fixed grid of equally sized
//! cells. Each cell holds at most one glyph; cells are handed out and
//! reclaimed in least-recently-used order. Glyph bitmaps come from the
//! embedded [`GlyphCache`], which in turn drives the rasterizer.
//!
//! Cell 0 can be reserved for a vertical gradient used to draw text frames.

use crate::config::{FontTextureConfig, HintParams, SmoothAmount, SmoothMethod};
use crate::glyph_cache::GlyphCache;
use crate::key::{clamp_glyph_size, GlyphKey, GlyphSize};
use crate::rasterizer::GlyphRasterizer;
use crate::{Result, TextError};
use rustc_hash::FxHashMap;

/// Index of the cell reserved for the frame gradient
const GRADIENT_SLOT: usize = 0;

/// One cell of the atlas
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSlot {
    /// Cell index, `y * width_cells + x`
    pub index: usize,
    /// Clamped glyph size the cell was rendered for
    pub glyph_size: GlyphSize,
    /// Character held by the cell, `None` when empty
    pub codepoint: Option<char>,
    /// Ink width in texels
    pub width: u32,
    /// Ink height in texels
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Pen advance in texels
    pub horizontal_advance: i32,
    /// Normalized top-left of the cell, half a texel in
    pub uv: [f32; 2],
    /// Usage stamp; 0 means never used
    pub usage: u64,
    /// Excluded from eviction (gradient cell)
    pub pinned: bool,
}

impl TextureSlot {
    fn reset(&mut self) {
        self.glyph_size = GlyphSize::default();
        self.codepoint = None;
        self.width = 0;
        self.height = 0;
        self.offset_x = 0;
        self.offset_y = 0;
        self.horizontal_advance = 0;
        self.usage = 0;
        self.pinned = false;
    }

    fn key(&self) -> Option<GlyphKey> {
        self.codepoint.map(|ch| GlyphKey::new(ch, self.glyph_size))
    }
}

/// Texture coordinates and placement of one glyph, in full-cell texels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureCoord {
    /// `[u0, v0, u1, v1]`
    pub uv: [f32; 4],
    pub char_size_x: i32,
    pub char_size_y: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Outcome of a successful [`FontTexture::pre_cache_string`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    /// The buffer changed and must be uploaded again
    Updated { glyphs: usize },
    /// Every requested glyph was already resident
    Unchanged,
}

impl CacheUpdate {
    pub fn is_updated(&self) -> bool {
        matches!(self, CacheUpdate::Updated { .. })
    }
}

/// Glyph atlas backed by an 8-bit coverage buffer
pub struct FontTexture {
    width: u32,
    height: u32,
    width_cells: u32,
    height_cells: u32,
    cell_width: u32,
    cell_height: u32,
    buffer: Vec<u8>,
    slots: Vec<TextureSlot>,
    table: FxHashMap<GlyphKey, usize>,
    /// Last usage stamp handed out
    usage: u64,
    /// Bumped every time `buffer` changes
    version: u64,
    glyph_cache: GlyphCache,
}

impl FontTexture {
    /// Create an empty atlas rendering through `rasterizer`
    pub fn new(rasterizer: Box<dyn GlyphRasterizer>, config: &FontTextureConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(TextError::InvalidConfig(format!(
                "font texture size {}x{} has a zero dimension",
                config.width, config.height
            )));
        }
        if config.cell_count() == 0 {
            return Err(TextError::InvalidConfig(format!(
                "font texture grid {}x{} has no cells",
                config.width_cells, config.height_cells
            )));
        }

        let cell_width = config.cell_width();
        let cell_height = config.cell_height();
        if cell_width == 0 || cell_height == 0 {
            return Err(TextError::InvalidConfig(format!(
                "{}x{} cells do not fit a {}x{} texture",
                config.width_cells, config.height_cells, config.width, config.height
            )));
        }

        let glyph_cache = GlyphCache::new(
            rasterizer,
            config.glyph_cache_slots,
            cell_width,
            cell_height,
            config.smooth_method,
            config.smooth_amount,
            config.size_ratio,
        )?;

        let inv_width = 1.0 / config.width as f32;
        let inv_height = 1.0 / config.height as f32;
        let slots = (0..config.cell_count())
            .map(|index| {
                let x = index as u32 % config.width_cells;
                let y = index as u32 / config.width_cells;
                TextureSlot {
                    index,
                    glyph_size: GlyphSize::default(),
                    codepoint: None,
                    width: 0,
                    height: 0,
                    offset_x: 0,
                    offset_y: 0,
                    horizontal_advance: 0,
                    uv: [
                        (x * cell_width) as f32 * inv_width + 0.5 * inv_width,
                        (y * cell_height) as f32 * inv_height + 0.5 * inv_height,
                    ],
                    usage: 0,
                    pinned: false,
                }
            })
            .collect();

        tracing::debug!(
            "Created font texture {}x{} with {}x{} cells of {}x{}",
            config.width,
            config.height,
            config.width_cells,
            config.height_cells,
            cell_width,
            cell_height
        );

        Ok(Self {
            width: config.width,
            height: config.height,
            width_cells: config.width_cells,
            height_cells: config.height_cells,
            cell_width,
            cell_height,
            buffer: vec![0; config.width as usize * config.height as usize],
            slots,
            table: FxHashMap::default(),
            usage: 0,
            version: 0,
            glyph_cache,
        })
    }

    /// Load a face from `data` into `rasterizer`, then create the atlas
    pub fn create_from_memory(
        data: Vec<u8>,
        mut rasterizer: Box<dyn GlyphRasterizer>,
        config: &FontTextureConfig,
    ) -> Result<Self> {
        rasterizer.load_face(data)?;
        Self::new(rasterizer, config)
    }

    /// Cell holding `(ch, glyph_size)`, if resident. Never populates.
    pub fn char_slot(&self, ch: char, glyph_size: GlyphSize) -> Option<&TextureSlot> {
        self.table
            .get(&self.key(ch, glyph_size))
            .map(|&index| &self.slots[index])
    }

    /// Make every character of `text` resident at `glyph_size`.
    ///
    /// Characters are processed in order; a later miss may evict a cell
    /// filled earlier in the same call when the grid is too small.
    pub fn pre_cache_string(
        &mut self,
        text: &str,
        size_ratio: f32,
        glyph_size: GlyphSize,
        hint: HintParams,
    ) -> Result<CacheUpdate> {
        self.glyph_cache.set_size_ratio(size_ratio);
        let size = self.clamp(glyph_size);

        let mut updated = 0;
        let mut result = Ok(());
        for ch in text.chars() {
            let key = GlyphKey::new(ch, size);
            if let Some(&index) = self.table.get(&key) {
                self.usage += 1;
                self.slots[index].usage = self.usage;
                continue;
            }

            if let Err(e) = self.update_slot(key, hint) {
                result = Err(e);
                break;
            }
            updated += 1;
        }

        if updated > 0 {
            self.version += 1;
        }
        result?;

        Ok(if updated > 0 {
            CacheUpdate::Updated { glyphs: updated }
        } else {
            CacheUpdate::Unchanged
        })
    }

    /// UV rectangle and placement for a resident cell.
    ///
    /// Glyphs rendered below the cell resolution are scaled back up, so the
    /// result is the same whichever size policy filled the cell.
    pub fn texture_coord(&self, slot: &TextureSlot, glyph_size: GlyphSize) -> TextureCoord {
        let inv_width = 1.0 / self.width as f32;
        let inv_height = 1.0 / self.height as f32;
        let [u, v] = slot.uv;
        let (scale_x, scale_y) = self.size_scale(glyph_size);

        // One extra texel on each axis for bilinear filtering
        TextureCoord {
            uv: [
                u - inv_width,
                v - inv_height,
                u + slot.width as f32 * inv_width,
                v + slot.height as f32 * inv_height,
            ],
            char_size_x: ((slot.width + 1) as f32 * scale_x).round() as i32,
            char_size_y: ((slot.height + 1) as f32 * scale_y).round() as i32,
            offset_x: (slot.offset_x as f32 * scale_x).round() as i32,
            offset_y: (slot.offset_y as f32 * scale_y).round() as i32,
        }
    }

    /// Pen advance of `ch` in full-cell texels, 0 when not resident
    pub fn horizontal_advance(&self, ch: char, glyph_size: GlyphSize) -> i32 {
        let Some(slot) = self.char_slot(ch, glyph_size) else {
            return 0;
        };
        let (scale_x, _) = self.size_scale(glyph_size);
        (slot.horizontal_advance as f32 * scale_x).round() as i32
    }

    /// Kerning between two characters in full-cell texels
    pub fn kerning(&mut self, left: char, right: char, glyph_size: GlyphSize) -> Result<[f32; 2]> {
        let size = self.clamp(glyph_size);
        let (x, y) = self.glyph_cache.kerning(left, right, size)?;
        let (scale_x, scale_y) = self.size_scale(size);
        Ok([(x as f32 * scale_x).round(), (y as f32 * scale_y).round()])
    }

    pub fn ascender_to_height_ratio(&self) -> f32 {
        self.glyph_cache.ascender_to_height_ratio()
    }

    pub fn is_monospaced(&self) -> bool {
        self.glyph_cache.is_monospaced()
    }

    /// Reserve cell 0 and fill it with a vertical 0..=255 ramp
    pub fn create_gradient_slot(&mut self) -> Result<()> {
        if self.gradient_slot().is_some() {
            return Ok(());
        }

        if let Some(old) = self.slots[GRADIENT_SLOT].key() {
            self.table.remove(&old);
        }

        // Two spare texels on the right and bottom edges of the cell
        let width = self.cell_width.saturating_sub(2).max(1);
        let height = self.cell_height.saturating_sub(2).max(1);
        let (cell_x, cell_y) = self.cell_origin(GRADIENT_SLOT);

        for row in 0..height {
            let value = (row * 255 / height.saturating_sub(1).max(1)) as u8;
            let start = ((cell_y + row) * self.width + cell_x) as usize;
            self.buffer[start..start + width as usize].fill(value);
        }

        let slot = &mut self.slots[GRADIENT_SLOT];
        slot.reset();
        slot.width = width;
        slot.height = height;
        slot.pinned = true;
        self.version += 1;

        tracing::debug!("Created gradient slot {}x{}", width, height);
        Ok(())
    }

    /// The gradient cell, once created
    pub fn gradient_slot(&self) -> Option<&TextureSlot> {
        self.slots
            .get(GRADIENT_SLOT)
            .filter(|slot| slot.pinned)
    }

    /// Collapse `glyph_size` onto the cell size where needed
    pub fn clamp(&self, glyph_size: GlyphSize) -> GlyphSize {
        clamp_glyph_size(glyph_size, self.cell_width, self.cell_height)
    }

    /// Row-major coverage, `width * height` bytes
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width_cells(&self) -> u32 {
        self.width_cells
    }

    pub fn height_cells(&self) -> u32 {
        self.height_cells
    }

    pub fn cell_width(&self) -> u32 {
        self.cell_width
    }

    pub fn cell_height(&self) -> u32 {
        self.cell_height
    }

    /// Incremented whenever the buffer contents change
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn slots(&self) -> &[TextureSlot] {
        &self.slots
    }

    /// Number of cells currently mapped to a glyph
    pub fn resident_glyphs(&self) -> usize {
        self.table.len()
    }

    pub fn size_ratio(&self) -> f32 {
        self.glyph_cache.size_ratio()
    }

    pub fn smooth_method(&self) -> SmoothMethod {
        self.glyph_cache.smooth_method()
    }

    pub fn smooth_amount(&self) -> SmoothAmount {
        self.glyph_cache.smooth_amount()
    }

    pub fn glyph_cache(&self) -> &GlyphCache {
        &self.glyph_cache
    }

    fn key(&self, ch: char, glyph_size: GlyphSize) -> GlyphKey {
        GlyphKey::new(ch, self.clamp(glyph_size))
    }

    fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        (
            (index % self.width_cells) * self.cell_width,
            (index / self.width_cells) * self.cell_height,
        )
    }

    /// Factor from a glyph rendered at `glyph_size` to full-cell texels
    fn size_scale(&self, glyph_size: GlyphSize) -> (f32, f32) {
        let size = self.clamp(glyph_size);
        (
            self.cell_width as f32 / size.width as f32,
            self.cell_height as f32 / size.height as f32,
        )
    }

    /// Same policy as the glyph cache, skipping pinned cells
    fn lru_slot(&self) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for slot in self.slots.iter().filter(|slot| !slot.pinned) {
            if slot.usage == 0 {
                return Some(slot.index);
            }
            if best.map_or(true, |(_, usage)| slot.usage < usage) {
                best = Some((slot.index, slot.usage));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Evict the LRU cell and render `key` into it
    fn update_slot(&mut self, key: GlyphKey, hint: HintParams) -> Result<()> {
        let index = self.lru_slot().ok_or(TextError::NoEvictableSlot)?;
        if let Some(old) = self.slots[index].key() {
            tracing::trace!("Font texture evicting {:?} from cell {}", old, index);
            self.table.remove(&old);
        }
        self.slots[index].reset();

        let (cell_x, cell_y) = self.cell_origin(index);
        let glyph = match self.glyph_cache.get_glyph(key.codepoint, key.size, hint) {
            Ok(glyph) => glyph,
            Err(e) => {
                tracing::warn!("Failed to cache {:?} in font texture: {}", key.codepoint, e);
                return Err(e);
            }
        };

        // The extra row and column overwrite stale texels left by the previous
        // occupant, which bilinear sampling would otherwise pick up.
        let copy_width = (glyph.width + 1).min(self.cell_width);
        let copy_height = (glyph.height + 1).min(self.cell_height);
        let (written_width, written_height) = glyph.bitmap.blit_to(
            &mut self.buffer,
            self.width,
            cell_x,
            cell_y,
            copy_width,
            copy_height,
        );
        if written_width < copy_width || written_height < copy_height {
            tracing::warn!(
                "Clamped blit of {:?} to {}x{} in cell {}",
                key.codepoint,
                written_width,
                written_height,
                index
            );
        }

        self.usage += 1;
        let slot = &mut self.slots[index];
        slot.glyph_size = key.size;
        slot.codepoint = Some(key.codepoint);
        slot.width = glyph.width.min(self.cell_width);
        slot.height = glyph.height.min(self.cell_height);
        slot.offset_x = glyph.offset_x;
        slot.offset_y = glyph.offset_y;
        slot.horizontal_advance = glyph.horizontal_advance;
        slot.usage = self.usage;
        self.table.insert(key, index);

        tracing::trace!("Cached {:?} at {:?} in cell {}", key.codepoint, key.size, index);
        Ok(())
    }
}

impl std::fmt::Debug for FontTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontTexture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("cell_width", &self.cell_width)
            .field("cell_height", &self.cell_height)
            .field("resident", &self.table.len())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
