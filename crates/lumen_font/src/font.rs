//! Thread-safe font façade
//!
//! [`Font`] owns one [`FontTexture`] behind a mutex so a game thread can
//! queue text while a render thread builds quads and uploads the atlas.
//! Every public entry point takes the lock exactly once; the helpers on
//! [`FontState`] work on the already locked state.

use crate::config::{FontTextureConfig, HintParams, SizeBehavior, DEFAULT_SIZE_RATIO};
use crate::font_texture::FontTexture;
use crate::key::GlyphSize;
use crate::rasterizer::GlyphRasterizer;
use crate::swash_rasterizer::SwashRasterizer;
use crate::{Result, TextError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Tab width in spaces
const TAB_CHAR_COUNT: f32 = 4.0;

/// Width of a space relative to the font size, for proportional layout
const SPACE_SIZE: f32 = 0.5;

/// Padding around the text inside a frame quad, in pixels
const FRAME_PADDING: [f32; 2] = [12.0, 6.0];

/// A font shared between threads
pub type SharedFont = Arc<Font>;

/// Screen-space clip rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ClipRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Per-draw text settings
#[derive(Debug, Clone, PartialEq)]
pub struct TextDrawContext {
    /// Logical font size in pixels
    pub size: [f32; 2],
    /// Glyph size used when the font re-renders per size
    pub request_size: GlyphSize,
    /// Use glyph advances instead of a fixed cell advance
    pub proportional: bool,
    pub width_scale: f32,
    pub kerning_enabled: bool,
    /// Extra spacing between characters, in pixels
    pub tracking: f32,
    /// Extra spacing between lines, relative to the font height
    pub line_spacing: f32,
    pub clip: Option<ClipRect>,
    /// Snap the text origin to whole pixels
    pub pixel_aligned: bool,
    /// Draw a gradient frame behind the text
    pub framed: bool,
    /// RGBA
    pub color: [u8; 4],
}

impl Default for TextDrawContext {
    fn default() -> Self {
        Self {
            size: [16.0, 16.0],
            request_size: GlyphSize::DEFAULT,
            proportional: true,
            width_scale: 1.0,
            kerning_enabled: true,
            tracking: 0.0,
            line_spacing: 0.0,
            clip: None,
            pixel_aligned: true,
            framed: false,
            color: [255, 255, 255, 255],
        }
    }
}

impl TextDrawContext {
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = [width, height];
        self
    }

    pub fn with_clip(mut self, clip: ClipRect) -> Self {
        self.clip = Some(clip);
        self
    }
}

/// One textured quad, corners in top-left, top-right, bottom-right,
/// bottom-left order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextQuad {
    pub positions: [[f32; 2]; 4],
    pub uvs: [[f32; 2]; 4],
    pub color: [u8; 4],
}

impl TextQuad {
    fn new(rect: [f32; 4], uv: [f32; 4], color: [u8; 4]) -> Self {
        let [x0, y0, x1, y1] = rect;
        let [u0, v0, u1, v1] = uv;
        Self {
            positions: [[x0, y0], [x1, y0], [x1, y1], [x0, y1]],
            uvs: [[u0, v0], [u1, v0], [u1, v1], [u0, v1]],
            color,
        }
    }
}

/// Texel-to-pixel scale for one draw
#[derive(Debug, Clone, Copy)]
struct ScaleInfo {
    scale: [f32; 2],
}

/// Mutable font state, only reachable through the lock
struct FontState {
    texture: Option<FontTexture>,
    /// The atlas changed since the last upload
    texture_dirty: bool,
    /// Number of uploads since load
    texture_version: u64,
    size_behavior: SizeBehavior,
    hint: HintParams,
    size_ratio: f32,
    monospaced: bool,
}

/// A loaded font face with its glyph atlas
pub struct Font {
    name: String,
    state: Mutex<FontState>,
}

impl Font {
    /// Create an unloaded font
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(FontState {
                texture: None,
                texture_dirty: false,
                texture_version: 0,
                size_behavior: SizeBehavior::default(),
                hint: HintParams::default(),
                size_ratio: DEFAULT_SIZE_RATIO,
                monospaced: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the atlas for the face in `data` and fill it with printable ASCII
    pub fn load(
        &self,
        data: Vec<u8>,
        config: &FontTextureConfig,
        rasterizer: Box<dyn GlyphRasterizer>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        state.free();

        let texture = FontTexture::create_from_memory(data, rasterizer, config)?;
        state.monospaced = texture.is_monospaced();
        state.size_ratio = config.size_ratio;
        state.texture = Some(texture);
        state.texture_dirty = false;

        if let Err(e) = state.init_cache() {
            tracing::warn!("Font '{}': incomplete glyph pre-cache: {}", self.name, e);
        }
        tracing::debug!("Loaded font '{}'", self.name);
        Ok(())
    }

    /// [`Font::load`] with the swash rasterizer
    pub fn load_swash(&self, data: Vec<u8>, config: &FontTextureConfig) -> Result<()> {
        self.load(data, config, Box::new(SwashRasterizer::new()))
    }

    /// Drop the atlas and face
    pub fn free(&self) {
        if let Ok(mut state) = self.lock() {
            state.free();
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().map(|state| state.texture.is_some()).unwrap_or(false)
    }

    pub fn size_behavior(&self) -> SizeBehavior {
        self.lock()
            .map(|state| state.size_behavior)
            .unwrap_or_default()
    }

    pub fn set_size_behavior(&self, size_behavior: SizeBehavior) {
        if let Ok(mut state) = self.lock() {
            state.size_behavior = size_behavior;
        }
    }

    pub fn set_hint_params(&self, hint: HintParams) {
        if let Ok(mut state) = self.lock() {
            state.hint = hint;
        }
    }

    pub fn size_ratio(&self) -> f32 {
        self.lock()
            .map(|state| state.size_ratio)
            .unwrap_or(DEFAULT_SIZE_RATIO)
    }

    /// Make the glyphs of `text` resident.
    ///
    /// Returns whether the atlas has changes that were not uploaded yet.
    /// Glyphs that fail to rasterize are skipped; the first failure is
    /// returned after the rest of the text has been cached.
    pub fn prepare(&self, text: &str, glyph_size: GlyphSize) -> Result<bool> {
        self.lock()?.prepare(text, glyph_size)
    }

    /// Pre-cache `chars` at `glyph_size`
    pub fn add_chars_to_font_texture(&self, chars: &str, glyph_size: GlyphSize) -> Result<bool> {
        self.prepare(chars, glyph_size)
    }

    /// Run `f` on the atlas under the lock, typically to upload the buffer
    pub fn with_texture<R>(&self, f: impl FnOnce(&FontTexture) -> R) -> Result<R> {
        let state = self.lock()?;
        let texture = state.texture.as_ref().ok_or(TextError::FontNotLoaded)?;
        Ok(f(texture))
    }

    /// Record that the GPU copy of the atlas is current
    pub fn mark_texture_uploaded(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.texture.is_none() {
            return Err(TextError::FontNotLoaded);
        }
        state.texture_dirty = false;
        state.texture_version += 1;
        Ok(())
    }

    pub fn is_texture_dirty(&self) -> bool {
        self.lock().map(|state| state.texture_dirty).unwrap_or(false)
    }

    /// Number of uploads since the font was loaded
    pub fn texture_version(&self) -> u64 {
        self.lock().map(|state| state.texture_version).unwrap_or(0)
    }

    /// Size of `text` in pixels; `[0, 0]` for an unloaded font
    pub fn text_size(&self, text: &str, ctx: &TextDrawContext) -> [f32; 2] {
        let Ok(mut state) = self.lock() else {
            return [0.0, 0.0];
        };
        if state.texture.is_none() {
            return [0.0, 0.0];
        }
        state.prepare_for_layout(text, ctx.request_size);
        state.measure(text, ctx)
    }

    /// Quads for `text` with its top-left corner at `(x, y)`
    pub fn create_quads(
        &self,
        x: f32,
        y: f32,
        text: &str,
        ctx: &TextDrawContext,
    ) -> Result<Vec<TextQuad>> {
        let mut state = self.lock()?;
        if state.texture.is_none() {
            return Err(TextError::FontNotLoaded);
        }
        state.prepare_for_layout(text, ctx.request_size);
        state.build_quads(x, y, text, ctx)
    }

    /// Kerning between two characters, in pixels
    pub fn kerning(&self, left: char, right: char, ctx: &TextDrawContext) -> [f32; 2] {
        let Ok(mut state) = self.lock() else {
            return [0.0, 0.0];
        };
        let glyph_size = state.glyph_size_for(ctx.request_size);
        let Some(scale) = state.texture.as_ref().map(|texture| state.scale_info(texture, ctx)) else {
            return [0.0, 0.0];
        };
        let Some(texture) = state.texture.as_mut() else {
            return [0.0, 0.0];
        };
        match texture.kerning(left, right, glyph_size) {
            Ok([x, y]) => [x * scale.scale[0], y * scale.scale[0]],
            Err(e) => {
                tracing::debug!("No kerning for {:?}{:?}: {}", left, right, e);
                [0.0, 0.0]
            }
        }
    }

    pub fn ascender(&self, ctx: &TextDrawContext) -> f32 {
        self.lock()
            .ok()
            .and_then(|state| {
                state
                    .texture
                    .as_ref()
                    .map(|texture| ctx.size[1] * texture.ascender_to_height_ratio())
            })
            .unwrap_or(0.0)
    }

    /// Distance from the top of the text to the baseline, in pixels
    pub fn baseline(&self, ctx: &TextDrawContext) -> f32 {
        let Ok(state) = self.lock() else {
            return 0.0;
        };
        let Some(texture) = state.texture.as_ref() else {
            return 0.0;
        };
        let scale = state.scale_info(texture, ctx).scale[1];
        // Matches the one extra texel of height in texture coordinates
        ((texture.cell_height() as f32 * state.size_ratio).round() + 1.0) * scale
    }

    /// `[min_u, min_v, max_u, max_v]` of the frame gradient
    pub fn gradient_texture_coord(&self) -> Option<[f32; 4]> {
        let state = self.lock().ok()?;
        state.gradient_texture_coord()
    }

    pub fn is_monospaced(&self) -> bool {
        self.lock().map(|state| state.monospaced).unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FontState>> {
        self.state.lock().map_err(|_| TextError::Poisoned)
    }
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl FontState {
    fn free(&mut self) {
        self.texture = None;
        self.texture_dirty = false;
        self.texture_version = 0;
    }

    /// Reserve the gradient and pre-cache the printable ASCII range
    fn init_cache(&mut self) -> Result<()> {
        let texture = self.texture.as_mut().ok_or(TextError::FontNotLoaded)?;
        texture.create_gradient_slot()?;
        self.texture_dirty = true;

        let printable: String = (' '..='~').collect();
        self.prepare(&printable, GlyphSize::DEFAULT).map(|_| ())
    }

    fn glyph_size_for(&self, requested: GlyphSize) -> GlyphSize {
        match self.size_behavior {
            SizeBehavior::Rerender => requested,
            SizeBehavior::Scale => GlyphSize::DEFAULT,
        }
    }

    fn prepare(&mut self, text: &str, glyph_size: GlyphSize) -> Result<bool> {
        let glyph_size = self.glyph_size_for(glyph_size);
        let (size_ratio, hint) = (self.size_ratio, self.hint);
        let texture = self.texture.as_mut().ok_or(TextError::FontNotLoaded)?;

        let mut first_error = None;
        let mut buf = [0u8; 4];
        for ch in text.chars().filter(|ch| !ch.is_control()) {
            match texture.pre_cache_string(ch.encode_utf8(&mut buf), size_ratio, glyph_size, hint) {
                Ok(update) => self.texture_dirty |= update.is_updated(),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(self.texture_dirty),
        }
    }

    /// Layout never fails on a missing glyph; it is drawn as an empty advance
    fn prepare_for_layout(&mut self, text: &str, glyph_size: GlyphSize) {
        if let Err(e) = self.prepare(text, glyph_size) {
            tracing::debug!("Laying out text with missing glyphs: {}", e);
        }
    }

    fn scale_info(&self, texture: &FontTexture, ctx: &TextDrawContext) -> ScaleInfo {
        let restoring = DEFAULT_SIZE_RATIO / self.size_ratio;
        let size = [ctx.size[0] * restoring, ctx.size[1] * restoring];

        let scale = if ctx.proportional {
            [
                size[0] / texture.cell_width() as f32 * ctx.width_scale,
                size[1] / texture.cell_height() as f32,
            ]
        } else {
            [
                size[0] / 16.0 * ctx.width_scale,
                size[1] * ctx.width_scale / 16.0,
            ]
        };
        ScaleInfo { scale }
    }

    fn tab_advance(ctx: &TextDrawContext) -> f32 {
        if ctx.proportional {
            TAB_CHAR_COUNT * ctx.size[0] * SPACE_SIZE
        } else {
            TAB_CHAR_COUNT * ctx.size[0] * ctx.width_scale
        }
    }

    /// Pen movement for `ch` followed by `next`: advance, kerning, tracking
    fn pen_advance(
        texture: &mut FontTexture,
        glyph_size: GlyphSize,
        ch: char,
        next: Option<char>,
        ctx: &TextDrawContext,
        scale: ScaleInfo,
    ) -> f32 {
        let advance = if ctx.proportional {
            texture.horizontal_advance(ch, glyph_size) as f32 * scale.scale[0]
        } else {
            ctx.size[0] * ctx.width_scale
        };

        let Some(next) = next else {
            return advance;
        };
        let kerning = if ctx.kerning_enabled {
            texture
                .kerning(ch, next, glyph_size)
                .map_or(0.0, |[x, _]| x * scale.scale[0])
        } else {
            0.0
        };
        advance + kerning + ctx.tracking
    }

    fn measure(&mut self, text: &str, ctx: &TextDrawContext) -> [f32; 2] {
        let glyph_size = self.glyph_size_for(ctx.request_size);
        let Some(scale) = self.texture.as_ref().map(|texture| self.scale_info(texture, ctx)) else {
            return [0.0, 0.0];
        };
        let Some(texture) = self.texture.as_mut() else {
            return [0.0, 0.0];
        };
        let line_height = ctx.size[1] * (1.0 + ctx.line_spacing);

        let mut max_width: f32 = 0.0;
        let mut char_x = 0.0;
        let mut char_y = ctx.size[1];
        let mut max_height = char_y;

        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\n' => {
                    max_width = max_width.max(char_x);
                    char_x = 0.0;
                    char_y += line_height;
                    max_height = max_height.max(char_y);
                }
                '\r' => {
                    max_width = max_width.max(char_x);
                    char_x = 0.0;
                }
                '\t' => char_x += Self::tab_advance(ctx),
                _ => {
                    char_x +=
                        Self::pen_advance(texture, glyph_size, ch, chars.peek().copied(), ctx, scale)
                }
            }
        }

        [max_width.max(char_x), max_height]
    }

    fn gradient_texture_coord(&self) -> Option<[f32; 4]> {
        let texture = self.texture.as_ref()?;
        let slot = texture.gradient_slot()?;
        let inv_width = 1.0 / texture.width() as f32;
        let inv_height = 1.0 / texture.height() as f32;
        let [u, v] = slot.uv;

        // Deflate by one texel so bilinear filtering stays inside the ramp
        Some([
            u + inv_width,
            v + inv_height,
            u + slot.width.saturating_sub(1) as f32 * inv_width,
            v + slot.height.saturating_sub(1) as f32 * inv_height,
        ])
    }

    fn build_quads(
        &mut self,
        x: f32,
        y: f32,
        text: &str,
        ctx: &TextDrawContext,
    ) -> Result<Vec<TextQuad>> {
        let texture = self.texture.as_ref().ok_or(TextError::FontNotLoaded)?;
        let scale = self.scale_info(texture, ctx);
        let glyph_size = self.glyph_size_for(ctx.request_size);
        let line_height = ctx.size[1] * (1.0 + ctx.line_spacing);

        let mut base = [x, y];
        if ctx.pixel_aligned {
            base = [x.floor(), y.floor()];
            // Average two texels when drawing at half resolution or less
            if scale.scale[0] < 0.9 {
                base[0] += 0.5;
            }
            if scale.scale[1] < 0.9 {
                base[1] += 0.25;
            }
        }

        let mut quads = Vec::with_capacity(text.len() + usize::from(ctx.framed));

        if ctx.framed {
            if let Some(frame) = self.frame_quad(base, text, ctx) {
                quads.push(frame);
            }
        }

        let texture = self.texture.as_mut().ok_or(TextError::FontNotLoaded)?;

        let mut char_x = base[0];
        let mut char_y = base[1];
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\n' => {
                    char_x = base[0];
                    char_y += line_height;
                    continue;
                }
                '\r' => {
                    char_x = base[0];
                    continue;
                }
                '\t' => {
                    char_x += Self::tab_advance(ctx);
                    continue;
                }
                _ => {}
            }

            let pen = Self::pen_advance(texture, glyph_size, ch, chars.peek().copied(), ctx, scale);
            let slot = texture
                .char_slot(ch, glyph_size)
                .filter(|slot| slot.width > 0 && slot.height > 0);
            let Some(slot) = slot else {
                char_x += pen;
                continue;
            };

            let coord = texture.texture_coord(slot, glyph_size);
            let px = char_x + coord.offset_x as f32 * scale.scale[0];
            let py = char_y + coord.offset_y as f32 * scale.scale[1];
            let rect = [
                px,
                py,
                px + coord.char_size_x as f32 * scale.scale[0],
                py + coord.char_size_y as f32 * scale.scale[1],
            ];

            let clipped = match ctx.clip {
                Some(clip) => clip_rect(rect, coord.uv, clip),
                None => Some((rect, coord.uv)),
            };
            if let Some((rect, uv)) = clipped {
                quads.push(TextQuad::new(rect, uv, ctx.color));
            }
            char_x += pen;
        }

        Ok(quads)
    }

    fn frame_quad(&mut self, base: [f32; 2], text: &str, ctx: &TextDrawContext) -> Option<TextQuad> {
        let [min_u, _, _, max_v] = self.gradient_texture_coord()?;
        let size = self.measure(text, ctx);

        let mut rect = [
            base[0] - FRAME_PADDING[0],
            base[1] - FRAME_PADDING[1],
            base[0] + size[0] + FRAME_PADDING[0],
            base[1] + size[1] + FRAME_PADDING[1],
        ];
        if let Some(clip) = ctx.clip {
            if rect[0] >= clip.right()
                || rect[1] >= clip.bottom()
                || rect[2] < clip.x
                || rect[3] < clip.y
            {
                return None;
            }
            rect = [
                rect[0].max(clip.x),
                rect[1].max(clip.y),
                rect[2].min(clip.right()),
                rect[3].min(clip.bottom()),
            ];
        }

        // The whole frame samples a single texel of the ramp
        let uv = [min_u, max_v, min_u, max_v];
        Some(TextQuad::new(rect, uv, [255, 255, 255, 255]))
    }
}

/// Clip a glyph quad, moving its UVs by the same fraction as its edges
fn clip_rect(rect: [f32; 4], uv: [f32; 4], clip: ClipRect) -> Option<([f32; 4], [f32; 4])> {
    let [px, py, pr, pb] = rect;
    if px >= clip.right() || py >= clip.bottom() || pr < clip.x || pb < clip.y {
        return None;
    }
    let (width, height) = (pr - px, pb - py);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }

    let clipped = [
        px.max(clip.x),
        py.max(clip.y),
        pr.min(clip.right()),
        pb.min(clip.bottom()),
    ];
    let tex_width = uv[2] - uv[0];
    let tex_height = uv[3] - uv[1];
    let uv = [
        uv[0] + tex_width * (clipped[0] - px) / width,
        uv[1] + tex_height * (clipped[1] - py) / height,
        uv[2] + tex_width * (clipped[2] - pr) / width,
        uv[3] + tex_height * (clipped[3] - pb) / height,
    ];
    Some((clipped, uv))
}
