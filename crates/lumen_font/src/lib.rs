//! Glyph caching and font texture atlas for real-time text rendering
//!
//! This crate provides:
//! - An outline rasterizer adapter (swash + ttf-parser)
//! - A small LRU cache of rasterized glyph bitmaps
//! - A fixed-cell font texture atlas with LRU eviction
//! - Texture coordinates and metrics for quad generation and text measurement
//! - A thread-safe font façade tying it all together
//!
//! Data flows leaf first: [`GlyphRasterizer`] → [`GlyphCache`] → [`FontTexture`] → [`Font`].

pub mod bitmap;
pub mod config;
pub mod font;
pub mod font_texture;
pub mod glyph_cache;
pub mod key;
pub mod rasterizer;
pub mod swash_rasterizer;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bitmap::{GlyphBitmap, ScaleFilter};
pub use config::{
    FontTextureConfig, HintBehavior, HintParams, HintStyle, SizeBehavior, SmoothAmount,
    SmoothMethod, DEFAULT_SIZE_RATIO,
};
pub use font::{ClipRect, Font, SharedFont, TextDrawContext, TextQuad};
pub use font_texture::{CacheUpdate, FontTexture, TextureCoord, TextureSlot};
pub use glyph_cache::{CacheSlot, CachedGlyph, GlyphCache};
pub use key::{clamp_glyph_size, GlyphKey, GlyphSize};
pub use rasterizer::{GlyphRasterizer, RenderedGlyph};
pub use swash_rasterizer::SwashRasterizer;

use thiserror::Error;

/// Font caching and rasterization errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid font data")]
    InvalidFontData,

    #[error("No font face loaded")]
    FontNotLoaded,

    #[error("Failed to rasterize {codepoint:?}: {reason}")]
    Rasterization { codepoint: char, reason: String },

    #[error("Every slot is pinned, nothing can be evicted")]
    NoEvictableSlot,

    #[error("Font state lock was poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, TextError>;
