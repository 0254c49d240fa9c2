//! Font texture configuration
//!
//! These values are normally produced by the font definition loader and
//! handed to [`FontTexture::new`](crate::FontTexture::new) as plain data.

use serde::{Deserialize, Serialize};

/// Size ratio a font is authored against.
///
/// Glyphs are rasterized at `cell_size * size_ratio` pixels per em so that
/// ascenders and descenders fit inside a cell; text sizes are restored by
/// `DEFAULT_SIZE_RATIO / size_ratio` when laying out.
pub const DEFAULT_SIZE_RATIO: f32 = 0.8;

/// Post-processing applied to freshly rasterized glyphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothMethod {
    #[default]
    None,
    /// Blur the glyph bitmap after rasterization
    Blur,
    /// Rasterize at a multiple of the cell size and scale down
    Supersample,
}

/// Strength of the smoothing method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothAmount {
    #[default]
    None,
    X2,
    X4,
}

impl SmoothAmount {
    /// Number of blur passes for [`SmoothMethod::Blur`]
    pub fn blur_iterations(self) -> u32 {
        match self {
            SmoothAmount::None => 0,
            SmoothAmount::X2 => 1,
            SmoothAmount::X4 => 2,
        }
    }

    /// Linear oversampling factor for [`SmoothMethod::Supersample`]
    pub fn supersample_factor(self) -> u32 {
        match self {
            SmoothAmount::None => 1,
            SmoothAmount::X2 => 2,
            SmoothAmount::X4 => 4,
        }
    }
}

/// How glyphs requested below the cell resolution are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBehavior {
    /// Always rasterize at cell resolution and scale the quad
    #[default]
    Scale,
    /// Rasterize at the requested size as a distinct atlas entry
    Rerender,
}

/// Hinting strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintStyle {
    #[default]
    Normal,
    Light,
}

/// Which hinter the rasterizer should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintBehavior {
    #[default]
    Default,
    NoHinting,
    AutoHint,
}

/// Hint settings forwarded to the rasterizer on every glyph render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HintParams {
    pub style: HintStyle,
    pub behavior: HintBehavior,
}

impl HintParams {
    /// Whether the outline should be grid fitted at all
    pub fn hinted(&self) -> bool {
        self.behavior != HintBehavior::NoHinting
    }
}

/// Layout of a font texture atlas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontTextureConfig {
    /// Texture width in pixels
    pub width: u32,
    /// Texture height in pixels
    pub height: u32,
    /// Number of cells along the x axis
    pub width_cells: u32,
    /// Number of cells along the y axis
    pub height_cells: u32,
    pub smooth_method: SmoothMethod,
    pub smooth_amount: SmoothAmount,
    /// Fraction of the cell height used as the em size
    pub size_ratio: f32,
    /// Number of bitmaps kept by the intermediate glyph cache
    pub glyph_cache_slots: usize,
}

impl FontTextureConfig {
    /// Width of one cell in pixels
    pub fn cell_width(&self) -> u32 {
        if self.width_cells == 0 {
            0
        } else {
            self.width / self.width_cells
        }
    }

    /// Height of one cell in pixels
    pub fn cell_height(&self) -> u32 {
        if self.height_cells == 0 {
            0
        } else {
            self.height / self.height_cells
        }
    }

    /// Total number of cells in the atlas
    pub fn cell_count(&self) -> usize {
        self.width_cells as usize * self.height_cells as usize
    }
}

impl Default for FontTextureConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            width_cells: 16,
            height_cells: 8,
            smooth_method: SmoothMethod::None,
            smooth_amount: SmoothAmount::None,
            size_ratio: DEFAULT_SIZE_RATIO,
            glyph_cache_slots: 1,
        }
    }
}
