//! Owned single-channel glyph bitmaps
//!
//! Transient storage between rasterization and the atlas blit. Every
//! operation clamps to the bitmap and destination bounds, so an oversized
//! source can be truncated but never writes outside its target.

use crate::{Result, TextError};

/// Filtering used when resampling a bitmap into another one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleFilter {
    Nearest,
    #[default]
    Bilinear,
}

/// An owned 8-bit coverage bitmap, row-major with no padding
#[derive(Clone)]
pub struct GlyphBitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GlyphBitmap {
    /// Create a zero-filled bitmap
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TextError::InvalidConfig(format!(
                "glyph bitmap size {}x{} has a zero dimension",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Coverage at `(x, y)`, or 0 outside the bitmap
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Reset every pixel to zero coverage
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Copy a tightly packed `src_width × src_height` coverage buffer to the
    /// top-left corner, truncating whatever does not fit.
    ///
    /// Returns the size actually copied.
    pub fn copy_from(&mut self, src: &[u8], src_width: u32, src_height: u32) -> (u32, u32) {
        let width = src_width.min(self.width);
        let height = src_height.min(self.height);
        for y in 0..height {
            let src_start = (y * src_width) as usize;
            let src_end = src_start + width as usize;
            if src_end > src.len() {
                // Short buffer from the rasterizer; keep what is there.
                return (width, y);
            }
            let dst_start = (y * self.width) as usize;
            self.pixels[dst_start..dst_start + width as usize]
                .copy_from_slice(&src[src_start..src_end]);
        }
        (width, height)
    }

    /// Soften edges by averaging each pixel with its four neighbours
    pub fn blur(&mut self, iterations: u32) {
        if iterations == 0 {
            return;
        }

        let w = self.width as i64;
        let h = self.height as i64;
        let mut scratch = vec![0u8; self.pixels.len()];

        for _ in 0..iterations {
            for y in 0..h {
                for x in 0..w {
                    let sample = |sx: i64, sy: i64| -> u32 {
                        let cx = sx.clamp(0, w - 1);
                        let cy = sy.clamp(0, h - 1);
                        self.pixels[(cy * w + cx) as usize] as u32
                    };
                    let sum = sample(x, y)
                        + sample(x - 1, y)
                        + sample(x + 1, y)
                        + sample(x, y - 1)
                        + sample(x, y + 1);
                    scratch[(y * w + x) as usize] = ((sum + 2) / 5) as u8;
                }
            }
            std::mem::swap(&mut self.pixels, &mut scratch);
        }
    }

    /// Resample the whole bitmap so it covers the whole of `dst`
    pub fn scale_into(&self, dst: &mut GlyphBitmap, filter: ScaleFilter) {
        let x_ratio = self.width as f32 / dst.width as f32;
        let y_ratio = self.height as f32 / dst.height as f32;

        for dy in 0..dst.height {
            for dx in 0..dst.width {
                let value = match filter {
                    ScaleFilter::Nearest => {
                        let sx = ((dx as f32 + 0.5) * x_ratio) as u32;
                        let sy = ((dy as f32 + 0.5) * y_ratio) as u32;
                        self.get(sx.min(self.width - 1), sy.min(self.height - 1))
                    }
                    ScaleFilter::Bilinear => {
                        let fx = ((dx as f32 + 0.5) * x_ratio - 0.5).max(0.0);
                        let fy = ((dy as f32 + 0.5) * y_ratio - 0.5).max(0.0);
                        self.sample_bilinear(fx, fy)
                    }
                };
                dst.pixels[(dy * dst.width + dx) as usize] = value;
            }
        }
    }

    fn sample_bilinear(&self, fx: f32, fy: f32) -> u8 {
        let x0 = (fx.floor() as u32).min(self.width - 1);
        let y0 = (fy.floor() as u32).min(self.height - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let top = self.get(x0, y0) as f32 * (1.0 - tx) + self.get(x1, y0) as f32 * tx;
        let bottom = self.get(x0, y1) as f32 * (1.0 - tx) + self.get(x1, y1) as f32 * tx;
        (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8
    }

    /// Copy the top-left `width × height` region into a larger buffer.
    ///
    /// `dst` is `dst_stride` bytes per row; the copy is clamped both to this
    /// bitmap and to the rows/columns that exist in `dst`. Returns the size
    /// actually written.
    pub fn blit_to(
        &self,
        dst: &mut [u8],
        dst_stride: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
    ) -> (u32, u32) {
        if dst_stride == 0 || dst_x >= dst_stride {
            return (0, 0);
        }
        let dst_rows = dst.len() as u32 / dst_stride;
        if dst_y >= dst_rows {
            return (0, 0);
        }

        let width = width.min(self.width).min(dst_stride - dst_x);
        let height = height.min(self.height).min(dst_rows - dst_y);

        for y in 0..height {
            let src_start = (y * self.width) as usize;
            let dst_start = ((dst_y + y) * dst_stride + dst_x) as usize;
            dst[dst_start..dst_start + width as usize]
                .copy_from_slice(&self.pixels[src_start..src_start + width as usize]);
        }
        (width, height)
    }
}

impl std::fmt::Debug for GlyphBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(GlyphBitmap::new(0, 4).is_err());
        assert!(GlyphBitmap::new(4, 0).is_err());
    }

    #[test]
    fn test_copy_from_truncates() {
        let mut bitmap = GlyphBitmap::new(2, 2).unwrap();
        let src = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        assert_eq!(bitmap.copy_from(&src, 3, 3), (2, 2));
        assert_eq!(bitmap.pixels(), &[1, 2, 4, 5]);
    }

    #[test]
    fn test_clear() {
        let mut bitmap = GlyphBitmap::new(3, 3).unwrap();
        bitmap.pixels_mut().fill(200);
        bitmap.clear();
        assert!(bitmap.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_blur_spreads_coverage() {
        let mut bitmap = GlyphBitmap::new(5, 5).unwrap();
        bitmap.pixels_mut()[12] = 250;
        bitmap.blur(1);
        assert_eq!(bitmap.get(2, 2), 50);
        assert_eq!(bitmap.get(1, 2), 50);
        assert_eq!(bitmap.get(2, 1), 50);
        assert_eq!(bitmap.get(0, 0), 0);
    }

    #[test]
    fn test_blur_keeps_flat_regions() {
        let mut bitmap = GlyphBitmap::new(4, 4).unwrap();
        bitmap.pixels_mut().fill(255);
        bitmap.blur(2);
        assert!(bitmap.pixels().iter().all(|&p| p == 255));
    }

    #[test]
    fn test_bilinear_downscale_of_solid_block() {
        let mut big = GlyphBitmap::new(8, 8).unwrap();
        big.pixels_mut().fill(255);
        let mut small = GlyphBitmap::new(4, 4).unwrap();
        big.scale_into(&mut small, ScaleFilter::Bilinear);
        assert!(small.pixels().iter().all(|&p| p == 255));
    }

    #[test]
    fn test_nearest_downscale_picks_source_pixels() {
        let mut big = GlyphBitmap::new(4, 4).unwrap();
        // Left half covered, right half empty
        for y in 0..4 {
            for x in 0..2 {
                big.pixels_mut()[y * 4 + x] = 255;
            }
        }
        let mut small = GlyphBitmap::new(2, 2).unwrap();
        big.scale_into(&mut small, ScaleFilter::Nearest);
        assert_eq!(small.pixels(), &[255, 0, 255, 0]);
    }

    #[test]
    fn test_blit_stays_inside_destination() {
        let mut bitmap = GlyphBitmap::new(4, 4).unwrap();
        bitmap.pixels_mut().fill(9);

        // 6x6 destination, blit at (4, 4) can only write a 2x2 corner
        let mut dst = vec![0u8; 36];
        assert_eq!(bitmap.blit_to(&mut dst, 6, 4, 4, 4, 4), (2, 2));
        let written = dst.iter().filter(|&&p| p == 9).count();
        assert_eq!(written, 4);
        assert_eq!(dst[4 * 6 + 4], 9);
        assert_eq!(dst[5 * 6 + 5], 9);

        assert_eq!(bitmap.blit_to(&mut dst, 6, 6, 0, 4, 4), (0, 0));
        assert_eq!(bitmap.blit_to(&mut dst, 6, 0, 6, 4, 4), (0, 0));
    }
}
