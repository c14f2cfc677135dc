//! # Label Image Pipeline
//!
//! Turns the renderer's RGBA bitmap into a [`RasterImage`]. The steps run in
//! a fixed order on a float grayscale buffer owned by the pipeline:
//!
//! | # | Step | Function |
//! |---|------|----------|
//! | 1 | Luminance, transparent → white | [`Grayscale::from_rgba`] |
//! | 2 | Density / contrast | [`Grayscale::apply_density`] |
//! | 3 | Vertical offset | [`Grayscale::shift_rows`] |
//! | 4 | Auto-rotate (narrow labels) | [`Grayscale::rotate_cw`] |
//! | 5 | Floyd–Steinberg dithering | [`dither::floyd_steinberg`] |
//! | 6 | Bit packing | [`RasterImage::from_ink`] |
//!
//! The pipeline is synchronous and CPU-bound. Steps 1 and 2 are per-pixel
//! and run row-parallel; dithering is inherently sequential.
//!
//! ## Example
//!
//! ```
//! use pocketlabel::render::pipeline::{self, PipelineOptions, RgbaFrame};
//!
//! let pixels = vec![255u8; 16 * 4 * 4];
//! let frame = RgbaFrame::new(16, 4, &pixels)?;
//! let options = PipelineOptions { auto_rotate: false, ..Default::default() };
//! let raster = pipeline::convert(&frame, &options)?;
//!
//! assert_eq!(raster.width_bytes(), 2);
//! assert!(raster.is_blank());
//! # Ok::<(), pocketlabel::PrinterError>(())
//! ```

use rayon::prelude::*;

use super::dither;
use super::raster::RasterImage;
use crate::error::{PrinterError, Result};
use crate::printer::PrintSettings;

/// Paper white
pub const WHITE: f32 = 255.0;

/// Alpha below this is treated as background
pub const ALPHA_CUTOFF: u8 = 128;

/// Labels shorter than this (in dots) and wider than tall get rotated
pub const ROTATE_MAX_HEIGHT: usize = 180;

const MM_PER_INCH: f32 = 25.4;

// ============================================================================
// INPUT
// ============================================================================

/// Borrowed RGBA8 bitmap supplied by the label renderer.
#[derive(Debug, Clone, Copy)]
pub struct RgbaFrame<'a> {
    width: usize,
    height: usize,
    pixels: &'a [u8],
}

impl<'a> RgbaFrame<'a> {
    /// Validate dimensions against the buffer (`width × height × 4` bytes).
    pub fn new(width: usize, height: usize, pixels: &'a [u8]) -> Result<Self> {
        let frame = Self {
            width,
            height,
            pixels,
        };
        frame.validate()?;
        Ok(frame)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PrinterError::InvalidImage(format!(
                "image is {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.width * self.height * 4;
        if self.pixels.len() != expected {
            return Err(PrinterError::InvalidImage(format!(
                "RGBA buffer is {} bytes, expected {}",
                self.pixels.len(),
                expected
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }
}

impl<'a> TryFrom<&'a image::RgbaImage> for RgbaFrame<'a> {
    type Error = PrinterError;

    fn try_from(img: &'a image::RgbaImage) -> Result<Self> {
        Self::new(img.width() as usize, img.height() as usize, img.as_raw())
    }
}

/// Knobs for [`convert`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// 0-100, 50 is neutral
    pub density: u8,
    /// Vertical shift in millimeters, positive moves content down
    pub offset_mm: f32,
    /// Print head resolution
    pub dpi: u16,
    /// Rotate wide, short labels 90° clockwise
    pub auto_rotate: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            density: 50,
            offset_mm: 0.0,
            dpi: 203,
            auto_rotate: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &PrintSettings, dpi: u16) -> Self {
        Self {
            density: settings.density,
            offset_mm: settings.print_offset_mm,
            dpi,
            auto_rotate: settings.auto_rotate,
        }
    }
}

// ============================================================================
// GRAYSCALE BUFFER
// ============================================================================

/// Float grayscale working buffer (0 = black, 255 = white).
#[derive(Debug, Clone, PartialEq)]
pub struct Grayscale {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Grayscale {
    /// Step 1: `0.299R + 0.587G + 0.114B`, with transparent pixels as white.
    pub fn from_rgba(frame: &RgbaFrame<'_>) -> Self {
        let width = frame.width;
        let mut data = vec![WHITE; width * frame.height];

        data.par_chunks_mut(width)
            .zip(frame.pixels.par_chunks(width * 4))
            .for_each(|(row, src)| {
                for (gray, px) in row.iter_mut().zip(src.chunks_exact(4)) {
                    *gray = if px[3] < ALPHA_CUTOFF {
                        WHITE
                    } else {
                        0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
                    };
                }
            });

        Self {
            width,
            height: frame.height,
            data,
        }
    }

    /// Step 2: darken (density > 50) or lighten (density < 50), then clamp.
    pub fn apply_density(&mut self, density: u8) {
        let darken = (density.min(100) as f32 - 50.0) / 100.0;
        if darken == 0.0 {
            return;
        }
        let delta = WHITE * darken;
        self.data
            .par_iter_mut()
            .for_each(|g| *g = (*g - delta).clamp(0.0, WHITE));
    }

    /// Step 3: shift rows by `offset_px` (positive = down), filling with white.
    ///
    /// Dimensions never change. Offsets of a full height or more blank the
    /// whole buffer.
    pub fn shift_rows(&mut self, offset_px: i32) {
        if offset_px == 0 {
            return;
        }
        let w = self.width;
        let h = self.height;
        let off = offset_px.unsigned_abs() as usize;
        if off >= h {
            self.data.fill(WHITE);
            return;
        }
        if offset_px > 0 {
            self.data.copy_within(0..(h - off) * w, off * w);
            self.data[..off * w].fill(WHITE);
        } else {
            self.data.copy_within(off * w.., 0);
            self.data[(h - off) * w..].fill(WHITE);
        }
    }

    /// Step 4: rotate 90° clockwise; (x, y) lands on (height − 1 − y, x).
    pub fn rotate_cw(&self) -> Self {
        let (w, h) = (self.width, self.height);
        let new_w = h;
        let mut data = vec![WHITE; w * h];
        for y in 0..h {
            for x in 0..w {
                data[x * new_w + (h - 1 - y)] = self.data[y * w + x];
            }
        }
        Self {
            width: new_w,
            height: w,
            data,
        }
    }
}

// ============================================================================
// STEPS
// ============================================================================

/// Millimeters to whole dots at `dpi`.
#[inline]
pub fn offset_px(offset_mm: f32, dpi: u16) -> i32 {
    (offset_mm / MM_PER_INCH * dpi as f32).round() as i32
}

/// Narrow print head heuristic: landscape labels under 180 dots tall.
#[inline]
pub fn should_rotate(width: usize, height: usize) -> bool {
    width > height && height < ROTATE_MAX_HEIGHT
}

/// Run the full pipeline.
pub fn convert(frame: &RgbaFrame<'_>, options: &PipelineOptions) -> Result<RasterImage> {
    frame.validate()?;

    let mut gray = Grayscale::from_rgba(frame);
    gray.apply_density(options.density);
    gray.shift_rows(offset_px(options.offset_mm, options.dpi));

    if options.auto_rotate && should_rotate(gray.width, gray.height) {
        gray = gray.rotate_cw();
    }

    let Grayscale {
        width,
        height,
        mut data,
    } = gray;
    let ink = dither::floyd_steinberg(&mut data, width, height);
    RasterImage::from_ink(width, height, &ink)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: usize, height: usize, rgba: [u8; 4]) -> Vec<u8> {
        rgba.iter().copied().cycle().take(width * height * 4).collect()
    }

    fn gray(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Grayscale {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Grayscale {
            width,
            height,
            data,
        }
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(RgbaFrame::new(0, 4, &[]).is_err());
        assert!(RgbaFrame::new(4, 0, &[]).is_err());
    }

    #[test]
    fn test_rejects_short_buffer() {
        let pixels = vec![0u8; 15];
        assert!(RgbaFrame::new(2, 2, &pixels).is_err());
    }

    #[test]
    fn test_image_buffer_conversion_validates() {
        let empty = image::RgbaImage::new(0, 4);
        assert!(matches!(
            RgbaFrame::try_from(&empty),
            Err(PrinterError::InvalidImage(_))
        ));

        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([0, 0, 0, 255]));
        let frame = RgbaFrame::try_from(&img).unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
    }

    #[test]
    fn test_luminance_weights() {
        let pixels = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255];
        let frame = RgbaFrame::new(3, 1, &pixels).unwrap();
        let g = Grayscale::from_rgba(&frame);
        assert!((g.data[0] - 76.245).abs() < 0.01);
        assert!((g.data[1] - 149.685).abs() < 0.01);
        assert!((g.data[2] - 29.07).abs() < 0.01);
    }

    #[test]
    fn test_transparent_is_white() {
        let pixels = solid(2, 2, [0, 0, 0, 127]);
        let frame = RgbaFrame::new(2, 2, &pixels).unwrap();
        let g = Grayscale::from_rgba(&frame);
        assert!(g.data.iter().all(|&v| v == WHITE));
    }

    #[test]
    fn test_density_neutral_is_noop() {
        let mut g = gray(4, 4, |x, y| (x * 40 + y) as f32);
        let before = g.clone();
        g.apply_density(50);
        assert_eq!(g, before);
    }

    #[test]
    fn test_density_darkens_and_clamps() {
        let mut g = gray(2, 1, |x, _| if x == 0 { 100.0 } else { 10.0 });
        g.apply_density(100);
        assert_eq!(g.data, vec![0.0, 0.0]);

        let mut g = gray(2, 1, |x, _| if x == 0 { 100.0 } else { 250.0 });
        g.apply_density(0);
        assert_eq!(g.data, vec![227.5, 255.0]);
    }

    #[test]
    fn test_offset_px_rounding() {
        assert_eq!(offset_px(0.0, 203), 0);
        assert_eq!(offset_px(25.4, 203), 203);
        assert_eq!(offset_px(1.0, 203), 8);
        assert_eq!(offset_px(-1.0, 203), -8);
    }

    #[test]
    fn test_shift_rows_down() {
        let mut g = gray(2, 4, |_, y| y as f32);
        g.shift_rows(1);
        assert_eq!(g.data, vec![255.0, 255.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_shift_rows_up() {
        let mut g = gray(2, 4, |_, y| y as f32);
        g.shift_rows(-2);
        assert_eq!(g.data, vec![2.0, 2.0, 3.0, 3.0, 255.0, 255.0, 255.0, 255.0]);
    }

    #[test]
    fn test_shift_preserves_dimensions_for_all_offsets() {
        let height = 7;
        for off in -(height as i32)..=(height as i32) {
            let mut g = gray(3, height, |x, y| (x + y) as f32);
            g.shift_rows(off);
            assert_eq!((g.width, g.height), (3, height));
            assert_eq!(g.data.len(), 3 * height);
        }
    }

    #[test]
    fn test_shift_beyond_height_is_all_white() {
        let mut g = gray(3, 3, |_, _| 0.0);
        g.shift_rows(10);
        assert!(g.data.iter().all(|&v| v == WHITE));
    }

    #[test]
    fn test_should_rotate() {
        assert!(should_rotate(48, 12));
        assert!(should_rotate(400, 179));
        assert!(!should_rotate(400, 180));
        assert!(!should_rotate(12, 48));
        assert!(!should_rotate(20, 20));
    }

    #[test]
    fn test_rotate_cw_mapping() {
        let g = gray(3, 2, |x, y| (y * 3 + x) as f32);
        let r = g.rotate_cw();
        assert_eq!((r.width, r.height), (2, 3));
        for y in 0..2 {
            for x in 0..3 {
                let (nx, ny) = (2 - 1 - y, x);
                assert_eq!(r.data[ny * r.width + nx], g.data[y * 3 + x]);
            }
        }
    }

    #[test]
    fn test_convert_white_label() {
        let pixels = solid(48, 12, [255, 255, 255, 255]);
        let frame = RgbaFrame::new(48, 12, &pixels).unwrap();
        let options = PipelineOptions {
            auto_rotate: false,
            ..Default::default()
        };
        let raster = convert(&frame, &options).unwrap();
        assert_eq!(raster.width_bytes(), 6);
        assert_eq!(raster.height_px(), 12);
        assert!(raster.is_blank());
    }

    #[test]
    fn test_convert_rotates_narrow_label() {
        let pixels = solid(48, 12, [255, 255, 255, 255]);
        let frame = RgbaFrame::new(48, 12, &pixels).unwrap();
        let raster = convert(&frame, &PipelineOptions::default()).unwrap();
        assert_eq!(raster.width_px(), 12);
        assert_eq!(raster.width_bytes(), 2);
        assert_eq!(raster.height_px(), 48);
        assert!(raster.is_blank());
    }

    #[test]
    fn test_convert_black_label_with_padding() {
        let pixels = solid(10, 20, [0, 0, 0, 255]);
        let frame = RgbaFrame::new(10, 20, &pixels).unwrap();
        let raster = convert(&frame, &PipelineOptions::default()).unwrap();
        assert_eq!(raster.data().len(), 2 * 20);
        for row in raster.rows() {
            assert_eq!(row, &[0xFF, 0xC0]);
        }
    }

    #[test]
    fn test_convert_zero_offset_is_identical() {
        let pixels: Vec<u8> = (0..32 * 40 * 4).map(|i| (i * 7 % 256) as u8).collect();
        let frame = RgbaFrame::new(32, 40, &pixels).unwrap();
        let a = convert(&frame, &PipelineOptions::default()).unwrap();
        let b = convert(
            &frame,
            &PipelineOptions {
                offset_mm: 0.04,
                ..Default::default()
            },
        )
        .unwrap();
        // 0.04mm rounds to zero dots
        assert_eq!(a, b);
    }

    #[test]
    fn test_convert_large_offset_blanks_output() {
        let pixels = solid(16, 16, [0, 0, 0, 255]);
        let frame = RgbaFrame::new(16, 16, &pixels).unwrap();
        let options = PipelineOptions {
            offset_mm: 10.0,
            ..Default::default()
        };
        let raster = convert(&frame, &options).unwrap();
        assert_eq!(raster.height_px(), 16);
        assert!(raster.is_blank());
    }
}
