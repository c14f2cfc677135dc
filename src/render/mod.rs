//! # Rendering Module
//!
//! Converts the label renderer's RGBA output into packed 1-bit rasters.
//!
//! ## Modules
//!
//! - [`pipeline`]: grayscale, density, offset, rotation, dithering, packing
//! - [`dither`]: Floyd–Steinberg error diffusion and bit packing
//! - [`raster`]: the packed [`RasterImage`] type
//!
//! ## Usage Example
//!
//! ```
//! use pocketlabel::render::pipeline::{self, PipelineOptions, RgbaFrame};
//!
//! let pixels = vec![0u8; 384 * 200 * 4];
//! let frame = RgbaFrame::new(384, 200, &pixels)?;
//! let raster = pipeline::convert(&frame, &PipelineOptions::default())?;
//!
//! assert_eq!(raster.width_bytes(), 48);
//! # Ok::<(), pocketlabel::PrinterError>(())
//! ```

pub mod dither;
pub mod pipeline;
pub mod raster;

pub use pipeline::{PipelineOptions, RgbaFrame};
pub use raster::RasterImage;
