//! # Monochrome Raster
//!
//! [`RasterImage`] is the packed 1-bit bitmap handed from the image pipeline
//! to the transport. It is built fresh for each print call and dropped after
//! transmission.
//!
//! The buffer always holds exactly `width_bytes × height_px` bytes, row-major,
//! MSB-first, with trailing bits of each row padded with 0 (white).

use super::dither::pack_row;
use crate::error::{PrinterError, Result};
use crate::protocol::graphics;

/// Packed monochrome bitmap ready for the raster command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width_px: usize,
    height_px: usize,
    width_bytes: usize,
    data: Vec<u8>,
}

impl RasterImage {
    /// Wrap an already packed buffer.
    ///
    /// Fails when the buffer length differs from `ceil(width/8) × height`.
    pub fn from_packed(width_px: usize, height_px: usize, data: Vec<u8>) -> Result<Self> {
        let width_bytes = width_px.div_ceil(8);
        let expected = width_bytes * height_px;
        if data.len() != expected {
            return Err(PrinterError::InvalidImage(format!(
                "packed buffer is {} bytes, expected {} ({} bytes × {} rows)",
                data.len(),
                expected,
                width_bytes,
                height_px
            )));
        }
        Ok(Self {
            width_px,
            height_px,
            width_bytes,
            data,
        })
    }

    /// Pack a row-major ink mask (`true` = ink).
    pub fn from_ink(width_px: usize, height_px: usize, ink: &[bool]) -> Result<Self> {
        if ink.len() != width_px * height_px {
            return Err(PrinterError::InvalidImage(format!(
                "ink mask has {} pixels, expected {}",
                ink.len(),
                width_px * height_px
            )));
        }
        let data = if width_px == 0 {
            Vec::new()
        } else {
            ink.chunks(width_px).flat_map(pack_row).collect()
        };
        Self::from_packed(width_px, height_px, data)
    }

    #[inline]
    pub fn width_px(&self) -> usize {
        self.width_px
    }

    #[inline]
    pub fn height_px(&self) -> usize {
        self.height_px
    }

    /// Bytes per packed row: `ceil(width_px / 8)`
    #[inline]
    pub fn width_bytes(&self) -> usize {
        self.width_bytes
    }

    /// Packed payload
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Iterate packed rows.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(self.width_bytes.max(1))
    }

    /// Whether the dot at (x, y) is inked. Out-of-range reads are white.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= self.width_px || y >= self.height_px {
            return false;
        }
        let byte = self.data[y * self.width_bytes + x / 8];
        byte & (0x80 >> (x % 8)) != 0
    }

    /// Raster header announcing this image.
    ///
    /// Fails when either dimension exceeds the 16-bit header fields.
    pub fn header(&self) -> Result<Vec<u8>> {
        let width_bytes = u16::try_from(self.width_bytes).map_err(|_| {
            PrinterError::InvalidImage(format!("{} bytes per row exceeds 65535", self.width_bytes))
        })?;
        let rows = u16::try_from(self.height_px).map_err(|_| {
            PrinterError::InvalidImage(format!("{} rows exceeds 65535", self.height_px))
        })?;
        Ok(graphics::raster_header(width_bytes, rows))
    }

    /// Whether nothing will be printed.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}
