//! # Raster Graphics Commands
//!
//! Builders for the raster bit-image command and the fixed calibration
//! pattern.
//!
//! ## Bit Packing
//!
//! Graphics data is packed as bytes where each bit represents one dot:
//! - Bit 7 (MSB) = leftmost dot
//! - Bit 0 (LSB) = rightmost dot
//! - 1 = black (print), 0 = white (no print)
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x80 = 10000000 = █░░░░░░░
//! ```

use super::commands::{GS, u16_le};

/// Rows in the calibration pattern (8mm at 203 DPI)
pub const CALIBRATION_ROWS: u16 = 64;

/// Calibration byte: one dot every 8 dots, giving a comb of vertical lines
pub const CALIBRATION_BYTE: u8 = 0x80;

/// Length of the raster header in bytes
pub const RASTER_HEADER_LEN: usize = 8;

/// # Raster Bit Image Header (GS v 0 m xL xH yL yH)
///
/// Announces a monochrome raster of `width_bytes × rows` bytes. The packed
/// payload must follow immediately, row-major, MSB-first.
///
/// ## Protocol Details
///
/// | Format | Bytes |
/// |--------|-------|
/// | ASCII  | GS v 0 m xL xH yL yH |
/// | Hex    | 1D 76 30 00 xL xH yL yH |
///
/// ## Parameters
///
/// - `m`: Always 0 (normal scale)
/// - `xL xH`: bytes per row, little-endian
/// - `yL yH`: row count, little-endian
///
/// ## Example
///
/// ```
/// use pocketlabel::protocol::graphics;
///
/// // 48 dots wide (6 bytes), 12 rows
/// let header = graphics::raster_header(6, 12);
/// assert_eq!(header, vec![0x1D, 0x76, 0x30, 0x00, 6, 0, 12, 0]);
/// ```
#[inline]
pub fn raster_header(width_bytes: u16, rows: u16) -> Vec<u8> {
    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(rows);
    vec![GS, b'v', b'0', 0, xl, xh, yl, yh]
}

/// Raster header followed by its payload in a single buffer.
///
/// The payload length must be `width_bytes × rows`.
pub fn raster(width_bytes: u16, rows: u16, data: &[u8]) -> Vec<u8> {
    let expected_len = width_bytes as usize * rows as usize;

    debug_assert!(
        data.len() == expected_len,
        "Raster data length mismatch. Expected {} ({} bytes × {} rows), got {}",
        expected_len,
        width_bytes,
        rows,
        data.len()
    );

    let mut cmd = Vec::with_capacity(RASTER_HEADER_LEN + data.len());
    cmd.extend(raster_header(width_bytes, rows));
    cmd.extend_from_slice(data);
    cmd
}

/// Payload of the calibration pattern: vertical lines every 8 dots.
pub fn calibration_payload(width_bytes: u16) -> Vec<u8> {
    vec![CALIBRATION_BYTE; width_bytes as usize * CALIBRATION_ROWS as usize]
}

/// # Calibration Test Pattern
///
/// A fixed raster of vertical lines spanning the requested width, used to
/// check head alignment and media width. Includes its header.
///
/// ## Example
///
/// ```
/// use pocketlabel::protocol::graphics;
///
/// let cmd = graphics::calibration_pattern(48);
/// assert_eq!(&cmd[..8], &[0x1D, 0x76, 0x30, 0x00, 48, 0, 64, 0]);
/// assert!(cmd[8..].iter().all(|&b| b == 0x80));
/// ```
pub fn calibration_pattern(width_bytes: u16) -> Vec<u8> {
    raster(
        width_bytes,
        CALIBRATION_ROWS,
        &calibration_payload(width_bytes),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_header_little_endian() {
        let header = raster_header(0x0102, 0x0304);
        assert_eq!(header, vec![0x1D, 0x76, 0x30, 0x00, 0x02, 0x01, 0x04, 0x03]);
        assert_eq!(header.len(), RASTER_HEADER_LEN);
    }

    #[test]
    fn test_raster_preserves_data() {
        let data: Vec<u8> = (0..12).collect();
        let cmd = raster(3, 4, &data);
        assert_eq!(&cmd[RASTER_HEADER_LEN..], &data[..]);
        assert_eq!(cmd[4], 3);
        assert_eq!(cmd[6], 4);
    }

    #[test]
    fn test_calibration_dimensions() {
        let cmd = calibration_pattern(6);
        assert_eq!(cmd.len(), RASTER_HEADER_LEN + 6 * CALIBRATION_ROWS as usize);
    }

    #[test]
    fn test_calibration_is_fixed() {
        assert_eq!(calibration_pattern(10), calibration_pattern(10));
    }
}
