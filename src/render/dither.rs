//! # Floyd–Steinberg Error Diffusion
//!
//! Converts a grayscale buffer (0 = black, 255 = white) into a binary ink
//! mask suitable for a thermal print head.
//!
//! ## Algorithm
//!
//! Pixels are visited in raster order. Each one is quantized to 0 or 255
//! against [`THRESHOLD`], and the quantization error is pushed onto
//! neighbours that have not been visited yet:
//!
//! ```text
//!              ┌──────┬──────┐
//!              │  *   │ 7/16 │
//!       ┌──────┼──────┼──────┤
//!       │ 3/16 │ 5/16 │ 1/16 │
//!       └──────┴──────┴──────┘
//! ```
//!
//! The buffer is borrowed mutably for the duration of the pass; no other
//! code observes it half-diffused.
//!
//! ## Bit Packing
//!
//! - Bit 7 (MSB) = leftmost pixel
//! - 1 = ink, 0 = white
//! - Rows are padded with white to a whole byte
//!
//! ```
//! use pocketlabel::render::dither::pack_row;
//!
//! let row = vec![true, true, false, false, true, false, true, false];
//! assert_eq!(pack_row(&row), vec![0b11001010]);
//! ```

/// Gray level separating ink from white
pub const THRESHOLD: f32 = 128.0;

/// Dither `gray` in place and return the ink mask (`true` = ink).
///
/// `gray.len()` must equal `width × height`.
pub fn floyd_steinberg(gray: &mut [f32], width: usize, height: usize) -> Vec<bool> {
    debug_assert_eq!(gray.len(), width * height);

    let mut ink = vec![false; width * height];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = gray[idx];
            let new = if old < THRESHOLD { 0.0 } else { 255.0 };
            ink[idx] = new == 0.0;
            gray[idx] = new;

            let err = old - new;
            if err == 0.0 {
                continue;
            }

            if x + 1 < width {
                gray[idx + 1] += err * 7.0 / 16.0;
            }
            if y + 1 < height {
                let below = idx + width;
                if x > 0 {
                    gray[below - 1] += err * 3.0 / 16.0;
                }
                gray[below] += err * 5.0 / 16.0;
                if x + 1 < width {
                    gray[below + 1] += err * 1.0 / 16.0;
                }
            }
        }
    }

    ink
}

/// Pack a row of boolean pixel values into bytes.
///
/// ## Example
///
/// ```
/// use pocketlabel::render::dither::pack_row;
///
/// // 12 pixels pack into 2 bytes (4 bits padding)
/// let row = vec![true; 12];
/// assert_eq!(pack_row(&row), vec![0xFF, 0xF0]);
/// ```
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8); // MSB first
            bytes[byte_idx] |= 1 << bit_idx;
        }
    }

    bytes
}

/// Inverse of [`pack_row`]: expand `width` pixels from packed bytes.
pub fn unpack_row(bytes: &[u8], width: usize) -> Vec<bool> {
    (0..width)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (0x80 >> (i % 8)) != 0))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_never_inks() {
        let mut gray = vec![255.0; 16 * 4];
        let ink = floyd_steinberg(&mut gray, 16, 4);
        assert!(ink.iter().all(|&i| !i));
    }

    #[test]
    fn test_black_always_inks() {
        let mut gray = vec![0.0; 16 * 4];
        let ink = floyd_steinberg(&mut gray, 16, 4);
        assert!(ink.iter().all(|&i| i));
    }

    #[test]
    fn test_threshold_boundary() {
        let mut gray = vec![127.9, 128.0];
        let ink = floyd_steinberg(&mut gray, 2, 1);
        // 127.9 inks; its error (127.9) pushes the neighbour further up
        assert_eq!(ink, vec![true, false]);
    }

    #[test]
    fn test_error_propagates_right_and_down() {
        // 100 -> ink, error 100 spread to the neighbours
        let mut gray = vec![100.0, 100.0, 100.0, 100.0];
        floyd_steinberg(&mut gray, 2, 2);
        // Every cell was quantized
        assert!(gray.iter().all(|&g| g == 0.0 || g == 255.0));
    }

    #[test]
    fn test_error_carried_right() {
        // 100 inks, leaving +100 error; 7/16 of it lifts the neighbour to 143.75
        let mut gray = vec![100.0, 100.0];
        let ink = floyd_steinberg(&mut gray, 2, 1);
        assert_eq!(ink, vec![true, false]);
    }

    #[test]
    fn test_error_carried_down() {
        // 5/16 of +100 lifts the pixel below to 131.25
        let mut gray = vec![100.0, 100.0];
        let ink = floyd_steinberg(&mut gray, 1, 2);
        assert_eq!(ink, vec![true, false]);
    }

    #[test]
    fn test_mid_gray_roughly_half() {
        let (w, h) = (32, 32);
        let mut gray = vec![127.5; w * h];
        let ink = floyd_steinberg(&mut gray, w, h);
        let inked = ink.iter().filter(|&&i| i).count();
        let total = w * h;
        assert!(
            inked > total * 2 / 5 && inked < total * 3 / 5,
            "mid gray inked {} of {}",
            inked,
            total
        );
    }

    #[test]
    fn test_pack_row_8_pixels() {
        assert_eq!(pack_row(&[true; 8]), vec![0xFF]);
        assert_eq!(pack_row(&[false; 8]), vec![0x00]);
        assert_eq!(
            pack_row(&[true, false, true, false, true, false, true, false]),
            vec![0xAA]
        );
    }

    #[test]
    fn test_pack_row_padding() {
        assert_eq!(pack_row(&[true, true, true, true]), vec![0xF0]);

        let packed = pack_row(&[true; 9]);
        assert_eq!(packed, vec![0xFF, 0x80]);
    }

    #[test]
    fn test_pack_row_empty() {
        assert_eq!(pack_row(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_pack_unpack_alternating_columns() {
        for width in 1..=33usize {
            let row: Vec<bool> = (0..width).map(|x| x % 2 == 0).collect();
            let packed = pack_row(&row);
            assert_eq!(packed.len(), width.div_ceil(8), "width {}", width);
            assert_eq!(unpack_row(&packed, width), row, "width {}", width);
        }
    }
}
