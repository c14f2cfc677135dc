//! # Label Printer Control Commands
//!
//! Pure byte-sequence builders for the control commands understood by the
//! supported thermal label printers. Nothing here performs I/O or keeps
//! state; the caller decides ordering.
//!
//! ## Escape Sequence Structure
//!
//! Commands are short byte sequences introduced by one of three prefixes:
//!
//! | Prefix | Hex | Used for |
//! |--------|-----|----------|
//! | ESC | 1B | init, speed, justification, feed |
//! | GS | 1D | raster graphics (see [`super::graphics`]) |
//! | US | 1F | density and media sensing |
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`

use serde::{Deserialize, Serialize};

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Graphics command prefix
pub const GS: u8 = 0x1D;

/// US (Unit Separator) - Vendor configuration prefix
///
/// Followed by `0x11` for the media/density configuration family.
pub const US: u8 = 0x1F;

/// Second byte of the `US 0x11` configuration family
const CONFIG: u8 = 0x11;

/// Highest density level accepted by the print head
pub const MAX_DENSITY_LEVEL: u8 = 15;

/// Valid print speed range (1 = slowest, 5 = fastest)
pub const SPEED_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

// ============================================================================
// PARAMETER TYPES
// ============================================================================

/// Physical media sensing mode.
///
/// Tells the printer how to find the boundary between two labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    /// Die-cut labels separated by a gap, detected optically
    #[default]
    Gap,
    /// Continuous roll without separators
    Continuous,
    /// Labels with a black registration mark on the back
    Mark,
}

impl LabelType {
    /// Wire value for the label type selector
    pub const fn code(self) -> u8 {
        match self {
            Self::Gap => 0x0A,
            Self::Continuous => 0x0B,
            Self::Mark => 0x26,
        }
    }
}

impl std::str::FromStr for LabelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gap" => Ok(Self::Gap),
            "continuous" => Ok(Self::Continuous),
            "mark" => Ok(Self::Mark),
            other => Err(format!(
                "Unknown label type '{}'. Use gap, continuous or mark",
                other
            )),
        }
    }
}

/// Horizontal placement of the raster on the print head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Justification {
    Left,
    #[default]
    Center,
    Right,
}

impl Justification {
    pub const fn code(self) -> u8 {
        match self {
            Self::Left => 0x00,
            Self::Center => 0x01,
            Self::Right => 0x02,
        }
    }
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Clears the print buffer and resets the controller to its power-on state.
/// Sent at the start of every copy.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ## Example
///
/// ```
/// use pocketlabel::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// PRINT QUALITY
// ============================================================================

/// Map a 0-100 density setting onto the printer's 1-15 heat levels.
///
/// ```text
/// level = clamp(ceil(density / 100 × 15), 1, 15)
/// ```
///
/// Values above 100 saturate at 15. The mapping is monotonically
/// non-decreasing, and density 0 still yields level 1 (the head cannot be
/// switched off).
#[inline]
pub fn density_level(density: u8) -> u8 {
    let density = density.min(100) as u32;
    let level = (density * MAX_DENSITY_LEVEL as u32).div_ceil(100);
    (level as u8).clamp(1, MAX_DENSITY_LEVEL)
}

/// # Set Print Density (US 0x11 $ d)
///
/// ## Protocol Details
///
/// | Format | Bytes |
/// |--------|-------|
/// | Hex    | 1F 11 24 d |
///
/// `d` is [`density_level`] of the 0-100 setting.
///
/// ## Example
///
/// ```
/// use pocketlabel::protocol::commands;
///
/// assert_eq!(commands::density(50), vec![0x1F, 0x11, 0x24, 8]);
/// assert_eq!(commands::density(0), vec![0x1F, 0x11, 0x24, 1]);
/// ```
#[inline]
pub fn density(density: u8) -> Vec<u8> {
    vec![US, CONFIG, b'$', density_level(density)]
}

/// # Select Label Type (US 0x11 t)
///
/// | Label type | Bytes |
/// |------------|-------|
/// | Gap | 1F 11 0A |
/// | Continuous | 1F 11 0B |
/// | Mark | 1F 11 26 |
#[inline]
pub fn label_type(kind: LabelType) -> Vec<u8> {
    vec![US, CONFIG, kind.code()]
}

/// # Select Print Speed (ESC N CR s)
///
/// | Format | Bytes |
/// |--------|-------|
/// | Hex    | 1B 4E 0D s |
///
/// `s` is clamped into 1..=5.
#[inline]
pub fn speed(speed: u8) -> Vec<u8> {
    let s = speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
    vec![ESC, b'N', 0x0D, s]
}

/// # Justification (ESC a j)
///
/// | Justification | Bytes |
/// |---------------|-------|
/// | Left | 1B 61 00 |
/// | Center | 1B 61 01 |
/// | Right | 1B 61 02 |
#[inline]
pub fn justify(justification: Justification) -> Vec<u8> {
    vec![ESC, b'a', justification.code()]
}

// ============================================================================
// PAPER FEED
// ============================================================================

/// # Feed n Lines (ESC d n)
///
/// ## Example
///
/// ```
/// use pocketlabel::protocol::commands;
///
/// assert_eq!(commands::feed_lines(3), vec![0x1B, 0x64, 0x03]);
/// ```
#[inline]
pub fn feed_lines(n: u8) -> Vec<u8> {
    vec![ESC, b'd', n]
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Encode a u16 value as little-endian bytes [low, high]
///
/// ```
/// use pocketlabel::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert_eq!(init(), vec![0x1B, 0x40]);
    }

    #[test]
    fn test_density_bounds() {
        assert_eq!(density_level(0), 1);
        assert_eq!(density_level(1), 1);
        assert_eq!(density_level(7), 2);
        assert_eq!(density_level(50), 8);
        assert_eq!(density_level(100), 15);
        assert_eq!(density_level(255), 15);
    }

    #[test]
    fn test_density_monotonic_and_in_range() {
        let mut previous = 0;
        for d in 0..=100u8 {
            let level = density_level(d);
            assert!((1..=15).contains(&level), "density {} -> {}", d, level);
            assert!(level >= previous, "density {} decreased the level", d);
            previous = level;
        }
    }

    #[test]
    fn test_density_command() {
        assert_eq!(density(100), vec![0x1F, 0x11, 0x24, 0x0F]);
    }

    #[test]
    fn test_label_type() {
        assert_eq!(label_type(LabelType::Gap), vec![0x1F, 0x11, 0x0A]);
        assert_eq!(label_type(LabelType::Continuous), vec![0x1F, 0x11, 0x0B]);
        assert_eq!(label_type(LabelType::Mark), vec![0x1F, 0x11, 0x26]);
    }

    #[test]
    fn test_label_type_from_str() {
        assert_eq!("GAP".parse::<LabelType>(), Ok(LabelType::Gap));
        assert_eq!("mark".parse::<LabelType>(), Ok(LabelType::Mark));
        assert!("roll".parse::<LabelType>().is_err());
    }

    #[test]
    fn test_speed_clamps() {
        assert_eq!(speed(3), vec![0x1B, 0x4E, 0x0D, 3]);
        assert_eq!(speed(0), vec![0x1B, 0x4E, 0x0D, 1]);
        assert_eq!(speed(9), vec![0x1B, 0x4E, 0x0D, 5]);
    }

    #[test]
    fn test_justify() {
        assert_eq!(justify(Justification::Left), vec![0x1B, 0x61, 0x00]);
        assert_eq!(justify(Justification::Center), vec![0x1B, 0x61, 0x01]);
        assert_eq!(justify(Justification::Right), vec![0x1B, 0x61, 0x02]);
    }

    #[test]
    fn test_feed_lines() {
        assert_eq!(feed_lines(0), vec![0x1B, 0x64, 0x00]);
        assert_eq!(feed_lines(255), vec![0x1B, 0x64, 0xFF]);
    }

    #[test]
    fn test_u16_le() {
        assert_eq!(u16_le(0x0000), [0x00, 0x00]);
        assert_eq!(u16_le(0xFF00), [0x00, 0xFF]);
        assert_eq!(u16_le(384), [0x80, 0x01]);
    }
}
