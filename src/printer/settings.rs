//! Per-print settings as supplied by the label editor.
//!
//! Field names follow the upstream JSON contract (`copies`, `density`,
//! `invert`, `marginMm`, `speed`, `labelType`, `printOffsetMm`). `invert` and
//! `marginMm` are applied by the renderer before the bitmap reaches this
//! crate; they are carried through untouched.

use serde::{Deserialize, Serialize};

use crate::protocol::LabelType;
use crate::protocol::commands::SPEED_RANGE;

/// Maximum vertical offset in either direction (millimeters)
pub const MAX_OFFSET_MM: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintSettings {
    /// Number of copies, at least 1
    pub copies: u32,
    /// Print darkness 0-100, 50 neutral
    pub density: u8,
    /// Applied upstream
    pub invert: bool,
    /// Applied upstream
    pub margin_mm: f32,
    /// 1 (slow) to 5 (fast)
    pub speed: u8,
    pub label_type: LabelType,
    /// Vertical shift, -10..=10 mm, positive moves content down
    pub print_offset_mm: f32,
    /// Rotate wide, short labels to run along the feed direction
    pub auto_rotate: bool,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            copies: 1,
            density: 50,
            invert: false,
            margin_mm: 0.0,
            speed: 3,
            label_type: LabelType::Gap,
            print_offset_mm: 0.0,
            auto_rotate: true,
        }
    }
}

impl PrintSettings {
    /// Copy with every field clamped into its documented range.
    pub fn normalized(&self) -> Self {
        let offset = if self.print_offset_mm.is_finite() {
            self.print_offset_mm.clamp(-MAX_OFFSET_MM, MAX_OFFSET_MM)
        } else {
            0.0
        };
        Self {
            copies: self.copies.max(1),
            density: self.density.min(100),
            speed: self.speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end()),
            print_offset_mm: offset,
            ..self.clone()
        }
    }

    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }

    pub fn with_density(mut self, density: u8) -> Self {
        self.density = density;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_json() {
        let settings: PrintSettings = serde_json::from_str(
            r#"{ "copies": 2, "density": 70, "invert": true, "marginMm": 1.5,
                 "speed": 4, "labelType": "continuous", "printOffsetMm": -2.5 }"#,
        )
        .unwrap();
        assert_eq!(settings.copies, 2);
        assert_eq!(settings.label_type, LabelType::Continuous);
        assert_eq!(settings.print_offset_mm, -2.5);
        assert_eq!(settings.margin_mm, 1.5);
        assert!(settings.auto_rotate);
    }

    #[test]
    fn test_normalized_clamps() {
        let settings = PrintSettings {
            copies: 0,
            density: 180,
            speed: 9,
            print_offset_mm: -42.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.copies, 1);
        assert_eq!(settings.density, 100);
        assert_eq!(settings.speed, 5);
        assert_eq!(settings.print_offset_mm, -10.0);
    }

    #[test]
    fn test_normalized_nan_offset() {
        let settings = PrintSettings {
            print_offset_mm: f32::NAN,
            ..Default::default()
        };
        assert_eq!(settings.normalized().print_offset_mm, 0.0);
    }

    #[test]
    fn test_speed_zero_raised() {
        let settings = PrintSettings {
            speed: 0,
            ..Default::default()
        };
        assert_eq!(settings.normalized().speed, 1);
    }
}
