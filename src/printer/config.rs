//! # Printer Configuration
//!
//! Hardware and transport parameters for the supported BLE label printers.
//!
//! ## Defaults
//!
//! | Property | Value |
//! |----------|-------|
//! | Resolution | 203 DPI (~8 dots/mm) |
//! | Chunk size | 60 bytes |
//! | Chunk pacing | 20 ms |
//! | Copy pacing | 500 ms |
//! | Scan window | 5 s |
//! | Connect timeout | 10 s |
//! | Write timeout | 5 s |
//!
//! ## Loading
//!
//! Any field may be omitted from a JSON file; missing fields take their
//! default.
//!
//! ```
//! use pocketlabel::printer::PrinterConfig;
//!
//! let config = PrinterConfig::from_json(r#"{ "chunk_size": 120 }"#)?;
//! assert_eq!(config.chunk_size, 120);
//! assert_eq!(config.dpi, 203);
//! # Ok::<(), pocketlabel::PrinterError>(())
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use btleplug::api::bleuuid::uuid_from_u16;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PrinterError, Result};
use crate::protocol::Justification;
use crate::transport::{CharacteristicRef, DiscoveryFilter};

/// Standard Device Information service
pub const DEVICE_INFORMATION_SERVICE: Uuid = uuid_from_u16(0x180A);

/// Standard Battery service
pub const BATTERY_SERVICE: Uuid = uuid_from_u16(0x180F);

/// Printer data services, most common first
pub const DEFAULT_SERVICE_UUIDS: [Uuid; 5] = [
    uuid_from_u16(0xFF00),
    uuid_from_u16(0x18F0),
    uuid_from_u16(0xAE30),
    uuid_from_u16(0xFFE0),
    Uuid::from_u128(0x49535343_FE7D_4AE5_8FA9_9FAFD205E455),
];

/// Advertised name prefixes of the supported models
pub const DEFAULT_NAME_PREFIXES: [&str; 8] =
    ["M02", "M110", "M120", "M200", "M220", "M221", "T02", "Q199"];

/// # Printer Configuration
///
/// ## Calculations
///
/// ```text
/// dots_per_mm = dpi / 25.4
///
/// At 203 DPI:
///   dots_per_mm = 203 / 25.4 ≈ 8
///   40mm label = 320 dots = 40 bytes per row
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Display name for logs
    pub name: String,

    /// Resolution in dots per inch
    pub dpi: u16,

    /// Device chooser: accept names starting with any of these
    pub name_prefixes: Vec<String>,

    /// Ordered candidate data services; also accepted as advertised services
    pub service_uuids: Vec<Uuid>,

    /// Optional vendor status byte (bit 0 paper out, bit 1 cover open)
    pub status_characteristic: Option<CharacteristicRef>,

    /// Payload bytes per GATT write
    pub chunk_size: usize,

    /// Pause between payload chunks (milliseconds)
    pub chunk_delay_ms: u64,

    /// Pause between copies (milliseconds)
    pub copy_delay_ms: u64,

    /// How long the chooser scans before listing matches (milliseconds)
    pub scan_window_ms: u64,

    /// Deadline for a GATT connect (milliseconds)
    pub connect_timeout_ms: u64,

    /// Deadline for a single GATT write (milliseconds)
    pub write_timeout_ms: u64,

    /// Raster placement on the head
    pub justification: Justification,

    /// Lines fed by `feed_paper` and after the calibration pattern
    pub feed_lines: u8,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            name: "BLE label printer".to_string(),
            dpi: 203,
            name_prefixes: DEFAULT_NAME_PREFIXES.iter().map(|p| p.to_string()).collect(),
            service_uuids: DEFAULT_SERVICE_UUIDS.to_vec(),
            status_characteristic: None,
            chunk_size: 60,
            chunk_delay_ms: 20,
            copy_delay_ms: 500,
            scan_window_ms: 5_000,
            connect_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
            justification: Justification::Center,
            feed_lines: 4,
        }
    }
}

impl PrinterConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Reject values the transport cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PrinterError::Config("chunk_size must be positive".into()));
        }
        if self.dpi == 0 {
            return Err(PrinterError::Config("dpi must be positive".into()));
        }
        if self.service_uuids.is_empty() {
            return Err(PrinterError::Config(
                "at least one service UUID is required".into(),
            ));
        }
        Ok(())
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set both pacing delays at once; zero disables pacing.
    pub fn with_pacing(mut self, chunk_delay: Duration, copy_delay: Duration) -> Self {
        self.chunk_delay_ms = chunk_delay.as_millis() as u64;
        self.copy_delay_ms = copy_delay.as_millis() as u64;
        self
    }

    pub fn with_status_characteristic(mut self, status: CharacteristicRef) -> Self {
        self.status_characteristic = Some(status);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window_ms = window.as_millis() as u64;
        self
    }

    #[inline]
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    #[inline]
    pub fn copy_delay(&self) -> Duration {
        Duration::from_millis(self.copy_delay_ms)
    }

    #[inline]
    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[inline]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Calculate dots per millimeter
    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    /// Convert millimeters to dots
    #[inline]
    pub fn mm_to_dots(&self, mm: f32) -> u16 {
        (mm * self.dots_per_mm()).round().clamp(0.0, u16::MAX as f32) as u16
    }

    /// Filters handed to the device chooser.
    pub fn discovery_filter(&self) -> DiscoveryFilter {
        DiscoveryFilter {
            name_prefixes: self.name_prefixes.clone(),
            services: self.service_uuids.clone(),
            optional_services: vec![DEVICE_INFORMATION_SERVICE, BATTERY_SERVICE],
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dots_per_mm() {
        let config = PrinterConfig::default();
        assert!((config.dots_per_mm() - 8.0).abs() < 0.1);
    }

    #[test]
    fn test_mm_to_dots() {
        let config = PrinterConfig::default();
        assert_eq!(config.mm_to_dots(40.0), 320);
        assert_eq!(config.mm_to_dots(-3.0), 0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PrinterConfig::from_json(r#"{ "dpi": 300, "feed_lines": 2 }"#).unwrap();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.feed_lines, 2);
        assert_eq!(config.chunk_size, 60);
        assert_eq!(config.service_uuids, DEFAULT_SERVICE_UUIDS.to_vec());
    }

    #[test]
    fn test_rejects_zero_chunk() {
        let err = PrinterConfig::from_json(r#"{ "chunk_size": 0 }"#).unwrap_err();
        assert!(matches!(err, PrinterError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_services() {
        assert!(PrinterConfig::from_json(r#"{ "service_uuids": [] }"#).is_err());
    }

    #[test]
    fn test_status_characteristic_json() {
        let config = PrinterConfig::from_json(
            r#"{ "status_characteristic": {
                    "service": "0000ff00-0000-1000-8000-00805f9b34fb",
                    "characteristic": "0000ff03-0000-1000-8000-00805f9b34fb" } }"#,
        )
        .unwrap();
        let status = config.status_characteristic.unwrap();
        assert_eq!(status.service, uuid_from_u16(0xFF00));
        assert_eq!(status.characteristic, uuid_from_u16(0xFF03));
    }

    #[test]
    fn test_pacing_builder() {
        let config =
            PrinterConfig::default().with_pacing(Duration::ZERO, Duration::from_millis(250));
        assert!(config.chunk_delay().is_zero());
        assert_eq!(config.copy_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_discovery_filter_requests_optional_services() {
        let filter = PrinterConfig::default().discovery_filter();
        assert!(filter.optional_services.contains(&BATTERY_SERVICE));
        assert!(filter.optional_services.contains(&DEVICE_INFORMATION_SERVICE));
    }
}
