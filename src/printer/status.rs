//! # Capability and Status Queries
//!
//! Reads against standard GATT services (battery, device information) and the
//! optional vendor status byte.
//!
//! ## Failure Policy
//!
//! Capability reads never fail. A missing service, a missing characteristic
//! or a rejected read all degrade to "unknown" (`None` / empty field), and
//! printing goes ahead regardless. Only [`check_printer_status`] feeds a
//! decision, and it too reports `Unknown` instead of an error.

use std::fmt;

use btleplug::api::bleuuid::uuid_from_u16;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::{BATTERY_SERVICE, DEVICE_INFORMATION_SERVICE, PrinterConfig};
use crate::session::DeviceHandle;
use crate::transport::{CharacteristicRef, GattDevice};

/// Battery Level (percent, one byte)
pub const BATTERY_LEVEL: Uuid = uuid_from_u16(0x2A19);

/// Model Number String
pub const MODEL_NUMBER: Uuid = uuid_from_u16(0x2A24);

/// Firmware Revision String
pub const FIRMWARE_REVISION: Uuid = uuid_from_u16(0x2A26);

/// Manufacturer Name String
pub const MANUFACTURER_NAME: Uuid = uuid_from_u16(0x2A29);

/// Status byte: paper out
const STATUS_PAPER_OUT: u8 = 0x01;

/// Status byte: cover open
const STATUS_COVER_OPEN: u8 = 0x02;

/// Printer readiness as reported before a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterStatus {
    Ready,
    PaperOut,
    CoverOpen,
    Unknown,
}

impl PrinterStatus {
    /// Decode the vendor status byte. Paper out wins over cover open.
    pub fn from_status_byte(byte: u8) -> Self {
        if byte & STATUS_PAPER_OUT != 0 {
            Self::PaperOut
        } else if byte & STATUS_COVER_OPEN != 0 {
            Self::CoverOpen
        } else {
            Self::Ready
        }
    }

    /// Whether a job must be refused. `Unknown` does not block.
    pub fn blocks_printing(self) -> bool {
        matches!(self, Self::PaperOut | Self::CoverOpen)
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::PaperOut => "paper out",
            Self::CoverOpen => "cover open",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Whatever the device information service was willing to tell us.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterInfo {
    /// Advertised name
    pub name: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub manufacturer: Option<String>,
}

async fn read_string<D: GattDevice>(handle: &DeviceHandle<D>, characteristic: Uuid) -> Option<String> {
    let target = CharacteristicRef::new(DEVICE_INFORMATION_SERVICE, characteristic);
    match handle.device().read(target).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string();
            (!text.is_empty()).then_some(text)
        }
        Err(e) => {
            debug!(%characteristic, "device information read failed: {}", e);
            None
        }
    }
}

/// Battery percentage, or `None` when the printer has no battery service.
pub async fn battery_level<D: GattDevice>(handle: &DeviceHandle<D>) -> Option<u8> {
    if !handle.is_live().await {
        return None;
    }
    let target = CharacteristicRef::new(BATTERY_SERVICE, BATTERY_LEVEL);
    match handle.device().read(target).await {
        Ok(bytes) => bytes.first().map(|level| (*level).min(100)),
        Err(e) => {
            debug!("battery read failed: {}", e);
            None
        }
    }
}

/// Model, firmware and manufacturer. Each field is read independently.
pub async fn device_details<D: GattDevice>(handle: &DeviceHandle<D>) -> PrinterInfo {
    let mut info = PrinterInfo {
        name: handle.device().name(),
        ..Default::default()
    };
    if !handle.is_live().await {
        return info;
    }
    info.model = read_string(handle, MODEL_NUMBER).await;
    info.firmware = read_string(handle, FIRMWARE_REVISION).await;
    info.manufacturer = read_string(handle, MANUFACTURER_NAME).await;
    info
}

/// Current readiness.
///
/// | Situation | Result |
/// |-----------|--------|
/// | link down | `Unknown` |
/// | no status characteristic configured | `Ready` |
/// | status read failed or empty | `Unknown` |
/// | status byte read | decoded |
pub async fn check_printer_status<D: GattDevice>(
    handle: &DeviceHandle<D>,
    config: &PrinterConfig,
) -> PrinterStatus {
    if !handle.is_live().await {
        return PrinterStatus::Unknown;
    }
    let Some(target) = config.status_characteristic else {
        return PrinterStatus::Ready;
    };
    match handle.device().read(target).await {
        Ok(bytes) => match bytes.first() {
            Some(byte) => PrinterStatus::from_status_byte(*byte),
            None => PrinterStatus::Unknown,
        },
        Err(e) => {
            warn!("Status read failed: {}", e);
            PrinterStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_byte() {
        assert_eq!(PrinterStatus::from_status_byte(0x00), PrinterStatus::Ready);
        assert_eq!(PrinterStatus::from_status_byte(0x01), PrinterStatus::PaperOut);
        assert_eq!(PrinterStatus::from_status_byte(0x02), PrinterStatus::CoverOpen);
        assert_eq!(PrinterStatus::from_status_byte(0x03), PrinterStatus::PaperOut);
        assert_eq!(PrinterStatus::from_status_byte(0x80), PrinterStatus::Ready);
    }

    #[test]
    fn test_blocks_printing() {
        assert!(PrinterStatus::PaperOut.blocks_printing());
        assert!(PrinterStatus::CoverOpen.blocks_printing());
        assert!(!PrinterStatus::Ready.blocks_printing());
        assert!(!PrinterStatus::Unknown.blocks_printing());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&PrinterStatus::PaperOut).unwrap(),
            "\"paper_out\""
        );
        assert_eq!(PrinterStatus::CoverOpen.to_string(), "cover open");
    }
}
