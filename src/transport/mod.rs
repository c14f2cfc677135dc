//! # Printer Transport Layer
//!
//! GATT abstractions the session manager and print orchestrator are written
//! against, plus the back ends that implement them.
//!
//! ## Available Transports
//!
//! - [`bluetooth`]: Bluetooth Low Energy via `btleplug`
//! - [`mock`]: in-memory device that records every write, for tests
//!
//! ## Seams
//!
//! | Trait | Responsibility |
//! |-------|----------------|
//! | [`BleBackend`] | device chooser, previously authorized devices |
//! | [`GattDevice`] | connect, service discovery, read, write, link-loss signal |
//!
//! [`writer::CharacteristicWriter`] sits on top of a [`GattDevice`] and owns
//! characteristic selection, chunking and pacing, so the image pipeline and
//! command encoder never see a back end.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::Result;

pub mod bluetooth;
pub mod mock;
pub mod writer;

pub use bluetooth::{BtleBackend, BtleDevice};
pub use writer::{CharacteristicWriter, WriteFailure};

// ============================================================================
// GATT TYPES
// ============================================================================

/// GATT write flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Acknowledged write; gives back-pressure
    WithResponse,
    /// Unacknowledged write; higher throughput
    WithoutResponse,
}

/// Characteristic property flags relevant to this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharProps {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
}

/// A discovered characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    /// Service the characteristic belongs to
    pub service: Uuid,
    pub properties: CharProps,
}

impl GattCharacteristic {
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.properties.write || self.properties.write_without_response
    }

    /// Unacknowledged writes when available, acknowledged otherwise.
    #[inline]
    pub fn preferred_write_mode(&self) -> WriteMode {
        if self.properties.write_without_response {
            WriteMode::WithoutResponse
        } else {
            WriteMode::WithResponse
        }
    }
}

/// A discovered primary service with its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

/// Address of a characteristic inside a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacteristicRef {
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl CharacteristicRef {
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

/// Device chooser filters.
///
/// A device matches when its advertised name starts with any prefix, or it
/// advertises any of `services`. `optional_services` names the services read
/// after connecting. They are never used for matching, and btleplug exposes
/// every discovered service once connected, so [`BtleBackend`] needs no
/// separate grant for them.
///
/// [`BtleBackend`]: bluetooth::BtleBackend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryFilter {
    pub name_prefixes: Vec<String>,
    pub services: Vec<Uuid>,
    pub optional_services: Vec<Uuid>,
}

impl DiscoveryFilter {
    pub fn matches(&self, name: Option<&str>, advertised: &[Uuid]) -> bool {
        let by_name = name.is_some_and(|n| {
            self.name_prefixes
                .iter()
                .any(|prefix| n.starts_with(prefix.as_str()))
        });
        by_name || advertised.iter().any(|uuid| self.services.contains(uuid))
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// A remote GATT peripheral.
///
/// Implementations are cheap to clone; clones refer to the same peripheral.
#[async_trait]
pub trait GattDevice: Clone + Send + Sync + 'static {
    /// Stable identifier, persisted as the reconnect preference
    fn id(&self) -> String;

    /// Advertised name, if known
    fn name(&self) -> Option<String>;

    /// Establish the GATT link and discover services
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn is_connected(&self) -> bool;

    /// Services discovered on the live link
    async fn services(&self) -> Result<Vec<GattService>>;

    async fn read(&self, target: CharacteristicRef) -> Result<Vec<u8>>;

    async fn write(&self, target: &GattCharacteristic, data: &[u8], mode: WriteMode)
    -> Result<()>;

    /// Receiver completed once when the link is lost.
    async fn watch_disconnect(&self) -> Result<oneshot::Receiver<()>>;
}

/// Platform entry point: chooser and previously authorized devices.
#[async_trait]
pub trait BleBackend: Send + Sync + 'static {
    type Device: GattDevice;

    /// Let the user (or a policy) pick one device matching `filter`.
    ///
    /// Cancellation and "nothing found" both yield `DeviceNotFound`.
    async fn request_device(&self, filter: &DiscoveryFilter) -> Result<Self::Device>;

    /// Devices the host already knows and may connect to without prompting.
    async fn authorized_devices(&self, filter: &DiscoveryFilter) -> Result<Vec<Self::Device>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::bleuuid::uuid_from_u16;

    fn filter() -> DiscoveryFilter {
        DiscoveryFilter {
            name_prefixes: vec!["M110".into(), "Q199".into()],
            services: vec![uuid_from_u16(0xFF00)],
            optional_services: vec![],
        }
    }

    #[test]
    fn test_filter_matches_name_prefix() {
        assert!(filter().matches(Some("M110-A2F1"), &[]));
        assert!(!filter().matches(Some("Speaker"), &[]));
        assert!(!filter().matches(None, &[]));
    }

    #[test]
    fn test_filter_matches_service() {
        assert!(filter().matches(None, &[uuid_from_u16(0xFF00)]));
        assert!(!filter().matches(Some("Speaker"), &[uuid_from_u16(0x180F)]));
    }

    #[test]
    fn test_preferred_write_mode() {
        let mut c = GattCharacteristic {
            uuid: uuid_from_u16(0xFF02),
            service: uuid_from_u16(0xFF00),
            properties: CharProps {
                write: true,
                ..Default::default()
            },
        };
        assert!(c.is_writable());
        assert_eq!(c.preferred_write_mode(), WriteMode::WithResponse);
        c.properties.write_without_response = true;
        assert_eq!(c.preferred_write_mode(), WriteMode::WithoutResponse);
    }
}
