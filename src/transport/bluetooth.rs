//! # Bluetooth LE Transport
//!
//! [`BleBackend`] / [`GattDevice`] implementation on top of `btleplug`.
//!
//! ## Device Chooser
//!
//! There is no platform picker dialog, so the chooser scans for
//! `scan_window`, keeps peripherals matching the [`DiscoveryFilter`], orders
//! them by signal strength, and hands the list to an optional
//! [`DeviceChooser`] callback. Without a callback the strongest match wins.
//!
//! ## Error Mapping
//!
//! | btleplug | PrinterError |
//! |----------|--------------|
//! | `PermissionDenied` | `Permission` |
//! | `NotSupported` | `UnsupportedPlatform` |
//! | `DeviceNotFound` | `DeviceNotFound` |
//! | anything else | `Connection` |
//!
//! ## Linux Setup
//!
//! BlueZ must be running and the user must be allowed on the system D-Bus
//! `org.bluez` interface; otherwise every call maps to `Permission`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central as _, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{
    BleBackend, CharProps, CharacteristicRef, DiscoveryFilter, GattCharacteristic, GattDevice,
    GattService, WriteMode,
};
use crate::error::{PrinterError, Result};
use crate::printer::PrinterConfig;

/// One entry shown to a [`DeviceChooser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// Picks an index from the candidate list, or `None` to cancel.
pub type DeviceChooser = Arc<dyn Fn(&[Candidate]) -> Option<usize> + Send + Sync>;

/// Map a btleplug error onto the crate taxonomy.
fn classify(err: btleplug::Error, context: &str) -> PrinterError {
    match err {
        btleplug::Error::PermissionDenied => {
            PrinterError::Permission(format!("{}: permission denied", context))
        }
        btleplug::Error::NotSupported(msg) => {
            PrinterError::UnsupportedPlatform(format!("{}: {}", context, msg))
        }
        btleplug::Error::DeviceNotFound => {
            PrinterError::DeviceNotFound(format!("{}: device not found", context))
        }
        other => PrinterError::Connection(format!("{}: {}", context, other)),
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// Bluetooth LE back end bound to the first local adapter.
pub struct BtleBackend {
    adapter: Adapter,
    scan_window: Duration,
    chooser: Option<DeviceChooser>,
}

impl BtleBackend {
    /// Open the first Bluetooth adapter.
    ///
    /// ## Errors
    ///
    /// - `UnsupportedPlatform` when no adapter exists
    /// - `Permission` when the host refuses access to the Bluetooth stack
    pub async fn new(config: &PrinterConfig) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| classify(e, "open Bluetooth manager"))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| classify(e, "list Bluetooth adapters"))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PrinterError::UnsupportedPlatform("no Bluetooth adapter available".to_string())
            })?;

        info!("Bluetooth adapter ready");
        Ok(Self {
            adapter,
            scan_window: config.scan_window(),
            chooser: None,
        })
    }

    /// Install a chooser callback used by `request_device`.
    pub fn with_chooser(mut self, chooser: DeviceChooser) -> Self {
        self.chooser = Some(chooser);
        self
    }

    /// Known peripherals matching `filter`, strongest signal first.
    async fn matching(&self, filter: &DiscoveryFilter) -> Result<Vec<(Candidate, BtleDevice)>> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| classify(e, "list peripherals"))?;

        let mut found = Vec::new();
        for peripheral in peripherals {
            let props = match peripheral.properties().await {
                Ok(Some(props)) => props,
                _ => continue,
            };
            if !filter.matches(props.local_name.as_deref(), &props.services) {
                continue;
            }
            let device = BtleDevice::new(self.adapter.clone(), peripheral, props.local_name);
            let candidate = Candidate {
                id: device.id(),
                name: device.name(),
                rssi: props.rssi,
            };
            found.push((candidate, device));
        }

        found.sort_by(|a, b| b.0.rssi.unwrap_or(i16::MIN).cmp(&a.0.rssi.unwrap_or(i16::MIN)));
        Ok(found)
    }
}

#[async_trait]
impl BleBackend for BtleBackend {
    type Device = BtleDevice;

    async fn request_device(&self, filter: &DiscoveryFilter) -> Result<BtleDevice> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| classify(e, "start scan"))?;
        debug!(window = ?self.scan_window, "scanning for printers");
        tokio::time::sleep(self.scan_window).await;

        let found = self.matching(filter).await;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
        let found = found?;

        if found.is_empty() {
            return Err(PrinterError::DeviceNotFound(
                "no printer matched the name or service filters".to_string(),
            ));
        }

        let index = match &self.chooser {
            Some(chooser) => {
                let candidates: Vec<Candidate> = found.iter().map(|(c, _)| c.clone()).collect();
                chooser(&candidates).ok_or_else(|| {
                    PrinterError::DeviceNotFound("device selection cancelled".to_string())
                })?
            }
            None => 0,
        };

        found
            .into_iter()
            .nth(index)
            .map(|(_, device)| device)
            .ok_or_else(|| PrinterError::DeviceNotFound(format!("no candidate at index {}", index)))
    }

    async fn authorized_devices(&self, filter: &DiscoveryFilter) -> Result<Vec<BtleDevice>> {
        Ok(self
            .matching(filter)
            .await?
            .into_iter()
            .map(|(_, device)| device)
            .collect())
    }
}

// ============================================================================
// DEVICE
// ============================================================================

/// A `btleplug` peripheral plus the adapter that reports its events.
#[derive(Clone)]
pub struct BtleDevice {
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
}

impl BtleDevice {
    fn new(adapter: Adapter, peripheral: Peripheral, name: Option<String>) -> Self {
        Self {
            adapter,
            peripheral,
            name,
        }
    }

    fn find(&self, service: uuid::Uuid, characteristic: uuid::Uuid) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
    }
}

fn props(flags: CharPropFlags) -> CharProps {
    CharProps {
        read: flags.contains(CharPropFlags::READ),
        write: flags.contains(CharPropFlags::WRITE),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: flags.contains(CharPropFlags::NOTIFY),
    }
}

#[async_trait]
impl GattDevice for BtleDevice {
    fn id(&self) -> String {
        self.peripheral.id().to_string()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn connect(&self) -> Result<()> {
        self.peripheral
            .connect()
            .await
            .map_err(|e| classify(e, "GATT connect"))?;
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| classify(e, "service discovery"))?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| classify(e, "GATT disconnect"))
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn services(&self) -> Result<Vec<GattService>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service
                    .characteristics
                    .into_iter()
                    .map(|c| GattCharacteristic {
                        uuid: c.uuid,
                        service: c.service_uuid,
                        properties: props(c.properties),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn read(&self, target: CharacteristicRef) -> Result<Vec<u8>> {
        let characteristic = self
            .find(target.service, target.characteristic)
            .ok_or(PrinterError::CharacteristicNotFound(target.characteristic))?;
        self.peripheral
            .read(&characteristic)
            .await
            .map_err(|e| classify(e, "GATT read"))
    }

    async fn write(&self, target: &GattCharacteristic, data: &[u8], mode: WriteMode) -> Result<()> {
        let characteristic = self
            .find(target.service, target.uuid)
            .ok_or(PrinterError::CharacteristicNotFound(target.uuid))?;
        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(&characteristic, data, write_type)
            .await
            .map_err(|e| classify(e, "GATT write"))
    }

    async fn watch_disconnect(&self) -> Result<oneshot::Receiver<()>> {
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| classify(e, "subscribe to adapter events"))?;
        let id = self.peripheral.id();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(gone) = event
                    && gone == id
                {
                    debug!("Peripheral {} reported disconnect", gone);
                    let _ = tx.send(());
                    return;
                }
            }
        });

        Ok(rx)
    }
}
