//! In-memory transport for tests and dry runs.
//!
//! A [`MockDevice`] exposes a printer-shaped GATT table and appends every
//! connect, write and disconnect to a shared [`MockLog`], so a test can
//! assert on the exact bytes and their order. A [`MockBackend`] plays the
//! chooser with a scripted [`ChooserOutcome`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::bleuuid::uuid_from_u16;
use tokio::sync::oneshot;
use tokio::time::sleep;
use uuid::Uuid;

use super::{
    BleBackend, CharProps, CharacteristicRef, DiscoveryFilter, GattCharacteristic, GattDevice,
    GattService, WriteMode,
};
use crate::error::{PrinterError, Result};

/// Data service exposed by every mock device
pub const DATA_SERVICE: Uuid = uuid_from_u16(0xFF00);

/// Writable data characteristic (write and write-without-response)
pub const DATA_CHARACTERISTIC: Uuid = uuid_from_u16(0xFF02);

/// Vendor status byte, readable
pub const STATUS: CharacteristicRef = CharacteristicRef::new(DATA_SERVICE, uuid_from_u16(0xFF03));

const DEVICE_INFORMATION: Uuid = uuid_from_u16(0x180A);
const BATTERY: Uuid = uuid_from_u16(0x180F);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// EVENT LOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Connect(String),
    Write {
        device: String,
        characteristic: Uuid,
        data: Vec<u8>,
        mode: WriteMode,
    },
    Disconnect(String),
}

/// Ordered record shared by every device created against it.
#[derive(Debug, Clone, Default)]
pub struct MockLog {
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: MockEvent) {
        lock(&self.events).push(event);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.events).clone()
    }

    /// Payload of every write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                MockEvent::Write { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// All written bytes concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes().concat()
    }

    /// Device ids in the order connects were attempted.
    pub fn connect_attempts(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                MockEvent::Connect(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

// ============================================================================
// DEVICE
// ============================================================================

struct DeviceState {
    id: String,
    name: Option<String>,
    log: MockLog,
    services: Mutex<Vec<GattService>>,
    reads: Mutex<HashMap<CharacteristicRef, Vec<u8>>>,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    stall_writes: AtomicBool,
    /// Writes still allowed to succeed; `None` is unlimited
    write_budget: Mutex<Option<usize>>,
    watchers: Mutex<Vec<oneshot::Sender<()>>>,
}

/// Scriptable printer. Clones share state.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<DeviceState>,
}

fn characteristic(service: Uuid, uuid: u16, properties: CharProps) -> GattCharacteristic {
    GattCharacteristic {
        uuid: uuid_from_u16(uuid),
        service,
        properties,
    }
}

fn default_services() -> Vec<GattService> {
    let readable = CharProps {
        read: true,
        ..Default::default()
    };
    vec![
        GattService {
            uuid: DATA_SERVICE,
            characteristics: vec![
                characteristic(
                    DATA_SERVICE,
                    0xFF01,
                    CharProps {
                        notify: true,
                        ..Default::default()
                    },
                ),
                characteristic(
                    DATA_SERVICE,
                    0xFF02,
                    CharProps {
                        write: true,
                        write_without_response: true,
                        ..Default::default()
                    },
                ),
                characteristic(
                    DATA_SERVICE,
                    0xFF03,
                    CharProps {
                        read: true,
                        notify: true,
                        ..Default::default()
                    },
                ),
            ],
        },
        GattService {
            uuid: DEVICE_INFORMATION,
            characteristics: vec![
                characteristic(DEVICE_INFORMATION, 0x2A24, readable),
                characteristic(DEVICE_INFORMATION, 0x2A26, readable),
                characteristic(DEVICE_INFORMATION, 0x2A29, readable),
            ],
        },
        GattService {
            uuid: BATTERY,
            characteristics: vec![characteristic(BATTERY, 0x2A19, readable)],
        },
    ]
}

fn default_reads() -> HashMap<CharacteristicRef, Vec<u8>> {
    let info = |uuid: u16| CharacteristicRef::new(DEVICE_INFORMATION, uuid_from_u16(uuid));
    HashMap::from([
        (info(0x2A24), b"M110".to_vec()),
        (info(0x2A26), b"1.0.7\0".to_vec()),
        (info(0x2A29), b"Phomemo".to_vec()),
        (
            CharacteristicRef::new(BATTERY, uuid_from_u16(0x2A19)),
            vec![87],
        ),
        (STATUS, vec![0x00]),
    ])
}

impl MockDevice {
    /// Printer with a data service, device information and battery.
    pub fn new(id: &str, log: &MockLog) -> Self {
        Self {
            state: Arc::new(DeviceState {
                id: id.to_string(),
                name: Some(format!("M110-{}", id)),
                log: log.clone(),
                services: Mutex::new(default_services()),
                reads: Mutex::new(default_reads()),
                connected: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                stall_writes: AtomicBool::new(false),
                write_budget: Mutex::new(None),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Replace the GATT table.
    pub fn set_services(&self, services: Vec<GattService>) {
        *lock(&self.state.services) = services;
    }

    /// Set (or with `None`, remove) the value returned by a read.
    pub fn set_read(&self, target: CharacteristicRef, value: Option<Vec<u8>>) {
        let mut reads = lock(&self.state.reads);
        match value {
            Some(value) => reads.insert(target, value),
            None => reads.remove(&target),
        };
    }

    /// Value of the vendor status characteristic at [`STATUS`].
    pub fn set_status_byte(&self, byte: u8) {
        self.set_read(STATUS, Some(vec![byte]));
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Let `count` more writes succeed, then reject the rest.
    pub fn fail_writes_after(&self, count: usize) {
        *lock(&self.state.write_budget) = Some(count);
    }

    /// Writes never complete.
    pub fn stall_writes(&self, stall: bool) {
        self.state.stall_writes.store(stall, Ordering::SeqCst);
    }

    /// Drop the link as if the printer powered off.
    pub fn simulate_disconnect(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
        self.fire_watchers();
    }

    /// Drop the link without delivering a disconnect event.
    pub fn drop_link_silently(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
    }

    fn fire_watchers(&self) {
        let watchers: Vec<_> = lock(&self.state.watchers).drain(..).collect();
        for watcher in watchers {
            let _ = watcher.send(());
        }
    }

    fn require_connection(&self) -> Result<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PrinterError::Connection(format!(
                "{} is not connected",
                self.state.id
            )))
        }
    }
}

#[async_trait]
impl GattDevice for MockDevice {
    fn id(&self) -> String {
        self.state.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.state.name.clone()
    }

    async fn connect(&self) -> Result<()> {
        self.state.log.push(MockEvent::Connect(self.state.id.clone()));
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(PrinterError::Connection(format!(
                "{} refused the connection",
                self.state.id
            )));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.connected.store(false, Ordering::SeqCst);
        self.state
            .log
            .push(MockEvent::Disconnect(self.state.id.clone()));
        self.fire_watchers();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn services(&self) -> Result<Vec<GattService>> {
        self.require_connection()?;
        Ok(lock(&self.state.services).clone())
    }

    async fn read(&self, target: CharacteristicRef) -> Result<Vec<u8>> {
        self.require_connection()?;
        lock(&self.state.reads)
            .get(&target)
            .cloned()
            .ok_or(PrinterError::CharacteristicNotFound(target.characteristic))
    }

    async fn write(&self, target: &GattCharacteristic, data: &[u8], mode: WriteMode) -> Result<()> {
        self.require_connection()?;
        if self.state.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        {
            let mut budget = lock(&self.state.write_budget);
            match budget.as_mut() {
                Some(0) => {
                    return Err(PrinterError::Connection("GATT write rejected".to_string()));
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }
        self.state.log.push(MockEvent::Write {
            device: self.state.id.clone(),
            characteristic: target.uuid,
            data: data.to_vec(),
            mode,
        });
        Ok(())
    }

    async fn watch_disconnect(&self) -> Result<oneshot::Receiver<()>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.state.watchers).push(tx);
        Ok(rx)
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// What the chooser does when `request_device` is called.
#[derive(Clone)]
pub enum ChooserOutcome {
    Select(MockDevice),
    Cancel,
    PermissionDenied,
    Unsupported,
}

pub struct MockBackend {
    chooser: Mutex<ChooserOutcome>,
    authorized: Mutex<Vec<MockDevice>>,
    chooser_requests: AtomicUsize,
    /// How long the user takes to pick
    chooser_delay: Duration,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            chooser: Mutex::new(ChooserOutcome::Cancel),
            authorized: Mutex::new(Vec::new()),
            chooser_requests: AtomicUsize::new(0),
            chooser_delay: Duration::ZERO,
        }
    }
}

impl MockBackend {
    /// Backend whose chooser cancels and that knows no devices.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chooser(self, outcome: ChooserOutcome) -> Self {
        self.set_chooser(outcome);
        self
    }

    pub fn with_chooser_delay(mut self, delay: Duration) -> Self {
        self.chooser_delay = delay;
        self
    }

    pub fn with_authorized(self, devices: Vec<MockDevice>) -> Self {
        *lock(&self.authorized) = devices;
        self
    }

    pub fn set_chooser(&self, outcome: ChooserOutcome) {
        *lock(&self.chooser) = outcome;
    }

    /// How many times the chooser was shown.
    pub fn chooser_requests(&self) -> usize {
        self.chooser_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleBackend for MockBackend {
    type Device = MockDevice;

    async fn request_device(&self, _filter: &DiscoveryFilter) -> Result<MockDevice> {
        self.chooser_requests.fetch_add(1, Ordering::SeqCst);
        if !self.chooser_delay.is_zero() {
            sleep(self.chooser_delay).await;
        }
        let outcome = lock(&self.chooser).clone();
        match outcome {
            ChooserOutcome::Select(device) => Ok(device),
            ChooserOutcome::Cancel => Err(PrinterError::DeviceNotFound(
                "device selection cancelled".to_string(),
            )),
            ChooserOutcome::PermissionDenied => Err(PrinterError::Permission(
                "Bluetooth blocked by host policy".to_string(),
            )),
            ChooserOutcome::Unsupported => Err(PrinterError::UnsupportedPlatform(
                "no Bluetooth adapter".to_string(),
            )),
        }
    }

    async fn authorized_devices(&self, _filter: &DiscoveryFilter) -> Result<Vec<MockDevice>> {
        Ok(lock(&self.authorized).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_requires_connection() {
        let log = MockLog::new();
        let device = MockDevice::new("A", &log);
        let target = &default_services()[0].characteristics[1];
        assert!(device.write(target, &[1], WriteMode::WithoutResponse).await.is_err());

        device.connect().await.unwrap();
        device.write(target, &[1, 2], WriteMode::WithoutResponse).await.unwrap();
        assert_eq!(log.writes(), vec![vec![1, 2]]);
        assert_eq!(log.connect_attempts(), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_write_budget() {
        let log = MockLog::new();
        let device = MockDevice::new("A", &log);
        let target = &default_services()[0].characteristics[1];
        device.connect().await.unwrap();
        device.fail_writes_after(1);
        assert!(device.write(target, &[1], WriteMode::WithResponse).await.is_ok());
        assert!(device.write(target, &[2], WriteMode::WithResponse).await.is_err());
        assert_eq!(log.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_simulated_disconnect_fires_watcher() {
        let log = MockLog::new();
        let device = MockDevice::new("A", &log);
        device.connect().await.unwrap();
        let rx = device.watch_disconnect().await.unwrap();
        device.simulate_disconnect();
        assert!(rx.await.is_ok());
        assert!(!device.is_connected().await);
    }
}
