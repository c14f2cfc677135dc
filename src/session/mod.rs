//! # Device Session
//!
//! Owns the single cached printer connection for the application.
//!
//! ## Lifecycle
//!
//! ```text
//!              connect() / try_reconnect()
//!  Disconnected ───────────────────────────▶ Connected
//!       ▲                                        │
//!       └──── disconnect() / link lost ──────────┘
//! ```
//!
//! Every transition is published to the connection listeners. A listener is
//! also called once, immediately, with the state at registration time.
//!
//! ## Liveness
//!
//! Link loss is event driven. Each connection registers a disconnect watcher
//! that clears the cache; each connection also carries a generation number,
//! so a watcher from an earlier connection never clears a newer one. Callers
//! borrowing a [`DeviceHandle`] re-check [`DeviceHandle::is_live`] before use.
//!
//! ## Concurrency
//!
//! [`DeviceSession::connect`] and [`DeviceSession::try_reconnect`] queue on
//! one async lock, so overlapping callers share a single chooser prompt and
//! a single GATT connection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{PrinterError, Result};
use crate::printer::PrinterConfig;
use crate::printer::status::{self, PrinterInfo};
use crate::transport::{BleBackend, GattDevice};

pub mod preference;

pub use preference::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore};

/// Called with `true` on connect and `false` on disconnect.
pub type ConnectionListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Token returned by [`DeviceSession::add_connection_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// DEVICE HANDLE
// ============================================================================

/// Borrowed view of the session's connected device.
#[derive(Clone)]
pub struct DeviceHandle<D> {
    device: D,
    id: String,
    live: Arc<AtomicBool>,
}

impl<D: GattDevice> DeviceHandle<D> {
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Still the session's connection and still linked.
    pub async fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst) && self.device.is_connected().await
    }

    fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// SHARED STATE
// ============================================================================

struct State<D> {
    current: Option<DeviceHandle<D>>,
    info: Option<PrinterInfo>,
    generation: u64,
}

struct Shared<D> {
    state: Mutex<State<D>>,
    listeners: Mutex<Vec<(ListenerId, ConnectionListener)>>,
    next_listener: AtomicU64,
}

impl<D: GattDevice> Shared<D> {
    fn notify(&self, connected: bool) {
        let listeners: Vec<ConnectionListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(connected);
        }
    }

    /// Clear the cache if `generation` is still current. Returns whether it was.
    fn clear_if_current(&self, generation: u64) -> bool {
        let mut state = lock(&self.state);
        if state.generation != generation || state.current.is_none() {
            return false;
        }
        if let Some(handle) = state.current.take() {
            handle.retire();
        }
        state.info = None;
        true
    }

    fn link_lost(&self, generation: u64) {
        if self.clear_if_current(generation) {
            warn!("Printer disconnected");
            self.notify(false);
        }
    }
}

/// Reorder `devices` so the preferred id, if present, comes first.
pub fn order_by_preference<D: GattDevice>(mut devices: Vec<D>, preferred: Option<&str>) -> Vec<D> {
    if let Some(preferred) = preferred
        && let Some(pos) = devices.iter().position(|d| d.id() == preferred)
    {
        let device = devices.remove(pos);
        devices.insert(0, device);
    }
    devices
}

// ============================================================================
// SESSION
// ============================================================================

/// The application's printer session.
///
/// Construct once and share (`Arc`) with every component that prints.
pub struct DeviceSession<B: BleBackend> {
    backend: B,
    config: PrinterConfig,
    preferences: Arc<dyn PreferenceStore>,
    shared: Arc<Shared<B::Device>>,
    connecting: AsyncMutex<()>,
}

impl<B: BleBackend> DeviceSession<B> {
    pub fn new(backend: B, config: PrinterConfig, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self {
            backend,
            config,
            preferences,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    current: None,
                    info: None,
                    generation: 0,
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
            connecting: AsyncMutex::new(()),
        }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Return the live connection, or ask the chooser for a printer.
    ///
    /// ## Errors
    ///
    /// - `DeviceNotFound`: chooser cancelled or nothing matched
    /// - `Permission`: host blocks Bluetooth access
    /// - `Connection`: GATT connect failed or timed out
    pub async fn connect(&self) -> Result<DeviceHandle<B::Device>> {
        let _connecting = self.connecting.lock().await;
        if let Some(handle) = self.connected_device().await {
            debug!(device = %handle.id(), "reusing live connection");
            return Ok(handle);
        }
        let device = self
            .backend
            .request_device(&self.config.discovery_filter())
            .await?;
        self.establish(device).await
    }

    /// Connect to a previously authorized printer without prompting.
    ///
    /// The remembered printer is tried first, then the rest in backend order.
    /// Failures are logged; `None` means the session stays disconnected.
    pub async fn try_reconnect(&self) -> Option<DeviceHandle<B::Device>> {
        let _connecting = self.connecting.lock().await;
        if let Some(handle) = self.connected_device().await {
            return Some(handle);
        }

        let devices = match self
            .backend
            .authorized_devices(&self.config.discovery_filter())
            .await
        {
            Ok(devices) => devices,
            Err(e) => {
                debug!("No authorized devices: {}", e);
                return None;
            }
        };

        let preferred = self.preferences.last_device_id();
        for device in order_by_preference(devices, preferred.as_deref()) {
            let id = device.id();
            match self.establish(device).await {
                Ok(handle) => return Some(handle),
                Err(e) => warn!(device = %id, "Reconnect attempt failed: {}", e),
            }
        }
        None
    }

    async fn establish(&self, device: B::Device) -> Result<DeviceHandle<B::Device>> {
        let id = device.id();
        info!(device = %id, name = ?device.name(), "Connecting to printer");

        let deadline = self.config.connect_timeout();
        match timeout(deadline, device.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(PrinterError::Connection(format!(
                    "connect to {} timed out after {:?}",
                    id, deadline
                )));
            }
        }

        let watcher = match device.watch_disconnect().await {
            Ok(rx) => Some(rx),
            Err(e) => {
                warn!("Disconnect events unavailable, relying on polling: {}", e);
                None
            }
        };

        let handle = DeviceHandle {
            device,
            id: id.clone(),
            live: Arc::new(AtomicBool::new(true)),
        };

        let (generation, replaced) = {
            let mut state = lock(&self.shared.state);
            let replaced = state.current.take();
            if let Some(previous) = &replaced {
                previous.retire();
            }
            state.generation += 1;
            state.current = Some(handle.clone());
            state.info = None;
            (state.generation, replaced)
        };

        // Same id means the same peripheral, which now carries the new link
        if let Some(previous) = replaced
            && previous.id != id
        {
            info!(device = %previous.id, "Releasing replaced printer");
            if let Err(e) = previous.device.disconnect().await {
                warn!(device = %previous.id, "Disconnect failed: {}", e);
            }
        }

        if let Some(rx) = watcher {
            let shared = Arc::clone(&self.shared);
            let live = Arc::clone(&handle.live);
            tokio::spawn(async move {
                if rx.await.is_ok() {
                    live.store(false, Ordering::SeqCst);
                    shared.link_lost(generation);
                }
            });
        }

        if let Err(e) = self.preferences.set_last_device_id(&id) {
            warn!("Failed to remember printer: {}", e);
        }

        info!(device = %id, "Printer connected");
        self.shared.notify(true);
        Ok(handle)
    }

    /// Tear down the connection. Listeners hear `false` even if nothing was
    /// connected.
    pub async fn disconnect(&self) {
        let previous = {
            let mut state = lock(&self.shared.state);
            state.generation += 1;
            state.info = None;
            state.current.take()
        };

        if let Some(handle) = previous {
            handle.retire();
            if let Err(e) = handle.device.disconnect().await {
                warn!(device = %handle.id, "Disconnect failed: {}", e);
            }
            info!(device = %handle.id, "Printer disconnected");
        }
        self.shared.notify(false);
    }

    /// Subscribe to connection transitions. `listener` runs once right away.
    pub fn add_connection_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::SeqCst));
        let listener: ConnectionListener = Arc::new(listener);
        lock(&self.shared.listeners).push((id, Arc::clone(&listener)));
        listener(self.is_connected());
        id
    }

    /// Returns whether the listener was registered.
    pub fn remove_connection_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// The cached handle if it is still live.
    ///
    /// A stale cache entry is cleared here and reported to listeners.
    pub async fn connected_device(&self) -> Option<DeviceHandle<B::Device>> {
        let (handle, generation) = {
            let state = lock(&self.shared.state);
            (state.current.clone()?, state.generation)
        };
        if handle.is_live().await {
            return Some(handle);
        }
        debug!(device = %handle.id, "cached printer is stale");
        self.shared.link_lost(generation);
        None
    }

    /// Cached connection state, without probing the link.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared.state)
            .current
            .as_ref()
            .is_some_and(|handle| handle.live.load(Ordering::SeqCst))
    }

    /// Device information for the current connection, read once and cached.
    pub async fn printer_info(&self) -> Option<PrinterInfo> {
        if let Some(info) = lock(&self.shared.state).info.clone() {
            return Some(info);
        }
        let handle = self.connected_device().await?;
        let info = status::device_details(&handle).await;
        let mut state = lock(&self.shared.state);
        if state
            .current
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(&current.live, &handle.live))
        {
            state.info = Some(info.clone());
        }
        Some(info)
    }

    /// Battery percentage of the current connection, if reported.
    pub async fn battery_level(&self) -> Option<u8> {
        let handle = self.connected_device().await?;
        status::battery_level(&handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockDevice, MockLog};

    fn ids(devices: &[MockDevice]) -> Vec<String> {
        devices.iter().map(|d| d.id()).collect()
    }

    #[test]
    fn test_preferred_moves_to_front() {
        let log = MockLog::new();
        let devices = vec![
            MockDevice::new("A", &log),
            MockDevice::new("B", &log),
            MockDevice::new("C", &log),
        ];
        let ordered = order_by_preference(devices, Some("B"));
        assert_eq!(ids(&ordered), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_unknown_preference_keeps_order() {
        let log = MockLog::new();
        let devices = vec![MockDevice::new("A", &log), MockDevice::new("B", &log)];
        assert_eq!(ids(&order_by_preference(devices.clone(), Some("Z"))), vec!["A", "B"]);
        assert_eq!(ids(&order_by_preference(devices, None)), vec!["A", "B"]);
    }
}
