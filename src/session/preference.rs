//! Persisted "last used printer" preference.
//!
//! Only a single device id is stored. It biases the reconnect candidate
//! order and is never treated as a session record.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub trait PreferenceStore: Send + Sync {
    fn last_device_id(&self) -> Option<String>;

    fn set_last_device_id(&self, id: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    id: Mutex<Option<String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(id: &str) -> Self {
        Self {
            id: Mutex::new(Some(id.to_string())),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn last_device_id(&self) -> Option<String> {
        self.id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_last_device_id(&self, id: &str) -> Result<()> {
        *self.id.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.id.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPreference {
    device_id: String,
    updated_at: DateTime<Utc>,
}

/// JSON file store: `{ "device_id": "...", "updated_at": "..." }`.
///
/// A missing or unreadable file means "no preference".
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the preference was last written.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.load().map(|stored| stored.updated_at)
    }

    fn load(&self) -> Option<StoredPreference> {
        let text = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&text).ok()
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn last_device_id(&self) -> Option<String> {
        self.load().map(|stored| stored.device_id)
    }

    fn set_last_device_id(&self, id: &str) -> Result<()> {
        let stored = StoredPreference {
            device_id: id.to_string(),
            updated_at: Utc::now(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
