//! # Characteristic Writer
//!
//! Selects the printer's data characteristic and writes byte sequences to
//! it, splitting payloads into fixed-size chunks with pacing in between.
//!
//! ## Characteristic Discovery
//!
//! Candidate services are probed in configuration order. Within the first
//! candidate service present on the device that holds a writable
//! characteristic, the first such characteristic is used.
//!
//! ## Chunked Writes
//!
//! ```text
//! payload: [ 60 B ][ 60 B ][ 60 B ][ 23 B ]
//!                 ^       ^       ^
//!            chunk_delay between chunks, none after the last
//! ```
//!
//! Chunks go out strictly in order, one at a time. Each write is bounded by
//! `write_timeout`; expiry is reported as [`WriteFailure::TimedOut`] and the
//! link must be re-established.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{GattCharacteristic, GattDevice, GattService, WriteMode};
use crate::error::{PrinterError, Result};
use crate::printer::PrinterConfig;
use crate::session::DeviceHandle;

/// Why a write did not complete.
#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error("printer disconnected")]
    Disconnected,

    #[error("write timed out after {0:?}")]
    TimedOut(Duration),

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// First writable characteristic of the first candidate service offering one.
pub fn find_writable(services: &[GattService], candidates: &[Uuid]) -> Option<GattCharacteristic> {
    candidates.iter().find_map(|candidate| {
        services
            .iter()
            .filter(|service| service.uuid == *candidate)
            .flat_map(|service| service.characteristics.iter())
            .find(|c| c.is_writable())
            .cloned()
    })
}

/// Writer bound to one device's data characteristic.
pub struct CharacteristicWriter<D: GattDevice> {
    handle: DeviceHandle<D>,
    target: GattCharacteristic,
    mode: WriteMode,
    chunk_size: usize,
    chunk_delay: Duration,
    write_timeout: Duration,
}

impl<D: GattDevice> CharacteristicWriter<D> {
    /// Discover the data characteristic on a connected device.
    pub async fn discover(handle: &DeviceHandle<D>, config: &PrinterConfig) -> Result<Self> {
        if !handle.is_live().await {
            return Err(PrinterError::Connection(format!(
                "{} is no longer connected",
                handle.id()
            )));
        }

        let services = handle.device().services().await?;
        let target = find_writable(&services, &config.service_uuids)
            .ok_or(PrinterError::NoWritableCharacteristic)?;
        let mode = target.preferred_write_mode();
        debug!(
            service = %target.service,
            characteristic = %target.uuid,
            ?mode,
            "selected data characteristic"
        );

        Ok(Self {
            handle: handle.clone(),
            target,
            mode,
            chunk_size: config.chunk_size.max(1),
            chunk_delay: config.chunk_delay(),
            write_timeout: config.write_timeout(),
        })
    }

    pub fn characteristic(&self) -> &GattCharacteristic {
        &self.target
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Number of writes `send_chunked` will issue for `len` bytes.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Fail fast if the link dropped since the writer was created.
    pub async fn ensure_live(&self) -> std::result::Result<(), WriteFailure> {
        if self.handle.is_live().await {
            Ok(())
        } else {
            Err(WriteFailure::Disconnected)
        }
    }

    /// Write one command in a single GATT write.
    pub async fn send(&self, bytes: &[u8]) -> std::result::Result<(), WriteFailure> {
        trace!(len = bytes.len(), "write");
        match timeout(
            self.write_timeout,
            self.handle.device().write(&self.target, bytes, self.mode),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WriteFailure::Rejected(e.to_string())),
            Err(_) => Err(WriteFailure::TimedOut(self.write_timeout)),
        }
    }

    /// Write a payload in order, `chunk_size` bytes at a time.
    ///
    /// Returns the number of chunks written.
    pub async fn send_chunked(&self, bytes: &[u8]) -> std::result::Result<usize, WriteFailure> {
        let total = self.chunk_count(bytes.len());
        for (i, chunk) in bytes.chunks(self.chunk_size).enumerate() {
            self.send(chunk).await?;
            if i + 1 < total && !self.chunk_delay.is_zero() {
                sleep(self.chunk_delay).await;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CharProps;
    use btleplug::api::bleuuid::uuid_from_u16;

    fn characteristic(service: u16, uuid: u16, write: bool) -> GattCharacteristic {
        GattCharacteristic {
            uuid: uuid_from_u16(uuid),
            service: uuid_from_u16(service),
            properties: CharProps {
                read: !write,
                write,
                ..Default::default()
            },
        }
    }

    fn service(uuid: u16, characteristics: Vec<GattCharacteristic>) -> GattService {
        GattService {
            uuid: uuid_from_u16(uuid),
            characteristics,
        }
    }

    #[test]
    fn test_first_candidate_wins() {
        let services = vec![
            service(0xAE30, vec![characteristic(0xAE30, 0xAE01, true)]),
            service(0xFF00, vec![characteristic(0xFF00, 0xFF02, true)]),
        ];
        let candidates = [uuid_from_u16(0xFF00), uuid_from_u16(0xAE30)];
        let found = find_writable(&services, &candidates).unwrap();
        assert_eq!(found.uuid, uuid_from_u16(0xFF02));
    }

    #[test]
    fn test_first_writable_within_service() {
        let services = vec![service(
            0xFF00,
            vec![
                characteristic(0xFF00, 0xFF01, false),
                characteristic(0xFF00, 0xFF02, true),
                characteristic(0xFF00, 0xFF03, true),
            ],
        )];
        let found = find_writable(&services, &[uuid_from_u16(0xFF00)]).unwrap();
        assert_eq!(found.uuid, uuid_from_u16(0xFF02));
    }

    #[test]
    fn test_falls_through_read_only_service() {
        let services = vec![
            service(0xFF00, vec![characteristic(0xFF00, 0xFF01, false)]),
            service(0x18F0, vec![characteristic(0x18F0, 0x2AF1, true)]),
        ];
        let candidates = [uuid_from_u16(0xFF00), uuid_from_u16(0x18F0)];
        let found = find_writable(&services, &candidates).unwrap();
        assert_eq!(found.uuid, uuid_from_u16(0x2AF1));
    }

    #[test]
    fn test_none_when_no_candidate_matches() {
        let services = vec![service(0x180F, vec![characteristic(0x180F, 0x2A19, false)])];
        assert!(find_writable(&services, &[uuid_from_u16(0xFF00)]).is_none());
    }
}
