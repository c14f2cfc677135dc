//! # Error Types
//!
//! This module defines the error taxonomy shared by the session manager,
//! transport and print orchestrator.
//!
//! ## Propagation Policy
//!
//! | Source | Policy |
//! |--------|--------|
//! | Battery / device-information reads | Swallowed, degrade to "unknown" |
//! | Speed / label type / justification | Logged, never propagated |
//! | Status check | Hard failure before any byte is sent |
//! | Payload writes | Hard failure, remaining copies abandoned |
//!
//! Every variant maps to a short actionable message through
//! [`PrinterError::user_message`]. [`PrinterError::Permission`] is never
//! folded into [`PrinterError::Connection`]: the remedy differs.

use thiserror::Error;
use uuid::Uuid;

use crate::printer::status::PrinterStatus;

/// Main error type for pocketlabel operations
#[derive(Debug, Error)]
pub enum PrinterError {
    /// The device chooser was cancelled or nothing matched the filters
    #[error("No printer found: {0}")]
    DeviceNotFound(String),

    /// The host has no usable Bluetooth Low Energy stack
    #[error("Bluetooth LE unsupported: {0}")]
    UnsupportedPlatform(String),

    /// GATT connect failed or the link dropped mid-operation
    #[error("Connection error: {0}")]
    Connection(String),

    /// Host policy blocks Bluetooth access
    #[error("Bluetooth permission denied: {0}")]
    Permission(String),

    /// None of the candidate services exposes a writable characteristic
    #[error("No writable characteristic found on any known printer service")]
    NoWritableCharacteristic,

    /// A readable characteristic is absent on the device
    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// Status query reported a condition that prevents printing
    #[error("Printer not ready: {0}")]
    PrinterNotReady(PrinterStatus),

    /// A write failed part-way through a print job
    #[error(
        "Write failed after {copies_completed} of {copies_requested} copies: {reason}"
    )]
    TransportWrite {
        /// Copies whose every byte was acknowledged by the transport
        copies_completed: u32,
        /// Copies the caller asked for
        copies_requested: u32,
        reason: String,
    },

    /// Input bitmap is unusable (zero-sized, wrong buffer length, too large)
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PrinterError {
    /// Short, actionable message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DeviceNotFound(_) => {
                "No printer selected. Turn the printer on, keep it nearby and try again."
            }
            Self::UnsupportedPlatform(_) => {
                "This device has no Bluetooth LE support. Use a device with Bluetooth LE."
            }
            Self::Connection(_) => "Lost connection to the printer. Reconnect and try again.",
            Self::Permission(_) => {
                "Bluetooth access is blocked here. Grant Bluetooth permission or run outside this context."
            }
            Self::NoWritableCharacteristic => {
                "This printer model is not supported: no writable channel found."
            }
            Self::CharacteristicNotFound(_) => "The printer does not report this information.",
            Self::PrinterNotReady(PrinterStatus::PaperOut) => "Printer is out of paper. Load labels.",
            Self::PrinterNotReady(PrinterStatus::CoverOpen) => "Printer cover is open. Close it.",
            Self::PrinterNotReady(_) => "Printer is not ready. Check paper and cover.",
            Self::TransportWrite { .. } => {
                "Printing was interrupted. Check the printer and reconnect before retrying."
            }
            Self::InvalidImage(_) => "The label image is empty or malformed.",
            Self::Config(_) | Self::Json(_) => "Printer configuration is invalid.",
            Self::Io(_) => "Could not read or write a local file.",
        }
    }

    /// Whether recovery requires tearing down and re-establishing the link.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::TransportWrite { .. })
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, PrinterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_message_differs_from_connection() {
        let permission = PrinterError::Permission("blocked".into());
        let connection = PrinterError::Connection("dropped".into());
        assert_ne!(permission.user_message(), connection.user_message());
        assert!(!permission.requires_reconnect());
        assert!(connection.requires_reconnect());
    }

    #[test]
    fn test_transport_write_display_reports_progress() {
        let err = PrinterError::TransportWrite {
            copies_completed: 1,
            copies_requested: 3,
            reason: "gatt write rejected".into(),
        };
        assert_eq!(
            err.to_string(),
            "Write failed after 1 of 3 copies: gatt write rejected"
        );
    }

    #[test]
    fn test_not_ready_messages() {
        let paper = PrinterError::PrinterNotReady(PrinterStatus::PaperOut);
        let cover = PrinterError::PrinterNotReady(PrinterStatus::CoverOpen);
        assert!(paper.user_message().contains("paper"));
        assert!(cover.user_message().contains("cover"));
    }
}
