//! # Pocketlabel - BLE Thermal Label Printer Driver
//!
//! Pocketlabel drives small Bluetooth Low Energy thermal label printers. It
//! provides:
//!
//! - **Session management**: one cached connection, reconnect to the last
//!   used printer, connection listeners
//! - **Image pipeline**: RGBA to 1-bit raster with density, offset,
//!   auto-rotation and Floyd–Steinberg dithering
//! - **Protocol implementation**: pure command builders
//! - **Transport**: chunked, paced GATT writes over `btleplug`
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pocketlabel::{
//!     DeviceSession, LabelPrinter, PrintSettings, PrinterConfig,
//!     render::RgbaFrame,
//!     session::MemoryPreferenceStore,
//!     transport::BtleBackend,
//! };
//!
//! # async fn demo() -> pocketlabel::error::Result<()> {
//! let config = PrinterConfig::default();
//! let backend = BtleBackend::new(&config).await?;
//! let session = Arc::new(DeviceSession::new(
//!     backend,
//!     config,
//!     Arc::new(MemoryPreferenceStore::new()),
//! ));
//! let printer = LabelPrinter::new(session);
//!
//! let pixels = vec![255u8; 320 * 240 * 4];
//! let frame = RgbaFrame::new(320, 240, &pixels)?;
//! printer.print_label(&frame, &PrintSettings::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | Connection cache, reconnect, listeners |
//! | [`render`] | Grayscale, dithering and bit packing |
//! | [`protocol`] | Command builders |
//! | [`transport`] | GATT traits, btleplug and mock back ends |
//! | [`printer`] | Configuration, status and print jobs |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Phomemo-style printers advertising as M02, M110, M120, M200, M220, M221,
//! T02 or Q199, and devices exposing one of the known data services.

pub mod error;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::PrinterError;
pub use printer::{LabelPrinter, PrintSettings, PrinterConfig};
pub use session::DeviceSession;
