//! # Printer Module
//!
//! Configuration, per-print settings, capability queries and the print job
//! orchestrator.
//!
//! ## Modules
//!
//! - [`config`]: Hardware and transport parameters
//! - [`settings`]: Per-print settings from the label editor
//! - [`status`]: Battery, device information and readiness
//! - [`job`]: Label, calibration and feed jobs

pub mod config;
pub mod job;
pub mod settings;
pub mod status;

pub use config::PrinterConfig;
pub use job::{LabelPrinter, PrintReport};
pub use settings::PrintSettings;
pub use status::{PrinterInfo, PrinterStatus};
