//! # Print Orchestration
//!
//! Drives a label from RGBA pixels to the printer's data characteristic.
//!
//! ## Job Sequence
//!
//! ```text
//! convert ─▶ connect ─▶ status gate ─▶ discover characteristic
//!         ─▶ speed / label type / justification (best effort)
//!         ─▶ per copy: Init ─▶ Density ─▶ Header ─▶ payload chunks
//! ```
//!
//! The status gate runs before anything is written, so a printer that is out
//! of paper or has its cover open receives zero bytes. Rejected hardware
//! configuration commands are logged and the device defaults are used
//! instead; a configuration write that times out aborts the job.
//!
//! ## Failure Mid-Job
//!
//! A failed write abandons the remaining copies. Copies already sent are not
//! retried and cannot be recalled; the error reports how many completed. A
//! timed-out or dropped link also tears the session down so the next job
//! reconnects from scratch.
//!
//! ## Serialization
//!
//! The data characteristic cannot take overlapping writes. Jobs on one
//! [`LabelPrinter`] queue on an async mutex.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::settings::PrintSettings;
use super::status::{self, PrinterStatus};
use crate::error::{PrinterError, Result};
use crate::protocol::{commands, graphics};
use crate::render::pipeline::{self, PipelineOptions, RgbaFrame};
use crate::render::RasterImage;
use crate::session::DeviceSession;
use crate::transport::{BleBackend, CharacteristicWriter, WriteFailure};

/// What a completed job sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintReport {
    pub copies: u32,
    pub width_px: usize,
    pub height_px: usize,
    /// Init, density, header and payload bytes for one copy
    pub bytes_per_copy: usize,
    /// Payload writes per copy
    pub chunks_per_copy: usize,
}

pub struct LabelPrinter<B: BleBackend> {
    session: Arc<DeviceSession<B>>,
    print_lock: Mutex<()>,
}

impl<B: BleBackend> LabelPrinter<B> {
    pub fn new(session: Arc<DeviceSession<B>>) -> Self {
        Self {
            session,
            print_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &DeviceSession<B> {
        &self.session
    }

    /// Convert `frame` and print it `settings.copies` times.
    ///
    /// The image is converted before connecting, so an invalid frame never
    /// reaches the chooser.
    ///
    /// ## Errors
    ///
    /// - `InvalidImage`: zero-sized or inconsistent frame
    /// - `DeviceNotFound` / `Permission` / `Connection`: from connecting
    /// - `PrinterNotReady`: paper out or cover open, nothing was sent
    /// - `NoWritableCharacteristic`: unsupported model, nothing was sent
    /// - `TransportWrite`: a write failed; see `copies_completed`
    pub async fn print_label(
        &self,
        frame: &RgbaFrame<'_>,
        settings: &PrintSettings,
    ) -> Result<PrintReport> {
        let settings = settings.normalized();
        let options = PipelineOptions::from_settings(&settings, self.session.config().dpi);
        let raster = pipeline::convert(frame, &options)?;
        debug!(
            width = raster.width_px(),
            height = raster.height_px(),
            "label rasterized"
        );
        self.print_raster(&raster, &settings).await
    }

    /// Print an already packed raster.
    pub async fn print_raster(
        &self,
        raster: &RasterImage,
        settings: &PrintSettings,
    ) -> Result<PrintReport> {
        let settings = settings.normalized();
        let header = raster.header()?;
        let init = commands::init();
        let density = commands::density(settings.density);

        let _job = self.print_lock.lock().await;
        let config = self.session.config();
        let handle = self.session.connect().await?;

        let printer_status = status::check_printer_status(&handle, config).await;
        if printer_status.blocks_printing() {
            warn!(status = %printer_status, "Printer not ready, job refused");
            return Err(PrinterError::PrinterNotReady(printer_status));
        }

        let writer = CharacteristicWriter::discover(&handle, config).await?;
        if let Err(failure) = self.configure(&writer, &settings).await {
            return Err(self.abort(failure, 0, settings.copies).await);
        }

        let report = PrintReport {
            copies: settings.copies,
            width_px: raster.width_px(),
            height_px: raster.height_px(),
            bytes_per_copy: init.len() + density.len() + header.len() + raster.data().len(),
            chunks_per_copy: writer.chunk_count(raster.data().len()),
        };

        for copy in 0..settings.copies {
            if copy > 0 && !config.copy_delay().is_zero() {
                sleep(config.copy_delay()).await;
            }
            info!(copy = copy + 1, of = settings.copies, "Printing copy");

            let sent = async {
                writer.ensure_live().await?;
                writer.send(&init).await?;
                writer.send(&density).await?;
                writer.send(&header).await?;
                writer.send_chunked(raster.data()).await
            }
            .await;

            if let Err(failure) = sent {
                return Err(self.abort(failure, copy, settings.copies).await);
            }
        }

        info!(
            copies = report.copies,
            bytes = report.bytes_per_copy,
            chunks = report.chunks_per_copy,
            "Print job complete"
        );
        Ok(report)
    }

    /// Speed, label type and justification. A rejected command keeps the
    /// device default; a timeout or dropped link ends the job.
    async fn configure(
        &self,
        writer: &CharacteristicWriter<B::Device>,
        settings: &PrintSettings,
    ) -> std::result::Result<(), WriteFailure> {
        let steps = [
            ("speed", commands::speed(settings.speed)),
            ("label type", commands::label_type(settings.label_type)),
            (
                "justification",
                commands::justify(self.session.config().justification),
            ),
        ];
        for (what, bytes) in steps {
            match writer.send(&bytes).await {
                Ok(()) => {}
                Err(WriteFailure::Rejected(reason)) => {
                    warn!("Could not set {}, using printer default: {}", what, reason);
                }
                Err(failure) => return Err(failure),
            }
        }
        Ok(())
    }

    async fn abort(&self, failure: WriteFailure, completed: u32, requested: u32) -> PrinterError {
        warn!(completed, requested, "Print aborted: {}", failure);
        if matches!(failure, WriteFailure::TimedOut(_) | WriteFailure::Disconnected) {
            self.session.disconnect().await;
        }
        PrinterError::TransportWrite {
            copies_completed: completed,
            copies_requested: requested,
            reason: failure.to_string(),
        }
    }

    /// Print the fixed vertical-line pattern across `width_mm` and feed.
    pub async fn send_calibration_pattern(&self, width_mm: f32) -> Result<()> {
        let config = self.session.config();
        let width_bytes = config.mm_to_dots(width_mm).div_ceil(8).max(1);

        let _job = self.print_lock.lock().await;
        let handle = self.session.connect().await?;
        let writer = CharacteristicWriter::discover(&handle, config).await?;
        info!(width_mm, width_bytes, "Printing calibration pattern");

        let sent = async {
            writer.send(&commands::init()).await?;
            writer
                .send_chunked(&graphics::calibration_pattern(width_bytes))
                .await?;
            writer.send(&commands::feed_lines(config.feed_lines)).await
        }
        .await;

        match sent {
            Ok(()) => Ok(()),
            Err(failure) => Err(self.abort(failure, 0, 1).await),
        }
    }

    /// Advance the media by the configured number of lines.
    pub async fn feed_paper(&self) -> Result<()> {
        let config = self.session.config();
        let _job = self.print_lock.lock().await;
        let handle = self.session.connect().await?;
        let writer = CharacteristicWriter::discover(&handle, config).await?;

        if let Err(failure) = writer.send(&commands::feed_lines(config.feed_lines)).await {
            return Err(self.abort(failure, 0, 1).await);
        }
        Ok(())
    }

    /// Battery percentage of the connected printer.
    pub async fn battery_level(&self) -> Option<u8> {
        self.session.battery_level().await
    }

    /// Readiness of the current connection; `Unknown` when disconnected.
    pub async fn status(&self) -> PrinterStatus {
        match self.session.connected_device().await {
            Some(handle) => status::check_printer_status(&handle, self.session.config()).await,
            None => PrinterStatus::Unknown,
        }
    }
}

/// Printed size of a report's label in millimeters at `dpi`.
pub fn label_size_mm(report: &PrintReport, dpi: u16) -> (f32, f32) {
    let per_mm = dpi as f32 / 25.4;
    (
        report.width_px as f32 / per_mm,
        report.height_px as f32 / per_mm,
    )
}
