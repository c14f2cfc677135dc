//! # Pocketlabel CLI
//!
//! Command-line host for BLE thermal label printers.
//!
//! ## Usage
//!
//! ```bash
//! # Print a PNG label
//! pocketlabel print label.png
//!
//! # Three darker copies on continuous media, without auto-rotation
//! pocketlabel print --copies 3 --density 70 --label-type continuous --no-rotate label.png
//!
//! # Print the 40mm calibration pattern
//! pocketlabel calibrate --width-mm 40
//!
//! # Feed a few lines
//! pocketlabel feed
//!
//! # Show readiness, battery and device information
//! pocketlabel status
//! ```
//!
//! The last printer used is remembered in `--prefs` and reconnected without
//! scanning when possible. Set `RUST_LOG=debug` for transport details.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pocketlabel::{
    DeviceSession, LabelPrinter, PrintSettings, PrinterConfig, PrinterError,
    printer::job::label_size_mm,
    protocol::LabelType,
    render::RgbaFrame,
    session::JsonPreferenceStore,
    transport::BtleBackend,
};

/// Pocketlabel - BLE thermal label printer utility
#[derive(Parser, Debug)]
#[command(name = "pocketlabel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer configuration (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File remembering the last used printer
    #[arg(long, global = true, default_value = ".pocketlabel-device.json")]
    prefs: PathBuf,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a PNG image as a label
    Print {
        /// Image file, rendered at the printer's resolution
        #[arg(value_name = "IMAGE")]
        path: PathBuf,

        /// Number of copies
        #[arg(long, default_value = "1")]
        copies: u32,

        /// Darkness 0-100 (50 is neutral)
        #[arg(long, default_value = "50")]
        density: u8,

        /// Print speed 1-5
        #[arg(long, default_value = "3")]
        speed: u8,

        /// Media type: gap, continuous or mark
        #[arg(long, default_value = "gap")]
        label_type: LabelType,

        /// Vertical offset in millimeters (-10 to 10)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset_mm: f32,

        /// Keep wide labels in their original orientation
        #[arg(long)]
        no_rotate: bool,
    },

    /// Print the vertical-line calibration pattern
    Calibrate {
        /// Pattern width in millimeters
        #[arg(long, default_value = "40")]
        width_mm: f32,
    },

    /// Feed the configured number of lines
    Feed,

    /// Show readiness, battery level and device information
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

/// Install the tracing subscriber; `RUST_LOG` wins over `--verbose`.
fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), PrinterError> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            PrinterConfig::load(path)?
        }
        None => PrinterConfig::default(),
    };

    let backend = BtleBackend::new(&config).await?;
    let preferences = Arc::new(JsonPreferenceStore::new(&cli.prefs));
    let session = Arc::new(DeviceSession::new(backend, config, preferences));
    session.add_connection_listener(|connected| debug!(connected, "connection state"));

    if let Some(handle) = session.try_reconnect().await {
        info!("Reconnected to {}", handle.id());
    }
    let printer = LabelPrinter::new(Arc::clone(&session));

    match cli.command {
        Commands::Print {
            path,
            copies,
            density,
            speed,
            label_type,
            offset_mm,
            no_rotate,
        } => {
            let img = image::open(&path)
                .map_err(|e| PrinterError::InvalidImage(format!("{}: {}", path.display(), e)))?
                .to_rgba8();
            let frame = RgbaFrame::try_from(&img)?;

            let settings = PrintSettings {
                copies,
                density,
                speed,
                label_type,
                print_offset_mm: offset_mm,
                auto_rotate: !no_rotate,
                ..Default::default()
            };

            println!(
                "Printing {} ({}x{}), {} copies...",
                path.display(),
                frame.width(),
                frame.height(),
                copies.max(1)
            );
            let report = printer.print_label(&frame, &settings).await?;
            let (w, h) = label_size_mm(&report, session.config().dpi);
            println!(
                "Printed {} copies of a {:.1} x {:.1} mm label ({} chunks each)",
                report.copies, w, h, report.chunks_per_copy
            );
        }

        Commands::Calibrate { width_mm } => {
            printer.send_calibration_pattern(width_mm).await?;
            println!("Calibration pattern printed ({} mm)", width_mm);
        }

        Commands::Feed => {
            printer.feed_paper().await?;
            println!("Fed {} lines", session.config().feed_lines);
        }

        Commands::Status => {
            session.connect().await?;
            let status = printer.status().await;
            println!("Status:   {}", status);
            match printer.battery_level().await {
                Some(level) => println!("Battery:  {}%", level),
                None => println!("Battery:  unknown"),
            }
            if let Some(info) = session.printer_info().await {
                let show = |v: Option<String>| v.unwrap_or_else(|| "unknown".to_string());
                println!("Name:     {}", show(info.name));
                println!("Model:    {}", show(info.model));
                println!("Firmware: {}", show(info.firmware));
                println!("Maker:    {}", show(info.manufacturer));
            }
        }
    }

    session.disconnect().await;
    Ok(())
}
