//! # Label Printer Protocol
//!
//! Low-level command builders. Every function returns an owned byte vector
//! and has no side effects.
//!
//! ## Module Structure
//!
//! - [`commands`]: init, density, label type, speed, justification, feed
//! - [`graphics`]: raster header and calibration pattern
//!
//! ## Usage Example
//!
//! ```
//! use pocketlabel::protocol::{commands, graphics};
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(commands::density(50));
//! data.extend(graphics::raster(2, 1, &[0xFF, 0x00]));
//! data.extend(commands::feed_lines(2));
//! ```

pub mod commands;
pub mod graphics;

pub use commands::{Justification, LabelType};
