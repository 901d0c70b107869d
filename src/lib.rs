//! # Makita BMS Library
//!
//! A Rust library for interrogating Makita LXT battery packs over the
//! single-wire bus on their data terminal. The protocol was never published;
//! this crate implements the command set observed on real packs.
//!
//! ## Features
//!
//! - Bit-banged, open-drain single-wire driver on any `embedded-hal` pin
//! - Static data: ROM identifier, production date, capacity, charge cycles,
//!   status and lock classification
//! - Controller identification (standard model string, F0513 label, generic
//!   fallback)
//! - Dynamic data: pack and cell voltages, cell spread, temperatures
//! - Hidden register diagnostics: error counters, firmware version, fuse
//! - LED test and clear errors on controllers that support them
//!
//! ## Example
//!
//! ```ignore
//! use makita_bms::{BatteryData, BmsConfig, MakitaBms};
//!
//! let mut bms = MakitaBms::new(BmsConfig::default(), data_pin, enable_pin, delay, guard);
//! let mut data = BatteryData::default();
//! let features = bms.read_static_data(&mut data)?;
//! if features.read_dynamic {
//!     bms.read_dynamic_data(&mut data)?;
//!     bms.read_advanced_diagnostics(&mut data)?;
//! }
//! println!("{} {:.2}V {}", data.model, data.pack_voltage, data.summary());
//! ```

pub mod bus;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod frame;
pub mod logger;
pub mod power;
pub mod protocol;
pub mod types;
pub mod variant;

#[cfg(test)]
pub(crate) mod sim;

pub use bus::{BidiPin, BusLink, EdgeGuard, Unguarded};
pub use config::BmsConfig;
pub use error::{BmsError, Result};
pub use logger::{LogCallback, LogLevel, Logger};
pub use protocol::MakitaBms;
pub use types::*;
pub use variant::{Identity, VariantProfile};
