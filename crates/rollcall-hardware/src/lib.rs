//! Hardware device abstraction layer for the rollcall attendance terminal.
//!
//! This crate provides trait-based abstractions for the two peripherals the
//! terminal drives: a proximity card reader and a fingerprint module. The
//! traits let the coordination engine run unchanged against mock devices
//! (development, tests, the console-driven binary) and real drivers.
//!
//! # Design Philosophy
//!
//! - **Async-first**: operations are native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Bounded**: every operation is one request/response exchange. Nothing
//!   in this crate waits for a person; the engine polls.
//! - **Status, not errors**: what the sensor answers (no finger, not found,
//!   bad location) is a tagged status. [`HardwareError`] is reserved for the
//!   device being unreachable or answering garbage.
//!
//! # Device Traits
//!
//! ```no_run
//! use rollcall_hardware::traits::ProximityReader;
//! use rollcall_hardware::error::Result;
//!
//! async fn wait_for_card<R: ProximityReader>(reader: &mut R) -> Result<String> {
//!     loop {
//!         if let Some(card) = reader.poll_new_card().await? {
//!             reader.halt().await?;
//!             return Ok(card.to_hex());
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!     }
//! }
//! ```
//!
//! Because RPITIT traits are not object-safe, the [`devices`] module wraps
//! concrete implementations in enums for dispatch.

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{
    BiometricDevice, CaptureFault, Conversion, ConversionFault, DeleteStatus, FuseStatus,
    ImageCapture, LoadStatus, ProximityReader, SearchStatus, StoreFault, StoreStatus,
    TemplateSlot,
};
pub use types::{DeviceInfo, ReaderInfo, SensorCode, SensorParameters};
