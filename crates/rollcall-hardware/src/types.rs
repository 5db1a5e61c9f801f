//! Common types shared across hardware device implementations.
//!
//! This module defines device metadata, the sensor's parameter block and the
//! confirmation codes fingerprint modules of the R30x family answer with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
///
/// Contains metadata about a hardware device such as name, model,
/// serial number, and firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "R307", "Mock Fingerprint Sensor").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// Proximity reader information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "MFRC522").
    pub name: String,

    /// List of supported protocols (e.g., ["ISO14443A"]).
    pub protocols: Vec<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            protocols,
        }
    }
}

/// System parameter block reported by the fingerprint module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorParameters {
    /// Status register contents.
    pub status_register: u16,

    /// System identifier code.
    pub system_id: u16,

    /// Number of template storage locations.
    pub capacity: u16,

    /// Matching threshold level (1-5).
    pub security_level: u16,
}

impl Default for SensorParameters {
    fn default() -> Self {
        Self {
            status_register: 0,
            system_id: 0,
            capacity: 127,
            security_level: 3,
        }
    }
}

/// Raw confirmation code answered by the fingerprint module.
///
/// Used to report sensor faults that have no dedicated variant, and to
/// attach the numeric code to API error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorCode(pub u8);

impl SensorCode {
    pub const OK: SensorCode = SensorCode(0x00);
    pub const PACKET_RECEIVE_ERROR: SensorCode = SensorCode(0x01);
    pub const NO_FINGER: SensorCode = SensorCode(0x02);
    pub const IMAGE_FAIL: SensorCode = SensorCode(0x03);
    pub const IMAGE_MESSY: SensorCode = SensorCode(0x06);
    pub const FEATURE_FAIL: SensorCode = SensorCode(0x07);
    pub const NOT_FOUND: SensorCode = SensorCode(0x09);
    pub const ENROLL_MISMATCH: SensorCode = SensorCode(0x0A);
    pub const BAD_LOCATION: SensorCode = SensorCode(0x0B);
    pub const DB_RANGE_FAIL: SensorCode = SensorCode(0x0C);
    pub const DELETE_FAIL: SensorCode = SensorCode(0x10);
    pub const INVALID_IMAGE: SensorCode = SensorCode(0x15);
    pub const FLASH_ERROR: SensorCode = SensorCode(0x18);

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SensorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}
