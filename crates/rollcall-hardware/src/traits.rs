//! Hardware device trait definitions.
//!
//! This module defines the capability traits the coordination engine drives:
//! the fingerprint module ([`BiometricDevice`]) and the proximity card reader
//! ([`ProximityReader`]). Every operation is a single bounded request/response
//! exchange with the device; none of them waits for a person to do something.
//! Waiting is the engine's job, done by polling across ticks.
//!
//! Operations return `Result<Status>`: the `Err` side is a transport failure
//! ([`HardwareError`](crate::HardwareError)), the `Ok` side is a tagged status
//! that keeps every distinct answer the sensor can give.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{DeviceInfo, ReaderInfo, SensorCode, SensorParameters};
use rollcall_core::{CardId, FingerprintId};
use serde::{Deserialize, Serialize};

/// Character buffer inside the fingerprint module that holds a converted
/// feature template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateSlot {
    /// First buffer; also the buffer searched by fast search.
    One,
    /// Second buffer, used for the confirmation capture during enrollment.
    Two,
}

impl TemplateSlot {
    /// Buffer number as sent to the module.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Why an image capture failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureFault {
    /// The module reported a packet receive error.
    PacketError,
    /// The module failed to take the image.
    ImagingFail,
}

impl CaptureFault {
    #[must_use]
    pub fn code(self) -> SensorCode {
        match self {
            Self::PacketError => SensorCode::PACKET_RECEIVE_ERROR,
            Self::ImagingFail => SensorCode::IMAGE_FAIL,
        }
    }
}

/// Answer to an image capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageCapture {
    /// An image is now in the image buffer.
    Captured,
    /// Nothing is touching the sensor.
    NoFinger,
    /// The module tried and failed.
    Failed(CaptureFault),
}

/// Why converting an image into a feature template failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionFault {
    /// Image too messy to extract features.
    MessyImage,
    /// Not enough feature points.
    FeatureFail,
    /// Image buffer holds no valid image.
    InvalidImage,
}

impl ConversionFault {
    #[must_use]
    pub fn code(self) -> SensorCode {
        match self {
            Self::MessyImage => SensorCode::IMAGE_MESSY,
            Self::FeatureFail => SensorCode::FEATURE_FAIL,
            Self::InvalidImage => SensorCode::INVALID_IMAGE,
        }
    }
}

/// Answer to an image conversion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conversion {
    Converted,
    Failed(ConversionFault),
}

/// Answer to a template search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    /// A stored template matched.
    Found {
        id: FingerprintId,
        confidence: u16,
    },
    /// No stored template matched.
    NotFound,
    /// The module could not perform the search.
    Failed(SensorCode),
}

/// Answer to a request to fuse both character buffers into one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuseStatus {
    Fused,
    /// The two captures are not of the same finger.
    Mismatch,
}

/// Why storing a model failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreFault {
    /// Location outside the module's library.
    BadLocation,
    /// Writing flash failed.
    FlashError,
}

impl StoreFault {
    #[must_use]
    pub fn code(self) -> SensorCode {
        match self {
            Self::BadLocation => SensorCode::BAD_LOCATION,
            Self::FlashError => SensorCode::FLASH_ERROR,
        }
    }
}

/// Answer to a store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreStatus {
    Stored,
    Failed(StoreFault),
}

/// Answer to a load request, used as an occupancy probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    Loaded,
    NotPresent,
}

impl LoadStatus {
    #[must_use]
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// Answer to a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteStatus {
    Deleted,
    BadLocation,
    FlashError,
}

impl DeleteStatus {
    #[must_use]
    pub fn code(self) -> SensorCode {
        match self {
            Self::Deleted => SensorCode::OK,
            Self::BadLocation => SensorCode::BAD_LOCATION,
            Self::FlashError => SensorCode::FLASH_ERROR,
        }
    }
}

/// Trait for fingerprint modules.
///
/// The module is the system of record for templates: the terminal never sees
/// biometric data, only storage locations and status codes.
///
/// # Examples
///
/// ```no_run
/// use rollcall_hardware::traits::{BiometricDevice, ImageCapture, TemplateSlot, Conversion, SearchStatus};
/// use rollcall_hardware::error::Result;
/// use rollcall_core::FingerprintId;
///
/// async fn identify_once<B: BiometricDevice>(sensor: &mut B) -> Result<Option<FingerprintId>> {
///     if sensor.capture_image().await? != ImageCapture::Captured {
///         return Ok(None);
///     }
///     if sensor.convert_image(TemplateSlot::One).await? != Conversion::Converted {
///         return Ok(None);
///     }
///     match sensor.fast_search().await? {
///         SearchStatus::Found { id, .. } => Ok(Some(id)),
///         _ => Ok(None),
///     }
/// }
/// ```
pub trait BiometricDevice: Send {
    /// Handshake with the module; `false` means it answered but rejected the
    /// password.
    async fn verify(&mut self) -> Result<bool>;

    /// Read the system parameter block.
    async fn parameters(&mut self) -> Result<SensorParameters>;

    /// Take an image of whatever is on the sensor.
    async fn capture_image(&mut self) -> Result<ImageCapture>;

    /// Convert the image buffer into a feature template in `slot`.
    async fn convert_image(&mut self, slot: TemplateSlot) -> Result<Conversion>;

    /// Search the whole library for the template in `slot`.
    async fn search_stored(&mut self, slot: TemplateSlot) -> Result<SearchStatus>;

    /// High speed search of the library for the template in slot one.
    async fn fast_search(&mut self) -> Result<SearchStatus>;

    /// Combine both character buffers into a storable model.
    async fn fuse_slots(&mut self) -> Result<FuseStatus>;

    /// Commit the fused model at `id`.
    async fn store_template(&mut self, id: FingerprintId) -> Result<StoreStatus>;

    /// Load the model at `id` into a buffer; reports whether it exists.
    ///
    /// The model lands in [`TemplateSlot::One`], replacing any capture held
    /// there.
    async fn load_template(&mut self, id: FingerprintId) -> Result<LoadStatus>;

    /// Erase the model at `id`.
    async fn delete_template(&mut self, id: FingerprintId) -> Result<DeleteStatus>;

    /// Get device information.
    async fn get_device_info(&self) -> Result<DeviceInfo>;
}

/// Trait for proximity card readers.
pub trait ProximityReader: Send {
    /// Report a card that newly entered the field, if any.
    ///
    /// Returns `Ok(None)` when no new card is present. A card that stays in
    /// the field after [`halt`](Self::halt) is not reported again.
    async fn poll_new_card(&mut self) -> Result<Option<CardId>>;

    /// Put the current card to sleep.
    async fn halt(&mut self) -> Result<()>;

    /// Get reader information.
    async fn get_reader_info(&self) -> Result<ReaderInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_slot_numbers() {
        assert_eq!(TemplateSlot::One.number(), 1);
        assert_eq!(TemplateSlot::Two.number(), 2);
    }

    #[test]
    fn test_fault_codes() {
        assert_eq!(CaptureFault::ImagingFail.code(), SensorCode::IMAGE_FAIL);
        assert_eq!(ConversionFault::MessyImage.code(), SensorCode(0x06));
        assert_eq!(ConversionFault::InvalidImage.code(), SensorCode(0x15));
        assert_eq!(StoreFault::FlashError.code(), SensorCode(0x18));
        assert_eq!(DeleteStatus::BadLocation.code(), SensorCode(0x0B));
        assert_eq!(DeleteStatus::Deleted.code(), SensorCode::OK);
    }

    #[test]
    fn test_load_status() {
        assert!(LoadStatus::Loaded.is_loaded());
        assert!(!LoadStatus::NotPresent.is_loaded());
    }
}
