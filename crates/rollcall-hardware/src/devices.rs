//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn BiometricDevice>`
//! is not available. These enums give the binary one concrete type per device
//! kind; new drivers become new variants behind their feature flags.
//!
//! # Examples
//!
//! ```
//! use rollcall_hardware::devices::AnyProximityReader;
//! use rollcall_hardware::mock::MockProximityReader;
//!
//! let (reader, _handle) = MockProximityReader::new();
//! let any_reader = AnyProximityReader::Mock(reader);
//! ```

use crate::mock::{MockFingerprintSensor, MockProximityReader};
use crate::traits::{
    BiometricDevice, Conversion, DeleteStatus, FuseStatus, ImageCapture, LoadStatus,
    ProximityReader, SearchStatus, StoreStatus, TemplateSlot,
};
use crate::{DeviceInfo, ReaderInfo, Result, SensorParameters};
use rollcall_core::{CardId, FingerprintId};

/// Enum wrapper for fingerprint module dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyBiometricDevice {
    /// Mock sensor for development and testing.
    Mock(MockFingerprintSensor),
}

impl BiometricDevice for AnyBiometricDevice {
    async fn verify(&mut self) -> Result<bool> {
        match self {
            Self::Mock(device) => device.verify().await,
        }
    }

    async fn parameters(&mut self) -> Result<SensorParameters> {
        match self {
            Self::Mock(device) => device.parameters().await,
        }
    }

    async fn capture_image(&mut self) -> Result<ImageCapture> {
        match self {
            Self::Mock(device) => device.capture_image().await,
        }
    }

    async fn convert_image(&mut self, slot: TemplateSlot) -> Result<Conversion> {
        match self {
            Self::Mock(device) => device.convert_image(slot).await,
        }
    }

    async fn search_stored(&mut self, slot: TemplateSlot) -> Result<SearchStatus> {
        match self {
            Self::Mock(device) => device.search_stored(slot).await,
        }
    }

    async fn fast_search(&mut self) -> Result<SearchStatus> {
        match self {
            Self::Mock(device) => device.fast_search().await,
        }
    }

    async fn fuse_slots(&mut self) -> Result<FuseStatus> {
        match self {
            Self::Mock(device) => device.fuse_slots().await,
        }
    }

    async fn store_template(&mut self, id: FingerprintId) -> Result<StoreStatus> {
        match self {
            Self::Mock(device) => device.store_template(id).await,
        }
    }

    async fn load_template(&mut self, id: FingerprintId) -> Result<LoadStatus> {
        match self {
            Self::Mock(device) => device.load_template(id).await,
        }
    }

    async fn delete_template(&mut self, id: FingerprintId) -> Result<DeleteStatus> {
        match self {
            Self::Mock(device) => device.delete_template(id).await,
        }
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_device_info().await,
        }
    }
}

/// Enum wrapper for proximity reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyProximityReader {
    /// Mock reader for development and testing.
    Mock(MockProximityReader),
}

impl ProximityReader for AnyProximityReader {
    async fn poll_new_card(&mut self) -> Result<Option<CardId>> {
        match self {
            Self::Mock(device) => device.poll_new_card().await,
        }
    }

    async fn halt(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.halt().await,
        }
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        match self {
            Self::Mock(device) => device.get_reader_info().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_biometric_dispatch_reaches_mock() {
        let (sensor, handle) = MockFingerprintSensor::new();
        let mut device = AnyBiometricDevice::Mock(sensor);

        assert!(device.verify().await.unwrap());
        handle.set_connected(false);
        assert!(!device.verify().await.unwrap());
        assert_eq!(handle.operation_count(), 2);
    }

    #[tokio::test]
    async fn test_reader_dispatch_reaches_mock() {
        let (reader, handle) = MockProximityReader::new();
        let mut device = AnyProximityReader::Mock(reader);

        handle
            .present_card(CardId::from_hex("0A0B").unwrap())
            .unwrap();
        let card = device.poll_new_card().await.unwrap();
        assert_eq!(card.map(|c| c.to_hex()), Some("0A0B".to_string()));

        device.halt().await.unwrap();
        assert_eq!(handle.halt_count(), 1);
    }
}
