//! Mock fingerprint module implementation for testing and development.
//!
//! This module provides a simulated fingerprint module that can be controlled
//! programmatically for testing without requiring physical hardware. A
//! "finger" is an opaque byte pattern: two captures match when their patterns
//! are byte-for-byte equal.

use crate::{
    HardwareError, Result,
    traits::{
        BiometricDevice, CaptureFault, Conversion, ConversionFault, DeleteStatus, FuseStatus,
        ImageCapture, LoadStatus, SearchStatus, StoreFault, StoreStatus, TemplateSlot,
    },
    types::{DeviceInfo, SensorCode, SensorParameters},
};
use rollcall_core::FingerprintId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Simulated sensor internals shared between the device and its handle.
#[derive(Debug)]
struct SensorState {
    connected: bool,
    finger: Option<Vec<u8>>,
    image: Option<Vec<u8>>,
    slots: [Option<Vec<u8>>; 2],
    model: Option<Vec<u8>>,
    library: BTreeMap<u8, Vec<u8>>,
    parameters: SensorParameters,
    operations: u64,
    faults: PendingFaults,
}

/// One-shot faults armed through the handle, consumed by the next matching call.
#[derive(Debug, Default)]
struct PendingFaults {
    transport: bool,
    capture: Option<CaptureFault>,
    conversion: Option<ConversionFault>,
    search: Option<SensorCode>,
    store: Option<StoreFault>,
    delete: Option<DeleteStatus>,
}

impl SensorState {
    fn new() -> Self {
        Self {
            connected: true,
            finger: None,
            image: None,
            slots: [None, None],
            model: None,
            library: BTreeMap::new(),
            parameters: SensorParameters::default(),
            operations: 0,
            faults: PendingFaults::default(),
        }
    }

    /// Account for one device round trip and apply connection faults.
    fn begin(&mut self, name: &str) -> Result<()> {
        self.operations += 1;
        if !self.connected {
            return Err(HardwareError::disconnected(name));
        }
        if std::mem::take(&mut self.faults.transport) {
            return Err(HardwareError::communication("simulated packet loss"));
        }
        Ok(())
    }

    fn slot(&self, slot: TemplateSlot) -> Option<&Vec<u8>> {
        match slot {
            TemplateSlot::One => self.slots[0].as_ref(),
            TemplateSlot::Two => self.slots[1].as_ref(),
        }
    }

    fn search(&mut self, slot: TemplateSlot) -> SearchStatus {
        if let Some(code) = self.faults.search.take() {
            return SearchStatus::Failed(code);
        }
        let Some(probe) = self.slot(slot) else {
            return SearchStatus::Failed(SensorCode::INVALID_IMAGE);
        };

        self.library
            .iter()
            .find(|(_, template)| *template == probe)
            .and_then(|(location, _)| FingerprintId::new(*location).ok())
            .map_or(SearchStatus::NotFound, |id| SearchStatus::Found {
                id,
                confidence: 100,
            })
    }

    fn in_library_range(&self, id: FingerprintId) -> bool {
        u16::from(id.as_u8()) <= self.parameters.capacity
    }
}

fn lock(state: &Mutex<SensorState>) -> MutexGuard<'_, SensorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock fingerprint module for testing and development.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockFingerprintSensor;
/// use rollcall_hardware::traits::{BiometricDevice, ImageCapture};
///
/// #[tokio::main]
/// async fn main() -> rollcall_hardware::Result<()> {
///     let (mut sensor, handle) = MockFingerprintSensor::new();
///
///     assert_eq!(sensor.capture_image().await?, ImageCapture::NoFinger);
///
///     handle.place_finger(vec![1, 2, 3]);
///     assert_eq!(sensor.capture_image().await?, ImageCapture::Captured);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockFingerprintSensor {
    state: Arc<Mutex<SensorState>>,
    name: String,
}

impl MockFingerprintSensor {
    /// Create a new mock sensor with the default name.
    ///
    /// Returns the device and a handle used to simulate fingers and faults.
    pub fn new() -> (Self, MockFingerprintHandle) {
        Self::with_name("Mock Fingerprint Sensor".to_string())
    }

    /// Create a new mock sensor with a custom name.
    pub fn with_name(name: String) -> (Self, MockFingerprintHandle) {
        let state = Arc::new(Mutex::new(SensorState::new()));

        let sensor = Self {
            state: Arc::clone(&state),
            name,
        };
        let handle = MockFingerprintHandle { state };

        (sensor, handle)
    }

    fn state(&self) -> MutexGuard<'_, SensorState> {
        lock(&self.state)
    }
}

impl Default for MockFingerprintSensor {
    fn default() -> Self {
        Self::new().0
    }
}

impl BiometricDevice for MockFingerprintSensor {
    async fn verify(&mut self) -> Result<bool> {
        let mut state = self.state();
        state.operations += 1;
        Ok(state.connected)
    }

    async fn parameters(&mut self) -> Result<SensorParameters> {
        let mut state = self.state();
        state.begin(&self.name)?;
        Ok(state.parameters)
    }

    async fn capture_image(&mut self) -> Result<ImageCapture> {
        let mut state = self.state();
        state.begin(&self.name)?;

        if let Some(fault) = state.faults.capture.take() {
            return Ok(ImageCapture::Failed(fault));
        }

        match state.finger.clone() {
            Some(pattern) => {
                state.image = Some(pattern);
                Ok(ImageCapture::Captured)
            }
            None => Ok(ImageCapture::NoFinger),
        }
    }

    async fn convert_image(&mut self, slot: TemplateSlot) -> Result<Conversion> {
        let mut state = self.state();
        state.begin(&self.name)?;

        if let Some(fault) = state.faults.conversion.take() {
            return Ok(Conversion::Failed(fault));
        }

        let template = match state.image.as_ref() {
            None => return Ok(Conversion::Failed(ConversionFault::InvalidImage)),
            Some(image) if image.is_empty() => {
                return Ok(Conversion::Failed(ConversionFault::FeatureFail));
            }
            Some(image) => image.clone(),
        };

        match slot {
            TemplateSlot::One => state.slots[0] = Some(template),
            TemplateSlot::Two => state.slots[1] = Some(template),
        }
        Ok(Conversion::Converted)
    }

    async fn search_stored(&mut self, slot: TemplateSlot) -> Result<SearchStatus> {
        let mut state = self.state();
        state.begin(&self.name)?;
        Ok(state.search(slot))
    }

    async fn fast_search(&mut self) -> Result<SearchStatus> {
        let mut state = self.state();
        state.begin(&self.name)?;
        Ok(state.search(TemplateSlot::One))
    }

    async fn fuse_slots(&mut self) -> Result<FuseStatus> {
        let mut state = self.state();
        state.begin(&self.name)?;

        let model = match (&state.slots[0], &state.slots[1]) {
            (Some(first), Some(second)) if first == second => Some(first.clone()),
            _ => None,
        };

        let status = if model.is_some() {
            FuseStatus::Fused
        } else {
            FuseStatus::Mismatch
        };
        state.model = model;
        Ok(status)
    }

    async fn store_template(&mut self, id: FingerprintId) -> Result<StoreStatus> {
        let mut state = self.state();
        state.begin(&self.name)?;

        if let Some(fault) = state.faults.store.take() {
            return Ok(StoreStatus::Failed(fault));
        }
        if !state.in_library_range(id) {
            return Ok(StoreStatus::Failed(StoreFault::BadLocation));
        }
        let Some(model) = state.model.clone() else {
            return Ok(StoreStatus::Failed(StoreFault::FlashError));
        };

        state.library.insert(id.as_u8(), model);
        Ok(StoreStatus::Stored)
    }

    async fn load_template(&mut self, id: FingerprintId) -> Result<LoadStatus> {
        let mut state = self.state();
        state.begin(&self.name)?;

        if state.library.contains_key(&id.as_u8()) {
            Ok(LoadStatus::Loaded)
        } else {
            Ok(LoadStatus::NotPresent)
        }
    }

    async fn delete_template(&mut self, id: FingerprintId) -> Result<DeleteStatus> {
        let mut state = self.state();
        state.begin(&self.name)?;

        if let Some(status) = state.faults.delete.take() {
            return Ok(status);
        }
        if !state.in_library_range(id) {
            return Ok(DeleteStatus::BadLocation);
        }

        state.library.remove(&id.as_u8());
        Ok(DeleteStatus::Deleted)
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock R30x").with_firmware_version("1.0.0"))
    }
}

/// Handle for controlling a mock fingerprint module.
///
/// Clones share the same simulated sensor.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockFingerprintSensor;
/// use rollcall_core::FingerprintId;
///
/// let (_sensor, handle) = MockFingerprintSensor::new();
///
/// let id = FingerprintId::new(5).unwrap();
/// handle.enroll(id, vec![0xAA; 8]);
/// assert_eq!(handle.stored_ids(), vec![id]);
/// ```
#[derive(Debug, Clone)]
pub struct MockFingerprintHandle {
    state: Arc<Mutex<SensorState>>,
}

impl MockFingerprintHandle {
    fn state(&self) -> MutexGuard<'_, SensorState> {
        lock(&self.state)
    }

    /// Put a finger with the given pattern on the sensor.
    pub fn place_finger(&self, pattern: Vec<u8>) {
        self.state().finger = Some(pattern);
    }

    /// Take the finger off the sensor.
    pub fn lift_finger(&self) {
        self.state().finger = None;
    }

    /// Returns `true` while a finger rests on the sensor.
    pub fn finger_present(&self) -> bool {
        self.state().finger.is_some()
    }

    /// Store a template directly in the library, bypassing enrollment.
    pub fn enroll(&self, id: FingerprintId, pattern: Vec<u8>) {
        self.state().library.insert(id.as_u8(), pattern);
    }

    /// Remove a template directly from the library.
    pub fn remove(&self, id: FingerprintId) {
        self.state().library.remove(&id.as_u8());
    }

    /// Occupied storage locations in ascending order.
    pub fn stored_ids(&self) -> Vec<FingerprintId> {
        self.state()
            .library
            .keys()
            .filter_map(|location| FingerprintId::new(*location).ok())
            .collect()
    }

    /// Pattern stored at `id`, if any.
    pub fn template(&self, id: FingerprintId) -> Option<Vec<u8>> {
        self.state().library.get(&id.as_u8()).cloned()
    }

    /// Simulate unplugging (or plugging back) the sensor.
    pub fn set_connected(&self, connected: bool) {
        self.state().connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Override the parameter block, e.g. to shrink the library.
    pub fn set_parameters(&self, parameters: SensorParameters) {
        self.state().parameters = parameters;
    }

    /// Number of device round trips performed so far.
    pub fn operation_count(&self) -> u64 {
        self.state().operations
    }

    /// Make the next device call fail with a communication error.
    pub fn fail_next_transport(&self) {
        self.state().faults.transport = true;
    }

    /// Make the next image capture report `fault`.
    pub fn fail_next_capture(&self, fault: CaptureFault) {
        self.state().faults.capture = Some(fault);
    }

    /// Make the next conversion report `fault`.
    pub fn fail_next_conversion(&self, fault: ConversionFault) {
        self.state().faults.conversion = Some(fault);
    }

    /// Make the next library search report `code`.
    pub fn fail_next_search(&self, code: SensorCode) {
        self.state().faults.search = Some(code);
    }

    /// Make the next store report `fault`.
    pub fn fail_next_store(&self, fault: StoreFault) {
        self.state().faults.store = Some(fault);
    }

    /// Make the next delete answer `status` instead of deleting.
    pub fn fail_next_delete(&self, status: DeleteStatus) {
        self.state().faults.delete = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u8) -> FingerprintId {
        FingerprintId::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_capture_without_finger() {
        let (mut sensor, _handle) = MockFingerprintSensor::new();
        assert_eq!(sensor.capture_image().await.unwrap(), ImageCapture::NoFinger);
    }

    #[tokio::test]
    async fn test_capture_convert_and_fast_search() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.enroll(id(7), vec![1, 2, 3]);
        handle.place_finger(vec![1, 2, 3]);

        assert_eq!(sensor.capture_image().await.unwrap(), ImageCapture::Captured);
        assert_eq!(
            sensor.convert_image(TemplateSlot::One).await.unwrap(),
            Conversion::Converted
        );
        assert_eq!(
            sensor.fast_search().await.unwrap(),
            SearchStatus::Found {
                id: id(7),
                confidence: 100
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_finger_not_found() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.enroll(id(7), vec![1, 2, 3]);
        handle.place_finger(vec![9, 9, 9]);

        sensor.capture_image().await.unwrap();
        sensor.convert_image(TemplateSlot::One).await.unwrap();
        assert_eq!(sensor.fast_search().await.unwrap(), SearchStatus::NotFound);
    }

    #[tokio::test]
    async fn test_convert_without_image_is_invalid() {
        let (mut sensor, _handle) = MockFingerprintSensor::new();
        assert_eq!(
            sensor.convert_image(TemplateSlot::One).await.unwrap(),
            Conversion::Failed(ConversionFault::InvalidImage)
        );
    }

    #[tokio::test]
    async fn test_full_enrollment_sequence_stores_model() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.place_finger(vec![4, 5, 6]);

        sensor.capture_image().await.unwrap();
        sensor.convert_image(TemplateSlot::One).await.unwrap();
        sensor.capture_image().await.unwrap();
        sensor.convert_image(TemplateSlot::Two).await.unwrap();

        assert_eq!(sensor.fuse_slots().await.unwrap(), FuseStatus::Fused);
        assert_eq!(
            sensor.store_template(id(3)).await.unwrap(),
            StoreStatus::Stored
        );
        assert_eq!(handle.template(id(3)), Some(vec![4, 5, 6]));
        assert!(sensor.load_template(id(3)).await.unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_fuse_mismatch() {
        let (mut sensor, handle) = MockFingerprintSensor::new();

        handle.place_finger(vec![1]);
        sensor.capture_image().await.unwrap();
        sensor.convert_image(TemplateSlot::One).await.unwrap();

        handle.place_finger(vec![2]);
        sensor.capture_image().await.unwrap();
        sensor.convert_image(TemplateSlot::Two).await.unwrap();

        assert_eq!(sensor.fuse_slots().await.unwrap(), FuseStatus::Mismatch);
    }

    #[tokio::test]
    async fn test_store_outside_capacity_is_bad_location() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.set_parameters(SensorParameters {
            capacity: 10,
            ..SensorParameters::default()
        });

        assert_eq!(
            sensor.store_template(id(11)).await.unwrap(),
            StoreStatus::Failed(StoreFault::BadLocation)
        );
        assert_eq!(
            sensor.delete_template(id(11)).await.unwrap(),
            DeleteStatus::BadLocation
        );
    }

    #[tokio::test]
    async fn test_disconnected_sensor() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.set_connected(false);

        assert!(!sensor.verify().await.unwrap());
        let error = sensor.capture_image().await.unwrap_err();
        assert!(error.is_disconnected());
    }

    #[tokio::test]
    async fn test_injected_faults_are_one_shot() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.place_finger(vec![1]);
        handle.fail_next_capture(CaptureFault::ImagingFail);

        assert_eq!(
            sensor.capture_image().await.unwrap(),
            ImageCapture::Failed(CaptureFault::ImagingFail)
        );
        assert_eq!(sensor.capture_image().await.unwrap(), ImageCapture::Captured);

        handle.fail_next_transport();
        assert!(sensor.capture_image().await.is_err());
        assert!(sensor.capture_image().await.is_ok());
    }

    #[tokio::test]
    async fn test_operation_count_tracks_round_trips() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        assert_eq!(handle.operation_count(), 0);

        sensor.verify().await.unwrap();
        sensor.load_template(id(1)).await.unwrap();
        assert_eq!(handle.operation_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_template() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.enroll(id(2), vec![1]);

        assert_eq!(
            sensor.delete_template(id(2)).await.unwrap(),
            DeleteStatus::Deleted
        );
        assert!(handle.stored_ids().is_empty());
    }
}
