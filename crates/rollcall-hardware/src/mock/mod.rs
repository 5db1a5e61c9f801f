//! Mock device implementations for testing and development.
//!
//! This module provides simulated device implementations that can be controlled
//! programmatically without requiring physical hardware.

pub mod biometric;
pub mod reader;

pub use biometric::{MockFingerprintHandle, MockFingerprintSensor};
pub use reader::{MockProximityReader, MockProximityReaderHandle};
