//! Error types for hardware operations.
//!
//! These errors cover transport-level failures only: the device did not
//! answer, answered garbage, or went away. Expected sensor conditions such as
//! "no finger present" or "template not found" are not errors; they are
//! variants of the status enums in [`crate::traits`].

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Device communication error (framing, checksum, packet receive).
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Device answered with a packet that could not be interpreted.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns `true` if the device is gone rather than momentarily unhappy.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("R307");
        assert!(error.is_disconnected());
        assert_eq!(error.to_string(), "Device disconnected: R307");
    }

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(1000);
        assert!(matches!(error, HardwareError::Timeout { .. }));
        assert!(!error.is_disconnected());
        assert_eq!(error.to_string(), "Operation timeout after 1000ms");
    }

    #[test]
    fn test_communication_error() {
        let error = HardwareError::communication("checksum mismatch");
        assert_eq!(error.to_string(), "Communication error: checksum mismatch");
    }

    #[test]
    fn test_invalid_response_error() {
        let error = HardwareError::invalid_response("short packet");
        assert_eq!(error.to_string(), "Invalid response: short packet");
    }
}
