//! Control requests accepted by the engine.
//!
//! Outside callers (the HTTP API, the serial console) never touch engine state
//! directly. They submit a [`ControlRequest`] through a [`ControlHandle`] and
//! receive the reply once the engine has serviced it, which happens at the
//! start of the next tick.
//!
//! ```text
//! axum handler ──┐
//!                ├──► mpsc (bounded) ──► Engine::tick ──► oneshot reply
//! console task ──┘
//! ```

use crate::enrollment::{EnrollmentPhase, EnrollmentReport};
use crate::scan::ScanPhase;
use crate::telemetry::TelemetryStats;
use rollcall_core::{FingerprintId, IdentificationEvent};
use rollcall_hardware::{SensorCode, SensorParameters};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;

/// Result type alias for control operations.
pub type ControlResult = Result<ControlResponse, ControlError>;

/// Commands the engine services between state machine steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Status,
    /// Probe every storage location for a stored template.
    ///
    /// The probe is spread over several ticks; the reply arrives once the
    /// last location has been checked.
    ListFingerprints,
    Enroll { id: FingerprintId },
    CancelEnrollment,
    EnrollmentStatus,
    Delete { id: FingerprintId },
    SetAttendance { enabled: bool },
    SetFingerprintRequired { required: bool },
    ToggleFingerprintRequired,
    /// Handshake with the sensor and read its parameters.
    TestSensor,
    Records { limit: usize },
}

/// Successful replies, one per request kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlResponse {
    Status(StatusReport),
    Fingerprints(Vec<FingerprintId>),
    EnrollmentStarted { id: FingerprintId },
    EnrollmentCancelled { id: FingerprintId },
    Enrollment(EnrollmentStatus),
    Deleted { id: FingerprintId },
    AttendanceMode { enabled: bool },
    FingerprintMode { required: bool },
    SensorTest(SensorTestReport),
    Records(Vec<IdentificationEvent>),
}

/// Snapshot of the engine's externally visible state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub fingerprint_required: bool,
    pub attendance_enabled: bool,
    /// Whether the sensor answered its last handshake.
    pub sensor_available: bool,
    /// Whether the network link is up.
    pub connected: bool,
    pub uptime_ms: u64,
    pub scan_phase: ScanPhase,
    pub enrollment_phase: Option<EnrollmentPhase>,
    pub record_count: usize,
    pub telemetry: TelemetryStats,
}

/// Active session (if any) plus the outcome of the last finished one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentStatus {
    pub active: Option<ActiveEnrollment>,
    pub last: Option<EnrollmentReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveEnrollment {
    pub id: FingerprintId,
    pub phase: EnrollmentPhase,
    pub first_template_captured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorTestReport {
    pub connected: bool,
    pub parameters: Option<SensorParameters>,
}

/// Why a control request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("Fingerprint sensor not connected")]
    DeviceUnavailable,

    #[error("ID already in use")]
    IdOccupied { id: FingerprintId },

    #[error("Fingerprint not found at ID {id}")]
    NotPresent { id: FingerprintId },

    #[error("Failed to delete fingerprint")]
    DeleteFailed { id: FingerprintId, code: SensorCode },

    #[error("Sensor communication failed: {0}")]
    Device(String),

    /// Another session owns the devices.
    #[error("Busy: {0}")]
    Busy(&'static str),

    #[error("No enrollment in progress")]
    NoActiveEnrollment,

    #[error("Engine is not running")]
    EngineStopped,
}

impl ControlError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable => "device_unavailable",
            Self::IdOccupied { .. } => "id_in_use",
            Self::NotPresent { .. } => "not_found",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::Device(_) => "device_error",
            Self::Busy(_) => "busy",
            Self::NoActiveEnrollment => "no_active_enrollment",
            Self::EngineStopped => "engine_stopped",
        }
    }

    /// Sensor confirmation code to report alongside the error.
    #[must_use]
    pub fn sensor_code(&self) -> Option<SensorCode> {
        match self {
            Self::DeleteFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<rollcall_hardware::HardwareError> for ControlError {
    fn from(error: rollcall_hardware::HardwareError) -> Self {
        Self::Device(error.to_string())
    }
}

/// A request paired with the channel its reply goes to.
#[derive(Debug)]
pub(crate) struct ControlEnvelope {
    pub(crate) request: ControlRequest,
    pub(crate) reply: oneshot::Sender<ControlResult>,
}

/// Cloneable sender side of the engine's control queue.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlEnvelope>,
}

impl ControlHandle {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<ControlEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `request` without waiting.
    ///
    /// The returned receiver resolves after the engine's next tick, or a few
    /// ticks later for [`ControlRequest::ListFingerprints`].
    ///
    /// # Errors
    /// `Busy` when the queue is full, `EngineStopped` when the engine is gone.
    pub fn submit(
        &self,
        request: ControlRequest,
    ) -> Result<oneshot::Receiver<ControlResult>, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(ControlEnvelope { request, reply })
            .map_err(|e| match e {
                TrySendError::Full(_) => ControlError::Busy("control queue full"),
                TrySendError::Closed(_) => ControlError::EngineStopped,
            })?;
        Ok(rx)
    }

    /// Queue `request` and wait for the engine's reply.
    pub async fn request(&self, request: ControlRequest) -> ControlResult {
        let rx = self.submit(request)?;
        rx.await.map_err(|_| ControlError::EngineStopped)?
    }

    /// Returns `true` once the engine has shut down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
