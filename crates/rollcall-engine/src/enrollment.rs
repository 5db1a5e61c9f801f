//! Two-capture fingerprint enrollment.
//!
//! An [`EnrollmentSession`] walks the sensor through the enrollment protocol
//! one phase per [`step`](EnrollmentSession::step):
//!
//! ```text
//! AwaitFirstCapture → ConvertFirst → CheckDuplicate → AwaitFingerRemoval
//!   → AwaitSecondCapture → ConvertSecond → BuildTemplate → StoreTemplate → done
//! ```
//!
//! Any phase may end the session with an [`EnrollmentFailure`]. Phases that
//! wait for the user (finger placed, finger lifted) stay put until the sensor
//! reports the awaited condition, so the caller decides how often to poll.

use rollcall_core::FingerprintId;
use rollcall_hardware::{
    BiometricDevice, CaptureFault, Conversion, ConversionFault, FuseStatus, HardwareError,
    ImageCapture, LoadStatus, SearchStatus, SensorCode, StoreFault, StoreStatus, TemplateSlot,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Position of an enrollment session in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPhase {
    AwaitFirstCapture,
    ConvertFirst,
    CheckDuplicate,
    AwaitFingerRemoval,
    AwaitSecondCapture,
    ConvertSecond,
    BuildTemplate,
    StoreTemplate,
}

impl fmt::Display for EnrollmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::AwaitFirstCapture => "AwaitFirstCapture",
            Self::ConvertFirst => "ConvertFirst",
            Self::CheckDuplicate => "CheckDuplicate",
            Self::AwaitFingerRemoval => "AwaitFingerRemoval",
            Self::AwaitSecondCapture => "AwaitSecondCapture",
            Self::ConvertSecond => "ConvertSecond",
            Self::BuildTemplate => "BuildTemplate",
            Self::StoreTemplate => "StoreTemplate",
        };
        write!(f, "{phase}")
    }
}

/// Why an enrollment session ended without storing a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrollmentFailure {
    #[error("Image capture failed ({})", .0.code())]
    CaptureError(CaptureFault),

    #[error("Image conversion failed ({})", .0.code())]
    ConversionError(ConversionFault),

    #[error("Fingerprint already enrolled at ID {existing}")]
    DuplicateTemplate { existing: FingerprintId },

    #[error("Template search failed ({0})")]
    SearchError(SensorCode),

    #[error("Fingerprints did not match")]
    TemplateMismatch,

    #[error("Storing template failed ({})", .0.code())]
    StoreError(StoreFault),

    /// Another template was stored at the target while the session ran.
    #[error("Target ID was occupied during enrollment")]
    TargetOccupied,

    #[error("Sensor communication failed: {0}")]
    Device(String),

    #[error("Enrollment cancelled")]
    Cancelled,
}

impl EnrollmentFailure {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CaptureError(_) => "capture_error",
            Self::ConversionError(_) => "conversion_error",
            Self::DuplicateTemplate { .. } => "duplicate_template",
            Self::SearchError(_) => "search_error",
            Self::TemplateMismatch => "template_mismatch",
            Self::StoreError(_) => "store_error",
            Self::TargetOccupied => "target_occupied",
            Self::Device(_) => "device_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Sensor confirmation code behind the failure, when there is one.
    #[must_use]
    pub fn sensor_code(&self) -> Option<SensorCode> {
        match self {
            Self::CaptureError(fault) => Some(fault.code()),
            Self::ConversionError(fault) => Some(fault.code()),
            Self::SearchError(code) => Some(*code),
            Self::TemplateMismatch => Some(SensorCode::ENROLL_MISMATCH),
            Self::StoreError(fault) => Some(fault.code()),
            Self::DuplicateTemplate { .. }
            | Self::TargetOccupied
            | Self::Device(_)
            | Self::Cancelled => None,
        }
    }
}

impl From<HardwareError> for EnrollmentFailure {
    fn from(error: HardwareError) -> Self {
        Self::Device(error.to_string())
    }
}

/// How a finished enrollment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentResult {
    Enrolled,
    Failed,
}

/// Summary of a finished enrollment, kept for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentReport {
    pub id: FingerprintId,
    pub status: EnrollmentResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<SensorCode>,
    pub message: String,
}

impl EnrollmentReport {
    #[must_use]
    pub fn stored(id: FingerprintId) -> Self {
        Self {
            id,
            status: EnrollmentResult::Enrolled,
            reason: None,
            code: None,
            message: format!("Fingerprint enrolled at ID {id}"),
        }
    }

    #[must_use]
    pub fn failed(id: FingerprintId, failure: &EnrollmentFailure) -> Self {
        Self {
            id,
            status: EnrollmentResult::Failed,
            reason: Some(failure.reason()),
            code: failure.sensor_code(),
            message: failure.to_string(),
        }
    }
}

/// Result of advancing a session by one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentStep {
    /// Still running; poll again next tick.
    Pending,
    /// Template stored at the session's target.
    Stored,
    Failed(EnrollmentFailure),
}

/// A single in-progress enrollment.
#[derive(Debug, Clone)]
pub struct EnrollmentSession {
    target: FingerprintId,
    phase: EnrollmentPhase,
    first_template_captured: bool,
}

impl EnrollmentSession {
    /// Start a session that will store its template at `target`.
    ///
    /// The caller is responsible for checking that `target` is free.
    #[must_use]
    pub fn new(target: FingerprintId) -> Self {
        Self {
            target,
            phase: EnrollmentPhase::AwaitFirstCapture,
            first_template_captured: false,
        }
    }

    #[must_use]
    pub fn target(&self) -> FingerprintId {
        self.target
    }

    #[must_use]
    pub fn phase(&self) -> EnrollmentPhase {
        self.phase
    }

    #[must_use]
    pub fn first_template_captured(&self) -> bool {
        self.first_template_captured
    }

    /// Advance by exactly one phase transition (or one poll of a waiting
    /// phase).
    pub async fn step<B: BiometricDevice>(&mut self, sensor: &mut B) -> EnrollmentStep {
        match self.advance(sensor).await {
            Ok(Some(next)) => {
                if next != self.phase {
                    debug!(id = %self.target, from = %self.phase, to = %next, "Enrollment advanced");
                    if next == EnrollmentPhase::AwaitFingerRemoval {
                        info!(id = %self.target, "Remove finger");
                    } else if next == EnrollmentPhase::AwaitSecondCapture {
                        info!(id = %self.target, "Place same finger again");
                    }
                }
                self.phase = next;
                EnrollmentStep::Pending
            }
            Ok(None) => EnrollmentStep::Stored,
            Err(failure) => EnrollmentStep::Failed(failure),
        }
    }

    /// Returns the next phase, or `None` once the template is stored.
    async fn advance<B: BiometricDevice>(
        &mut self,
        sensor: &mut B,
    ) -> Result<Option<EnrollmentPhase>, EnrollmentFailure> {
        use EnrollmentPhase::*;

        let next = match self.phase {
            AwaitFirstCapture => await_capture(sensor, AwaitFirstCapture, ConvertFirst).await?,
            ConvertFirst => {
                convert(sensor, TemplateSlot::One).await?;
                self.first_template_captured = true;
                CheckDuplicate
            }
            CheckDuplicate => match sensor.search_stored(TemplateSlot::One).await? {
                SearchStatus::Found { id, .. } => {
                    return Err(EnrollmentFailure::DuplicateTemplate { existing: id });
                }
                SearchStatus::NotFound => AwaitFingerRemoval,
                SearchStatus::Failed(code) => return Err(EnrollmentFailure::SearchError(code)),
            },
            AwaitFingerRemoval => match sensor.capture_image().await? {
                ImageCapture::NoFinger => AwaitSecondCapture,
                ImageCapture::Captured | ImageCapture::Failed(_) => AwaitFingerRemoval,
            },
            AwaitSecondCapture => {
                await_capture(sensor, AwaitSecondCapture, ConvertSecond).await?
            }
            ConvertSecond => {
                convert(sensor, TemplateSlot::Two).await?;
                BuildTemplate
            }
            BuildTemplate => match sensor.fuse_slots().await? {
                FuseStatus::Fused => StoreTemplate,
                FuseStatus::Mismatch => return Err(EnrollmentFailure::TemplateMismatch),
            },
            StoreTemplate => {
                if sensor.load_template(self.target).await? == LoadStatus::Loaded {
                    return Err(EnrollmentFailure::TargetOccupied);
                }
                match sensor.store_template(self.target).await? {
                    StoreStatus::Stored => return Ok(None),
                    StoreStatus::Failed(fault) => return Err(EnrollmentFailure::StoreError(fault)),
                }
            }
        };

        Ok(Some(next))
    }
}

async fn await_capture<B: BiometricDevice>(
    sensor: &mut B,
    waiting: EnrollmentPhase,
    next: EnrollmentPhase,
) -> Result<EnrollmentPhase, EnrollmentFailure> {
    match sensor.capture_image().await? {
        ImageCapture::Captured => Ok(next),
        ImageCapture::NoFinger => Ok(waiting),
        ImageCapture::Failed(fault) => Err(EnrollmentFailure::CaptureError(fault)),
    }
}

async fn convert<B: BiometricDevice>(
    sensor: &mut B,
    slot: TemplateSlot,
) -> Result<(), EnrollmentFailure> {
    match sensor.convert_image(slot).await? {
        Conversion::Converted => Ok(()),
        Conversion::Failed(fault) => Err(EnrollmentFailure::ConversionError(fault)),
    }
}
