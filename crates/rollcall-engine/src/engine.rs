//! The cooperative coordination engine.
//!
//! One [`Engine`] owns the devices, the mode flags, the active sessions and
//! the record history. Everything happens inside [`Engine::tick`]:
//!
//! 1. reap finished telemetry dispatches,
//! 2. service at most one queued control request,
//! 3. probe the next batch of storage locations for a pending listing,
//! 4. advance the active enrollment by one step,
//! 5. advance the scan machine by one step.
//!
//! Every await inside a tick is a bounded device call, so a scan that is
//! waiting for a finger never delays control requests by more than one tick.
//! A library listing is the one request that needs more than a handful of
//! device calls; it is spread over several ticks and answered when the last
//! location has been probed. Telemetry is the exception to "everything inside the tick": each
//! dispatch runs on its own task and is collected on a later tick.
//!
//! At most one session of either kind exists at a time: enrollment requests
//! are refused while a card is being confirmed, and the reader is not polled
//! while an enrollment runs. Loading a stored model overwrites the sensor's
//! first character buffer, so listing and deleting are refused while an
//! enrollment holds a capture there.

use crate::control::{
    ActiveEnrollment, ControlEnvelope, ControlError, ControlHandle, ControlRequest,
    ControlResponse, ControlResult, EnrollmentStatus, SensorTestReport, StatusReport,
};
use crate::enrollment::{EnrollmentFailure, EnrollmentReport, EnrollmentSession, EnrollmentStep};
use crate::ring::RecordRing;
use crate::scan::{ScanMachine, ScanPhase, ScanResolution};
use crate::telemetry::{Connectivity, DispatchOutcome, TelemetryDispatcher, TelemetryStats, Transport};
use rollcall_core::constants::{
    CONTROL_QUEUE_CAPACITY, DEFAULT_LIST_BATCH, DEFAULT_PROBE_ATTEMPTS, DEFAULT_PROBE_INTERVAL_MS,
    DEFAULT_SCAN_COOLDOWN_MS, DEFAULT_SCAN_TIMEOUT_MS, DEFAULT_TICK_INTERVAL_MS, MAX_FINGERPRINT_ID,
    MIN_FINGERPRINT_ID, RECORD_CAPACITY,
};
use rollcall_core::{FingerprintId, IdentificationEvent};
use rollcall_hardware::{BiometricDevice, DeleteStatus, LoadStatus, ProximityReader};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing and sizing of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Period of [`Engine::run`]'s tick.
    pub tick_interval: Duration,
    /// Confirmation window after a card is detected.
    pub scan_timeout: Duration,
    /// Pause after a resolved scan before the reader is polled again.
    pub scan_cooldown: Duration,
    /// Startup handshake attempts before falling back to card-only mode.
    pub probe_attempts: u32,
    pub probe_interval: Duration,
    /// Storage locations probed per tick while listing fingerprints.
    pub list_batch: usize,
    pub record_capacity: usize,
    pub control_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            scan_timeout: Duration::from_millis(DEFAULT_SCAN_TIMEOUT_MS),
            scan_cooldown: Duration::from_millis(DEFAULT_SCAN_COOLDOWN_MS),
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            probe_interval: Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS),
            list_batch: DEFAULT_LIST_BATCH,
            record_capacity: RECORD_CAPACITY,
            control_queue: CONTROL_QUEUE_CAPACITY,
        }
    }
}

/// Process-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeFlags {
    /// Cards must be confirmed by a stored fingerprint.
    pub fingerprint_required: bool,
    /// The reader is polled for cards.
    pub attendance_enabled: bool,
}

impl Default for ModeFlags {
    fn default() -> Self {
        Self {
            fingerprint_required: true,
            attendance_enabled: false,
        }
    }
}

/// A fingerprint listing in progress.
#[derive(Debug)]
struct Listing {
    /// Next storage location to probe.
    next: u8,
    stored: Vec<FingerprintId>,
    reply: oneshot::Sender<ControlResult>,
}

/// The coordination engine.
///
/// Created together with the [`ControlHandle`] used to talk to it.
///
/// # Examples
///
/// ```
/// use rollcall_engine::{Engine, EngineConfig};
/// use rollcall_engine::control::{ControlRequest, ControlResponse};
/// # use rollcall_engine::telemetry::*;
/// use rollcall_hardware::mock::{MockFingerprintSensor, MockProximityReader};
/// # struct Offline;
/// # impl Transport for Offline {
/// #     async fn send(&self, _r: OutboundRequest) -> Result<TransportResponse, TransportError> {
/// #         Err(TransportError::Connection("offline".into()))
/// #     }
/// # }
/// # impl Connectivity for Offline { fn is_connected(&self) -> bool { false } }
///
/// #[tokio::main]
/// async fn main() {
///     let (sensor, _fingers) = MockFingerprintSensor::new();
///     let (reader, _cards) = MockProximityReader::new();
///     let dispatcher = TelemetryDispatcher::new(TelemetryConfig::default(), Offline, Offline);
///
///     let (mut engine, control) = Engine::new(EngineConfig::default(), sensor, reader, dispatcher);
///
///     let reply = control.submit(ControlRequest::SetAttendance { enabled: true }).unwrap();
///     engine.tick().await;
///
///     assert_eq!(
///         reply.await.unwrap().unwrap(),
///         ControlResponse::AttendanceMode { enabled: true }
///     );
///     assert!(engine.flags().attendance_enabled);
/// }
/// ```
#[derive(Debug)]
pub struct Engine<B, R, T, C> {
    config: EngineConfig,
    sensor: B,
    reader: R,
    dispatcher: TelemetryDispatcher<T, C>,
    control_rx: mpsc::Receiver<ControlEnvelope>,

    flags: ModeFlags,
    sensor_available: bool,

    enrollment: Option<EnrollmentSession>,
    listing: Option<Listing>,
    last_enrollment: Option<EnrollmentReport>,
    scan: ScanMachine,
    records: RecordRing<IdentificationEvent>,

    in_flight: JoinSet<DispatchOutcome>,
    telemetry: TelemetryStats,

    started_at: Instant,
}

impl<B, R, T, C> Engine<B, R, T, C>
where
    B: BiometricDevice,
    R: ProximityReader,
    T: Transport,
    C: Connectivity,
{
    pub fn new(
        config: EngineConfig,
        sensor: B,
        reader: R,
        dispatcher: TelemetryDispatcher<T, C>,
    ) -> (Self, ControlHandle) {
        let (control, control_rx) = ControlHandle::channel(config.control_queue);

        let engine = Self {
            scan: ScanMachine::new(config.scan_timeout, config.scan_cooldown),
            records: RecordRing::with_capacity(config.record_capacity),
            config,
            sensor,
            reader,
            dispatcher,
            control_rx,
            flags: ModeFlags::default(),
            sensor_available: true,
            enrollment: None,
            listing: None,
            last_enrollment: None,
            in_flight: JoinSet::new(),
            telemetry: TelemetryStats::default(),
            started_at: Instant::now(),
        };

        (engine, control)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    pub fn sensor_available(&self) -> bool {
        self.sensor_available
    }

    pub fn records(&self) -> &RecordRing<IdentificationEvent> {
        &self.records
    }

    pub fn scan_phase(&self) -> ScanPhase {
        self.scan.phase()
    }

    pub fn enrollment(&self) -> Option<&EnrollmentSession> {
        self.enrollment.as_ref()
    }

    pub fn last_enrollment(&self) -> Option<&EnrollmentReport> {
        self.last_enrollment.as_ref()
    }

    pub fn telemetry_stats(&self) -> &TelemetryStats {
        &self.telemetry
    }

    /// Dispatches spawned but not yet collected.
    pub fn pending_dispatches(&self) -> usize {
        self.in_flight.len()
    }

    pub fn uptime_ms(&self) -> u64 {
        millis(Instant::now().saturating_duration_since(self.started_at))
    }

    /// Startup liveness probe of the fingerprint sensor.
    ///
    /// Retries the handshake `probe_attempts` times. A sensor that never
    /// answers switches the terminal to card-only operation.
    pub async fn start(&mut self) {
        match self.reader.get_reader_info().await {
            Ok(info) => info!(reader = %info.name, protocols = ?info.protocols, "Card reader ready"),
            Err(e) => warn!(error = %e, "Card reader not answering"),
        }

        let attempts = self.config.probe_attempts.max(1);

        for attempt in 1..=attempts {
            match self.sensor.verify().await {
                Ok(true) => {
                    info!(attempt, "Fingerprint sensor found");
                    self.sensor_available = true;
                    self.log_sensor_parameters().await;
                    return;
                }
                Ok(false) => warn!(attempt, attempts, "Fingerprint sensor rejected handshake"),
                Err(e) => warn!(attempt, attempts, error = %e, "Fingerprint sensor not answering"),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.probe_interval).await;
            }
        }

        warn!("Fingerprint sensor unavailable, continuing in card-only mode");
        self.sensor_available = false;
        self.flags.fingerprint_required = false;
    }

    async fn log_sensor_parameters(&mut self) {
        if let Ok(device) = self.sensor.get_device_info().await {
            info!(
                name = %device.name,
                model = %device.model,
                firmware = ?device.firmware_version,
                "Fingerprint sensor identified"
            );
        }

        match self.sensor.parameters().await {
            Ok(p) => info!(
                status_register = p.status_register,
                system_id = p.system_id,
                capacity = p.capacity,
                security_level = p.security_level,
                "Sensor parameters"
            ),
            Err(e) => warn!(error = %e, "Could not read sensor parameters"),
        }
    }

    /// Run one scheduling slice.
    pub async fn tick(&mut self) {
        self.reap_telemetry();
        self.service_control().await;
        self.step_listing().await;
        self.step_enrollment().await;
        self.step_scan().await;
    }

    /// Tick every `tick_interval` until `shutdown` fires, then wait for
    /// in-flight telemetry. Returns the final telemetry counters.
    pub async fn run(mut self, shutdown: CancellationToken) -> TelemetryStats {
        let period = self.config.tick_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(tick_ms = millis(period), "Coordination engine running");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        info!(pending = self.in_flight.len(), "Engine stopping");
        self.flush_telemetry().await;
        self.telemetry
    }

    /// Wait for every spawned dispatch and record its outcome.
    pub async fn flush_telemetry(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            self.record_dispatch(joined);
        }
    }

    fn reap_telemetry(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.record_dispatch(joined);
        }
    }

    fn record_dispatch(&mut self, joined: Result<DispatchOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.telemetry.record(outcome),
            Err(e) => {
                warn!(error = %e, "Telemetry task failed");
                self.telemetry.lost += 1;
            }
        }
    }

    async fn service_control(&mut self) {
        let Ok(envelope) = self.control_rx.try_recv() else {
            return;
        };

        debug!(request = ?envelope.request, "Servicing control request");
        self.handle_request(envelope).await;
    }

    /// Answer `request`, or park the reply when the work spans several ticks.
    async fn handle_request(&mut self, ControlEnvelope { request, reply }: ControlEnvelope) {
        let result = match request {
            ControlRequest::Status => Ok(ControlResponse::Status(self.status_report())),
            ControlRequest::ListFingerprints => match self.begin_listing().await {
                Ok(()) => {
                    self.listing = Some(Listing {
                        next: MIN_FINGERPRINT_ID,
                        stored: Vec::new(),
                        reply,
                    });
                    return;
                }
                Err(e) => Err(e),
            },
            ControlRequest::Enroll { id } => self.start_enrollment(id).await,
            ControlRequest::CancelEnrollment => self.cancel_enrollment(),
            ControlRequest::EnrollmentStatus => {
                Ok(ControlResponse::Enrollment(self.enrollment_status()))
            }
            ControlRequest::Delete { id } => self.delete(id).await,
            ControlRequest::SetAttendance { enabled } => {
                self.flags.attendance_enabled = enabled;
                info!(enabled, "Attendance mode changed");
                Ok(ControlResponse::AttendanceMode { enabled })
            }
            ControlRequest::SetFingerprintRequired { required } => {
                Ok(self.set_fingerprint_required(required))
            }
            ControlRequest::ToggleFingerprintRequired => {
                Ok(self.set_fingerprint_required(!self.flags.fingerprint_required))
            }
            ControlRequest::TestSensor => self.test_sensor().await,
            ControlRequest::Records { limit } => Ok(ControlResponse::Records(
                self.records.recent(limit).cloned().collect(),
            )),
        };

        answer(reply, result);
    }

    fn set_fingerprint_required(&mut self, required: bool) -> ControlResponse {
        self.flags.fingerprint_required = required;
        info!(required, "Fingerprint mode changed");
        ControlResponse::FingerprintMode { required }
    }

    fn status_report(&self) -> StatusReport {
        StatusReport {
            fingerprint_required: self.flags.fingerprint_required,
            attendance_enabled: self.flags.attendance_enabled,
            sensor_available: self.sensor_available,
            connected: self.dispatcher.is_connected(),
            uptime_ms: self.uptime_ms(),
            scan_phase: self.scan.phase(),
            enrollment_phase: self.enrollment.as_ref().map(EnrollmentSession::phase),
            record_count: self.records.len(),
            telemetry: self.telemetry.clone(),
        }
    }

    fn enrollment_status(&self) -> EnrollmentStatus {
        EnrollmentStatus {
            active: self.enrollment.as_ref().map(|session| ActiveEnrollment {
                id: session.target(),
                phase: session.phase(),
                first_template_captured: session.first_template_captured(),
            }),
            last: self.last_enrollment.clone(),
        }
    }

    /// Handshake before any device-mutating request.
    async fn ensure_sensor(&mut self) -> Result<(), ControlError> {
        let answered = match self.sensor.verify().await {
            Ok(answered) => answered,
            Err(e) => {
                warn!(error = %e, "Fingerprint sensor handshake failed");
                false
            }
        };

        if answered != self.sensor_available {
            info!(available = answered, "Fingerprint sensor availability changed");
            self.sensor_available = answered;
        }

        if answered {
            Ok(())
        } else {
            Err(ControlError::DeviceUnavailable)
        }
    }

    async fn begin_listing(&mut self) -> Result<(), ControlError> {
        if self.listing.is_some() {
            return Err(ControlError::Busy("listing in progress"));
        }
        if self.enrollment.is_some() {
            return Err(ControlError::Busy("enrollment in progress"));
        }

        self.ensure_sensor().await?;
        debug!("Listing stored fingerprints");
        Ok(())
    }

    /// Probe up to `list_batch` locations of the pending listing.
    async fn step_listing(&mut self) {
        let Some(listing) = self.listing.as_mut() else {
            return;
        };

        if listing.reply.is_closed() {
            debug!(next = listing.next, "Listing abandoned by requester");
            self.listing = None;
            return;
        }

        let mut failure = None;
        for _ in 0..self.config.list_batch.max(1) {
            let Ok(id) = FingerprintId::new(listing.next) else {
                break;
            };
            match self.sensor.load_template(id).await {
                Ok(status) => {
                    if status.is_loaded() {
                        listing.stored.push(id);
                    }
                    listing.next = listing.next.saturating_add(1);
                }
                Err(e) => {
                    failure = Some(ControlError::from(e));
                    break;
                }
            }
        }

        let done = failure.is_some() || listing.next > MAX_FINGERPRINT_ID;
        if !done {
            return;
        }

        if let Some(listing) = self.listing.take() {
            let result = match failure {
                Some(e) => Err(e),
                None => {
                    debug!(stored = listing.stored.len(), "Listing finished");
                    Ok(ControlResponse::Fingerprints(listing.stored))
                }
            };
            answer(listing.reply, result);
        }
    }

    async fn start_enrollment(&mut self, id: FingerprintId) -> ControlResult {
        if self.enrollment.is_some() {
            return Err(ControlError::Busy("enrollment in progress"));
        }
        if self.scan.is_active() {
            return Err(ControlError::Busy("scan in progress"));
        }
        if self.listing.is_some() {
            return Err(ControlError::Busy("listing in progress"));
        }

        self.ensure_sensor().await?;
        if self.sensor.load_template(id).await? == LoadStatus::Loaded {
            return Err(ControlError::IdOccupied { id });
        }

        info!(id = %id, "Enrollment started, place finger on sensor");
        self.enrollment = Some(EnrollmentSession::new(id));
        Ok(ControlResponse::EnrollmentStarted { id })
    }

    fn cancel_enrollment(&mut self) -> ControlResult {
        let session = self
            .enrollment
            .take()
            .ok_or(ControlError::NoActiveEnrollment)?;

        let id = session.target();
        info!(id = %id, phase = %session.phase(), "Enrollment cancelled");
        self.last_enrollment = Some(EnrollmentReport::failed(id, &EnrollmentFailure::Cancelled));
        Ok(ControlResponse::EnrollmentCancelled { id })
    }

    async fn delete(&mut self, id: FingerprintId) -> ControlResult {
        if self.enrollment.is_some() {
            return Err(ControlError::Busy("enrollment in progress"));
        }
        self.ensure_sensor().await?;

        if self.sensor.load_template(id).await? == LoadStatus::NotPresent {
            return Err(ControlError::NotPresent { id });
        }

        match self.sensor.delete_template(id).await? {
            DeleteStatus::Deleted => {
                info!(id = %id, "Fingerprint deleted");
                Ok(ControlResponse::Deleted { id })
            }
            status => {
                warn!(id = %id, code = %status.code(), "Fingerprint delete failed");
                Err(ControlError::DeleteFailed {
                    id,
                    code: status.code(),
                })
            }
        }
    }

    async fn test_sensor(&mut self) -> ControlResult {
        let connected = self.ensure_sensor().await.is_ok();
        let parameters = if connected {
            Some(self.sensor.parameters().await?)
        } else {
            None
        };

        Ok(ControlResponse::SensorTest(SensorTestReport {
            connected,
            parameters,
        }))
    }

    async fn step_enrollment(&mut self) {
        let Some(session) = self.enrollment.as_mut() else {
            return;
        };

        let id = session.target();
        let report = match session.step(&mut self.sensor).await {
            EnrollmentStep::Pending => return,
            EnrollmentStep::Stored => {
                info!(id = %id, "Fingerprint enrolled");
                EnrollmentReport::stored(id)
            }
            EnrollmentStep::Failed(failure) => {
                warn!(id = %id, reason = failure.reason(), error = %failure, "Enrollment failed");
                EnrollmentReport::failed(id, &failure)
            }
        };

        self.enrollment = None;
        self.last_enrollment = Some(report);
    }

    async fn step_scan(&mut self) {
        let accept_cards = self.flags.attendance_enabled && self.enrollment.is_none();
        if !accept_cards && !self.scan.is_active() {
            return;
        }

        let resolution = self
            .scan
            .step(
                Instant::now(),
                self.flags.fingerprint_required,
                accept_cards,
                &mut self.reader,
                &mut self.sensor,
            )
            .await;

        if let Some(resolution) = resolution {
            self.complete_scan(resolution).await;
        }
    }

    async fn complete_scan(&mut self, resolution: ScanResolution) {
        if let Err(e) = self.reader.halt().await {
            debug!(error = %e, "Card halt failed");
        }

        let event = IdentificationEvent::new(
            self.uptime_ms(),
            resolution.card,
            resolution.fingerprint,
            resolution.outcome,
        );
        info!(
            card = %event.card(),
            fingerprint = ?event.fingerprint().map(|id| id.as_u8()),
            outcome = %event.outcome(),
            "Scan resolved"
        );

        self.records.append(event.clone());

        let dispatcher = self.dispatcher.clone();
        self.in_flight
            .spawn(async move { dispatcher.dispatch(&event).await });
    }
}

fn answer(reply: oneshot::Sender<ControlResult>, result: ControlResult) {
    if let Err(e) = &result {
        debug!(reason = e.reason(), error = %e, "Control request refused");
    }
    if reply.send(result).is_err() {
        debug!("Control requester went away before the reply");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
