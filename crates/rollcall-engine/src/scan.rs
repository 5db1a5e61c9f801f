//! Card scan with bounded fingerprint confirmation.
//!
//! [`ScanMachine`] polls the proximity reader while idle. A detected card
//! opens a [`ScanSession`]; if fingerprint confirmation is required, every
//! following step runs one capture → convert → fast search cycle until a
//! stored template matches or the confirmation window closes.
//!
//! Time is passed in by the caller, which keeps the timeout boundary exact
//! and testable.

use rollcall_core::{CardId, FingerprintId, ScanOutcome};
use rollcall_hardware::{
    BiometricDevice, Conversion, ImageCapture, ProximityReader, SearchStatus, TemplateSlot,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where the scan machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    CardDetected,
    AwaitBiometricConfirmation,
}

/// A card that is waiting to be resolved.
#[derive(Debug, Clone)]
pub struct ScanSession {
    card: CardId,
    started_at: Instant,
    phase: ScanPhase,
}

impl ScanSession {
    #[must_use]
    pub fn card(&self) -> &CardId {
        &self.card
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }
}

/// A finished scan, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResolution {
    pub card: CardId,
    pub fingerprint: Option<FingerprintId>,
    pub outcome: ScanOutcome,
}

/// Drives card detection and fingerprint confirmation.
#[derive(Debug)]
pub struct ScanMachine {
    session: Option<ScanSession>,
    timeout: Duration,
    cooldown: Duration,
    quiet_until: Option<Instant>,
    reader_faulted: bool,
}

impl ScanMachine {
    /// `timeout` bounds the confirmation wait; `cooldown` is the pause after a
    /// resolution before the reader is polled again.
    #[must_use]
    pub fn new(timeout: Duration, cooldown: Duration) -> Self {
        Self {
            session: None,
            timeout,
            cooldown,
            quiet_until: None,
            reader_faulted: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        self.session.as_ref().map_or(ScanPhase::Idle, |s| s.phase)
    }

    #[must_use]
    pub fn session(&self) -> Option<&ScanSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Advance by one step.
    ///
    /// While idle the reader is only polled when `accept_cards` is set and
    /// the post-scan cooldown has passed. A session already in progress is
    /// always driven to completion.
    pub async fn step<R, B>(
        &mut self,
        now: Instant,
        fingerprint_required: bool,
        accept_cards: bool,
        reader: &mut R,
        sensor: &mut B,
    ) -> Option<ScanResolution>
    where
        R: ProximityReader,
        B: BiometricDevice,
    {
        let Some(session) = self.session.as_mut() else {
            if accept_cards {
                self.poll_reader(now, reader).await;
            }
            return None;
        };

        let resolved = match session.phase {
            ScanPhase::Idle | ScanPhase::CardDetected if !fingerprint_required => {
                Some((None, ScanOutcome::Matched))
            }
            ScanPhase::Idle | ScanPhase::CardDetected => {
                info!(card = %session.card, "Card read, place finger on sensor");
                session.phase = ScanPhase::AwaitBiometricConfirmation;
                None
            }
            ScanPhase::AwaitBiometricConfirmation => {
                if now.saturating_duration_since(session.started_at) >= self.timeout {
                    Some((None, ScanOutcome::TimedOut))
                } else {
                    confirm_once(sensor).await
                }
            }
        };

        let (fingerprint, outcome) = resolved?;
        let session = self.session.take()?;
        self.quiet_until = Some(now + self.cooldown);

        Some(ScanResolution {
            card: session.card,
            fingerprint,
            outcome,
        })
    }

    async fn poll_reader<R: ProximityReader>(&mut self, now: Instant, reader: &mut R) {
        if self.quiet_until.is_some_and(|until| now < until) {
            return;
        }

        match reader.poll_new_card().await {
            Ok(Some(card)) => {
                debug!(card = %card, "Card detected");
                self.quiet_until = None;
                self.session = Some(ScanSession {
                    card,
                    started_at: now,
                    phase: ScanPhase::CardDetected,
                });
            }
            Ok(None) => {}
            Err(e) => {
                if !self.reader_faulted {
                    warn!(error = %e, "Card reader poll failed");
                }
                self.reader_faulted = true;
                return;
            }
        }

        if self.reader_faulted {
            info!("Card reader recovered");
            self.reader_faulted = false;
        }
    }
}

/// One capture → convert → fast search cycle.
///
/// `None` means try again next step. A transport failure ends the scan as
/// `NoMatch`.
async fn confirm_once<B: BiometricDevice>(
    sensor: &mut B,
) -> Option<(Option<FingerprintId>, ScanOutcome)> {
    match identify(sensor).await {
        Ok(Some(id)) => Some((Some(id), ScanOutcome::Matched)),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Fingerprint sensor failed during confirmation");
            Some((None, ScanOutcome::NoMatch))
        }
    }
}

async fn identify<B: BiometricDevice>(
    sensor: &mut B,
) -> rollcall_hardware::Result<Option<FingerprintId>> {
    if sensor.capture_image().await? != ImageCapture::Captured {
        return Ok(None);
    }
    if sensor.convert_image(TemplateSlot::One).await? != Conversion::Converted {
        return Ok(None);
    }

    match sensor.fast_search().await? {
        SearchStatus::Found { id, confidence } => {
            debug!(id = %id, confidence, "Fingerprint matched");
            Ok(Some(id))
        }
        SearchStatus::NotFound => Ok(None),
        SearchStatus::Failed(code) => {
            debug!(code = %code, "Fingerprint search failed, retrying");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_hardware::mock::{
        MockFingerprintHandle, MockFingerprintSensor, MockProximityReader,
        MockProximityReaderHandle,
    };

    struct Rig {
        machine: ScanMachine,
        reader: MockProximityReader,
        cards: MockProximityReaderHandle,
        sensor: MockFingerprintSensor,
        fingers: MockFingerprintHandle,
        start: Instant,
    }

    impl Rig {
        fn new() -> Self {
            let (reader, cards) = MockProximityReader::new();
            let (sensor, fingers) = MockFingerprintSensor::new();
            Self {
                machine: ScanMachine::new(Duration::from_millis(10_000), Duration::from_millis(1_000)),
                reader,
                cards,
                sensor,
                fingers,
                start: Instant::now(),
            }
        }

        async fn step_at(&mut self, offset_ms: u64, required: bool) -> Option<ScanResolution> {
            let now = self.start + Duration::from_millis(offset_ms);
            self.machine
                .step(now, required, true, &mut self.reader, &mut self.sensor)
                .await
        }
    }

    fn card(hex: &str) -> CardId {
        CardId::from_hex(hex).unwrap()
    }

    #[tokio::test]
    async fn test_card_only_mode_matches_without_fingerprint() {
        let mut rig = Rig::new();
        rig.cards.present_card(card("04ABCDEF")).unwrap();

        assert!(rig.step_at(0, false).await.is_none());
        assert_eq!(rig.machine.phase(), ScanPhase::CardDetected);

        let resolution = rig.step_at(50, false).await.unwrap();
        assert_eq!(resolution.outcome, ScanOutcome::Matched);
        assert_eq!(resolution.fingerprint, None);
        assert_eq!(rig.machine.phase(), ScanPhase::Idle);
    }

    #[tokio::test]
    async fn test_matching_finger_resolves_with_id() {
        let mut rig = Rig::new();
        let id = FingerprintId::new(5).unwrap();
        rig.fingers.enroll(id, vec![1, 2, 3]);
        rig.cards.present_card(card("01")).unwrap();

        rig.step_at(0, true).await;
        assert!(rig.step_at(50, true).await.is_none());
        assert_eq!(rig.machine.phase(), ScanPhase::AwaitBiometricConfirmation);

        // No finger yet, then an unknown finger: both retried.
        assert!(rig.step_at(100, true).await.is_none());
        rig.fingers.place_finger(vec![9]);
        assert!(rig.step_at(150, true).await.is_none());

        rig.fingers.place_finger(vec![1, 2, 3]);
        let resolution = rig.step_at(200, true).await.unwrap();
        assert_eq!(resolution.outcome, ScanOutcome::Matched);
        assert_eq!(resolution.fingerprint, Some(id));
    }

    #[tokio::test]
    async fn test_timeout_boundary() {
        let mut rig = Rig::new();
        rig.cards.present_card(card("01")).unwrap();

        rig.step_at(0, true).await;
        rig.step_at(50, true).await;

        assert!(rig.step_at(9_999, true).await.is_none());
        let resolution = rig.step_at(10_000, true).await.unwrap();
        assert_eq!(resolution.outcome, ScanOutcome::TimedOut);
        assert_eq!(resolution.card, card("01"));
    }

    #[tokio::test]
    async fn test_sensor_failure_resolves_no_match() {
        let mut rig = Rig::new();
        rig.cards.present_card(card("01")).unwrap();
        rig.step_at(0, true).await;
        rig.step_at(50, true).await;

        rig.fingers.fail_next_transport();
        let resolution = rig.step_at(100, true).await.unwrap();
        assert_eq!(resolution.outcome, ScanOutcome::NoMatch);
    }

    #[tokio::test]
    async fn test_cooldown_defers_next_card() {
        let mut rig = Rig::new();
        rig.cards.present_card(card("01")).unwrap();
        rig.step_at(0, false).await;
        rig.step_at(50, false).await.unwrap();

        rig.cards.present_card(card("02")).unwrap();
        rig.step_at(500, false).await;
        assert_eq!(rig.machine.phase(), ScanPhase::Idle);

        rig.step_at(1_050, false).await;
        assert_eq!(rig.machine.session().map(|s| s.card().clone()), Some(card("02")));
    }

    #[tokio::test]
    async fn test_reader_not_polled_when_cards_refused() {
        let mut rig = Rig::new();
        rig.cards.present_card(card("01")).unwrap();

        let now = rig.start;
        let resolution = rig
            .machine
            .step(now, true, false, &mut rig.reader, &mut rig.sensor)
            .await;
        assert!(resolution.is_none());
        assert!(!rig.machine.is_active());
    }

    #[tokio::test]
    async fn test_reader_fault_keeps_machine_idle() {
        let mut rig = Rig::new();
        rig.cards.set_connected(false);
        assert!(rig.step_at(0, true).await.is_none());
        assert_eq!(rig.machine.phase(), ScanPhase::Idle);

        rig.cards.set_connected(true);
        rig.cards.present_card(card("01")).unwrap();
        rig.step_at(50, true).await;
        assert_eq!(rig.machine.phase(), ScanPhase::CardDetected);
    }
}
