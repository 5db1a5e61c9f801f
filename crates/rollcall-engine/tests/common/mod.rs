//! Common test utilities for engine integration tests.
//!
//! [`Terminal`] wires an [`Engine`] to mock devices, an in-memory transport
//! and a switchable link, and keeps every handle needed to drive the
//! scenario from the outside.

#![allow(dead_code)]

use rollcall_core::{CardId, FingerprintId};
use rollcall_engine::control::{ControlRequest, ControlResult};
use rollcall_engine::telemetry::{
    Connectivity, OutboundRequest, TelemetryConfig, TelemetryDispatcher, Transport,
    TransportError, TransportResponse,
};
use rollcall_engine::{Engine, EngineConfig};
use rollcall_hardware::mock::{
    MockFingerprintHandle, MockFingerprintSensor, MockProximityReader, MockProximityReaderHandle,
};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const API_KEY: &str = "test-key";
pub const TELEMETRY_URL: &str = "http://backend.test/attendances";

/// Transport that records requests and answers with a fixed status.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutboundRequest>>>,
    status: Arc<AtomicU16>,
}

impl RecordingTransport {
    pub fn new(status: u16) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(AtomicU16::new(status)),
        }
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|request| serde_json::from_str(&request.body).unwrap())
            .collect()
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        Ok(TransportResponse {
            status: self.status.load(Ordering::SeqCst),
            body: "{}".to_string(),
        })
    }
}

/// Link state the test can flip.
#[derive(Debug, Clone)]
pub struct LinkSwitch(Arc<AtomicBool>);

impl LinkSwitch {
    pub fn new(up: bool) -> Self {
        Self(Arc::new(AtomicBool::new(up)))
    }

    pub fn set(&self, up: bool) {
        self.0.store(up, Ordering::SeqCst);
    }
}

impl Connectivity for LinkSwitch {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type TestEngine =
    Engine<MockFingerprintSensor, MockProximityReader, RecordingTransport, LinkSwitch>;

/// An engine plus every handle that drives it.
pub struct Terminal {
    pub engine: TestEngine,
    pub control: rollcall_engine::ControlHandle,
    pub fingers: MockFingerprintHandle,
    pub cards: MockProximityReaderHandle,
    pub transport: RecordingTransport,
    pub link: LinkSwitch,
}

impl Terminal {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let (sensor, fingers) = MockFingerprintSensor::new();
        let (reader, cards) = MockProximityReader::new();
        let transport = RecordingTransport::new(200);
        let link = LinkSwitch::new(true);

        let telemetry = TelemetryConfig {
            url: TELEMETRY_URL.to_string(),
            api_key: API_KEY.to_string(),
            timeout: Duration::from_millis(10_000),
        };
        let dispatcher = TelemetryDispatcher::new(telemetry, transport.clone(), link.clone());
        let (engine, control) = Engine::new(config, sensor, reader, dispatcher);

        Self {
            engine,
            control,
            fingers,
            cards,
            transport,
            link,
        }
    }

    /// Submit `request`, run one tick and return the reply.
    pub async fn request(&mut self, request: ControlRequest) -> ControlResult {
        let mut reply = self.control.submit(request).unwrap();
        self.engine.tick().await;
        reply
            .try_recv()
            .expect("request must be serviced within one tick")
    }

    /// Submit `request` and tick until the reply arrives.
    ///
    /// Returns the reply and the number of sensor operations issued by each
    /// tick along the way.
    pub async fn request_until_answered(
        &mut self,
        request: ControlRequest,
    ) -> (ControlResult, Vec<u64>) {
        let mut reply = self.control.submit(request).unwrap();
        let mut per_tick = Vec::new();

        for _ in 0..1_000 {
            let before = self.fingers.operation_count();
            self.engine.tick().await;
            per_tick.push(self.fingers.operation_count() - before);

            if let Ok(result) = reply.try_recv() {
                return (result, per_tick);
            }
        }
        panic!("request not answered within 1000 ticks");
    }

    pub async fn ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.engine.tick().await;
        }
    }

    /// Move the paused clock forward, then tick once.
    pub async fn advance_and_tick(&mut self, millis: u64) {
        tokio::time::advance(Duration::from_millis(millis)).await;
        self.engine.tick().await;
    }

    pub fn present(&self, hex: &str) {
        self.cards.present_card(card(hex)).unwrap();
    }
}

pub fn card(hex: &str) -> CardId {
    CardId::from_hex(hex).unwrap()
}

pub fn fid(value: u8) -> FingerprintId {
    FingerprintId::new(value).unwrap()
}
