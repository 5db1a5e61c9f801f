//! Common test utilities for network integration tests.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rollcall_core::{CardId, FingerprintId};
use rollcall_engine::telemetry::{TelemetryConfig, TelemetryDispatcher};
use rollcall_engine::{ControlHandle, Engine, EngineConfig, TelemetryStats};
use rollcall_hardware::mock::{
    MockFingerprintHandle, MockFingerprintSensor, MockProximityReader, MockProximityReaderHandle,
};
use rollcall_network::{HttpTransport, LinkMonitor, router};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const API_KEY: &str = "test-key";

pub type TestEngine = Engine<MockFingerprintSensor, MockProximityReader, HttpTransport, LinkMonitor>;

/// Router plus a live engine behind it.
pub struct Rig {
    pub app: Router,
    pub engine: TestEngine,
    pub control: ControlHandle,
    pub fingers: MockFingerprintHandle,
    pub cards: MockProximityReaderHandle,
    pub link: LinkMonitor,
}

impl Rig {
    /// Rig whose telemetry goes to `telemetry_url`.
    pub fn new(telemetry_url: &str) -> Self {
        let (sensor, fingers) = MockFingerprintSensor::new();
        let (reader, cards) = MockProximityReader::new();
        let link = LinkMonitor::new(true);

        let telemetry = TelemetryConfig {
            url: telemetry_url.to_string(),
            api_key: API_KEY.to_string(),
            timeout: Duration::from_secs(2),
        };
        let dispatcher =
            TelemetryDispatcher::new(telemetry, HttpTransport::new().unwrap(), link.clone());

        let config = EngineConfig {
            tick_interval: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        let (engine, control) = Engine::new(config, sensor, reader, dispatcher);

        Self {
            app: router(control.clone()),
            engine,
            control,
            fingers,
            cards,
            link,
        }
    }

    /// Rig whose link is down, so telemetry never leaves the process.
    pub fn offline() -> Self {
        let rig = Self::new("http://127.0.0.1:9/attendances");
        rig.link.set_connected(false);
        rig
    }

    /// Run `scenario` against the router while the engine ticks alongside.
    pub async fn drive<F, Fut>(self, scenario: F) -> (Fut::Output, TelemetryStats)
    where
        F: FnOnce(Router) -> Fut,
        Fut: Future,
    {
        let shutdown = CancellationToken::new();
        let app = self.app.clone();

        let (stats, output) = tokio::join!(self.engine.run(shutdown.clone()), async {
            let output = scenario(app).await;
            shutdown.cancel();
            output
        });

        (output, stats)
    }
}

/// Send one request through the router and decode the JSON reply.
pub async fn call(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

/// Poll `uri` until `ready` accepts the body or two seconds pass.
pub async fn wait_for<P>(app: &Router, uri: &str, ready: P) -> Value
where
    P: Fn(&Value) -> bool,
{
    for _ in 0..400 {
        let (_, body) = call(app, "GET", uri, None).await;
        if ready(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{uri} never reached the expected state");
}

pub fn card(hex: &str) -> CardId {
    CardId::from_hex(hex).unwrap()
}

pub fn fid(value: u8) -> FingerprintId {
    FingerprintId::new(value).unwrap()
}
