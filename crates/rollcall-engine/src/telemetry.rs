//! Delivery of identification events to the attendance backend.
//!
//! The dispatcher knows the payload and how to read the answer; the actual
//! HTTP exchange and link state come from the [`Transport`] and
//! [`Connectivity`] capabilities so that the engine stays independent of any
//! network stack.
//!
//! # Examples
//!
//! ```no_run
//! use rollcall_engine::telemetry::{DispatchOutcome, TelemetryConfig, TelemetryDispatcher};
//! # use rollcall_engine::telemetry::{Connectivity, OutboundRequest, Transport, TransportError, TransportResponse};
//! # struct Http;
//! # impl Transport for Http {
//! #     async fn send(&self, _r: OutboundRequest) -> Result<TransportResponse, TransportError> {
//! #         Ok(TransportResponse { status: 200, body: String::new() })
//! #     }
//! # }
//! # struct Up;
//! # impl Connectivity for Up { fn is_connected(&self) -> bool { true } }
//! # async fn example(event: rollcall_core::IdentificationEvent) {
//! let dispatcher = TelemetryDispatcher::new(TelemetryConfig::default(), Http, Up);
//!
//! match dispatcher.dispatch(&event).await {
//!     DispatchOutcome::Accepted { status } => println!("delivered ({status})"),
//!     other => println!("not delivered: {other:?}"),
//! }
//! # }
//! ```

use rollcall_core::IdentificationEvent;
use rollcall_core::constants::DEFAULT_TELEMETRY_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A fully formed request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Upper bound the transport should apply to the whole exchange.
    pub timeout: Duration,
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failures where no HTTP response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Sends one request and returns the response.
///
/// Futures must be `Send`: dispatches run on their own task so a slow
/// backend never stalls the engine tick.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// Reports whether the network link is up.
pub trait Connectivity: Send + Sync + 'static {
    fn is_connected(&self) -> bool;
}

/// How a single dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Backend answered 2xx.
    Accepted { status: u16 },
    /// Backend answered with any other status.
    Rejected { status: u16 },
    /// No response: connection failure or timeout.
    TransportError { message: String },
    /// Link down; nothing was sent.
    Disconnected,
}

/// Where and how events are delivered.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Full URL events are POSTed to.
    pub url: String,
    /// Key sent both as the `Authorization` header and in the body.
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/attendances".to_string(),
            api_key: String::new(),
            timeout: Duration::from_millis(DEFAULT_TELEMETRY_TIMEOUT_MS),
        }
    }
}

/// Body of a telemetry request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(rename = "rfidTag")]
    pub card: String,

    /// Stringified storage location; absent when no fingerprint confirmed.
    #[serde(rename = "fingerprintID", skip_serializing_if = "Option::is_none", default)]
    pub fingerprint: Option<String>,

    #[serde(rename = "apiKey")]
    pub api_key: String,
}

impl TelemetryPayload {
    pub fn new(event: &IdentificationEvent, api_key: &str) -> Self {
        Self {
            card: event.card().to_hex(),
            fingerprint: event.fingerprint().map(|id| id.to_string()),
            api_key: api_key.to_string(),
        }
    }
}

/// Running totals of dispatch outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub accepted: u64,
    pub rejected: u64,
    pub transport_errors: u64,
    pub disconnected: u64,
    /// Dispatch tasks that panicked or were aborted.
    pub lost: u64,
    pub last: Option<DispatchOutcome>,
}

impl TelemetryStats {
    pub fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Accepted { .. } => self.accepted += 1,
            DispatchOutcome::Rejected { .. } => self.rejected += 1,
            DispatchOutcome::TransportError { .. } => self.transport_errors += 1,
            DispatchOutcome::Disconnected => self.disconnected += 1,
        }
        self.last = Some(outcome);
    }

    /// Total number of finished dispatches.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected + self.transport_errors + self.disconnected + self.lost
    }
}

#[derive(Debug)]
struct Inner<T, C> {
    config: TelemetryConfig,
    transport: T,
    connectivity: C,
}

/// Formats events and sends them through a [`Transport`].
///
/// Cheap to clone; clones share the transport.
#[derive(Debug)]
pub struct TelemetryDispatcher<T, C> {
    inner: Arc<Inner<T, C>>,
}

impl<T, C> Clone for TelemetryDispatcher<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport, C: Connectivity> TelemetryDispatcher<T, C> {
    pub fn new(config: TelemetryConfig, transport: T, connectivity: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                connectivity,
            }),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connectivity.is_connected()
    }

    /// Build the request for `event` without sending it.
    ///
    /// # Errors
    /// Fails only if the payload cannot be encoded.
    pub fn build_request(
        &self,
        event: &IdentificationEvent,
    ) -> Result<OutboundRequest, TransportError> {
        let config = &self.inner.config;
        let payload = TelemetryPayload::new(event, &config.api_key);
        let body = serde_json::to_string(&payload)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(OutboundRequest {
            method: Method::Post,
            url: config.url.clone(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), config.api_key.clone()),
            ],
            body,
            timeout: config.timeout,
        })
    }

    /// Send `event` once. Never retries and never panics.
    pub async fn dispatch(&self, event: &IdentificationEvent) -> DispatchOutcome {
        if !self.is_connected() {
            debug!(card = %event.card(), "Link down, telemetry skipped");
            return DispatchOutcome::Disconnected;
        }

        let request = match self.build_request(event) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Could not build telemetry request");
                return DispatchOutcome::TransportError {
                    message: e.to_string(),
                };
            }
        };

        let timeout = request.timeout;
        let sent = tokio::time::timeout(timeout, self.inner.transport.send(request)).await;

        let outcome = match sent {
            Ok(Ok(response)) if (200..300).contains(&response.status) => {
                DispatchOutcome::Accepted {
                    status: response.status,
                }
            }
            Ok(Ok(response)) => DispatchOutcome::Rejected {
                status: response.status,
            },
            Ok(Err(e)) => DispatchOutcome::TransportError {
                message: e.to_string(),
            },
            Err(_) => DispatchOutcome::TransportError {
                message: TransportError::Timeout {
                    duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
                .to_string(),
            },
        };

        match &outcome {
            DispatchOutcome::Accepted { status } => {
                info!(card = %event.card(), status, "Attendance delivered");
            }
            DispatchOutcome::Rejected { status } => {
                warn!(card = %event.card(), status, "Attendance rejected by backend");
            }
            DispatchOutcome::TransportError { message } => {
                warn!(card = %event.card(), error = %message, "Attendance delivery failed");
            }
            DispatchOutcome::Disconnected => {}
        }

        outcome
    }
}
