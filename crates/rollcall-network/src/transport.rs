//! HTTP transport for telemetry, backed by `reqwest`.

use rollcall_engine::telemetry::{
    Method, OutboundRequest, Transport, TransportError, TransportResponse,
};
use std::time::Duration;
use tracing::{debug, trace};

/// [`Transport`] that performs real HTTP requests.
///
/// The per-request timeout from [`OutboundRequest::timeout`] is applied by
/// the client, so a hung backend ends as [`TransportError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rollcall/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        trace!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(method, request.url.as_str())
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();
        let body = read_body(response.text().await);

        Ok(TransportResponse { status, body })
    }
}

/// The status already decides the outcome; an unreadable body is left empty.
fn read_body(body: Result<String, reqwest::Error>) -> String {
    body.unwrap_or_else(|e| {
        debug!(error = %e, "Response body unreadable");
        String::new()
    })
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}
