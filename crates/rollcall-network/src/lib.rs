//! Network side of the rollcall terminal.
//!
//! - [`api`]: the axum control API served to the local network
//! - [`transport`]: `reqwest`-backed delivery of telemetry to the backend
//! - [`link`]: uplink state consulted before every dispatch
//!
//! Everything here talks to the engine through its public seams only:
//! the API through a [`rollcall_engine::ControlHandle`], the telemetry
//! pieces by implementing [`rollcall_engine::Transport`] and
//! [`rollcall_engine::Connectivity`].

pub mod api;
pub mod error;
pub mod link;
pub mod transport;

pub use api::{ApiConfig, ApiState, router, serve};
pub use error::ApiError;
pub use link::LinkMonitor;
pub use transport::HttpTransport;
