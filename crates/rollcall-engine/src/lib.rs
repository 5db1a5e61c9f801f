//! Coordination engine for the rollcall attendance terminal.
//!
//! This crate holds the logic that sits between the devices and the outside
//! world:
//!
//! - [`ring`]: fixed-size history of recent identification events
//! - [`enrollment`]: the two-capture enrollment state machine
//! - [`scan`]: card detection with bounded fingerprint confirmation
//! - [`telemetry`]: delivery of events to the attendance backend
//! - [`control`]: requests from the API and console, and their replies
//! - [`engine`]: the tick-driven scheduler tying it all together
//!
//! The engine is cooperative. It never waits on a person: every state that
//! waits for a card or a finger is re-polled on the next tick, which keeps the
//! control API responsive while a scan is pending.

pub mod control;
pub mod engine;
pub mod enrollment;
pub mod ring;
pub mod scan;
pub mod telemetry;

pub use control::{ControlError, ControlHandle, ControlRequest, ControlResponse, ControlResult};
pub use engine::{Engine, EngineConfig, ModeFlags};
pub use enrollment::{EnrollmentFailure, EnrollmentPhase, EnrollmentReport};
pub use ring::RecordRing;
pub use scan::ScanPhase;
pub use telemetry::{
    Connectivity, DispatchOutcome, TelemetryConfig, TelemetryDispatcher, TelemetryStats,
    Transport, TransportError,
};
