//! Core constants for the attendance terminal.
//!
//! This module centralizes the limits and timing values shared by the
//! hardware layer, the coordination engine and the control API. Library
//! configuration structs use these values for their `Default` impls, and the
//! binary exposes most of them as command line overrides.
//!
//! # Usage
//!
//! ```
//! use rollcall_core::constants::*;
//! use std::time::Duration;
//!
//! fn is_storable(id: u8) -> bool {
//!     (MIN_FINGERPRINT_ID..=MAX_FINGERPRINT_ID).contains(&id)
//! }
//!
//! assert!(is_storable(127));
//! assert!(!is_storable(0));
//!
//! let timeout = Duration::from_millis(DEFAULT_SCAN_TIMEOUT_MS);
//! assert_eq!(timeout.as_secs(), 10);
//! ```

// ============================================================================
// Fingerprint Storage
// ============================================================================

/// Lowest storage location accepted for an enrolled template.
///
/// # Value: 1
pub const MIN_FINGERPRINT_ID: u8 = 1;

/// Highest storage location accepted for an enrolled template.
///
/// The sensor library used by the terminal addresses 127 locations; sensors
/// with larger flash still only expose this range through the control API.
///
/// # Value: 127
pub const MAX_FINGERPRINT_ID: u8 = 127;

/// Storage locations probed per engine tick while listing the library.
///
/// A full listing spans several ticks so that a pending scan keeps its
/// timeout and other control requests are still serviced.
///
/// # Value: 8 locations
pub const DEFAULT_LIST_BATCH: usize = 8;

// ============================================================================
// Card Format Constraints
// ============================================================================

/// Maximum card UID length in bytes.
///
/// ISO 14443A UIDs are 4, 7 or 10 bytes long. The reader reports the raw UID
/// bytes and the terminal renders them as uppercase hexadecimal.
///
/// # Value: 10 bytes
pub const MAX_CARD_UID_LENGTH: usize = 10;

// ============================================================================
// Record History
// ============================================================================

/// Number of identification events kept in the in-memory history.
///
/// # Value: 10 records
pub const RECORD_CAPACITY: usize = 10;

// ============================================================================
// Timeout Configuration
// ============================================================================

/// How long a scan waits for fingerprint confirmation after a card is read
/// (milliseconds).
///
/// A scan that has not matched a fingerprint when this much time has elapsed
/// since card detection resolves as timed out.
///
/// # Value: 10000ms (10 seconds)
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 10_000;

/// Quiet period after a scan resolves before the reader is polled again
/// (milliseconds).
///
/// Keeps a card resting on the reader from producing back to back records.
///
/// # Value: 1000ms
pub const DEFAULT_SCAN_COOLDOWN_MS: u64 = 1_000;

/// Timeout applied to every outbound telemetry request (milliseconds).
///
/// # Value: 10000ms (10 seconds)
pub const DEFAULT_TELEMETRY_TIMEOUT_MS: u64 = 10_000;

/// Period of the coordination engine tick (milliseconds).
///
/// # Value: 50ms
///
/// # Examples
///
/// ```
/// use rollcall_core::constants::{DEFAULT_SCAN_TIMEOUT_MS, DEFAULT_TICK_INTERVAL_MS};
///
/// // A full confirmation window spans this many ticks.
/// assert_eq!(DEFAULT_SCAN_TIMEOUT_MS / DEFAULT_TICK_INTERVAL_MS, 200);
/// ```
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

// ============================================================================
// Startup Probe
// ============================================================================

/// Number of times the biometric sensor handshake is attempted at startup
/// before the terminal falls back to card-only operation.
///
/// # Value: 5 attempts
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 5;

/// Delay between startup handshake attempts (milliseconds).
///
/// # Value: 1000ms
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 1_000;

// ============================================================================
// Control Channel
// ============================================================================

/// Capacity of the queue between the control API and the engine.
///
/// Requests beyond this are rejected as busy instead of waiting.
///
/// # Value: 32 requests
pub const CONTROL_QUEUE_CAPACITY: usize = 32;
