use crate::{
    Result,
    constants::{MAX_CARD_UID_LENGTH, MAX_FINGERPRINT_ID, MIN_FINGERPRINT_ID},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use subtle::ConstantTimeEq;

/// Storage location of an enrolled fingerprint template (1-127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct FingerprintId(u8);

impl FingerprintId {
    /// Create a new fingerprint ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidFingerprintId` if the ID is outside the valid range (1-127).
    pub fn new(id: u8) -> Result<Self> {
        Self::try_from(i64::from(id))
    }

    /// Get the raw storage location.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Iterate over every addressable storage location in ascending order.
    pub fn all() -> impl Iterator<Item = FingerprintId> {
        (MIN_FINGERPRINT_ID..=MAX_FINGERPRINT_ID).map(FingerprintId)
    }
}

impl TryFrom<i64> for FingerprintId {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        if !(i64::from(MIN_FINGERPRINT_ID)..=i64::from(MAX_FINGERPRINT_ID)).contains(&value) {
            return Err(Error::InvalidFingerprintId {
                value,
                min: MIN_FINGERPRINT_ID,
                max: MAX_FINGERPRINT_ID,
            });
        }
        // Range check above guarantees the value fits.
        Ok(FingerprintId(value as u8))
    }
}

impl From<FingerprintId> for u8 {
    fn from(id: FingerprintId) -> Self {
        id.0
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FingerprintId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: i64 = s.trim().parse().map_err(|_| Error::InvalidMessageFormat {
            message: format!("Invalid fingerprint ID: {s}"),
        })?;
        FingerprintId::try_from(value)
    }
}

/// Raw UID of a proximity card (0-10 bytes).
///
/// Rendered everywhere as uppercase hexadecimal with two digits per byte.
///
/// # Security
/// Equality uses constant-time comparison so card lookups do not leak how
/// many leading bytes matched.
#[derive(Debug, Clone, Eq)]
pub struct CardId(Vec<u8>);

impl CardId {
    /// Create a card ID from raw UID bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardFormat` if the UID is longer than 10 bytes.
    pub fn new(uid: impl Into<Vec<u8>>) -> Result<Self> {
        let uid = uid.into();
        if uid.len() > MAX_CARD_UID_LENGTH {
            return Err(Error::InvalidCardFormat(format!(
                "UID must be at most {MAX_CARD_UID_LENGTH} bytes, got {}",
                uid.len()
            )));
        }
        Ok(CardId(uid))
    }

    /// Parse a card ID from its hexadecimal rendering (case-insensitive).
    ///
    /// # Errors
    /// Returns `Error::InvalidCardFormat` for odd-length or non-hex input, or
    /// when the decoded UID is too long.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 {
            return Err(Error::InvalidCardFormat(format!(
                "hex UID must have an even number of digits: {hex}"
            )));
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| Error::InvalidCardFormat(format!("invalid hex UID: {hex}")))
            })
            .collect::<Result<Vec<u8>>>()?;

        CardId::new(bytes)
    }

    /// Raw UID bytes as reported by the reader.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hexadecimal rendering, e.g. `04ABCDEF`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for CardId {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::hash::Hash for CardId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for CardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        CardId::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// How a scan session ended.
///
/// The serialized names match the status strings the dashboard and the
/// attendance backend already understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanOutcome {
    /// Card accepted, either confirmed by fingerprint or with fingerprint
    /// confirmation disabled.
    #[serde(rename = "success")]
    Matched,

    /// Confirmation was abandoned because the biometric device failed.
    #[serde(rename = "failed")]
    NoMatch,

    /// No matching fingerprint was presented within the confirmation window.
    #[serde(rename = "timeout")]
    TimedOut,
}

impl ScanOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScanOutcome::Matched => "success",
            ScanOutcome::NoMatch => "failed",
            ScanOutcome::TimedOut => "timeout",
        }
    }

    /// Returns `true` if the card holder was accepted.
    #[must_use]
    pub fn is_matched(self) -> bool {
        matches!(self, ScanOutcome::Matched)
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanOutcome::Matched => write!(f, "Matched"),
            ScanOutcome::NoMatch => write!(f, "NoMatch"),
            ScanOutcome::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// A resolved scan, as stored in the record history and sent upstream.
///
/// Immutable once created: fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationEvent {
    /// Milliseconds since the terminal started.
    #[serde(rename = "timestamp")]
    timestamp_ms: u64,

    #[serde(rename = "rfidTag")]
    card: CardId,

    #[serde(rename = "fingerprintID", skip_serializing_if = "Option::is_none", default)]
    fingerprint: Option<FingerprintId>,

    #[serde(rename = "status")]
    outcome: ScanOutcome,

    #[serde(rename = "recordedAt")]
    recorded_at: DateTime<Utc>,
}

impl IdentificationEvent {
    /// Create an event stamped with the current wall-clock time.
    #[must_use]
    pub fn new(
        timestamp_ms: u64,
        card: CardId,
        fingerprint: Option<FingerprintId>,
        outcome: ScanOutcome,
    ) -> Self {
        Self {
            timestamp_ms,
            card,
            fingerprint,
            outcome,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    #[must_use]
    pub fn card(&self) -> &CardId {
        &self.card
    }

    #[must_use]
    pub fn fingerprint(&self) -> Option<FingerprintId> {
        self.fingerprint
    }

    #[must_use]
    pub fn outcome(&self) -> ScanOutcome {
        self.outcome
    }

    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
