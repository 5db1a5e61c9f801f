use thiserror::Error;

/// Validation and parse failures for the terminal's identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid fingerprint ID: {value} (must be {min}-{max})")]
    InvalidFingerprintId { value: i64, min: u8, max: u8 },

    #[error("Invalid card UID: {0}")]
    InvalidCardFormat(String),

    /// Text that should have held an identifier could not be parsed.
    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
