//! Error taxonomy for stealth payment operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StealthError>;

#[derive(Error, Debug)]
pub enum StealthError {
    /// Malformed or off-curve public key. Never treated as "no match".
    #[error("Invalid key: {0}")]
    InvalidKey(&'static str),

    /// Authentication tag rejected. The expected outcome for payments
    /// addressed to someone else.
    #[error("Note decryption failed")]
    DecryptionFailed,

    #[error("Commitment mismatch - note does not open the published commitment")]
    CommitmentMismatch,

    #[error("Malformed payment metadata: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Ledger client error: {0}")]
    Ledger(String),

    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Payment {0} has already been spent")]
    AlreadySpent(String),

    #[error("Unknown payment: {0}")]
    UnknownPayment(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StealthError {
    /// Errors that only disqualify a single candidate during a scan
    pub fn is_candidate_level(&self) -> bool {
        matches!(
            self,
            StealthError::InvalidKey(_)
                | StealthError::DecryptionFailed
                | StealthError::CommitmentMismatch
                | StealthError::ParseError(_)
        )
    }
}

impl From<std::io::Error> for StealthError {
    fn from(err: std::io::Error) -> Self {
        StealthError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for StealthError {
    fn from(err: serde_json::Error) -> Self {
        StealthError::SerializationError(err.to_string())
    }
}
