//! Error types for the trust-line store

use crate::types::LedgerEntryType;
use std::fmt;
use thiserror::Error;

/// Result type for trust-line store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which derivation step produced an encoding failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Canonical ledger key serialization
    KeyDerivation,
    /// Ledger entry to row conversion (and back)
    RecordMapping,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::KeyDerivation => write!(f, "key derivation"),
            Step::RecordMapping => write!(f, "record mapping"),
        }
    }
}

/// Low-level codec failure (strkey, asset code, key bytes)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EncodingError(pub String);

impl EncodingError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Trust-line store errors
#[derive(Error, Debug)]
pub enum Error {
    /// Key or asset serialization failed; the upstream data is malformed
    #[error("Encoding error during {step}: {source}")]
    Encoding {
        /// Step that failed
        step: Step,
        /// Underlying codec error
        source: EncodingError,
    },

    /// Batch contained an entry of the wrong ledger entry type
    #[error("Invalid entry type: {0}")]
    InvalidEntryType(LedgerEntryType),

    /// Operation requires a transaction the caller did not provide
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Insert collided with a different row under the same key
    #[error("Duplicate ledger key: {0}")]
    DuplicateKey(String),

    /// Incoming entry is older than the stored row
    #[error(
        "Stale entry for ledger key {key}: incoming ledger {incoming} is older than stored ledger {stored}"
    )]
    StaleEntry {
        /// Ledger key of the row
        key: String,
        /// `last_modified_ledger` of the incoming entry
        incoming: u32,
        /// `last_modified_ledger` currently stored
        stored: u32,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Row (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a codec error with the step it failed in
    pub fn encoding(step: Step, source: EncodingError) -> Self {
        Error::Encoding { step, source }
    }

    /// True for the "row does not exist" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
