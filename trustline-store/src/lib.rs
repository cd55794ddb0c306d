//! Trust line state store
//!
//! Keeps the current trust line of every (account, credit asset) pair,
//! derived from ledger entry deltas, in RocksDB.
//!
//! # Architecture
//!
//! - **Canonical keys**: every row is keyed by the base64 ledger key of its trust line
//! - **Single writer**: [`BatchReconciler`] applies one ledger close as one atomic write
//! - **Replace on conflict**: an upsert overwrites every column of an existing row
//! - **Explicit transactions**: readers pass a [`Tx`]; snapshot reads need repeatable read
//!
//! # Invariants
//!
//! - One row per ledger key, holding current state only
//! - `ledger_key` is a pure function of (account, asset)
//! - Native balances live on account rows, never on trust lines

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accounts;
pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod storage;
pub mod strkey;
pub mod trust_lines;
pub mod types;

// Re-exports
pub use accounts::{AccountLookup, AccountRecord, AccountStore};
pub use config::{Config, StaleEntryPolicy};
pub use error::{EncodingError, Error, Result, Step};
pub use key::{derive_key, LedgerKey};
pub use metrics::Metrics;
pub use query::QueryFacade;
pub use reconcile::BatchReconciler;
pub use record::{to_record, TrustLineRecord};
pub use storage::{IsolationLevel, Storage, Tx, TxOptions};
pub use trust_lines::TrustLines;
pub use types::{
    AccountEntry, AccountId, Asset, AssetType, LedgerEntry, LedgerEntryData, LedgerEntryType,
    LedgerKeyTrustLine, Liabilities, TrustLineEntry, TrustLineFlags,
};
