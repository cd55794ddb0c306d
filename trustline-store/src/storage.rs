//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `trust_lines` - Current trust line rows (key: ledger_key)
//! - `trust_lines_by_account` - Sorted index (key: account_id || 0 || asset_code || 0 || asset_issuer)
//! - `accounts` - Account rows holding native balances (key: account_id)
//!
//! # Transactions
//!
//! A [`Tx`] carries the isolation level and read-only flag the caller asked
//! for. At repeatable read and above it pins a RocksDB snapshot, so every read
//! made through it observes the same point in time. Weaker levels read the
//! latest committed state on each call.

use crate::{
    accounts::AccountRecord,
    error::{Error, Result},
    key::LedgerKey,
    record::TrustLineRecord,
    types::AccountId,
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode,
    Options, ReadOptions, Snapshot, WriteBatch, DB,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Column family names
const CF_TRUST_LINES: &str = "trust_lines";
const CF_TRUST_LINES_BY_ACCOUNT: &str = "trust_lines_by_account";
const CF_ACCOUNTS: &str = "accounts";

const INDEX_SEPARATOR: u8 = 0;

/// Transaction isolation level, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Read uncommitted
    ReadUncommitted,
    /// Read committed
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Snapshot isolation
    Snapshot,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    /// True when every read in the transaction sees one snapshot
    pub fn is_snapshot_consistent(&self) -> bool {
        *self >= IsolationLevel::RepeatableRead
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::ReadUncommitted => "read uncommitted",
            IsolationLevel::ReadCommitted => "read committed",
            IsolationLevel::RepeatableRead => "repeatable read",
            IsolationLevel::Snapshot => "snapshot",
            IsolationLevel::Serializable => "serializable",
        };
        write!(f, "{}", name)
    }
}

/// Options a transaction was started with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    /// Isolation level
    pub isolation: IsolationLevel,
    /// Caller declared the transaction read-only
    pub read_only: bool,
}

impl TxOptions {
    /// Read-only repeatable read, the level consistent multi-table reads need
    pub fn read_only_repeatable_read() -> Self {
        Self {
            isolation: IsolationLevel::RepeatableRead,
            read_only: true,
        }
    }
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::ReadCommitted,
            read_only: false,
        }
    }
}

/// Caller-owned transaction context
pub struct Tx<'a> {
    snapshot: Option<Snapshot<'a>>,
    options: TxOptions,
}

impl<'a> Tx<'a> {
    /// Options this transaction was started with
    pub fn options(&self) -> TxOptions {
        self.options
    }

    /// Isolation level
    pub fn isolation(&self) -> IsolationLevel {
        self.options.isolation
    }

    /// Read-only flag
    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    fn read_options(&self) -> ReadOptions {
        let mut opts = ReadOptions::default();
        if let Some(snapshot) = &self.snapshot {
            opts.set_snapshot(snapshot);
        }
        opts
    }
}

impl fmt::Debug for Tx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("options", &self.options)
            .field("pinned_snapshot", &self.snapshot.is_some())
            .finish()
    }
}

fn read_options(tx: Option<&Tx<'_>>) -> ReadOptions {
    match tx {
        Some(tx) => tx.read_options(),
        None => ReadOptions::default(),
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").field("path", &self.db.path()).finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Rows are rewritten in place on every ledger close
        db_opts.set_compaction_style(DBCompactionStyle::Level);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRUST_LINES, Self::cf_options_rows()),
            ColumnFamilyDescriptor::new(CF_TRUST_LINES_BY_ACCOUNT, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_rows()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            service = %config.service_name,
            "Opened trust line store"
        );

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_rows() -> Options {
        let mut opts = Options::default();
        // Point lookups dominate, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_index() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Start a transaction; pins a snapshot at repeatable read and above
    pub fn begin(&self, options: TxOptions) -> Tx<'_> {
        let snapshot = options
            .isolation
            .is_snapshot_consistent()
            .then(|| self.db.snapshot());

        tracing::debug!(
            isolation = %options.isolation,
            read_only = options.read_only,
            "Transaction started"
        );

        Tx { snapshot, options }
    }

    /// Commit a staged write batch atomically
    pub(crate) fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch)?;
        Ok(())
    }

    // Trust line operations

    /// Get one trust line row
    pub(crate) fn get_trust_line(
        &self,
        key: &LedgerKey,
        tx: Option<&Tx<'_>>,
    ) -> Result<Option<TrustLineRecord>> {
        let cf = self.cf_handle(CF_TRUST_LINES)?;
        let opts = read_options(tx);

        self.db
            .get_cf_opt(&cf, key.as_bytes(), &opts)?
            .map(|value| TrustLineRecord::decode(&value))
            .transpose()
    }

    /// Get the rows that exist for the given keys, in key order.
    ///
    /// Each existing row is returned once, however often its key is listed.
    pub(crate) fn get_trust_lines(
        &self,
        keys: &[LedgerKey],
        tx: Option<&Tx<'_>>,
    ) -> Result<Vec<TrustLineRecord>> {
        let cf = self.cf_handle(CF_TRUST_LINES)?;
        let opts = read_options(tx);

        let mut seen = HashSet::with_capacity(keys.len());
        let mut records = Vec::with_capacity(keys.len());
        for key in keys.iter().filter(|key| seen.insert(*key)) {
            if let Some(value) = self.db.get_cf_opt(&cf, key.as_bytes(), &opts)? {
                records.push(TrustLineRecord::decode(&value)?);
            }
        }

        Ok(records)
    }

    /// Rows of one account, ordered by (asset_code, asset_issuer)
    pub(crate) fn scan_account_trust_lines(
        &self,
        account_id: &AccountId,
        tx: Option<&Tx<'_>>,
    ) -> Result<Vec<TrustLineRecord>> {
        let cf_index = self.cf_handle(CF_TRUST_LINES_BY_ACCOUNT)?;

        let prefix = Self::index_prefix_account(account_id);
        let iter = self.db.iterator_cf_opt(
            &cf_index,
            read_options(tx),
            IteratorMode::From(prefix.as_slice(), Direction::Forward),
        );

        let mut keys = Vec::new();
        for item in iter {
            let (index_key, ledger_key) = item?;
            if !index_key.starts_with(&prefix) {
                break;
            }
            let ledger_key = String::from_utf8(ledger_key.into_vec())
                .map_err(|e| Error::Storage(format!("Corrupt trust line index entry: {}", e)))?;
            keys.push(LedgerKey::from_encoded(ledger_key));
        }

        self.get_trust_lines(&keys, tx)
    }

    /// Exact number of trust line rows
    pub(crate) fn count_trust_lines(&self, tx: Option<&Tx<'_>>) -> Result<u64> {
        let cf = self.cf_handle(CF_TRUST_LINES)?;

        let mut count = 0u64;
        for item in self.db.iterator_cf_opt(&cf, read_options(tx), IteratorMode::Start) {
            item?;
            count += 1;
        }

        Ok(count)
    }

    /// Stage a row and its account index entry
    pub(crate) fn stage_put_trust_line(
        &self,
        batch: &mut WriteBatch,
        record: &TrustLineRecord,
    ) -> Result<()> {
        let cf_rows = self.cf_handle(CF_TRUST_LINES)?;
        let cf_index = self.cf_handle(CF_TRUST_LINES_BY_ACCOUNT)?;

        batch.put_cf(&cf_rows, record.ledger_key.as_bytes(), record.encode()?);
        batch.put_cf(
            &cf_index,
            Self::index_key_account_asset(record),
            record.ledger_key.as_bytes(),
        );

        Ok(())
    }

    /// Stage the deletion of a row and its account index entry
    pub(crate) fn stage_delete_trust_line(
        &self,
        batch: &mut WriteBatch,
        record: &TrustLineRecord,
    ) -> Result<()> {
        let cf_rows = self.cf_handle(CF_TRUST_LINES)?;
        let cf_index = self.cf_handle(CF_TRUST_LINES_BY_ACCOUNT)?;

        batch.delete_cf(&cf_rows, record.ledger_key.as_bytes());
        batch.delete_cf(&cf_index, Self::index_key_account_asset(record));

        Ok(())
    }

    // Account operations

    /// Get one account row
    pub(crate) fn get_account(
        &self,
        account_id: &AccountId,
        tx: Option<&Tx<'_>>,
    ) -> Result<Option<AccountRecord>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let opts = read_options(tx);

        self.db
            .get_cf_opt(&cf, account_id.as_str().as_bytes(), &opts)?
            .map(|value| AccountRecord::decode(&value))
            .transpose()
    }

    /// Stage an account row
    pub(crate) fn stage_put_account(
        &self,
        batch: &mut WriteBatch,
        record: &AccountRecord,
    ) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(&cf, record.account_id.as_str().as_bytes(), record.encode()?);
        Ok(())
    }

    /// Stage the deletion of an account row
    pub(crate) fn stage_delete_account(
        &self,
        batch: &mut WriteBatch,
        account_id: &AccountId,
    ) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        batch.delete_cf(&cf, account_id.as_str().as_bytes());
        Ok(())
    }

    // Index key helpers

    fn index_prefix_account(account_id: &AccountId) -> Vec<u8> {
        let mut key = account_id.as_str().as_bytes().to_vec();
        key.push(INDEX_SEPARATOR);
        key
    }

    fn index_key_account_asset(record: &TrustLineRecord) -> Vec<u8> {
        let mut key = Self::index_prefix_account(&record.account_id);
        key.extend_from_slice(record.asset_code.as_bytes());
        key.push(INDEX_SEPARATOR);
        key.extend_from_slice(record.asset_issuer.as_bytes());
        key
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_trust_lines = self.cf_handle(CF_TRUST_LINES)?;
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;

        Ok(StorageStats {
            approximate_trust_lines: self.approximate_count(&cf_trust_lines)?,
            approximate_accounts: self.approximate_count(&cf_accounts)?,
        })
    }

    fn approximate_count(&self, cf: &Arc<BoundColumnFamily<'_>>) -> Result<u64> {
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("Trust line store closed");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Estimated trust line rows
    pub approximate_trust_lines: u64,
    /// Estimated account rows
    pub approximate_accounts: u64,
}
