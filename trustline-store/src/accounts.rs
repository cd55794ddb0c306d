//! Account rows
//!
//! The native balance of an address lives on its account row, not on a
//! trust line. Rows are kept in the same RocksDB instance as trust lines so
//! one snapshot covers both.

use crate::{
    error::{Error, Result},
    storage::{Storage, Tx},
    types::{AccountEntry, AccountId, LedgerEntry},
};
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};

/// One row of the accounts table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Account address
    pub account_id: AccountId,
    /// Native asset balance
    pub balance: i64,
    /// Sequence number
    pub sequence: i64,
    /// Number of sub-entries owned
    pub num_sub_entries: u32,
    /// Account flags
    pub flags: u32,
    /// Ledger sequence of this version
    pub last_modified_ledger: u32,
}

impl AccountRecord {
    fn from_entry(entry: &LedgerEntry, account: &AccountEntry) -> Self {
        Self {
            account_id: account.account_id.clone(),
            balance: account.balance,
            sequence: account.seq_num,
            num_sub_entries: account.num_sub_entries,
            flags: account.flags,
            last_modified_ledger: entry.last_modified_ledger_seq,
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Account lookup used by cross-entity queries.
///
/// Implementations must return [`Error::NotFound`] for unknown addresses so
/// callers can tell "no such account" from a failed read.
pub trait AccountLookup {
    /// Load an account row through the caller's transaction
    fn get_account_by_id(&self, tx: &Tx<'_>, address: &AccountId) -> Result<AccountRecord>;
}

/// RocksDB-backed account rows
#[derive(Debug, Clone, Copy)]
pub struct AccountStore<'a> {
    storage: &'a Storage,
}

impl<'a> AccountStore<'a> {
    /// Create over an open storage
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Write account entries in one atomic batch, replacing existing rows
    pub fn upsert_accounts(&self, entries: &[LedgerEntry]) -> Result<()> {
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let account = entry
                .account()
                .ok_or_else(|| Error::InvalidEntryType(entry.data.entry_type()))?;
            records.push(AccountRecord::from_entry(entry, account));
        }

        let mut batch = WriteBatch::default();
        for record in &records {
            self.storage.stage_put_account(&mut batch, record)?;
        }
        self.storage.write(batch)?;

        tracing::debug!(rows = records.len(), "Accounts upserted");
        Ok(())
    }

    /// Delete an account row; returns rows affected
    pub fn remove_account(&self, address: &AccountId) -> Result<u64> {
        if self.storage.get_account(address, None)?.is_none() {
            return Ok(0);
        }

        let mut batch = WriteBatch::default();
        self.storage.stage_delete_account(&mut batch, address)?;
        self.storage.write(batch)?;

        tracing::debug!(account_id = %address, "Account removed");
        Ok(1)
    }

    /// Load an account row outside any transaction
    pub fn get_account(&self, address: &AccountId) -> Result<Option<AccountRecord>> {
        self.storage.get_account(address, None)
    }
}

impl AccountLookup for AccountStore<'_> {
    fn get_account_by_id(&self, tx: &Tx<'_>, address: &AccountId) -> Result<AccountRecord> {
        self.storage
            .get_account(address, Some(tx))?
            .ok_or_else(|| Error::NotFound(format!("account {}", address)))
    }
}
