//! Batch reconciliation of trust line entries
//!
//! The reconciler is the only writer of trust line rows. A batch from one
//! ledger close becomes one RocksDB write batch, so readers observe either
//! none or all of it. Conflicts replace the whole row; there is no
//! field-level merge.

use crate::{
    config::StaleEntryPolicy,
    error::{Error, Result},
    key::{self, LedgerKey},
    metrics::Metrics,
    record::{self, TrustLineRecord},
    storage::Storage,
    types::{LedgerEntry, LedgerKeyTrustLine},
};
use rocksdb::WriteBatch;
use std::collections::HashMap;
use std::time::Instant;

/// Writer for the trust line table
#[derive(Debug, Clone, Copy)]
pub struct BatchReconciler<'a> {
    storage: &'a Storage,
    metrics: &'a Metrics,
    stale_entries: StaleEntryPolicy,
}

impl<'a> BatchReconciler<'a> {
    /// Create over an open storage
    pub fn new(storage: &'a Storage, metrics: &'a Metrics, stale_entries: StaleEntryPolicy) -> Self {
        Self {
            storage,
            metrics,
            stale_entries,
        }
    }

    /// Upsert every trust line of one ledger close in a single atomic write.
    ///
    /// Fails without writing anything if any entry is not a trust line or
    /// cannot be encoded. When a key appears more than once, the last
    /// occurrence wins.
    pub fn upsert_batch(&self, entries: &[LedgerEntry]) -> Result<()> {
        let started = Instant::now();

        let records = match self.prepare(entries) {
            Ok(records) => records,
            Err(err) => {
                self.metrics.record_rejected_batch();
                tracing::warn!(error = %err, entries = entries.len(), "Trust line batch rejected");
                return Err(err);
            }
        };

        let mut batch = WriteBatch::default();
        for record in &records {
            self.storage.stage_put_trust_line(&mut batch, record)?;
        }
        self.storage.write(batch)?;

        self.metrics
            .record_upsert(records.len(), started.elapsed().as_secs_f64());
        tracing::debug!(
            entries = entries.len(),
            rows = records.len(),
            "Trust line batch upserted"
        );

        Ok(())
    }

    /// Map, de-duplicate and (optionally) staleness-check a batch
    fn prepare(&self, entries: &[LedgerEntry]) -> Result<Vec<TrustLineRecord>> {
        // Type check first, so a bad batch fails before any encoding work
        if let Some(bad) = entries.iter().find(|e| e.trust_line().is_none()) {
            return Err(Error::InvalidEntryType(bad.data.entry_type()));
        }

        let mut positions: HashMap<LedgerKey, usize> = HashMap::with_capacity(entries.len());
        let mut records: Vec<TrustLineRecord> = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = record::to_record(entry)?;
            match positions.get(&record.ledger_key) {
                Some(&i) => {
                    let earlier = &records[i];
                    if self.stale_entries == StaleEntryPolicy::Reject
                        && record.last_modified_ledger < earlier.last_modified_ledger
                    {
                        return Err(Error::StaleEntry {
                            key: record.ledger_key.to_string(),
                            incoming: record.last_modified_ledger,
                            stored: earlier.last_modified_ledger,
                        });
                    }
                    records[i] = record;
                }
                None => {
                    positions.insert(record.ledger_key.clone(), records.len());
                    records.push(record);
                }
            }
        }

        if self.stale_entries == StaleEntryPolicy::Reject {
            for record in &records {
                self.check_not_stale(record)?;
            }
        }

        Ok(records)
    }

    fn check_not_stale(&self, record: &TrustLineRecord) -> Result<()> {
        if let Some(stored) = self.storage.get_trust_line(&record.ledger_key, None)? {
            if record.last_modified_ledger < stored.last_modified_ledger {
                return Err(Error::StaleEntry {
                    key: record.ledger_key.to_string(),
                    incoming: record.last_modified_ledger,
                    stored: stored.last_modified_ledger,
                });
            }
        }
        Ok(())
    }

    /// Insert one trust line; returns rows affected.
    ///
    /// Re-inserting an identical row is a no-op returning 0. Inserting a
    /// different row under an existing key fails with `DuplicateKey`.
    pub fn insert(&self, entry: &LedgerEntry) -> Result<u64> {
        let record = record::to_record(entry)?;

        if let Some(existing) = self.storage.get_trust_line(&record.ledger_key, None)? {
            if existing == record {
                return Ok(0);
            }
            return Err(Error::DuplicateKey(record.ledger_key.to_string()));
        }

        self.put(&record)?;
        Ok(1)
    }

    /// Replace the row stored under the entry's key; returns rows affected
    pub fn update(&self, entry: &LedgerEntry) -> Result<u64> {
        let record = record::to_record(entry)?;

        if self.storage.get_trust_line(&record.ledger_key, None)?.is_none() {
            return Ok(0);
        }
        if self.stale_entries == StaleEntryPolicy::Reject {
            self.check_not_stale(&record)?;
        }

        self.put(&record)?;
        Ok(1)
    }

    fn put(&self, record: &TrustLineRecord) -> Result<()> {
        let started = Instant::now();
        let mut batch = WriteBatch::default();
        self.storage.stage_put_trust_line(&mut batch, record)?;
        self.storage.write(batch)?;
        self.metrics.record_upsert(1, started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Delete one trust line; returns rows affected (0 if absent)
    pub fn remove(&self, key: &LedgerKeyTrustLine) -> Result<u64> {
        let ledger_key = key::key_for(key)?;

        let Some(existing) = self.storage.get_trust_line(&ledger_key, None)? else {
            return Ok(0);
        };

        let mut batch = WriteBatch::default();
        self.storage.stage_delete_trust_line(&mut batch, &existing)?;
        self.storage.write(batch)?;

        self.metrics.record_removed(1);
        tracing::debug!(ledger_key = %ledger_key, "Trust line removed");
        Ok(1)
    }

    /// Delete several trust lines, one at a time; returns rows affected
    pub fn remove_batch(&self, keys: &[LedgerKeyTrustLine]) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            removed += self.remove(key)?;
        }
        Ok(removed)
    }
}
