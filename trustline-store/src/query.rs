//! Read paths over the trust line table
//!
//! Every query takes the caller's transaction explicitly. `None` reads the
//! latest committed state.

use crate::{
    accounts::AccountLookup,
    error::{Error, Result},
    key::{self, LedgerKey},
    record::TrustLineRecord,
    storage::{Storage, Tx},
    types::{AccountId, Asset, LedgerKeyTrustLine},
};
use std::collections::BTreeSet;

/// Read-only access to trust line rows
#[derive(Debug, Clone, Copy)]
pub struct QueryFacade<'a> {
    storage: &'a Storage,
}

impl<'a> QueryFacade<'a> {
    /// Create over an open storage
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Rows for the given keys; missing keys are skipped, order is unspecified
    pub fn get_by_keys(
        &self,
        tx: Option<&Tx<'_>>,
        keys: &[LedgerKeyTrustLine],
    ) -> Result<Vec<TrustLineRecord>> {
        let ledger_keys = keys.iter().map(key::key_for).collect::<Result<Vec<_>>>()?;
        self.get_by_ledger_keys(tx, &ledger_keys)
    }

    /// Rows for already encoded ledger keys
    pub fn get_by_ledger_keys(
        &self,
        tx: Option<&Tx<'_>>,
        keys: &[LedgerKey],
    ) -> Result<Vec<TrustLineRecord>> {
        self.storage.get_trust_lines(keys, tx)
    }

    /// Rows of one account, ordered by (asset_code, asset_issuer)
    pub fn get_sorted_by_account(
        &self,
        tx: Option<&Tx<'_>>,
        account_id: &AccountId,
    ) -> Result<Vec<TrustLineRecord>> {
        self.storage.scan_account_trust_lines(account_id, tx)
    }

    /// Rows of several accounts, ordered by (asset_code, asset_issuer) and
    /// then by account
    pub fn get_sorted_by_accounts(
        &self,
        tx: Option<&Tx<'_>>,
        account_ids: &[AccountId],
    ) -> Result<Vec<TrustLineRecord>> {
        let unique: BTreeSet<&AccountId> = account_ids.iter().collect();

        let mut records = Vec::new();
        for account_id in unique {
            records.extend(self.storage.scan_account_trust_lines(account_id, tx)?);
        }

        records.sort_by(|a, b| {
            (a.asset_code.as_bytes(), a.asset_issuer.as_bytes(), &a.account_id).cmp(&(
                b.asset_code.as_bytes(),
                b.asset_issuer.as_bytes(),
                &b.account_id,
            ))
        });

        Ok(records)
    }

    /// Total number of rows (advisory outside a snapshot transaction)
    pub fn count(&self, tx: Option<&Tx<'_>>) -> Result<u64> {
        self.storage.count_trust_lines(tx)
    }

    /// Every asset an address holds and the matching balances.
    ///
    /// Credit assets come in [`QueryFacade::get_sorted_by_account`] order and
    /// the native asset is always last. The account row and the trust lines
    /// are read through one snapshot, so `tx` must be a read-only
    /// transaction at repeatable read or stronger; otherwise this fails
    /// before reading anything. An unknown address yields two empty lists.
    pub fn assets_and_balances_for_address(
        &self,
        tx: Option<&Tx<'_>>,
        accounts: &dyn AccountLookup,
        address: &AccountId,
    ) -> Result<(Vec<Asset>, Vec<i64>)> {
        let tx = require_snapshot_read(tx)?;

        let account = match accounts.get_account_by_id(tx, address) {
            Ok(account) => account,
            Err(err) if err.is_not_found() => return Ok((Vec::new(), Vec::new())),
            Err(err) => return Err(err),
        };

        let trust_lines = self.storage.scan_account_trust_lines(address, Some(tx))?;

        let mut assets = Vec::with_capacity(trust_lines.len() + 1);
        let mut balances = Vec::with_capacity(trust_lines.len() + 1);
        for trust_line in &trust_lines {
            assets.push(trust_line.asset()?);
            balances.push(trust_line.balance);
        }

        assets.push(Asset::Native);
        balances.push(account.balance);

        Ok((assets, balances))
    }
}

fn require_snapshot_read<'t, 'a>(tx: Option<&'t Tx<'a>>) -> Result<&'t Tx<'a>> {
    let Some(tx) = tx else {
        tracing::warn!("Cross-entity read attempted outside a transaction");
        return Err(Error::Precondition(
            "cannot be called outside of a transaction".to_string(),
        ));
    };

    if !tx.is_read_only() || !tx.isolation().is_snapshot_consistent() {
        tracing::warn!(
            isolation = %tx.isolation(),
            read_only = tx.is_read_only(),
            "Cross-entity read attempted in an insufficiently isolated transaction"
        );
        return Err(Error::Precondition(
            "should only be called in a read-only repeatable read transaction".to_string(),
        ));
    }

    Ok(tx)
}
