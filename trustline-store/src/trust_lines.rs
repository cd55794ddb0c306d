//! Store orchestration layer
//!
//! Ties storage, metrics and configuration together and hands out the
//! writer, reader and account components.
//!
//! # Example
//!
//! ```no_run
//! use trustline_store::{Config, TrustLines, TxOptions};
//!
//! fn main() -> trustline_store::Result<()> {
//!     let store = TrustLines::open(Config::default())?;
//!
//!     // One ledger close
//!     // store.reconciler().upsert_batch(&entries)?;
//!
//!     let tx = store.begin(TxOptions::read_only_repeatable_read());
//!     let count = store.query().count(Some(&tx))?;
//!     println!("{} trust lines", count);
//!     Ok(())
//! }
//! ```

use crate::{
    accounts::AccountStore,
    query::QueryFacade,
    reconcile::BatchReconciler,
    storage::{Storage, StorageStats, Tx, TxOptions},
    types::AccountId,
    Asset, Config, Metrics, Result,
};

/// Main trust-line store interface
#[derive(Debug)]
pub struct TrustLines {
    storage: Storage,
    metrics: Metrics,
    config: Config,
}

impl TrustLines {
    /// Open store with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Storage::open(&config)?;
        let metrics = Metrics::new()
            .map_err(|e| crate::Error::Config(format!("Failed to register metrics: {}", e)))?;

        tracing::info!(
            stale_entries = ?config.reconcile.stale_entries,
            "Trust line store ready"
        );

        Ok(Self {
            storage,
            metrics,
            config,
        })
    }

    /// Writer for trust line rows
    pub fn reconciler(&self) -> BatchReconciler<'_> {
        BatchReconciler::new(
            &self.storage,
            &self.metrics,
            self.config.reconcile.stale_entries,
        )
    }

    /// Reader for trust line rows
    pub fn query(&self) -> QueryFacade<'_> {
        QueryFacade::new(&self.storage)
    }

    /// Account rows
    pub fn accounts(&self) -> AccountStore<'_> {
        AccountStore::new(&self.storage)
    }

    /// Start a caller-owned transaction
    pub fn begin(&self, options: TxOptions) -> Tx<'_> {
        self.storage.begin(options)
    }

    /// Assets and balances of an address, read through `tx`
    pub fn assets_for_address(
        &self,
        tx: Option<&Tx<'_>>,
        address: &AccountId,
    ) -> Result<(Vec<Asset>, Vec<i64>)> {
        let accounts = self.accounts();
        self.query()
            .assets_and_balances_for_address(tx, &accounts, address)
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Graceful shutdown
    pub fn shutdown(self) -> Result<()> {
        tracing::info!("Shutting down trust line store");
        self.storage.close()
    }
}
