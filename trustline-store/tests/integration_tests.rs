//! Integration tests for the trust line store
//!
//! Exercises the store end to end through [`TrustLines`]:
//! - Ledger close → batch upsert → sorted reads
//! - Cross-entity asset/balance lookup under a snapshot transaction
//! - Atomic rejection of malformed and stale batches
//! - Removal and configuration-driven policies

use std::sync::Once;
use tempfile::TempDir;
use trustline_store::{
    AccountEntry, AccountId, Asset, Config, Error, IsolationLevel, LedgerEntry, LedgerEntryData,
    LedgerEntryType, LedgerKeyTrustLine, Liabilities, StaleEntryPolicy, TrustLineEntry,
    TrustLineFlags, TrustLines, TxOptions,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

struct TestEnvironment {
    store: TrustLines,
    _temp: TempDir,
}

impl TestEnvironment {
    fn new() -> Self {
        Self::with_policy(StaleEntryPolicy::Overwrite)
    }

    fn with_policy(policy: StaleEntryPolicy) -> Self {
        init_tracing();

        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        config.reconcile.stale_entries = policy;

        Self {
            store: TrustLines::open(config).unwrap(),
            _temp: temp,
        }
    }
}

fn holder() -> AccountId {
    AccountId::from_public_key(&[1; 32])
}

fn issuer1() -> AccountId {
    AccountId::from_public_key(&[2; 32])
}

fn issuer2() -> AccountId {
    AccountId::from_public_key(&[3; 32])
}

fn usd() -> Asset {
    Asset::credit("USD", issuer1()).unwrap()
}

fn eur() -> Asset {
    Asset::credit("EUR", issuer2()).unwrap()
}

fn trust_line(account: AccountId, asset: Asset, balance: i64, ledger: u32) -> LedgerEntry {
    LedgerEntry {
        last_modified_ledger_seq: ledger,
        data: LedgerEntryData::TrustLine(TrustLineEntry {
            account_id: account,
            asset,
            balance,
            limit: 1_000_000,
            flags: TrustLineFlags(TrustLineFlags::AUTHORIZED),
            liabilities: None,
        }),
        sponsor: None,
    }
}

fn account(account_id: AccountId, balance: i64, ledger: u32) -> LedgerEntry {
    LedgerEntry {
        last_modified_ledger_seq: ledger,
        data: LedgerEntryData::Account(AccountEntry {
            account_id,
            balance,
            seq_num: 1,
            num_sub_entries: 2,
            flags: 0,
        }),
        sponsor: None,
    }
}

#[test]
fn test_ledger_close_then_sorted_read() {
    let env = TestEnvironment::new();

    env.store
        .reconciler()
        .upsert_batch(&[
            trust_line(holder(), usd(), 100, 10),
            trust_line(holder(), eur(), 200, 10),
        ])
        .unwrap();

    let rows = env.store.query().get_sorted_by_account(None, &holder()).unwrap();
    let codes: Vec<&str> = rows.iter().map(|r| r.asset_code.as_str()).collect();
    assert_eq!(codes, vec!["EUR", "USD"]);
    assert!(rows.iter().all(|r| r.is_authorized()));
    assert_eq!(env.store.query().count(None).unwrap(), 2);
}

#[test]
fn test_assets_and_balances_for_address() {
    let env = TestEnvironment::new();

    env.store
        .accounts()
        .upsert_accounts(&[account(holder(), 500, 10)])
        .unwrap();
    env.store
        .reconciler()
        .upsert_batch(&[
            trust_line(holder(), usd(), 100, 10),
            trust_line(holder(), eur(), 200, 10),
        ])
        .unwrap();

    let tx = env.store.begin(TxOptions::read_only_repeatable_read());
    let (assets, balances) = env.store.assets_for_address(Some(&tx), &holder()).unwrap();

    assert_eq!(assets, vec![eur(), usd(), Asset::Native]);
    assert_eq!(balances, vec![200, 100, 500]);
}

#[test]
fn test_assets_for_unknown_address_are_empty() {
    let env = TestEnvironment::new();

    let tx = env.store.begin(TxOptions::read_only_repeatable_read());
    let (assets, balances) = env.store.assets_for_address(Some(&tx), &holder()).unwrap();

    assert!(assets.is_empty());
    assert!(balances.is_empty());
}

#[test]
fn test_assets_for_address_requires_snapshot_transaction() {
    let env = TestEnvironment::new();
    env.store
        .accounts()
        .upsert_accounts(&[account(holder(), 500, 10)])
        .unwrap();

    let err = env.store.assets_for_address(None, &holder()).unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));

    let read_committed = env.store.begin(TxOptions {
        isolation: IsolationLevel::ReadCommitted,
        read_only: true,
    });
    let err = env
        .store
        .assets_for_address(Some(&read_committed), &holder())
        .unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));

    let writable = env.store.begin(TxOptions {
        isolation: IsolationLevel::Serializable,
        read_only: false,
    });
    let err = env
        .store
        .assets_for_address(Some(&writable), &holder())
        .unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));

    let serializable = env.store.begin(TxOptions {
        isolation: IsolationLevel::Serializable,
        read_only: true,
    });
    assert!(env
        .store
        .assets_for_address(Some(&serializable), &holder())
        .is_ok());
}

#[test]
fn test_snapshot_hides_later_ledger_close() {
    let env = TestEnvironment::new();
    env.store
        .accounts()
        .upsert_accounts(&[account(holder(), 500, 10)])
        .unwrap();
    env.store
        .reconciler()
        .upsert_batch(&[trust_line(holder(), usd(), 100, 10)])
        .unwrap();

    let tx = env.store.begin(TxOptions::read_only_repeatable_read());

    env.store
        .reconciler()
        .upsert_batch(&[
            trust_line(holder(), usd(), 150, 11),
            trust_line(holder(), eur(), 200, 11),
        ])
        .unwrap();

    let (assets, balances) = env.store.assets_for_address(Some(&tx), &holder()).unwrap();
    assert_eq!(assets, vec![usd(), Asset::Native]);
    assert_eq!(balances, vec![100, 500]);
}

#[test]
fn test_non_trust_line_entry_rejects_whole_batch() {
    let env = TestEnvironment::new();

    let err = env
        .store
        .reconciler()
        .upsert_batch(&[
            trust_line(holder(), usd(), 100, 10),
            account(holder(), 500, 10),
        ])
        .unwrap_err();

    assert!(matches!(err, Error::InvalidEntryType(LedgerEntryType::Account)));
    assert_eq!(env.store.query().count(None).unwrap(), 0);
    assert_eq!(env.store.metrics().rejected_batches_total.get(), 1);
}

#[test]
fn test_replace_overwrites_every_column() {
    let env = TestEnvironment::new();

    let mut first = trust_line(holder(), usd(), 100, 10);
    first.sponsor = Some(issuer2());
    if let LedgerEntryData::TrustLine(tl) = &mut first.data {
        tl.liabilities = Some(Liabilities {
            buying: 7,
            selling: 9,
        });
    }
    env.store.reconciler().upsert_batch(&[first]).unwrap();
    env.store
        .reconciler()
        .upsert_batch(&[trust_line(holder(), usd(), 300, 12)])
        .unwrap();

    let key = LedgerKeyTrustLine {
        account_id: holder(),
        asset: usd(),
    };
    let rows = env.store.query().get_by_keys(None, &[key]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].balance, 300);
    assert_eq!(rows[0].buying_liabilities, 0);
    assert_eq!(rows[0].selling_liabilities, 0);
    assert_eq!(rows[0].sponsor, None);
    assert_eq!(rows[0].last_modified_ledger, 12);
}

#[test]
fn test_reject_policy_from_config() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::from_toml(&format!(
        "data_dir = {:?}\nservice_name = \"trust-lines\"\n\n[reconcile]\nstale_entries = \"reject\"\n",
        temp.path().display().to_string()
    ))
    .unwrap();
    let store = TrustLines::open(config).unwrap();

    store
        .reconciler()
        .upsert_batch(&[trust_line(holder(), usd(), 100, 20)])
        .unwrap();

    let err = store
        .reconciler()
        .upsert_batch(&[
            trust_line(holder(), eur(), 200, 21),
            trust_line(holder(), usd(), 50, 19),
        ])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::StaleEntry {
            incoming: 19,
            stored: 20,
            ..
        }
    ));

    // Nothing from the rejected batch landed
    let rows = store.query().get_sorted_by_account(None, &holder()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].balance, 100);

    // Same ledger is not stale
    store
        .reconciler()
        .upsert_batch(&[trust_line(holder(), usd(), 60, 20)])
        .unwrap();

    store.shutdown().unwrap();
}

#[test]
fn test_remove() {
    let env = TestEnvironment::new();
    env.store
        .reconciler()
        .upsert_batch(&[
            trust_line(holder(), usd(), 100, 10),
            trust_line(holder(), eur(), 200, 10),
        ])
        .unwrap();

    let usd_key = LedgerKeyTrustLine {
        account_id: holder(),
        asset: usd(),
    };
    assert_eq!(env.store.reconciler().remove(&usd_key).unwrap(), 1);
    assert_eq!(env.store.reconciler().remove(&usd_key).unwrap(), 0);

    let eur_key = LedgerKeyTrustLine {
        account_id: holder(),
        asset: eur(),
    };
    let removed = env
        .store
        .reconciler()
        .remove_batch(&[usd_key, eur_key])
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(env.store.query().count(None).unwrap(), 0);
    assert!(env
        .store
        .query()
        .get_sorted_by_account(None, &holder())
        .unwrap()
        .is_empty());
}

#[test]
fn test_reopen_keeps_rows() {
    init_tracing();
    let temp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp.path().to_path_buf();

    let store = TrustLines::open(config.clone()).unwrap();
    store
        .reconciler()
        .upsert_batch(&[trust_line(holder(), usd(), 100, 10)])
        .unwrap();
    store.shutdown().unwrap();

    let store = TrustLines::open(config).unwrap();
    let rows = store.query().get_sorted_by_account(None, &holder()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].asset().unwrap(), usd());
}
