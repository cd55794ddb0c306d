//! Flat trust line rows
//!
//! [`TrustLineRecord`] is the persisted column set of one trust line. Field
//! names are the logical column names and must not change.

use crate::error::{EncodingError, Error, Result, Step};
use crate::key::{self, LedgerKey};
use crate::types::{
    AccountId, Asset, AssetType, LedgerEntry, LedgerEntryData, Liabilities, TrustLineEntry,
    TrustLineFlags,
};
use serde::{Deserialize, Serialize};

/// One row of the trust line table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineRecord {
    /// Canonical key, unique per (account, asset)
    pub ledger_key: LedgerKey,
    /// Holding account
    pub account_id: AccountId,
    /// Asset type tag (never native)
    pub asset_type: AssetType,
    /// Asset issuer address
    pub asset_issuer: String,
    /// Asset code
    pub asset_code: String,
    /// Current balance
    pub balance: i64,
    /// Balance ceiling
    pub trust_line_limit: i64,
    /// Buying liabilities
    pub buying_liabilities: i64,
    /// Selling liabilities
    pub selling_liabilities: i64,
    /// Raw authorization flags
    pub flags: u32,
    /// Ledger sequence of this version
    pub last_modified_ledger: u32,
    /// Sponsoring account, `None` when unsponsored
    pub sponsor: Option<AccountId>,
}

/// Map a trust line ledger entry to its row
pub fn to_record(entry: &LedgerEntry) -> Result<TrustLineRecord> {
    let trust_line = entry
        .trust_line()
        .ok_or_else(|| Error::InvalidEntryType(entry.data.entry_type()))?;

    let (asset_type, asset_code, asset_issuer) = match &trust_line.asset {
        Asset::Native => {
            return Err(Error::encoding(
                Step::RecordMapping,
                EncodingError::new("trust line entry holds the native asset"),
            ))
        }
        asset => asset.extract(),
    };

    let ledger_key = key::derive_key(&trust_line.account_id, &trust_line.asset)?;
    let liabilities = trust_line.liabilities();

    Ok(TrustLineRecord {
        ledger_key,
        account_id: trust_line.account_id.clone(),
        asset_type,
        asset_issuer,
        asset_code,
        balance: trust_line.balance,
        trust_line_limit: trust_line.limit,
        buying_liabilities: liabilities.buying,
        selling_liabilities: liabilities.selling,
        flags: trust_line.flags.bits(),
        last_modified_ledger: entry.last_modified_ledger_seq,
        sponsor: entry.sponsor.clone(),
    })
}

impl TrustLineRecord {
    /// Rebuild the credit asset of this row
    pub fn asset(&self) -> Result<Asset> {
        Asset::from_parts(self.asset_type, &self.asset_code, &self.asset_issuer)
            .map_err(|e| Error::encoding(Step::RecordMapping, e))
    }

    /// Rebuild the ledger entry this row was mapped from.
    ///
    /// Zero liabilities come back as an absent liabilities extension.
    pub fn to_entry(&self) -> Result<LedgerEntry> {
        let liabilities = Liabilities {
            buying: self.buying_liabilities,
            selling: self.selling_liabilities,
        };

        Ok(LedgerEntry {
            last_modified_ledger_seq: self.last_modified_ledger,
            data: LedgerEntryData::TrustLine(TrustLineEntry {
                account_id: self.account_id.clone(),
                asset: self.asset()?,
                balance: self.balance,
                limit: self.trust_line_limit,
                flags: TrustLineFlags(self.flags),
                liabilities: (liabilities != Liabilities::default()).then_some(liabilities),
            }),
            sponsor: self.sponsor.clone(),
        })
    }

    /// Authorization flags
    pub fn trust_line_flags(&self) -> TrustLineFlags {
        TrustLineFlags(self.flags)
    }

    /// Issuer has authorized the account to transact with its credit
    pub fn is_authorized(&self) -> bool {
        self.trust_line_flags().is_authorized()
    }

    /// Issuer has authorized the account to maintain liabilities
    pub fn is_authorized_to_maintain_liabilities(&self) -> bool {
        self.trust_line_flags().is_authorized_to_maintain_liabilities()
    }

    /// Issuer may claw the asset back
    pub fn is_clawback_enabled(&self) -> bool {
        self.trust_line_flags().is_clawback_enabled()
    }

    /// True when a third party covers the reserve for this line
    pub fn is_sponsored(&self) -> bool {
        self.sponsor.is_some()
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountEntry, LedgerEntryType};

    fn account() -> AccountId {
        AccountId::from_public_key(&[1u8; 32])
    }

    fn issuer() -> AccountId {
        AccountId::from_public_key(&[2u8; 32])
    }

    fn trust_line_entry(asset: Asset, liabilities: Option<Liabilities>) -> LedgerEntry {
        LedgerEntry {
            last_modified_ledger_seq: 42,
            data: LedgerEntryData::TrustLine(TrustLineEntry {
                account_id: account(),
                asset,
                balance: 1_000,
                limit: 10_000,
                flags: TrustLineFlags(TrustLineFlags::AUTHORIZED),
                liabilities,
            }),
            sponsor: None,
        }
    }

    #[test]
    fn test_to_record_flattens_entry() {
        let asset = Asset::credit("USD", issuer()).unwrap();
        let entry = trust_line_entry(
            asset.clone(),
            Some(Liabilities {
                buying: 3,
                selling: 4,
            }),
        );

        let record = to_record(&entry).unwrap();
        assert_eq!(record.ledger_key, key::derive_key(&account(), &asset).unwrap());
        assert_eq!(record.account_id, account());
        assert_eq!(record.asset_type, AssetType::CreditAlphanum4);
        assert_eq!(record.asset_code, "USD");
        assert_eq!(record.asset_issuer, issuer().as_str());
        assert_eq!(record.balance, 1_000);
        assert_eq!(record.trust_line_limit, 10_000);
        assert_eq!(record.buying_liabilities, 3);
        assert_eq!(record.selling_liabilities, 4);
        assert_eq!(record.last_modified_ledger, 42);
        assert!(record.is_authorized());
        assert!(!record.is_clawback_enabled());
    }

    #[test]
    fn test_missing_liabilities_and_sponsor() {
        let entry = trust_line_entry(Asset::credit("USD", issuer()).unwrap(), None);
        let record = to_record(&entry).unwrap();

        assert_eq!(record.buying_liabilities, 0);
        assert_eq!(record.selling_liabilities, 0);
        assert_eq!(record.sponsor, None);
        assert!(!record.is_sponsored());
    }

    #[test]
    fn test_sponsor_is_carried() {
        let mut entry = trust_line_entry(Asset::credit("USD", issuer()).unwrap(), None);
        let sponsor = AccountId::from_public_key(&[9u8; 32]);
        entry.sponsor = Some(sponsor.clone());

        let record = to_record(&entry).unwrap();
        assert_eq!(record.sponsor, Some(sponsor));
        assert!(record.is_sponsored());
    }

    #[test]
    fn test_to_entry_round_trip() {
        for liabilities in [
            None,
            Some(Liabilities {
                buying: 7,
                selling: 0,
            }),
        ] {
            let entry = trust_line_entry(Asset::credit("EURO12", issuer()).unwrap(), liabilities);
            let record = to_record(&entry).unwrap();
            assert_eq!(record.to_entry().unwrap(), entry);
        }
    }

    #[test]
    fn test_to_record_rejects_native_and_other_types() {
        let native = trust_line_entry(Asset::Native, None);
        assert!(matches!(
            to_record(&native),
            Err(Error::Encoding {
                step: Step::RecordMapping,
                ..
            })
        ));

        let account_entry = LedgerEntry {
            last_modified_ledger_seq: 1,
            data: LedgerEntryData::Account(AccountEntry {
                account_id: account(),
                balance: 10,
                seq_num: 1,
                num_sub_entries: 0,
                flags: 0,
            }),
            sponsor: None,
        };
        assert!(matches!(
            to_record(&account_entry),
            Err(Error::InvalidEntryType(LedgerEntryType::Account))
        ));
    }

    #[test]
    fn test_column_names() {
        let record = to_record(&trust_line_entry(Asset::credit("USD", issuer()).unwrap(), None))
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let columns: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();

        for column in [
            "ledger_key",
            "account_id",
            "asset_type",
            "asset_issuer",
            "asset_code",
            "balance",
            "trust_line_limit",
            "buying_liabilities",
            "selling_liabilities",
            "flags",
            "last_modified_ledger",
            "sponsor",
        ] {
            assert!(columns.contains(&column), "missing column {}", column);
        }
        assert_eq!(columns.len(), 12);
        assert!(json["sponsor"].is_null());
    }

    #[test]
    fn test_row_codec() {
        let record = to_record(&trust_line_entry(Asset::credit("USD", issuer()).unwrap(), None))
            .unwrap();
        let bytes = record.encode().unwrap();
        assert_eq!(TrustLineRecord::decode(&bytes).unwrap(), record);
    }
}
