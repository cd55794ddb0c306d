//! Core ledger types
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Lossless round trips between ledger entries and stored rows
//! - Validation at the codec boundary, not at construction

use crate::error::EncodingError;
use crate::strkey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier (ed25519 strkey address, `G...`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID (unchecked)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse and validate an address
    pub fn parse(id: impl Into<String>) -> Result<Self, EncodingError> {
        let id = Self(id.into());
        id.public_key()?;
        Ok(id)
    }

    /// Build the address for a raw ed25519 public key
    pub fn from_public_key(key: &[u8; 32]) -> Self {
        Self(strkey::encode_account_id(key))
    }

    /// Decode the raw ed25519 public key
    pub fn public_key(&self) -> Result<[u8; 32], EncodingError> {
        strkey::decode_account_id(&self.0)
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum AssetType {
    /// The network's native asset
    Native = 0,
    /// Credit asset with a 1-4 character code
    CreditAlphanum4 = 1,
    /// Credit asset with a 5-12 character code
    CreditAlphanum12 = 2,
}

impl AssetType {
    /// Wire discriminant
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Parse from wire discriminant
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(AssetType::Native),
            1 => Some(AssetType::CreditAlphanum4),
            2 => Some(AssetType::CreditAlphanum12),
            _ => None,
        }
    }

    /// Padded width of the asset code on the wire
    pub(crate) fn code_width(&self) -> usize {
        match self {
            AssetType::Native => 0,
            AssetType::CreditAlphanum4 => 4,
            AssetType::CreditAlphanum12 => 12,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Native => write!(f, "native"),
            AssetType::CreditAlphanum4 => write!(f, "credit_alphanum4"),
            AssetType::CreditAlphanum12 => write!(f, "credit_alphanum12"),
        }
    }
}

/// Asset identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// Native asset (balances live on the account, not on trust lines)
    Native,
    /// 1-4 character credit asset
    CreditAlphanum4 {
        /// Asset code
        code: String,
        /// Issuing account
        issuer: AccountId,
    },
    /// 5-12 character credit asset
    CreditAlphanum12 {
        /// Asset code
        code: String,
        /// Issuing account
        issuer: AccountId,
    },
}

impl Asset {
    /// Build a credit asset, picking the variant from the code length
    pub fn credit(code: impl Into<String>, issuer: AccountId) -> Result<Self, EncodingError> {
        let code = code.into();
        let asset = if code.len() <= 4 {
            Asset::CreditAlphanum4 { code, issuer }
        } else {
            Asset::CreditAlphanum12 { code, issuer }
        };
        asset.validate()?;
        Ok(asset)
    }

    /// Asset type tag
    pub fn asset_type(&self) -> AssetType {
        match self {
            Asset::Native => AssetType::Native,
            Asset::CreditAlphanum4 { .. } => AssetType::CreditAlphanum4,
            Asset::CreditAlphanum12 { .. } => AssetType::CreditAlphanum12,
        }
    }

    /// Split into `(type, code, issuer)`; code and issuer are empty for native
    pub fn extract(&self) -> (AssetType, String, String) {
        match self {
            Asset::Native => (AssetType::Native, String::new(), String::new()),
            Asset::CreditAlphanum4 { code, issuer } | Asset::CreditAlphanum12 { code, issuer } => {
                (self.asset_type(), code.clone(), issuer.as_str().to_string())
            }
        }
    }

    /// Inverse of [`Asset::extract`]
    pub fn from_parts(
        asset_type: AssetType,
        code: &str,
        issuer: &str,
    ) -> Result<Self, EncodingError> {
        let asset = match asset_type {
            AssetType::Native => {
                if !code.is_empty() || !issuer.is_empty() {
                    return Err(EncodingError::new("native asset cannot carry a code or issuer"));
                }
                Asset::Native
            }
            AssetType::CreditAlphanum4 => Asset::CreditAlphanum4 {
                code: code.to_string(),
                issuer: AccountId::new(issuer),
            },
            AssetType::CreditAlphanum12 => Asset::CreditAlphanum12 {
                code: code.to_string(),
                issuer: AccountId::new(issuer),
            },
        };
        asset.validate()?;
        Ok(asset)
    }

    /// Check the code length/alphabet for the variant and the issuer address
    pub fn validate(&self) -> Result<(), EncodingError> {
        let (code, issuer, range) = match self {
            Asset::Native => return Ok(()),
            Asset::CreditAlphanum4 { code, issuer } => (code, issuer, 1..=4),
            Asset::CreditAlphanum12 { code, issuer } => (code, issuer, 5..=12),
        };

        if !range.contains(&code.len()) {
            return Err(EncodingError::new(format!(
                "asset code {:?} has invalid length {} for {}",
                code,
                code.len(),
                self.asset_type()
            )));
        }
        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(EncodingError::new(format!(
                "asset code {:?} must be ASCII alphanumeric",
                code
            )));
        }
        issuer.public_key()?;
        Ok(())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::CreditAlphanum4 { code, issuer } | Asset::CreditAlphanum12 { code, issuer } => {
                write!(f, "{}:{}", code, issuer)
            }
        }
    }
}

/// Trust line authorization flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustLineFlags(pub u32);

impl TrustLineFlags {
    /// Issuer has authorized the account to transact with its credit
    pub const AUTHORIZED: u32 = 1;
    /// Issuer has authorized the account to keep its offers but not transact
    pub const AUTHORIZED_TO_MAINTAIN_LIABILITIES: u32 = 2;
    /// Issuer may claw the asset back
    pub const CLAWBACK_ENABLED: u32 = 4;

    /// Raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Authorized flag set
    pub fn is_authorized(&self) -> bool {
        self.0 & Self::AUTHORIZED != 0
    }

    /// Authorized-to-maintain-liabilities flag set
    pub fn is_authorized_to_maintain_liabilities(&self) -> bool {
        self.0 & Self::AUTHORIZED_TO_MAINTAIN_LIABILITIES != 0
    }

    /// Clawback-enabled flag set
    pub fn is_clawback_enabled(&self) -> bool {
        self.0 & Self::CLAWBACK_ENABLED != 0
    }
}

/// Amounts reserved against open offers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liabilities {
    /// Reserved for buying
    pub buying: i64,
    /// Reserved for selling
    pub selling: i64,
}

/// Trust line ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    /// Holding account
    pub account_id: AccountId,
    /// Credit asset held
    pub asset: Asset,
    /// Current balance
    pub balance: i64,
    /// Maximum balance the account accepts
    pub limit: i64,
    /// Authorization flags
    pub flags: TrustLineFlags,
    /// Liabilities extension (absent on entries that never had offers)
    pub liabilities: Option<Liabilities>,
}

impl TrustLineEntry {
    /// Liabilities, zero when the extension is absent
    pub fn liabilities(&self) -> Liabilities {
        self.liabilities.unwrap_or_default()
    }
}

/// Account ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Account address
    pub account_id: AccountId,
    /// Native asset balance
    pub balance: i64,
    /// Sequence number
    pub seq_num: i64,
    /// Number of sub-entries (trust lines, offers, data) owned
    pub num_sub_entries: u32,
    /// Account flags
    pub flags: u32,
}

/// Offer ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    /// Offer owner
    pub seller_id: AccountId,
    /// Offer ID
    pub offer_id: i64,
    /// Asset sold
    pub selling: Asset,
    /// Asset bought
    pub buying: Asset,
    /// Amount of `selling` offered
    pub amount: i64,
}

/// Data ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    /// Owning account
    pub account_id: AccountId,
    /// Data name
    pub name: String,
    /// Data value
    pub value: Vec<u8>,
}

/// Ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LedgerEntryType {
    /// Account
    Account = 0,
    /// Trust line
    Trustline = 1,
    /// Offer
    Offer = 2,
    /// Data
    Data = 3,
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

/// Ledger entry body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryData {
    /// Account
    Account(AccountEntry),
    /// Trust line
    TrustLine(TrustLineEntry),
    /// Offer
    Offer(OfferEntry),
    /// Data
    Data(DataEntry),
}

impl LedgerEntryData {
    /// Discriminant
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            LedgerEntryData::Account(_) => LedgerEntryType::Account,
            LedgerEntryData::TrustLine(_) => LedgerEntryType::Trustline,
            LedgerEntryData::Offer(_) => LedgerEntryType::Offer,
            LedgerEntryData::Data(_) => LedgerEntryType::Data,
        }
    }
}

/// A versioned piece of ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Ledger sequence that produced this version
    pub last_modified_ledger_seq: u32,
    /// Entry body
    pub data: LedgerEntryData,
    /// Sponsoring account from the entry extension
    pub sponsor: Option<AccountId>,
}

impl LedgerEntry {
    /// Trust line body, if this is a trust line entry
    pub fn trust_line(&self) -> Option<&TrustLineEntry> {
        match &self.data {
            LedgerEntryData::TrustLine(tl) => Some(tl),
            _ => None,
        }
    }

    /// Account body, if this is an account entry
    pub fn account(&self) -> Option<&AccountEntry> {
        match &self.data {
            LedgerEntryData::Account(account) => Some(account),
            _ => None,
        }
    }
}

/// Identifying fields of a trust line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerKeyTrustLine {
    /// Holding account
    pub account_id: AccountId,
    /// Credit asset
    pub asset: Asset,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> AccountId {
        AccountId::from_public_key(&[2u8; 32])
    }

    #[test]
    fn test_account_id_parse() {
        let account = AccountId::from_public_key(&[7u8; 32]);
        assert_eq!(AccountId::parse(account.as_str()).unwrap(), account);
        assert!(AccountId::parse("GNOTANADDRESS").is_err());
    }

    #[test]
    fn test_asset_credit_picks_variant() {
        let usd = Asset::credit("USD", issuer()).unwrap();
        assert_eq!(usd.asset_type(), AssetType::CreditAlphanum4);

        let long = Asset::credit("EURO12", issuer()).unwrap();
        assert_eq!(long.asset_type(), AssetType::CreditAlphanum12);
    }

    #[test]
    fn test_asset_validation() {
        assert!(Asset::credit("", issuer()).is_err());
        assert!(Asset::credit("THIRTEENCHARS", issuer()).is_err());
        assert!(Asset::credit("US-D", issuer()).is_err());
        assert!(Asset::credit("USD", AccountId::new("bogus")).is_err());

        let short_in_long = Asset::CreditAlphanum12 {
            code: "USD".to_string(),
            issuer: issuer(),
        };
        assert!(short_in_long.validate().is_err());
    }

    #[test]
    fn test_asset_extract_from_parts() {
        let asset = Asset::credit("EURO12", issuer()).unwrap();
        let (asset_type, code, issuer) = asset.extract();
        assert_eq!(Asset::from_parts(asset_type, &code, &issuer).unwrap(), asset);

        let (asset_type, code, issuer) = Asset::Native.extract();
        assert_eq!(asset_type, AssetType::Native);
        assert!(code.is_empty() && issuer.is_empty());
        assert_eq!(Asset::from_parts(asset_type, &code, &issuer).unwrap(), Asset::Native);
    }

    #[test]
    fn test_trust_line_flags() {
        let flags = TrustLineFlags(
            TrustLineFlags::AUTHORIZED | TrustLineFlags::CLAWBACK_ENABLED,
        );
        assert!(flags.is_authorized());
        assert!(!flags.is_authorized_to_maintain_liabilities());
        assert!(flags.is_clawback_enabled());
        assert!(!TrustLineFlags::default().is_authorized());
    }

    #[test]
    fn test_asset_type_codes() {
        for asset_type in [
            AssetType::Native,
            AssetType::CreditAlphanum4,
            AssetType::CreditAlphanum12,
        ] {
            assert_eq!(AssetType::from_code(asset_type.code()), Some(asset_type));
        }
        assert_eq!(AssetType::from_code(3), None);
    }
}
