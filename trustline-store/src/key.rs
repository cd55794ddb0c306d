//! Canonical trust-line ledger keys
//!
//! A ledger key is the base64 text of the canonical binary ledger-key
//! serialization: big-endian `u32` discriminants, account IDs as
//! `u32 key type || 32 byte ed25519 key`, asset codes zero-padded to 4 or
//! 12 bytes. Keys derived from a full [`LedgerEntry`] and from a bare
//! `(account, asset)` pair go through the same encoder and are therefore
//! identical for the same trust line.

use crate::error::{EncodingError, Error, Result, Step};
use crate::types::{AccountId, Asset, AssetType, LedgerEntry, LedgerEntryType, LedgerKeyTrustLine};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public key type tag for ed25519 account IDs
const PUBLIC_KEY_TYPE_ED25519: u32 = 0;

/// Opaque canonical key of a trust line row
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey(String);

impl LedgerKey {
    /// Wrap an already encoded key
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Recover the `(account, asset)` pair this key was derived from
    pub fn decode(&self) -> Result<LedgerKeyTrustLine> {
        decode_trust_line_key(&self.0).map_err(|e| Error::encoding(Step::KeyDerivation, e))
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the ledger key for an `(account, asset)` pair
pub fn derive_key(account_id: &AccountId, asset: &Asset) -> Result<LedgerKey> {
    encode_trust_line_key(account_id, asset)
        .map(|bytes| LedgerKey(STANDARD.encode(bytes)))
        .map_err(|e| Error::encoding(Step::KeyDerivation, e))
}

/// Derive the ledger key for an identifying trust line key
pub fn key_for(key: &LedgerKeyTrustLine) -> Result<LedgerKey> {
    derive_key(&key.account_id, &key.asset)
}

/// Derive the ledger key of a trust line ledger entry
pub fn entry_key(entry: &LedgerEntry) -> Result<LedgerKey> {
    let trust_line = entry
        .trust_line()
        .ok_or_else(|| Error::InvalidEntryType(entry.data.entry_type()))?;
    derive_key(&trust_line.account_id, &trust_line.asset)
}

fn encode_trust_line_key(
    account_id: &AccountId,
    asset: &Asset,
) -> std::result::Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&(LedgerEntryType::Trustline as u32).to_be_bytes());
    write_account_id(&mut out, account_id)?;
    write_asset(&mut out, asset)?;
    Ok(out)
}

fn write_account_id(
    out: &mut Vec<u8>,
    account_id: &AccountId,
) -> std::result::Result<(), EncodingError> {
    let key = account_id.public_key()?;
    out.extend_from_slice(&PUBLIC_KEY_TYPE_ED25519.to_be_bytes());
    out.extend_from_slice(&key);
    Ok(())
}

fn write_asset(out: &mut Vec<u8>, asset: &Asset) -> std::result::Result<(), EncodingError> {
    let (code, issuer) = match asset {
        Asset::Native => {
            return Err(EncodingError::new("trust lines cannot hold the native asset"))
        }
        Asset::CreditAlphanum4 { code, issuer } | Asset::CreditAlphanum12 { code, issuer } => {
            (code, issuer)
        }
    };
    asset.validate()?;

    let asset_type = asset.asset_type();
    out.extend_from_slice(&asset_type.code().to_be_bytes());

    let mut padded = vec![0u8; asset_type.code_width()];
    padded[..code.len()].copy_from_slice(code.as_bytes());
    out.extend_from_slice(&padded);

    write_account_id(out, issuer)
}

fn decode_trust_line_key(encoded: &str) -> std::result::Result<LedgerKeyTrustLine, EncodingError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| EncodingError::new(format!("ledger key is not valid base64: {}", e)))?;
    let mut reader = Reader::new(&bytes);

    let entry_type = reader.u32()?;
    if entry_type != LedgerEntryType::Trustline as u32 {
        return Err(EncodingError::new(format!(
            "ledger key has entry type {}, expected trust line",
            entry_type
        )));
    }

    let account_id = reader.account_id()?;

    let type_code = reader.u32()?;
    let asset_type = AssetType::from_code(type_code)
        .filter(|t| *t != AssetType::Native)
        .ok_or_else(|| EncodingError::new(format!("invalid trust line asset type {}", type_code)))?;

    let raw_code = reader.take(asset_type.code_width())?;
    let code_len = raw_code.iter().position(|b| *b == 0).unwrap_or(raw_code.len());
    if raw_code[code_len..].iter().any(|b| *b != 0) {
        return Err(EncodingError::new("asset code has bytes after its padding"));
    }
    let code = std::str::from_utf8(&raw_code[..code_len])
        .map_err(|_| EncodingError::new("asset code is not valid UTF-8"))?;

    let issuer = reader.account_id()?;
    reader.finish()?;

    let asset = Asset::from_parts(asset_type, code, issuer.as_str())?;
    Ok(LedgerKeyTrustLine { account_id, asset })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], EncodingError> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(EncodingError::new("ledger key is truncated"));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> std::result::Result<u32, EncodingError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn account_id(&mut self) -> std::result::Result<AccountId, EncodingError> {
        let key_type = self.u32()?;
        if key_type != PUBLIC_KEY_TYPE_ED25519 {
            return Err(EncodingError::new(format!("unsupported public key type {}", key_type)));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(self.take(32)?);
        Ok(AccountId::from_public_key(&key))
    }

    fn finish(&self) -> std::result::Result<(), EncodingError> {
        if self.pos != self.bytes.len() {
            return Err(EncodingError::new("ledger key has trailing bytes"));
        }
        Ok(())
    }
}
