//! Ed25519 account address codec ("strkey")
//!
//! An address is the unpadded RFC 4648 base32 form of
//! `version_byte || public_key || crc16_xmodem(version_byte || public_key)`,
//! with the checksum stored little-endian. Account addresses always start
//! with `G`.

use crate::error::EncodingError;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Version byte for ed25519 account public keys (`G...`)
const VERSION_ACCOUNT_ID: u8 = 6 << 3;

const PAYLOAD_LEN: usize = 1 + 32 + 2;

/// Length of an encoded account address
pub const ADDRESS_LEN: usize = 56;

/// Encode a 32-byte ed25519 public key as an account address
pub fn encode_account_id(public_key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.push(VERSION_ACCOUNT_ID);
    payload.extend_from_slice(public_key);
    let checksum = crc16_xmodem(&payload);
    payload.extend_from_slice(&checksum.to_le_bytes());
    base32_encode(&payload)
}

/// Decode an account address into its 32-byte ed25519 public key
pub fn decode_account_id(address: &str) -> Result<[u8; 32], EncodingError> {
    if address.len() != ADDRESS_LEN {
        return Err(EncodingError::new(format!(
            "account address must be {} characters, got {}",
            ADDRESS_LEN,
            address.len()
        )));
    }

    let payload = base32_decode(address)?;
    if payload.len() != PAYLOAD_LEN {
        return Err(EncodingError::new("account address has an invalid payload length"));
    }

    if payload[0] != VERSION_ACCOUNT_ID {
        return Err(EncodingError::new(format!(
            "invalid version byte {:#04x} for account address",
            payload[0]
        )));
    }

    let (body, checksum) = payload.split_at(33);
    let expected = crc16_xmodem(body);
    let actual = u16::from_le_bytes([checksum[0], checksum[1]]);
    if expected != actual {
        return Err(EncodingError::new("account address checksum mismatch"));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&body[1..]);
    Ok(key)
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for byte in data {
        buffer = (buffer << 8) | *byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

fn base32_decode(text: &str) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for c in text.bytes() {
        let value = ALPHABET
            .iter()
            .position(|a| *a == c)
            .ok_or_else(|| EncodingError::new(format!("invalid base32 character {:?}", c as char)))?;
        buffer = (buffer << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }

    // Leftover bits must be zero padding, otherwise two texts decode alike
    if bits >= 5 || buffer & ((1 << bits) - 1) != 0 {
        return Err(EncodingError::new("non-canonical base32 encoding"));
    }

    Ok(out)
}
