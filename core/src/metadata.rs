//! Wire framing for payment metadata embedded in a ledger data field
//!
//! Layout (version 1):
//!
//! +---------+------------------+-------------+-----------+------------------+
//! | 0       | 1..33            | 33..65      | 65..77    | 77..             |
//! +---------+------------------+-------------+-----------+------------------+
//! | version | ephemeral pubkey | bloom hint  | nonce     | ciphertext + tag |
//! +---------+------------------+-------------+-----------+------------------+

use crate::bloom::HINT_BYTES;
use crate::error::{Result, StealthError};
use crate::note::{EncryptedNote, NONCE_LEN, TAG_LEN};

/// Current framing version. Do not change without a migration plan.
pub const METADATA_VERSION: u8 = 1;

/// Fixed-size prefix: version + ephemeral key + hint + nonce
pub const METADATA_HEADER_LEN: usize = 1 + 32 + HINT_BYTES + NONCE_LEN;

/// Shortest valid frame: header plus an empty note's tag
pub const METADATA_MIN_LEN: usize = METADATA_HEADER_LEN + TAG_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMetadata {
    pub ephemeral_public_key: [u8; 32],
    pub hint: [u8; HINT_BYTES],
    pub note: EncryptedNote,
}

pub fn serialize_metadata(metadata: &PaymentMetadata) -> Vec<u8> {
    let mut buf = Vec::with_capacity(METADATA_HEADER_LEN + metadata.note.ciphertext.len());
    buf.push(METADATA_VERSION);
    buf.extend_from_slice(&metadata.ephemeral_public_key);
    buf.extend_from_slice(&metadata.hint);
    buf.extend_from_slice(&metadata.note.nonce);
    buf.extend_from_slice(&metadata.note.ciphertext);
    buf
}

pub fn deserialize_metadata(bytes: &[u8]) -> Result<PaymentMetadata> {
    let (&version, rest) = bytes
        .split_first()
        .ok_or_else(|| StealthError::ParseError("empty metadata".to_string()))?;

    if version != METADATA_VERSION {
        return Err(StealthError::ParseError(format!(
            "unsupported metadata version: {}",
            version
        )));
    }

    if bytes.len() < METADATA_MIN_LEN {
        return Err(StealthError::ParseError(format!(
            "metadata too short: expected at least {} bytes, got {}",
            METADATA_MIN_LEN,
            bytes.len()
        )));
    }

    let (ephemeral, rest) = rest.split_at(32);
    let (hint, rest) = rest.split_at(HINT_BYTES);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let mut ephemeral_public_key = [0u8; 32];
    ephemeral_public_key.copy_from_slice(ephemeral);
    let mut hint_bytes = [0u8; HINT_BYTES];
    hint_bytes.copy_from_slice(hint);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce);

    Ok(PaymentMetadata {
        ephemeral_public_key,
        hint: hint_bytes,
        note: EncryptedNote {
            nonce: nonce_bytes,
            ciphertext: ciphertext.to_vec(),
        },
    })
}
