//! Note commitments and authenticated note encryption
//!
//! Notes are serialized with borsh and sealed with AES-256-GCM under a key
//! derived from the stealth shared secret. Only the holder of the shared
//! secret can open or tamper-check a note.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use borsh::{BorshDeserialize, BorshSerialize};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::{constant_time_eq, SecretBytes};
use crate::error::{Result, StealthError};

/// Domain separator for note commitments
const COMMITMENT_DOMAIN: &[u8] = b"stealthsol_commitment_v1";

/// Domain separator for the note encryption key
const NOTE_KEY_DOMAIN: &[u8] = b"stealthsol_note_key_v1";

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

// ============================================================================
// Field Encoding
// ============================================================================

/// How a 32-byte hash is squeezed into the proving system's field
///
/// The first `kept_bytes` of the digest are kept and right-aligned in a
/// 32-byte big-endian word; the leading bytes are zero. 31 bytes fits any
/// field with a modulus above 2^248 (BN254, BLS12-381 scalar field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEncoding {
    pub kept_bytes: usize,
}

impl Default for FieldEncoding {
    fn default() -> Self {
        Self { kept_bytes: 31 }
    }
}

impl FieldEncoding {
    pub fn validate(&self) -> Result<()> {
        if self.kept_bytes == 0 || self.kept_bytes > 32 {
            return Err(StealthError::ConfigurationError(format!(
                "field encoding must keep 1..=32 bytes, got {}",
                self.kept_bytes
            )));
        }
        Ok(())
    }

    pub fn truncate(&self, digest: &[u8; 32]) -> [u8; 32] {
        let kept = self.kept_bytes.min(32);
        let mut out = [0u8; 32];
        out[32 - kept..].copy_from_slice(&digest[..kept]);
        out
    }
}

// ============================================================================
// Commitment
// ============================================================================

/// C = trunc(SHA256(domain || P || le32(len) || asset_id || le64(amount) || blinding))
pub fn create_commitment(
    stealth_public_key: &[u8; 32],
    amount: u64,
    asset_id: &str,
    blinding: &[u8; 32],
    field: &FieldEncoding,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(stealth_public_key);
    hasher.update((asset_id.len() as u32).to_le_bytes());
    hasher.update(asset_id.as_bytes());
    hasher.update(amount.to_le_bytes());
    hasher.update(blinding);

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    field.truncate(&digest)
}

// ============================================================================
// Note Fields
// ============================================================================

/// Plaintext of an encrypted note
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct NoteFields {
    pub amount: u64,
    pub asset_id: String,
    #[serde(with = "hex")]
    pub blinding: [u8; 32],
    /// Spend randomness, fed into the nullifier
    #[serde(with = "hex")]
    pub secret: [u8; 32],
    #[serde(with = "hex")]
    pub commitment: [u8; 32],
}

impl std::fmt::Debug for NoteFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteFields")
            .field("amount", &self.amount)
            .field("asset_id", &self.asset_id)
            .field("commitment", &hex::encode(self.commitment))
            .finish_non_exhaustive()
    }
}

impl NoteFields {
    /// Fresh note for `stealth_public_key` with random blinding and secret
    pub fn new(stealth_public_key: &[u8; 32], amount: u64, asset_id: &str, field: &FieldEncoding) -> Self {
        let mut blinding = [0u8; 32];
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut blinding);
        OsRng.fill_bytes(&mut secret);

        let commitment = create_commitment(stealth_public_key, amount, asset_id, &blinding, field);
        Self {
            amount,
            asset_id: asset_id.to_string(),
            blinding,
            secret,
            commitment,
        }
    }

    /// Recompute the commitment and compare against `expected`
    pub fn verify_commitment(
        &self,
        stealth_public_key: &[u8; 32],
        expected: &[u8; 32],
        field: &FieldEncoding,
    ) -> Result<()> {
        let recomputed = create_commitment(
            stealth_public_key,
            self.amount,
            &self.asset_id,
            &self.blinding,
            field,
        );
        if constant_time_eq(&recomputed, expected) && constant_time_eq(&recomputed, &self.commitment) {
            Ok(())
        } else {
            Err(StealthError::CommitmentMismatch)
        }
    }
}

impl Drop for NoteFields {
    fn drop(&mut self) {
        self.blinding.zeroize();
        self.secret.zeroize();
    }
}

// ============================================================================
// Encryption
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedNote {
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the tag appended
    pub ciphertext: Vec<u8>,
}

fn note_cipher(shared_secret: &SecretBytes) -> Result<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(NOTE_KEY_DOMAIN);
    hasher.update(shared_secret.expose());
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&hasher.finalize());

    let cipher = Aes256Gcm::new_from_slice(&key_bytes)
        .map_err(|e| StealthError::ConfigurationError(format!("cipher creation failed: {}", e)));
    key_bytes.zeroize();
    cipher
}

/// Seal `fields` under a key derived from `shared_secret`
pub fn encrypt_note(fields: &NoteFields, shared_secret: &SecretBytes) -> Result<EncryptedNote> {
    let cipher = note_cipher(shared_secret)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let mut plaintext = fields
        .try_to_vec()
        .map_err(|e| StealthError::SerializationError(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_ref())
        .map_err(|e| StealthError::SerializationError(format!("encryption failed: {}", e)));
    plaintext.zeroize();

    Ok(EncryptedNote {
        nonce: nonce_bytes,
        ciphertext: ciphertext?,
    })
}

/// Open a note
///
/// A rejected tag yields `DecryptionFailed`, the normal answer for notes
/// addressed to someone else.
pub fn decrypt_note(ciphertext: &[u8], nonce: &[u8; NONCE_LEN], shared_secret: &SecretBytes) -> Result<NoteFields> {
    if ciphertext.len() < TAG_LEN {
        return Err(StealthError::DecryptionFailed);
    }

    let cipher = note_cipher(shared_secret)?;
    let mut plaintext = cipher
        .decrypt(&Nonce::from(*nonce), ciphertext)
        .map_err(|_| StealthError::DecryptionFailed)?;

    let fields = NoteFields::try_from_slice(&plaintext)
        .map_err(|e| StealthError::ParseError(format!("authenticated note is malformed: {}", e)));
    plaintext.zeroize();
    fields
}
