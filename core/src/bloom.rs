//! Bloom pre-filter keyed to a recipient public key
//!
//! Senders attach a hint built from the recipient's public key; recipients
//! test candidates against their own key before any curve arithmetic. A
//! negative test is definitive, a positive one is probabilistic.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StealthError};

/// Domain separator for bloom bit positions
const BLOOM_DOMAIN: &[u8] = b"stealthsol_bloom_v1";

/// Width of the hint field on the wire
pub const HINT_BYTES: usize = 32;

/// Upper bound on hash functions. Every extra position narrows the set of
/// recipients an observer can attribute a hint to.
pub const MAX_HASH_COUNT: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomConfig {
    /// K: number of bit positions per key
    pub hash_count: u32,
    /// m: filter width in bits (multiple of 8, at most 256)
    pub size_bits: u32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            hash_count: 3,
            size_bits: (HINT_BYTES * 8) as u32,
        }
    }
}

impl BloomConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hash_count == 0 || self.hash_count > MAX_HASH_COUNT {
            return Err(StealthError::ConfigurationError(format!(
                "bloom hash count must be in 1..={}, got {}",
                MAX_HASH_COUNT, self.hash_count
            )));
        }
        if self.size_bits == 0 || self.size_bits % 8 != 0 || self.size_bits as usize > HINT_BYTES * 8 {
            return Err(StealthError::ConfigurationError(format!(
                "bloom size must be a non-zero multiple of 8 up to {} bits, got {}",
                HINT_BYTES * 8,
                self.size_bits
            )));
        }
        Ok(())
    }

    fn size_bytes(&self) -> usize {
        self.size_bits as usize / 8
    }
}

/// Bit array of `size_bits` bits
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomHint {
    #[serde(with = "hex")]
    bits: Vec<u8>,
}

impl std::fmt::Debug for BloomHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BloomHint({})", hex::encode(&self.bits))
    }
}

impl BloomHint {
    pub fn empty(config: &BloomConfig) -> Self {
        Self {
            bits: vec![0u8; config.size_bytes()],
        }
    }

    /// Width in bits
    pub fn size_bits(&self) -> u32 {
        (self.bits.len() * 8) as u32
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Fixed-width wire form, zero padded
    pub fn to_wire(&self) -> [u8; HINT_BYTES] {
        let mut out = [0u8; HINT_BYTES];
        out[..self.bits.len()].copy_from_slice(&self.bits);
        out
    }

    /// Read the wire form under `config`'s width
    pub fn from_wire(bytes: &[u8; HINT_BYTES], config: &BloomConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            bits: bytes[..config.size_bytes()].to_vec(),
        })
    }

    fn set(&mut self, position: u32) {
        self.bits[(position / 8) as usize] |= 1 << (position % 8);
    }

    fn is_set(&self, position: u32) -> bool {
        self.bits[(position / 8) as usize] & (1 << (position % 8)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }
}

/// i-th bit position for a key: SHA256(domain || le32(i) || key) mod m
fn bit_position(public_key: &[u8; 32], index: u32, size_bits: u32) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(BLOOM_DOMAIN);
    hasher.update(index.to_le_bytes());
    hasher.update(public_key);
    let hash = hasher.finalize();

    let low = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]);
    low % size_bits
}

/// Build the hint a sender attaches for `public_key`
pub fn create_hint(public_key: &[u8; 32], config: &BloomConfig) -> Result<BloomHint> {
    config.validate()?;
    let mut hint = BloomHint::empty(config);
    for i in 0..config.hash_count {
        hint.set(bit_position(public_key, i, config.size_bits));
    }
    Ok(hint)
}

/// Test whether `hint` may have been built for `public_key`
///
/// Returns false on the first unset bit.
pub fn matches(public_key: &[u8; 32], hint: &BloomHint, config: &BloomConfig) -> bool {
    if config.validate().is_err() || hint.size_bits() != config.size_bits {
        return false;
    }
    (0..config.hash_count).all(|i| hint.is_set(bit_position(public_key, i, config.size_bits)))
}

/// Bitwise OR of same-sized hints
///
/// A combined hint matches every contributing key, with a correspondingly
/// higher false-positive rate.
pub fn combine(hints: &[BloomHint]) -> Result<BloomHint> {
    let first = hints
        .first()
        .ok_or_else(|| StealthError::ConfigurationError("no hints to combine".to_string()))?;

    let mut combined = first.clone();
    for hint in &hints[1..] {
        if hint.bits.len() != combined.bits.len() {
            return Err(StealthError::ConfigurationError(format!(
                "cannot combine bloom hints of {} and {} bits",
                combined.size_bits(),
                hint.size_bits()
            )));
        }
        for (acc, byte) in combined.bits.iter_mut().zip(&hint.bits) {
            *acc |= byte;
        }
    }
    Ok(combined)
}

/// Expected false-positive rate after inserting `n` keys:
/// (1 - e^(-K·n/m))^K
pub fn estimate_false_positive_rate(config: &BloomConfig, n: u32) -> f64 {
    let k = config.hash_count as f64;
    let m = config.size_bits as f64;
    (1.0 - (-k * n as f64 / m).exp()).powf(k)
}

/// Fewest hash functions whose single-key false-positive rate at
/// `size_bits` meets `target_fpr`, capped at `MAX_HASH_COUNT`
pub fn recommend_hash_count(target_fpr: f64, size_bits: u32) -> u32 {
    (1..=MAX_HASH_COUNT)
        .find(|&k| {
            let config = BloomConfig {
                hash_count: k,
                size_bits,
            };
            estimate_false_positive_rate(&config, 1) <= target_fpr
        })
        .unwrap_or(MAX_HASH_COUNT)
}
