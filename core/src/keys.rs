//! Recipient key management
//!
//! A recipient is identified by a single Ed25519 keypair. The public key is
//! the stealth meta-address; the seed never leaves this process.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::{is_valid_point, public_key_from_seed, SecretBytes};
use crate::error::{Result, StealthError};
use crate::stealth::{recognize_for_known_key, RecognizedPayment};

/// Domain for deriving the recipient seed from a BIP-39 seed
const MNEMONIC_DOMAIN: &[u8] = b"stealthsol/recipient";

/// Display prefix for meta-addresses
pub const META_ADDRESS_PREFIX: &str = "stealth:";

/// Complete key set for a recipient
///
/// Security:
/// - The seed is zeroized on drop
/// - Clone is NOT derived to prevent accidental copies
pub struct RecipientKeys {
    seed: SecretBytes,
    /// Long-term public key (A = a·G)
    pub public_key: [u8; 32],
}

impl RecipientKeys {
    /// Generate new random keys from OS entropy
    pub fn generate() -> Self {
        Self::from_seed(SecretBytes::random())
    }

    /// Reconstruct from a stored seed
    pub fn from_seed(seed: SecretBytes) -> Self {
        let public_key = public_key_from_seed(&seed);
        Self { seed, public_key }
    }

    /// Derive keys from a BIP-39 mnemonic phrase
    ///
    /// seed = SHA256("stealthsol/recipient" || bip39_seed(phrase, passphrase))
    pub fn from_mnemonic(mnemonic_phrase: &str, passphrase: &str) -> Result<Self> {
        let mnemonic: bip39::Mnemonic = mnemonic_phrase
            .parse()
            .map_err(|e| StealthError::InvalidKey(mnemonic_error(e)))?;

        let mut bip39_seed = mnemonic.to_seed(passphrase);

        let mut hasher = Sha256::new();
        hasher.update(MNEMONIC_DOMAIN);
        hasher.update(bip39_seed);
        bip39_seed.zeroize();

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hasher.finalize());
        Ok(Self::from_seed(SecretBytes::new(seed)))
    }

    /// Generate a new 24-word mnemonic and derive keys from it
    pub fn generate_with_mnemonic() -> Result<(Self, String)> {
        let entropy = SecretBytes::random();
        let mnemonic = bip39::Mnemonic::from_entropy(entropy.expose())
            .map_err(|e| StealthError::InvalidKey(mnemonic_error(e)))?;

        let phrase = mnemonic.to_string();
        let keys = Self::from_mnemonic(&phrase, "")?;
        Ok((keys, phrase))
    }

    /// Private seed (for internal use and encrypted storage)
    pub fn seed(&self) -> &SecretBytes {
        &self.seed
    }

    /// Storage identity: hex of the public key
    pub fn identity(&self) -> String {
        hex::encode(self.public_key)
    }

    pub fn meta_address(&self) -> String {
        format_meta_address(&self.public_key)
    }

    /// Recipient-side derivation for one ephemeral key, using the cached
    /// public key
    pub fn recognize(&self, ephemeral_public_key: &[u8; 32]) -> Result<RecognizedPayment> {
        recognize_for_known_key(&self.seed, &self.public_key, ephemeral_public_key)
    }
}

fn mnemonic_error(err: bip39::Error) -> &'static str {
    match err {
        bip39::Error::BadWordCount(_) => "mnemonic has an invalid word count",
        bip39::Error::UnknownWord(_) => "mnemonic contains an unknown word",
        bip39::Error::InvalidChecksum => "mnemonic checksum is invalid",
        _ => "mnemonic is invalid",
    }
}

/// Format a meta-address for display
pub fn format_meta_address(public_key: &[u8; 32]) -> String {
    format!("{}{}", META_ADDRESS_PREFIX, bs58::encode(public_key).into_string())
}

/// Parse a meta-address (with or without prefix), validating the point
pub fn parse_meta_address(input: &str) -> Result<[u8; 32]> {
    let encoded = input.strip_prefix(META_ADDRESS_PREFIX).unwrap_or(input);
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| StealthError::InvalidKey("meta-address is not valid base58"))?;

    let public_key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StealthError::InvalidKey("meta-address must be 32 bytes"))?;

    if !is_valid_point(&public_key) {
        return Err(StealthError::InvalidKey("meta-address is not a valid curve point"));
    }
    Ok(public_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonic_key_derivation() {
        let mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

        let keys1 = RecipientKeys::from_mnemonic(mnemonic, "").unwrap();
        let keys2 = RecipientKeys::from_mnemonic(mnemonic, "").unwrap();
        assert_eq!(keys1.public_key, keys2.public_key);

        let keys3 = RecipientKeys::from_mnemonic(mnemonic, "password").unwrap();
        assert_ne!(keys1.public_key, keys3.public_key);
    }

    #[test]
    fn test_generated_mnemonic_recovers_same_keys() {
        let (keys, phrase) = RecipientKeys::generate_with_mnemonic().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);

        let recovered = RecipientKeys::from_mnemonic(&phrase, "").unwrap();
        assert_eq!(keys.public_key, recovered.public_key);
    }

    #[test]
    fn test_invalid_mnemonic_rejected() {
        assert!(RecipientKeys::from_mnemonic("not a real mnemonic", "").is_err());
    }

    #[test]
    fn test_meta_address_roundtrip() {
        let keys = RecipientKeys::generate();
        let formatted = keys.meta_address();
        assert!(formatted.starts_with(META_ADDRESS_PREFIX));

        assert_eq!(parse_meta_address(&formatted).unwrap(), keys.public_key);

        let without_prefix = formatted.strip_prefix(META_ADDRESS_PREFIX).unwrap();
        assert_eq!(parse_meta_address(without_prefix).unwrap(), keys.public_key);
    }

    #[test]
    fn test_meta_address_rejects_bad_input() {
        assert!(parse_meta_address("stealth:0OIl").is_err());
        assert!(parse_meta_address(&bs58::encode([1u8; 16]).into_string()).is_err());
    }
}
