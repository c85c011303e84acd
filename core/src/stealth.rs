//! Stealth address derivation (DKSAP over a single recipient key)
//!
//! ## Protocol Overview
//!
//! ### Sender
//! 1. Generate ephemeral keypair: (e, E) where E = e·G
//! 2. Shared secret: ss = H(domain || x25519(e, A))
//! 3. Offset: o = H(domain || ss) mod l
//! 4. Stealth pubkey: P = A + o·G, publish E
//!
//! ### Recipient
//! 1. Shared secret: ss = H(domain || x25519(a, E)) (same as sender)
//! 2. Expected pubkey: P' = A + o·G
//! 3. Spending key: p = a + o mod l

use crate::crypto::{
    add_scalar_to_point, add_scalar_to_scalar, compute_shared_secret, constant_time_eq,
    derive_scalar_from_secret, parse_public_key, public_key_from_seed, EphemeralKeypair,
    SecretBytes,
};
use crate::error::{Result, StealthError};
use zeroize::Zeroize;

/// Result of computing a stealth address (sender side)
pub struct StealthDerivationResult {
    /// One-time stealth public key P
    pub stealth_public_key: [u8; 32],
    /// Ephemeral public key E to publish
    pub ephemeral_public_key: [u8; 32],
    /// Hashed DH output (note encryption key material)
    pub shared_secret: SecretBytes,
    /// o = H(domain || ss) mod l
    pub scalar_offset: SecretBytes,
}

/// Compute a stealth address for `recipient_public_key`
///
/// A fresh ephemeral keypair is drawn unless one is supplied; a supplied
/// ephemeral seed is consumed and zeroized after use.
pub fn derive_stealth_keys(
    recipient_public_key: &[u8; 32],
    ephemeral_private_key: Option<SecretBytes>,
) -> Result<StealthDerivationResult> {
    parse_public_key(recipient_public_key, "recipient public key is not a valid curve point")?;

    let ephemeral = match ephemeral_private_key {
        Some(secret) => {
            let public = public_key_from_seed(&secret);
            EphemeralKeypair { secret, public }
        }
        None => crate::crypto::generate_ephemeral_keypair(),
    };

    let shared_secret = compute_shared_secret(&ephemeral.secret, recipient_public_key)?;
    let mut offset = derive_scalar_from_secret(shared_secret.expose());
    let stealth_public_key = add_scalar_to_point(recipient_public_key, &offset);
    let scalar_offset = SecretBytes::from_scalar(&offset);
    offset.zeroize();

    Ok(StealthDerivationResult {
        stealth_public_key: stealth_public_key?,
        ephemeral_public_key: ephemeral.public,
        shared_secret,
        scalar_offset,
    })
}

/// Recipient-side view of a candidate payment
pub struct RecognizedPayment {
    pub stealth_public_key: [u8; 32],
    /// p = a + o mod l (a raw scalar, not a seed)
    pub stealth_private_key: SecretBytes,
    pub shared_secret: SecretBytes,
}

/// Mirror of `derive_stealth_keys` from the recipient's side
///
/// Always produces a result for a valid ephemeral key; whether the payment
/// is really ours is decided by the caller against the on-chain commitment.
pub fn recognize_stealth_payment(
    my_private_key: &SecretBytes,
    ephemeral_public_key: &[u8; 32],
    my_public_key: Option<&[u8; 32]>,
) -> Result<RecognizedPayment> {
    let derived_public = public_key_from_seed(my_private_key);
    let my_public = match my_public_key {
        Some(public) => {
            parse_public_key(public, "recipient public key is not a valid curve point")?;
            if !constant_time_eq(public, &derived_public) {
                return Err(StealthError::InvalidKey("public key does not match private key"));
            }
            *public
        }
        None => derived_public,
    };

    recognize_for_known_key(my_private_key, &my_public, ephemeral_public_key)
}

/// Recognition for a key pair whose public half is already known to match
///
/// Skips re-deriving the public key.
pub(crate) fn recognize_for_known_key(
    my_private_key: &SecretBytes,
    my_public_key: &[u8; 32],
    ephemeral_public_key: &[u8; 32],
) -> Result<RecognizedPayment> {
    let shared_secret = compute_shared_secret(my_private_key, ephemeral_public_key)?;
    let mut offset = derive_scalar_from_secret(shared_secret.expose());

    let stealth_public_key = add_scalar_to_point(my_public_key, &offset);
    let stealth_private_key = add_scalar_to_scalar(my_private_key, &offset);
    offset.zeroize();

    Ok(RecognizedPayment {
        stealth_public_key: stealth_public_key?,
        stealth_private_key,
        shared_secret,
    })
}

/// Spend-key recovery for an already confirmed payment
pub fn derive_stealth_private_key(
    my_private_key: &SecretBytes,
    ephemeral_public_key: &[u8; 32],
) -> Result<SecretBytes> {
    Ok(recognize_stealth_payment(my_private_key, ephemeral_public_key, None)?.stealth_private_key)
}
