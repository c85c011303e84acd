//! Spend preparation
//!
//! Recovers the one-time spending key of a discovered payment and computes
//! the nullifier the withdrawal layer publishes. Nothing is signed or
//! submitted here, and spent-nullifier tracking belongs to the ledger.

use sha2::{Digest, Sha256};

use crate::crypto::{constant_time_eq, public_key_from_scalar, SecretBytes};
use crate::error::{Result, StealthError};
use crate::note::FieldEncoding;
use crate::storage::DiscoveredPayment;

pub use crate::stealth::derive_stealth_private_key;

/// Domain tag for nullifiers
pub const NULLIFIER_DOMAIN: &[u8] = b"stealthsol_nullifier_v1";

/// nf = truncate(SHA256(domain || p || commitment || randomness))
pub fn create_nullifier(
    stealth_private_key: &SecretBytes,
    commitment: &[u8; 32],
    randomness: &[u8; 32],
    field: &FieldEncoding,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(NULLIFIER_DOMAIN);
    hasher.update(stealth_private_key.expose());
    hasher.update(commitment);
    hasher.update(randomness);

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    field.truncate(&digest)
}

/// Material the withdrawal flow needs to spend one payment
///
/// The caller zeroes `stealth_private_key` (dropping the bundle does) once
/// its signing material has been built.
#[derive(Debug)]
pub struct SpendBundle {
    pub payment_id: String,
    pub stealth_private_key: SecretBytes,
    pub nullifier: [u8; 32],
    pub commitment: [u8; 32],
    pub amount: u64,
    pub asset_id: String,
    pub destination: String,
}

/// Re-derive the spending key for `payment` and bundle it with its nullifier
pub fn prepare_spend(
    payment: &DiscoveredPayment,
    my_private_key: &SecretBytes,
    destination: &str,
    field: &FieldEncoding,
) -> Result<SpendBundle> {
    if payment.spent {
        return Err(StealthError::AlreadySpent(payment.id.clone()));
    }
    if destination.trim().is_empty() {
        return Err(StealthError::ParseError("destination is empty".to_string()));
    }

    let stealth_private_key = derive_stealth_private_key(my_private_key, &payment.ephemeral_public_key)?;
    if !constant_time_eq(&public_key_from_scalar(&stealth_private_key), &payment.stealth_public_key) {
        return Err(StealthError::InvalidKey("private key does not control this payment"));
    }

    let nullifier = create_nullifier(
        &stealth_private_key,
        &payment.commitment,
        &payment.note.secret,
        field,
    );

    Ok(SpendBundle {
        payment_id: payment.id.clone(),
        stealth_private_key,
        nullifier,
        commitment: payment.commitment,
        amount: payment.note.amount,
        asset_id: payment.note.asset_id.clone(),
        destination: destination.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RecipientKeys;
    use crate::ledger::TxRef;
    use crate::note::NoteFields;
    use crate::stealth::derive_stealth_keys;

    fn discovered_for(keys: &RecipientKeys) -> DiscoveredPayment {
        let field = FieldEncoding::default();
        let derivation = derive_stealth_keys(&keys.public_key, None).unwrap();
        let note = NoteFields::new(&derivation.stealth_public_key, 500, "SOL", &field);
        let stealth_private_key =
            derive_stealth_private_key(keys.seed(), &derivation.ephemeral_public_key).unwrap();

        DiscoveredPayment {
            id: "payment".to_string(),
            stealth_public_key: derivation.stealth_public_key,
            stealth_private_key,
            shared_secret: derivation.shared_secret,
            ephemeral_public_key: derivation.ephemeral_public_key,
            commitment: note.commitment,
            note,
            tx_ref: TxRef::new("sig", 1),
            position: 0,
            slot: 1,
            block_time: None,
            spent: false,
            discovered_at: 0,
        }
    }

    #[test]
    fn test_nullifier_is_deterministic_and_truncated() {
        let key = SecretBytes::new([7u8; 32]);
        let field = FieldEncoding::default();
        let a = create_nullifier(&key, &[1u8; 32], &[2u8; 32], &field);
        let b = create_nullifier(&key, &[1u8; 32], &[2u8; 32], &field);
        assert_eq!(a, b);
        assert_eq!(a[0], 0);

        assert_ne!(a, create_nullifier(&key, &[3u8; 32], &[2u8; 32], &field));
        assert_ne!(a, create_nullifier(&key, &[1u8; 32], &[3u8; 32], &field));
        assert_ne!(a, create_nullifier(&SecretBytes::new([8u8; 32]), &[1u8; 32], &[2u8; 32], &field));
    }

    #[test]
    fn test_prepare_spend() {
        let keys = RecipientKeys::generate();
        let payment = discovered_for(&keys);

        let bundle = prepare_spend(&payment, keys.seed(), "destination", &FieldEncoding::default()).unwrap();
        assert_eq!(bundle.amount, 500);
        assert_eq!(bundle.asset_id, "SOL");
        assert_eq!(bundle.destination, "destination");
        assert!(bundle.stealth_private_key.ct_eq(&payment.stealth_private_key));
        assert_eq!(
            bundle.nullifier,
            create_nullifier(
                &payment.stealth_private_key,
                &payment.commitment,
                &payment.note.secret,
                &FieldEncoding::default()
            )
        );

        // Same note, same nullifier
        let again = prepare_spend(&payment, keys.seed(), "elsewhere", &FieldEncoding::default()).unwrap();
        assert_eq!(again.nullifier, bundle.nullifier);
    }

    #[test]
    fn test_spent_payment_rejected() {
        let keys = RecipientKeys::generate();
        let mut payment = discovered_for(&keys);
        payment.spent = true;
        assert!(matches!(
            prepare_spend(&payment, keys.seed(), "destination", &FieldEncoding::default()),
            Err(StealthError::AlreadySpent(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let keys = RecipientKeys::generate();
        let other = RecipientKeys::generate();
        let payment = discovered_for(&keys);
        assert!(matches!(
            prepare_spend(&payment, other.seed(), "destination", &FieldEncoding::default()),
            Err(StealthError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_empty_destination_rejected() {
        let keys = RecipientKeys::generate();
        let payment = discovered_for(&keys);
        assert!(prepare_spend(&payment, keys.seed(), "  ", &FieldEncoding::default()).is_err());
    }
}
