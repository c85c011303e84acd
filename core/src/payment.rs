//! Sender-side payment construction

use crate::bloom::{create_hint, BloomConfig};
use crate::error::Result;
use crate::metadata::{serialize_metadata, PaymentMetadata};
use crate::note::{encrypt_note, FieldEncoding, NoteFields};
use crate::stealth::derive_stealth_keys;

/// Everything a sender publishes for one payment
#[derive(Debug)]
pub struct PaymentPayload {
    /// One-time destination
    pub stealth_public_key: [u8; 32],
    pub ephemeral_public_key: [u8; 32],
    /// Published on-chain next to the metadata
    pub commitment: [u8; 32],
    /// Framed metadata for the ledger's data field
    pub metadata: Vec<u8>,
    /// Sender's copy of the note
    pub note: NoteFields,
}

/// Derive a stealth address, commit to the note, seal it and frame the result
pub fn build_payment(
    recipient_public_key: &[u8; 32],
    amount: u64,
    asset_id: &str,
    bloom: &BloomConfig,
    field: &FieldEncoding,
) -> Result<PaymentPayload> {
    field.validate()?;
    let hint = create_hint(recipient_public_key, bloom)?;
    let derivation = derive_stealth_keys(recipient_public_key, None)?;

    let note = NoteFields::new(&derivation.stealth_public_key, amount, asset_id, field);
    let sealed = encrypt_note(&note, &derivation.shared_secret)?;

    let metadata = serialize_metadata(&PaymentMetadata {
        ephemeral_public_key: derivation.ephemeral_public_key,
        hint: hint.to_wire(),
        note: sealed,
    });

    Ok(PaymentPayload {
        stealth_public_key: derivation.stealth_public_key,
        ephemeral_public_key: derivation.ephemeral_public_key,
        commitment: note.commitment,
        metadata,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RecipientKeys;
    use crate::metadata::deserialize_metadata;
    use crate::note::decrypt_note;
    use crate::stealth::recognize_stealth_payment;

    #[test]
    fn test_payload_opens_for_recipient() {
        let keys = RecipientKeys::generate();
        let field = FieldEncoding::default();
        let payload =
            build_payment(&keys.public_key, 42, "SOL", &BloomConfig::default(), &field).unwrap();

        let metadata = deserialize_metadata(&payload.metadata).unwrap();
        assert_eq!(metadata.ephemeral_public_key, payload.ephemeral_public_key);

        let recognized =
            recognize_stealth_payment(keys.seed(), &metadata.ephemeral_public_key, None).unwrap();
        assert_eq!(recognized.stealth_public_key, payload.stealth_public_key);

        let note = decrypt_note(&metadata.note.ciphertext, &metadata.note.nonce, &recognized.shared_secret)
            .unwrap();
        assert_eq!(note.amount, 42);
        assert!(note
            .verify_commitment(&payload.stealth_public_key, &payload.commitment, &field)
            .is_ok());
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let mut identity = [0u8; 32];
        identity[0] = 1;
        assert!(build_payment(&identity, 1, "SOL", &BloomConfig::default(), &FieldEncoding::default()).is_err());
    }
}
