//! Protocol tests for the stealth payment core
//!
//! Tests cover:
//! - Derivation symmetry between sender and recipient
//! - Bloom pre-filter soundness and observed false-positive rate
//! - Note encryption and commitment checks
//! - The payment scenarios a recipient runs into while scanning

#[cfg(test)]
mod protocol_tests {
    use crate::bloom::{
        combine, create_hint, estimate_false_positive_rate, matches, recommend_hash_count,
        BloomConfig, MAX_HASH_COUNT,
    };
    use crate::crypto::{public_key_from_scalar, SecretBytes};
    use crate::error::StealthError;
    use crate::keys::RecipientKeys;
    use crate::note::{create_commitment, decrypt_note, encrypt_note, FieldEncoding, NoteFields};
    use crate::stealth::{derive_stealth_keys, recognize_stealth_payment};
    use rand::{rngs::OsRng, RngCore};

    fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn test_sender_and_recipient_agree() {
        let recipient = RecipientKeys::generate();
        let derivation = derive_stealth_keys(&recipient.public_key, None).unwrap();

        let recognized = recognize_stealth_payment(
            recipient.seed(),
            &derivation.ephemeral_public_key,
            Some(&recipient.public_key),
        )
        .unwrap();

        assert_eq!(recognized.stealth_public_key, derivation.stealth_public_key);
        assert!(recognized.shared_secret.ct_eq(&derivation.shared_secret));
        assert_eq!(
            public_key_from_scalar(&recognized.stealth_private_key),
            derivation.stealth_public_key
        );
    }

    #[test]
    fn test_stealth_addresses_are_unlinkable() {
        let recipient = RecipientKeys::generate();
        let mut stealth_keys = std::collections::HashSet::new();
        let mut ephemeral_keys = std::collections::HashSet::new();

        for _ in 0..100 {
            let derivation = derive_stealth_keys(&recipient.public_key, None).unwrap();
            assert_ne!(derivation.stealth_public_key, recipient.public_key);
            assert!(stealth_keys.insert(derivation.stealth_public_key));
            assert!(ephemeral_keys.insert(derivation.ephemeral_public_key));
        }
    }

    #[test]
    fn test_bloom_has_no_false_negatives() {
        let config = BloomConfig::default();
        for _ in 0..200 {
            let key = random_key();
            let hint = create_hint(&key, &config).unwrap();
            assert!(matches(&key, &hint, &config));
        }
    }

    #[test]
    fn test_bloom_false_positive_rate_within_band() {
        // (1 - e^(-1/32))^1 ≈ 3.08%
        let config = BloomConfig {
            hash_count: 1,
            size_bits: 32,
        };
        let predicted = estimate_false_positive_rate(&config, 1);
        assert!((predicted - 0.0308).abs() < 0.001);

        let hint = create_hint(&random_key(), &config).unwrap();
        let trials = 1000;
        let positives = (0..trials)
            .filter(|_| matches(&random_key(), &hint, &config))
            .count();

        let observed = positives as f64 / trials as f64;
        assert!(observed <= 0.10, "observed false-positive rate {}", observed);
    }

    #[test]
    fn test_combined_hint_matches_every_member() {
        let config = BloomConfig::default();
        let keys: Vec<[u8; 32]> = (0..4).map(|_| random_key()).collect();
        let hints: Vec<_> = keys.iter().map(|k| create_hint(k, &config).unwrap()).collect();

        let combined = combine(&hints).unwrap();
        for key in &keys {
            assert!(matches(key, &combined, &config));
        }
    }

    #[test]
    fn test_combine_rejects_mismatched_sizes() {
        let small = create_hint(
            &random_key(),
            &BloomConfig {
                hash_count: 3,
                size_bits: 64,
            },
        )
        .unwrap();
        let large = create_hint(&random_key(), &BloomConfig::default()).unwrap();
        assert!(matches!(
            combine(&[small, large]),
            Err(StealthError::ConfigurationError(_))
        ));
        assert!(matches!(combine(&[]), Err(StealthError::ConfigurationError(_))));
    }

    #[test]
    fn test_recommended_hash_count_is_capped() {
        assert_eq!(recommend_hash_count(1e-30, 256), MAX_HASH_COUNT);
        assert_eq!(recommend_hash_count(0.5, 256), 1);
    }

    #[test]
    fn test_note_roundtrip_and_wrong_key() {
        let field = FieldEncoding::default();
        let secret = SecretBytes::random();
        let note = NoteFields::new(&[9u8; 32], u64::MAX, "USDC", &field);

        let sealed = encrypt_note(&note, &secret).unwrap();
        let opened = decrypt_note(&sealed.ciphertext, &sealed.nonce, &secret).unwrap();
        assert_eq!(opened, note);

        for _ in 0..20 {
            assert!(matches!(
                decrypt_note(&sealed.ciphertext, &sealed.nonce, &SecretBytes::random()),
                Err(StealthError::DecryptionFailed)
            ));
        }
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let secret = SecretBytes::random();
        let note = NoteFields::new(&[9u8; 32], 1, "SOL", &FieldEncoding::default());
        let mut sealed = encrypt_note(&note, &secret).unwrap();

        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[last] ^= 1;
        assert!(matches!(
            decrypt_note(&sealed.ciphertext, &sealed.nonce, &secret),
            Err(StealthError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_commitment_deterministic_and_sensitive() {
        let field = FieldEncoding::default();
        let base = create_commitment(&[1u8; 32], 100, "SOL", &[2u8; 32], &field);
        assert_eq!(base, create_commitment(&[1u8; 32], 100, "SOL", &[2u8; 32], &field));

        let mut key = [1u8; 32];
        key[31] ^= 1;
        let mut blinding = [2u8; 32];
        blinding[0] ^= 1;

        assert_ne!(base, create_commitment(&key, 100, "SOL", &[2u8; 32], &field));
        assert_ne!(base, create_commitment(&[1u8; 32], 101, "SOL", &[2u8; 32], &field));
        assert_ne!(base, create_commitment(&[1u8; 32], 100, "SOM", &[2u8; 32], &field));
        assert_ne!(base, create_commitment(&[1u8; 32], 100, "SOL", &blinding, &field));
    }

    #[test]
    fn test_field_width_is_a_parameter() {
        let full = create_commitment(&[1u8; 32], 5, "SOL", &[2u8; 32], &FieldEncoding { kept_bytes: 32 });
        let narrow = create_commitment(&[1u8; 32], 5, "SOL", &[2u8; 32], &FieldEncoding { kept_bytes: 30 });
        assert_eq!(&narrow[..2], &[0, 0]);
        assert_eq!(&narrow[2..], &full[..30]);
    }

    /// End-to-end: one payment, recognized by its recipient
    #[test]
    fn test_scenario_end_to_end_payment() {
        let field = FieldEncoding::default();
        let config = BloomConfig::default();
        let recipient = RecipientKeys::generate();

        // Sender
        let derivation = derive_stealth_keys(&recipient.public_key, None).unwrap();
        let note = NoteFields::new(&derivation.stealth_public_key, 1_000_000, "SOL", &field);
        let published_commitment = note.commitment;
        let sealed = encrypt_note(&note, &derivation.shared_secret).unwrap();
        let hint = create_hint(&recipient.public_key, &config).unwrap();

        // Recipient
        assert!(matches(&recipient.public_key, &hint, &config));
        let recognized = recognize_stealth_payment(
            recipient.seed(),
            &derivation.ephemeral_public_key,
            Some(&recipient.public_key),
        )
        .unwrap();
        let opened = decrypt_note(&sealed.ciphertext, &sealed.nonce, &recognized.shared_secret).unwrap();

        assert_eq!(opened.amount, 1_000_000);
        assert_eq!(opened.asset_id, "SOL");
        assert!(opened
            .verify_commitment(&recognized.stealth_public_key, &published_commitment, &field)
            .is_ok());
    }

    /// A third party's key never opens someone else's note
    #[test]
    fn test_scenario_false_positive_rejection() {
        let field = FieldEncoding::default();
        let recipient = RecipientKeys::generate();
        let stranger = RecipientKeys::generate();

        let derivation = derive_stealth_keys(&recipient.public_key, None).unwrap();
        let note = NoteFields::new(&derivation.stealth_public_key, 7, "SOL", &field);
        let sealed = encrypt_note(&note, &derivation.shared_secret).unwrap();

        let recognized =
            recognize_stealth_payment(stranger.seed(), &derivation.ephemeral_public_key, None).unwrap();
        assert_ne!(recognized.stealth_public_key, derivation.stealth_public_key);
        assert!(matches!(
            decrypt_note(&sealed.ciphertext, &sealed.nonce, &recognized.shared_secret),
            Err(StealthError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_invalid_keys_fail_closed() {
        let identity = {
            let mut bytes = [0u8; 32];
            bytes[0] = 1;
            bytes
        };
        assert!(matches!(
            derive_stealth_keys(&identity, None),
            Err(StealthError::InvalidKey(_))
        ));

        let recipient = RecipientKeys::generate();
        assert!(matches!(
            recognize_stealth_payment(recipient.seed(), &identity, None),
            Err(StealthError::InvalidKey(_))
        ));

        let other = RecipientKeys::generate();
        assert!(matches!(
            recognize_stealth_payment(recipient.seed(), &other.public_key, Some(&other.public_key)),
            Err(StealthError::InvalidKey(_))
        ));
    }
}
