//! Stealth protocol test vectors
//!
//! Fixed inputs with known-good outputs. Any change here is a wire or
//! protocol break: senders and recipients on different versions would stop
//! recognizing each other's payments.
//!
//! Reference: RFC 8032 (Ed25519), RFC 7748 (X25519)

#[cfg(test)]
#[allow(non_snake_case)] // Crypto notation uses A, E, P, etc.
mod stealth_test_vectors {
    use crate::bloom::{create_hint, matches, BloomConfig};
    use crate::crypto::{
        compute_shared_secret, edwards_to_montgomery, public_key_from_scalar, public_key_from_seed,
        SecretBytes,
    };
    use crate::ledger::TxRef;
    use crate::note::{create_commitment, FieldEncoding};
    use crate::scanner::payment_id;
    use crate::spend::create_nullifier;
    use crate::stealth::{derive_stealth_keys, recognize_stealth_payment};
    use curve25519_dalek::constants::{ED25519_BASEPOINT_COMPRESSED, X25519_BASEPOINT};

    fn h(s: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).unwrap();
        out
    }

    const RECIPIENT_SEED: [u8; 32] = [0x11; 32];
    const EPHEMERAL_SEED: [u8; 32] = [0x22; 32];

    /// RFC 8032 section 7.1, test 1
    #[test]
    fn test_vector_rfc8032_public_key() {
        let seed = SecretBytes::new(h("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60"));
        assert_eq!(
            hex::encode(public_key_from_seed(&seed)),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    /// Public keys agree with a standard Ed25519 implementation
    #[test]
    fn test_vector_matches_ed25519_dalek() {
        for fill in [0x01u8, 0x11, 0x22, 0x7f, 0xff] {
            let seed = [fill; 32];
            let secret = ed25519_dalek::SecretKey::from_bytes(&seed).unwrap();
            let expected = ed25519_dalek::PublicKey::from(&secret);
            assert_eq!(public_key_from_seed(&SecretBytes::new(seed)), expected.to_bytes());
        }
    }

    /// The Ed25519 basepoint maps to the X25519 basepoint u = 9
    #[test]
    fn test_vector_basepoint_to_montgomery() {
        let u = edwards_to_montgomery(&ED25519_BASEPOINT_COMPRESSED.to_bytes()).unwrap();
        assert_eq!(u, X25519_BASEPOINT.to_bytes());

        let mut nine = [0u8; 32];
        nine[0] = 9;
        assert_eq!(u, nine);
    }

    #[test]
    fn test_vector_fixed_keys() {
        let A = public_key_from_seed(&SecretBytes::new(RECIPIENT_SEED));
        let E = public_key_from_seed(&SecretBytes::new(EPHEMERAL_SEED));
        assert_eq!(
            hex::encode(A),
            "d04ab232742bb4ab3a1368bd4615e4e6d0224ab71a016baf8520a332c9778737"
        );
        assert_eq!(
            hex::encode(E),
            "a09aa5f47a6759802ff955f8dc2d2a14a5c99d23be97f864127ff9383455a4f0"
        );
    }

    /// shared = SHA256("stealthsol_ecdh_v1" || X25519(clamp(e), u(A)))
    #[test]
    fn test_vector_shared_secret() {
        let A = public_key_from_seed(&SecretBytes::new(RECIPIENT_SEED));
        let E = public_key_from_seed(&SecretBytes::new(EPHEMERAL_SEED));
        let expected = "ebb2349889d89893662e6903d2ac88918a663ac369d2be33c3b8441190610395";

        let sender = compute_shared_secret(&SecretBytes::new(EPHEMERAL_SEED), &A).unwrap();
        let recipient = compute_shared_secret(&SecretBytes::new(RECIPIENT_SEED), &E).unwrap();
        assert_eq!(hex::encode(sender.expose()), expected);
        assert_eq!(hex::encode(recipient.expose()), expected);
    }

    /// P = A + (SHA256("stealthsol_v1" || shared) mod l)·G
    #[test]
    fn test_vector_stealth_address() {
        let A = public_key_from_seed(&SecretBytes::new(RECIPIENT_SEED));
        let derivation = derive_stealth_keys(&A, Some(SecretBytes::new(EPHEMERAL_SEED))).unwrap();
        assert_eq!(
            hex::encode(derivation.stealth_public_key),
            "a73cd5a0a9f0cc4381ba57a57eb21026ef5dc886d64d6178e4a32ea45d991b31"
        );

        let recognized =
            recognize_stealth_payment(&SecretBytes::new(RECIPIENT_SEED), &derivation.ephemeral_public_key, Some(&A))
                .unwrap();
        assert_eq!(
            hex::encode(recognized.stealth_private_key.expose()),
            "513f50837e7b4986a2865742c357524b365cb77358ee1b2e24cb703717df530f"
        );
        assert_eq!(
            public_key_from_scalar(&recognized.stealth_private_key),
            derivation.stealth_public_key
        );
    }

    #[test]
    fn test_vector_commitment() {
        let commitment = create_commitment(
            &[0x44; 32],
            1_000_000,
            "SOL",
            &[0x33; 32],
            &FieldEncoding::default(),
        );
        assert_eq!(
            hex::encode(commitment),
            "00d4f574b3b5549710bd3fe23411fd0d0e7efab39c659c5d940934b733ce0249"
        );
    }

    #[test]
    fn test_vector_nullifier() {
        let nullifier = create_nullifier(
            &SecretBytes::new([0x55; 32]),
            &[0x66; 32],
            &[0x77; 32],
            &FieldEncoding::default(),
        );
        assert_eq!(
            hex::encode(nullifier),
            "0053aaf7c997b880d6a299fbd0781f9a075fbe5778473a3dfecb387865998001"
        );
    }

    /// Default config sets bits 10, 89 and 191 for key 0x44..44
    #[test]
    fn test_vector_bloom_positions() {
        let config = BloomConfig::default();
        let hint = create_hint(&[0x44; 32], &config).unwrap();
        assert_eq!(hint.count_ones(), 3);

        let mut expected = [0u8; 32];
        for bit in [10usize, 89, 191] {
            expected[bit / 8] |= 1 << (bit % 8);
        }
        assert_eq!(hint.to_wire(), expected);
        assert!(matches(&[0x44; 32], &hint, &config));
    }

    #[test]
    fn test_vector_payment_id() {
        assert_eq!(
            payment_id(&TxRef::new("sig-1", 99), 2),
            "c2341f870ebf177e04d528d5999aaa8905cfc3df31ac5d5b3ce96235bafbbcb3"
        );
    }
}
