//! Curve and secret-derivation primitives
//!
//! Keys are Ed25519 seeds and compressed Edwards points. Diffie-Hellman runs
//! on the Montgomery form of the same curve, so a recipient can reuse an
//! ordinary signing keypair as a stealth meta-address.
//!
//! Security features:
//! - Invalid-curve and small-order points are rejected before any multiplication
//! - Raw ECDH output is hashed with a domain tag, never used directly
//! - Constant-time comparison for secret-derived values
//! - Zeroization of secret material on drop

use std::fmt;

use curve25519_dalek::{
    constants::ED25519_BASEPOINT_POINT,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    montgomery::MontgomeryPoint,
    scalar::Scalar,
};
use rand::{rngs::OsRng, RngCore};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{Result, StealthError};

/// Domain separator for the hashed Diffie-Hellman output
pub const SHARED_SECRET_DOMAIN: &[u8] = b"stealthsol_ecdh_v1";

/// Domain separator for the stealth scalar offset
pub const SCALAR_OFFSET_DOMAIN: &[u8] = b"stealthsol_v1";

// ============================================================================
// Scoped Secret
// ============================================================================

/// 32 bytes of secret material that zeroizes itself on drop
///
/// Used for private seeds, private scalars and shared secrets. Clone is
/// NOT derived; an explicit `duplicate` is required to copy a secret.
pub struct SecretBytes {
    bytes: [u8; 32],
}

impl SecretBytes {
    /// Take ownership of raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Fresh random bytes from OS entropy
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_scalar(scalar: &Scalar) -> Self {
        Self { bytes: scalar.to_bytes() }
    }

    /// Interpret the bytes as a scalar, reduced mod l
    pub fn to_scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.bytes)
    }

    /// Borrow the raw bytes (use carefully)
    pub fn expose(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Explicit copy of the secret
    pub fn duplicate(&self) -> Self {
        Self { bytes: self.bytes }
    }

    /// Constant-time equality
    pub fn ct_eq(&self, other: &SecretBytes) -> bool {
        bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBytes(<redacted>)")
    }
}

impl Serialize for SecretBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut encoded = hex::encode(self.bytes);
        let result = serializer.serialize_str(&encoded);
        encoded.zeroize();
        result
    }
}

impl<'de> Deserialize<'de> for SecretBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut encoded = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        let decoded = hex::decode_to_slice(&encoded, &mut bytes);
        encoded.zeroize();
        decoded.map_err(D::Error::custom)?;
        Ok(Self { bytes })
    }
}

// ============================================================================
// Ephemeral Keypair
// ============================================================================

/// One-shot sender keypair. Consumed by a single derivation.
pub struct EphemeralKeypair {
    pub secret: SecretBytes,
    pub public: [u8; 32],
}

/// Generate a fresh ephemeral keypair from OS entropy
pub fn generate_ephemeral_keypair() -> EphemeralKeypair {
    let secret = SecretBytes::random();
    let public = public_key_from_seed(&secret);
    EphemeralKeypair { secret, public }
}

// ============================================================================
// Key Expansion
// ============================================================================

/// Ed25519 hash-and-clamp: the lower half of SHA-512(seed), clamped
fn clamp_seed(seed: &SecretBytes) -> [u8; 32] {
    let mut hash = Sha512::digest(seed.expose());
    let mut clamped = [0u8; 32];
    clamped.copy_from_slice(&hash[..32]);
    hash.as_mut_slice().zeroize();

    clamped[0] &= 248;
    clamped[31] &= 127;
    clamped[31] |= 64;
    clamped
}

/// Derive the arithmetic scalar behind an Ed25519 seed
///
/// The signing key is a seed, not a scalar; this yields the same scalar
/// ed25519 signing uses, reduced mod l.
pub fn expand_seed(seed: &SecretBytes) -> Scalar {
    let mut clamped = clamp_seed(seed);
    let scalar = Scalar::from_bytes_mod_order(clamped);
    clamped.zeroize();
    scalar
}

/// Ed25519 public key for a seed
pub fn public_key_from_seed(seed: &SecretBytes) -> [u8; 32] {
    let mut scalar = expand_seed(seed);
    let public = (&scalar * &ED25519_BASEPOINT_POINT).compress().to_bytes();
    scalar.zeroize();
    public
}

/// Public key for a raw scalar (stealth private keys are scalars, not seeds)
pub fn public_key_from_scalar(scalar: &SecretBytes) -> [u8; 32] {
    let mut scalar = scalar.to_scalar();
    let public = (&scalar * &ED25519_BASEPOINT_POINT).compress().to_bytes();
    scalar.zeroize();
    public
}

// ============================================================================
// Point Validation
// ============================================================================

/// Decompress and validate an externally supplied point
fn decompress_valid(bytes: &[u8; 32]) -> Option<EdwardsPoint> {
    let point = CompressedEdwardsY(*bytes).decompress()?;
    if point.is_small_order() {
        return None;
    }
    Some(point)
}

/// Curve-membership check for a compressed Edwards point
///
/// Rejects encodings that do not decompress and points in the small-order
/// torsion subgroup (including the identity).
pub fn is_valid_point(bytes: &[u8; 32]) -> bool {
    decompress_valid(bytes).is_some()
}

/// Parse a public key, failing closed
pub fn parse_public_key(bytes: &[u8; 32], what: &'static str) -> Result<EdwardsPoint> {
    decompress_valid(bytes).ok_or(StealthError::InvalidKey(what))
}

/// Birational map from the Ed25519 form to the X25519 (Montgomery u) form
///
/// Domain: valid curve points only.
pub fn edwards_to_montgomery(bytes: &[u8; 32]) -> Result<[u8; 32]> {
    let point = parse_public_key(bytes, "point is not on the curve")?;
    Ok(point.to_montgomery().to_bytes())
}

// ============================================================================
// Shared Secret
// ============================================================================

/// Domain-separated Diffie-Hellman between a private seed and a peer public key
///
/// shared = SHA256(domain || X25519(clamp(seed), to_montgomery(peer)))
pub fn compute_shared_secret(private_seed: &SecretBytes, peer_public: &[u8; 32]) -> Result<SecretBytes> {
    let peer = parse_public_key(peer_public, "peer public key is not a valid curve point")?;
    let peer_u: MontgomeryPoint = peer.to_montgomery();

    let mut clamped = clamp_seed(private_seed);
    let mut scalar = Scalar::from_bits(clamped);
    clamped.zeroize();

    let mut raw = (&peer_u * &scalar).to_bytes();
    scalar.zeroize();
    if raw.iter().all(|&b| b == 0) {
        return Err(StealthError::InvalidKey("degenerate shared secret"));
    }

    let mut hasher = Sha256::new();
    hasher.update(SHARED_SECRET_DOMAIN);
    hasher.update(raw);
    raw.zeroize();

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Ok(SecretBytes::new(out))
}

// ============================================================================
// Scalar / Point Arithmetic
// ============================================================================

/// Hash a secret to a scalar: SHA256(domain || secret) mod l
pub fn derive_scalar_from_secret(secret: &[u8]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(SCALAR_OFFSET_DOMAIN);
    hasher.update(secret);
    let mut hash = hasher.finalize();

    let mut scalar_bytes = [0u8; 32];
    scalar_bytes.copy_from_slice(&hash);
    hash.as_mut_slice().zeroize();
    let scalar = Scalar::from_bytes_mod_order(scalar_bytes);
    scalar_bytes.zeroize();
    scalar
}

/// P + s·G
pub fn add_scalar_to_point(point: &[u8; 32], scalar: &Scalar) -> Result<[u8; 32]> {
    let p = parse_public_key(point, "point is not on the curve")?;
    let sum = &p + &(scalar * &ED25519_BASEPOINT_POINT);
    Ok(sum.compress().to_bytes())
}

/// expand(seed) + s mod l
pub fn add_scalar_to_scalar(private_seed: &SecretBytes, scalar: &Scalar) -> SecretBytes {
    let mut expanded = expand_seed(private_seed);
    let mut sum = &expanded + scalar;
    let out = SecretBytes::from_scalar(&sum);
    expanded.zeroize();
    sum.zeroize();
    out
}

/// Constant-time byte comparison for secret-derived values
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

// ============================================================================
// Tests
// ============================================================================
