//! Encrypted recipient key file
//!
//! The recipient seed is sealed with AES-256-GCM under an Argon2id-derived
//! key. The public key is stored in the clear so read-only commands work
//! without a password.

use std::fs;
use std::path::PathBuf;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, bail, Context, Result};
use argon2::{
    password_hash::{rand_core::RngCore, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use stealth_core::{RecipientKeys, SecretBytes};
use zeroize::Zeroize;

/// Argon2 parameters for key derivation
const ARGON2_M_COST: u32 = 65536; // 64 MB memory
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

const KEY_FILE_VERSION: u8 = 1;

/// Environment variable consulted before prompting
pub const PASSWORD_ENV: &str = "STEALTH_PASSWORD";

/// On-disk key file
#[derive(Serialize, Deserialize)]
pub struct EncryptedKeyFile {
    pub version: u8,
    /// Recipient public key (hex)
    pub public_key: String,
    /// Salt for Argon2
    pub salt: String,
    /// Nonce for AES-GCM (base64)
    pub nonce: String,
    /// Encrypted seed (base64)
    pub ciphertext: String,
    pub created_at: String,
}

fn derive_key(password: &str, salt: &str) -> Result<[u8; 32]> {
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
            .map_err(|e| anyhow!("Argon2 params error: {}", e))?,
    );

    let mut key_bytes = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut key_bytes)
        .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
    Ok(key_bytes)
}

impl EncryptedKeyFile {
    /// Seal `keys` under `password`
    pub fn encrypt(keys: &RecipientKeys, password: &str) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let mut key_bytes = derive_key(password, salt.as_str())?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| anyhow!("Cipher creation failed: {}", e));
        key_bytes.zeroize();
        let cipher = cipher?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(&Nonce::from(nonce_bytes), keys.seed().expose().as_ref())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        Ok(Self {
            version: KEY_FILE_VERSION,
            public_key: hex::encode(keys.public_key),
            salt: salt.as_str().to_string(),
            nonce: b64::encode(&nonce_bytes),
            ciphertext: b64::encode(&ciphertext),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Open the key file with `password`
    pub fn decrypt(&self, password: &str) -> Result<RecipientKeys> {
        if self.version != KEY_FILE_VERSION {
            bail!("Unsupported key file version {}", self.version);
        }

        let nonce: [u8; 12] = b64::decode(&self.nonce)
            .context("Invalid nonce encoding")?
            .try_into()
            .map_err(|_| anyhow!("Invalid nonce length"))?;
        let ciphertext = b64::decode(&self.ciphertext).context("Invalid ciphertext encoding")?;

        let mut key_bytes = derive_key(password, &self.salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| anyhow!("Cipher creation failed: {}", e));
        key_bytes.zeroize();

        let mut plaintext = cipher?
            .decrypt(&Nonce::from(nonce), ciphertext.as_ref())
            .map_err(|_| anyhow!("Decryption failed - wrong password or corrupted data"))?;

        if plaintext.len() != 32 {
            plaintext.zeroize();
            bail!("Corrupted key file");
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&plaintext);
        plaintext.zeroize();

        let keys = RecipientKeys::from_seed(SecretBytes::new(seed));
        seed.zeroize();

        if hex::encode(keys.public_key) != self.public_key {
            bail!("Key file public key does not match the decrypted seed");
        }
        Ok(keys)
    }

    pub fn public_key(&self) -> Result<[u8; 32]> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(&self.public_key, &mut out).context("Invalid public key in key file")?;
        Ok(out)
    }
}

/// Key file manager
pub struct SecureKeyStorage {
    path: PathBuf,
}

impl SecureKeyStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, keys: &RecipientKeys, password: &str) -> Result<()> {
        let encrypted = EncryptedKeyFile::encrypt(keys, password)?;
        let json = serde_json::to_string_pretty(&encrypted)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, &json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn read(&self) -> Result<EncryptedKeyFile> {
        if !self.exists() {
            bail!("No stealth keys found. Run 'stealthsol keygen' first.");
        }
        let json = fs::read_to_string(&self.path).context("Failed to read encrypted key file")?;
        serde_json::from_str(&json).context("Failed to parse encrypted key file")
    }

    /// Public key without decrypting anything
    pub fn public_key(&self) -> Result<[u8; 32]> {
        self.read()?.public_key()
    }
}

/// Password strength validation
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());

    if !has_upper || !has_lower || !has_digit {
        bail!("Password must contain uppercase, lowercase, and numeric characters");
    }

    Ok(())
}

/// `STEALTH_PASSWORD` if set, otherwise a hidden prompt
pub fn prompt_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(prompt).context("Failed to read password")
}

/// Prompt for a new password with confirmation
pub fn prompt_new_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        validate_password_strength(&password)?;
        return Ok(password);
    }

    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    validate_password_strength(&password)?;
    Ok(password)
}

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(s: &str) -> anyhow::Result<Vec<u8>> {
        STANDARD.decode(s).map_err(|e| anyhow::anyhow!("Base64 decode error: {}", e))
    }
}
