//! CLI subcommands and the state they share

pub mod address;
pub mod info;
pub mod keygen;
pub mod payments;
pub mod reset;
pub mod scan;
pub mod send;
pub mod spend;

use std::sync::Arc;

use anyhow::{Context, Result};
use stealth_core::{JsonFileStore, RecipientKeys, ScanState, ScanStore, Scanner};
use tracing::debug;

use crate::config::{CliConfig, Paths};
use crate::ledger::SolanaLedger;
use crate::secure_storage::{prompt_password, SecureKeyStorage};

pub type CliScanner = Scanner<SolanaLedger, JsonFileStore>;

/// Resolved paths plus configuration with command-line overrides applied
pub struct CliContext {
    pub paths: Paths,
    pub config: CliConfig,
}

impl CliContext {
    pub fn key_storage(&self) -> SecureKeyStorage {
        SecureKeyStorage::new(self.paths.keys_file())
    }

    /// Prompt for the password and decrypt the recipient keys
    pub fn unlock_keys(&self) -> Result<RecipientKeys> {
        let storage = self.key_storage();
        let file = storage.read()?;
        let password = prompt_password("Enter password to decrypt keys: ")?;
        file.decrypt(&password)
            .context("Failed to decrypt keys. Wrong password?")
    }

    /// Storage identity, readable without the password
    pub fn identity(&self) -> Result<String> {
        Ok(hex::encode(self.key_storage().public_key()?))
    }

    pub fn scan_store(&self) -> Result<JsonFileStore> {
        JsonFileStore::new(self.paths.scans_dir()).context("Failed to open scan state directory")
    }

    /// Persisted scan state for the stored identity
    pub fn load_state(&self) -> Result<ScanState> {
        let identity = self.identity()?;
        let state = self
            .scan_store()?
            .load(&identity)
            .context("Failed to load scan state")?;
        Ok(state.unwrap_or_else(|| ScanState::new(identity)))
    }

    pub fn open_scanner(&self, keys: RecipientKeys) -> Result<CliScanner> {
        let ledger = Arc::new(SolanaLedger::new(&self.config.rpc_url));
        let store = Arc::new(self.scan_store()?);
        debug!(rpc_url = %self.config.rpc_url, identity = %keys.identity(), "opening scanner");
        Scanner::new(keys, ledger, store, self.config.scanner.clone()).context("Failed to start scanner")
    }
}

/// Lamports as SOL for display
pub fn format_amount(amount: u64, asset_id: &str) -> String {
    if asset_id == "SOL" {
        format!("{:.9} SOL", amount as f64 / 1_000_000_000.0)
    } else {
        format!("{} {}", amount, asset_id)
    }
}
