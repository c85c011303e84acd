//! Paths and configuration for the StealthSol CLI

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stealth_core::ScannerConfig;

/// Default directory for stealth keys and scan state
const STEALTH_DIR: &str = ".stealth";
const KEYS_FILE: &str = "keys.enc";
const CONFIG_FILE: &str = "config.json";
const SCANS_DIR: &str = "scans";

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

/// Contents of `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub rpc_url: String,
    pub scanner: ScannerConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            scanner: ScannerConfig::default(),
        }
    }
}

/// Locations of everything the CLI keeps on disk
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// `~/.stealth`, or `home` when given
    pub fn resolve(home: Option<&Path>) -> Result<Self> {
        let root = match home {
            Some(path) => path.to_path_buf(),
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(STEALTH_DIR),
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn keys_file(&self) -> PathBuf {
        self.root.join(KEYS_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn scans_dir(&self) -> PathBuf {
        self.root.join(SCANS_DIR)
    }
}

/// Load `config.json`, falling back to defaults when absent
pub fn load_config(paths: &Paths) -> Result<CliConfig> {
    let path = paths.config_file();
    if !path.exists() {
        return Ok(CliConfig::default());
    }

    let json = fs::read_to_string(&path).context("Failed to read config file")?;
    let config: CliConfig = serde_json::from_str(&json).context("Failed to parse config file")?;
    config.scanner.validate().context("Invalid scanner configuration")?;
    Ok(config)
}

pub fn save_config(paths: &Paths, config: &CliConfig) -> Result<()> {
    fs::create_dir_all(paths.root()).context("Failed to create stealth directory")?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(paths.config_file(), json).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::resolve(Some(dir.path())).unwrap();
        assert_eq!(load_config(&paths).unwrap(), CliConfig::default());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::resolve(Some(dir.path())).unwrap();

        let mut config = CliConfig::default();
        config.rpc_url = "http://localhost:8899".to_string();
        config.scanner.batch_size = 25;
        save_config(&paths, &config).unwrap();

        assert_eq!(load_config(&paths).unwrap(), config);
    }

    #[test]
    fn test_invalid_scanner_config_rejected() {
        let dir = tempdir().unwrap();
        let paths = Paths::resolve(Some(dir.path())).unwrap();
        fs::write(paths.config_file(), r#"{"scanner": {"concurrency": 0}}"#).unwrap();
        assert!(load_config(&paths).is_err());
    }
}
