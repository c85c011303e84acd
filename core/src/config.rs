//! Scanner configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bloom::BloomConfig;
use crate::error::{Result, StealthError};
use crate::note::FieldEncoding;

/// Default checkpoints per batch
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Default number of concurrent fetch + trial-decrypt workers
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default background scan interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Checkpoints covered by one persisted batch
    pub batch_size: u64,
    /// Cap on in-flight candidate workers
    pub concurrency: usize,
    /// Background scan period
    pub interval_secs: u64,
    /// Where the first scan starts when nothing has been scanned yet
    pub start_checkpoint: u64,
    pub bloom: BloomConfig,
    pub field: FieldEncoding,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            interval_secs: DEFAULT_INTERVAL_SECS,
            start_checkpoint: 0,
            bloom: BloomConfig::default(),
            field: FieldEncoding::default(),
        }
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(StealthError::ConfigurationError("batch size must be positive".to_string()));
        }
        if self.concurrency == 0 {
            return Err(StealthError::ConfigurationError("concurrency must be positive".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(StealthError::ConfigurationError("scan interval must be positive".to_string()));
        }
        self.bloom.validate()?;
        self.field.validate()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
