//! Persisted scan state
//!
//! One versioned record per recipient identity holding the scan progress
//! and every payment ever discovered. Payments are flagged as spent, never
//! removed, so a rescan cannot rediscover them.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::SecretBytes;
use crate::error::{Result, StealthError};
use crate::ledger::TxRef;
use crate::note::NoteFields;

/// Record layout version
pub const SCAN_STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Idle,
    Scanning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Last checkpoint whose batch was fully processed and persisted
    pub last_scanned_checkpoint: Option<u64>,
    pub total_checked: u64,
    pub total_discovered: u64,
    /// Unix seconds of the last completed batch
    pub last_scan_time: Option<i64>,
    pub status: ScanStatus,
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self {
            last_scanned_checkpoint: None,
            total_checked: 0,
            total_discovered: 0,
            last_scan_time: None,
            status: ScanStatus::Idle,
        }
    }
}

/// A payment recognized, decrypted and commitment-checked by the scanner
///
/// `stealth_private_key` spends the output; callers zero any copies they
/// make of it.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoveredPayment {
    pub id: String,
    #[serde(with = "hex")]
    pub stealth_public_key: [u8; 32],
    pub stealth_private_key: SecretBytes,
    pub shared_secret: SecretBytes,
    #[serde(with = "hex")]
    pub ephemeral_public_key: [u8; 32],
    /// On-chain commitment the note opens
    #[serde(with = "hex")]
    pub commitment: [u8; 32],
    pub note: NoteFields,
    pub tx_ref: TxRef,
    /// Output index inside the transaction
    pub position: u32,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub spent: bool,
    /// Unix seconds
    pub discovered_at: i64,
}

impl Clone for DiscoveredPayment {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            stealth_public_key: self.stealth_public_key,
            stealth_private_key: self.stealth_private_key.duplicate(),
            shared_secret: self.shared_secret.duplicate(),
            ephemeral_public_key: self.ephemeral_public_key,
            commitment: self.commitment,
            note: self.note.clone(),
            tx_ref: self.tx_ref.clone(),
            position: self.position,
            slot: self.slot,
            block_time: self.block_time,
            spent: self.spent,
            discovered_at: self.discovered_at,
        }
    }
}

/// Complete per-identity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanState {
    pub version: u32,
    pub identity: String,
    pub progress: ScanProgress,
    pub payments: BTreeMap<String, DiscoveredPayment>,
}

impl ScanState {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            version: SCAN_STATE_VERSION,
            identity: identity.into(),
            progress: ScanProgress::default(),
            payments: BTreeMap::new(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| StealthError::StorageError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let state: ScanState =
            serde_json::from_slice(bytes).map_err(|e| StealthError::StorageError(e.to_string()))?;
        if state.version != SCAN_STATE_VERSION {
            return Err(StealthError::StorageError(format!(
                "unsupported scan state version: {}",
                state.version
            )));
        }
        Ok(state)
    }
}

/// Storage collaborator for scan state
pub trait ScanStore: Send + Sync + 'static {
    /// Load the record for `identity`, `None` if never saved
    fn load(&self, identity: &str) -> Result<Option<ScanState>>;

    /// Replace the record for `state.identity`
    fn save(&self, state: &ScanState) -> Result<()>;
}

/// In-memory backend. Keeps serialized records so reloads see exactly what
/// was written.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unwrap_poison<T>(lock: std::sync::LockResult<T>) -> T {
    match lock {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ScanStore for MemoryStore {
    fn load(&self, identity: &str) -> Result<Option<ScanState>> {
        let records = unwrap_poison(self.records.lock());
        records.get(identity).map(|bytes| ScanState::from_bytes(bytes)).transpose()
    }

    fn save(&self, state: &ScanState) -> Result<()> {
        let bytes = state.to_bytes()?;
        unwrap_poison(self.records.lock()).insert(state.identity.clone(), bytes);
        Ok(())
    }
}

/// New file readable by the owner only from the moment it exists. Scan
/// state contains spending keys.
fn create_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Disk-backed JSON storage, one file per identity, atomic writes
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("scan-{}.json", identity))
    }
}

impl ScanStore for JsonFileStore {
    fn load(&self, identity: &str) -> Result<Option<ScanState>> {
        let path = self.path_for(identity);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        ScanState::from_bytes(&bytes).map(Some)
    }

    fn save(&self, state: &ScanState) -> Result<()> {
        let path = self.path_for(&state.identity);
        let bytes = state.to_bytes()?;

        let tmp_path = path.with_extension("tmp");
        match fs::remove_file(&tmp_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        {
            let mut file = create_private(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;
        debug!(path = %path.display(), "persisted scan state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::FieldEncoding;
    use tempfile::tempdir;

    fn sample_payment(id: &str) -> DiscoveredPayment {
        DiscoveredPayment {
            id: id.to_string(),
            stealth_public_key: [1u8; 32],
            stealth_private_key: SecretBytes::new([2u8; 32]),
            shared_secret: SecretBytes::new([3u8; 32]),
            ephemeral_public_key: [4u8; 32],
            commitment: [5u8; 32],
            note: NoteFields::new(&[1u8; 32], 10, "SOL", &FieldEncoding::default()),
            tx_ref: TxRef::new("sig", 7),
            position: 0,
            slot: 7,
            block_time: Some(1_700_000_000),
            spent: false,
            discovered_at: 1_700_000_100,
        }
    }

    fn sample_state() -> ScanState {
        let mut state = ScanState::new("alice");
        state.progress.last_scanned_checkpoint = Some(42);
        state.progress.total_checked = 3;
        state.progress.total_discovered = 1;
        state.payments.insert("p1".to_string(), sample_payment("p1"));
        state
    }

    fn assert_same(a: &ScanState, b: &ScanState) {
        assert_eq!(a.identity, b.identity);
        assert_eq!(a.progress, b.progress);
        assert_eq!(a.payments.len(), b.payments.len());
        let (pa, pb) = (&a.payments["p1"], &b.payments["p1"]);
        assert!(pa.stealth_private_key.ct_eq(&pb.stealth_private_key));
        assert_eq!(pa.note, pb.note);
        assert_eq!(pa.tx_ref, pb.tx_ref);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load("alice").unwrap().is_none());

        let state = sample_state();
        store.save(&state).unwrap();
        assert_same(&state, &store.load("alice").unwrap().unwrap());

        // Identities do not share progress
        assert!(store.load("bob").unwrap().is_none());
    }

    #[test]
    fn test_json_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        let state = sample_state();
        store.save(&state).unwrap();

        // A second store over the same directory sees the same record
        let reopened = JsonFileStore::new(dir.path()).unwrap();
        assert_same(&state, &reopened.load("alice").unwrap().unwrap());
        assert!(!store.path_for("alice").with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_state_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        let mut state = ScanState::new("carol");
        state.payments.insert("p1".to_string(), sample_payment("p1"));

        // A stale temp file left with loose permissions is not reused
        let path = store.path_for("carol");
        let stale = path.with_extension("tmp");
        fs::write(&stale, b"stale").unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&state).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(!stale.exists());
        assert_eq!(store.load("carol").unwrap().unwrap().payments.len(), 1);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut state = sample_state();
        state.version = 99;
        let bytes = serde_json::to_vec(&state).unwrap();
        assert!(matches!(ScanState::from_bytes(&bytes), Err(StealthError::StorageError(_))));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        fs::write(store.path_for("alice"), b"{not json").unwrap();
        assert!(store.load("alice").is_err());
    }
}
