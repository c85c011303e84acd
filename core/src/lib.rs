//! StealthSol core - stealth payments over Ed25519
//!
//! - [`stealth`]: one-time address derivation and recognition
//! - [`bloom`]: recipient pre-filter hints
//! - [`note`] / [`metadata`]: commitments, note encryption, wire framing
//! - [`scanner`]: incremental, resumable discovery of incoming payments
//! - [`spend`]: spending keys and nullifiers

// op_ref warnings are common with curve25519-dalek ergonomics
#![allow(clippy::op_ref)]

pub mod bloom;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod metadata;
pub mod note;
pub mod payment;
pub mod scanner;
pub mod spend;
pub mod stealth;
pub mod storage;

pub use bloom::{BloomConfig, BloomHint};
pub use config::ScannerConfig;
pub use crypto::SecretBytes;
pub use error::{Result, StealthError};
pub use keys::RecipientKeys;
pub use ledger::{LedgerClient, LedgerOutput, LedgerTransaction, TxRef};
pub use metadata::PaymentMetadata;
pub use note::{EncryptedNote, FieldEncoding, NoteFields};
pub use payment::{build_payment, PaymentPayload};
pub use scanner::{ScanReport, Scanner, ScannerHandle};
pub use spend::{prepare_spend, SpendBundle};
pub use storage::{DiscoveredPayment, JsonFileStore, MemoryStore, ScanProgress, ScanState, ScanStatus, ScanStore};

#[cfg(test)]
mod tests;

#[cfg(test)]
mod test_vectors;
