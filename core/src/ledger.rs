//! Ledger client collaborator
//!
//! The scanner needs only three things from the host chain: the current
//! head, the transaction references inside a checkpoint range, and a
//! transaction body by reference. Retries and backoff live behind this trait.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Reference to a transaction on the host ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxRef {
    /// Transaction signature / hash as the ledger renders it
    pub signature: String,
    /// Checkpoint (slot) that includes the transaction
    pub slot: u64,
}

impl TxRef {
    pub fn new(signature: impl Into<String>, slot: u64) -> Self {
        Self {
            signature: signature.into(),
            slot,
        }
    }
}

/// A published commitment together with the free-form data field that
/// carries its payment metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOutput {
    pub commitment: [u8; 32],
    pub data: Vec<u8>,
}

/// Transaction body as far as the scanner cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub reference: TxRef,
    /// Unix timestamp of the including block, when known
    pub block_time: Option<i64>,
    pub outputs: Vec<LedgerOutput>,
}

pub trait LedgerClient: Send + Sync + 'static {
    /// Latest checkpoint the client is willing to serve
    fn chain_head(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Candidate transactions in the inclusive range `[from, to]`
    fn list_transactions(&self, from: u64, to: u64) -> impl Future<Output = Result<Vec<TxRef>>> + Send;

    /// Full body for `reference`; `None` if the ledger no longer has it
    fn fetch_transaction(
        &self,
        reference: &TxRef,
    ) -> impl Future<Output = Result<Option<LedgerTransaction>>> + Send;
}
