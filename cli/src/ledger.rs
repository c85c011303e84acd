//! Solana RPC ledger client
//!
//! Payments are announced with Memo program instructions. Each memo carries
//! one output:
//!
//! +------------+------------------+--------------------+
//! | 0..4       | 4..36            | 36..               |
//! +------------+------------------+--------------------+
//! | magic SSOL | commitment       | metadata frame     |
//! +------------+------------------+--------------------+
//!
//! base64 encoded into the memo text.

use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcBlockConfig, RpcTransactionConfig};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_transaction_status::{
    EncodedTransaction, TransactionDetails, UiCompiledInstruction, UiMessage, UiTransactionEncoding,
};
use stealth_core::error::{Result, StealthError};
use stealth_core::{LedgerClient, LedgerOutput, LedgerTransaction, TxRef};
use tracing::{debug, warn};

/// Prefix identifying stealth payment memos. Do not change without a
/// migration plan.
pub const MEMO_MAGIC: &[u8; 4] = b"SSOL";

/// Memo program v2 and v1
const MEMO_PROGRAM_IDS: [&str; 2] = [
    "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr",
    "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo",
];

/// Memo text announcing `commitment` with its framed metadata
pub fn encode_memo(commitment: &[u8; 32], metadata: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(MEMO_MAGIC.len() + 32 + metadata.len());
    bytes.extend_from_slice(MEMO_MAGIC);
    bytes.extend_from_slice(commitment);
    bytes.extend_from_slice(metadata);
    general_purpose::STANDARD.encode(bytes)
}

/// Inverse of `encode_memo`. `None` for memos that are not ours.
pub fn decode_memo(text: &[u8]) -> Option<LedgerOutput> {
    let bytes = general_purpose::STANDARD.decode(text).ok()?;
    let rest = bytes.strip_prefix(MEMO_MAGIC.as_slice())?;
    if rest.len() < 32 {
        return None;
    }
    let (commitment, data) = rest.split_at(32);

    let mut out = [0u8; 32];
    out.copy_from_slice(commitment);
    Some(LedgerOutput {
        commitment: out,
        data: data.to_vec(),
    })
}

fn is_memo_program(account_keys: &[String], instruction: &UiCompiledInstruction) -> bool {
    account_keys
        .get(instruction.program_id_index as usize)
        .map_or(false, |key| MEMO_PROGRAM_IDS.contains(&key.as_str()))
}

/// Stealth outputs from the memo instructions of a raw message, in order
pub fn extract_outputs(message: &UiMessage) -> Vec<LedgerOutput> {
    let raw = match message {
        UiMessage::Raw(raw) => raw,
        UiMessage::Parsed(_) => return Vec::new(),
    };

    raw.instructions
        .iter()
        .filter(|ix| is_memo_program(&raw.account_keys, ix))
        .filter_map(|ix| bs58::decode(&ix.data).into_vec().ok())
        .filter_map(|memo| decode_memo(&memo))
        .collect()
}

fn rpc_error(err: impl std::fmt::Display) -> StealthError {
    StealthError::Ledger(err.to_string())
}

pub struct SolanaLedger {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaLedger {
    pub fn new(rpc_url: &str) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

impl LedgerClient for SolanaLedger {
    async fn chain_head(&self) -> Result<u64> {
        self.client.get_slot().await.map_err(rpc_error)
    }

    async fn list_transactions(&self, from: u64, to: u64) -> Result<Vec<TxRef>> {
        let slots = self
            .client
            .get_blocks_with_commitment(from, Some(to), self.commitment)
            .await
            .map_err(rpc_error)?;

        let mut references = Vec::new();
        for slot in slots {
            let config = RpcBlockConfig {
                encoding: Some(UiTransactionEncoding::Json),
                transaction_details: Some(TransactionDetails::Signatures),
                rewards: Some(false),
                commitment: Some(self.commitment),
                max_supported_transaction_version: Some(0),
            };
            let block = self
                .client
                .get_block_with_config(slot, config)
                .await
                .map_err(rpc_error)?;

            let signatures = block.signatures.unwrap_or_default();
            debug!(slot, transactions = signatures.len(), "listed block");
            references.extend(signatures.into_iter().map(|signature| TxRef::new(signature, slot)));
        }
        Ok(references)
    }

    async fn fetch_transaction(&self, reference: &TxRef) -> Result<Option<LedgerTransaction>> {
        let signature = Signature::from_str(&reference.signature).map_err(rpc_error)?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };

        let tx = self
            .client
            .get_transaction_with_config(&signature, config)
            .await
            .map_err(rpc_error)?;

        if let Some(meta) = &tx.transaction.meta {
            if meta.err.is_some() {
                return Ok(None);
            }
        }

        let outputs = match &tx.transaction.transaction {
            EncodedTransaction::Json(ui_tx) => extract_outputs(&ui_tx.message),
            _ => {
                warn!(signature = %reference.signature, "unexpected transaction encoding");
                Vec::new()
            }
        };

        Ok(Some(LedgerTransaction {
            reference: reference.clone(),
            block_time: tx.block_time,
            outputs,
        }))
    }
}
