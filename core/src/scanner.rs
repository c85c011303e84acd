//! Incremental payment scanner
//!
//! Walks a checkpoint range batch by batch. Each candidate output goes
//! through the pipeline
//!
//! ```text
//! bloom hint -> DH recognition -> note decryption -> commitment check
//! ```
//!
//! and only survivors become [`DiscoveredPayment`]s. Progress is persisted
//! after every batch so an interrupted scan resumes where it stopped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::bloom::{matches, BloomHint};
use crate::config::ScannerConfig;
use crate::error::{Result, StealthError};
use crate::keys::RecipientKeys;
use crate::ledger::{LedgerClient, LedgerOutput, LedgerTransaction, TxRef};
use crate::metadata::deserialize_metadata;
use crate::note::decrypt_note;
use crate::storage::{DiscoveredPayment, ScanProgress, ScanState, ScanStatus, ScanStore};

/// Domain tag for payment ids
pub const PAYMENT_ID_DOMAIN: &[u8] = b"stealthsol_payment_id_v1";

/// Invoked once per newly discovered payment, after it has been persisted
pub type DiscoveryCallback = Arc<dyn Fn(&DiscoveredPayment) + Send + Sync>;

/// Stable id for the output at `position` inside `reference`
pub fn payment_id(reference: &TxRef, position: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(PAYMENT_ID_DOMAIN);
    hasher.update(reference.signature.as_bytes());
    hasher.update(position.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// What happened to a single candidate output
#[derive(Debug)]
pub enum CandidateOutcome {
    /// Rejected by the bloom hint, no curve work done
    FilteredOut,
    /// Hint matched but the note did not open: a pre-filter false positive
    NotMine,
    /// Note opened but does not match the published commitment
    CommitmentMismatch,
    /// Metadata or key material could not be parsed
    Malformed,
    Discovered(Box<DiscoveredPayment>),
}

/// Run one candidate output through the recognition pipeline
///
/// Every failure is a per-candidate outcome; nothing here aborts a batch.
pub fn recognize_candidate(
    keys: &RecipientKeys,
    config: &ScannerConfig,
    tx: &LedgerTransaction,
    position: u32,
    output: &LedgerOutput,
) -> CandidateOutcome {
    let signature = tx.reference.signature.as_str();

    let metadata = match deserialize_metadata(&output.data) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(signature, position, error = %e, "skipping candidate with malformed metadata");
            return CandidateOutcome::Malformed;
        }
    };

    let hint = match BloomHint::from_wire(&metadata.hint, &config.bloom) {
        Ok(hint) => hint,
        Err(e) => {
            warn!(signature, position, error = %e, "bloom hint does not fit configuration");
            return CandidateOutcome::Malformed;
        }
    };
    if !matches(&keys.public_key, &hint, &config.bloom) {
        return CandidateOutcome::FilteredOut;
    }

    let recognized = match keys.recognize(&metadata.ephemeral_public_key) {
        Ok(recognized) => recognized,
        Err(e) => {
            debug!(signature, position, error = %e, "candidate carries an invalid ephemeral key");
            return CandidateOutcome::Malformed;
        }
    };

    let note = match decrypt_note(
        &metadata.note.ciphertext,
        &metadata.note.nonce,
        &recognized.shared_secret,
    ) {
        Ok(note) => note,
        Err(StealthError::DecryptionFailed) => return CandidateOutcome::NotMine,
        Err(e) => {
            warn!(signature, position, error = %e, "authenticated note could not be decoded");
            return CandidateOutcome::Malformed;
        }
    };

    if note
        .verify_commitment(&recognized.stealth_public_key, &output.commitment, &config.field)
        .is_err()
    {
        warn!(signature, position, "note does not open the published commitment, discarding");
        return CandidateOutcome::CommitmentMismatch;
    }

    CandidateOutcome::Discovered(Box::new(DiscoveredPayment {
        id: payment_id(&tx.reference, position),
        stealth_public_key: recognized.stealth_public_key,
        stealth_private_key: recognized.stealth_private_key,
        shared_secret: recognized.shared_secret,
        ephemeral_public_key: metadata.ephemeral_public_key,
        commitment: output.commitment,
        note,
        tx_ref: tx.reference.clone(),
        position,
        slot: tx.reference.slot,
        block_time: tx.block_time,
        spent: false,
        discovered_at: chrono::Utc::now().timestamp(),
    }))
}

/// Summary of one scan cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub from: u64,
    pub to: u64,
    pub batches: u64,
    pub transactions: u64,
    /// Candidate outputs examined
    pub checked: u64,
    pub filtered_out: u64,
    pub not_mine: u64,
    pub commitment_mismatches: u64,
    pub malformed: u64,
    /// Recognized again but already known
    pub duplicates: u64,
    /// Ids of payments first discovered in this cycle
    pub discovered: Vec<String>,
}

impl ScanReport {
    fn new(from: u64, to: u64) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }
}

struct CandidateRecord {
    reference: TxRef,
    position: u32,
    outcome: CandidateOutcome,
}

fn process_transaction(keys: &RecipientKeys, config: &ScannerConfig, tx: &LedgerTransaction) -> Vec<CandidateRecord> {
    tx.outputs
        .iter()
        .enumerate()
        .map(|(position, output)| {
            let position = position as u32;
            CandidateRecord {
                reference: tx.reference.clone(),
                position,
                outcome: recognize_candidate(keys, config, tx, position, output),
            }
        })
        .collect()
}

/// Clears the in-progress flag when a cycle ends, however it ends
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-identity scanner
pub struct Scanner<L: LedgerClient, S: ScanStore> {
    keys: Arc<RecipientKeys>,
    ledger: Arc<L>,
    store: Arc<S>,
    config: ScannerConfig,
    state: Mutex<ScanState>,
    in_progress: AtomicBool,
    on_discovery: Option<DiscoveryCallback>,
}

impl<L: LedgerClient, S: ScanStore> Scanner<L, S> {
    /// Load persisted state for `keys` and build a scanner over it
    pub fn new(keys: RecipientKeys, ledger: Arc<L>, store: Arc<S>, config: ScannerConfig) -> Result<Self> {
        config.validate()?;

        let identity = keys.identity();
        let mut state = store
            .load(&identity)?
            .unwrap_or_else(|| ScanState::new(identity.clone()));

        // A cycle that died mid-scan left its last completed batch behind
        if state.progress.status == ScanStatus::Scanning {
            warn!(identity = %identity, "previous scan did not finish, resuming from last checkpoint");
            state.progress.status = ScanStatus::Idle;
        }

        info!(
            identity = %identity,
            last_checkpoint = ?state.progress.last_scanned_checkpoint,
            payments = state.payments.len(),
            "scanner ready"
        );

        Ok(Self {
            keys: Arc::new(keys),
            ledger,
            store,
            config,
            state: Mutex::new(state),
            in_progress: AtomicBool::new(false),
            on_discovery: None,
        })
    }

    pub fn with_discovery_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DiscoveredPayment) + Send + Sync + 'static,
    {
        self.on_discovery = Some(Arc::new(callback));
        self
    }

    pub fn identity(&self) -> String {
        self.keys.identity()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn is_scanning(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<ScanGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StealthError::ScanInProgress)?;
        Ok(ScanGuard(&self.in_progress))
    }

    /// Scan the inclusive checkpoint range `[from, to]`
    pub async fn scan_range(&self, from: u64, to: u64) -> Result<ScanReport> {
        let _guard = self.begin()?;
        self.run_cycle(from, to).await
    }

    /// Scan from just past the last persisted checkpoint up to the chain head
    pub async fn scan_incremental(&self) -> Result<ScanReport> {
        let _guard = self.begin()?;

        let head = match self.ledger.chain_head().await {
            Ok(head) => head,
            Err(e) => {
                self.record_failure(&e).await;
                return Err(e);
            }
        };

        let from = {
            let state = self.state.lock().await;
            match state.progress.last_scanned_checkpoint {
                Some(last) => last.saturating_add(1),
                None => self.config.start_checkpoint,
            }
        };

        if from > head {
            debug!(from, head, "already at chain head");
            return Ok(ScanReport::new(from, head));
        }
        self.run_cycle(from, head).await
    }

    async fn run_cycle(&self, from: u64, to: u64) -> Result<ScanReport> {
        let mut report = ScanReport::new(from, to);
        if from > to {
            return Ok(report);
        }

        info!(from, to, "scan started");
        self.state.lock().await.progress.status = ScanStatus::Scanning;

        let mut start = from;
        loop {
            let end = start.saturating_add(self.config.batch_size - 1).min(to);
            if let Err(e) = self.scan_batch(start, end, &mut report).await {
                self.record_failure(&e).await;
                return Err(e);
            }
            if end >= to {
                break;
            }
            start = end + 1;
        }

        self.finish().await?;
        info!(
            from,
            to,
            checked = report.checked,
            discovered = report.discovered.len(),
            "scan finished"
        );
        Ok(report)
    }

    async fn scan_batch(&self, start: u64, end: u64, report: &mut ScanReport) -> Result<()> {
        let references = self.ledger.list_transactions(start, end).await?;
        report.batches += 1;
        report.transactions += references.len() as u64;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut workers = JoinSet::new();
        for reference in references {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| StealthError::Ledger(format!("worker pool closed: {}", e)))?;
            let ledger = Arc::clone(&self.ledger);
            let keys = Arc::clone(&self.keys);
            let config = self.config.clone();

            workers.spawn(async move {
                let _permit = permit;
                let records = match ledger.fetch_transaction(&reference).await? {
                    Some(tx) => process_transaction(&keys, &config, &tx),
                    None => {
                        debug!(signature = %reference.signature, "transaction vanished from ledger");
                        Vec::new()
                    }
                };
                Ok::<_, StealthError>(records)
            });
        }

        let mut records = Vec::new();
        while let Some(joined) = workers.join_next().await {
            let batch = joined.map_err(|e| StealthError::Ledger(format!("scan worker failed: {}", e)))?;
            records.extend(batch?);
        }
        records.sort_by(|a, b| {
            (a.reference.slot, &a.reference.signature, a.position)
                .cmp(&(b.reference.slot, &b.reference.signature, b.position))
        });

        self.commit_batch(start, end, records, report).await
    }

    /// Fold a batch into the state, persist, then publish
    ///
    /// The checkpoint only moves when the batch continues from it. A range
    /// scanned past a gap keeps its payments but leaves the gap for the
    /// next incremental cycle.
    async fn commit_batch(&self, start: u64, end: u64, records: Vec<CandidateRecord>, report: &mut ScanReport) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let mut fresh = Vec::new();
        let batch_checked = records.len() as u64;

        for record in records {
            report.checked += 1;
            match record.outcome {
                CandidateOutcome::FilteredOut => report.filtered_out += 1,
                CandidateOutcome::NotMine => report.not_mine += 1,
                CandidateOutcome::CommitmentMismatch => report.commitment_mismatches += 1,
                CandidateOutcome::Malformed => report.malformed += 1,
                CandidateOutcome::Discovered(payment) => {
                    if next.payments.contains_key(&payment.id) {
                        debug!(id = %payment.id, "payment already known");
                        report.duplicates += 1;
                        continue;
                    }
                    info!(
                        id = %payment.id,
                        signature = %record.reference.signature,
                        amount = payment.note.amount,
                        asset = %payment.note.asset_id,
                        "discovered payment"
                    );
                    fresh.push(payment.as_ref().clone());
                    next.payments.insert(payment.id.clone(), *payment);
                }
            }
        }

        next.progress.total_checked += batch_checked;
        next.progress.total_discovered += fresh.len() as u64;
        let contiguous = match next.progress.last_scanned_checkpoint {
            Some(last) => start <= last.saturating_add(1),
            None => start <= self.config.start_checkpoint,
        };
        if contiguous {
            next.progress.last_scanned_checkpoint = Some(
                next.progress
                    .last_scanned_checkpoint
                    .map_or(end, |last| last.max(end)),
            );
        } else {
            debug!(start, end, "batch is past unscanned checkpoints, progress unchanged");
        }
        next.progress.last_scan_time = Some(chrono::Utc::now().timestamp());
        next.progress.status = ScanStatus::Scanning;

        self.store.save(&next)?;
        *state = next;
        drop(state);

        debug!(end, new = fresh.len(), "batch persisted");
        for payment in &fresh {
            report.discovered.push(payment.id.clone());
            if let Some(callback) = &self.on_discovery {
                callback(payment);
            }
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.progress.status = ScanStatus::Idle;
        self.store.save(&next)?;
        *state = next;
        Ok(())
    }

    /// Flag the cycle as failed; persisted progress stays as last written
    async fn record_failure(&self, error: &StealthError) {
        warn!(error = %error, "scan cycle aborted");
        let mut state = self.state.lock().await;
        state.progress.status = ScanStatus::Error;
        if let Err(e) = self.store.save(&state) {
            warn!(error = %e, "could not persist scan error status");
        }
    }

    /// Forget the scanned checkpoint so the next cycle rescans from the
    /// configured start. Discovered payments are kept.
    pub async fn reset_progress(&self) -> Result<()> {
        let _guard = self.begin()?;
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.progress = ScanProgress {
            total_discovered: next.payments.len() as u64,
            ..ScanProgress::default()
        };
        self.store.save(&next)?;
        *state = next;
        info!("scan progress reset");
        Ok(())
    }

    /// Flag a payment as spent. Payments are never removed.
    pub async fn mark_spent(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .get(id)
            .ok_or_else(|| StealthError::UnknownPayment(id.to_string()))?;
        if payment.spent {
            return Err(StealthError::AlreadySpent(id.to_string()));
        }

        let mut next = state.clone();
        if let Some(payment) = next.payments.get_mut(id) {
            payment.spent = true;
        }
        self.store.save(&next)?;
        *state = next;
        info!(id, "payment marked spent");
        Ok(())
    }

    pub async fn progress(&self) -> ScanProgress {
        self.state.lock().await.progress.clone()
    }

    pub async fn payment(&self, id: &str) -> Option<DiscoveredPayment> {
        self.state.lock().await.payments.get(id).cloned()
    }

    /// All discovered payments, oldest first
    pub async fn payments(&self) -> Vec<DiscoveredPayment> {
        let state = self.state.lock().await;
        let mut payments: Vec<_> = state.payments.values().cloned().collect();
        payments.sort_by(|a, b| (a.slot, &a.tx_ref.signature, a.position).cmp(&(b.slot, &b.tx_ref.signature, b.position)));
        payments
    }

    pub async fn unspent_payments(&self) -> Vec<DiscoveredPayment> {
        self.payments().await.into_iter().filter(|p| !p.spent).collect()
    }

    /// Unspent totals per asset id
    pub async fn balances(&self) -> BTreeMap<String, u64> {
        let state = self.state.lock().await;
        let mut balances = BTreeMap::new();
        for payment in state.payments.values().filter(|p| !p.spent) {
            let total = balances.entry(payment.note.asset_id.clone()).or_insert(0u64);
            *total = total.saturating_add(payment.note.amount);
        }
        balances
    }

    /// Spawn the periodic background scan
    ///
    /// The first cycle runs immediately. Ticks that fire while a cycle is
    /// still running are skipped rather than queued.
    pub fn start(self: Arc<Self>) -> ScannerHandle {
        let scanner = self;
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scanner.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = scanner.config.interval_secs, "background scanner started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                if *stop_rx.borrow() {
                    break;
                }

                match scanner.scan_incremental().await {
                    Ok(report) if !report.discovered.is_empty() => {
                        info!(discovered = report.discovered.len(), "background scan found payments")
                    }
                    Ok(_) => {}
                    Err(StealthError::ScanInProgress) => debug!("scan still running, skipping tick"),
                    Err(e) => warn!(error = %e, "background scan failed"),
                }
            }
            info!("background scanner stopped");
        });

        ScannerHandle { stop_tx, task }
    }
}

/// Owned handle to a running background scan
pub struct ScannerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Ask the loop to stop and wait for it. A cycle already running
    /// finishes first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "background scanner task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
