//! The transaction lifecycle manager
//!
//! State machine per transaction: building -> submitted -> one of
//! confirmed / failed / timed_out / replaced / cancelled. Replacement
//! (cancel or speed-up) reuses the nonce with a strictly higher fee and
//! links the old record to the new hash.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::LifecycleConfig;
use crate::error::{Error, Result};
use crate::gas::GasPriceOracle;
use crate::lifecycle::nonce::NonceTracker;
use crate::lifecycle::types::{PendingTransaction, SubmitRequest, TransactionRecord, TxStatus};
use crate::ports::{Address, ChainRpc, FeeParams, Receipt, TxHash, TxSigner, UnsignedTx};

enum ReplaceMode {
    Cancel,
    SpeedUp,
}

pub struct TransactionLifecycleManager {
    config: LifecycleConfig,
    chain_id: u64,
    rpc: Arc<dyn ChainRpc>,
    signer: Arc<dyn TxSigner>,
    oracle: Arc<GasPriceOracle>,
    nonces: NonceTracker,
    pending: RwLock<HashMap<TxHash, PendingTransaction>>,
    history: RwLock<Vec<TransactionRecord>>,
    /// Live transactions per wallet, reserved before broadcast
    slots: DashMap<Address, usize>,
}

impl TransactionLifecycleManager {
    pub fn new(
        config: LifecycleConfig,
        chain_id: u64,
        rpc: Arc<dyn ChainRpc>,
        signer: Arc<dyn TxSigner>,
        oracle: Arc<GasPriceOracle>,
    ) -> Self {
        Self {
            config,
            chain_id,
            rpc: rpc.clone(),
            signer,
            oracle,
            nonces: NonceTracker::new(rpc),
            pending: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            slots: DashMap::new(),
        }
    }

    /// Build, sign and broadcast a transaction.
    ///
    /// Fails fast with `TooManyPending` when the sender already has the
    /// configured number of live transactions outstanding. The slot is
    /// taken before any network work so concurrent submissions cannot
    /// slip past the limit together; a reserved nonce is returned to the
    /// counter if signing or broadcast fails.
    pub async fn submit(&self, request: SubmitRequest) -> Result<(Uuid, TxHash)> {
        if request.fee_multiplier <= 0.0 {
            return Err(Error::Config(format!(
                "fee_multiplier must be positive, got {}",
                request.fee_multiplier
            )));
        }
        self.reserve_slot(&request.from)?;
        let wallet = request.from.clone();
        let result = self.submit_reserved(request).await;
        if result.is_err() {
            self.release_slot(&wallet);
        }
        result
    }

    async fn submit_reserved(&self, request: SubmitRequest) -> Result<(Uuid, TxHash)> {
        let fee = match request.fee {
            Some(fee) => fee,
            // Oracle-priced fees carry the plan's gas bias
            None => FeeParams::Legacy {
                gas_price: self.oracle.tier_price(request.gas_tier).await?,
            }
            .scaled(request.fee_multiplier),
        };

        let nonce = self.nonces.next(&request.from).await?;

        let mut unsigned = UnsignedTx {
            from: request.from.clone(),
            to: request.to.clone(),
            value: request.value,
            data: request.data.clone(),
            nonce,
            gas_limit: request.gas_limit.unwrap_or(0),
            fee,
            chain_id: self.chain_id,
        };
        if request.gas_limit.is_none() {
            unsigned.gas_limit = match self.rpc.estimate_gas(&unsigned).await {
                Ok(limit) => limit,
                Err(e) => {
                    warn!(error = %e, "Gas estimation failed, using fallback limit");
                    self.config.fallback_gas_limit
                }
            };
        }

        match self.sign_and_send(&unsigned).await {
            Ok(tx_hash) => {
                let correlation_id = Uuid::new_v4();
                let record = PendingTransaction {
                    correlation_id,
                    tx_hash: tx_hash.clone(),
                    from: request.from,
                    to: request.to,
                    value: request.value,
                    data: request.data,
                    nonce,
                    gas_limit: unsigned.gas_limit,
                    fee,
                    submitted_at: Utc::now(),
                    status: TxStatus::Submitted,
                    confirmations: 0,
                    replaces: None,
                    replaced_by: None,
                };
                info!(
                    tx = %tx_hash.short(),
                    wallet = %record.from.short(),
                    nonce,
                    fee_cap = fee.cap(),
                    "Transaction submitted"
                );
                self.pending.write().await.insert(tx_hash.clone(), record);
                Ok((correlation_id, tx_hash))
            }
            Err(e) => {
                self.nonces.unreserve(&request.from, nonce);
                Err(e)
            }
        }
    }

    /// Take one outstanding slot for the wallet, or fail with
    /// `TooManyPending`. The entry lock makes check and reserve a single
    /// step. A slot is held until its transaction reaches a terminal
    /// state; a replacement inherits the slot of the record it supersedes.
    fn reserve_slot(&self, wallet: &Address) -> Result<()> {
        let mut slot = self.slots.entry(wallet.clone()).or_insert(0);
        if *slot >= self.config.max_pending_per_wallet {
            return Err(Error::TooManyPending {
                wallet: wallet.to_string(),
                pending: *slot,
                max: self.config.max_pending_per_wallet,
            });
        }
        *slot += 1;
        Ok(())
    }

    fn release_slot(&self, wallet: &Address) {
        if let Some(mut slot) = self.slots.get_mut(wallet) {
            *slot = slot.saturating_sub(1);
        }
    }

    async fn sign_and_send(&self, unsigned: &UnsignedTx) -> Result<TxHash> {
        let signed = self.signer.sign(unsigned).await?;
        self.rpc.send_raw_transaction(&signed).await
    }

    /// Poll for a receipt until `timeout` elapses.
    ///
    /// On a mined receipt the transaction still needs `min_confirmations`
    /// blocks on top before it is marked confirmed. A timeout leaves the
    /// record submitted so the caller can speed it up or cancel it.
    pub async fn await_receipt(&self, tx_hash: &TxHash, timeout: Duration) -> Result<Receipt> {
        let poll_interval = Duration::from_millis(self.config.receipt_poll_interval_ms);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(receipt) = self.rpc.get_receipt(tx_hash).await? {
                let confirmations = self.confirmations_for(&receipt).await;
                self.note_confirmations(tx_hash, confirmations).await;

                if confirmations >= self.config.min_confirmations {
                    let status = if receipt.status {
                        TxStatus::Confirmed
                    } else {
                        TxStatus::Failed
                    };
                    self.finalize(tx_hash, status).await;
                    debug!(tx = %tx_hash.short(), confirmations, status = %status, "Receipt settled");
                    return Ok(receipt);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Replace a submitted transaction with a zero-value self-send at the
    /// same nonce and a bumped fee. Calling cancel again on an already
    /// cancelled hash returns the existing replacement.
    pub async fn cancel(&self, tx_hash: &TxHash) -> Result<TxHash> {
        self.replace(tx_hash, ReplaceMode::Cancel).await
    }

    /// Resend the original payload at the same nonce with a bumped fee.
    pub async fn speed_up(&self, tx_hash: &TxHash) -> Result<TxHash> {
        self.replace(tx_hash, ReplaceMode::SpeedUp).await
    }

    async fn replace(&self, tx_hash: &TxHash, mode: ReplaceMode) -> Result<TxHash> {
        let original = {
            let pending = self.pending.read().await;
            match pending.get(tx_hash) {
                Some(tx) => tx.clone(),
                None => return self.replacement_from_history(tx_hash).await,
            }
        };

        match original.status {
            TxStatus::Submitted => {}
            TxStatus::Cancelled | TxStatus::Replaced => {
                // Idempotent second call: hand back the existing replacement
                if let Some(replacement) = original.replaced_by {
                    return Ok(replacement);
                }
                return Err(Error::NotReplaceable {
                    tx_hash: tx_hash.to_string(),
                    status: original.status.to_string(),
                });
            }
            other => {
                return Err(Error::NotReplaceable {
                    tx_hash: tx_hash.to_string(),
                    status: other.to_string(),
                })
            }
        }

        let bumped = original.fee.bumped(self.config.replacement_bump_pct);
        let (to, value, data, gas_limit, original_status) = match mode {
            // A cancel burns the nonce with a zero-value send to self
            ReplaceMode::Cancel => (
                original.from.clone(),
                0u128,
                Vec::new(),
                21_000u64,
                TxStatus::Cancelled,
            ),
            ReplaceMode::SpeedUp => (
                original.to.clone(),
                original.value,
                original.data.clone(),
                original.gas_limit,
                TxStatus::Replaced,
            ),
        };

        let unsigned = UnsignedTx {
            from: original.from.clone(),
            to,
            value,
            data,
            nonce: original.nonce,
            gas_limit,
            fee: bumped,
            chain_id: self.chain_id,
        };
        let new_hash = self.sign_and_send(&unsigned).await?;

        let replacement = PendingTransaction {
            correlation_id: Uuid::new_v4(),
            tx_hash: new_hash.clone(),
            from: unsigned.from,
            to: unsigned.to,
            value: unsigned.value,
            data: unsigned.data,
            nonce: unsigned.nonce,
            gas_limit: unsigned.gas_limit,
            fee: bumped,
            submitted_at: Utc::now(),
            status: TxStatus::Submitted,
            confirmations: 0,
            replaces: Some(original.correlation_id),
            replaced_by: None,
        };

        {
            // The replacement takes over the original's nonce and slot,
            // so no slot is released here.
            let mut pending = self.pending.write().await;
            if let Some(old) = pending.get_mut(tx_hash) {
                old.status = original_status;
                old.replaced_by = Some(new_hash.clone());
            }
            pending.insert(new_hash.clone(), replacement);
        }

        info!(
            old = %tx_hash.short(),
            new = %new_hash.short(),
            nonce = original.nonce,
            fee_cap = bumped.cap(),
            outcome = %original_status,
            "Transaction replaced"
        );
        Ok(new_hash)
    }

    /// Idempotence across the history boundary: a cancelled record the
    /// monitor already swept still answers with its replacement hash.
    async fn replacement_from_history(&self, tx_hash: &TxHash) -> Result<TxHash> {
        let history = self.history.read().await;
        match history.iter().rev().find(|r| &r.tx_hash == tx_hash) {
            Some(record) => match &record.replaced_by {
                Some(replacement) => Ok(replacement.clone()),
                None => Err(Error::NotReplaceable {
                    tx_hash: tx_hash.to_string(),
                    status: record.status.to_string(),
                }),
            },
            None => Err(Error::TransactionNotFound(tx_hash.to_string())),
        }
    }

    /// Background monitor: scans submitted records each tick, settling the
    /// ones with enough confirmations and timing out the abandoned ones.
    pub fn spawn_monitor(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(manager.config.monitor_interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("Transaction monitor started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Transaction monitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        manager.monitor_tick().await;
                    }
                }
            }
        })
    }

    async fn monitor_tick(&self) {
        let submitted: Vec<TxHash> = {
            let pending = self.pending.read().await;
            pending
                .values()
                .filter(|tx| tx.status == TxStatus::Submitted)
                .map(|tx| tx.tx_hash.clone())
                .collect()
        };

        for tx_hash in submitted {
            if let Err(e) = self.check_one(&tx_hash).await {
                error!(tx = %tx_hash.short(), error = %e, "Monitor check failed");
            }
        }

        self.sweep_terminal().await;
    }

    async fn check_one(&self, tx_hash: &TxHash) -> Result<()> {
        if let Some(receipt) = self.rpc.get_receipt(tx_hash).await? {
            let confirmations = self.confirmations_for(&receipt).await;
            self.note_confirmations(tx_hash, confirmations).await;
            if confirmations >= self.config.min_confirmations {
                let status = if receipt.status {
                    TxStatus::Confirmed
                } else {
                    TxStatus::Failed
                };
                self.finalize(tx_hash, status).await;
            }
            return Ok(());
        }

        let timed_out = {
            let pending = self.pending.read().await;
            pending
                .get(tx_hash)
                .map(|tx| tx.age_secs() > self.config.tx_timeout_secs)
                .unwrap_or(false)
        };
        if timed_out {
            warn!(tx = %tx_hash.short(), "Transaction timed out without a receipt");
            self.finalize(tx_hash, TxStatus::TimedOut).await;
        }
        Ok(())
    }

    /// Blocks mined on top of the receipt's block. The receipt block
    /// itself does not count toward `min_confirmations`.
    async fn confirmations_for(&self, receipt: &Receipt) -> u64 {
        match self.rpc.block_number().await {
            Ok(head) => head.saturating_sub(receipt.block_number),
            Err(e) => {
                debug!(error = %e, "Head read failed, assuming no blocks on top yet");
                0
            }
        }
    }

    async fn note_confirmations(&self, tx_hash: &TxHash, confirmations: u64) {
        let mut pending = self.pending.write().await;
        if let Some(tx) = pending.get_mut(tx_hash) {
            tx.confirmations = confirmations;
        }
    }

    async fn finalize(&self, tx_hash: &TxHash, status: TxStatus) {
        let settled_wallet = {
            let mut pending = self.pending.write().await;
            match pending.get_mut(tx_hash) {
                Some(tx) if !tx.status.is_terminal() => {
                    tx.status = status;
                    Some(tx.from.clone())
                }
                _ => None,
            }
        };
        if let Some(wallet) = settled_wallet {
            self.release_slot(&wallet);
        }
    }

    /// Move terminal records out of the pending table into history.
    async fn sweep_terminal(&self) {
        let mut swept: Vec<TransactionRecord> = {
            let mut pending = self.pending.write().await;
            let keys: Vec<TxHash> = pending
                .iter()
                .filter(|(_, tx)| tx.status.is_terminal())
                .map(|(hash, _)| hash.clone())
                .collect();
            keys.iter()
                .filter_map(|hash| pending.remove(hash))
                .map(|tx| TransactionRecord::from_pending(&tx))
                .collect()
        };
        if swept.is_empty() {
            return;
        }
        swept.sort_by_key(|r| r.submitted_at);

        let mut history = self.history.write().await;
        history.extend(swept);
        let excess = history.len().saturating_sub(self.config.history_limit);
        if excess > 0 {
            history.drain(..excess);
        }
    }

    pub async fn pending_count(&self, wallet: &Address) -> usize {
        self.pending
            .read()
            .await
            .values()
            .filter(|tx| &tx.from == wallet && !tx.status.is_terminal())
            .count()
    }

    pub async fn pending_transaction(&self, tx_hash: &TxHash) -> Option<PendingTransaction> {
        self.pending.read().await.get(tx_hash).cloned()
    }

    pub async fn history(&self) -> Vec<TransactionRecord> {
        self.history.read().await.clone()
    }
}
