//! Pending-transaction state and history records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::gas::GasTier;
use crate::ports::{Address, FeeParams, TxHash};

/// Per-transaction state machine
///
/// `Submitted` is the only live state after broadcast; everything in the
/// right column is terminal. `Replaced` is terminal for the old record but
/// the replacement carries the same nonce forward under a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Building,
    Submitted,
    Confirmed,
    Failed,
    TimedOut,
    Replaced,
    Cancelled,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Building | TxStatus::Submitted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Building => "building",
            TxStatus::Submitted => "submitted",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
            TxStatus::TimedOut => "timed_out",
            TxStatus::Replaced => "replaced",
            TxStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller hands to `submit`
///
/// Fee and gas limit are optional: an unpinned fee is priced from the
/// oracle at the requested tier, and a missing gas limit is estimated
/// against the node.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub gas_limit: Option<u64>,
    pub fee: Option<FeeParams>,
    pub gas_tier: GasTier,
    /// Gas bias from an execution plan, applied when the fee is priced
    /// from the oracle. 1.0 leaves the tier price untouched.
    pub fee_multiplier: f64,
}

/// A transaction between broadcast and a terminal state
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    /// Internal id assigned before the hash is known
    pub correlation_id: Uuid,
    pub tx_hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub fee: FeeParams,
    pub submitted_at: DateTime<Utc>,
    pub status: TxStatus,
    pub confirmations: u64,
    /// Correlation id of the record this one replaced
    pub replaces: Option<Uuid>,
    /// Hash of the replacement, once a cancel/speed-up has superseded this
    pub replaced_by: Option<TxHash>,
}

impl PendingTransaction {
    /// Age since broadcast, in whole seconds
    pub fn age_secs(&self) -> u64 {
        (Utc::now() - self.submitted_at).num_seconds().max(0) as u64
    }
}

/// Immutable history entry kept after a transaction reaches a terminal
/// state; only the confirmation count may still be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub correlation_id: Uuid,
    pub tx_hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub nonce: u64,
    pub fee: FeeParams,
    pub status: TxStatus,
    pub confirmations: u64,
    pub submitted_at: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
    pub replaced_by: Option<TxHash>,
}

impl TransactionRecord {
    pub fn from_pending(tx: &PendingTransaction) -> Self {
        Self {
            correlation_id: tx.correlation_id,
            tx_hash: tx.tx_hash.clone(),
            from: tx.from.clone(),
            to: tx.to.clone(),
            value: tx.value,
            nonce: tx.nonce,
            fee: tx.fee,
            status: tx.status,
            confirmations: tx.confirmations,
            submitted_at: tx.submitted_at,
            finalized_at: Utc::now(),
            replaced_by: tx.replaced_by.clone(),
        }
    }
}
