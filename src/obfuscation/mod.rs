//! Behavioral obfuscation engine
//!
//! Turns a plain trade intent into a randomized execution plan: uneven
//! amount splits, jittered delays, dust injection, wallet choice and a
//! closed-loop pattern detector that raises variance when we start
//! looking like a bot.

pub mod engine;
pub mod pattern;
pub mod splitting;
pub mod timing;

pub use engine::BehavioralObfuscationEngine;
pub use pattern::PatternDetector;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::gas::GasTier;
use crate::ports::{Address, OperationType};

/// What a strategy module wants executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub token: String,
    pub amount: f64,
    pub op_type: OperationType,
    /// Destination venue, looked up in the countermeasure table
    pub venue: Option<String>,
}

impl TradeIntent {
    pub fn is_entry(&self) -> bool {
        self.op_type == OperationType::Buy
    }

    /// Key used by the pattern detector
    pub fn pattern_key(&self) -> String {
        format!("{}:{}", self.op_type.as_str(), self.token)
    }
}

/// One randomized transaction inside a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTransaction {
    pub amount: f64,
    /// Deliberate delay before this transaction is submitted
    pub delay: Duration,
    /// Dust micro-transactions sit outside the amount-sum invariant
    pub is_dust: bool,
}

/// The ephemeral output of one obfuscation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub transactions: Vec<PlannedTransaction>,
    pub wallet: Address,
    pub gas_tier: GasTier,
    /// Gas bias multiplier from the profile, adjusted by venue jitter;
    /// feeds `SubmitRequest::fee_multiplier` when the plan is executed
    pub gas_multiplier: f64,
    pub slippage_bps: u32,
    /// Nonce-like metadata injected as a venue countermeasure
    pub metadata_salt: Option<String>,
    /// Profile that shaped this plan
    pub profile: String,
}

impl ExecutionPlan {
    /// Sum of real (non-dust) amounts; equals the intent amount exactly
    pub fn total_amount(&self) -> f64 {
        self.transactions
            .iter()
            .filter(|t| !t.is_dust)
            .map(|t| t.amount)
            .sum()
    }

    pub fn split_count(&self) -> usize {
        self.transactions.iter().filter(|t| !t.is_dust).count()
    }
}
