//! Wallet registry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::Address;

pub const REPUTATION_MAX: f64 = 100.0;
pub const REPUTATION_MIN: f64 = 0.0;

// Reputation deltas per outcome
pub const REPUTATION_SUCCESS_GAIN: f64 = 1.0;
pub const REPUTATION_FAILURE_LOSS: f64 = 10.0;
pub const REPUTATION_VENUE_FLAG_LOSS: f64 = 15.0;

/// Rotation lifecycle of a signing wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationState {
    Active,
    CoolingDown { until: DateTime<Utc> },
}

/// Per-wallet reputation and usage bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: Address,

    /// 0-100, decays on failure or venue flag, recovers slowly on success
    pub reputation: f64,

    /// Transactions since the last rotation
    pub tx_count: u64,

    /// Traded volume since the last rotation
    pub volume: f64,

    pub first_used: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,

    /// When this wallet last became the active selection
    pub activated_at: DateTime<Utc>,

    pub state: RotationState,
}

impl WalletInfo {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            reputation: REPUTATION_MAX,
            tx_count: 0,
            volume: 0.0,
            first_used: None,
            last_used: None,
            activated_at: Utc::now(),
            state: RotationState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RotationState::Active)
    }

    /// Clears usage counters when a cooldown elapses
    pub fn reset_usage(&mut self) {
        self.tx_count = 0;
        self.volume = 0.0;
        self.activated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_starts_active_at_full_reputation() {
        let addr = Address::parse(&format!("0x{}", "11".repeat(20))).unwrap();
        let info = WalletInfo::new(addr);
        assert!(info.is_active());
        assert_eq!(info.reputation, REPUTATION_MAX);
        assert_eq!(info.tx_count, 0);
    }
}
