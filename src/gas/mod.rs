//! Gas price oracle
//!
//! Reconciles disagreeing fee-estimate sources into four actionable price
//! tiers and flags front-running around our own transactions.

pub mod frontrun;
pub mod oracle;

pub use frontrun::{detect_front_running, FrontRunInspector, FrontRunSuspect};
pub use oracle::GasPriceOracle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named fee level trading cost against inclusion speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasTier {
    Safe,
    Standard,
    Fast,
    Rapid,
}

impl GasTier {
    pub const ALL: [GasTier; 4] = [GasTier::Safe, GasTier::Standard, GasTier::Fast, GasTier::Rapid];

    pub fn as_str(&self) -> &'static str {
        match self {
            GasTier::Safe => "safe",
            GasTier::Standard => "standard",
            GasTier::Fast => "fast",
            GasTier::Rapid => "rapid",
        }
    }
}

impl Default for GasTier {
    fn default() -> Self {
        GasTier::Standard
    }
}

/// One merged, clamped, monotonic set of tier prices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPriceSnapshot {
    pub safe: u128,
    pub standard: u128,
    pub fast: u128,
    pub rapid: u128,
    pub fetched_at: DateTime<Utc>,
    /// Set when every source failed and this snapshot is being served past
    /// its refresh interval
    pub stale: bool,
    /// Sources that contributed to this snapshot
    pub healthy_sources: usize,
}

impl GasPriceSnapshot {
    pub fn price(&self, tier: GasTier) -> u128 {
        match tier {
            GasTier::Safe => self.safe,
            GasTier::Standard => self.standard,
            GasTier::Fast => self.fast,
            GasTier::Rapid => self.rapid,
        }
    }

    /// Tier monotonicity invariant: safe <= standard <= fast <= rapid
    pub fn is_monotonic(&self) -> bool {
        self.safe <= self.standard && self.standard <= self.fast && self.fast <= self.rapid
    }
}
