//! Trader profile reference data

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::gas::GasTier;

/// Gas spending posture, mapped to a fixed tier multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasBehavior {
    Economic,
    Normal,
    Aggressive,
}

impl GasBehavior {
    pub fn multiplier(&self) -> f64 {
        match self {
            GasBehavior::Economic => 0.85,
            GasBehavior::Normal => 1.0,
            GasBehavior::Aggressive => 1.25,
        }
    }
}

impl Default for GasBehavior {
    fn default() -> Self {
        GasBehavior::Normal
    }
}

/// One named trading pattern inside a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPattern {
    pub name: String,

    /// Preferred split shares for entries/exits; a multi-way list steers
    /// the engine's Dirichlet draw toward those shares
    #[serde(default)]
    pub entry_split_ratios: Vec<f64>,
    #[serde(default)]
    pub exit_split_ratios: Vec<f64>,

    /// Typical inter-transaction delays, in seconds
    pub typical_delays_secs: Vec<f64>,

    /// Relative jitter applied around a chosen delay (0.3 = +/-30%)
    pub delay_jitter: f64,

    #[serde(default)]
    pub gas_tier: GasTier,
    #[serde(default)]
    pub gas_behavior: GasBehavior,

    pub slippage_bps: u32,

    /// Target cadence, used by session planning
    pub tx_per_hour: f64,
}

/// Session habits of the archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHabits {
    pub session_min_hours: f64,
    pub session_max_hours: f64,
    /// Preferred UTC hours of day for activity
    #[serde(default)]
    pub preferred_hours: Vec<u8>,
}

/// Per-dimension randomization strengths in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomizationStrengths {
    pub amount: f64,
    pub timing: f64,
    pub gas: f64,
}

/// A named behavioral archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderProfile {
    pub name: String,
    pub risk: String,
    pub experience: String,
    pub patterns: Vec<TradingPattern>,
    pub session: SessionHabits,
    pub randomization: RandomizationStrengths,
}

impl TraderProfile {
    /// Pick a pattern for this trade; profiles with several patterns mix
    /// them randomly so one session is not a single repeated shape.
    /// None only for an empty pattern list, which the loader rejects.
    pub fn pick_pattern(&self, rng: &mut StdRng) -> Option<&TradingPattern> {
        self.patterns.choose(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_behavior_multipliers() {
        assert_eq!(GasBehavior::Economic.multiplier(), 0.85);
        assert_eq!(GasBehavior::Normal.multiplier(), 1.0);
        assert_eq!(GasBehavior::Aggressive.multiplier(), 1.25);
    }

    #[test]
    fn test_profile_round_trips_through_json() {
        let profile = TraderProfile {
            name: "test".into(),
            risk: "low".into(),
            experience: "novice".into(),
            patterns: vec![TradingPattern {
                name: "slow".into(),
                entry_split_ratios: vec![0.6, 0.4],
                exit_split_ratios: vec![1.0],
                typical_delays_secs: vec![30.0, 60.0],
                delay_jitter: 0.4,
                gas_tier: GasTier::Safe,
                gas_behavior: GasBehavior::Economic,
                slippage_bps: 300,
                tx_per_hour: 2.0,
            }],
            session: SessionHabits {
                session_min_hours: 0.5,
                session_max_hours: 2.0,
                preferred_hours: vec![18, 19, 20],
            },
            randomization: RandomizationStrengths {
                amount: 0.15,
                timing: 0.5,
                gas: 0.1,
            },
        };
        let json = serde_json::to_string(&profile).unwrap();
        let back: TraderProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
