//! Loading and validation of trader profile definitions
//!
//! Profiles come from a JSON file when one is configured and present;
//! otherwise the built-in archetypes are used so the engine always has a
//! working set.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gas::GasTier;
use crate::profile::types::{
    GasBehavior, RandomizationStrengths, SessionHabits, TraderProfile, TradingPattern,
};

/// Load profiles from `path`, falling back to the built-in set when the
/// file does not exist. A file that exists but fails to parse or validate
/// is an error, not a silent fallback.
pub fn load_profiles(path: &str) -> Result<HashMap<String, TraderProfile>> {
    if !Path::new(path).exists() {
        warn!(path = %path, "Profile file not found, using built-in profiles");
        return Ok(builtin_profiles());
    }

    let raw = std::fs::read_to_string(path)?;
    let profiles: Vec<TraderProfile> = serde_json::from_str(&raw)
        .map_err(|e| Error::Deserialization(format!("profiles file {}: {}", path, e)))?;

    let mut map = HashMap::with_capacity(profiles.len());
    for profile in profiles {
        validate_profile(&profile)?;
        if map.insert(profile.name.clone(), profile.clone()).is_some() {
            return Err(Error::ProfileDefinition(format!(
                "duplicate profile name '{}'",
                profile.name
            )));
        }
    }

    if map.is_empty() {
        return Err(Error::ProfileDefinition(format!(
            "profiles file {} contains no profiles",
            path
        )));
    }

    info!(path = %path, count = map.len(), "Loaded trader profiles");
    Ok(map)
}

fn validate_profile(profile: &TraderProfile) -> Result<()> {
    if profile.name.is_empty() {
        return Err(Error::ProfileDefinition("profile with empty name".into()));
    }
    if profile.patterns.is_empty() {
        return Err(Error::ProfileDefinition(format!(
            "profile '{}' has no trading patterns",
            profile.name
        )));
    }
    for pattern in &profile.patterns {
        if pattern.typical_delays_secs.is_empty() {
            return Err(Error::ProfileDefinition(format!(
                "pattern '{}' in profile '{}' has no typical delays",
                pattern.name, profile.name
            )));
        }
        if !(0.0..=1.0).contains(&pattern.delay_jitter) {
            return Err(Error::ProfileDefinition(format!(
                "pattern '{}' in profile '{}' has delay_jitter outside [0, 1]",
                pattern.name, profile.name
            )));
        }
    }
    let r = &profile.randomization;
    for (label, value) in [("amount", r.amount), ("timing", r.timing), ("gas", r.gas)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::ProfileDefinition(format!(
                "profile '{}' randomization.{} outside [0, 1]",
                profile.name, label
            )));
        }
    }
    if profile.session.session_min_hours <= 0.0
        || profile.session.session_max_hours < profile.session.session_min_hours
    {
        return Err(Error::ProfileDefinition(format!(
            "profile '{}' has an invalid session hour range",
            profile.name
        )));
    }
    Ok(())
}

/// The built-in archetypes: a cautious beginner, a mixed-style
/// intermediate, and a fast-moving expert.
pub fn builtin_profiles() -> HashMap<String, TraderProfile> {
    let profiles = vec![
        TraderProfile {
            name: "beginner".into(),
            risk: "low".into(),
            experience: "novice".into(),
            patterns: vec![TradingPattern {
                name: "cautious_single".into(),
                entry_split_ratios: vec![1.0],
                exit_split_ratios: vec![1.0],
                typical_delays_secs: vec![45.0, 90.0, 180.0],
                delay_jitter: 0.5,
                gas_tier: GasTier::Safe,
                gas_behavior: GasBehavior::Economic,
                slippage_bps: 300,
                tx_per_hour: 2.0,
            }],
            session: SessionHabits {
                session_min_hours: 0.5,
                session_max_hours: 1.5,
                preferred_hours: vec![18, 19, 20, 21],
            },
            randomization: RandomizationStrengths {
                amount: 0.1,
                timing: 0.35,
                gas: 0.05,
            },
        },
        TraderProfile {
            name: "intermediate".into(),
            risk: "medium".into(),
            experience: "intermediate".into(),
            patterns: vec![
                TradingPattern {
                    name: "split_entry".into(),
                    entry_split_ratios: vec![0.5, 0.3, 0.2],
                    exit_split_ratios: vec![0.6, 0.4],
                    typical_delays_secs: vec![15.0, 30.0, 60.0],
                    delay_jitter: 0.35,
                    gas_tier: GasTier::Standard,
                    gas_behavior: GasBehavior::Normal,
                    slippage_bps: 150,
                    tx_per_hour: 6.0,
                },
                TradingPattern {
                    name: "opportunistic".into(),
                    entry_split_ratios: vec![0.7, 0.3],
                    exit_split_ratios: vec![1.0],
                    typical_delays_secs: vec![10.0, 20.0, 40.0],
                    delay_jitter: 0.4,
                    gas_tier: GasTier::Fast,
                    gas_behavior: GasBehavior::Normal,
                    slippage_bps: 200,
                    tx_per_hour: 8.0,
                },
            ],
            session: SessionHabits {
                session_min_hours: 1.0,
                session_max_hours: 3.0,
                preferred_hours: vec![9, 10, 11, 14, 15, 20, 21],
            },
            randomization: RandomizationStrengths {
                amount: 0.2,
                timing: 0.5,
                gas: 0.12,
            },
        },
        TraderProfile {
            name: "expert".into(),
            risk: "high".into(),
            experience: "expert".into(),
            patterns: vec![
                TradingPattern {
                    name: "scalp".into(),
                    entry_split_ratios: vec![0.4, 0.3, 0.2, 0.1],
                    exit_split_ratios: vec![0.5, 0.3, 0.2],
                    typical_delays_secs: vec![3.0, 8.0, 15.0],
                    delay_jitter: 0.25,
                    gas_tier: GasTier::Rapid,
                    gas_behavior: GasBehavior::Aggressive,
                    slippage_bps: 80,
                    tx_per_hour: 20.0,
                },
                TradingPattern {
                    name: "momentum".into(),
                    entry_split_ratios: vec![0.6, 0.4],
                    exit_split_ratios: vec![1.0],
                    typical_delays_secs: vec![5.0, 12.0, 30.0],
                    delay_jitter: 0.3,
                    gas_tier: GasTier::Fast,
                    gas_behavior: GasBehavior::Aggressive,
                    slippage_bps: 100,
                    tx_per_hour: 12.0,
                },
            ],
            session: SessionHabits {
                session_min_hours: 2.0,
                session_max_hours: 6.0,
                preferred_hours: vec![8, 9, 10, 13, 14, 15, 16, 21, 22],
            },
            randomization: RandomizationStrengths {
                amount: 0.25,
                timing: 0.6,
                gas: 0.18,
            },
        },
    ];

    profiles.into_iter().map(|p| (p.name.clone(), p)).collect()
}
