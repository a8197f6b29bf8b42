//! Profile-selection policy port
//!
//! An external advisor (typically LLM-backed) may drive profile selection
//! per (chain, operation, token). It is strictly optional: the simulator
//! falls back to its rotation timer when the policy errors, and the
//! rule-based implementation here serves as the null policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::error::Result;

/// Trade operation kind, used as a policy key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Buy,
    Sell,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Buy => "buy",
            OperationType::Sell => "sell",
        }
    }
}

/// Aggregate chain-level counters reported back to the policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatusReport {
    pub detection_events: u64,
    pub failed_tx: u64,
    pub total_tx: u64,
}

#[async_trait]
pub trait ProfilePolicy: Send + Sync {
    /// Pick a profile name for the given trade context
    async fn select_profile(
        &self,
        chain: &str,
        op_type: OperationType,
        token: &str,
    ) -> Result<String>;

    /// Receive aggregate detection/failure counters for the chain
    async fn report_status(&self, chain: &str, report: ChainStatusReport) -> Result<()>;
}

/// Rule-based fallback policy
///
/// Spreads tokens across the known archetypes deterministically and drops
/// to the most conservative one when the reported failure rate climbs.
pub struct RuleBasedPolicy {
    profiles: Vec<String>,
    conservative: String,
    last_report: Mutex<ChainStatusReport>,
}

impl RuleBasedPolicy {
    pub fn new(profiles: Vec<String>, conservative: String) -> Self {
        Self {
            profiles,
            conservative,
            last_report: Mutex::new(ChainStatusReport::default()),
        }
    }

    fn failure_rate(&self) -> f64 {
        let report = self.last_report.lock().expect("policy report lock poisoned");
        if report.total_tx == 0 {
            0.0
        } else {
            (report.failed_tx + report.detection_events) as f64 / report.total_tx as f64
        }
    }
}

#[async_trait]
impl ProfilePolicy for RuleBasedPolicy {
    async fn select_profile(
        &self,
        chain: &str,
        op_type: OperationType,
        token: &str,
    ) -> Result<String> {
        if self.profiles.is_empty() {
            return Ok(self.conservative.clone());
        }

        if self.failure_rate() > 0.3 {
            return Ok(self.conservative.clone());
        }

        // Deterministic per-token spread so one token keeps one persona
        let mut hasher = DefaultHasher::new();
        chain.hash(&mut hasher);
        op_type.hash(&mut hasher);
        token.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.profiles.len();
        Ok(self.profiles[idx].clone())
    }

    async fn report_status(&self, _chain: &str, report: ChainStatusReport) -> Result<()> {
        let mut last = self.last_report.lock().expect("policy report lock poisoned");
        *last = report;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RuleBasedPolicy {
        RuleBasedPolicy::new(
            vec!["beginner".into(), "intermediate".into(), "expert".into()],
            "beginner".into(),
        )
    }

    #[tokio::test]
    async fn test_selection_is_deterministic_per_token() {
        let p = policy();
        let a = p
            .select_profile("ethereum", OperationType::Buy, "0xTOKEN")
            .await
            .unwrap();
        let b = p
            .select_profile("ethereum", OperationType::Buy, "0xTOKEN")
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_high_failure_rate_forces_conservative() {
        let p = policy();
        p.report_status(
            "ethereum",
            ChainStatusReport {
                detection_events: 3,
                failed_tx: 5,
                total_tx: 10,
            },
        )
        .await
        .unwrap();
        let name = p
            .select_profile("ethereum", OperationType::Sell, "0xANY")
            .await
            .unwrap();
        assert_eq!(name, "beginner");
    }
}
