//! The trader profile simulator
//!
//! The single entry point strategy code calls: resolves the active
//! profile (rotation timer or external policy), asks the obfuscation
//! engine for a randomized plan, then layers venue countermeasures on
//! top. Outcome feedback flows back into the wallet registry and, in
//! aggregate, to the policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SimulatorConfig;
use crate::error::{Error, Result};
use crate::gas::{GasPriceOracle, GasPriceSnapshot};
use crate::obfuscation::{BehavioralObfuscationEngine, ExecutionPlan, TradeIntent};
use crate::ports::{Address, ChainStatusReport, ProfilePolicy};
use crate::profile::types::TraderProfile;
use crate::profile::venues::venue_countermeasures;
use crate::wallet::WalletRegistry;

/// Operator-facing snapshot of simulator state
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorStats {
    pub profile: String,
    pub rotations: u64,
    pub obfuscated_tx_count: u64,
    pub wallet_reputations: HashMap<String, f64>,
    pub gas_snapshot: Option<GasPriceSnapshot>,
}

struct ActiveProfile {
    name: String,
    rotated_at: Instant,
    next_rotation: Duration,
}

pub struct TraderProfileSimulator {
    config: SimulatorConfig,
    chain_name: String,
    profiles: HashMap<String, TraderProfile>,
    engine: Arc<BehavioralObfuscationEngine>,
    registry: Arc<WalletRegistry>,
    oracle: Arc<GasPriceOracle>,
    policy: Option<Arc<dyn ProfilePolicy>>,
    rng: Mutex<StdRng>,
    active: RwLock<ActiveProfile>,
    rotations: AtomicU64,
    obfuscated_tx: AtomicU64,
    total_outcomes: AtomicU64,
    failed_outcomes: AtomicU64,
    detection_events: AtomicU64,
}

impl TraderProfileSimulator {
    pub fn new(
        config: SimulatorConfig,
        chain_name: String,
        profiles: HashMap<String, TraderProfile>,
        engine: Arc<BehavioralObfuscationEngine>,
        registry: Arc<WalletRegistry>,
        oracle: Arc<GasPriceOracle>,
        policy: Option<Arc<dyn ProfilePolicy>>,
    ) -> Result<Self> {
        Self::with_seed(config, chain_name, profiles, engine, registry, oracle, policy, None)
    }

    /// Seeded constructor for deterministic rotation/countermeasure draws
    #[allow(clippy::too_many_arguments)]
    pub fn with_seed(
        config: SimulatorConfig,
        chain_name: String,
        profiles: HashMap<String, TraderProfile>,
        engine: Arc<BehavioralObfuscationEngine>,
        registry: Arc<WalletRegistry>,
        oracle: Arc<GasPriceOracle>,
        policy: Option<Arc<dyn ProfilePolicy>>,
        seed: Option<u64>,
    ) -> Result<Self> {
        if !profiles.contains_key(&config.default_profile) {
            return Err(Error::UnknownProfile(config.default_profile.clone()));
        }
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let next_rotation = rotation_interval(&config, &mut rng);
        let active = ActiveProfile {
            name: config.default_profile.clone(),
            rotated_at: Instant::now(),
            next_rotation,
        };
        Ok(Self {
            config,
            chain_name,
            profiles,
            engine,
            registry,
            oracle,
            policy,
            rng: Mutex::new(rng),
            active: RwLock::new(active),
            rotations: AtomicU64::new(0),
            obfuscated_tx: AtomicU64::new(0),
            total_outcomes: AtomicU64::new(0),
            failed_outcomes: AtomicU64::new(0),
            detection_events: AtomicU64::new(0),
        })
    }

    /// Resolve a profile and produce the execution parameters for one
    /// trade intent.
    pub async fn get_execution_parameters(&self, intent: &TradeIntent) -> Result<ExecutionPlan> {
        let profile_name = self.resolve_profile(intent).await;
        let profile = self
            .profiles
            .get(&profile_name)
            .ok_or_else(|| Error::UnknownProfile(profile_name.clone()))?;

        let mut plan = self.engine.plan(intent, profile).await?;
        if let Some(venue) = &intent.venue {
            self.apply_countermeasures(&mut plan, venue).await;
        }

        self.obfuscated_tx.fetch_add(1, Ordering::Relaxed);
        Ok(plan)
    }

    /// Policy first when configured; any policy failure or unknown answer
    /// falls back to the rotation timer.
    async fn resolve_profile(&self, intent: &TradeIntent) -> String {
        if let Some(policy) = &self.policy {
            match policy
                .select_profile(&self.chain_name, intent.op_type, &intent.token)
                .await
            {
                Ok(name) if self.profiles.contains_key(&name) => {
                    debug!(profile = %name, token = %intent.token, "Policy selected profile");
                    return name;
                }
                Ok(name) => {
                    warn!(profile = %name, "Policy returned an unknown profile, using rotation");
                }
                Err(e) => {
                    warn!(error = %e, "Profile policy failed, using rotation");
                }
            }
        }
        self.rotated_profile().await
    }

    /// Rotation timer: after a random interval inside the configured
    /// bounds, swap to a different profile.
    async fn rotated_profile(&self) -> String {
        {
            let active = self.active.read().await;
            if active.rotated_at.elapsed() < active.next_rotation {
                return active.name.clone();
            }
        }

        let mut active = self.active.write().await;
        // Another task may have rotated while we were waiting for the lock
        if active.rotated_at.elapsed() < active.next_rotation {
            return active.name.clone();
        }

        let mut rng = self.rng.lock().await;
        let candidates: Vec<&String> = self
            .profiles
            .keys()
            .filter(|name| **name != active.name)
            .collect();
        if let Some(next) = candidates.choose(&mut *rng) {
            info!(from = %active.name, to = %next, "Rotating active profile");
            active.name = (*next).clone();
            self.rotations.fetch_add(1, Ordering::Relaxed);
        }
        active.rotated_at = Instant::now();
        active.next_rotation = rotation_interval(&self.config, &mut rng);
        active.name.clone()
    }

    async fn apply_countermeasures(&self, plan: &mut ExecutionPlan, venue: &str) {
        let cm = venue_countermeasures(venue);
        let mut rng = self.rng.lock().await;

        if let Some(first) = plan.transactions.first_mut() {
            let (lo, hi) = cm.extra_delay_secs;
            if hi > lo {
                let extra = rng.gen_range(lo..=hi);
                first.delay += Duration::from_secs_f64(extra);
            }
        }

        if cm.gas_jitter_pct > 0.0 {
            let jitter = rng.gen_range(-cm.gas_jitter_pct..=cm.gas_jitter_pct);
            plan.gas_multiplier *= 1.0 + jitter;
        }

        if cm.salt_metadata {
            let salt: [u8; 8] = rng.gen();
            plan.metadata_salt = Some(hex::encode(salt));
        }
    }

    /// Feed a transaction outcome back into wallet reputation and, every
    /// `report_status_every` outcomes, to the policy.
    pub async fn record_outcome(
        &self,
        wallet: &Address,
        success: bool,
        venue_flags: u32,
        volume: f64,
    ) -> Result<f64> {
        let reputation = self
            .registry
            .record_outcome(wallet, success, venue_flags, volume)
            .await?;

        let total = self.total_outcomes.fetch_add(1, Ordering::Relaxed) + 1;
        if !success {
            self.failed_outcomes.fetch_add(1, Ordering::Relaxed);
        }
        if venue_flags > 0 {
            self.detection_events
                .fetch_add(venue_flags as u64, Ordering::Relaxed);
        }

        if let Some(policy) = &self.policy {
            if self.config.report_status_every > 0 && total % self.config.report_status_every == 0 {
                let report = ChainStatusReport {
                    detection_events: self.detection_events.load(Ordering::Relaxed),
                    failed_tx: self.failed_outcomes.load(Ordering::Relaxed),
                    total_tx: total,
                };
                if let Err(e) = policy.report_status(&self.chain_name, report).await {
                    warn!(error = %e, "Status report to policy failed");
                }
            }
        }

        Ok(reputation)
    }

    /// Always answers from the latest known state, even mid-error, so
    /// operators can observe degraded components.
    pub async fn get_stats(&self) -> SimulatorStats {
        SimulatorStats {
            profile: self.active.read().await.name.clone(),
            rotations: self.rotations.load(Ordering::Relaxed),
            obfuscated_tx_count: self.obfuscated_tx.load(Ordering::Relaxed),
            wallet_reputations: self.registry.reputations().await,
            gas_snapshot: self.oracle.snapshot().await,
        }
    }
}

fn rotation_interval(config: &SimulatorConfig, rng: &mut StdRng) -> Duration {
    let lo = config.rotation_min_secs.min(config.rotation_max_secs);
    let hi = config.rotation_max_secs.max(config.rotation_min_secs);
    Duration::from_secs(rng.gen_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    use crate::config::{GasOracleConfig, ObfuscationConfig, WalletRegistryConfig};
    use crate::ports::OperationType;
    use crate::profile::loader::builtin_profiles;

    fn addr(byte: u8) -> Address {
        Address::parse(&format!("0x{}", hex::encode([byte; 20]))).unwrap()
    }

    fn intent(venue: Option<&str>) -> TradeIntent {
        TradeIntent {
            token: "0xTOKEN".into(),
            amount: 50.0,
            op_type: OperationType::Buy,
            venue: venue.map(str::to_string),
        }
    }

    struct FixedPolicy {
        answer: Result<String>,
        reports: StdMutex<Vec<ChainStatusReport>>,
    }

    impl FixedPolicy {
        fn answering(name: &str) -> Self {
            Self {
                answer: Ok(name.to_string()),
                reports: StdMutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: Err(Error::Policy("advisor offline".into())),
                reports: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProfilePolicy for FixedPolicy {
        async fn select_profile(&self, _: &str, _: OperationType, _: &str) -> Result<String> {
            match &self.answer {
                Ok(name) => Ok(name.clone()),
                Err(e) => Err(Error::Policy(e.to_string())),
            }
        }
        async fn report_status(&self, _: &str, report: ChainStatusReport) -> Result<()> {
            self.reports.lock().unwrap().push(report);
            Ok(())
        }
    }

    fn simulator(policy: Option<Arc<dyn ProfilePolicy>>) -> TraderProfileSimulator {
        let registry = Arc::new(WalletRegistry::with_seed(
            WalletRegistryConfig {
                random_swap_chance: 0.0,
                ..WalletRegistryConfig::default()
            },
            vec![addr(1), addr(2)],
            Some(7),
        ));
        let engine = Arc::new(BehavioralObfuscationEngine::with_seed(
            ObfuscationConfig::default(),
            registry.clone(),
            Some(7),
        ));
        let oracle = Arc::new(GasPriceOracle::new(GasOracleConfig::default(), vec![]));
        TraderProfileSimulator::with_seed(
            SimulatorConfig::default(),
            "ethereum".into(),
            builtin_profiles(),
            engine,
            registry,
            oracle,
            policy,
            Some(7),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_plan_uses_default_profile_without_policy() {
        let sim = simulator(None);
        let plan = sim.get_execution_parameters(&intent(None)).await.unwrap();
        assert_eq!(plan.profile, "intermediate");
        let stats = sim.get_stats().await;
        assert_eq!(stats.obfuscated_tx_count, 1);
        assert_eq!(stats.rotations, 0);
    }

    #[tokio::test]
    async fn test_policy_selects_the_profile() {
        let sim = simulator(Some(Arc::new(FixedPolicy::answering("expert"))));
        let plan = sim.get_execution_parameters(&intent(None)).await.unwrap();
        assert_eq!(plan.profile, "expert");
    }

    #[tokio::test]
    async fn test_policy_failure_falls_back_to_rotation() {
        let sim = simulator(Some(Arc::new(FixedPolicy::failing())));
        let plan = sim.get_execution_parameters(&intent(None)).await.unwrap();
        // Fallback is the rotation timer's current profile, the default
        assert_eq!(plan.profile, "intermediate");
    }

    #[tokio::test]
    async fn test_unknown_policy_answer_falls_back() {
        let sim = simulator(Some(Arc::new(FixedPolicy::answering("mystery"))));
        let plan = sim.get_execution_parameters(&intent(None)).await.unwrap();
        assert_eq!(plan.profile, "intermediate");
    }

    #[tokio::test]
    async fn test_unknown_default_profile_is_rejected() {
        let registry = Arc::new(WalletRegistry::with_seed(
            WalletRegistryConfig::default(),
            vec![addr(1)],
            Some(1),
        ));
        let engine = Arc::new(BehavioralObfuscationEngine::with_seed(
            ObfuscationConfig::default(),
            registry.clone(),
            Some(1),
        ));
        let oracle = Arc::new(GasPriceOracle::new(GasOracleConfig::default(), vec![]));
        let config = SimulatorConfig {
            default_profile: "ghost".into(),
            ..SimulatorConfig::default()
        };
        let result = TraderProfileSimulator::new(
            config,
            "ethereum".into(),
            builtin_profiles(),
            engine,
            registry,
            oracle,
            None,
        );
        assert!(matches!(result, Err(Error::UnknownProfile(_))));
    }

    #[tokio::test]
    async fn test_rotation_timer_swaps_profiles() {
        let registry = Arc::new(WalletRegistry::with_seed(
            WalletRegistryConfig::default(),
            vec![addr(1), addr(2)],
            Some(3),
        ));
        let engine = Arc::new(BehavioralObfuscationEngine::with_seed(
            ObfuscationConfig::default(),
            registry.clone(),
            Some(3),
        ));
        let oracle = Arc::new(GasPriceOracle::new(GasOracleConfig::default(), vec![]));
        let config = SimulatorConfig {
            rotation_min_secs: 0,
            rotation_max_secs: 0,
            ..SimulatorConfig::default()
        };
        let sim = TraderProfileSimulator::with_seed(
            config,
            "ethereum".into(),
            builtin_profiles(),
            engine,
            registry,
            oracle,
            None,
            Some(3),
        )
        .unwrap();

        // A zero-length rotation window forces a swap on the first resolve
        let plan = sim.get_execution_parameters(&intent(None)).await.unwrap();
        assert_ne!(plan.profile, "intermediate");
        assert!(sim.profiles.contains_key(&plan.profile));
        assert_eq!(sim.get_stats().await.rotations, 1);
    }

    #[tokio::test]
    async fn test_salting_venue_injects_metadata() {
        let sim = simulator(None);
        let plan = sim
            .get_execution_parameters(&intent(Some("uniswap_v3")))
            .await
            .unwrap();
        let salt = plan.metadata_salt.unwrap();
        assert_eq!(salt.len(), 16);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_venue_delay_is_added() {
        // Run the same seed with and without a delay-adding venue
        let without = simulator(None)
            .get_execution_parameters(&intent(None))
            .await
            .unwrap();
        let with = simulator(None)
            .get_execution_parameters(&intent(Some("pancakeswap")))
            .await
            .unwrap();
        // pancakeswap adds at least 2s to the first transaction
        assert!(with.transactions[0].delay >= without.transactions[0].delay);
        assert!(with.transactions[0].delay.as_secs_f64() >= 2.0);
    }

    #[tokio::test]
    async fn test_outcomes_feed_reputation_and_policy() {
        let policy = Arc::new(FixedPolicy::answering("expert"));
        let sim = simulator(Some(policy.clone()));

        let wallet = addr(1);
        for _ in 0..19 {
            sim.record_outcome(&wallet, true, 0, 10.0).await.unwrap();
        }
        assert!(policy.reports.lock().unwrap().is_empty());

        // The 20th outcome triggers a status report
        let reputation = sim.record_outcome(&wallet, false, 1, 10.0).await.unwrap();
        assert!(reputation < 100.0);
        let reports = policy.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].total_tx, 20);
        assert_eq!(reports[0].failed_tx, 1);
        assert_eq!(reports[0].detection_events, 1);
    }

    #[tokio::test]
    async fn test_stats_reflect_wallet_reputations() {
        let sim = simulator(None);
        sim.record_outcome(&addr(1), false, 0, 5.0).await.unwrap();
        let stats = sim.get_stats().await;
        assert_eq!(stats.wallet_reputations.len(), 2);
        let flagged = stats
            .wallet_reputations
            .values()
            .any(|r| (*r - 90.0).abs() < 1e-9);
        assert!(flagged);
        assert!(stats.gas_snapshot.is_none());
    }
}
