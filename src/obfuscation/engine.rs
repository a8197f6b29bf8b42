//! Execution plan generation

use rand::prelude::*;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ObfuscationConfig;
use crate::error::{Error, Result};
use crate::profile::{TraderProfile, TradingPattern};
use crate::wallet::WalletRegistry;

use super::pattern::PatternDetector;
use super::splitting::{split_amounts, split_probability, split_with_concentrations};
use super::timing::{draw_delay, variance_multiplier};
use super::{ExecutionPlan, PlannedTransaction, TradeIntent};

/// Produces randomized execution plans; never talks to the chain itself
pub struct BehavioralObfuscationEngine {
    config: ObfuscationConfig,
    registry: Arc<WalletRegistry>,
    rng: Mutex<StdRng>,
    detector: Mutex<PatternDetector>,
    session_started: Instant,
}

impl BehavioralObfuscationEngine {
    pub fn new(config: ObfuscationConfig, registry: Arc<WalletRegistry>) -> Self {
        Self::with_seed(config, registry, None)
    }

    /// Seeded constructor for deterministic plans in tests
    pub fn with_seed(
        config: ObfuscationConfig,
        registry: Arc<WalletRegistry>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let detector = PatternDetector::new(config.pattern_window, config.max_consecutive_similar);
        Self {
            config,
            registry,
            rng: Mutex::new(rng),
            detector: Mutex::new(detector),
            session_started: Instant::now(),
        }
    }

    /// Build a randomized plan for one trade intent
    pub async fn plan(&self, intent: &TradeIntent, profile: &TraderProfile) -> Result<ExecutionPlan> {
        if intent.amount <= 0.0 || !intent.amount.is_finite() {
            return Err(Error::InvalidAmount(intent.amount));
        }

        let boosted = {
            let mut detector = self.detector.lock().await;
            detector.record(intent.pattern_key())
        };

        let session_hours = self.session_started.elapsed().as_secs_f64() / 3600.0;
        let multiplier = variance_multiplier(&self.config, session_hours, boosted);

        // Everything random is drawn under one short-lived lock; the
        // deliberate delays themselves are slept by the caller, never here
        let (transactions, gas_tier, gas_multiplier, slippage_bps) = {
            let mut rng = self.rng.lock().await;

            let pattern = profile.pick_pattern(&mut rng).ok_or_else(|| {
                Error::ProfileDefinition(format!("profile '{}' has no patterns", profile.name))
            })?;

            let amounts = self.draw_amounts(&mut rng, intent, multiplier, profile, pattern)?;

            let mut transactions: Vec<PlannedTransaction> = amounts
                .into_iter()
                .map(|amount| PlannedTransaction {
                    amount,
                    delay: draw_delay(
                        &mut rng,
                        pattern,
                        profile.randomization.timing,
                        multiplier,
                    ),
                    is_dust: false,
                })
                .collect();

            // Occasional dust breaks round-number fingerprints
            if rng.gen::<f64>() < self.config.dust_probability {
                let fraction = rng
                    .gen_range(self.config.dust_min_fraction..=self.config.dust_max_fraction);
                transactions.push(PlannedTransaction {
                    amount: intent.amount * fraction,
                    delay: draw_delay(
                        &mut rng,
                        pattern,
                        profile.randomization.timing,
                        multiplier,
                    ),
                    is_dust: true,
                });
            }

            (
                transactions,
                pattern.gas_tier,
                pattern.gas_behavior.multiplier(),
                pattern.slippage_bps,
            )
        };

        let wallet = self.registry.select_wallet().await?;

        debug!(
            token = intent.token,
            op = intent.op_type.as_str(),
            splits = transactions.iter().filter(|t| !t.is_dust).count(),
            dust = transactions.iter().any(|t| t.is_dust),
            boosted,
            wallet = wallet.short(),
            "Execution plan generated"
        );

        Ok(ExecutionPlan {
            transactions,
            wallet,
            gas_tier,
            gas_multiplier,
            slippage_bps,
            metadata_salt: None,
            profile: profile.name.clone(),
        })
    }

    /// Split decision plus per-share variance
    ///
    /// A multi-way ratio list on the pattern (entry or exit, per the
    /// intent) steers the Dirichlet draw toward those shares; otherwise
    /// both the split count and the shares are drawn freely. Variance is
    /// applied inside the split by re-normalizing against the last share,
    /// so the shares always sum exactly to the intent amount.
    fn draw_amounts(
        &self,
        rng: &mut StdRng,
        intent: &TradeIntent,
        multiplier: f64,
        profile: &TraderProfile,
        pattern: &TradingPattern,
    ) -> Result<Vec<f64>> {
        let amount = intent.amount;
        let p_split = split_probability(amount, self.config.split_reference_amount);
        if rng.gen::<f64>() >= p_split {
            // Single transaction: variance applies to the whole amount

            let v = (profile.randomization.amount * multiplier).min(0.95);
            let factor = rng.gen_range((1.0 - v)..=(1.0 + v));
            return Ok(vec![amount * factor]);
        }

        let ratios = if intent.is_entry() {
            &pattern.entry_split_ratios
        } else {
            &pattern.exit_split_ratios
        };
        let mut shares = match concentrations_from(ratios, self.config.max_splits) {
            Some(alphas) => split_with_concentrations(rng, amount, &alphas)?,
            None => {
                let k = rng.gen_range(2..=self.config.max_splits);
                split_amounts(rng, amount, k)?
            }
        };

        // Jitter every share but the last, then let the last absorb the
        // difference; bounded jitter keeps it positive
        let v = (profile.randomization.amount * multiplier).min(0.3);
        let head_len = shares.len() - 1;
        for share in shares.iter_mut().take(head_len) {
            *share *= rng.gen_range((1.0 - v)..=(1.0 + v));
            *share = (*share * 1e6).round() / 1e6;
        }
        let head: f64 = shares[..head_len].iter().sum();
        shares[head_len] = ((amount - head) * 1e6).round() / 1e6;
        if shares[head_len] <= 0.0 {
            // Degenerate jitter outcome: fall back to the raw split
            return split_amounts(rng, amount, shares.len());
        }

        Ok(shares)
    }

    /// Hours the current trading session has been running
    pub fn session_hours(&self) -> f64 {
        self.session_started.elapsed().as_secs_f64() / 3600.0
    }
}

/// Pattern ratios become Dirichlet concentrations when they describe a
/// usable multi-way preference, scaled so the mean concentration is 1.
fn concentrations_from(ratios: &[f64], max_splits: usize) -> Option<Vec<f64>> {
    if ratios.len() < 2 || ratios.len() > max_splits {
        return None;
    }
    if ratios.iter().any(|r| !r.is_finite() || *r <= 0.0) {
        return None;
    }
    let sum: f64 = ratios.iter().sum();
    let k = ratios.len() as f64;
    Some(ratios.iter().map(|r| r / sum * k).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalletRegistryConfig;
    use crate::gas::GasTier;
    use crate::ports::{Address, OperationType};
    use crate::profile::{GasBehavior, RandomizationStrengths, SessionHabits, TradingPattern};

    fn addr(byte: u8) -> Address {
        Address::parse(&format!("0x{}", hex::encode([byte; 20]))).unwrap()
    }

    fn registry() -> Arc<WalletRegistry> {
        let config = WalletRegistryConfig {
            random_swap_chance: 0.0,
            ..WalletRegistryConfig::default()
        };
        Arc::new(WalletRegistry::with_seed(
            config,
            vec![addr(1), addr(2)],
            Some(1),
        ))
    }

    fn profile() -> TraderProfile {
        TraderProfile {
            name: "intermediate".into(),
            risk: "medium".into(),
            experience: "intermediate".into(),
            patterns: vec![TradingPattern {
                name: "steady".into(),
                entry_split_ratios: vec![0.5, 0.5],
                exit_split_ratios: vec![1.0],
                typical_delays_secs: vec![5.0, 15.0],
                delay_jitter: 0.3,
                gas_tier: GasTier::Standard,
                gas_behavior: GasBehavior::Normal,
                slippage_bps: 150,
                tx_per_hour: 10.0,
            }],
            session: SessionHabits {
                session_min_hours: 1.0,
                session_max_hours: 4.0,
                preferred_hours: vec![],
            },
            randomization: RandomizationStrengths {
                amount: 0.1,
                timing: 0.6,
                gas: 0.1,
            },
        }
    }

    fn intent(amount: f64) -> TradeIntent {
        TradeIntent {
            token: "0xTOKEN".into(),
            amount,
            op_type: OperationType::Buy,
            venue: None,
        }
    }

    fn engine_with(config: ObfuscationConfig, seed: u64) -> BehavioralObfuscationEngine {
        BehavioralObfuscationEngine::with_seed(config, registry(), Some(seed))
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let engine = engine_with(ObfuscationConfig::default(), 1);
        let p = profile();
        assert!(matches!(
            engine.plan(&intent(0.0), &p).await,
            Err(Error::InvalidAmount(_))
        ));
        assert!(matches!(
            engine.plan(&intent(-5.0), &p).await,
            Err(Error::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_split_plan_sums_exactly() {
        // Large amount relative to the reference forces a split
        let config = ObfuscationConfig {
            split_reference_amount: 1.0,
            dust_probability: 0.0,
            ..ObfuscationConfig::default()
        };
        let p = profile();
        for seed in 0..20 {
            let engine = engine_with(config.clone(), seed);
            let plan = engine.plan(&intent(1000.0), &p).await.unwrap();
            assert!(plan.split_count() >= 2);
            let sum = (plan.total_amount() * 1e6).round() / 1e6;
            assert_eq!(sum, 1000.0);
        }
    }

    #[tokio::test]
    async fn test_pattern_ratios_steer_split_shares() {
        let config = ObfuscationConfig {
            split_reference_amount: 1.0,
            dust_probability: 0.0,
            ..ObfuscationConfig::default()
        };
        let mut p = profile();
        p.patterns[0].entry_split_ratios = vec![0.7, 0.3];
        p.patterns[0].exit_split_ratios = vec![0.25, 0.25, 0.25, 0.25];

        // Entries follow the two-way 70/30 preference on average
        let mut first_share = 0.0;
        for seed in 0..60 {
            let engine = engine_with(config.clone(), seed);
            let plan = engine.plan(&intent(1000.0), &p).await.unwrap();
            assert_eq!(plan.transactions.len(), 2);
            first_share += plan.transactions[0].amount / 1000.0;
        }
        assert!(first_share / 60.0 > 0.55);

        // Exits pick up the four-way exit list instead
        let engine = engine_with(config, 5);
        let sell = TradeIntent {
            op_type: OperationType::Sell,
            ..intent(1000.0)
        };
        let plan = engine.plan(&sell, &p).await.unwrap();
        assert_eq!(plan.transactions.len(), 4);
    }

    #[tokio::test]
    async fn test_unsplit_amount_gets_variance() {
        let config = ObfuscationConfig {
            split_reference_amount: 1e12, // never split
            dust_probability: 0.0,
            ..ObfuscationConfig::default()
        };
        let engine = engine_with(config, 3);
        let p = profile();

        let plan = engine.plan(&intent(100.0), &p).await.unwrap();
        assert_eq!(plan.transactions.len(), 1);
        let amount = plan.transactions[0].amount;
        assert!(amount >= 90.0 && amount <= 110.0);
    }

    #[tokio::test]
    async fn test_dust_is_flagged_and_tiny() {
        let config = ObfuscationConfig {
            split_reference_amount: 1e12,
            dust_probability: 1.0,
            ..ObfuscationConfig::default()
        };
        let engine = engine_with(config, 4);
        let p = profile();

        let plan = engine.plan(&intent(1000.0), &p).await.unwrap();
        let dust: Vec<_> = plan.transactions.iter().filter(|t| t.is_dust).collect();
        assert_eq!(dust.len(), 1);
        // 0.05% to 0.2% of the trade
        assert!(dust[0].amount >= 0.5 && dust[0].amount <= 2.0);
        // Dust does not count toward the intent amount
        assert!((plan.total_amount() - plan.transactions[0].amount).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_repetition_raises_delay_variance() {
        let config = ObfuscationConfig {
            split_reference_amount: 1e12,
            dust_probability: 0.0,
            max_consecutive_similar: 3,
            ..ObfuscationConfig::default()
        };
        let p = profile();

        // Spread of first-plan delays across seeds, vs spread of
        // fourth-plan delays after three identical intents
        let mut first_delays = Vec::new();
        let mut boosted_delays = Vec::new();
        for seed in 0..60 {
            let engine = engine_with(config.clone(), seed);
            let plan = engine.plan(&intent(10.0), &p).await.unwrap();
            first_delays.push(plan.transactions[0].delay.as_secs_f64());

            for _ in 0..3 {
                engine.plan(&intent(10.0), &p).await.unwrap();
            }
            let plan = engine.plan(&intent(10.0), &p).await.unwrap();
            boosted_delays.push(plan.transactions[0].delay.as_secs_f64());
        }

        let spread = |v: &[f64]| {
            let min = v.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = v.iter().cloned().fold(0.0, f64::max);
            max - min
        };
        assert!(spread(&boosted_delays) > spread(&first_delays));
    }

    #[tokio::test]
    async fn test_plan_carries_pattern_parameters() {
        let config = ObfuscationConfig {
            split_reference_amount: 1e12,
            dust_probability: 0.0,
            ..ObfuscationConfig::default()
        };
        let engine = engine_with(config, 9);
        let p = profile();

        let plan = engine.plan(&intent(10.0), &p).await.unwrap();
        assert_eq!(plan.gas_tier, GasTier::Standard);
        assert_eq!(plan.gas_multiplier, 1.0);
        assert_eq!(plan.slippage_bps, 150);
        assert_eq!(plan.profile, "intermediate");
        assert!(plan.metadata_salt.is_none());
    }
}
