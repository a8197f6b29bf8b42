//! Tier price reconciliation across fee-estimate sources

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GasOracleConfig;
use crate::error::{Error, Result};
use crate::ports::FeeEstimateSource;

use super::{GasPriceSnapshot, GasTier};

// Derivation ratios for tiers no source priced directly
const SAFE_OF_STANDARD: f64 = 0.8;
const FAST_OF_STANDARD: f64 = 1.2;
const RAPID_OF_FAST: f64 = 1.5;

/// Reconciles 0..N fee-estimate sources into a clamped, monotonic snapshot
pub struct GasPriceOracle {
    config: GasOracleConfig,
    sources: Vec<Arc<dyn FeeEstimateSource>>,
    snapshot: RwLock<Option<GasPriceSnapshot>>,
}

impl GasPriceOracle {
    pub fn new(config: GasOracleConfig, sources: Vec<Arc<dyn FeeEstimateSource>>) -> Self {
        Self {
            config,
            sources,
            snapshot: RwLock::new(None),
        }
    }

    /// Query every source, merge, and publish a fresh snapshot
    ///
    /// Individual source failures are dropped; only a total blackout with
    /// no prior snapshot is an error. On total blackout with a prior
    /// snapshot the old one is served with its staleness flag raised.
    pub async fn refresh(&self) -> Result<GasPriceSnapshot> {
        let timeout = Duration::from_millis(self.config.source_timeout_ms);

        let fetches = self.sources.iter().map(|source| {
            let source = source.clone();
            async move {
                let name = source.name().to_string();
                match tokio::time::timeout(timeout, source.estimates()).await {
                    Ok(Ok(estimates)) => Some((name, estimates)),
                    Ok(Err(e)) => {
                        debug!(source = name, error = %e, "Fee source failed");
                        None
                    }
                    Err(_) => {
                        debug!(source = name, timeout_ms = timeout.as_millis() as u64, "Fee source timed out");
                        None
                    }
                }
            }
        });

        let mut per_tier: HashMap<GasTier, Vec<u128>> = HashMap::new();
        let mut healthy = 0usize;
        for result in join_all(fetches).await.into_iter().flatten() {
            healthy += 1;
            for (tier, price) in result.1 {
                per_tier.entry(tier).or_default().push(price);
            }
        }

        if healthy == 0 {
            let mut guard = self.snapshot.write().await;
            return match guard.as_mut() {
                Some(snapshot) => {
                    warn!("All fee sources failed, serving stale snapshot");
                    snapshot.stale = true;
                    Ok(snapshot.clone())
                }
                None => Err(Error::NoGasSnapshot),
            };
        }

        let snapshot = self.build_snapshot(&per_tier, healthy)?;
        debug!(
            safe = snapshot.safe,
            standard = snapshot.standard,
            fast = snapshot.fast,
            rapid = snapshot.rapid,
            healthy_sources = healthy,
            "Gas snapshot refreshed"
        );

        let mut guard = self.snapshot.write().await;
        *guard = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Current price for a tier, refreshing lazily when the cache is stale
    pub async fn tier_price(&self, tier: GasTier) -> Result<u128> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot.price(tier));
        }
        let snapshot = self.refresh().await?;
        Ok(snapshot.price(tier))
    }

    /// Latest snapshot, stale or not
    pub async fn snapshot(&self) -> Option<GasPriceSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Snapshot only if within the refresh interval
    async fn fresh_snapshot(&self) -> Option<GasPriceSnapshot> {
        let guard = self.snapshot.read().await;
        let snapshot = guard.as_ref()?;
        let age = Utc::now().signed_duration_since(snapshot.fetched_at);
        if !snapshot.stale && age.num_seconds() >= 0 && (age.num_seconds() as u64) < self.config.refresh_interval_secs
        {
            Some(snapshot.clone())
        } else {
            None
        }
    }

    /// Spawn the periodic refresh task; stops cleanly on cancellation
    pub fn spawn_refresh_task(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let oracle = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(oracle.config.refresh_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Gas refresh task stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = oracle.refresh().await {
                            warn!(error = %e, "Scheduled gas refresh failed");
                        }
                    }
                }
            }
        })
    }

    fn build_snapshot(
        &self,
        per_tier: &HashMap<GasTier, Vec<u128>>,
        healthy: usize,
    ) -> Result<GasPriceSnapshot> {
        let direct: HashMap<GasTier, u128> = per_tier
            .iter()
            .map(|(tier, values)| (*tier, median(values)))
            .collect();

        // Standard anchors the derivation chain, so recover it first
        let standard = direct
            .get(&GasTier::Standard)
            .copied()
            .or_else(|| {
                direct
                    .get(&GasTier::Safe)
                    .map(|s| scale(*s, 1.0 / SAFE_OF_STANDARD))
            })
            .or_else(|| {
                direct
                    .get(&GasTier::Fast)
                    .map(|f| scale(*f, 1.0 / FAST_OF_STANDARD))
            })
            .or_else(|| {
                direct
                    .get(&GasTier::Rapid)
                    .map(|r| scale(*r, 1.0 / (FAST_OF_STANDARD * RAPID_OF_FAST)))
            })
            .ok_or_else(|| Error::Internal("no tier survived merging".into()))?;

        let safe = direct
            .get(&GasTier::Safe)
            .copied()
            .unwrap_or_else(|| scale(standard, SAFE_OF_STANDARD));
        let fast = direct
            .get(&GasTier::Fast)
            .copied()
            .unwrap_or_else(|| scale(standard, FAST_OF_STANDARD));
        let rapid = direct
            .get(&GasTier::Rapid)
            .copied()
            .unwrap_or_else(|| scale(fast, RAPID_OF_FAST));

        let clamp = |v: u128| {
            v.clamp(
                self.config.min_price_wei as u128,
                self.config.max_price_wei as u128,
            )
        };
        let safe = clamp(safe);
        // Monotonicity is enforced after clamping: each tier is at least
        // the tier below it
        let standard = clamp(standard).max(safe);
        let fast = clamp(fast).max(standard);
        let rapid = clamp(rapid).max(fast);

        Ok(GasPriceSnapshot {
            safe,
            standard,
            fast,
            rapid,
            fetched_at: Utc::now(),
            stale: false,
            healthy_sources: healthy,
        })
    }
}

fn scale(v: u128, factor: f64) -> u128 {
    (v as f64 * factor).round() as u128
}

fn median(values: &[u128]) -> u128 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2
    } else {
        sorted[mid]
    }
}
