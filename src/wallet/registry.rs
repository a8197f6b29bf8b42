//! Wallet selection, reputation and cooldown management

use chrono::{Duration as ChronoDuration, Utc};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::WalletRegistryConfig;
use crate::error::{Error, Result};
use crate::ports::Address;

use super::types::{
    RotationState, WalletInfo, REPUTATION_FAILURE_LOSS, REPUTATION_MAX, REPUTATION_MIN,
    REPUTATION_SUCCESS_GAIN, REPUTATION_VENUE_FLAG_LOSS,
};

/// Why the registry rotated away from the current wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RotationCause {
    LowReputation,
    UsageExceeded,
    RandomSwap,
}

pub struct WalletRegistry {
    config: WalletRegistryConfig,
    wallets: RwLock<HashMap<Address, WalletInfo>>,
    current: RwLock<Option<Address>>,
    rng: Mutex<StdRng>,
}

impl WalletRegistry {
    pub fn new(config: WalletRegistryConfig, addresses: Vec<Address>) -> Self {
        Self::with_seed(config, addresses, None)
    }

    /// Seeded constructor for deterministic selection in tests
    pub fn with_seed(
        config: WalletRegistryConfig,
        addresses: Vec<Address>,
        seed: Option<u64>,
    ) -> Self {
        let wallets = addresses
            .into_iter()
            .map(|a| (a.clone(), WalletInfo::new(a)))
            .collect();
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            wallets: RwLock::new(wallets),
            current: RwLock::new(None),
            rng: Mutex::new(rng),
        }
    }

    /// Pick the wallet the next trade goes out from
    ///
    /// Prefers the current wallet; rotates when its reputation dropped
    /// below the threshold, its usage counters ran out, or the random swap
    /// chance fires. Retirement (cooldown) only happens for reputation and
    /// usage rotations, not random swaps. When no alternate is active the
    /// current wallet is kept rather than failing.
    pub async fn select_wallet(&self) -> Result<Address> {
        let mut wallets = self.wallets.write().await;
        tick_cooldowns(&mut wallets);

        let mut current_guard = self.current.write().await;

        let cause = match current_guard.as_ref().and_then(|a| wallets.get(a)) {
            Some(info) if info.is_active() => self.rotation_cause(info),
            // Current wallet cooling down or never chosen: always rotate
            _ => Some(RotationCause::UsageExceeded),
        };

        let Some(cause) = cause else {
            return current_guard.clone().ok_or(Error::NoAvailableWallet);
        };

        let current = current_guard.clone();
        let replacement = least_used_active(&wallets, current.as_ref());

        match replacement {
            Some(next) => {
                // Retire the outgoing wallet only when it is actually spent
                if let (Some(prev), true) = (
                    current.as_ref(),
                    cause != RotationCause::RandomSwap,
                ) {
                    if let Some(info) = wallets.get_mut(prev) {
                        if info.is_active() {
                            info.state = RotationState::CoolingDown {
                                until: Utc::now()
                                    + ChronoDuration::seconds(self.config.cooldown_secs as i64),
                            };
                            info!(wallet = prev.short(), cause = ?cause, "Wallet retired to cooldown");
                        }
                    }
                }
                if let Some(info) = wallets.get_mut(&next) {
                    info.activated_at = Utc::now();
                }
                debug!(wallet = next.short(), cause = ?cause, "Rotated to wallet");
                *current_guard = Some(next.clone());
                Ok(next)
            }
            None => match current {
                // No alternate active: keep the current wallet
                Some(current) if wallets.get(&current).map(WalletInfo::is_active) == Some(true) => {
                    debug!(wallet = current.short(), "No alternate wallet, keeping current");
                    Ok(current)
                }
                _ => {
                    warn!("No active wallet available");
                    Err(Error::NoAvailableWallet)
                }
            },
        }
    }

    fn rotation_cause(&self, info: &WalletInfo) -> Option<RotationCause> {
        if info.reputation < self.config.reputation_threshold {
            return Some(RotationCause::LowReputation);
        }
        if info.tx_count >= self.config.rotation_max_tx {
            return Some(RotationCause::UsageExceeded);
        }
        let elapsed = Utc::now()
            .signed_duration_since(info.activated_at)
            .num_seconds();
        if elapsed >= self.config.rotation_max_elapsed_secs as i64 {
            return Some(RotationCause::UsageExceeded);
        }
        let roll: f64 = self.rng.lock().expect("registry rng lock poisoned").gen();
        if roll < self.config.random_swap_chance {
            return Some(RotationCause::RandomSwap);
        }
        None
    }

    /// Force a wallet into cooldown
    pub async fn retire(&self, address: &Address) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        let info = wallets
            .get_mut(address)
            .ok_or_else(|| Error::WalletNotFound(address.to_string()))?;
        info.state = RotationState::CoolingDown {
            until: Utc::now() + ChronoDuration::seconds(self.config.cooldown_secs as i64),
        };
        info!(wallet = address.short(), "Wallet manually retired");
        Ok(())
    }

    /// Apply a trade outcome to a wallet's reputation and usage counters
    ///
    /// Returns the new reputation, always within [0, 100].
    pub async fn record_outcome(
        &self,
        address: &Address,
        success: bool,
        venue_flags: u32,
        volume: f64,
    ) -> Result<f64> {
        let mut wallets = self.wallets.write().await;
        let info = wallets
            .get_mut(address)
            .ok_or_else(|| Error::WalletNotFound(address.to_string()))?;

        let delta = if success {
            REPUTATION_SUCCESS_GAIN
        } else {
            -REPUTATION_FAILURE_LOSS
        } - venue_flags as f64 * REPUTATION_VENUE_FLAG_LOSS;
        info.reputation = (info.reputation + delta).clamp(REPUTATION_MIN, REPUTATION_MAX);

        let now = Utc::now();
        info.first_used.get_or_insert(now);
        info.last_used = Some(now);
        info.tx_count += 1;
        info.volume += volume;

        debug!(
            wallet = address.short(),
            success,
            venue_flags,
            reputation = info.reputation,
            "Recorded wallet outcome"
        );
        Ok(info.reputation)
    }

    /// Reputation map keyed by address string, for stats reporting
    pub async fn reputations(&self) -> HashMap<String, f64> {
        self.wallets
            .read()
            .await
            .iter()
            .map(|(addr, info)| (addr.to_string(), info.reputation))
            .collect()
    }

    pub async fn wallet_info(&self, address: &Address) -> Option<WalletInfo> {
        self.wallets.read().await.get(address).cloned()
    }

    pub async fn active_count(&self) -> usize {
        let mut wallets = self.wallets.write().await;
        tick_cooldowns(&mut wallets);
        wallets.values().filter(|w| w.is_active()).count()
    }
}

/// Return elapsed cooldowns to active with counters reset
fn tick_cooldowns(wallets: &mut HashMap<Address, WalletInfo>) {
    let now = Utc::now();
    for info in wallets.values_mut() {
        if let RotationState::CoolingDown { until } = info.state {
            if now >= until {
                info.state = RotationState::Active;
                info.reset_usage();
                debug!(wallet = info.address.short(), "Cooldown elapsed, wallet active again");
            }
        }
    }
}

fn least_used_active(
    wallets: &HashMap<Address, WalletInfo>,
    exclude: Option<&Address>,
) -> Option<Address> {
    wallets
        .values()
        .filter(|w| w.is_active() && Some(&w.address) != exclude)
        .min_by_key(|w| w.tx_count)
        .map(|w| w.address.clone())
}
