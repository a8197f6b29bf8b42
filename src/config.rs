//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub gas: GasOracleConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub obfuscation: ObfuscationConfig,
    #[serde(default)]
    pub wallets: WalletRegistryConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Chain name used for policy keying and logging
    #[serde(default = "default_chain_name")]
    pub name: String,
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: default_chain_name(),
            rpc_endpoint: default_rpc_endpoint(),
            chain_id: default_chain_id(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Gas price oracle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GasOracleConfig {
    /// Snapshot refresh interval
    #[serde(default = "default_gas_refresh_secs")]
    pub refresh_interval_secs: u64,

    /// Per-source fetch timeout
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,

    /// Lower clamp for every tier, in wei
    #[serde(default = "default_min_gas_price")]
    pub min_price_wei: u64,

    /// Upper clamp for every tier, in wei
    #[serde(default = "default_max_gas_price")]
    pub max_price_wei: u64,

    /// Optional explorer-style HTTP fee sources
    #[serde(default)]
    pub explorer_sources: Vec<ExplorerSourceConfig>,
}

impl Default for GasOracleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_gas_refresh_secs(),
            source_timeout_ms: default_source_timeout_ms(),
            min_price_wei: default_min_gas_price(),
            max_price_wei: default_max_gas_price(),
            explorer_sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Transaction lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Fail-fast cap on outstanding transactions per wallet
    #[serde(default = "default_max_pending_per_wallet")]
    pub max_pending_per_wallet: usize,

    /// Extra blocks required on top of a mined receipt
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u64,

    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_interval_ms: u64,

    /// Background monitor scan interval
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    /// A submitted transaction with no receipt after this long is timed out
    #[serde(default = "default_tx_timeout_secs")]
    pub tx_timeout_secs: u64,

    /// Fee bump applied by cancel/speed-up, percent over the original
    #[serde(default = "default_replacement_bump_pct")]
    pub replacement_bump_pct: f64,

    /// Gas limit used when the caller pins none and estimation fails
    #[serde(default = "default_fallback_gas_limit")]
    pub fallback_gas_limit: u64,

    /// Retained terminal records
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_pending_per_wallet: default_max_pending_per_wallet(),
            min_confirmations: default_min_confirmations(),
            receipt_poll_interval_ms: default_receipt_poll_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            tx_timeout_secs: default_tx_timeout_secs(),
            replacement_bump_pct: default_replacement_bump_pct(),
            fallback_gas_limit: default_fallback_gas_limit(),
            history_limit: default_history_limit(),
        }
    }
}

/// Behavioral obfuscation configuration
///
/// The heuristic constants here (random swap chance, escalation factors,
/// dust odds) come straight from observed human trading noise and are kept
/// configurable rather than baked in.
#[derive(Debug, Clone, Deserialize)]
pub struct ObfuscationConfig {
    /// Amount at which the split probability saturates at 1.0
    #[serde(default = "default_split_reference_amount")]
    pub split_reference_amount: f64,

    #[serde(default = "default_max_splits")]
    pub max_splits: usize,

    /// Probability of appending a dust micro-transaction
    #[serde(default = "default_dust_probability")]
    pub dust_probability: f64,

    /// Dust size bounds as a fraction of the trade (0.0005 = 0.05%)
    #[serde(default = "default_dust_min_fraction")]
    pub dust_min_fraction: f64,
    #[serde(default = "default_dust_max_fraction")]
    pub dust_max_fraction: f64,

    /// Identical (type, token) run length that trips the pattern detector
    #[serde(default = "default_max_consecutive_similar")]
    pub max_consecutive_similar: usize,

    /// Rolling pattern-history window size
    #[serde(default = "default_pattern_window")]
    pub pattern_window: usize,

    /// Variance multiplier applied while the detector is tripped
    #[serde(default = "default_detector_variance_boost")]
    pub detector_variance_boost: f64,

    /// Session hours before timing variance starts escalating
    #[serde(default = "default_escalation_after_hours")]
    pub session_escalation_after_hours: f64,

    /// Additional variance per session hour past the threshold
    #[serde(default = "default_escalation_per_hour")]
    pub session_escalation_per_hour: f64,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            split_reference_amount: default_split_reference_amount(),
            max_splits: default_max_splits(),
            dust_probability: default_dust_probability(),
            dust_min_fraction: default_dust_min_fraction(),
            dust_max_fraction: default_dust_max_fraction(),
            max_consecutive_similar: default_max_consecutive_similar(),
            pattern_window: default_pattern_window(),
            detector_variance_boost: default_detector_variance_boost(),
            session_escalation_after_hours: default_escalation_after_hours(),
            session_escalation_per_hour: default_escalation_per_hour(),
        }
    }
}

/// Wallet registry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WalletRegistryConfig {
    /// Signing addresses managed by the registry
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Reputation below which the current wallet is retired
    #[serde(default = "default_reputation_threshold")]
    pub reputation_threshold: f64,

    /// Transactions before forced rotation
    #[serde(default = "default_rotation_max_tx")]
    pub rotation_max_tx: u64,

    /// Seconds of continuous use before forced rotation
    #[serde(default = "default_rotation_max_elapsed_secs")]
    pub rotation_max_elapsed_secs: u64,

    /// Chance of rotating even when nothing requires it
    #[serde(default = "default_random_swap_chance")]
    pub random_swap_chance: f64,

    /// Mandatory rest period for a retired wallet
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for WalletRegistryConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            reputation_threshold: default_reputation_threshold(),
            rotation_max_tx: default_rotation_max_tx(),
            rotation_max_elapsed_secs: default_rotation_max_elapsed_secs(),
            random_swap_chance: default_random_swap_chance(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Trader profile simulator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    /// Profile definition file; built-ins are used when absent
    #[serde(default = "default_profiles_path")]
    pub profiles_path: String,

    /// Profile rotation interval bounds (a random point inside is drawn)
    #[serde(default = "default_rotation_min_secs")]
    pub rotation_min_secs: u64,
    #[serde(default = "default_rotation_max_secs")]
    pub rotation_max_secs: u64,

    /// Report aggregate counters to the policy every N outcomes
    #[serde(default = "default_report_every")]
    pub report_status_every: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles_path: default_profiles_path(),
            rotation_min_secs: default_rotation_min_secs(),
            rotation_max_secs: default_rotation_max_secs(),
            report_status_every: default_report_every(),
        }
    }
}

// Default value functions
fn default_chain_name() -> String {
    "ethereum".to_string()
}

fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:8545".into())
}

fn default_chain_id() -> u64 {
    1
}

fn default_request_timeout_ms() -> u64 {
    10000
}

fn default_gas_refresh_secs() -> u64 {
    15
}

fn default_source_timeout_ms() -> u64 {
    3000
}

fn default_min_gas_price() -> u64 {
    1_000_000_000 // 1 gwei
}

fn default_max_gas_price() -> u64 {
    500_000_000_000 // 500 gwei
}

fn default_max_pending_per_wallet() -> usize {
    5
}

fn default_min_confirmations() -> u64 {
    1
}

fn default_receipt_poll_ms() -> u64 {
    1000
}

fn default_monitor_interval_ms() -> u64 {
    2000
}

fn default_tx_timeout_secs() -> u64 {
    180
}

fn default_replacement_bump_pct() -> f64 {
    12.5
}

fn default_fallback_gas_limit() -> u64 {
    250_000
}

fn default_history_limit() -> usize {
    1000
}

fn default_split_reference_amount() -> f64 {
    1000.0
}

fn default_max_splits() -> usize {
    4
}

fn default_dust_probability() -> f64 {
    0.1
}

fn default_dust_min_fraction() -> f64 {
    0.0005
}

fn default_dust_max_fraction() -> f64 {
    0.002
}

fn default_max_consecutive_similar() -> usize {
    3
}

fn default_pattern_window() -> usize {
    20
}

fn default_detector_variance_boost() -> f64 {
    1.5
}

fn default_escalation_after_hours() -> f64 {
    2.0
}

fn default_escalation_per_hour() -> f64 {
    0.25
}

fn default_reputation_threshold() -> f64 {
    40.0
}

fn default_rotation_max_tx() -> u64 {
    25
}

fn default_rotation_max_elapsed_secs() -> u64 {
    3600
}

fn default_random_swap_chance() -> f64 {
    0.2
}

fn default_cooldown_secs() -> u64 {
    1800
}

fn default_profile_name() -> String {
    "intermediate".to_string()
}

fn default_profiles_path() -> String {
    "profiles.json".to_string()
}

fn default_rotation_min_secs() -> u64 {
    1800
}

fn default_rotation_max_secs() -> u64 {
    7200
}

fn default_report_every() -> u64 {
    20
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("chain.rpc_endpoint", default_rpc_endpoint())?
            .set_default("chain.chain_id", default_chain_id() as i64)?
            .set_default("gas.refresh_interval_secs", default_gas_refresh_secs() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix STEALTH_)
            .add_source(
                config::Environment::with_prefix("STEALTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.gas.min_price_wei == 0 {
            anyhow::bail!("gas.min_price_wei must be positive");
        }
        if self.gas.max_price_wei <= self.gas.min_price_wei {
            anyhow::bail!(
                "gas.max_price_wei ({}) must exceed min_price_wei ({})",
                self.gas.max_price_wei,
                self.gas.min_price_wei
            );
        }

        if self.lifecycle.max_pending_per_wallet == 0 {
            anyhow::bail!("lifecycle.max_pending_per_wallet must be at least 1");
        }
        if self.lifecycle.replacement_bump_pct <= 0.0 {
            anyhow::bail!("lifecycle.replacement_bump_pct must be positive");
        }

        if self.obfuscation.max_splits < 2 {
            anyhow::bail!("obfuscation.max_splits must be at least 2");
        }
        if !(0.0..=1.0).contains(&self.obfuscation.dust_probability) {
            anyhow::bail!("obfuscation.dust_probability must be within [0, 1]");
        }
        if self.obfuscation.dust_min_fraction > self.obfuscation.dust_max_fraction {
            anyhow::bail!("obfuscation.dust_min_fraction exceeds dust_max_fraction");
        }
        if self.obfuscation.max_consecutive_similar == 0 {
            anyhow::bail!("obfuscation.max_consecutive_similar must be at least 1");
        }

        if !(0.0..=1.0).contains(&self.wallets.random_swap_chance) {
            anyhow::bail!("wallets.random_swap_chance must be within [0, 1]");
        }
        if !(0.0..=100.0).contains(&self.wallets.reputation_threshold) {
            anyhow::bail!("wallets.reputation_threshold must be within [0, 100]");
        }
        for address in &self.wallets.addresses {
            crate::ports::Address::parse(address)
                .map_err(|e| anyhow::anyhow!("wallets.addresses: {}", e))?;
        }

        if self.simulator.rotation_min_secs > self.simulator.rotation_max_secs {
            anyhow::bail!("simulator.rotation_min_secs exceeds rotation_max_secs");
        }
        if self.simulator.report_status_every == 0 {
            anyhow::bail!("simulator.report_status_every must be at least 1");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Chain:
    name: {}
    rpc: {}
    chain_id: {}
  Gas Oracle:
    refresh: {}s
    source_timeout: {}ms
    band: [{}, {}] wei
    explorer_sources: {}
  Lifecycle:
    max_pending_per_wallet: {}
    min_confirmations: {}
    tx_timeout: {}s
    replacement_bump: {}%
  Obfuscation:
    split_reference: {}
    max_splits: {}
    dust_probability: {}
  Wallets:
    count: {}
    reputation_threshold: {}
    random_swap_chance: {}
    cooldown: {}s
  Simulator:
    default_profile: {}
    rotation: [{}s, {}s]
"#,
            self.chain.name,
            mask_url(&self.chain.rpc_endpoint),
            self.chain.chain_id,
            self.gas.refresh_interval_secs,
            self.gas.source_timeout_ms,
            self.gas.min_price_wei,
            self.gas.max_price_wei,
            self.gas
                .explorer_sources
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.lifecycle.max_pending_per_wallet,
            self.lifecycle.min_confirmations,
            self.lifecycle.tx_timeout_secs,
            self.lifecycle.replacement_bump_pct,
            self.obfuscation.split_reference_amount,
            self.obfuscation.max_splits,
            self.obfuscation.dust_probability,
            self.wallets.addresses.len(),
            self.wallets.reputation_threshold,
            self.wallets.random_swap_chance,
            self.wallets.cooldown_secs,
            self.simulator.default_profile,
            self.simulator.rotation_min_secs,
            self.simulator.rotation_max_secs,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            gas: GasOracleConfig::default(),
            lifecycle: LifecycleConfig::default(),
            obfuscation: ObfuscationConfig::default(),
            wallets: WalletRegistryConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gas.refresh_interval_secs, 15);
        assert_eq!(config.lifecycle.max_pending_per_wallet, 5);
        assert_eq!(config.wallets.random_swap_chance, 0.2);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_inverted_gas_band() {
        let mut config = Config::default();
        config.gas.max_price_wei = config.gas.min_price_wei;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_swap_chance() {
        let mut config = Config::default();
        config.wallets.random_swap_chance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_address() {
        let mut config = Config::default();
        config.wallets.addresses = vec!["not-an-address".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://rpc.example.com?apikey=secret"),
            "https://rpc.example.com?***"
        );
        assert_eq!(mask_url("https://rpc.example.com"), "https://rpc.example.com");
    }
}
