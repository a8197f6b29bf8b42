//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::gas::{FrontRunInspector, GasPriceOracle, GasTier};
use crate::obfuscation::{BehavioralObfuscationEngine, TradeIntent};
use crate::ports::{
    Address, ExplorerFeeSource, FeeEstimateSource, HttpChainRpc, NodeFeeSource, OperationType,
    RuleBasedPolicy, TxHash,
};
use crate::profile::{load_profiles, TraderProfileSimulator};
use crate::wallet::WalletRegistry;

/// Refresh the gas oracle once and print the tier table
pub async fn gas(config: &Config) -> Result<()> {
    let oracle = build_oracle(config)?;
    let snapshot = oracle
        .refresh()
        .await
        .context("Gas snapshot refresh failed")?;

    println!("Gas prices ({} sources):", snapshot.healthy_sources);
    for tier in GasTier::ALL {
        println!(
            "  {:<8} {:>14} wei ({:.2} gwei)",
            tier.as_str(),
            snapshot.price(tier),
            snapshot.price(tier) as f64 / 1e9
        );
    }
    if snapshot.stale {
        warn!("Snapshot is stale: all sources failed on the last refresh");
    }
    Ok(())
}

/// Produce one obfuscated execution plan and print it as JSON
pub async fn plan(
    config: &Config,
    token: &str,
    amount: f64,
    op: &str,
    venue: Option<String>,
) -> Result<()> {
    let op_type = match op.to_ascii_lowercase().as_str() {
        "buy" => OperationType::Buy,
        "sell" => OperationType::Sell,
        other => anyhow::bail!("Unknown operation '{}', expected buy or sell", other),
    };

    let simulator = build_simulator(config)?;
    let intent = TradeIntent {
        token: token.to_string(),
        amount,
        op_type,
        venue,
    };

    let plan = simulator.get_execution_parameters(&intent).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Check a mined block for front-running around one of our transactions
pub async fn frontrun(config: &Config, tx_hash: &str, block: u64) -> Result<()> {
    let target = TxHash::parse(tx_hash)?;
    let timeout = Duration::from_millis(config.chain.request_timeout_ms);
    let rpc = Arc::new(HttpChainRpc::new(&config.chain.rpc_endpoint, timeout)?);

    let suspects = FrontRunInspector::new(rpc).inspect(block, &target).await?;
    if suspects.is_empty() {
        println!("No front-running suspects in block {}", block);
        return Ok(());
    }
    println!("{} suspect(s) ahead of {} in block {}:", suspects.len(), target, block);
    for suspect in suspects {
        println!(
            "  #{:<4} {} from {} at {} wei (ours: {} wei)",
            suspect.index, suspect.hash, suspect.from, suspect.gas_price, suspect.target_gas_price
        );
    }
    Ok(())
}

/// List the loaded trader profiles
pub fn profiles(config: &Config) -> Result<()> {
    let profiles = load_profiles(&config.simulator.profiles_path)?;

    let mut names: Vec<&String> = profiles.keys().collect();
    names.sort();
    for name in names {
        let profile = &profiles[name];
        println!(
            "{} (risk: {}, experience: {})",
            profile.name, profile.risk, profile.experience
        );
        for pattern in &profile.patterns {
            println!(
                "  pattern {:<20} tier={:<8} slippage={}bps  ~{}/h",
                pattern.name,
                pattern.gas_tier.as_str(),
                pattern.slippage_bps,
                pattern.tx_per_hour
            );
        }
    }
    Ok(())
}

/// Show the active configuration with secrets masked
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

fn build_oracle(config: &Config) -> Result<Arc<GasPriceOracle>> {
    let timeout = Duration::from_millis(config.chain.request_timeout_ms);
    let rpc = Arc::new(HttpChainRpc::new(&config.chain.rpc_endpoint, timeout)?);

    let source_timeout = Duration::from_millis(config.gas.source_timeout_ms);
    let mut sources: Vec<Arc<dyn FeeEstimateSource>> = vec![Arc::new(NodeFeeSource::new(rpc))];
    for explorer in &config.gas.explorer_sources {
        info!(source = %explorer.name, "Adding explorer fee source");
        sources.push(Arc::new(ExplorerFeeSource::new(
            explorer.clone(),
            source_timeout,
        )?));
    }

    Ok(Arc::new(GasPriceOracle::new(config.gas.clone(), sources)))
}

fn build_simulator(config: &Config) -> Result<TraderProfileSimulator> {
    let addresses: Vec<Address> = config
        .wallets
        .addresses
        .iter()
        .map(|s| Address::parse(s))
        .collect::<crate::error::Result<_>>()
        .context("Invalid wallet address in configuration")?;
    if addresses.is_empty() {
        anyhow::bail!("No wallet addresses configured (wallets.addresses)");
    }

    let registry = Arc::new(WalletRegistry::new(config.wallets.clone(), addresses));
    let engine = Arc::new(BehavioralObfuscationEngine::new(
        config.obfuscation.clone(),
        registry.clone(),
    ));
    let oracle = build_oracle(config)?;
    let profiles = load_profiles(&config.simulator.profiles_path)?;

    let mut names: Vec<String> = profiles.keys().cloned().collect();
    names.sort();
    let policy = Arc::new(RuleBasedPolicy::new(
        names,
        config.simulator.default_profile.clone(),
    ));

    let simulator = TraderProfileSimulator::new(
        config.simulator.clone(),
        config.chain.name.clone(),
        profiles,
        engine,
        registry,
        oracle,
        Some(policy),
    )?;
    Ok(simulator)
}
