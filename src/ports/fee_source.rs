//! Fee estimate source port and shipped implementations
//!
//! The oracle merges any number of these; each one is independently
//! timeoutable and allowed to fail without taking down a refresh.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::chain::ChainRpc;
use crate::config::ExplorerSourceConfig;
use crate::error::{Error, Result};
use crate::gas::GasTier;

/// One independently failable estimate source
#[async_trait]
pub trait FeeEstimateSource: Send + Sync {
    fn name(&self) -> &str;

    /// Per-tier estimates in wei; tiers a source cannot price are omitted
    async fn estimates(&self) -> Result<HashMap<GasTier, u128>>;
}

/// Direct node read, the source that is always available
pub struct NodeFeeSource {
    rpc: Arc<dyn ChainRpc>,
}

impl NodeFeeSource {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl FeeEstimateSource for NodeFeeSource {
    fn name(&self) -> &str {
        "node"
    }

    async fn estimates(&self) -> Result<HashMap<GasTier, u128>> {
        let price = self.rpc.gas_price().await?;
        // eth_gasPrice is a single mid-market figure; the oracle derives
        // the surrounding tiers
        Ok(HashMap::from([(GasTier::Standard, price)]))
    }
}

/// Etherscan-style gas tracker response
#[derive(Debug, Deserialize)]
struct GasTrackerResponse {
    result: GasTrackerResult,
}

#[derive(Debug, Deserialize)]
struct GasTrackerResult {
    #[serde(rename = "SafeGasPrice")]
    safe: String,
    #[serde(rename = "ProposeGasPrice")]
    propose: String,
    #[serde(rename = "FastGasPrice")]
    fast: String,
}

/// Explorer HTTP gas tracker (etherscan-compatible API shape)
pub struct ExplorerFeeSource {
    config: ExplorerSourceConfig,
    client: reqwest::Client,
}

impl ExplorerFeeSource {
    pub fn new(config: ExplorerSourceConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client build failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn request_url(&self) -> String {
        if self.config.api_key.is_empty() {
            self.config.url.clone()
        } else {
            let sep = if self.config.url.contains('?') { '&' } else { '?' };
            format!("{}{}apikey={}", self.config.url, sep, self.config.api_key)
        }
    }
}

#[async_trait]
impl FeeEstimateSource for ExplorerFeeSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn estimates(&self) -> Result<HashMap<GasTier, u128>> {
        let response: GasTrackerResponse = self
            .client
            .get(self.request_url())
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::FeeSource {
                provider: self.config.name.clone(),
                reason: e.to_string(),
            })?
            .json()
            .await?;

        let mut out = HashMap::new();
        for (tier, raw) in [
            (GasTier::Safe, &response.result.safe),
            (GasTier::Standard, &response.result.propose),
            (GasTier::Fast, &response.result.fast),
        ] {
            match parse_gwei(raw) {
                Some(wei) => {
                    out.insert(tier, wei);
                }
                None => debug!(
                    source = self.config.name,
                    tier = tier.as_str(),
                    value = raw,
                    "Unparseable tier estimate, skipping"
                ),
            }
        }

        if out.is_empty() {
            return Err(Error::FeeSource {
                provider: self.config.name.clone(),
                reason: "no parseable tiers in response".to_string(),
            });
        }
        Ok(out)
    }
}

/// Parse a decimal-gwei string into wei
fn parse_gwei(s: &str) -> Option<u128> {
    let gwei: f64 = s.trim().parse().ok()?;
    if !gwei.is_finite() || gwei <= 0.0 {
        return None;
    }
    Some((gwei * 1e9) as u128)
}
