//! Thin JSON-RPC chain client
//!
//! Minimal eth_* wrapper over reqwest; no retry logic here, transient
//! failures surface typed and the caller decides.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::trace;

use super::chain::{Address, Block, BlockTx, ChainRpc, Receipt, SignedTx, TxHash, UnsignedTx};
use crate::error::{Error, Result};

pub struct HttpChainRpc {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl HttpChainRpc {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        trace!(method, "JSON-RPC call");
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: JsonRpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            // Submission rejections carry node-specific messages worth
            // classifying; everything else is a plain RPC error
            if method == "eth_sendRawTransaction" {
                return Err(Error::from_node_rejection(&err.message));
            }
            return Err(Error::Rpc(format!("{} ({})", err.message, err.code)));
        }

        response
            .result
            .ok_or_else(|| Error::Rpc(format!("{}: empty result", method)))
    }
}

#[async_trait]
impl ChainRpc for HttpChainRpc {
    async fn get_nonce(&self, address: &Address) -> Result<u64> {
        let result = self
            .call(
                "eth_getTransactionCount",
                json!([address.as_str(), "latest"]),
            )
            .await?;
        parse_hex_u64(&result)
    }

    async fn gas_price(&self) -> Result<u128> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        parse_hex_u128(&result)
    }

    async fn estimate_gas(&self, tx: &UnsignedTx) -> Result<u64> {
        let call_obj = json!({
            "from": tx.from.as_str(),
            "to": tx.to.as_str(),
            "value": to_hex(tx.value),
            "data": format!("0x{}", hex::encode(&tx.data)),
        });
        let result = self.call("eth_estimateGas", json!([call_obj])).await?;
        parse_hex_u64(&result)
    }

    async fn send_raw_transaction(&self, tx: &SignedTx) -> Result<TxHash> {
        let raw = format!("0x{}", hex::encode(&tx.raw));
        let result = self.call("eth_sendRawTransaction", json!([raw])).await?;
        let hash_str = result
            .as_str()
            .ok_or_else(|| Error::Rpc("non-string tx hash".into()))?;
        TxHash::parse(hash_str)
    }

    async fn get_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>> {
        let result = self
            .call("eth_getTransactionReceipt", json!([hash.as_str()]))
            .await;
        let value = match result {
            Ok(v) => v,
            // Nodes answer a null result for unknown hashes; our call()
            // maps empty results to an error, so translate it back
            Err(Error::Rpc(msg)) if msg.contains("empty result") => return Ok(None),
            Err(e) => return Err(e),
        };
        if value.is_null() {
            return Ok(None);
        }

        let status_hex = value
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("0x0");
        Ok(Some(Receipt {
            tx_hash: hash.clone(),
            block_number: parse_hex_u64(
                value
                    .get("blockNumber")
                    .ok_or_else(|| Error::Rpc("receipt missing blockNumber".into()))?,
            )?,
            status: status_hex == "0x1",
            gas_used: value
                .get("gasUsed")
                .map(parse_hex_u64)
                .transpose()?
                .unwrap_or(0),
            effective_gas_price: value
                .get("effectiveGasPrice")
                .map(parse_hex_u128)
                .transpose()?
                .unwrap_or(0),
        }))
    }

    async fn get_block(&self, number: u64, with_txs: bool) -> Result<Option<Block>> {
        let result = self
            .call(
                "eth_getBlockByNumber",
                json!([to_hex(number as u128), with_txs]),
            )
            .await;
        let value = match result {
            Ok(v) if v.is_null() => return Ok(None),
            Ok(v) => v,
            // Unknown blocks come back as a null result, which call()
            // maps to an error; translate it back
            Err(Error::Rpc(msg)) if msg.contains("empty result") => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut transactions = Vec::new();
        if with_txs {
            for (i, tx) in value
                .get("transactions")
                .and_then(Value::as_array)
                .map(|a| a.as_slice())
                .unwrap_or(&[])
                .iter()
                .enumerate()
            {
                let (Some(hash), Some(from)) = (
                    tx.get("hash").and_then(Value::as_str),
                    tx.get("from").and_then(Value::as_str),
                ) else {
                    continue;
                };
                transactions.push(BlockTx {
                    hash: TxHash::parse(hash)?,
                    from: Address::parse(from)?,
                    to: tx
                        .get("to")
                        .and_then(Value::as_str)
                        .map(Address::parse)
                        .transpose()?,
                    gas_price: tx
                        .get("gasPrice")
                        .map(parse_hex_u128)
                        .transpose()?
                        .unwrap_or(0),
                    index: i as u32,
                });
            }
        }

        Ok(Some(Block {
            number: parse_hex_u64(
                value
                    .get("number")
                    .ok_or_else(|| Error::Rpc("block missing number".into()))?,
            )?,
            transactions,
        }))
    }

    async fn block_number(&self) -> Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&result)
    }
}

fn to_hex(v: u128) -> String {
    format!("0x{:x}", v)
}

fn parse_hex_u64(v: &Value) -> Result<u64> {
    let s = v
        .as_str()
        .ok_or_else(|| Error::Rpc(format!("expected hex string, got {}", v)))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| Error::Rpc(format!("bad hex quantity {}: {}", s, e)))
}

fn parse_hex_u128(v: &Value) -> Result<u128> {
    let s = v
        .as_str()
        .ok_or_else(|| Error::Rpc(format!("expected hex string, got {}", v)))?;
    u128::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| Error::Rpc(format!("bad hex quantity {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(to_hex(255), "0xff");
        assert_eq!(parse_hex_u64(&json!("0xff")).unwrap(), 255);
        assert_eq!(
            parse_hex_u128(&json!("0x174876e800")).unwrap(),
            100_000_000_000
        );
    }

    #[test]
    fn test_hex_parse_rejects_junk() {
        assert!(parse_hex_u64(&json!("zz")).is_err());
        assert!(parse_hex_u64(&json!(12)).is_err());
    }

    #[test]
    fn test_json_rpc_error_shape() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#;
        let parsed: JsonRpcResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.unwrap().message, "nonce too low");
    }
}
