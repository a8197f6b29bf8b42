//! Chain RPC port and core chain types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A checksummable hex account address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse and normalize an 0x-prefixed 20-byte hex address
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .ok_or_else(|| Error::InvalidAddress(format!("missing 0x prefix: {}", trimmed)))?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidAddress(trimmed.to_string()));
        }
        Ok(Self(format!("0x{}", hex_part.to_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        &self.0[..10.min(self.0.len())]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chain-native transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Parse and normalize an 0x-prefixed 32-byte hex hash
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .ok_or_else(|| Error::InvalidTxHash(format!("missing 0x prefix: {}", trimmed)))?;
        if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidTxHash(trimmed.to_string()));
        }
        Ok(Self(format!("0x{}", hex_part.to_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..10.min(self.0.len())]
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fee parameters, legacy or EIP-1559 style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeParams {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeParams {
    /// The effective price ceiling for comparisons
    pub fn cap(&self) -> u128 {
        match self {
            FeeParams::Legacy { gas_price } => *gas_price,
            FeeParams::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }

    /// Bump every component by `pct` percent, always strictly higher
    pub fn bumped(&self, pct: f64) -> FeeParams {
        let bump = |v: u128| -> u128 {
            let raised = (v as f64 * (1.0 + pct / 100.0)).ceil() as u128;
            raised.max(v + 1)
        };
        match self {
            FeeParams::Legacy { gas_price } => FeeParams::Legacy {
                gas_price: bump(*gas_price),
            },
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => FeeParams::Eip1559 {
                max_fee_per_gas: bump(*max_fee_per_gas),
                max_priority_fee_per_gas: bump(*max_priority_fee_per_gas),
            },
        }
    }

    /// Scale the fee by a multiplier (gas-tier bias), keeping the shape
    pub fn scaled(&self, multiplier: f64) -> FeeParams {
        let scale = |v: u128| -> u128 { (v as f64 * multiplier).round() as u128 };
        match self {
            FeeParams::Legacy { gas_price } => FeeParams::Legacy {
                gas_price: scale(*gas_price),
            },
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => FeeParams::Eip1559 {
                max_fee_per_gas: scale(*max_fee_per_gas),
                max_priority_fee_per_gas: scale(*max_priority_fee_per_gas),
            },
        }
    }
}

/// A fully parameterized transaction awaiting signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub fee: FeeParams,
    pub chain_id: u64,
}

/// An opaque signed transaction blob ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub raw: Vec<u8>,
}

/// A mined transaction receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

/// A transaction as it appears inside a mined block
#[derive(Debug, Clone)]
pub struct BlockTx {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    pub gas_price: u128,
    pub index: u32,
}

/// A mined block, optionally with its transaction list
#[derive(Debug, Clone)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<BlockTx>,
}

/// Chain RPC port consumed by the oracle and lifecycle manager
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Confirmed account nonce, used once to seed the in-process counter
    async fn get_nonce(&self, address: &Address) -> Result<u64>;

    /// Direct node gas price read, always available as a fee source
    async fn gas_price(&self) -> Result<u128>;

    async fn estimate_gas(&self, tx: &UnsignedTx) -> Result<u64>;

    async fn send_raw_transaction(&self, tx: &SignedTx) -> Result<TxHash>;

    /// None while the transaction is still in the mempool
    async fn get_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>>;

    async fn get_block(&self, number: u64, with_txs: bool) -> Result<Option<Block>>;

    async fn block_number(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_normalizes_case() {
        let addr = Address::parse("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_address_parse_rejects_bad_input() {
        assert!(Address::parse("abcdef").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzzzdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_tx_hash_parse() {
        let h = TxHash::parse(&format!("0x{}", "ab".repeat(32))).unwrap();
        assert_eq!(h.as_str().len(), 66);
        assert!(TxHash::parse("0x1234").is_err());
    }

    #[test]
    fn test_fee_bump_is_strictly_higher() {
        let fee = FeeParams::Legacy { gas_price: 8 };
        // 12.5% of 8 is exactly 1, and the floor guarantees +1 even for tiny fees
        let bumped = fee.bumped(12.5);
        assert!(bumped.cap() > fee.cap());

        let tiny = FeeParams::Legacy { gas_price: 1 };
        assert!(tiny.bumped(12.5).cap() > 1);
    }

    #[test]
    fn test_eip1559_bump_raises_both_components() {
        let fee = FeeParams::Eip1559 {
            max_fee_per_gas: 100_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
        };
        match fee.bumped(12.5) {
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                assert_eq!(max_fee_per_gas, 112_500_000_000);
                assert_eq!(max_priority_fee_per_gas, 2_250_000_000);
            }
            _ => panic!("bump changed fee shape"),
        }
    }

    #[test]
    fn test_fee_scaling() {
        let fee = FeeParams::Legacy { gas_price: 100 };
        assert_eq!(fee.scaled(1.25).cap(), 125);
        assert_eq!(fee.scaled(0.85).cap(), 85);
    }
}
