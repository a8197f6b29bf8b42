//! Front-run detection diagnostic
//!
//! Inspects a mined block's ordering around one of our transactions and
//! flags same-recipient transactions that got in first with a higher fee.
//! Diagnostic only, nothing blocks on it.

use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use crate::ports::{Address, Block, ChainRpc, TxHash};

/// A transaction mined before ours against the same contract at a higher fee
#[derive(Debug, Clone)]
pub struct FrontRunSuspect {
    pub hash: TxHash,
    pub from: Address,
    pub index: u32,
    pub gas_price: u128,
    /// Our own effective price, for comparison in reports
    pub target_gas_price: u128,
}

/// Scan a block's transaction ordering around `target`
pub fn detect_front_running(block: &Block, target: &TxHash) -> Vec<FrontRunSuspect> {
    let Some(ours) = block.transactions.iter().find(|tx| &tx.hash == target) else {
        return Vec::new();
    };
    let Some(contract) = ours.to.as_ref() else {
        // Contract creations have no recipient to race against
        return Vec::new();
    };

    block
        .transactions
        .iter()
        .filter(|tx| {
            tx.index < ours.index
                && tx.to.as_ref() == Some(contract)
                && tx.gas_price > ours.gas_price
                && tx.from != ours.from
        })
        .map(|tx| FrontRunSuspect {
            hash: tx.hash.clone(),
            from: tx.from.clone(),
            index: tx.index,
            gas_price: tx.gas_price,
            target_gas_price: ours.gas_price,
        })
        .collect()
}

/// Convenience wrapper that fetches the block itself
pub struct FrontRunInspector {
    rpc: Arc<dyn ChainRpc>,
}

impl FrontRunInspector {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    pub async fn inspect(&self, block_number: u64, target: &TxHash) -> Result<Vec<FrontRunSuspect>> {
        let block = self
            .rpc
            .get_block(block_number, true)
            .await?
            .ok_or_else(|| Error::Rpc(format!("block {} not found", block_number)))?;

        let suspects = detect_front_running(&block, target);
        if !suspects.is_empty() {
            info!(
                block = block_number,
                target = target.short(),
                suspects = suspects.len(),
                "Possible front-running detected"
            );
        }
        Ok(suspects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BlockTx;

    fn addr(byte: u8) -> Address {
        Address::parse(&format!("0x{}", hex::encode([byte; 20]))).unwrap()
    }

    fn hash(byte: u8) -> TxHash {
        TxHash::parse(&format!("0x{}", hex::encode([byte; 32]))).unwrap()
    }

    fn tx(h: u8, from: u8, to: Option<u8>, gas_price: u128, index: u32) -> BlockTx {
        BlockTx {
            hash: hash(h),
            from: addr(from),
            to: to.map(addr),
            gas_price,
            index,
        }
    }

    #[test]
    fn test_flags_earlier_higher_fee_same_contract() {
        let block = Block {
            number: 100,
            transactions: vec![
                tx(1, 0xaa, Some(0x11), 90, 0),  // same contract, higher fee, earlier
                tx(2, 0xbb, Some(0x22), 95, 1),  // different contract
                tx(3, 0xcc, Some(0x11), 40, 2),  // same contract, cheaper
                tx(9, 0x01, Some(0x11), 50, 3),  // ours
                tx(4, 0xdd, Some(0x11), 99, 4),  // after ours
            ],
        };

        let suspects = detect_front_running(&block, &hash(9));
        assert_eq!(suspects.len(), 1);
        assert_eq!(suspects[0].hash, hash(1));
        assert_eq!(suspects[0].target_gas_price, 50);
    }

    #[test]
    fn test_target_absent_yields_empty() {
        let block = Block {
            number: 1,
            transactions: vec![tx(1, 0xaa, Some(0x11), 90, 0)],
        };
        assert!(detect_front_running(&block, &hash(9)).is_empty());
    }

    #[test]
    fn test_own_other_transactions_not_flagged() {
        let block = Block {
            number: 1,
            transactions: vec![
                tx(1, 0x01, Some(0x11), 90, 0), // our own sender, skip
                tx(9, 0x01, Some(0x11), 50, 1),
            ],
        };
        assert!(detect_front_running(&block, &hash(9)).is_empty());
    }
}
