//! In-process nonce sequencing
//!
//! The chain's account nonce is read exactly once per wallet to seed a
//! local counter; every later assignment comes from the counter under a
//! lock. Two concurrent trades from the same wallet can therefore never
//! draw the same nonce, which is the single most safety-critical
//! invariant in the system.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::ports::{Address, ChainRpc};

pub struct NonceTracker {
    rpc: Arc<dyn ChainRpc>,
    counters: DashMap<Address, u64>,
}

impl NonceTracker {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            rpc,
            counters: DashMap::new(),
        }
    }

    /// Reserve the next nonce for `address`.
    ///
    /// The increment happens under the entry's shard lock, never across an
    /// await. The seeding fetch runs before insertion; if two tasks race
    /// the first cold call, `or_insert` keeps whichever seed landed first
    /// and both still receive distinct values from the counter.
    pub async fn next(&self, address: &Address) -> Result<u64> {
        if let Some(mut counter) = self.counters.get_mut(address) {
            let nonce = *counter;
            *counter += 1;
            return Ok(nonce);
        }

        let seed = self.rpc.get_nonce(address).await?;
        debug!(wallet = %address.short(), seed, "Seeded nonce counter from chain");

        let mut counter = self.counters.entry(address.clone()).or_insert(seed);
        let nonce = *counter;
        *counter += 1;
        Ok(nonce)
    }

    /// Return a reserved nonce after a failed sign/broadcast.
    ///
    /// Only the most recently issued nonce can be returned; anything older
    /// has live transactions sequenced after it and must be resolved by
    /// replacement instead.
    pub fn unreserve(&self, address: &Address, nonce: u64) {
        if let Some(mut counter) = self.counters.get_mut(address) {
            if *counter == nonce + 1 {
                *counter = nonce;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::Error;
    use crate::ports::{Block, Receipt, SignedTx, TxHash, UnsignedTx};

    struct FixedNonceRpc {
        nonce: u64,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ChainRpc for FixedNonceRpc {
        async fn get_nonce(&self, _address: &Address) -> Result<u64> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.nonce)
        }
        async fn gas_price(&self) -> Result<u128> {
            Ok(1)
        }
        async fn estimate_gas(&self, _tx: &UnsignedTx) -> Result<u64> {
            Ok(21_000)
        }
        async fn send_raw_transaction(&self, _tx: &SignedTx) -> Result<TxHash> {
            Err(Error::Internal("not used".into()))
        }
        async fn get_receipt(&self, _hash: &TxHash) -> Result<Option<Receipt>> {
            Ok(None)
        }
        async fn get_block(&self, _number: u64, _with_txs: bool) -> Result<Option<Block>> {
            Ok(None)
        }
        async fn block_number(&self) -> Result<u64> {
            Ok(0)
        }
    }

    fn wallet() -> Address {
        Address::parse(&format!("0x{}", "aa".repeat(20))).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_nonces_increase_from_seed() {
        let rpc = Arc::new(FixedNonceRpc {
            nonce: 42,
            fetches: AtomicUsize::new(0),
        });
        let tracker = NonceTracker::new(rpc.clone());
        let addr = wallet();

        assert_eq!(tracker.next(&addr).await.unwrap(), 42);
        assert_eq!(tracker.next(&addr).await.unwrap(), 43);
        assert_eq!(tracker.next(&addr).await.unwrap(), 44);
        assert_eq!(rpc.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_distinct_and_dense() {
        let rpc = Arc::new(FixedNonceRpc {
            nonce: 0,
            fetches: AtomicUsize::new(0),
        });
        let tracker = Arc::new(NonceTracker::new(rpc));
        let addr = wallet();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let tracker = tracker.clone();
            let addr = addr.clone();
            handles.push(tokio::spawn(
                async move { tracker.next(&addr).await.unwrap() },
            ));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        assert_eq!(seen.len(), 32);
        // Dense range, no gaps
        assert_eq!(*seen.iter().max().unwrap(), 31);
    }

    #[tokio::test]
    async fn test_unreserve_returns_only_the_latest() {
        let rpc = Arc::new(FixedNonceRpc {
            nonce: 10,
            fetches: AtomicUsize::new(0),
        });
        let tracker = NonceTracker::new(rpc);
        let addr = wallet();

        let first = tracker.next(&addr).await.unwrap();
        let second = tracker.next(&addr).await.unwrap();

        // Returning the older nonce is a no-op
        tracker.unreserve(&addr, first);
        assert_eq!(tracker.next(&addr).await.unwrap(), second + 1);

        // Returning the newest reuses it
        tracker.unreserve(&addr, second + 1);
        assert_eq!(tracker.next(&addr).await.unwrap(), second + 1);
    }

    #[tokio::test]
    async fn test_wallets_are_independent() {
        let rpc = Arc::new(FixedNonceRpc {
            nonce: 5,
            fetches: AtomicUsize::new(0),
        });
        let tracker = NonceTracker::new(rpc);
        let a = wallet();
        let b = Address::parse(&format!("0x{}", "bb".repeat(20))).unwrap();

        assert_eq!(tracker.next(&a).await.unwrap(), 5);
        assert_eq!(tracker.next(&b).await.unwrap(), 5);
        assert_eq!(tracker.next(&a).await.unwrap(), 6);
    }
}
