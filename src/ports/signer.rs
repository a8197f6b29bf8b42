//! Signer port
//!
//! Key material stays behind this trait; the engine only ever hands over a
//! single fully parameterized transaction and receives the signed blob back.

use async_trait::async_trait;

use super::chain::{SignedTx, UnsignedTx};
use crate::error::Result;

#[async_trait]
pub trait TxSigner: Send + Sync {
    /// Sign one transaction for the sender in `tx.from`
    async fn sign(&self, tx: &UnsignedTx) -> Result<SignedTx>;
}
