//! External collaborator ports
//!
//! Everything the engine consumes from the outside world lives behind a
//! narrow trait here: the chain RPC, the signer, fee-estimate sources and
//! the optional profile-selection policy. Shipped implementations are thin
//! I/O wrappers; tests substitute mocks.

pub mod chain;
pub mod fee_source;
pub mod http;
pub mod policy;
pub mod signer;

pub use chain::{Address, Block, BlockTx, ChainRpc, FeeParams, Receipt, SignedTx, TxHash, UnsignedTx};
pub use fee_source::{ExplorerFeeSource, FeeEstimateSource, NodeFeeSource};
pub use http::HttpChainRpc;
pub use policy::{ChainStatusReport, OperationType, ProfilePolicy, RuleBasedPolicy};
pub use signer::TxSigner;
