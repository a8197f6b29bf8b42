//! Transaction lifecycle management
//!
//! Owns per-wallet nonce sequencing, submission, confirmation polling and
//! replace-by-fee semantics. This is where real funds move, so every error
//! path is typed and returned to the caller rather than logged away.

pub mod manager;
pub mod nonce;
pub mod types;

pub use manager::TransactionLifecycleManager;
pub use nonce::NonceTracker;
pub use types::{PendingTransaction, SubmitRequest, TransactionRecord, TxStatus};
