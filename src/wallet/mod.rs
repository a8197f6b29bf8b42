//! Wallet registry
//!
//! Tracks reputation, usage and cooldown per signing address and decides
//! which wallet the next trade goes out from.

pub mod registry;
pub mod types;

pub use registry::WalletRegistry;
pub use types::{RotationState, WalletInfo};
