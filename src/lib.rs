//! Stealth Trading Engine Library
//!
//! Submits value-bearing transactions while minimizing the statistical
//! signature that separates automated trading from human activity:
//! a multi-source gas price oracle, a nonce-safe transaction lifecycle
//! manager with replace-by-fee, a behavioral obfuscation engine, and a
//! trader profile simulator tying them together.

pub mod cli;
pub mod config;
pub mod error;
pub mod gas;
pub mod lifecycle;
pub mod obfuscation;
pub mod ports;
pub mod profile;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
