//! Error types for the stealth trading engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the stealth trading engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    // Gas oracle errors
    #[error("Fee source '{provider}' failed: {reason}")]
    FeeSource { provider: String, reason: String },

    #[error("All fee estimate sources failed and no prior snapshot is available")]
    NoGasSnapshot,

    // Transaction lifecycle errors
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Node rejected transaction (funds/nonce): {0}")]
    InsufficientFundsOrNonce(String),

    #[error("Replacement transaction underpriced: {0}")]
    ReplacementUnderpriced(String),

    #[error("No receipt for {tx_hash} after {waited_ms}ms")]
    ReceiptTimeout { tx_hash: String, waited_ms: u64 },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Transaction {tx_hash} is {status} and cannot be replaced")]
    NotReplaceable { tx_hash: String, status: String },

    #[error("Too many pending transactions for {wallet}: {pending} outstanding, limit {max}")]
    TooManyPending {
        wallet: String,
        pending: usize,
        max: usize,
    },

    // Obfuscation errors
    #[error("Invalid trade amount: {0}")]
    InvalidAmount(f64),

    #[error("Split generation failed: {0}")]
    SplitGeneration(String),

    // Wallet registry errors
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("No available wallet: all wallets cooling down")]
    NoAvailableWallet,

    // Profile errors
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Profile definitions invalid: {0}")]
    ProfileDefinition(String),

    #[error("Profile policy failed: {0}")]
    Policy(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_)
                | Error::RpcTimeout(_)
                | Error::RpcConnection(_)
                | Error::FeeSource { .. }
                | Error::TransactionSend(_)
                | Error::ReceiptTimeout { .. }
        )
    }

    /// Check if this error means the caller should retry with a higher fee
    pub fn is_underpriced(&self) -> bool {
        matches!(self, Error::ReplacementUnderpriced(_))
    }

    /// Classify a raw node rejection message into a typed error
    ///
    /// Node error strings are not standardized across clients, so this
    /// matches the common geth/erigon/nethermind phrasings.
    pub fn from_node_rejection(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("insufficient funds") || lower.contains("nonce too low") {
            Error::InsufficientFundsOrNonce(message.to_string())
        } else if lower.contains("replacement transaction underpriced")
            || lower.contains("already known")
        {
            Error::ReplacementUnderpriced(message.to_string())
        } else {
            Error::TransactionSend(message.to_string())
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::RpcTimeout(0)
        } else if e.is_connect() {
            Error::RpcConnection(e.to_string())
        } else {
            Error::Rpc(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Rpc("boom".into()).is_retryable());
        assert!(Error::RpcTimeout(500).is_retryable());
        let source_err = Error::FeeSource {
            provider: "etherscan".into(),
            reason: "rate limited".into(),
        };
        assert!(source_err.is_retryable());
        assert_eq!(
            source_err.to_string(),
            "Fee source 'etherscan' failed: rate limited"
        );
        assert!(!Error::NoAvailableWallet.is_retryable());
        assert!(!Error::InsufficientFundsOrNonce("nonce too low".into()).is_retryable());
    }

    #[test]
    fn test_node_rejection_classification() {
        assert!(matches!(
            Error::from_node_rejection("insufficient funds for gas * price + value"),
            Error::InsufficientFundsOrNonce(_)
        ));
        assert!(matches!(
            Error::from_node_rejection("nonce too low"),
            Error::InsufficientFundsOrNonce(_)
        ));
        assert!(matches!(
            Error::from_node_rejection("replacement transaction underpriced"),
            Error::ReplacementUnderpriced(_)
        ));
        assert!(matches!(
            Error::from_node_rejection("connection reset"),
            Error::TransactionSend(_)
        ));
    }
}
