//! Error types for the gasless transaction pipeline
//!
//! Errors cover the whole lifecycle of a gasless swap:
//! - Instruction normalization and assembly (detection stage, never touches the network)
//! - User signing through the wallet session
//! - Fee-payer co-signing, submission and confirmation
//!
//! Every variant carries enough context for an operator to act on it
//! (balances and the fee-payer address for `InsufficientFunds`, the
//! transaction signature once it has been dispatched).

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

/// Result alias used throughout the gasless pipeline
pub type GaslessResult<T> = std::result::Result<T, GaslessError>;

/// Comprehensive error type for gasless swap operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GaslessError {
    /// An aggregator instruction descriptor could not be decoded
    ///
    /// Raised for bad base64 payloads, unparsable addresses and
    /// missing required fields.
    #[error("Malformed instruction: {0}")]
    MalformedInstruction(String),

    /// The instruction groups cannot form a valid transaction message
    #[error("Invalid instruction set: {0}")]
    InvalidInstructionSet(String),

    /// The serialized transaction received over the transport is undecodable
    #[error("Malformed transaction payload: {0}")]
    MalformedTransaction(String),

    /// The user's wallet session declined or failed to sign
    #[error("User signature rejected: {0}")]
    UserSignatureRejected(String),

    /// The fee payer is not a required signer of the incoming message
    #[error("Fee payer {fee_payer} not found among required signers: {reason}")]
    FeePayerNotInTransaction {
        /// Address of the configured fee payer
        fee_payer: Pubkey,
        /// What was wrong with the message
        reason: String,
    },

    /// The fee payer cannot cover fees plus account-creation rent
    #[error(
        "Fee payer {fee_payer} has insufficient balance: current {current_balance} lamports, required {required_balance} lamports"
    )]
    InsufficientFunds {
        /// Balance observed at check time (lamports)
        current_balance: u64,
        /// Minimum balance needed to proceed (lamports)
        required_balance: u64,
        /// Address that needs to be topped up
        fee_payer: Pubkey,
    },

    /// The network rejected the transaction during preflight simulation
    #[error("Transaction simulation failed: {message}")]
    SimulationFailed {
        /// RPC error message
        message: String,
        /// Program logs returned by the simulation, if any
        logs: Vec<String>,
    },

    /// A signature slot is missing or does not verify
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// The blockhash expired before the transaction was confirmed
    #[error(
        "Transaction {signature} not confirmed before block height {last_valid_block_height} (current {current_block_height})"
    )]
    ConfirmationTimeout {
        /// Signature of the dispatched transaction
        signature: Signature,
        /// Expiry height of the transaction's blockhash
        last_valid_block_height: u64,
        /// Block height observed when giving up
        current_block_height: u64,
    },

    /// The network no longer recognises the transaction's blockhash
    #[error("Blockhash stale: {0}")]
    BlockhashStale(String),

    /// Transient transport failure talking to the network
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The node answered but refused the request
    ///
    /// Resending the same request gets the same answer, so this is never retried.
    #[error("RPC request rejected: {message} (code: {code:?})")]
    RpcRejected {
        /// JSON-RPC error code, when the node supplied one
        code: Option<i64>,
        message: String,
    },

    /// The transaction landed but its execution failed
    #[error("Transaction {signature} failed on-chain: {reason}")]
    TransactionFailed {
        /// Signature of the failed transaction
        signature: Signature,
        /// On-chain error description
        reason: String,
    },

    /// The aggregator HTTP API returned an error
    #[error("Aggregator error: {0}")]
    Aggregator(String),

    /// Invalid configuration or key material
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GaslessError {
    /// Check if this error is potentially retryable
    ///
    /// Only transient transport failures are retried, and only while
    /// submitting; every other stage surfaces errors directly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }

    /// Whether the error was raised before any signature was produced
    pub fn is_detection_stage(&self) -> bool {
        matches!(
            self,
            Self::MalformedInstruction(_)
                | Self::InvalidInstructionSet(_)
                | Self::MalformedTransaction(_)
        )
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::MalformedInstruction(_) => "malformed_instruction",
            Self::InvalidInstructionSet(_) => "invalid_instruction_set",
            Self::MalformedTransaction(_) => "malformed_transaction",
            Self::UserSignatureRejected(_) => "user_signature",
            Self::FeePayerNotInTransaction { .. } => "fee_payer_missing",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::SimulationFailed { .. } => "simulation",
            Self::SignatureVerificationFailed(_) => "signature",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::BlockhashStale(_) => "blockhash",
            Self::NetworkError(_) => "network",
            Self::RpcRejected { .. } => "rpc_rejected",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::Aggregator(_) => "aggregator",
            Self::Configuration(_) => "config",
        }
    }

    /// Signature of the dispatched transaction, when the error happened after submission
    pub fn dispatched_signature(&self) -> Option<Signature> {
        match self {
            Self::ConfirmationTimeout { signature, .. }
            | Self::TransactionFailed { signature, .. } => Some(*signature),
            _ => None,
        }
    }
}

// Convenience constructors for common error scenarios
impl GaslessError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInstruction(reason.into())
    }

    pub fn invalid_set(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionSet(reason.into())
    }

    pub fn user_rejected(reason: impl Into<String>) -> Self {
        Self::UserSignatureRejected(reason.into())
    }

    pub fn signature_failed(reason: impl Into<String>) -> Self {
        Self::SignatureVerificationFailed(reason.into())
    }

    pub fn network(reason: impl Into<String>) -> Self {
        Self::NetworkError(reason.into())
    }

    pub fn simulation(message: impl Into<String>) -> Self {
        Self::SimulationFailed {
            message: message.into(),
            logs: Vec::new(),
        }
    }

    pub fn insufficient_funds(current_balance: u64, required_balance: u64, fee_payer: Pubkey) -> Self {
        Self::InsufficientFunds {
            current_balance,
            required_balance,
            fee_payer,
        }
    }
}
