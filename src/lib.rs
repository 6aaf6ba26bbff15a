//! Gasless Solana swaps
//!
//! A third-party fee payer covers network fees and account rent for a
//! user's aggregator swap. The library holds the transaction pipeline, the
//! fee-payer co-signer and the HTTP surface around them.

pub mod aggregator;
pub mod compat;
pub mod config;
pub mod gasless;
pub mod metrics;
pub mod observability;
pub mod rpc;
pub mod server;
pub mod wallet;

// Re-export commonly used types
pub use gasless::{GaslessError, GaslessResult};
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};
