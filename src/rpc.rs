//! Network access for the gasless pipeline
//!
//! `LedgerClient` is the black-box RPC surface the core depends on: balance,
//! blockhash, fee estimate, submission, status and lookup-table accounts.
//! `SolanaLedger` implements it over the nonblocking `solana-client`
//! `RpcClient`; tests substitute an in-memory fake.

use crate::gasless::assemble::RecentBlockhash;
use crate::gasless::errors::{GaslessError, GaslessResult};
use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSendTransactionConfig,
};
use solana_rpc_client_api::{
    custom_error::{
        JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED, JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY,
        JSON_RPC_SERVER_ERROR_SEND_TRANSACTION_PREFLIGHT_FAILURE,
        JSON_RPC_SERVER_ERROR_TRANSACTION_PRECOMPILE_VERIFICATION_FAILURE,
        JSON_RPC_SERVER_ERROR_TRANSACTION_SIGNATURE_VERIFICATION_FAILURE,
    },
    request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};
use std::time::Duration;

/// Outcome of a landed transaction; `None` from status queries means not yet seen
pub type TransactionStatus = Result<(), TransactionError>;

/// RPC surface used by the assembler and the co-signer
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_balance(&self, pubkey: &Pubkey) -> GaslessResult<u64>;

    async fn get_latest_blockhash(&self) -> GaslessResult<RecentBlockhash>;

    async fn get_fee_for_message(&self, message: &VersionedMessage) -> GaslessResult<u64>;

    /// Submit a fully signed transaction once; the node rebroadcasts up to `max_retries` times
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
        max_retries: usize,
    ) -> GaslessResult<Signature>;

    async fn get_signature_status(&self, signature: &Signature) -> GaslessResult<Option<TransactionStatus>>;

    async fn get_block_height(&self) -> GaslessResult<u64>;

    async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> GaslessResult<Vec<Option<Account>>>;
}

/// `LedgerClient` backed by a Solana JSON-RPC endpoint
pub struct SolanaLedger {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaLedger {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url.into(), timeout, commitment),
            commitment,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

impl std::fmt::Debug for SolanaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedger")
            .field("url", &self.client.url())
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

#[async_trait]
impl LedgerClient for SolanaLedger {
    async fn get_balance(&self, pubkey: &Pubkey) -> GaslessResult<u64> {
        self.client.get_balance(pubkey).await.map_err(classify_client_error)
    }

    async fn get_latest_blockhash(&self) -> GaslessResult<RecentBlockhash> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(classify_client_error)?;
        Ok(RecentBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_fee_for_message(&self, message: &VersionedMessage) -> GaslessResult<u64> {
        let fee = match message {
            VersionedMessage::Legacy(legacy) => self.client.get_fee_for_message(legacy).await,
            VersionedMessage::V0(v0) => self.client.get_fee_for_message(v0).await,
        };
        fee.map_err(classify_client_error)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
        max_retries: usize,
    ) -> GaslessResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            max_retries: Some(max_retries),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(classify_client_error)
    }

    async fn get_signature_status(&self, signature: &Signature) -> GaslessResult<Option<TransactionStatus>> {
        self.client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await
            .map_err(classify_client_error)
    }

    async fn get_block_height(&self) -> GaslessResult<u64> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(classify_client_error)
    }

    async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> GaslessResult<Vec<Option<Account>>> {
        self.client
            .get_multiple_accounts(pubkeys)
            .await
            .map_err(classify_client_error)
    }
}

/// Map an on-chain or preflight transaction error to the pipeline taxonomy
pub fn classify_transaction_error(err: &TransactionError) -> Option<GaslessError> {
    match err {
        TransactionError::SignatureFailure | TransactionError::MissingSignatureForFee => Some(
            GaslessError::signature_failed(format!("network rejected signatures: {}", err)),
        ),
        TransactionError::BlockhashNotFound => {
            Some(GaslessError::BlockhashStale(err.to_string()))
        }
        _ => None,
    }
}

/// JSON-RPC "invalid params": the node could not deserialize or sanitize the request
const JSON_RPC_INVALID_PARAMS: i64 = -32602;

/// Classify a `solana-client` error
///
/// Structured errors are checked first; message matching covers nodes that
/// only report text. Only transport failures and transient node states become
/// `NetworkError`; anything else the node refused is not worth resending.
pub fn classify_client_error(err: ClientError) -> GaslessError {
    if let Some(tx_err) = err.get_transaction_error() {
        if let Some(classified) = classify_transaction_error(&tx_err) {
            return classified;
        }
    }

    match err.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, data }) => {
            classify_response_error(*code, message, data)
        }
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => GaslessError::network(err.to_string()),
        _ => classify_error_message(&err.to_string()),
    }
}

/// Classify a JSON-RPC error response by its code
pub fn classify_response_error(code: i64, message: &str, data: &RpcResponseErrorData) -> GaslessError {
    if let RpcResponseErrorData::SendTransactionPreflightFailure(result) = data {
        return GaslessError::SimulationFailed {
            message: message.to_string(),
            logs: result.logs.clone().unwrap_or_default(),
        };
    }

    match code {
        JSON_RPC_SERVER_ERROR_SEND_TRANSACTION_PREFLIGHT_FAILURE => GaslessError::simulation(message),
        JSON_RPC_SERVER_ERROR_TRANSACTION_SIGNATURE_VERIFICATION_FAILURE => {
            GaslessError::signature_failed(message)
        }
        JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY | JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED => {
            GaslessError::network(message)
        }
        JSON_RPC_SERVER_ERROR_TRANSACTION_PRECOMPILE_VERIFICATION_FAILURE | JSON_RPC_INVALID_PARAMS => {
            GaslessError::RpcRejected {
                code: Some(code),
                message: message.to_string(),
            }
        }
        _ => match classify_error_message(message) {
            GaslessError::RpcRejected { message, .. } => GaslessError::RpcRejected {
                code: Some(code),
                message,
            },
            other => other,
        },
    }
}

/// Whether an error reports that some payer could not cover fees or rent
pub fn mentions_insufficient_funds(err: &GaslessError) -> bool {
    let text = match err {
        GaslessError::SimulationFailed { message, logs } => {
            format!("{} {}", message, logs.join(" "))
        }
        other => other.to_string(),
    }
    .to_lowercase();
    text.contains("insufficient lamports")
        || text.contains("insufficient funds")
        || text.contains("insufficientfundsforfee")
        || text.contains("insufficientfundsforrent")
}

/// Message-based fallback classification
///
/// Unrecognised messages are treated as a refusal, never as transient.
pub fn classify_error_message(message: &str) -> GaslessError {
    let lower = message.to_lowercase();

    if lower.contains("precompile verification failure") {
        GaslessError::RpcRejected {
            code: None,
            message: message.to_string(),
        }
    } else if lower.contains("signature verification failed")
        || lower.contains("signature verification failure")
        || lower.contains("signature failure")
    {
        GaslessError::signature_failed(message.to_string())
    } else if lower.contains("blockhash not found") {
        GaslessError::BlockhashStale(message.to_string())
    } else if lower.contains("transaction simulation failed") {
        GaslessError::simulation(message.to_string())
    } else if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("node is unhealthy")
        || lower.contains("node is behind")
    {
        GaslessError::network(message.to_string())
    } else {
        GaslessError::RpcRejected {
            code: None,
            message: message.to_string(),
        }
    }
}
