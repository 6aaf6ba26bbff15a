//! Wire contract between the swap client and the co-signer
//!
//! Field names are camelCase JSON. Optional fields are omitted when absent so
//! a success response carries only `success`, `transactionSignature`,
//! `explorerUrl` and `feePayerBalance`.

use crate::gasless::cosigner::{CoSignFailure, CoSignReceipt};
use crate::gasless::errors::{GaslessError, GaslessResult};
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
use std::str::FromStr;

/// Body of `POST /sign-and-send-solana`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoSignRequest {
    /// Base64 of the bincode-serialized, user-signed versioned transaction
    pub serialized_transaction: String,
    /// Expiry height of the message's blockhash, if the client knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_valid_block_height: Option<u64>,
}

impl CoSignRequest {
    pub fn new(serialized_transaction: String, last_valid_block_height: Option<u64>) -> Self {
        Self {
            serialized_transaction,
            last_valid_block_height,
        }
    }

    /// Decode the carried transaction
    pub fn decode_transaction(&self) -> GaslessResult<VersionedTransaction> {
        let trimmed = self.serialized_transaction.trim();
        if trimmed.is_empty() {
            return Err(GaslessError::MalformedTransaction(
                "serializedTransaction is empty".to_string(),
            ));
        }
        let bytes = general_purpose::STANDARD
            .decode(trimmed)
            .map_err(|e| GaslessError::MalformedTransaction(format!("invalid base64: {}", e)))?;
        bincode::deserialize::<VersionedTransaction>(&bytes)
            .map_err(|e| GaslessError::MalformedTransaction(format!("invalid transaction bytes: {}", e)))
    }
}

/// Result of a co-sign request as seen by the client
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoSignResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_top_up: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_balance: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_balance: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_failed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer_balance: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CoSignResponse {
    pub fn succeeded(receipt: &CoSignReceipt) -> Self {
        Self {
            success: true,
            transaction_signature: Some(receipt.signature.to_string()),
            explorer_url: Some(receipt.explorer_url.clone()),
            fee_payer_balance: Some(receipt.fee_payer_balance),
            ..Self::default()
        }
    }

    pub fn failed(failure: &CoSignFailure, fee_payer: &Pubkey) -> Self {
        let mut response = Self::rejected(&failure.error, fee_payer);
        if let Some(signature) = failure.signature {
            response.transaction_signature = Some(signature.to_string());
        }
        if response.fee_payer_balance.is_none() {
            response.fee_payer_balance = failure.fee_payer_balance;
        }
        response
    }

    /// Response for an error raised before any transaction was dispatched
    pub fn rejected(error: &GaslessError, fee_payer: &Pubkey) -> Self {
        let mut response = Self {
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.category().to_string()),
            ..Self::default()
        };

        match error {
            GaslessError::InsufficientFunds {
                current_balance,
                required_balance,
                fee_payer,
            } => {
                response.needs_top_up = Some(true);
                response.current_balance = Some(*current_balance);
                response.required_balance = Some(*required_balance);
                response.fee_payer_address = Some(fee_payer.to_string());
                response.fee_payer_balance = Some(*current_balance);
                response.message = Some(format!(
                    "Fee payer needs at least {:.4} SOL, has {:.4} SOL. Send SOL to {} to continue.",
                    lamports_to_sol(*required_balance),
                    lamports_to_sol(*current_balance),
                    fee_payer
                ));
            }
            GaslessError::SimulationFailed { .. } => {
                response.simulation_failed = Some(true);
                response.needs_top_up = Some(true);
                response.fee_payer_address = Some(fee_payer.to_string());
                response.message = Some(
                    "Simulation failed; the fee payer may lack funds for account creation".to_string(),
                );
            }
            GaslessError::SignatureVerificationFailed(_) => {
                response.signature_error = Some(true);
                response.message =
                    Some("Transaction signature verification failed".to_string());
            }
            GaslessError::FeePayerNotInTransaction { fee_payer, .. } => {
                response.fee_payer_address = Some(fee_payer.to_string());
            }
            _ => {}
        }

        if let Some(signature) = error.dispatched_signature() {
            response.transaction_signature = Some(signature.to_string());
        }
        response
    }

    /// Lamports still needed before the fee payer can serve requests
    pub fn shortfall_lamports(&self) -> Option<u64> {
        match (self.needs_top_up, self.required_balance, self.current_balance) {
            (Some(true), Some(required), Some(current)) => Some(required.saturating_sub(current)),
            _ => None,
        }
    }

    /// Parsed `transactionSignature`, if present and valid
    pub fn signature(&self) -> Option<Signature> {
        self.transaction_signature
            .as_deref()
            .and_then(|s| Signature::from_str(s).ok())
    }
}

/// Body of `GET /fee-payer`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeePayerStatus {
    pub fee_payer_address: String,
    pub balance: u64,
    pub min_balance: u64,
    pub needs_top_up: bool,
}

impl FeePayerStatus {
    pub fn new(fee_payer: &Pubkey, balance: u64, min_balance: u64) -> Self {
        Self {
            fee_payer_address: fee_payer.to_string(),
            balance,
            min_balance,
            needs_top_up: balance < min_balance,
        }
    }

    pub fn fee_payer(&self) -> GaslessResult<Pubkey> {
        Pubkey::from_str(&self.fee_payer_address).map_err(|e| {
            GaslessError::Configuration(format!(
                "invalid fee payer address {}: {}",
                self.fee_payer_address, e
            ))
        })
    }
}

fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_client_field_names() {
        let request: CoSignRequest =
            serde_json::from_value(json!({ "serializedTransaction": "AAAA" })).unwrap();
        assert_eq!(request.serialized_transaction, "AAAA");
        assert_eq!(request.last_valid_block_height, None);

        let request: CoSignRequest = serde_json::from_value(
            json!({ "serializedTransaction": "AAAA", "lastValidBlockHeight": 1234 }),
        )
        .unwrap();
        assert_eq!(request.last_valid_block_height, Some(1234));
    }

    #[test]
    fn test_undecodable_payloads() {
        for payload in ["", "   ", "not base64!!", "AAAA"] {
            let request = CoSignRequest::new(payload.to_string(), None);
            assert!(matches!(
                request.decode_transaction(),
                Err(GaslessError::MalformedTransaction(_))
            ));
        }
    }

    #[test]
    fn test_insufficient_funds_response() {
        let fee_payer = Pubkey::new_unique();
        let err = GaslessError::insufficient_funds(4_000_000, 10_000_000, fee_payer);
        let response = CoSignResponse::rejected(&err, &fee_payer);

        assert!(!response.success);
        assert_eq!(response.needs_top_up, Some(true));
        assert_eq!(response.current_balance, Some(4_000_000));
        assert_eq!(response.required_balance, Some(10_000_000));
        assert_eq!(response.fee_payer_address, Some(fee_payer.to_string()));
        assert_eq!(response.shortfall_lamports(), Some(6_000_000));
        assert!(response.message.unwrap().contains("0.0100 SOL"));
    }

    #[test]
    fn test_camel_case_and_omitted_fields() {
        let fee_payer = Pubkey::new_unique();
        let response = CoSignResponse::rejected(
            &GaslessError::signature_failed("slot 1 empty"),
            &fee_payer,
        );
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], json!(false));
        assert_eq!(value["signatureError"], json!(true));
        assert_eq!(value["errorKind"], json!("signature"));
        assert!(value.get("needsTopUp").is_none());
        assert!(value.get("transactionSignature").is_none());
    }

    #[test]
    fn test_post_dispatch_error_keeps_signature() {
        let signature = Signature::from([3u8; 64]);
        let err = GaslessError::ConfirmationTimeout {
            signature,
            last_valid_block_height: 10,
            current_block_height: 11,
        };
        let response = CoSignResponse::rejected(&err, &Pubkey::new_unique());
        assert_eq!(response.signature(), Some(signature));
    }

    #[test]
    fn test_fee_payer_status() {
        let fee_payer = Pubkey::new_unique();
        let status = FeePayerStatus::new(&fee_payer, 9_999_999, 10_000_000);
        assert!(status.needs_top_up);
        assert_eq!(status.fee_payer().unwrap(), fee_payer);

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["feePayerAddress"], json!(fee_payer.to_string()));
        assert_eq!(value["minBalance"], json!(10_000_000));
    }

    #[test]
    fn test_simulation_failure_flags() {
        let fee_payer = Pubkey::new_unique();
        let response = CoSignResponse::rejected(&GaslessError::simulation("boom"), &fee_payer);
        assert_eq!(response.simulation_failed, Some(true));
        assert_eq!(response.needs_top_up, Some(true));
        assert_eq!(response.shortfall_lamports(), None);
    }
}
