//! Transport between the swap client and the co-signer
//!
//! The client only needs "deliver this user-signed transaction, give me the
//! outcome". `CoSigner` answers in-process; `RemoteCoSigner` talks to a
//! co-signer service over HTTP.

use crate::gasless::contract::{CoSignRequest, CoSignResponse, FeePayerStatus};
use crate::gasless::cosigner::CoSigner;
use crate::gasless::errors::{GaslessError, GaslessResult};
use crate::rpc::LedgerClient;
use async_trait::async_trait;
use reqwest::Client;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::debug;

/// Path of the co-sign endpoint relative to the service base URL
pub const CO_SIGN_PATH: &str = "/sign-and-send-solana";

/// Path of the fee-payer status endpoint
pub const FEE_PAYER_PATH: &str = "/fee-payer";

#[async_trait]
pub trait CoSignTransport: Send + Sync {
    /// Address the assembler must use as fee payer
    async fn fee_payer(&self) -> GaslessResult<Pubkey>;

    /// Deliver a user-signed transaction and wait for its outcome
    ///
    /// `Err` means the request could not be delivered; a delivered request
    /// always yields a response, successful or not.
    async fn co_sign(&self, request: CoSignRequest) -> GaslessResult<CoSignResponse>;
}

#[async_trait]
impl<L: LedgerClient + ?Sized> CoSignTransport for CoSigner<L> {
    async fn fee_payer(&self) -> GaslessResult<Pubkey> {
        Ok(CoSigner::fee_payer(self))
    }

    async fn co_sign(&self, request: CoSignRequest) -> GaslessResult<CoSignResponse> {
        Ok(CoSigner::co_sign(self, &request).await)
    }
}

/// HTTP client for a co-signer service
#[derive(Debug, Clone)]
pub struct RemoteCoSigner {
    client: Client,
    base_url: String,
}

impl RemoteCoSigner {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GaslessResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GaslessError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fee-payer address and balance as reported by the service
    pub async fn status(&self) -> GaslessResult<FeePayerStatus> {
        let url = format!("{}{}", self.base_url, FEE_PAYER_PATH);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(GaslessError::network(format!(
                "fee payer status returned HTTP {}",
                response.status()
            )));
        }
        response.json::<FeePayerStatus>().await.map_err(transport_error)
    }
}

#[async_trait]
impl CoSignTransport for RemoteCoSigner {
    async fn fee_payer(&self) -> GaslessResult<Pubkey> {
        self.status().await?.fee_payer()
    }

    async fn co_sign(&self, request: CoSignRequest) -> GaslessResult<CoSignResponse> {
        let url = format!("{}{}", self.base_url, CO_SIGN_PATH);
        debug!(url = %url, "Sending transaction to co-signer");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        // Failures are reported with a JSON body even on non-2xx statuses
        serde_json::from_str::<CoSignResponse>(&body).map_err(|e| {
            GaslessError::network(format!(
                "co-signer returned HTTP {} with an unreadable body: {}",
                status, e
            ))
        })
    }
}

fn transport_error(err: reqwest::Error) -> GaslessError {
    GaslessError::network(format!("co-signer request failed: {}", err))
}
