//! Jupiter aggregator client
//!
//! Thin wrapper over the v6 quote API. Quotes are passed back to the
//! aggregator verbatim; only a few fields are read for display.

use crate::gasless::errors::{GaslessError, GaslessResult};
use crate::gasless::normalize::SwapInstructions;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::debug;

/// Opaque aggregator quote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Quote(pub Value);

impl Quote {
    fn field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn input_mint(&self) -> Option<&str> {
        self.field("inputMint")
    }

    pub fn output_mint(&self) -> Option<&str> {
        self.field("outputMint")
    }

    /// Amounts are decimal strings in base units
    pub fn in_amount(&self) -> Option<u64> {
        self.field("inAmount").and_then(|v| v.parse().ok())
    }

    pub fn out_amount(&self) -> Option<u64> {
        self.field("outAmount").and_then(|v| v.parse().ok())
    }

    pub fn price_impact_pct(&self) -> Option<f64> {
        self.field("priceImpactPct").and_then(|v| v.parse().ok())
    }
}

/// Jupiter v6 API client
#[derive(Debug, Clone)]
pub struct JupiterClient {
    client: Client,
    base_url: String,
    wrap_and_unwrap_sol: bool,
}

impl JupiterClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, wrap_and_unwrap_sol: bool) -> GaslessResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GaslessError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            wrap_and_unwrap_sol,
        })
    }

    /// Get a quote for swapping `amount` base units of `input_mint`
    pub async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> GaslessResult<Quote> {
        let url = format!("{}/quote", self.base_url);
        debug!(%input_mint, %output_mint, amount, slippage_bps, "Requesting quote");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            return Err(GaslessError::Aggregator(format!("quote HTTP {}: {}", status, error)));
        }

        let quote: Value = resp.json().await.map_err(request_error)?;
        Ok(Quote(quote))
    }

    /// Get the instruction groups that execute `quote` for `user`
    pub async fn get_swap_instructions(&self, quote: &Quote, user: &Pubkey) -> GaslessResult<SwapInstructions> {
        let body = serde_json::json!({
            "quoteResponse": quote,
            "userPublicKey": user.to_string(),
            "wrapAndUnwrapSol": self.wrap_and_unwrap_sol,
        });

        let resp = self
            .client
            .post(format!("{}/swap-instructions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            return Err(GaslessError::Aggregator(format!(
                "swap-instructions HTTP {}: {}",
                status, error
            )));
        }

        let data: Value = resp.json().await.map_err(request_error)?;
        if let Some(error) = data.get("error").and_then(Value::as_str) {
            return Err(GaslessError::Aggregator(error.to_string()));
        }
        SwapInstructions::from_json(data)
    }
}

fn request_error(err: reqwest::Error) -> GaslessError {
    GaslessError::Aggregator(format!("request failed: {}", err))
}
