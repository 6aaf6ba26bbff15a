//! Configuration module for the gasless swap service
//!
//! Configuration is loaded from a TOML file; every section is optional and
//! falls back to defaults. A `.env` file and process environment variables
//! override the file for the deployment-specific values (RPC endpoint,
//! port, fee-payer secret).

use crate::gasless::cosigner::{
    CoSignPolicy, DEFAULT_ACCOUNT_CREATION_BUFFER_LAMPORTS, DEFAULT_MIN_BALANCE_LAMPORTS,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable holding the base58 fee-payer secret
pub const FEE_PAYER_SECRET_ENV: &str = "FEE_PAYMASTER_SOLANA_PRIVATE_KEY";

/// Legacy name of the fee-payer secret variable
pub const FEE_PAYER_SECRET_ENV_ALIAS: &str = "VITE_WALLET_PAY_MASTER";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Solana RPC endpoint
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Where the fee-payer key comes from
    #[serde(default)]
    pub fee_payer: FeePayerConfig,

    /// Co-sign state machine tunables
    #[serde(default)]
    pub cosigner: CoSignerConfig,

    /// Liquidity aggregator
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Co-signer HTTP service
    #[serde(default)]
    pub server: ServerConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeePayerConfig {
    /// Path to keypair file
    #[serde(default)]
    pub keypair_path: Option<String>,

    /// Environment variable holding a base58 secret key
    #[serde(default = "default_secret_env")]
    pub secret_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoSignerConfig {
    /// Below this balance every request is refused
    #[serde(default = "default_min_balance")]
    pub min_balance_lamports: u64,

    /// Added to the fee estimate for rent of accounts created for the user
    #[serde(default = "default_account_creation_buffer")]
    pub account_creation_buffer_lamports: u64,

    #[serde(default = "default_max_submit_retries")]
    pub max_submit_retries: usize,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_confirm_poll_interval")]
    pub confirm_poll_interval_ms: u64,

    #[serde(default)]
    pub skip_preflight: bool,

    #[serde(default = "default_explorer_base_url")]
    pub explorer_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_aggregator_url")]
    pub base_url: String,

    #[serde(default = "default_aggregator_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub wrap_and_unwrap_sol: bool,

    /// Co-signer service used by the `swap` command when not signing in-process
    #[serde(default)]
    pub cosigner_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_secret_env() -> Option<String> { Some(FEE_PAYER_SECRET_ENV.to_string()) }
fn default_min_balance() -> u64 { DEFAULT_MIN_BALANCE_LAMPORTS }
fn default_account_creation_buffer() -> u64 { DEFAULT_ACCOUNT_CREATION_BUFFER_LAMPORTS }
fn default_max_submit_retries() -> usize { 3 }
fn default_retry_base_delay() -> u64 { 100 }
fn default_confirm_poll_interval() -> u64 { 500 }
fn default_explorer_base_url() -> String { "https://solscan.io/tx".to_string() }
fn default_aggregator_url() -> String { "https://quote-api.jup.ag/v6".to_string() }
fn default_aggregator_timeout() -> u64 { 15 }
fn default_bind_addr() -> String { "0.0.0.0:3001".to_string() }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for FeePayerConfig {
    fn default() -> Self {
        Self {
            keypair_path: None,
            secret_env: default_secret_env(),
        }
    }
}

impl Default for CoSignerConfig {
    fn default() -> Self {
        Self {
            min_balance_lamports: default_min_balance(),
            account_creation_buffer_lamports: default_account_creation_buffer(),
            max_submit_retries: default_max_submit_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            confirm_poll_interval_ms: default_confirm_poll_interval(),
            skip_preflight: false,
            explorer_base_url: default_explorer_base_url(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_aggregator_url(),
            timeout_secs: default_aggregator_timeout(),
            wrap_and_unwrap_sol: true,
            cosigner_url: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Load configuration (or defaults when `path` is `None`) with `.env` and environment overrides
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SOLANA_RPC_URL") {
            self.rpc.url = url;
        }

        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
            let mut addr = self.bind_addr()?;
            addr.set_port(port);
            self.server.bind_addr = addr.to_string();
        }

        // The legacy variable name is honoured when the primary one is absent
        if self.fee_payer.secret_env.as_deref() == Some(FEE_PAYER_SECRET_ENV)
            && lookup(FEE_PAYER_SECRET_ENV).is_none()
            && lookup(FEE_PAYER_SECRET_ENV_ALIAS).is_some()
        {
            self.fee_payer.secret_env = Some(FEE_PAYER_SECRET_ENV_ALIAS.to_string());
        }

        Ok(())
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.rpc.url.starts_with("http://") && !self.rpc.url.starts_with("https://") {
            anyhow::bail!("rpc.url must be an http(s) URL, got '{}'", self.rpc.url);
        }
        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be positive");
        }
        if self.cosigner.confirm_poll_interval_ms == 0 {
            anyhow::bail!("cosigner.confirm_poll_interval_ms must be positive");
        }
        if self.cosigner.min_balance_lamports == 0 {
            anyhow::bail!("cosigner.min_balance_lamports must be positive");
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid server.bind_addr '{}'", self.server.bind_addr))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn aggregator_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregator.timeout_secs)
    }

    /// Co-sign policy derived from the `[cosigner]` section
    pub fn cosign_policy(&self) -> CoSignPolicy {
        CoSignPolicy {
            min_balance_lamports: self.cosigner.min_balance_lamports,
            account_creation_buffer_lamports: self.cosigner.account_creation_buffer_lamports,
            max_submit_retries: self.cosigner.max_submit_retries,
            retry_base_delay: Duration::from_millis(self.cosigner.retry_base_delay_ms),
            confirm_poll_interval: Duration::from_millis(self.cosigner.confirm_poll_interval_ms),
            skip_preflight: self.cosigner.skip_preflight,
            explorer_base_url: self.cosigner.explorer_base_url.clone(),
        }
    }
}
