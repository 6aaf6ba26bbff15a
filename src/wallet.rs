//! Fee-payer wallet loading

use crate::config::FeePayerConfig;
use crate::gasless::errors::GaslessResult;
use crate::gasless::signing::MessageSigner;
use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

/// Local keypair wallet used as the fee-payer signer
#[derive(Clone)]
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
}

impl KeypairWallet {
    /// Load from a keypair file (raw 64 bytes or a JSON byte array)
    pub fn from_file(path: &str) -> Result<Self> {
        let file_bytes = Zeroizing::new(
            std::fs::read(path).with_context(|| format!("Failed to read keypair file: {}", path))?,
        );

        let keypair = if file_bytes.len() == 64 {
            keypair_from_bytes(&file_bytes)?
        } else {
            let json: Zeroizing<Vec<u8>> = Zeroizing::new(
                serde_json::from_slice(&file_bytes).context("Failed to parse keypair JSON")?,
            );
            keypair_from_bytes(&json)?
        };

        Ok(Self::from_keypair(keypair))
    }

    /// Load from a base58-encoded 64-byte secret key
    pub fn from_base58(secret: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(secret.trim())
                .into_vec()
                .context("Fee payer secret is not valid base58")?,
        );
        Ok(Self::from_keypair(keypair_from_bytes(&bytes)?))
    }

    /// Load from a base58 secret held in environment variable `var`
    pub fn from_env(var: &str) -> Result<Self> {
        let secret = Zeroizing::new(
            std::env::var(var).with_context(|| format!("Environment variable {} is not set", var))?,
        );
        Self::from_base58(&secret).with_context(|| format!("Invalid fee payer secret in {}", var))
    }

    /// Resolve the fee payer from configuration; the environment secret wins over the file
    pub fn load(config: &FeePayerConfig) -> Result<Self> {
        let wallet = if let Some(var) = config.secret_env.as_deref().filter(|v| std::env::var(v).is_ok()) {
            Self::from_env(var)?
        } else if let Some(path) = config.keypair_path.as_deref() {
            Self::from_file(path)?
        } else {
            anyhow::bail!("No fee payer configured: set fee_payer.keypair_path or fee_payer.secret_env");
        };
        info!(fee_payer = %wallet.pubkey(), "Fee payer wallet loaded");
        Ok(wallet)
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Shared signing capability for the co-signer
    pub fn signer(&self) -> Arc<dyn MessageSigner> {
        Arc::new(self.clone())
    }
}

impl std::fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageSigner for KeypairWallet {
    fn address(&self) -> Pubkey {
        self.pubkey()
    }

    async fn sign_bytes(&self, message: &[u8]) -> GaslessResult<Signature> {
        self.keypair.as_ref().sign_bytes(message).await
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 64 {
        anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}
