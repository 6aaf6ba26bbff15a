//! Signing capabilities and the user signing step
//!
//! Both parties sign through the same capability: raw message bytes in, a
//! detached ed25519 signature out. The user's side is normally a hosted
//! wallet session; the fee payer's side is a local keypair. Either can be
//! replaced by a deterministic fake in tests.

use crate::compat;
use crate::gasless::assemble::AssembledTransaction;
use crate::gasless::errors::{GaslessError, GaslessResult};
use crate::gasless::signatures::{verifies, SignatureSlots};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use tracing::{debug, info};

/// Async `sign(bytes) -> signature` capability
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Public key the signatures verify against
    fn address(&self) -> Pubkey;

    /// Sign exactly `message`
    async fn sign_bytes(&self, message: &[u8]) -> GaslessResult<Signature>;
}

#[async_trait]
impl MessageSigner for Keypair {
    fn address(&self) -> Pubkey {
        self.pubkey()
    }

    async fn sign_bytes(&self, message: &[u8]) -> GaslessResult<Signature> {
        self.try_sign_message(message)
            .map_err(|e| GaslessError::Configuration(format!("keypair signing failed: {}", e)))
    }
}

/// A transaction carrying the user's signature, ready for the fee payer
///
/// Immutable: re-signing after any change means restarting the flow.
#[derive(Debug, Clone)]
pub struct UserSignedTransaction {
    transaction: VersionedTransaction,
    user: Pubkey,
    user_index: usize,
    last_valid_block_height: u64,
}

impl UserSignedTransaction {
    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    pub fn user(&self) -> &Pubkey {
        &self.user
    }

    pub fn user_index(&self) -> usize {
        self.user_index
    }

    pub fn user_signature(&self) -> &Signature {
        &self.transaction.signatures[self.user_index]
    }

    pub fn last_valid_block_height(&self) -> u64 {
        self.last_valid_block_height
    }

    /// Wire bytes of the half-signed transaction
    pub fn serialize(&self) -> GaslessResult<Vec<u8>> {
        bincode::serialize(&self.transaction)
            .map_err(|e| GaslessError::invalid_set(format!("transaction serialization failed: {}", e)))
    }

    /// Base64 wire form used across the transport boundary
    pub fn to_base64(&self) -> GaslessResult<String> {
        Ok(general_purpose::STANDARD.encode(self.serialize()?))
    }
}

/// Obtain the user's signature over the assembled message and attach it
///
/// The signature is placed at the user's index in the signer prefix; every
/// other slot stays empty for the co-signer to fill.
///
/// # Errors
///
/// - `InvalidInstructionSet` if the user is not a required signer
/// - `UserSignatureRejected` if the session fails or returns a signature
///   that does not verify over the message bytes
pub async fn sign_as_user(
    assembled: AssembledTransaction,
    user: &dyn MessageSigner,
) -> GaslessResult<UserSignedTransaction> {
    let user_pubkey = user.address();
    let (message, last_valid_block_height) = assembled.into_parts();

    let user_index = compat::signer_index(&message, &user_pubkey).ok_or_else(|| {
        GaslessError::invalid_set(format!("user {} is not a required signer", user_pubkey))
    })?;

    let message_bytes = message.serialize();
    debug!(user = %user_pubkey, bytes = message_bytes.len(), "Requesting user signature");

    let signature = user
        .sign_bytes(&message_bytes)
        .await
        .map_err(|e| match e {
            GaslessError::UserSignatureRejected(_) => e,
            other => GaslessError::user_rejected(other.to_string()),
        })?;

    if !verifies(&signature, &user_pubkey, &message_bytes) {
        return Err(GaslessError::user_rejected(
            "wallet returned a signature that does not verify over the message",
        ));
    }

    let mut slots = SignatureSlots::empty_for(&message);
    slots.place(user_index, signature)?;

    info!(
        user = %user_pubkey,
        user_index,
        signers = slots.len(),
        "User signature attached"
    );

    Ok(UserSignedTransaction {
        transaction: VersionedTransaction {
            signatures: slots.into_inner(),
            message,
        },
        user: user_pubkey,
        user_index,
        last_valid_block_height,
    })
}
