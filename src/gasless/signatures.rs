//! Signature slots of a versioned transaction
//!
//! One slot per required signer, indexed like the signer prefix of the
//! account-key table. An empty slot holds `Signature::default()` and is a
//! distinct state from a filled one: a slot set with any empty slot is never
//! turned into a transaction for broadcast.

use crate::compat;
use crate::gasless::errors::{GaslessError, GaslessResult};
use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSlots {
    slots: Vec<Signature>,
}

impl SignatureSlots {
    /// All-empty slots sized to the message's required signer count
    pub fn empty_for(message: &VersionedMessage) -> Self {
        Self {
            slots: vec![Signature::default(); compat::get_required_signers(message).len()],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write a signature into slot `index`
    pub fn place(&mut self, index: usize, signature: Signature) -> GaslessResult<()> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            GaslessError::signature_failed(format!(
                "signature slot {} out of range ({} required signers)",
                index, len
            ))
        })?;
        *slot = signature;
        Ok(())
    }

    pub fn is_filled(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .map(|sig| *sig != Signature::default())
            .unwrap_or(false)
    }

    /// Indexes of slots still holding a placeholder
    pub fn unfilled(&self) -> Vec<usize> {
        (0..self.slots.len()).filter(|i| !self.is_filled(*i)).collect()
    }

    /// Consume into the transaction signature vector; every slot must be filled
    pub fn into_complete(self, signers: &[Pubkey]) -> GaslessResult<Vec<Signature>> {
        let unfilled = self.unfilled();
        if let Some(first) = unfilled.first() {
            let who = signers
                .get(*first)
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(GaslessError::signature_failed(format!(
                "{} of {} signature slots empty (first: slot {} for {})",
                unfilled.len(),
                self.slots.len(),
                first,
                who
            )));
        }
        Ok(self.slots)
    }

    /// Slots as-is, placeholders included
    pub fn into_inner(self) -> Vec<Signature> {
        self.slots
    }
}

/// Whether `signature` is a valid signature of `signer` over `message_bytes`
pub fn verifies(signature: &Signature, signer: &Pubkey, message_bytes: &[u8]) -> bool {
    *signature != Signature::default() && signature.verify(signer.as_ref(), message_bytes)
}
