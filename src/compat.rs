//! Compatibility layer for Solana SDK message types
//!
//! Gives one API over `VersionedMessage` (Legacy or V0) for the pieces the
//! signing protocol needs: the header, the static account keys, and the
//! signer prefix of the account-key table.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gasless_swap::compat;
//! use solana_sdk::transaction::VersionedTransaction;
//!
//! fn fee_payer_slot(tx: &VersionedTransaction, fee_payer: &solana_sdk::pubkey::Pubkey) -> Option<usize> {
//!     compat::signer_index(&tx.message, fee_payer)
//! }
//! ```

use solana_sdk::{
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
};

/// Get the message header from a `VersionedMessage`.
#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Get the static account keys from a `VersionedMessage`.
///
/// For V0 messages this excludes addresses loaded from lookup tables;
/// signers are never loaded from lookup tables, so the signer prefix is
/// always static.
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Get the required signers from a `VersionedMessage`.
///
/// Required signers are always the first `header.num_required_signatures`
/// static account keys, and signature slot `i` belongs to signer `i`.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let account_keys = get_static_account_keys(message);
    let num_signers = header.num_required_signatures as usize;

    &account_keys[..num_signers.min(account_keys.len())]
}

/// Signature slot index of `signer`, if it is a required signer of the message
#[inline]
#[must_use]
pub fn signer_index(message: &VersionedMessage, signer: &Pubkey) -> Option<usize> {
    get_required_signers(message)
        .iter()
        .position(|key| key == signer)
}

/// The account charged for the transaction fee (account-key index 0)
#[inline]
#[must_use]
pub fn fee_payer(message: &VersionedMessage) -> Option<&Pubkey> {
    get_static_account_keys(message).first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        hash::Hash,
        instruction::{AccountMeta, Instruction},
        message::{v0::Message as MessageV0, Message},
    };

    fn two_signer_instruction(payer: &Pubkey, user: &Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1],
            vec![
                AccountMeta::new(*user, true),
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(Pubkey::new_unique(), false),
            ],
        )
    }

    #[test]
    fn test_v0_required_signers_and_index() {
        let payer = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        let ix = two_signer_instruction(&payer, &user);

        let message = VersionedMessage::V0(
            MessageV0::try_compile(&payer, &[ix], &[], Hash::default()).unwrap(),
        );

        assert_eq!(get_message_header(&message).num_required_signatures, 2);
        assert_eq!(get_required_signers(&message), &[payer, user]);
        assert_eq!(signer_index(&message, &payer), Some(0));
        assert_eq!(signer_index(&message, &user), Some(1));
        assert_eq!(fee_payer(&message), Some(&payer));
    }

    #[test]
    fn test_non_signer_has_no_index() {
        let payer = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        let ix = two_signer_instruction(&payer, &user);
        let readonly = ix.accounts[2].pubkey;

        let message = VersionedMessage::Legacy(Message::new(&[ix], Some(&payer)));

        assert!(get_static_account_keys(&message).contains(&readonly));
        assert_eq!(signer_index(&message, &readonly), None);
        assert_eq!(signer_index(&message, &Pubkey::new_unique()), None);
    }

    #[test]
    fn test_header_clamped_to_key_count() {
        let payer = Pubkey::new_unique();
        let mut message = Message::new(&[], Some(&payer));
        message.header.num_required_signatures = 5;
        let message = VersionedMessage::Legacy(message);

        assert_eq!(get_required_signers(&message), &[payer]);
    }
}
