//! Funding redirection for gasless transactions
//!
//! Account-creation instructions built by the aggregator name the user as
//! the funding source. In a gasless transaction the fee payer funds them, so
//! every account that is the user acting as a writable signer inside a
//! redirect-eligible program is swapped for the fee payer.
//!
//! The rewrite is idempotent: once an entry holds the fee payer the match
//! condition (`user && signer && writable`) can no longer hold for it.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use tracing::debug;

#[allow(deprecated)]
fn system_program_id() -> Pubkey {
    solana_sdk::system_program::id()
}

/// Predicate deciding whether an instruction's funding account may be redirected
pub trait FundingRedirect: Send + Sync {
    /// Whether instructions of this program create accounts funded by a signer
    fn redirects(&self, program_id: &Pubkey) -> bool;

    /// Whether this account entry is the user acting as the funding source
    fn is_funding_source(&self, account: &AccountMeta, user: &Pubkey) -> bool {
        account.pubkey == *user && account.is_signer && account.is_writable
    }
}

/// Redirects account creation in the system and associated-token-account programs
#[derive(Debug, Clone)]
pub struct AccountCreationPrograms {
    programs: Vec<Pubkey>,
}

impl AccountCreationPrograms {
    pub fn new() -> Self {
        Self {
            programs: vec![system_program_id(), spl_associated_token_account::id()],
        }
    }

    /// Add another program whose instructions fund new accounts
    pub fn with_program(mut self, program_id: Pubkey) -> Self {
        if !self.programs.contains(&program_id) {
            self.programs.push(program_id);
        }
        self
    }

    pub fn programs(&self) -> &[Pubkey] {
        &self.programs
    }
}

impl Default for AccountCreationPrograms {
    fn default() -> Self {
        Self::new()
    }
}

impl FundingRedirect for AccountCreationPrograms {
    fn redirects(&self, program_id: &Pubkey) -> bool {
        self.programs.contains(program_id)
    }
}

/// Rewrites instructions so the fee payer funds account creation
pub struct GaslessRewriter<R: FundingRedirect = AccountCreationPrograms> {
    policy: R,
    user: Pubkey,
    fee_payer: Pubkey,
}

impl GaslessRewriter<AccountCreationPrograms> {
    /// Rewriter with the default system + associated-token-account policy
    pub fn new(user: Pubkey, fee_payer: Pubkey) -> Self {
        Self::with_policy(AccountCreationPrograms::new(), user, fee_payer)
    }
}

impl<R: FundingRedirect> GaslessRewriter<R> {
    pub fn with_policy(policy: R, user: Pubkey, fee_payer: Pubkey) -> Self {
        Self {
            policy,
            user,
            fee_payer,
        }
    }

    /// Rewrite a single instruction; unmatched instructions are returned untouched
    pub fn rewrite(&self, mut instruction: Instruction) -> Instruction {
        if !self.policy.redirects(&instruction.program_id) {
            return instruction;
        }

        let mut replaced = 0usize;
        for account in instruction.accounts.iter_mut() {
            if self.policy.is_funding_source(account, &self.user) {
                *account = AccountMeta::new(self.fee_payer, true);
                replaced += 1;
            }
        }

        if replaced > 0 {
            debug!(
                program = %instruction.program_id,
                replaced,
                fee_payer = %self.fee_payer,
                "Redirected account funding to fee payer"
            );
        }
        instruction
    }

    /// Rewrite every instruction, preserving order
    pub fn rewrite_all(&self, instructions: Vec<Instruction>) -> Vec<Instruction> {
        instructions.into_iter().map(|ix| self.rewrite(ix)).collect()
    }
}

/// Rewrite with the default policy
pub fn rewrite_for_gasless(instruction: Instruction, user: &Pubkey, fee_payer: &Pubkey) -> Instruction {
    GaslessRewriter::new(*user, *fee_payer).rewrite(instruction)
}
