//! Gasless transaction assembly
//!
//! Builds one v0 message from the aggregator's instruction groups with the
//! fee payer as the payer key. The concatenation order is fixed:
//! 1. Compute budget instructions (CU limit, priority fee)
//! 2. Setup instructions (account creation, already rewritten)
//! 3. Swap instruction
//! 4. Cleanup instructions (e.g. unwrap wSOL)
//!
//! Setup must create accounts before the swap uses them and cleanup must run
//! last, so groups are never reordered or deduplicated.

use crate::compat;
use crate::gasless::errors::{GaslessError, GaslessResult};
use crate::gasless::normalize::InstructionGroups;
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use tracing::debug;

/// A recent blockhash and the last block height at which it is valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[allow(deprecated)]
fn compute_budget_program() -> Pubkey {
    solana_sdk::compute_budget::id()
}

/// Ordered instruction list with per-group counts
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    pub instructions: Vec<Instruction>,
    pub compute_budget_count: usize,
    pub setup_count: usize,
    pub swap_count: usize,
    pub cleanup_count: usize,
}

/// Concatenate the groups in execution order
///
/// # Errors
///
/// Returns `InvalidInstructionSet` if there is no swap instruction or a
/// non compute-budget instruction sits in the compute-budget group.
pub fn plan_swap_instructions(groups: InstructionGroups) -> GaslessResult<InstructionPlan> {
    if groups.swap.is_empty() {
        return Err(GaslessError::invalid_set("no swap instruction"));
    }

    if let Some((idx, ix)) = groups
        .compute_budget
        .iter()
        .enumerate()
        .find(|(_, ix)| ix.program_id != compute_budget_program())
    {
        return Err(GaslessError::invalid_set(format!(
            "compute budget group entry {} targets program {}",
            idx, ix.program_id
        )));
    }

    let InstructionGroups {
        compute_budget,
        setup,
        swap,
        cleanup,
    } = groups;

    let compute_budget_count = compute_budget.len();
    let setup_count = setup.len();
    let swap_count = swap.len();
    let cleanup_count = cleanup.len();

    let mut instructions =
        Vec::with_capacity(compute_budget_count + setup_count + swap_count + cleanup_count);
    instructions.extend(compute_budget);
    instructions.extend(setup);
    instructions.extend(swap);
    instructions.extend(cleanup);

    Ok(InstructionPlan {
        instructions,
        compute_budget_count,
        setup_count,
        swap_count,
        cleanup_count,
    })
}

/// A compiled, not yet signed, gasless transaction
///
/// The message is private: once the user signs it nothing can mutate it.
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    message: VersionedMessage,
    fee_payer: Pubkey,
    last_valid_block_height: u64,
}

impl AssembledTransaction {
    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn last_valid_block_height(&self) -> u64 {
        self.last_valid_block_height
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        compat::get_required_signers(&self.message)
    }

    /// Canonical message bytes, the exact range every party signs
    pub fn message_bytes(&self) -> Vec<u8> {
        self.message.serialize()
    }

    pub(crate) fn into_parts(self) -> (VersionedMessage, u64) {
        (self.message, self.last_valid_block_height)
    }
}

/// Compile the planned instructions into a v0 message paid for by `fee_payer`
pub fn assemble_transaction(
    plan: InstructionPlan,
    lookup_tables: &[AddressLookupTableAccount],
    fee_payer: &Pubkey,
    recent: RecentBlockhash,
) -> GaslessResult<AssembledTransaction> {
    let message = v0::Message::try_compile(fee_payer, &plan.instructions, lookup_tables, recent.blockhash)
        .map_err(|e| GaslessError::invalid_set(format!("message compilation failed: {}", e)))?;
    let message = VersionedMessage::V0(message);

    sanity_check_fee_payer(&message, fee_payer)?;

    let signer_count = compat::get_required_signers(&message).len();
    let tx_size = serialized_size(&message, signer_count)?;
    if tx_size > PACKET_DATA_SIZE {
        return Err(GaslessError::invalid_set(format!(
            "transaction is {} bytes, limit is {} ({} lookup tables supplied)",
            tx_size,
            PACKET_DATA_SIZE,
            lookup_tables.len()
        )));
    }

    debug!(
        fee_payer = %fee_payer,
        instructions = plan.instructions.len(),
        compute_budget = plan.compute_budget_count,
        setup = plan.setup_count,
        cleanup = plan.cleanup_count,
        signers = signer_count,
        tx_size,
        "Assembled gasless transaction"
    );

    Ok(AssembledTransaction {
        message,
        fee_payer: *fee_payer,
        last_valid_block_height: recent.last_valid_block_height,
    })
}

/// Plan and compile in one step
pub fn assemble_swap(
    groups: InstructionGroups,
    lookup_tables: &[AddressLookupTableAccount],
    fee_payer: &Pubkey,
    recent: RecentBlockhash,
) -> GaslessResult<AssembledTransaction> {
    assemble_transaction(plan_swap_instructions(groups)?, lookup_tables, fee_payer, recent)
}

/// Fee payer must be account-key index 0 and a required signer
pub fn sanity_check_fee_payer(message: &VersionedMessage, fee_payer: &Pubkey) -> GaslessResult<()> {
    match compat::fee_payer(message) {
        Some(key) if key == fee_payer => {}
        other => {
            return Err(GaslessError::invalid_set(format!(
                "account-key index 0 is {:?}, expected fee payer {}",
                other, fee_payer
            )))
        }
    }
    if compat::signer_index(message, fee_payer) != Some(0) {
        return Err(GaslessError::invalid_set("fee payer is not a required signer"));
    }
    Ok(())
}

fn serialized_size(message: &VersionedMessage, signer_count: usize) -> GaslessResult<usize> {
    let tx = VersionedTransaction {
        signatures: vec![Signature::default(); signer_count],
        message: message.clone(),
    };
    bincode::serialized_size(&tx)
        .map(|size| size as usize)
        .map_err(|e| GaslessError::invalid_set(format!("transaction not serializable: {}", e)))
}
