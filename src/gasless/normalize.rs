//! Aggregator instruction descriptors and their canonical form
//!
//! The aggregator's `/swap-instructions` endpoint returns every instruction
//! as `{programId, accounts: [{pubkey, isSigner, isWritable}], data}` with a
//! base64 payload. This module decodes them into `solana_sdk` instructions,
//! preserving account order exactly.

use crate::gasless::errors::{GaslessError, GaslessResult};
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;

/// One account entry of an aggregator instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDescriptor {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// An instruction as returned by the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionDescriptor {
    pub program_id: String,
    pub accounts: Vec<AccountDescriptor>,
    /// Base64-encoded instruction payload
    pub data: String,
}

/// Body of the aggregator's `/swap-instructions` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructions {
    #[serde(default)]
    pub compute_budget_instructions: Vec<InstructionDescriptor>,
    #[serde(default)]
    pub setup_instructions: Vec<InstructionDescriptor>,
    pub swap_instruction: Option<InstructionDescriptor>,
    #[serde(default)]
    pub cleanup_instruction: Option<InstructionDescriptor>,
    #[serde(default)]
    pub address_lookup_table_addresses: Vec<String>,
}

/// Canonical instruction groups, in the order they must execute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionGroups {
    pub compute_budget: Vec<Instruction>,
    pub setup: Vec<Instruction>,
    pub swap: Vec<Instruction>,
    pub cleanup: Vec<Instruction>,
}

impl InstructionGroups {
    /// Total number of instructions across all groups
    pub fn len(&self) -> usize {
        self.compute_budget.len() + self.setup.len() + self.swap.len() + self.cleanup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a base58 address, naming the field in the error
pub fn parse_pubkey(value: &str, field: &str) -> GaslessResult<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| GaslessError::malformed(format!("invalid {} '{}': {}", field, value, e)))
}

/// Convert one aggregator descriptor into a canonical instruction
pub fn normalize_instruction(descriptor: &InstructionDescriptor) -> GaslessResult<Instruction> {
    if descriptor.program_id.is_empty() {
        return Err(GaslessError::malformed("missing programId"));
    }
    let program_id = parse_pubkey(&descriptor.program_id, "programId")?;

    let accounts = descriptor
        .accounts
        .iter()
        .map(|account| {
            Ok(AccountMeta {
                pubkey: parse_pubkey(&account.pubkey, "account pubkey")?,
                is_signer: account.is_signer,
                is_writable: account.is_writable,
            })
        })
        .collect::<GaslessResult<Vec<_>>>()?;

    let data = general_purpose::STANDARD
        .decode(descriptor.data.as_bytes())
        .map_err(|e| {
            GaslessError::malformed(format!(
                "invalid base64 payload for program {}: {}",
                program_id, e
            ))
        })?;

    Ok(Instruction {
        program_id,
        accounts,
        data,
    })
}

/// Normalize a list of descriptors, preserving order
pub fn normalize_all(descriptors: &[InstructionDescriptor]) -> GaslessResult<Vec<Instruction>> {
    descriptors.iter().map(normalize_instruction).collect()
}

impl SwapInstructions {
    /// Decode a raw JSON response body
    pub fn from_json(value: serde_json::Value) -> GaslessResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| GaslessError::malformed(format!("swap-instructions response: {}", e)))
    }

    /// Normalize every group; fails on the first malformed descriptor
    pub fn normalize(&self) -> GaslessResult<InstructionGroups> {
        Ok(InstructionGroups {
            compute_budget: normalize_all(&self.compute_budget_instructions)?,
            setup: normalize_all(&self.setup_instructions)?,
            swap: self
                .swap_instruction
                .iter()
                .map(normalize_instruction)
                .collect::<GaslessResult<_>>()?,
            cleanup: self
                .cleanup_instruction
                .iter()
                .map(normalize_instruction)
                .collect::<GaslessResult<_>>()?,
        })
    }

    /// Parsed lookup-table addresses
    pub fn lookup_table_addresses(&self) -> GaslessResult<Vec<Pubkey>> {
        self.address_lookup_table_addresses
            .iter()
            .map(|address| parse_pubkey(address, "addressLookupTableAddress"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(program_id: &Pubkey, data: &str, accounts: Vec<AccountDescriptor>) -> InstructionDescriptor {
        InstructionDescriptor {
            program_id: program_id.to_string(),
            accounts,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_normalize_preserves_account_order_and_flags() {
        let program_id = Pubkey::new_unique();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let c = Pubkey::new_unique();

        let desc = descriptor(
            &program_id,
            "AQID",
            vec![
                AccountDescriptor { pubkey: c.to_string(), is_signer: false, is_writable: true },
                AccountDescriptor { pubkey: a.to_string(), is_signer: true, is_writable: true },
                AccountDescriptor { pubkey: b.to_string(), is_signer: false, is_writable: false },
            ],
        );

        let ix = normalize_instruction(&desc).expect("valid descriptor");
        assert_eq!(ix.program_id, program_id);
        assert_eq!(ix.data, vec![1, 2, 3]);
        assert_eq!(
            ix.accounts,
            vec![AccountMeta::new(c, false), AccountMeta::new(a, true), AccountMeta::new_readonly(b, false)]
        );
    }

    #[test]
    fn test_normalize_rejects_bad_base64() {
        let desc = descriptor(&Pubkey::new_unique(), "not base64!!", vec![]);
        let result = normalize_instruction(&desc);
        match result {
            Err(GaslessError::MalformedInstruction(msg)) => assert!(msg.contains("base64")),
            other => panic!("Expected MalformedInstruction, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_rejects_bad_pubkey() {
        let mut desc = descriptor(&Pubkey::new_unique(), "", vec![]);
        desc.accounts.push(AccountDescriptor {
            pubkey: "0OIl".to_string(),
            is_signer: false,
            is_writable: false,
        });
        assert!(matches!(
            normalize_instruction(&desc),
            Err(GaslessError::MalformedInstruction(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_missing_program_id() {
        let desc = InstructionDescriptor {
            program_id: String::new(),
            accounts: vec![],
            data: String::new(),
        };
        assert!(matches!(
            normalize_instruction(&desc),
            Err(GaslessError::MalformedInstruction(_))
        ));
    }

    #[test]
    fn test_swap_instructions_from_json() {
        let program = Pubkey::new_unique();
        let alt = Pubkey::new_unique();
        let body = json!({
            "computeBudgetInstructions": [
                { "programId": program.to_string(), "accounts": [], "data": "AgAAAA==" }
            ],
            "setupInstructions": [],
            "swapInstruction": { "programId": program.to_string(), "accounts": [], "data": "" },
            "cleanupInstruction": null,
            "addressLookupTableAddresses": [alt.to_string()],
            "prioritizationFeeLamports": 0
        });

        let swap = SwapInstructions::from_json(body).expect("valid body");
        let groups = swap.normalize().expect("normalizes");
        assert_eq!(groups.compute_budget.len(), 1);
        assert_eq!(groups.swap.len(), 1);
        assert!(groups.cleanup.is_empty());
        assert_eq!(groups.len(), 2);
        assert_eq!(swap.lookup_table_addresses().unwrap(), vec![alt]);
    }

    #[test]
    fn test_swap_instructions_missing_fields() {
        let body = json!({
            "swapInstruction": { "programId": Pubkey::new_unique().to_string(), "data": "" }
        });
        assert!(matches!(
            SwapInstructions::from_json(body),
            Err(GaslessError::MalformedInstruction(_))
        ));
    }
}
