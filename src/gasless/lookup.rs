//! Address lookup table loading
//!
//! Fetches all tables in one `getMultipleAccounts` call. Missing or
//! undecodable tables are skipped so the transaction can still be compiled
//! with the remaining ones; an RPC failure degrades to no tables at all.

use crate::rpc::LedgerClient;
use solana_sdk::{
    address_lookup_table::{state::AddressLookupTable, AddressLookupTableAccount},
    pubkey::Pubkey,
};
use tracing::warn;

/// Load lookup-table accounts for `addresses`, preserving their order
pub async fn load_lookup_tables<L: LedgerClient + ?Sized>(
    ledger: &L,
    addresses: &[Pubkey],
) -> Vec<AddressLookupTableAccount> {
    if addresses.is_empty() {
        return Vec::new();
    }

    let accounts = match ledger.get_multiple_accounts(addresses).await {
        Ok(accounts) => accounts,
        Err(e) => {
            warn!(error = %e, tables = addresses.len(), "Failed to fetch lookup tables, proceeding without them");
            return Vec::new();
        }
    };

    addresses
        .iter()
        .zip(accounts)
        .filter_map(|(key, account)| {
            let Some(account) = account else {
                warn!(table = %key, "Lookup table account not found");
                return None;
            };
            match AddressLookupTable::deserialize(&account.data) {
                Ok(table) => Some(AddressLookupTableAccount {
                    key: *key,
                    addresses: table.addresses.to_vec(),
                }),
                Err(e) => {
                    warn!(table = %key, error = %e, "Failed to decode lookup table");
                    None
                }
            }
        })
        .collect()
}
