//! Gasless swap pipeline
//!
//! A user swaps tokens without holding SOL for fees: a third-party fee payer
//! pays network fees and the rent of any account created on the user's
//! behalf.
//!
//! ## Architecture
//!
//! Leaf-first:
//! - **normalize**: aggregator instruction descriptors to `Instruction`
//! - **rewrite**: redirect account-creation funding from the user to the fee payer
//! - **assemble**: fixed-order v0 message with the fee payer at index 0
//! - **signing**: the `MessageSigner` capability and the user signing step
//! - **cosigner**: balance gate, counter-signing, submission and confirmation
//! - **transport** / **flow**: moving the half-signed transaction between the two parties
//!
//! ## Signing protocol
//!
//! Both parties sign the same immutable message bytes independently. Slots
//! are assigned from each party's position in the account-key table, never
//! from the order signatures arrive in, and a transaction with an empty slot
//! is never broadcast.
//!
//! ```rust,no_run
//! use gasless_swap::gasless::{GaslessSwapClient, RemoteCoSigner, SwapInstructions};
//! use gasless_swap::rpc::SolanaLedger;
//! use solana_sdk::signature::Keypair;
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example(instructions: SwapInstructions, user: Keypair) -> anyhow::Result<()> {
//! let ledger = Arc::new(SolanaLedger::new("https://api.mainnet-beta.solana.com", Duration::from_secs(30)));
//! let cosigner = Arc::new(RemoteCoSigner::new("http://localhost:3001", Duration::from_secs(90))?);
//!
//! let client = GaslessSwapClient::new(ledger, cosigner);
//! let response = client.execute(&instructions, &user).await?;
//! println!("{:?}", response.explorer_url);
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod contract;
pub mod cosigner;
pub mod errors;
pub mod flow;
pub mod lookup;
pub mod normalize;
pub mod rewrite;
pub mod signatures;
pub mod signing;
pub mod transport;

pub use assemble::{assemble_swap, assemble_transaction, AssembledTransaction, RecentBlockhash};
pub use contract::{CoSignRequest, CoSignResponse, FeePayerStatus};
pub use cosigner::{CoSignFailure, CoSignPolicy, CoSignReceipt, CoSignStage, CoSigner};
pub use errors::{GaslessError, GaslessResult};
pub use flow::GaslessSwapClient;
pub use normalize::{InstructionDescriptor, InstructionGroups, SwapInstructions};
pub use rewrite::{rewrite_for_gasless, AccountCreationPrograms, FundingRedirect, GaslessRewriter};
pub use signatures::SignatureSlots;
pub use signing::{sign_as_user, MessageSigner, UserSignedTransaction};
pub use transport::{CoSignTransport, RemoteCoSigner};
