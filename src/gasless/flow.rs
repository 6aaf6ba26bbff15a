//! Client side of a gasless swap
//!
//! Turns aggregator swap instructions into a user-signed transaction whose
//! fee payer is the co-signer, then hands it over through a transport.

use crate::gasless::assemble::{assemble_swap, AssembledTransaction};
use crate::gasless::contract::{CoSignRequest, CoSignResponse};
use crate::gasless::errors::GaslessResult;
use crate::gasless::lookup::load_lookup_tables;
use crate::gasless::normalize::SwapInstructions;
use crate::gasless::rewrite::{AccountCreationPrograms, FundingRedirect, GaslessRewriter};
use crate::gasless::signing::{sign_as_user, MessageSigner, UserSignedTransaction};
use crate::gasless::transport::CoSignTransport;
use crate::metrics::{metrics, Timer};
use crate::rpc::LedgerClient;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

/// Drives one swap attempt from instructions to co-signer outcome
pub struct GaslessSwapClient<L, T, R = AccountCreationPrograms>
where
    L: LedgerClient + ?Sized,
    T: CoSignTransport + ?Sized,
    R: FundingRedirect + Clone,
{
    ledger: Arc<L>,
    transport: Arc<T>,
    redirect: R,
}

impl<L, T> GaslessSwapClient<L, T>
where
    L: LedgerClient + ?Sized,
    T: CoSignTransport + ?Sized,
{
    pub fn new(ledger: Arc<L>, transport: Arc<T>) -> Self {
        Self {
            ledger,
            transport,
            redirect: AccountCreationPrograms::new(),
        }
    }
}

impl<L, T, R> GaslessSwapClient<L, T, R>
where
    L: LedgerClient + ?Sized,
    T: CoSignTransport + ?Sized,
    R: FundingRedirect + Clone,
{
    /// Use a custom funding-redirect policy for setup instructions
    pub fn with_redirect<R2: FundingRedirect + Clone>(self, redirect: R2) -> GaslessSwapClient<L, T, R2> {
        GaslessSwapClient {
            ledger: self.ledger,
            transport: self.transport,
            redirect,
        }
    }

    /// Normalize, redirect setup funding to `fee_payer`, and compile the message
    ///
    /// Only setup instructions are rewritten; compute-budget, swap and
    /// cleanup instructions pass through unchanged.
    pub async fn assemble(
        &self,
        instructions: &SwapInstructions,
        user: &Pubkey,
        fee_payer: &Pubkey,
    ) -> GaslessResult<AssembledTransaction> {
        let mut groups = instructions.normalize()?;
        let table_addresses = instructions.lookup_table_addresses()?;

        let rewriter = GaslessRewriter::with_policy(self.redirect.clone(), *user, *fee_payer);
        groups.setup = rewriter.rewrite_all(groups.setup);

        let tables = load_lookup_tables(self.ledger.as_ref(), &table_addresses).await;
        let recent = self.ledger.get_latest_blockhash().await?;
        debug!(
            tables = tables.len(),
            requested_tables = table_addresses.len(),
            instructions = groups.len(),
            last_valid_block_height = recent.last_valid_block_height,
            "Assembling gasless transaction"
        );

        let timer = Timer::new();
        let assembled = assemble_swap(groups, &tables, fee_payer, recent)?;
        timer.observe_duration(&metrics().assemble_latency);
        metrics().swaps_prepared.inc();
        Ok(assembled)
    }

    /// Assemble against the transport's fee payer and collect the user's signature
    pub async fn prepare(
        &self,
        instructions: &SwapInstructions,
        user: &dyn MessageSigner,
    ) -> GaslessResult<UserSignedTransaction> {
        let fee_payer = self.transport.fee_payer().await?;
        let assembled = self.assemble(instructions, &user.address(), &fee_payer).await?;
        sign_as_user(assembled, user).await
    }

    /// Prepare, then deliver to the co-signer and return its outcome
    pub async fn execute(
        &self,
        instructions: &SwapInstructions,
        user: &dyn MessageSigner,
    ) -> GaslessResult<CoSignResponse> {
        let span = tracing::info_span!("gasless_swap", user = %user.address());
        async {
            let signed = self.prepare(instructions, user).await?;
            let request = CoSignRequest::new(
                signed.to_base64()?,
                Some(signed.last_valid_block_height()),
            );

            let response = self.transport.co_sign(request).await?;
            if response.success {
                info!(
                    signature = ?response.transaction_signature,
                    explorer_url = ?response.explorer_url,
                    "Gasless swap confirmed"
                );
            } else {
                info!(
                    error = ?response.error,
                    needs_top_up = ?response.needs_top_up,
                    "Gasless swap rejected by co-signer"
                );
            }
            Ok(response)
        }
        .instrument(span)
        .await
    }
}
