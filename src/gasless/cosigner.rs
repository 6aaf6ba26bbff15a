//! Fee-payer co-signer
//!
//! Receives a user-signed transaction whose fee payer is the service wallet,
//! adds the fee-payer signature and drives it to a definite outcome:
//!
//! ```text
//! CheckingBalance -> Signing -> Submitting -> Confirming -> Succeeded
//!        \              \            \             \
//!         +--------------+------------+-------------+----> Failed
//! ```
//!
//! Nothing is sent to the network before `Submitting`. Once a signature has
//! been returned by the node, every outcome (success, on-chain failure,
//! expiry) carries it.

use crate::compat;
use crate::gasless::contract::{CoSignRequest, CoSignResponse};
use crate::gasless::errors::{GaslessError, GaslessResult};
use crate::gasless::signatures::{verifies, SignatureSlots};
use crate::gasless::signing::MessageSigner;
use crate::metrics::{metrics, InFlightGuard, Timer};
use crate::rpc::{classify_transaction_error, mentions_insufficient_funds, LedgerClient, TransactionStatus};
use solana_sdk::{
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{debug, info, warn};

/// Minimum fee-payer balance accepted before any work (0.01 SOL)
pub const DEFAULT_MIN_BALANCE_LAMPORTS: u64 = 10_000_000;

/// Allowance for rent of accounts created on the user's behalf (0.005 SOL)
pub const DEFAULT_ACCOUNT_CREATION_BUFFER_LAMPORTS: u64 = 5_000_000;

/// Tunables of the co-sign state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoSignPolicy {
    pub min_balance_lamports: u64,
    pub account_creation_buffer_lamports: u64,
    /// Client-side resubmissions after a transient network error; also passed to the node
    pub max_submit_retries: usize,
    pub retry_base_delay: Duration,
    pub confirm_poll_interval: Duration,
    pub skip_preflight: bool,
    pub explorer_base_url: String,
}

impl Default for CoSignPolicy {
    fn default() -> Self {
        Self {
            min_balance_lamports: DEFAULT_MIN_BALANCE_LAMPORTS,
            account_creation_buffer_lamports: DEFAULT_ACCOUNT_CREATION_BUFFER_LAMPORTS,
            max_submit_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            confirm_poll_interval: Duration::from_millis(500),
            skip_preflight: false,
            explorer_base_url: "https://solscan.io/tx".to_string(),
        }
    }
}

impl CoSignPolicy {
    pub fn explorer_url(&self, signature: &Signature) -> String {
        format!("{}/{}", self.explorer_base_url.trim_end_matches('/'), signature)
    }
}

/// Stages of a single co-sign attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoSignStage {
    CheckingBalance,
    Signing,
    Submitting,
    Confirming,
    Succeeded,
    Failed,
}

impl CoSignStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckingBalance => "checking_balance",
            Self::Signing => "signing",
            Self::Submitting => "submitting",
            Self::Confirming => "confirming",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CoSignStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a confirmed co-sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoSignReceipt {
    pub signature: Signature,
    pub explorer_url: String,
    /// Fee-payer balance observed at submission
    pub fee_payer_balance: u64,
    /// Network fee estimate for the message (0 when unavailable)
    pub fee_lamports: u64,
}

/// A failed co-sign attempt and where it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoSignFailure {
    /// Last stage entered before the failure
    pub stage: CoSignStage,
    pub error: GaslessError,
    /// Present once the node accepted the transaction
    pub signature: Option<Signature>,
    pub fee_payer_balance: Option<u64>,
}

/// Progress of one attempt; logs every transition
struct CoSignRun {
    stage: CoSignStage,
    signature: Option<Signature>,
    fee_payer_balance: Option<u64>,
}

impl CoSignRun {
    fn new() -> Self {
        Self {
            stage: CoSignStage::CheckingBalance,
            signature: None,
            fee_payer_balance: None,
        }
    }

    fn advance(&mut self, next: CoSignStage) {
        debug!(from = %self.stage, to = %next, "Co-sign stage transition");
        self.stage = next;
    }

    fn fail(self, error: GaslessError) -> CoSignFailure {
        let signature = self.signature.or_else(|| error.dispatched_signature());
        warn!(
            stage = %self.stage,
            kind = error.category(),
            signature = ?signature,
            error = %error,
            "Co-sign failed"
        );
        CoSignFailure {
            stage: self.stage,
            error,
            signature,
            fee_payer_balance: self.fee_payer_balance,
        }
    }
}

/// Holds the fee-payer capability and the network handle
pub struct CoSigner<L: LedgerClient + ?Sized> {
    ledger: Arc<L>,
    fee_payer: Arc<dyn MessageSigner>,
    policy: CoSignPolicy,
}

impl<L: LedgerClient + ?Sized> CoSigner<L> {
    pub fn new(ledger: Arc<L>, fee_payer: Arc<dyn MessageSigner>, policy: CoSignPolicy) -> Self {
        Self {
            ledger,
            fee_payer,
            policy,
        }
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.fee_payer.address()
    }

    pub fn policy(&self) -> &CoSignPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Current fee-payer balance in lamports
    pub async fn fee_payer_balance(&self) -> GaslessResult<u64> {
        let balance = self.ledger.get_balance(&self.fee_payer()).await?;
        metrics().fee_payer_balance.set(i64::try_from(balance).unwrap_or(i64::MAX));
        Ok(balance)
    }

    /// Handle a wire request; every outcome becomes a response, never an error
    pub async fn co_sign(&self, request: &CoSignRequest) -> CoSignResponse {
        let transaction = match request.decode_transaction() {
            Ok(transaction) => transaction,
            Err(e) => return self.reject(&e),
        };

        match self
            .co_sign_transaction(transaction, request.last_valid_block_height)
            .await
        {
            Ok(receipt) => CoSignResponse::succeeded(&receipt),
            Err(failure) => CoSignResponse::failed(&failure, &self.fee_payer()),
        }
    }

    /// Count and answer a request that never entered the state machine
    pub fn reject(&self, error: &GaslessError) -> CoSignResponse {
        warn!(kind = error.category(), error = %error, "Rejecting co-sign request");
        metrics().cosign_requests.inc();
        metrics().record_failure(error.category());
        CoSignResponse::rejected(error, &self.fee_payer())
    }

    /// Run the full state machine over a decoded transaction
    ///
    /// `last_valid_block_height` bounds confirmation; when the client does not
    /// supply it the expiry of the latest blockhash is used instead.
    pub async fn co_sign_transaction(
        &self,
        transaction: VersionedTransaction,
        last_valid_block_height: Option<u64>,
    ) -> Result<CoSignReceipt, CoSignFailure> {
        let m = metrics();
        m.cosign_requests.inc();
        let _in_flight = InFlightGuard::new(&m.cosign_in_flight);
        let timer = Timer::new();

        let mut run = CoSignRun::new();
        let result = self
            .drive(&mut run, &transaction, last_valid_block_height)
            .await;
        timer.observe_duration(&m.cosign_latency);

        match result {
            Ok(receipt) => {
                run.advance(CoSignStage::Succeeded);
                m.cosign_success.inc();
                info!(
                    signature = %receipt.signature,
                    explorer_url = %receipt.explorer_url,
                    latency_secs = timer.elapsed_secs(),
                    "Gasless transaction confirmed"
                );
                Ok(receipt)
            }
            Err(error) => {
                m.record_failure(error.category());
                Err(run.fail(error))
            }
        }
    }

    async fn drive(
        &self,
        run: &mut CoSignRun,
        transaction: &VersionedTransaction,
        last_valid_block_height: Option<u64>,
    ) -> GaslessResult<CoSignReceipt> {
        let balance = self.check_balance().await?;
        run.fee_payer_balance = Some(balance);

        run.advance(CoSignStage::Signing);
        let signed = self.countersign(transaction).await?;

        run.advance(CoSignStage::Submitting);
        let (fee_lamports, balance) = self.check_cost(&signed.message, balance).await?;
        run.fee_payer_balance = Some(balance);

        let last_valid_block_height = match last_valid_block_height {
            Some(height) => height,
            None => {
                let latest = self.ledger.get_latest_blockhash().await?;
                debug!(
                    last_valid_block_height = latest.last_valid_block_height,
                    "No expiry height supplied, using latest blockhash expiry"
                );
                latest.last_valid_block_height
            }
        };

        let signature = self.submit(&signed, balance, fee_lamports).await?;
        run.signature = Some(signature);

        run.advance(CoSignStage::Confirming);
        self.confirm(&signature, last_valid_block_height, fee_lamports)
            .await?;

        Ok(CoSignReceipt {
            signature,
            explorer_url: self.policy.explorer_url(&signature),
            fee_payer_balance: balance,
            fee_lamports,
        })
    }

    /// Refuse to work while the fee payer is below the minimum balance
    pub async fn check_balance(&self) -> GaslessResult<u64> {
        let fee_payer = self.fee_payer();
        let balance = self.fee_payer_balance().await?;

        if balance < self.policy.min_balance_lamports {
            metrics().balance_rejections.inc();
            warn!(
                fee_payer = %fee_payer,
                balance,
                required = self.policy.min_balance_lamports,
                "Fee payer below minimum balance"
            );
            return Err(GaslessError::insufficient_funds(
                balance,
                self.policy.min_balance_lamports,
                fee_payer,
            ));
        }

        debug!(fee_payer = %fee_payer, balance, "Fee payer balance sufficient");
        Ok(balance)
    }

    /// Add the fee-payer signature to a user-signed transaction
    ///
    /// The returned transaction has fresh slots: the fee payer's own signature
    /// at its index and, for every other required signer, the carried
    /// signature that verifies against that signer over the message bytes.
    /// Carried signatures are matched by key, so a client that placed the
    /// user's signature at the wrong index is still served correctly. A
    /// signature carried for the fee payer's slot is never reused.
    ///
    /// # Errors
    ///
    /// - `FeePayerNotInTransaction` if the fee payer is not a required signer
    /// - `SignatureVerificationFailed` if some other signer has no valid signature
    pub async fn countersign(&self, incoming: &VersionedTransaction) -> GaslessResult<VersionedTransaction> {
        let fee_payer = self.fee_payer();
        let message = &incoming.message;
        let signers = compat::get_required_signers(message);

        let fee_payer_index = signers
            .iter()
            .position(|key| *key == fee_payer)
            .ok_or_else(|| GaslessError::FeePayerNotInTransaction {
                fee_payer,
                reason: format!("message has {} required signers", signers.len()),
            })?;
        if fee_payer_index != 0 {
            warn!(
                fee_payer = %fee_payer,
                fee_payer_index,
                "Fee payer signs but does not pay; the network charges the signer at index 0"
            );
        }

        let message_bytes = message.serialize();
        let mut slots = SignatureSlots::empty_for(message);

        for (index, signer) in signers.iter().enumerate() {
            if index == fee_payer_index {
                continue;
            }
            let positional = incoming
                .signatures
                .get(index)
                .filter(|sig| verifies(sig, signer, &message_bytes));
            let carried = positional.or_else(|| {
                incoming
                    .signatures
                    .iter()
                    .find(|sig| verifies(sig, signer, &message_bytes))
            });

            match carried {
                Some(signature) => {
                    if positional.is_none() {
                        debug!(signer = %signer, slot = index, "Moved carried signature to its signer slot");
                    }
                    slots.place(index, *signature)?;
                }
                None => {
                    return Err(GaslessError::signature_failed(format!(
                        "no valid signature for required signer {} (slot {})",
                        signer, index
                    )));
                }
            }
        }

        let fee_payer_signature = self.fee_payer.sign_bytes(&message_bytes).await?;
        if !verifies(&fee_payer_signature, &fee_payer, &message_bytes) {
            return Err(GaslessError::signature_failed(
                "fee payer signature does not verify over the message",
            ));
        }
        slots.place(fee_payer_index, fee_payer_signature)?;

        let signatures = slots.into_complete(signers)?;
        info!(
            fee_payer = %fee_payer,
            fee_payer_index,
            signers = signatures.len(),
            "Transaction co-signed"
        );

        Ok(VersionedTransaction {
            signatures,
            message: message.clone(),
        })
    }

    /// Fee estimate plus account-creation buffer against a fresh balance
    ///
    /// Returns `(fee, balance)`. An unavailable estimate is treated as zero.
    async fn check_cost(&self, message: &VersionedMessage, balance_at_check: u64) -> GaslessResult<(u64, u64)> {
        let fee_payer = self.fee_payer();

        let fee = match self.ledger.get_fee_for_message(message).await {
            Ok(fee) => fee,
            Err(e) => {
                warn!(error = %e, "Fee estimate unavailable, assuming zero");
                0
            }
        };
        let required = fee.saturating_add(self.policy.account_creation_buffer_lamports);

        let balance = match self.fee_payer_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Balance refresh failed, using balance from gate");
                balance_at_check
            }
        };

        if balance < required {
            warn!(
                fee_payer = %fee_payer,
                balance,
                fee,
                required,
                "Fee payer cannot cover fee and account creation"
            );
            return Err(GaslessError::insufficient_funds(balance, required, fee_payer));
        }

        debug!(fee, required, balance, "Estimated cost covered");
        Ok((fee, balance))
    }

    /// Send the fully signed transaction, retrying transient network errors only
    async fn submit(&self, transaction: &VersionedTransaction, balance: u64, fee: u64) -> GaslessResult<Signature> {
        let base_ms = u64::try_from(self.policy.retry_base_delay.as_millis()).unwrap_or(u64::MAX);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(base_ms.max(1))
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.policy.max_submit_retries);

        #[allow(deprecated)]
        let result = RetryIf::spawn(
            strategy,
            || {
                self.ledger.send_transaction(
                    transaction,
                    self.policy.skip_preflight,
                    self.policy.max_submit_retries,
                )
            },
            |e: &GaslessError| {
                let retry = e.is_retryable();
                if retry {
                    metrics().submit_retries.inc();
                    warn!(error = %e, "Transient submission failure, retrying");
                }
                retry
            },
        )
        .await;

        match result {
            Ok(signature) => {
                info!(signature = %signature, "Transaction submitted");
                Ok(signature)
            }
            Err(e) if mentions_insufficient_funds(&e) => {
                let current = self.fee_payer_balance().await.unwrap_or(balance);
                let required = fee
                    .saturating_add(self.policy.account_creation_buffer_lamports)
                    .max(self.policy.min_balance_lamports);
                warn!(error = %e, current, required, "Submission rejected for lack of funds");
                Err(GaslessError::insufficient_funds(current, required, self.fee_payer()))
            }
            Err(e) => Err(e),
        }
    }

    /// Poll until the transaction lands or its blockhash expires
    ///
    /// A transient failure of either query counts as "not known yet"; polling
    /// only stops on a landed status or once the expiry height has passed.
    async fn confirm(&self, signature: &Signature, last_valid_block_height: u64, fee: u64) -> GaslessResult<()> {
        let timer = Timer::new();

        loop {
            if let Some(status) = self.poll_status(signature).await? {
                timer.observe_duration(&metrics().confirm_latency);
                return self.settle(signature, status, fee).await;
            }

            match self.ledger.get_block_height().await {
                Ok(current_block_height) if current_block_height > last_valid_block_height => {
                    // One last look: the transaction may have landed in the final valid block
                    if let Some(status) = self.poll_status(signature).await? {
                        return self.settle(signature, status, fee).await;
                    }
                    return Err(GaslessError::ConfirmationTimeout {
                        signature: *signature,
                        last_valid_block_height,
                        current_block_height,
                    });
                }
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    warn!(signature = %signature, error = %e, "Block height unavailable, still polling");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.policy.confirm_poll_interval).await;
        }
    }

    /// Signature status where a transient failure reads as not yet seen
    async fn poll_status(&self, signature: &Signature) -> GaslessResult<Option<TransactionStatus>> {
        match self.ledger.get_signature_status(signature).await {
            Ok(status) => Ok(status),
            Err(e) if e.is_retryable() => {
                warn!(signature = %signature, error = %e, "Status query failed, still polling");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn settle(&self, signature: &Signature, status: TransactionStatus, fee: u64) -> GaslessResult<()> {
        match status {
            Ok(()) => Ok(()),
            Err(tx_err) => Err(self.landed_error(signature, tx_err, fee).await),
        }
    }

    async fn landed_error(&self, signature: &Signature, err: TransactionError, fee: u64) -> GaslessError {
        if let Some(classified) = classify_transaction_error(&err) {
            return classified;
        }

        match err {
            TransactionError::InsufficientFundsForFee | TransactionError::InsufficientFundsForRent { .. } => {
                let current = self.fee_payer_balance().await.unwrap_or(0);
                let required = fee.saturating_add(self.policy.account_creation_buffer_lamports);
                GaslessError::insufficient_funds(current, required, self.fee_payer())
            }
            other => GaslessError::TransactionFailed {
                signature: *signature,
                reason: other.to_string(),
            },
        }
    }
}
