//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use gasless_swap::gasless::{GaslessError, GaslessResult, RecentBlockhash};
use gasless_swap::rpc::{LedgerClient, TransactionStatus};
use solana_sdk::{
    account::Account,
    hash::Hash,
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const LAST_VALID_BLOCK_HEIGHT: u64 = 1_000;

/// In-memory ledger with scripted responses
///
/// Unscripted calls succeed: sends return the transaction's first
/// signature and status queries report it confirmed.
pub struct MockLedger {
    pub blockhash: Hash,
    balance: Mutex<u64>,
    fee: Mutex<GaslessResult<u64>>,
    send_results: Mutex<VecDeque<GaslessResult<Signature>>>,
    statuses: Mutex<VecDeque<Option<TransactionStatus>>>,
    default_status: Mutex<Option<TransactionStatus>>,
    block_height: AtomicU64,
    block_height_step: AtomicU64,
    status_failures: AtomicUsize,
    height_failures: AtomicUsize,
    accounts: Mutex<HashMap<Pubkey, Account>>,
    accounts_error: Mutex<Option<GaslessError>>,
    sent: Mutex<Vec<VersionedTransaction>>,
    send_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockLedger {
    pub fn with_balance(balance: u64) -> Self {
        Self {
            blockhash: Hash::new_unique(),
            balance: Mutex::new(balance),
            fee: Mutex::new(Ok(5_000)),
            send_results: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(Some(Ok(()))),
            block_height: AtomicU64::new(LAST_VALID_BLOCK_HEIGHT - 150),
            block_height_step: AtomicU64::new(0),
            status_failures: AtomicUsize::new(0),
            height_failures: AtomicUsize::new(0),
            accounts: Mutex::new(HashMap::new()),
            accounts_error: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            send_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, balance: u64) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_fee(&self, fee: GaslessResult<u64>) {
        *self.fee.lock().unwrap() = fee;
    }

    /// Queue the outcome of the next send call
    pub fn push_send_result(&self, result: GaslessResult<Signature>) {
        self.send_results.lock().unwrap().push_back(result);
    }

    /// Queue the answer of the next status query
    pub fn push_status(&self, status: Option<TransactionStatus>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    /// Answer for status queries once the queue is empty
    pub fn set_default_status(&self, status: Option<TransactionStatus>) {
        *self.default_status.lock().unwrap() = status;
    }

    pub fn set_block_height(&self, height: u64) {
        self.block_height.store(height, Ordering::SeqCst);
    }

    /// Advance the block height by `step` on every height query
    pub fn set_block_height_step(&self, step: u64) {
        self.block_height_step.store(step, Ordering::SeqCst);
    }

    /// Fail the next `count` status queries with a network error
    pub fn fail_status_queries(&self, count: usize) {
        self.status_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` block-height queries with a network error
    pub fn fail_block_height_queries(&self, count: usize) {
        self.height_failures.store(count, Ordering::SeqCst);
    }

    pub fn insert_account(&self, key: Pubkey, account: Account) {
        self.accounts.lock().unwrap().insert(key, account);
    }

    pub fn fail_account_fetches(&self, error: GaslessError) {
        *self.accounts_error.lock().unwrap() = Some(error);
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_balance(&self, _pubkey: &Pubkey) -> GaslessResult<u64> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_latest_blockhash(&self) -> GaslessResult<RecentBlockhash> {
        Ok(RecentBlockhash {
            blockhash: self.blockhash,
            last_valid_block_height: LAST_VALID_BLOCK_HEIGHT,
        })
    }

    async fn get_fee_for_message(&self, _message: &VersionedMessage) -> GaslessResult<u64> {
        self.fee.lock().unwrap().clone()
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        _skip_preflight: bool,
        _max_retries: usize,
    ) -> GaslessResult<Signature> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.send_results.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| Ok(transaction.signatures[0]));
        if result.is_ok() {
            self.sent.lock().unwrap().push(transaction.clone());
        }
        result
    }

    async fn get_signature_status(&self, _signature: &Signature) -> GaslessResult<Option<TransactionStatus>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.status_failures) {
            return Err(GaslessError::network("getSignatureStatuses: connection reset"));
        }
        let scripted = self.statuses.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| self.default_status.lock().unwrap().clone()))
    }

    async fn get_block_height(&self) -> GaslessResult<u64> {
        if take_failure(&self.height_failures) {
            return Err(GaslessError::network("getBlockHeight: operation timed out"));
        }
        let step = self.block_height_step.load(Ordering::SeqCst);
        Ok(self.block_height.fetch_add(step, Ordering::SeqCst) + step)
    }

    async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> GaslessResult<Vec<Option<Account>>> {
        if let Some(error) = self.accounts_error.lock().unwrap().clone() {
            return Err(error);
        }
        let accounts = self.accounts.lock().unwrap();
        Ok(pubkeys.iter().map(|key| accounts.get(key).cloned()).collect())
    }
}

fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
