// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use neocharge_wallet::application::{
    Fulfillment, FulfillmentError, FulfillmentReceipt, WalletConfig, WalletService,
};
use neocharge_wallet::domain::{AccountBalance, AccountId, Kobo, PurchaseOrder, TransactionRecord};
use neocharge_wallet::storage::{
    BalanceMutation, CommitOutcome, CreateOutcome, InsertOutcome, LedgerStore, MemoryLedgerStore,
    SqliteLedgerStore, UpdateOutcome,
};
use tempfile::TempDir;
use uuid::Uuid;

/// Helper to create a wallet service over a temporary SQLite database
pub async fn sqlite_service() -> Result<(WalletService<SqliteLedgerStore>, TempDir)> {
    sqlite_service_with(WalletConfig::default()).await
}

pub async fn sqlite_service_with(
    config: WalletConfig,
) -> Result<(WalletService<SqliteLedgerStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = WalletService::<SqliteLedgerStore>::init(db_path.to_str().unwrap(), config).await?;
    Ok((service, temp_dir))
}

/// Helper to create a wallet service over an in-memory store
pub fn memory_service() -> WalletService<MemoryLedgerStore> {
    WalletService::new(MemoryLedgerStore::new())
}

/// Open an account and top it up with `amount` kobo (if positive)
pub async fn open_funded<S: LedgerStore>(
    service: &WalletService<S>,
    amount: Kobo,
) -> Result<AccountId> {
    let account_id = Uuid::new_v4();
    service.open_account(account_id).await?;
    if amount > 0 {
        service
            .credit(account_id, amount, "topup", &format!("seed-{}", account_id))
            .await?;
    }
    Ok(account_id)
}

/// Store that reports a version conflict for the first `conflicts` commits,
/// then behaves like the in-memory store.
pub struct ContendedStore {
    inner: MemoryLedgerStore,
    conflicts_left: AtomicU32,
    pub commit_calls: AtomicU32,
}

impl ContendedStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            conflicts_left: AtomicU32::new(conflicts),
            commit_calls: AtomicU32::new(0),
        }
    }

    pub fn always_conflicting() -> Self {
        Self::new(u32::MAX)
    }

    /// Make the next `conflicts` commits fail with a version conflict.
    pub fn set_conflicts(&self, conflicts: u32) {
        self.conflicts_left.store(conflicts, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for ContendedStore {
    async fn create_account(&self, account: &AccountBalance) -> Result<CreateOutcome> {
        self.inner.create_account(account).await
    }

    async fn get_balance(&self, account_id: AccountId) -> Result<Option<AccountBalance>> {
        self.inner.get_balance(account_id).await
    }

    async fn list_accounts(&self) -> Result<Vec<AccountBalance>> {
        self.inner.list_accounts().await
    }

    async fn conditional_update_balance(
        &self,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Result<UpdateOutcome> {
        self.inner
            .conditional_update_balance(account_id, expected_version, new_balance)
            .await
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<InsertOutcome> {
        self.inner.insert_transaction(record).await
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        self.inner.find_transaction(transaction_id).await
    }

    async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        self.inner.list_transactions(account_id, limit).await
    }

    async fn commit_mutation(&self, mutation: &BalanceMutation) -> Result<CommitOutcome> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let conflict = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflict {
            return Ok(CommitOutcome::Conflict);
        }
        self.inner.commit_mutation(mutation).await
    }
}

/// Store whose reads hang for `delay`.
pub struct StalledStore {
    inner: MemoryLedgerStore,
    delay: Duration,
}

impl StalledStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl LedgerStore for StalledStore {
    async fn create_account(&self, account: &AccountBalance) -> Result<CreateOutcome> {
        self.inner.create_account(account).await
    }

    async fn get_balance(&self, account_id: AccountId) -> Result<Option<AccountBalance>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_balance(account_id).await
    }

    async fn list_accounts(&self) -> Result<Vec<AccountBalance>> {
        self.inner.list_accounts().await
    }

    async fn conditional_update_balance(
        &self,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Result<UpdateOutcome> {
        self.inner
            .conditional_update_balance(account_id, expected_version, new_balance)
            .await
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<InsertOutcome> {
        self.inner.insert_transaction(record).await
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        self.inner.find_transaction(transaction_id).await
    }

    async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        self.inner.list_transactions(account_id, limit).await
    }

    async fn commit_mutation(&self, mutation: &BalanceMutation) -> Result<CommitOutcome> {
        self.inner.commit_mutation(mutation).await
    }
}

/// Store whose commits fail outright for transaction ids starting with
/// `failing_prefix`; everything else goes to the in-memory store.
pub struct BrokenStore {
    inner: MemoryLedgerStore,
    failing_prefix: String,
}

impl BrokenStore {
    pub fn failing_commits_for(prefix: &str) -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            failing_prefix: prefix.to_string(),
        }
    }

    pub fn failing_every_commit() -> Self {
        Self::failing_commits_for("")
    }
}

#[async_trait]
impl LedgerStore for BrokenStore {
    async fn create_account(&self, account: &AccountBalance) -> Result<CreateOutcome> {
        self.inner.create_account(account).await
    }

    async fn get_balance(&self, account_id: AccountId) -> Result<Option<AccountBalance>> {
        self.inner.get_balance(account_id).await
    }

    async fn list_accounts(&self) -> Result<Vec<AccountBalance>> {
        self.inner.list_accounts().await
    }

    async fn conditional_update_balance(
        &self,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Result<UpdateOutcome> {
        self.inner
            .conditional_update_balance(account_id, expected_version, new_balance)
            .await
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<InsertOutcome> {
        self.inner.insert_transaction(record).await
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        self.inner.find_transaction(transaction_id).await
    }

    async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        self.inner.list_transactions(account_id, limit).await
    }

    async fn commit_mutation(&self, mutation: &BalanceMutation) -> Result<CommitOutcome> {
        if mutation.record.transaction_id.starts_with(&self.failing_prefix) {
            anyhow::bail!("disk I/O error while committing {}", mutation.record.transaction_id);
        }
        self.inner.commit_mutation(mutation).await
    }
}

/// Fulfillment double that records every request id it sees.
#[derive(Clone, Default)]
pub struct RecordingFulfillment {
    pub calls: Arc<AtomicUsize>,
    pub request_ids: Arc<std::sync::Mutex<Vec<String>>>,
    pub fail: bool,
}

impl RecordingFulfillment {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fulfillment for RecordingFulfillment {
    async fn fulfill(
        &self,
        request_id: &str,
        order: &PurchaseOrder,
    ) -> Result<FulfillmentReceipt, FulfillmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.request_ids
            .lock()
            .unwrap()
            .push(request_id.to_string());

        if self.fail {
            return Err(FulfillmentError {
                provider: order.provider().to_string(),
                request_id: request_id.to_string(),
                message: "service temporarily unavailable".to_string(),
            });
        }

        Ok(FulfillmentReceipt {
            provider_reference: format!("ref-{}", request_id),
            token: None,
        })
    }
}
