use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::{
    AccountBalance, AccountId, Direction, IntegrityReport, Kobo, TransactionRecord,
    TransactionStatus, build_integrity_report,
};
use crate::storage::{
    BalanceMutation, CommitOutcome, CreateOutcome, InsertOutcome, LedgerStore, SqliteLedgerStore,
};

use super::WalletError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for the optimistic-concurrency loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletConfig {
    /// Read-compute-write cycles before giving up with `ConcurrencyConflict`
    pub max_attempts: u32,
    /// Upper bound for any single ledger store call
    pub store_timeout: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Outcome of a successful debit or credit.
#[derive(Debug, Clone)]
pub struct WalletReceipt {
    pub transaction: TransactionRecord,
    pub new_balance: Kobo,
    /// True if the idempotency key had already been processed and nothing changed
    pub replayed: bool,
}

/// The only component allowed to change wallet balances.
///
/// Every mutation is keyed by a caller-supplied idempotency key and committed
/// with a compare-and-swap on the account version, so concurrent callers and
/// repeated requests can never double-charge or drive a balance negative.
/// No lock is held across the retry loop; the store's conditional update is
/// the only synchronisation point.
pub struct WalletService<S> {
    store: Arc<S>,
    config: WalletConfig,
}

impl<S> Clone for WalletService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl WalletService<SqliteLedgerStore> {
    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, config: WalletConfig) -> Result<Self, WalletError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let store = SqliteLedgerStore::init(&db_url).await?;
        Ok(Self::with_config(Arc::new(store), config))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, config: WalletConfig) -> Result<Self, WalletError> {
        let db_url = format!("sqlite:{}", database_path);
        let store = SqliteLedgerStore::connect(&db_url).await?;
        Ok(Self::with_config(Arc::new(store), config))
    }
}

impl<S: LedgerStore> WalletService<S> {
    /// Create a wallet service with default settings.
    pub fn new(store: S) -> Self {
        Self::with_config(Arc::new(store), WalletConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: WalletConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Run one store call under the configured timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, WalletError> {
        match timeout(self.config.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(operation, error = %err, "ledger store call failed");
                Err(WalletError::StoreUnavailable(err))
            }
            Err(_) => {
                warn!(operation, timeout = ?self.config.store_timeout, "ledger store call timed out");
                Err(WalletError::StoreUnavailable(anyhow::anyhow!(
                    "{} timed out after {:?}",
                    operation,
                    self.config.store_timeout
                )))
            }
        }
    }

    // ========================
    // Account operations
    // ========================

    /// Open a wallet for a newly signed-up user, with zero balance.
    pub async fn open_account(&self, account_id: AccountId) -> Result<AccountBalance, WalletError> {
        let account = AccountBalance::open(account_id);
        match self
            .call("create_account", self.store.create_account(&account))
            .await?
        {
            CreateOutcome::Created(account) => {
                info!(%account_id, "account opened");
                Ok(account)
            }
            CreateOutcome::AlreadyExists => Err(WalletError::AccountAlreadyExists(account_id)),
        }
    }

    /// Get an account's balance record, including its version.
    pub async fn get_account(&self, account_id: AccountId) -> Result<AccountBalance, WalletError> {
        self.call("get_balance", self.store.get_balance(account_id))
            .await?
            .ok_or(WalletError::AccountNotFound(account_id))
    }

    /// Current balance in kobo.
    pub async fn get_balance(&self, account_id: AccountId) -> Result<Kobo, WalletError> {
        Ok(self.get_account(account_id).await?.balance)
    }

    pub async fn list_accounts(&self) -> Result<Vec<AccountBalance>, WalletError> {
        self.call("list_accounts", self.store.list_accounts()).await
    }

    // ========================
    // Balance mutations
    // ========================

    /// Take `amount` kobo from the account.
    ///
    /// Replays the stored outcome if `idempotency_key` was seen before; fails
    /// with `InsufficientFunds` (and logs a `failed` record) if the balance
    /// would go negative.
    pub async fn debit(
        &self,
        account_id: AccountId,
        amount: Kobo,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<WalletReceipt, WalletError> {
        self.mutate(Direction::Debit, account_id, amount, reason, idempotency_key)
            .await
    }

    /// Add `amount` kobo to the account. Idempotent like [`Self::debit`].
    pub async fn credit(
        &self,
        account_id: AccountId,
        amount: Kobo,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<WalletReceipt, WalletError> {
        self.mutate(Direction::Credit, account_id, amount, reason, idempotency_key)
            .await
    }

    async fn mutate(
        &self,
        direction: Direction,
        account_id: AccountId,
        amount: Kobo,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<WalletReceipt, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(format!(
                "{} kobo; amount must be positive",
                amount
            )));
        }
        let key = idempotency_key;
        if key.is_empty() || key.trim() != key {
            return Err(WalletError::InvalidIdempotencyKey);
        }

        if let Some(existing) = self
            .call("find_transaction", self.store.find_transaction(key))
            .await?
        {
            return Self::replay(existing, account_id, direction, amount);
        }

        for attempt in 1..=self.config.max_attempts {
            let account = self.get_account(account_id).await?;

            let new_balance = match direction {
                Direction::Debit => match account.balance.checked_sub(amount) {
                    Some(balance) if balance >= 0 => balance,
                    _ => return self.reject_debit(&account, amount, reason, key).await,
                },
                Direction::Credit => account.balance.checked_add(amount).ok_or_else(|| {
                    WalletError::InvalidAmount(format!("{} kobo would overflow the balance", amount))
                })?,
            };

            let record =
                TransactionRecord::new(key, account_id, direction, amount, new_balance, reason);
            let mutation = BalanceMutation::new(account.version, record);

            match self
                .call("commit_mutation", self.store.commit_mutation(&mutation))
                .await?
            {
                CommitOutcome::Committed { account, record } => {
                    info!(
                        %account_id,
                        transaction_id = %record.transaction_id,
                        %direction,
                        amount,
                        balance = account.balance,
                        version = account.version,
                        "wallet mutation committed"
                    );
                    return Ok(WalletReceipt {
                        new_balance: account.balance,
                        transaction: record,
                        replayed: false,
                    });
                }
                CommitOutcome::Conflict => {
                    debug!(%account_id, attempt, "version conflict, retrying");
                }
                CommitOutcome::Duplicate => {
                    // Another caller committed this key between our lookup and our write
                    let existing = self.find_required(key).await?;
                    return Self::replay(existing, account_id, direction, amount);
                }
            }
        }

        warn!(
            %account_id,
            attempts = self.config.max_attempts,
            "wallet mutation abandoned after repeated conflicts"
        );
        Err(WalletError::ConcurrencyConflict {
            account_id,
            attempts: self.config.max_attempts,
        })
    }

    /// Record a debit that the balance cannot cover.
    async fn reject_debit(
        &self,
        account: &AccountBalance,
        amount: Kobo,
        reason: &str,
        key: &str,
    ) -> Result<WalletReceipt, WalletError> {
        let record = TransactionRecord::new(
            key,
            account.account_id,
            Direction::Debit,
            amount,
            account.balance,
            reason,
        )
        .failed();

        match self
            .call("insert_transaction", self.store.insert_transaction(&record))
            .await?
        {
            InsertOutcome::Inserted(_) => {
                info!(
                    account_id = %account.account_id,
                    transaction_id = key,
                    amount,
                    balance = account.balance,
                    "debit rejected: insufficient funds"
                );
                Err(WalletError::InsufficientFunds {
                    account_id: account.account_id,
                    balance: account.balance,
                    required: amount,
                })
            }
            InsertOutcome::Duplicate => {
                let existing = self.find_required(key).await?;
                Self::replay(existing, account.account_id, Direction::Debit, amount)
            }
        }
    }

    async fn find_required(&self, key: &str) -> Result<TransactionRecord, WalletError> {
        self.call("find_transaction", self.store.find_transaction(key))
            .await?
            .ok_or_else(|| {
                WalletError::StoreUnavailable(anyhow::anyhow!(
                    "transaction {} reported as duplicate but cannot be read",
                    key
                ))
            })
    }

    /// Answer a repeated request from the record the first one left behind.
    fn replay(
        existing: TransactionRecord,
        account_id: AccountId,
        direction: Direction,
        amount: Kobo,
    ) -> Result<WalletReceipt, WalletError> {
        if !existing.matches_request(account_id, direction, amount) {
            warn!(
                transaction_id = %existing.transaction_id,
                "idempotency key reused with different parameters"
            );
            return Err(WalletError::IdempotencyKeyReused {
                key: existing.transaction_id,
            });
        }

        if !existing.status.is_terminal() {
            return Err(WalletError::ConcurrencyConflict {
                account_id,
                attempts: 0,
            });
        }
        if existing.status == TransactionStatus::Failed {
            return Err(WalletError::InsufficientFunds {
                account_id,
                balance: existing.balance_after,
                required: amount,
            });
        }

        debug!(transaction_id = %existing.transaction_id, "replaying completed transaction");
        Ok(WalletReceipt {
            new_balance: existing.balance_after,
            transaction: existing,
            replayed: true,
        })
    }

    // ========================
    // Queries
    // ========================

    /// Transaction log for an account, newest first.
    pub async fn history(
        &self,
        account_id: AccountId,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        self.get_account(account_id).await?;
        self.call(
            "list_transactions",
            self.store.list_transactions(Some(account_id), limit),
        )
        .await
    }

    /// Every account's transactions, newest first.
    pub async fn list_transactions(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        self.call("list_transactions", self.store.list_transactions(None, limit))
            .await
    }

    /// Look up a transaction by its idempotency key.
    pub async fn find_transaction(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<TransactionRecord>, WalletError> {
        self.call(
            "find_transaction",
            self.store.find_transaction(idempotency_key),
        )
        .await
    }

    /// Compare stored balances against a replay of the transaction log.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, WalletError> {
        let accounts = self.list_accounts().await?;
        let records = self
            .call("list_transactions", self.store.list_transactions(None, None))
            .await?;
        Ok(build_integrity_report(&accounts, &records))
    }
}
