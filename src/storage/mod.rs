mod memory;
mod repository;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{AccountBalance, AccountId, Kobo, TransactionRecord};

pub use memory::*;
pub use repository::*;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(AccountBalance),
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Committed(AccountBalance),
    /// The account's version no longer matches the expected one
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored record, with its sequence number assigned
    Inserted(TransactionRecord),
    /// A record with the same transaction id already exists
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed {
        account: AccountBalance,
        record: TransactionRecord,
    },
    Conflict,
    Duplicate,
}

/// A balance change and the completed record that explains it.
///
/// The new balance and the target account are taken from the record so the
/// two can never disagree.
#[derive(Debug, Clone)]
pub struct BalanceMutation {
    pub expected_version: i64,
    pub record: TransactionRecord,
}

impl BalanceMutation {
    pub fn new(expected_version: i64, record: TransactionRecord) -> Self {
        Self {
            expected_version,
            record: record.completed(),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.record.account_id
    }

    pub fn new_balance(&self) -> Kobo {
        self.record.balance_after
    }
}

/// Durable home of account balances and the transaction log.
///
/// Conflicts and duplicates are ordinary outcomes; `Err` is reserved for the
/// store being unreachable or misbehaving.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Insert a new account row.
    async fn create_account(&self, account: &AccountBalance) -> Result<CreateOutcome>;

    /// Read an account's balance and version.
    async fn get_balance(&self, account_id: AccountId) -> Result<Option<AccountBalance>>;

    /// List every account, ordered by creation time.
    async fn list_accounts(&self) -> Result<Vec<AccountBalance>>;

    /// Compare-and-swap the balance: succeeds only if the stored version still
    /// equals `expected_version`, and bumps it by one.
    async fn conditional_update_balance(
        &self,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Result<UpdateOutcome>;

    /// Append a record to the transaction log.
    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<InsertOutcome>;

    /// Look up a record by its transaction id (idempotency key).
    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>>;

    /// Records newest first, optionally for a single account and capped at `limit`.
    async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>>;

    /// Conditional balance update plus record insert, all or nothing.
    async fn commit_mutation(&self, mutation: &BalanceMutation) -> Result<CommitOutcome>;
}
