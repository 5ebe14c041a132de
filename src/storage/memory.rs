use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{AccountBalance, AccountId, Kobo, TransactionRecord};

use super::{
    BalanceMutation, CommitOutcome, CreateOutcome, InsertOutcome, LedgerStore, UpdateOutcome,
};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<AccountId, AccountBalance>,
    /// Records in insertion order; `sequence` is the index + 1
    records: Vec<TransactionRecord>,
    by_id: HashMap<String, usize>,
}

impl MemoryState {
    fn update(
        &mut self,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Option<AccountBalance> {
        let account = self.accounts.get_mut(&account_id)?;
        if account.version != expected_version || new_balance < 0 {
            return None;
        }
        *account = account.advanced(new_balance);
        Some(account.clone())
    }

    fn insert(&mut self, record: &TransactionRecord) -> Option<TransactionRecord> {
        if self.by_id.contains_key(&record.transaction_id) {
            return None;
        }
        let stored = TransactionRecord {
            sequence: self.records.len() as i64 + 1,
            ..record.clone()
        };
        self.by_id
            .insert(stored.transaction_id.clone(), self.records.len());
        self.records.push(stored.clone());
        Some(stored)
    }
}

/// Ledger store kept entirely in process memory.
///
/// Same semantics as the SQLite store; state is lost when it is dropped.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<MemoryState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("memory ledger store lock poisoned"))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_account(&self, account: &AccountBalance) -> Result<CreateOutcome> {
        let mut state = self.state()?;
        if state.accounts.contains_key(&account.account_id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        state.accounts.insert(account.account_id, account.clone());
        Ok(CreateOutcome::Created(account.clone()))
    }

    async fn get_balance(&self, account_id: AccountId) -> Result<Option<AccountBalance>> {
        Ok(self.state()?.accounts.get(&account_id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<AccountBalance>> {
        let mut accounts: Vec<AccountBalance> = self.state()?.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        Ok(accounts)
    }

    async fn conditional_update_balance(
        &self,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Result<UpdateOutcome> {
        match self
            .state()?
            .update(account_id, expected_version, new_balance)
        {
            Some(account) => Ok(UpdateOutcome::Committed(account)),
            None => Ok(UpdateOutcome::Conflict),
        }
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<InsertOutcome> {
        match self.state()?.insert(record) {
            Some(stored) => Ok(InsertOutcome::Inserted(stored)),
            None => Ok(InsertOutcome::Duplicate),
        }
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        let state = self.state()?;
        Ok(state
            .by_id
            .get(transaction_id)
            .map(|&index| state.records[index].clone()))
    }

    async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        let state = self.state()?;
        Ok(state
            .records
            .iter()
            .rev()
            .filter(|r| account_id.is_none_or(|id| r.account_id == id))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn commit_mutation(&self, mutation: &BalanceMutation) -> Result<CommitOutcome> {
        let mut state = self.state()?;

        // Check both preconditions before touching anything
        if state.by_id.contains_key(&mutation.record.transaction_id) {
            return Ok(CommitOutcome::Duplicate);
        }
        let Some(account) = state.update(
            mutation.account_id(),
            mutation.expected_version,
            mutation.new_balance(),
        ) else {
            return Ok(CommitOutcome::Conflict);
        };
        let Some(record) = state.insert(&mutation.record) else {
            return Ok(CommitOutcome::Duplicate);
        };

        Ok(CommitOutcome::Committed { account, record })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::Direction;

    #[tokio::test]
    async fn test_conditional_update_checks_version() {
        let store = MemoryLedgerStore::new();
        let account = AccountBalance::open(Uuid::new_v4());
        store.create_account(&account).await.unwrap();

        let first = store
            .conditional_update_balance(account.account_id, 0, 500)
            .await
            .unwrap();
        assert!(matches!(first, UpdateOutcome::Committed(ref a) if a.version == 1 && a.balance == 500));

        let stale = store
            .conditional_update_balance(account.account_id, 0, 900)
            .await
            .unwrap();
        assert_eq!(stale, UpdateOutcome::Conflict);
        assert_eq!(
            store.get_balance(account.account_id).await.unwrap().unwrap().balance,
            500
        );
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing_on_duplicate() {
        let store = MemoryLedgerStore::new();
        let account = AccountBalance::open(Uuid::new_v4());
        store.create_account(&account).await.unwrap();

        let record = TransactionRecord::new("k", account.account_id, Direction::Credit, 100, 100, "topup");
        let outcome = store
            .commit_mutation(&BalanceMutation::new(0, record.clone()))
            .await
            .unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed { .. }));

        let again = store
            .commit_mutation(&BalanceMutation::new(1, record))
            .await
            .unwrap();
        assert_eq!(again, CommitOutcome::Duplicate);

        let stored = store.get_balance(account.account_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.balance, 100);
    }

    #[tokio::test]
    async fn test_list_transactions_newest_first() {
        let store = MemoryLedgerStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for (key, account) in [("1", a), ("2", b), ("3", a)] {
            let record = TransactionRecord::new(key, account, Direction::Credit, 10, 10, "x");
            store.insert_transaction(&record).await.unwrap();
        }

        let for_a = store.list_transactions(Some(a), None).await.unwrap();
        let ids: Vec<_> = for_a.iter().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, ["3", "1"]);
        assert_eq!(for_a[0].sequence, 3);

        let limited = store.list_transactions(None, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].transaction_id, "3");
    }
}
