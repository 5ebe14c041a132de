use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Executor, Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    AccountBalance, AccountId, Direction, Kobo, TransactionRecord, TransactionStatus,
};

use super::{
    BalanceMutation, CommitOutcome, CreateOutcome, InsertOutcome, LedgerStore, UpdateOutcome,
    MIGRATION_001_INITIAL,
};

/// SQLite-backed ledger store.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    fn row_to_account(row: &SqliteRow) -> Result<AccountBalance> {
        let id_str: String = row.get("account_id");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(AccountBalance {
            account_id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            balance: row.get("balance"),
            version: row.get("version"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at timestamp")?,
        })
    }

    fn row_to_record(row: &SqliteRow) -> Result<TransactionRecord> {
        let account_id_str: String = row.get("account_id");
        let direction_str: String = row.get("direction");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(TransactionRecord {
            transaction_id: row.get("transaction_id"),
            sequence: row.get("sequence"),
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            direction: Direction::from_str(&direction_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid direction: {}", direction_str))?,
            amount: row.get("amount"),
            balance_after: row.get("balance_after"),
            reason: row.get("reason"),
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid status: {}", status_str))?,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    async fn update_balance<'e, E>(
        executor: E,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Result<Option<AccountBalance>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = ?, version = version + 1, updated_at = ?
            WHERE account_id = ? AND version = ?
            RETURNING account_id, balance, version, created_at, updated_at
            "#,
        )
        .bind(new_balance)
        .bind(Utc::now().to_rfc3339())
        .bind(account_id.to_string())
        .bind(expected_version)
        .fetch_optional(executor)
        .await
        .context("Failed to update balance")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Insert a record, returning its sequence number, or `None` if the
    /// transaction id is already taken.
    async fn insert_record<'e, E>(executor: E, record: &TransactionRecord) -> Result<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO wallet_transactions (transaction_id, account_id, direction, amount, balance_after, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING sequence
            "#,
        )
        .bind(&record.transaction_id)
        .bind(record.account_id.to_string())
        .bind(record.direction.as_str())
        .bind(record.amount)
        .bind(record.balance_after)
        .bind(&record.reason)
        .bind(record.status.as_str())
        .bind(record.created_at.to_rfc3339())
        .fetch_one(executor)
        .await;

        match result {
            Ok(row) => Ok(Some(row.get("sequence"))),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
            Err(err) => Err(anyhow::Error::new(err).context("Failed to insert transaction")),
        }
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn create_account(&self, account: &AccountBalance) -> Result<CreateOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (account_id, balance, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.account_id.to_string())
        .bind(account.balance)
        .bind(account.version)
        .bind(account.created_at.to_rfc3339())
        .bind(account.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(CreateOutcome::Created(account.clone())),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(err) => Err(anyhow::Error::new(err).context("Failed to save account")),
        }
    }

    async fn get_balance(&self, account_id: AccountId) -> Result<Option<AccountBalance>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, balance, version, created_at, updated_at
            FROM accounts
            WHERE account_id = ?
            "#,
        )
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<AccountBalance>> {
        let rows = sqlx::query(
            "SELECT account_id, balance, version, created_at, updated_at FROM accounts ORDER BY created_at, account_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    async fn conditional_update_balance(
        &self,
        account_id: AccountId,
        expected_version: i64,
        new_balance: Kobo,
    ) -> Result<UpdateOutcome> {
        match Self::update_balance(&self.pool, account_id, expected_version, new_balance).await? {
            Some(account) => Ok(UpdateOutcome::Committed(account)),
            None => Ok(UpdateOutcome::Conflict),
        }
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<InsertOutcome> {
        match Self::insert_record(&self.pool, record).await? {
            Some(sequence) => Ok(InsertOutcome::Inserted(TransactionRecord {
                sequence,
                ..record.clone()
            })),
            None => Ok(InsertOutcome::Duplicate),
        }
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT sequence, transaction_id, account_id, direction, amount, balance_after, reason, status, created_at
            FROM wallet_transactions
            WHERE transaction_id = ?
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        let mut query = String::from(
            "SELECT sequence, transaction_id, account_id, direction, amount, balance_after, reason, status, created_at FROM wallet_transactions",
        );

        let account_id_str = account_id.map(|id| id.to_string());
        if account_id_str.is_some() {
            query.push_str(" WHERE account_id = ?");
        }
        query.push_str(" ORDER BY sequence DESC");
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(ref id) = account_id_str {
            sql_query = sql_query.bind(id);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn commit_mutation(&self, mutation: &BalanceMutation) -> Result<CommitOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        // The UPDATE comes first so the write lock is taken up front
        let account = match Self::update_balance(
            &mut *tx,
            mutation.account_id(),
            mutation.expected_version,
            mutation.new_balance(),
        )
        .await?
        {
            Some(account) => account,
            None => {
                tx.rollback().await.context("Failed to roll back")?;
                return Ok(CommitOutcome::Conflict);
            }
        };

        let Some(sequence) = Self::insert_record(&mut *tx, &mutation.record).await? else {
            debug!(
                transaction_id = %mutation.record.transaction_id,
                "duplicate transaction id, rolling back balance update"
            );
            tx.rollback().await.context("Failed to roll back")?;
            return Ok(CommitOutcome::Duplicate);
        };

        tx.commit().await.context("Failed to commit transaction")?;

        Ok(CommitOutcome::Committed {
            account,
            record: TransactionRecord {
                sequence,
                ..mutation.record.clone()
            },
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
