use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Kobo};

/// Transaction records are keyed by the caller's idempotency key.
pub type TransactionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money added to the wallet (top-up, reversal)
    Credit,
    /// Money taken from the wallet (purchase)
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "credit" => Some(Direction::Credit),
            "debit" => Some(Direction::Debit),
            _ => None,
        }
    }

    /// Sign applied to an amount when folding it into a balance.
    pub fn sign(&self) -> Kobo {
        match self {
            Direction::Credit => 1,
            Direction::Debit => -1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// Records are immutable once they leave `Pending`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in an account's append-only transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Idempotency key supplied by the caller
    pub transaction_id: TransactionId,
    /// Insertion order, assigned by the store
    pub sequence: i64,
    pub account_id: AccountId,
    pub direction: Direction,
    /// Always positive
    pub amount: Kobo,
    /// Account balance once this record settled
    pub balance_after: Kobo,
    /// Free text, e.g. "airtime:mtn:08031234567"
    pub reason: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Create a record. Sequence number must be assigned by the store.
    pub fn new(
        transaction_id: impl Into<TransactionId>,
        account_id: AccountId,
        direction: Direction,
        amount: Kobo,
        balance_after: Kobo,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            sequence: 0,
            account_id,
            direction,
            amount,
            balance_after,
            reason: reason.into(),
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn completed(mut self) -> Self {
        self.status = TransactionStatus::Completed;
        self
    }

    pub fn failed(mut self) -> Self {
        self.status = TransactionStatus::Failed;
        self
    }

    /// Signed effect on the balance; zero unless the record completed.
    pub fn balance_effect(&self) -> Kobo {
        match self.status {
            TransactionStatus::Completed => self.direction.sign() * self.amount,
            _ => 0,
        }
    }

    /// True if a request with these parameters is the one this record captured.
    pub fn matches_request(&self, account_id: AccountId, direction: Direction, amount: Kobo) -> bool {
        self.account_id == account_id && self.direction == direction && self.amount == amount
    }
}
