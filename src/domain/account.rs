use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Kobo;

pub type AccountId = Uuid;

/// Per-user wallet balance, mutated only through the wallet service.
///
/// `version` increases by exactly one on every committed mutation and is the
/// compare-and-swap token for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub balance: Kobo,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// A freshly opened account: zero balance, version zero.
    pub fn open(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            balance: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The state after a committed mutation to `new_balance`.
    pub fn advanced(&self, new_balance: Kobo) -> Self {
        Self {
            balance: new_balance,
            version: self.version + 1,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}
