use thiserror::Error;

use crate::domain::{AccountId, Kobo, OrderError};

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Idempotency key must be non-empty, without surrounding whitespace")]
    InvalidIdempotencyKey,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(AccountId),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Kobo,
        required: Kobo,
    },

    #[error("Gave up on account {account_id} after {attempts} conflicting attempts")]
    ConcurrencyConflict { account_id: AccountId, attempts: u32 },

    #[error("Idempotency key '{key}' was already used for a different request")]
    IdempotencyKeyReused { key: String },

    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(#[from] anyhow::Error),
}

impl WalletError {
    /// Whether repeating the same call (with the same idempotency key) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::ConcurrencyConflict { .. } | WalletError::StoreUnavailable(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum PurchaseError {
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("Purchase '{key}' already failed and was refunded")]
    Reversed { key: String },

    #[error("Fulfillment failed: {reason} (refunded: {reversed})")]
    FulfillmentFailed { reason: String, reversed: bool },
}
