use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{AccountId, Kobo, MeterType, PurchaseOrder};

use super::{PurchaseError, WalletReceipt, WalletService};
use crate::storage::LedgerStore;

/// What the provider hands back for a delivered product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentReceipt {
    pub provider_reference: String,
    /// Prepaid electricity token, when the product has one
    pub token: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} rejected request {request_id}: {message}")]
pub struct FulfillmentError {
    pub provider: String,
    pub request_id: String,
    pub message: String,
}

/// A billing provider that delivers airtime, data, TV or electricity.
///
/// Implementations must treat `request_id` as an idempotency key: the same id
/// may be submitted more than once and must be delivered at most once.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    async fn fulfill(
        &self,
        request_id: &str,
        order: &PurchaseOrder,
    ) -> Result<FulfillmentReceipt, FulfillmentError>;
}

/// A completed purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub order: PurchaseOrder,
    pub debit: WalletReceipt,
    pub fulfillment: FulfillmentReceipt,
}

/// Idempotency key used for the refund of a failed purchase.
pub fn reversal_key(idempotency_key: &str) -> String {
    format!("reversal:{}", idempotency_key)
}

/// Debit, deliver, and refund if delivery fails.
pub struct PurchaseOrchestrator<S, F> {
    wallet: WalletService<S>,
    fulfillment: F,
}

impl<S: LedgerStore, F: Fulfillment> PurchaseOrchestrator<S, F> {
    pub fn new(wallet: WalletService<S>, fulfillment: F) -> Self {
        Self {
            wallet,
            fulfillment,
        }
    }

    pub fn wallet(&self) -> &WalletService<S> {
        &self.wallet
    }

    pub async fn purchase(
        &self,
        account_id: AccountId,
        order: PurchaseOrder,
        idempotency_key: &str,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let order = order.validated()?;
        let reason = order.reason();
        let amount = order.amount();
        let key = idempotency_key;

        let debit = self.wallet.debit(account_id, amount, &reason, key).await?;

        if debit.replayed && self.wallet.find_transaction(&reversal_key(key)).await?.is_some() {
            return Err(PurchaseError::Reversed {
                key: key.to_string(),
            });
        }

        match self.fulfillment.fulfill(key, &order).await {
            Ok(fulfillment) => {
                info!(
                    %account_id,
                    transaction_id = key,
                    product = order.product(),
                    provider_reference = %fulfillment.provider_reference,
                    "purchase fulfilled"
                );
                Ok(PurchaseReceipt {
                    order,
                    debit,
                    fulfillment,
                })
            }
            Err(err) => {
                let reversed = self.reverse(account_id, amount, &reason, key, &err).await;
                Err(PurchaseError::FulfillmentFailed {
                    reason: err.to_string(),
                    reversed,
                })
            }
        }
    }

    /// Refund a debit whose fulfillment failed. Returns whether the refund landed.
    async fn reverse(
        &self,
        account_id: AccountId,
        amount: Kobo,
        reason: &str,
        key: &str,
        cause: &FulfillmentError,
    ) -> bool {
        let reversal_reason = format!("reversal:{}", reason);
        match self
            .wallet
            .credit(account_id, amount, &reversal_reason, &reversal_key(key))
            .await
        {
            Ok(receipt) => {
                warn!(
                    %account_id,
                    transaction_id = key,
                    amount,
                    balance = receipt.new_balance,
                    error = %cause,
                    "fulfillment failed, debit reversed"
                );
                true
            }
            Err(err) => {
                error!(
                    %account_id,
                    transaction_id = key,
                    amount,
                    error = %err,
                    cause = %cause,
                    "fulfillment failed and reversal did not commit; needs manual reconciliation"
                );
                false
            }
        }
    }
}

/// Provider stand-in that never leaves the process.
///
/// Issues a reference (and a token for prepaid meters) or fails on demand,
/// so the refund path can be exercised without a billing provider.
#[derive(Debug, Clone, Default)]
pub struct OfflineFulfillment {
    fail_with: Option<String>,
}

impl OfflineFulfillment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl Fulfillment for OfflineFulfillment {
    async fn fulfill(
        &self,
        request_id: &str,
        order: &PurchaseOrder,
    ) -> Result<FulfillmentReceipt, FulfillmentError> {
        if let Some(message) = &self.fail_with {
            return Err(FulfillmentError {
                provider: order.provider().to_string(),
                request_id: request_id.to_string(),
                message: message.clone(),
            });
        }

        let token = match order {
            PurchaseOrder::Electricity {
                meter_type: MeterType::Prepaid,
                ..
            } => Some(electricity_token()),
            _ => None,
        };

        Ok(FulfillmentReceipt {
            provider_reference: format!("offline-{}", Uuid::new_v4().simple()),
            token,
        })
    }
}

/// 20-digit prepaid token, grouped in fours.
fn electricity_token() -> String {
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| format!("{:04}", rng.gen_range(0..10_000)))
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Disco, Network, naira};

    #[tokio::test]
    async fn test_offline_fulfillment_issues_tokens_for_prepaid() {
        let order = PurchaseOrder::Electricity {
            disco: Disco::EkoElectric,
            meter_type: MeterType::Prepaid,
            meter_number: "45012345678".into(),
            amount: naira(1000),
        };
        let receipt = OfflineFulfillment::new().fulfill("r1", &order).await.unwrap();
        let token = receipt.token.unwrap();
        assert_eq!(token.len(), 24);
        assert_eq!(token.chars().filter(|c| c.is_ascii_digit()).count(), 20);
        assert!(receipt.provider_reference.starts_with("offline-"));
    }

    #[tokio::test]
    async fn test_offline_fulfillment_can_fail() {
        let order = PurchaseOrder::Airtime {
            network: Network::Mtn,
            phone: "08031234567".into(),
            amount: naira(100),
        };
        let err = OfflineFulfillment::failing("provider down")
            .fulfill("r2", &order)
            .await
            .unwrap_err();
        assert_eq!(err.provider, "mtn");
        assert_eq!(err.request_id, "r2");
        assert_eq!(err.to_string(), "mtn rejected request r2: provider down");
    }

    #[test]
    fn test_reversal_key() {
        assert_eq!(reversal_key("abc"), "reversal:abc");
    }
}
