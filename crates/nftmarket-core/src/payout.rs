//! Payout rail
//!
//! Moves withdrawn proceeds out of the marketplace to the seller. Like the
//! item transfer, a payout may run code on the recipient side.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use nftmarket_types::{AccountId, Amount, PayoutError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[async_trait]
pub trait PayoutRail: Send + Sync {
    async fn pay(&self, to: &AccountId, amount: Amount) -> Result<(), PayoutError>;
}

/// Recipient-side hook invoked when a payout arrives
#[async_trait]
pub trait PayoutReceiver: Send + Sync {
    /// Returning an error refuses the payment
    async fn on_payment(&self, amount: Amount) -> Result<(), String>;
}

/// In-memory payout rail that tracks what each account has been paid
#[derive(Clone)]
pub struct InMemoryPayoutRail {
    paid: Arc<RwLock<HashMap<AccountId, Amount>>>,
    rejected: Arc<RwLock<HashSet<AccountId>>>,
    receivers: Arc<RwLock<HashMap<AccountId, Arc<dyn PayoutReceiver>>>>,
}

impl InMemoryPayoutRail {
    pub fn new() -> Self {
        Self {
            paid: Arc::new(RwLock::new(HashMap::new())),
            rejected: Arc::new(RwLock::new(HashSet::new())),
            receivers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total paid out to an account so far
    pub async fn paid_to(&self, account: &AccountId) -> Amount {
        self.paid
            .read()
            .await
            .get(account)
            .copied()
            .unwrap_or(Amount::zero())
    }

    /// Make every future payment to `account` fail
    pub async fn reject(&self, account: &AccountId) {
        self.rejected.write().await.insert(account.clone());
    }

    pub async fn accept(&self, account: &AccountId) {
        self.rejected.write().await.remove(account);
    }

    pub async fn register_receiver(
        &self,
        account: &AccountId,
        receiver: Arc<dyn PayoutReceiver>,
    ) {
        self.receivers.write().await.insert(account.clone(), receiver);
    }
}

impl Default for InMemoryPayoutRail {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutRail for InMemoryPayoutRail {
    async fn pay(&self, to: &AccountId, amount: Amount) -> Result<(), PayoutError> {
        if self.rejected.read().await.contains(to) {
            warn!("Payout of {} to {} rejected", amount, to);
            return Err(PayoutError::Rejected {
                to: to.clone(),
                amount,
                reason: "recipient cannot receive payments".to_string(),
            });
        }

        // No lock is held while the recipient runs
        let receiver = self.receivers.read().await.get(to).cloned();
        if let Some(receiver) = receiver {
            receiver
                .on_payment(amount)
                .await
                .map_err(|reason| PayoutError::Rejected {
                    to: to.clone(),
                    amount,
                    reason,
                })?;
        }

        let mut paid = self.paid.write().await;
        let total = paid.entry(to.clone()).or_insert(Amount::zero());
        *total = total.checked_add(amount).ok_or_else(|| PayoutError::Rejected {
            to: to.clone(),
            amount,
            reason: "recipient balance overflow".to_string(),
        })?;
        debug!("Paid {} to {}", amount, to);
        Ok(())
    }
}
