//! In-memory asset registry
//!
//! Models an ERC-721 style registry: sequential item ids per collection,
//! a single approved account per item, and collection-wide operator grants
//! per owner. Used as the registry test double and by the demo driver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use nftmarket_types::{AccountId, CollectionId, ItemId, ItemKey, RegistryError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{AssetRegistry, Result, TransferReceiver};

#[derive(Debug, Clone)]
struct ItemRecord {
    owner: AccountId,
    approved: Option<AccountId>,
}

/// (collection, owner, operator)
type OperatorGrant = (CollectionId, AccountId, AccountId);

#[derive(Clone)]
pub struct InMemoryAssetRegistry {
    items: Arc<RwLock<HashMap<ItemKey, ItemRecord>>>,
    next_ids: Arc<RwLock<HashMap<CollectionId, ItemId>>>,
    operators: Arc<RwLock<HashSet<OperatorGrant>>>,
    receivers: Arc<RwLock<HashMap<AccountId, Arc<dyn TransferReceiver>>>>,
}

impl InMemoryAssetRegistry {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            next_ids: Arc::new(RwLock::new(HashMap::new())),
            operators: Arc::new(RwLock::new(HashSet::new())),
            receivers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mint the next item of a collection to `to`
    ///
    /// Ids start at 0 and increase by one per mint.
    pub async fn mint(&self, collection: &CollectionId, to: &AccountId) -> ItemKey {
        let mut items = self.items.write().await;
        let mut next_ids = self.next_ids.write().await;

        let next = next_ids.entry(collection.clone()).or_insert(ItemId(0));
        // Skip ids taken by explicit mints
        while items.contains_key(&ItemKey::new(collection.clone(), *next)) {
            *next = next.next();
        }
        let key = ItemKey::new(collection.clone(), *next);
        *next = next.next();

        items.insert(
            key.clone(),
            ItemRecord {
                owner: to.clone(),
                approved: None,
            },
        );
        debug!("Minted {} to {}", key, to);
        key
    }

    /// Mint an item with a caller-chosen id
    pub async fn mint_with_id(&self, key: &ItemKey, to: &AccountId) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(key) {
            return Err(RegistryError::ItemAlreadyExists {
                collection: key.collection.clone(),
                item: key.item,
            });
        }
        items.insert(
            key.clone(),
            ItemRecord {
                owner: to.clone(),
                approved: None,
            },
        );
        debug!("Minted {} to {}", key, to);
        Ok(())
    }

    /// Set (or clear, with `None`) the single approved account of an item
    ///
    /// Only the owner or one of the owner's collection operators may approve.
    pub async fn approve(
        &self,
        key: &ItemKey,
        caller: &AccountId,
        approved: Option<AccountId>,
    ) -> Result<()> {
        let mut items = self.items.write().await;
        let record = items.get_mut(key).ok_or_else(|| unknown_item(key))?;

        if &record.owner != caller {
            let operators = self.operators.read().await;
            let grant = (key.collection.clone(), record.owner.clone(), caller.clone());
            if !operators.contains(&grant) {
                return Err(RegistryError::NotItemOwner {
                    collection: key.collection.clone(),
                    item: key.item,
                    account: caller.clone(),
                });
            }
        }

        record.approved = approved;
        Ok(())
    }

    /// Grant or revoke `operator` over every item `owner` holds in a collection
    pub async fn set_approval_for_all(
        &self,
        collection: &CollectionId,
        owner: &AccountId,
        operator: &AccountId,
        approved: bool,
    ) {
        let grant = (collection.clone(), owner.clone(), operator.clone());
        let mut operators = self.operators.write().await;
        if approved {
            operators.insert(grant);
        } else {
            operators.remove(&grant);
        }
    }

    pub async fn get_approved(&self, key: &ItemKey) -> Result<Option<AccountId>> {
        let items = self.items.read().await;
        items
            .get(key)
            .map(|record| record.approved.clone())
            .ok_or_else(|| unknown_item(key))
    }

    pub async fn is_approved_for_all(
        &self,
        collection: &CollectionId,
        owner: &AccountId,
        operator: &AccountId,
    ) -> bool {
        let grant = (collection.clone(), owner.clone(), operator.clone());
        self.operators.read().await.contains(&grant)
    }

    /// Install a hook that runs whenever `account` receives an item
    pub async fn register_receiver(
        &self,
        account: &AccountId,
        receiver: Arc<dyn TransferReceiver>,
    ) {
        self.receivers.write().await.insert(account.clone(), receiver);
    }

    /// All items held by an account, sorted
    pub async fn items_owned_by(&self, account: &AccountId) -> Vec<ItemKey> {
        let items = self.items.read().await;
        let mut owned: Vec<ItemKey> = items
            .iter()
            .filter(|(_, record)| &record.owner == account)
            .map(|(key, _)| key.clone())
            .collect();
        owned.sort();
        owned
    }
}

impl Default for InMemoryAssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetRegistry for InMemoryAssetRegistry {
    async fn owner_of(&self, key: &ItemKey) -> Result<AccountId> {
        let items = self.items.read().await;
        items
            .get(key)
            .map(|record| record.owner.clone())
            .ok_or_else(|| unknown_item(key))
    }

    async fn is_approved_or_operator(&self, key: &ItemKey, operator: &AccountId) -> Result<bool> {
        let items = self.items.read().await;
        let record = items.get(key).ok_or_else(|| unknown_item(key))?;
        if record.approved.as_ref() == Some(operator) {
            return Ok(true);
        }
        let grant = (key.collection.clone(), record.owner.clone(), operator.clone());
        Ok(self.operators.read().await.contains(&grant))
    }

    async fn transfer(
        &self,
        key: &ItemKey,
        operator: &AccountId,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<()> {
        let previous = {
            let mut items = self.items.write().await;
            let record = items.get_mut(key).ok_or_else(|| unknown_item(key))?;

            if &record.owner != from {
                return Err(RegistryError::NotItemOwner {
                    collection: key.collection.clone(),
                    item: key.item,
                    account: from.clone(),
                });
            }

            let authorized = operator == from
                || record.approved.as_ref() == Some(operator)
                || self.operators.read().await.contains(&(
                    key.collection.clone(),
                    from.clone(),
                    operator.clone(),
                ));
            if !authorized {
                return Err(RegistryError::OperatorNotApproved {
                    collection: key.collection.clone(),
                    item: key.item,
                    operator: operator.clone(),
                });
            }

            let previous = record.clone();
            record.owner = to.clone();
            record.approved = None;
            previous
        };

        // The hook runs with no lock held; it may call back into us
        let receiver = self.receivers.read().await.get(to).cloned();
        if let Some(receiver) = receiver {
            if let Err(reason) = receiver.on_item_received(key, operator, from).await {
                self.items.write().await.insert(key.clone(), previous);
                warn!("Transfer of {} to {} rejected by recipient: {}", key, to, reason);
                return Err(RegistryError::RecipientRejected {
                    collection: key.collection.clone(),
                    item: key.item,
                    recipient: to.clone(),
                    reason,
                });
            }
        }

        debug!("Transferred {} from {} to {}", key, from, to);
        Ok(())
    }
}

fn unknown_item(key: &ItemKey) -> RegistryError {
    RegistryError::UnknownItem {
        collection: key.collection.clone(),
        item: key.item,
    }
}
