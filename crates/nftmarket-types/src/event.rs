//! Marketplace notifications
//!
//! Notifications are the durable external signal of state change. A price
//! update is reported with the same `ItemListed` shape as a fresh listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, CollectionId, ItemId, ItemKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    /// An item was listed or repriced
    ItemListed {
        seller: AccountId,
        collection: CollectionId,
        item: ItemId,
        price: Amount,
    },
    /// A listing was withdrawn by the item owner
    ItemCanceled {
        seller: AccountId,
        collection: CollectionId,
        item: ItemId,
    },
    /// A listing was bought
    ItemBought {
        buyer: AccountId,
        collection: CollectionId,
        item: ItemId,
        price: Amount,
    },
}

impl MarketEvent {
    pub fn listed(seller: &AccountId, key: &ItemKey, price: Amount) -> Self {
        Self::ItemListed {
            seller: seller.clone(),
            collection: key.collection.clone(),
            item: key.item,
            price,
        }
    }

    pub fn canceled(seller: &AccountId, key: &ItemKey) -> Self {
        Self::ItemCanceled {
            seller: seller.clone(),
            collection: key.collection.clone(),
            item: key.item,
        }
    }

    pub fn bought(buyer: &AccountId, key: &ItemKey, price: Amount) -> Self {
        Self::ItemBought {
            buyer: buyer.clone(),
            collection: key.collection.clone(),
            item: key.item,
            price,
        }
    }

    /// The item this notification is about
    pub fn key(&self) -> ItemKey {
        match self {
            Self::ItemListed { collection, item, .. }
            | Self::ItemCanceled { collection, item, .. }
            | Self::ItemBought { collection, item, .. } => ItemKey {
                collection: collection.clone(),
                item: *item,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemListed { .. } => "ItemListed",
            Self::ItemCanceled { .. } => "ItemCanceled",
            Self::ItemBought { .. } => "ItemBought",
        }
    }
}

/// A notification as emitted, with its position in the marketplace log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: MarketEvent,
    pub emitted_at: DateTime<Utc>,
}
