//! Listing record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, ItemKey};

/// An active sale offer for an item
///
/// Absence from the listing table means "not listed"; a stored listing
/// always carries a positive price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub price: Amount,
    pub seller: AccountId,
    pub listed_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn new(price: Amount, seller: AccountId) -> Self {
        Self {
            price,
            seller,
            listed_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Replace the price, keeping seller and listing time
    pub fn reprice(&mut self, price: Amount) {
        self.price = price;
        self.updated_at = Some(Utc::now());
    }
}

/// Outcome of a completed purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub key: ItemKey,
    pub seller: AccountId,
    pub buyer: AccountId,
    pub price: Amount,
    pub completed_at: DateTime<Utc>,
}
