//! Listing table
//!
//! Maps an item to its active sale offer. Absence means "not listed"; the
//! table refuses to store a zero price.

use std::collections::HashMap;

use nftmarket_types::{AccountId, Amount, ItemKey, Listing, MarketError, Result};

#[derive(Debug, Clone, Default)]
pub struct ListingBook {
    listings: HashMap<ItemKey, Listing>,
}

impl ListingBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&Listing> {
        self.listings.get(key)
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.listings.contains_key(key)
    }

    /// Create a listing for an unlisted item
    pub fn insert(&mut self, key: &ItemKey, listing: Listing) -> Result<()> {
        if !listing.price.is_positive() {
            return Err(MarketError::PriceMustBeAboveZero);
        }
        if self.listings.contains_key(key) {
            return Err(already_listed(key));
        }
        self.listings.insert(key.clone(), listing);
        Ok(())
    }

    /// Change the price of an existing listing
    pub fn reprice(&mut self, key: &ItemKey, price: Amount) -> Result<&Listing> {
        if !price.is_positive() {
            return Err(MarketError::PriceMustBeAboveZero);
        }
        let listing = self.listings.get_mut(key).ok_or_else(|| not_listed(key))?;
        listing.reprice(price);
        Ok(listing)
    }

    /// Put back a listing taken out by a sale that did not complete,
    /// returning whatever listing took its place in the meantime
    pub fn restore(&mut self, key: &ItemKey, listing: Listing) -> Option<Listing> {
        self.listings.insert(key.clone(), listing)
    }

    pub fn remove(&mut self, key: &ItemKey) -> Result<Listing> {
        self.listings.remove(key).ok_or_else(|| not_listed(key))
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Every active listing, sorted by item key
    pub fn active(&self) -> Vec<(ItemKey, Listing)> {
        let mut active: Vec<(ItemKey, Listing)> = self
            .listings
            .iter()
            .map(|(key, listing)| (key.clone(), listing.clone()))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }

    /// Active listings created by one seller, sorted by item key
    pub fn by_seller(&self, seller: &AccountId) -> Vec<(ItemKey, Listing)> {
        self.active()
            .into_iter()
            .filter(|(_, listing)| &listing.seller == seller)
            .collect()
    }
}

pub(crate) fn not_listed(key: &ItemKey) -> MarketError {
    MarketError::NotListed {
        collection: key.collection.clone(),
        item: key.item,
    }
}

pub(crate) fn already_listed(key: &ItemKey) -> MarketError {
    MarketError::AlreadyListed {
        collection: key.collection.clone(),
        item: key.item,
    }
}
