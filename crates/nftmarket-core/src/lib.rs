//! nftmarket Core - The marketplace engine
//!
//! - Listing registry: active sale offers keyed by (collection, item)
//! - Proceeds: sale revenue credited to sellers and withdrawn on demand
//! - Authorization: every action is validated against the asset registry
//! - Notifications: listed / canceled / bought, broadcast and logged
//!
//! # Ordering
//!
//! Actions that call out to a collaborator (the item transfer in `buy`, the
//! payout in `withdraw`) commit their local effects first and hold no lock
//! during the call, so a collaborator that re-enters the marketplace observes
//! the committed state.

pub use nftmarket_types::{
    AccountId, Amount, CollectionId, EventRecord, ItemId, ItemKey, Listing, MarketError,
    MarketEvent, ParseAmountError, Purchase, Result, STANDARD_DECIMALS,
};

pub mod config;
pub mod listings;
pub mod payout;
pub mod marketplace;

pub use config::*;
pub use listings::*;
pub use payout::*;
pub use marketplace::*;
