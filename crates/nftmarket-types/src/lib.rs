//! nftmarket Types - Canonical domain types for the item marketplace
//!
//! This crate has zero dependencies on other nftmarket crates. It defines:
//!
//! - Identity types (AccountId, CollectionId, ItemId, ItemKey)
//! - The `Amount` type used for prices and proceeds
//! - The `Listing` record
//! - Marketplace notifications (`MarketEvent`, `EventRecord`)
//! - The error taxonomy shared by the marketplace and its collaborators
//!
//! # Invariants
//!
//! 1. A listing is present iff its price is above zero
//! 2. Failure is explicit: every rejected action maps to a named error

pub mod identity;
pub mod amount;
pub mod listing;
pub mod event;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use listing::*;
pub use event::*;
pub use error::*;
