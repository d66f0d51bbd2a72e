//! Error types for nftmarket
//!
//! Every rejection is a synchronous, caller-visible error. Nothing is
//! retried or swallowed inside the marketplace.

use thiserror::Error;

use crate::{AccountId, Amount, CollectionId, ItemId};

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Marketplace errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// Caller is not the current owner of the item
    #[error("{caller} is not the owner of {collection}#{item}")]
    NotOwner {
        collection: CollectionId,
        item: ItemId,
        caller: AccountId,
    },

    /// The marketplace cannot move the item on the owner's behalf
    #[error("Marketplace is not approved to transfer {collection}#{item}")]
    NotApprovedForMarketplace { collection: CollectionId, item: ItemId },

    #[error("{collection}#{item} is already listed")]
    AlreadyListed { collection: CollectionId, item: ItemId },

    #[error("{collection}#{item} is not listed")]
    NotListed { collection: CollectionId, item: ItemId },

    #[error("Price must be above zero")]
    PriceMustBeAboveZero,

    /// Payment must equal the listing price exactly
    #[error("Price not met for {collection}#{item}: expected {expected}, paid {paid}")]
    PriceNotMet {
        collection: CollectionId,
        item: ItemId,
        expected: Amount,
        paid: Amount,
    },

    #[error("No proceeds to withdraw for {account}")]
    NoProceeds { account: AccountId },

    /// The external ownership move or payout did not complete
    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },

    #[error("Proceeds balance overflow for {account}")]
    ProceedsOverflow { account: AccountId },

    /// A credit could not be taken back because the balance no longer holds it
    #[error("Insufficient proceeds for {account}: have {available}, need {required}")]
    InsufficientProceeds {
        account: AccountId,
        available: Amount,
        required: Amount,
    },

    /// An asset registry query failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors reported by an asset registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Item {collection}#{item} does not exist")]
    UnknownItem { collection: CollectionId, item: ItemId },

    #[error("Item {collection}#{item} already exists")]
    ItemAlreadyExists { collection: CollectionId, item: ItemId },

    #[error("{account} does not own {collection}#{item}")]
    NotItemOwner {
        collection: CollectionId,
        item: ItemId,
        account: AccountId,
    },

    #[error("{operator} is not approved to transfer {collection}#{item}")]
    OperatorNotApproved {
        collection: CollectionId,
        item: ItemId,
        operator: AccountId,
    },

    #[error("{recipient} rejected {collection}#{item}: {reason}")]
    RecipientRejected {
        collection: CollectionId,
        item: ItemId,
        recipient: AccountId,
        reason: String,
    },
}

/// Errors reported by a payout rail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    #[error("Payout of {amount} to {to} rejected: {reason}")]
    Rejected {
        to: AccountId,
        amount: Amount,
        reason: String,
    },
}
