//! nftmarket Registry - The asset registry seen from the marketplace
//!
//! The registry is the owner-of-record for every item. The marketplace never
//! stores ownership; it queries the registry at the start of each action and
//! asks it to move the item when a sale completes.
//!
//! A transfer may run arbitrary code on the recipient side (see
//! [`TransferReceiver`]), which can call back into the marketplace.

use async_trait::async_trait;
use nftmarket_types::{AccountId, ItemKey, RegistryError};

pub mod memory;

pub use memory::*;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Ownership and approval authority for items
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Current owner of an item; fails if the item does not exist
    async fn owner_of(&self, key: &ItemKey) -> Result<AccountId>;

    /// Whether `operator` may transfer the item, either through the item's
    /// own approval or a collection-wide operator grant from its owner
    async fn is_approved_or_operator(&self, key: &ItemKey, operator: &AccountId) -> Result<bool>;

    /// Move an item from `from` to `to`, acting as `operator`
    async fn transfer(
        &self,
        key: &ItemKey,
        operator: &AccountId,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<()>;
}

/// Recipient-side hook invoked when an item arrives
#[async_trait]
pub trait TransferReceiver: Send + Sync {
    /// Returning an error rejects the item and undoes the transfer
    async fn on_item_received(
        &self,
        key: &ItemKey,
        operator: &AccountId,
        from: &AccountId,
    ) -> std::result::Result<(), String>;
}
