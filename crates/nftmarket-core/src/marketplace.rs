//! The marketplace engine
//!
//! Owns the listing table and the proceeds ledger, validates every action
//! against the asset registry, and emits notifications for committed
//! actions.
//!
//! # Check order
//!
//! - list:   owner, not yet listed, price, marketplace approval
//! - update: listed, owner, price
//! - cancel: listed, owner
//! - buy:    listed, exact payment
//!
//! # External calls
//!
//! `buy` credits the seller and removes the listing before asking the
//! registry to move the item; `withdraw` debits the balance before paying
//! out. If the external call fails, the local effects are compensated and
//! the caller gets `TransferFailed`.
//!
//! The sale credit stays held until the transfer returns, so a withdrawal
//! made from inside the transfer cannot pay out money the sale may still
//! have to give back.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use nftmarket_ledger::{EntryReason, ProceedsEntry, ProceedsLedger};
use nftmarket_registry::AssetRegistry;
use nftmarket_types::{
    AccountId, Amount, EventRecord, ItemKey, Listing, MarketError, MarketEvent, Purchase, Result,
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::MarketConfig;
use crate::listings::{not_listed, ListingBook};
use crate::payout::PayoutRail;

/// Tables exclusively owned by the marketplace
#[derive(Debug)]
struct MarketState {
    listings: ListingBook,
    proceeds: ProceedsLedger,
}

#[derive(Debug, Default)]
struct EventLog {
    records: VecDeque<EventRecord>,
    next_sequence: u64,
}

/// The marketplace
///
/// Cheap to clone; clones share state. Collaborators are injected so tests
/// can substitute doubles for the registry and the payout rail.
#[derive(Clone)]
pub struct Marketplace {
    config: MarketConfig,
    state: Arc<RwLock<MarketState>>,
    registry: Arc<dyn AssetRegistry>,
    payouts: Arc<dyn PayoutRail>,
    event_log: Arc<RwLock<EventLog>>,
    event_sender: broadcast::Sender<EventRecord>,
}

impl Marketplace {
    pub fn new(
        config: MarketConfig,
        registry: Arc<dyn AssetRegistry>,
        payouts: Arc<dyn PayoutRail>,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let state = MarketState {
            listings: ListingBook::new(),
            proceeds: ProceedsLedger::with_entry_limit(config.ledger_entry_limit),
        };
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
            registry,
            payouts,
            event_log: Arc::new(RwLock::new(EventLog::default())),
            event_sender,
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// The account owners must approve before listing
    pub fn market_account(&self) -> &AccountId {
        &self.config.market_account
    }

    // ========================================================================
    // Listing registry
    // ========================================================================

    /// List an item the caller owns
    pub async fn list_item(
        &self,
        key: &ItemKey,
        price: Amount,
        caller: &AccountId,
    ) -> Result<Listing> {
        self.try_list(key, price, caller).await.inspect_err(|err| {
            debug!(action = "list", item = %key, caller = %caller, error = %err, "Rejected")
        })
    }

    async fn try_list(
        &self,
        key: &ItemKey,
        price: Amount,
        caller: &AccountId,
    ) -> Result<Listing> {
        self.ensure_owner(key, caller).await?;

        if self.state.read().await.listings.contains(key) {
            return Err(MarketError::AlreadyListed {
                collection: key.collection.clone(),
                item: key.item,
            });
        }

        if !price.is_positive() {
            return Err(MarketError::PriceMustBeAboveZero);
        }

        // Without approval the sale could never be completed
        if !self
            .registry
            .is_approved_or_operator(key, &self.config.market_account)
            .await?
        {
            return Err(MarketError::NotApprovedForMarketplace {
                collection: key.collection.clone(),
                item: key.item,
            });
        }

        let listing = Listing::new(price, caller.clone());
        self.state.write().await.listings.insert(key, listing.clone())?;

        info!("Listed {} by {} at {}", key, caller, price);
        self.emit(MarketEvent::listed(caller, key, price)).await;
        Ok(listing)
    }

    /// Change the price of an active listing
    pub async fn update_listing(
        &self,
        key: &ItemKey,
        new_price: Amount,
        caller: &AccountId,
    ) -> Result<Listing> {
        self.try_update(key, new_price, caller).await.inspect_err(|err| {
            debug!(action = "update", item = %key, caller = %caller, error = %err, "Rejected")
        })
    }

    async fn try_update(
        &self,
        key: &ItemKey,
        new_price: Amount,
        caller: &AccountId,
    ) -> Result<Listing> {
        self.ensure_listed(key).await?;
        self.ensure_owner(key, caller).await?;

        if !new_price.is_positive() {
            return Err(MarketError::PriceMustBeAboveZero);
        }

        let listing = self
            .state
            .write()
            .await
            .listings
            .reprice(key, new_price)?
            .clone();

        info!("Repriced {} to {}", key, new_price);
        self.emit(MarketEvent::listed(caller, key, new_price)).await;
        Ok(listing)
    }

    /// Withdraw an active listing; returns the removed listing
    pub async fn cancel_listing(&self, key: &ItemKey, caller: &AccountId) -> Result<Listing> {
        self.try_cancel(key, caller).await.inspect_err(|err| {
            debug!(action = "cancel", item = %key, caller = %caller, error = %err, "Rejected")
        })
    }

    async fn try_cancel(&self, key: &ItemKey, caller: &AccountId) -> Result<Listing> {
        self.ensure_listed(key).await?;
        self.ensure_owner(key, caller).await?;

        let listing = self.state.write().await.listings.remove(key)?;

        info!("Canceled listing of {}", key);
        self.emit(MarketEvent::canceled(caller, key)).await;
        Ok(listing)
    }

    /// Buy a listed item by paying exactly its price
    pub async fn buy_item(
        &self,
        key: &ItemKey,
        buyer: &AccountId,
        paid: Amount,
    ) -> Result<Purchase> {
        self.try_buy(key, buyer, paid).await.inspect_err(|err| {
            debug!(action = "buy", item = %key, buyer = %buyer, error = %err, "Rejected")
        })
    }

    async fn try_buy(
        &self,
        key: &ItemKey,
        buyer: &AccountId,
        paid: Amount,
    ) -> Result<Purchase> {
        let listing = {
            let mut state = self.state.write().await;
            let listing = state
                .listings
                .get(key)
                .cloned()
                .ok_or_else(|| not_listed(key))?;

            if paid != listing.price {
                return Err(MarketError::PriceNotMet {
                    collection: key.collection.clone(),
                    item: key.item,
                    expected: listing.price,
                    paid,
                });
            }

            state.proceeds.credit_held(
                &listing.seller,
                paid,
                EntryReason::Sale {
                    item: key.clone(),
                    buyer: buyer.clone(),
                },
            )?;
            state.listings.remove(key)?;
            listing
        };

        // Effects are committed; the registry may now run recipient code
        if let Err(err) = self
            .registry
            .transfer(key, &self.config.market_account, &listing.seller, buyer)
            .await
        {
            warn!("Transfer of {} to {} failed, reverting sale: {}", key, buyer, err);
            self.revert_sale(key, listing).await;
            return Err(MarketError::TransferFailed {
                reason: err.to_string(),
            });
        }

        self.state.write().await.proceeds.settle(&listing.seller, paid);

        info!("Sold {} from {} to {} for {}", key, listing.seller, buyer, paid);
        self.emit(MarketEvent::bought(buyer, key, paid)).await;

        Ok(Purchase {
            key: key.clone(),
            seller: listing.seller,
            buyer: buyer.clone(),
            price: paid,
            completed_at: Utc::now(),
        })
    }

    async fn revert_sale(&self, key: &ItemKey, listing: Listing) {
        let mut state = self.state.write().await;

        if let Err(err) = state.proceeds.reverse_credit(
            &listing.seller,
            listing.price,
            EntryReason::SaleReverted { item: key.clone() },
        ) {
            error!(
                item = %key,
                seller = %listing.seller,
                error = %err,
                "Sale proceeds could not be reversed"
            );
        }

        // Ownership went back to the seller, so their listing wins
        if let Some(displaced) = state.listings.restore(key, listing) {
            warn!(
                item = %key,
                seller = %displaced.seller,
                "Dropped listing created while the sale was in flight"
            );
        }
    }

    /// Active listing for an item, if any
    pub async fn get_listing(&self, key: &ItemKey) -> Option<Listing> {
        self.state.read().await.listings.get(key).cloned()
    }

    /// Every active listing, sorted by item
    pub async fn active_listings(&self) -> Vec<(ItemKey, Listing)> {
        self.state.read().await.listings.active()
    }

    pub async fn listings_by_seller(
        &self,
        seller: &AccountId,
    ) -> Vec<(ItemKey, Listing)> {
        self.state.read().await.listings.by_seller(seller)
    }

    // ========================================================================
    // Proceeds
    // ========================================================================

    /// Pay out the caller's settled proceeds
    ///
    /// Proceeds of a sale whose item transfer is still running are not
    /// included.
    pub async fn withdraw_proceeds(&self, caller: &AccountId) -> Result<Amount> {
        self.try_withdraw(caller).await.inspect_err(|err| {
            debug!(action = "withdraw", caller = %caller, error = %err, "Rejected")
        })
    }

    async fn try_withdraw(&self, caller: &AccountId) -> Result<Amount> {
        let amount = self.state.write().await.proceeds.withdraw(caller)?;

        // Balance is already debited; a re-entrant withdraw finds nothing
        if let Err(err) = self.payouts.pay(caller, amount).await {
            warn!("Payout of {} to {} failed, restoring balance: {}", amount, caller, err);
            let mut state = self.state.write().await;
            if let Err(restore_err) = state
                .proceeds
                .credit(caller, amount, EntryReason::PayoutReverted)
            {
                error!(account = %caller, error = %restore_err, "Proceeds could not be restored");
            }
            return Err(MarketError::TransferFailed {
                reason: err.to_string(),
            });
        }

        info!("Withdrew {} for {}", amount, caller);
        Ok(amount)
    }

    /// Proceeds credited to an account, including a sale still completing
    pub async fn get_proceeds(&self, account: &AccountId) -> Amount {
        self.state.read().await.proceeds.balance(account)
    }

    /// Ledger history of an account, oldest first
    pub async fn proceeds_entries(&self, account: &AccountId) -> Vec<ProceedsEntry> {
        self.state.read().await.proceeds.account_entries(account)
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Receive notifications emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.event_sender.subscribe()
    }

    /// Retained notifications, oldest first
    pub async fn events(&self) -> Vec<EventRecord> {
        self.event_log.read().await.records.iter().cloned().collect()
    }

    /// Recent notifications (newest first)
    pub async fn recent_events(&self, limit: usize) -> Vec<EventRecord> {
        let log = self.event_log.read().await;
        log.records.iter().rev().take(limit).cloned().collect()
    }

    async fn emit(&self, event: MarketEvent) -> EventRecord {
        let mut log = self.event_log.write().await;
        let record = EventRecord {
            sequence: log.next_sequence,
            event,
            emitted_at: Utc::now(),
        };
        log.next_sequence += 1;
        log.records.push_back(record.clone());

        let limit = self.config.event_log_limit;
        while limit > 0 && log.records.len() > limit {
            log.records.pop_front();
        }

        // No subscribers is fine
        let _ = self.event_sender.send(record.clone());
        record
    }

    // ========================================================================
    // Checks
    // ========================================================================

    async fn ensure_listed(&self, key: &ItemKey) -> Result<()> {
        if self.state.read().await.listings.contains(key) {
            Ok(())
        } else {
            Err(not_listed(key))
        }
    }

    async fn ensure_owner(&self, key: &ItemKey, caller: &AccountId) -> Result<()> {
        let owner = self.registry.owner_of(key).await?;
        if &owner != caller {
            return Err(MarketError::NotOwner {
                collection: key.collection.clone(),
                item: key.item,
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}
