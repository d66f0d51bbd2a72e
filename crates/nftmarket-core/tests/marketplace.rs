use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use nftmarket_core::{
    AccountId, Amount, CollectionId, InMemoryPayoutRail, ItemKey, MarketConfig, MarketError,
    MarketEvent, Marketplace, PayoutReceiver, Purchase,
};
use nftmarket_registry::{AssetRegistry, InMemoryAssetRegistry, TransferReceiver};

const PRICE: Amount = Amount(100_000_000_000_000_000);
const UPDATED_PRICE: Amount = Amount(200_000_000_000_000_000);

struct Harness {
    market: Marketplace,
    registry: InMemoryAssetRegistry,
    payouts: InMemoryPayoutRail,
    seller: AccountId,
    buyer: AccountId,
    key: ItemKey,
}

/// Seller owns item 0 of "basic-nft" and has approved the marketplace for it
async fn harness() -> Harness {
    let registry = InMemoryAssetRegistry::new();
    let payouts = InMemoryPayoutRail::new();
    let market = Marketplace::new(
        MarketConfig::default(),
        Arc::new(registry.clone()),
        Arc::new(payouts.clone()),
    );
    let seller = AccountId::new("deployer");
    let buyer = AccountId::new("player");

    let key = registry.mint(&CollectionId::new("basic-nft"), &seller).await;
    registry
        .approve(&key, &seller, Some(market.market_account().clone()))
        .await
        .unwrap();

    Harness {
        market,
        registry,
        payouts,
        seller,
        buyer,
        key,
    }
}

fn event_names(events: &[nftmarket_core::EventRecord]) -> Vec<&'static str> {
    events.iter().map(|r| r.event.name()).collect()
}

// ============================================================================
// list
// ============================================================================

#[tokio::test]
async fn test_list_emits_item_listed() {
    let h = harness().await;

    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let events = h.market.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, MarketEvent::listed(&h.seller, &h.key, PRICE));
}

#[tokio::test]
async fn test_list_stores_seller_and_price() {
    let h = harness().await;

    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let listing = h.market.get_listing(&h.key).await.unwrap();
    assert_eq!(listing.price, PRICE);
    assert_eq!(listing.seller, h.seller);
}

#[tokio::test]
async fn test_only_owner_can_list() {
    let h = harness().await;
    // Item-level approval for the player does not make them the owner
    h.registry
        .approve(&h.key, &h.seller, Some(h.buyer.clone()))
        .await
        .unwrap();

    let result = h.market.list_item(&h.key, PRICE, &h.buyer).await;

    assert!(matches!(result, Err(MarketError::NotOwner { .. })));
    assert!(h.market.get_listing(&h.key).await.is_none());
    assert!(h.market.events().await.is_empty());
}

#[tokio::test]
async fn test_list_twice_is_rejected() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let result = h.market.list_item(&h.key, UPDATED_PRICE, &h.seller).await;

    assert!(matches!(result, Err(MarketError::AlreadyListed { .. })));
    assert_eq!(h.market.get_listing(&h.key).await.unwrap().price, PRICE);
}

#[tokio::test]
async fn test_not_owner_takes_precedence_over_already_listed() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let result = h.market.list_item(&h.key, PRICE, &h.buyer).await;

    assert!(matches!(result, Err(MarketError::NotOwner { .. })));
}

#[tokio::test]
async fn test_list_requires_marketplace_approval() {
    let h = harness().await;
    h.registry.approve(&h.key, &h.seller, None).await.unwrap();

    let result = h.market.list_item(&h.key, PRICE, &h.seller).await;

    assert!(matches!(
        result,
        Err(MarketError::NotApprovedForMarketplace { .. })
    ));
    assert!(h.market.get_listing(&h.key).await.is_none());
}

#[tokio::test]
async fn test_collection_operator_approval_is_enough() {
    let h = harness().await;
    h.registry.approve(&h.key, &h.seller, None).await.unwrap();
    h.registry
        .set_approval_for_all(
            &h.key.collection,
            &h.seller,
            h.market.market_account(),
            true,
        )
        .await;

    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    assert!(h.market.get_listing(&h.key).await.is_some());
}

#[tokio::test]
async fn test_zero_price_is_rejected() {
    let h = harness().await;

    let result = h.market.list_item(&h.key, Amount::zero(), &h.seller).await;

    assert_eq!(result.unwrap_err(), MarketError::PriceMustBeAboveZero);
    assert!(h.market.get_listing(&h.key).await.is_none());
    assert!(h.market.active_listings().await.is_empty());
}

// ============================================================================
// buy
// ============================================================================

#[tokio::test]
async fn test_buy_unlisted_item() {
    let h = harness().await;

    let result = h.market.buy_item(&h.key, &h.buyer, PRICE).await;

    assert!(matches!(result, Err(MarketError::NotListed { .. })));
}

#[tokio::test]
async fn test_buy_requires_exact_price() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    for paid in [Amount::zero(), Amount(PRICE.0 - 1), Amount(PRICE.0 + 1), UPDATED_PRICE] {
        let result = h.market.buy_item(&h.key, &h.buyer, paid).await;
        match result {
            Err(MarketError::PriceNotMet { expected, paid: reported, .. }) => {
                assert_eq!(expected, PRICE);
                assert_eq!(reported, paid);
            }
            other => panic!("expected PriceNotMet for {}, got {:?}", paid, other),
        }
    }

    assert_eq!(h.market.get_listing(&h.key).await.unwrap().price, PRICE);
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.seller);
}

#[tokio::test]
async fn test_buy_transfers_item_and_credits_proceeds() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let purchase: Purchase = h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();

    assert_eq!(purchase.seller, h.seller);
    assert_eq!(purchase.buyer, h.buyer);
    assert_eq!(purchase.price, PRICE);
    assert!(h.market.get_listing(&h.key).await.is_none());
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.buyer);
    assert_eq!(h.market.get_proceeds(&h.seller).await, PRICE);

    let events = h.market.events().await;
    assert_eq!(event_names(&events), vec!["ItemListed", "ItemBought"]);
    assert_eq!(events[1].event, MarketEvent::bought(&h.buyer, &h.key, PRICE));
}

#[tokio::test]
async fn test_buyer_can_relist_after_purchase() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();

    // The sale cleared the item approval; the new owner grants it again
    h.registry
        .approve(&h.key, &h.buyer, Some(h.market.market_account().clone()))
        .await
        .unwrap();
    h.market
        .list_item(&h.key, UPDATED_PRICE, &h.buyer)
        .await
        .unwrap();

    let listing = h.market.get_listing(&h.key).await.unwrap();
    assert_eq!(listing.seller, h.buyer);
    assert_eq!(listing.price, UPDATED_PRICE);
}

// ============================================================================
// cancel
// ============================================================================

#[tokio::test]
async fn test_cancel_unlisted_item() {
    let h = harness().await;

    let result = h.market.cancel_listing(&h.key, &h.seller).await;

    assert!(matches!(result, Err(MarketError::NotListed { .. })));
}

#[tokio::test]
async fn test_not_listed_takes_precedence_over_not_owner_on_cancel() {
    let h = harness().await;

    let result = h.market.cancel_listing(&h.key, &h.buyer).await;

    assert!(matches!(result, Err(MarketError::NotListed { .. })));
}

#[tokio::test]
async fn test_only_owner_can_cancel() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.registry
        .approve(&h.key, &h.seller, Some(h.buyer.clone()))
        .await
        .unwrap();

    let result = h.market.cancel_listing(&h.key, &h.buyer).await;

    assert!(matches!(result, Err(MarketError::NotOwner { .. })));
    assert!(h.market.get_listing(&h.key).await.is_some());
}

#[tokio::test]
async fn test_cancel_removes_listing_and_emits() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let removed = h.market.cancel_listing(&h.key, &h.seller).await.unwrap();

    assert_eq!(removed.price, PRICE);
    assert!(h.market.get_listing(&h.key).await.is_none());
    let events = h.market.events().await;
    assert_eq!(events[1].event, MarketEvent::canceled(&h.seller, &h.key));

    // Canceled items can no longer be bought
    let result = h.market.buy_item(&h.key, &h.buyer, PRICE).await;
    assert!(matches!(result, Err(MarketError::NotListed { .. })));
}

// ============================================================================
// update
// ============================================================================

#[tokio::test]
async fn test_update_must_be_listed_then_owner() {
    let h = harness().await;

    let result = h.market.update_listing(&h.key, PRICE, &h.buyer).await;
    assert!(matches!(result, Err(MarketError::NotListed { .. })));

    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let result = h.market.update_listing(&h.key, PRICE, &h.buyer).await;
    assert!(matches!(result, Err(MarketError::NotOwner { .. })));
}

#[tokio::test]
async fn test_update_changes_price_only() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    h.market
        .update_listing(&h.key, UPDATED_PRICE, &h.seller)
        .await
        .unwrap();

    let listing = h.market.get_listing(&h.key).await.unwrap();
    assert_eq!(listing.price, UPDATED_PRICE);
    assert_eq!(listing.seller, h.seller);
    assert!(listing.updated_at.is_some());
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.seller);

    let events = h.market.events().await;
    assert_eq!(
        events[1].event,
        MarketEvent::listed(&h.seller, &h.key, UPDATED_PRICE)
    );
}

#[tokio::test]
async fn test_update_to_zero_is_rejected() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let result = h.market.update_listing(&h.key, Amount::zero(), &h.seller).await;

    assert_eq!(result.unwrap_err(), MarketError::PriceMustBeAboveZero);
    assert_eq!(h.market.get_listing(&h.key).await.unwrap().price, PRICE);
}

#[tokio::test]
async fn test_old_price_no_longer_buys_after_update() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market
        .update_listing(&h.key, UPDATED_PRICE, &h.seller)
        .await
        .unwrap();

    let result = h.market.buy_item(&h.key, &h.buyer, PRICE).await;
    assert!(matches!(result, Err(MarketError::PriceNotMet { .. })));

    h.market
        .buy_item(&h.key, &h.buyer, UPDATED_PRICE)
        .await
        .unwrap();
    assert_eq!(h.market.get_proceeds(&h.seller).await, UPDATED_PRICE);
}

// ============================================================================
// withdraw
// ============================================================================

#[tokio::test]
async fn test_withdraw_without_proceeds() {
    let h = harness().await;

    let result = h.market.withdraw_proceeds(&h.seller).await;

    assert!(matches!(result, Err(MarketError::NoProceeds { .. })));
}

#[tokio::test]
async fn test_sale_then_withdraw() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();
    assert_eq!(h.market.get_proceeds(&h.seller).await, PRICE);

    let withdrawn = h.market.withdraw_proceeds(&h.seller).await.unwrap();

    assert_eq!(withdrawn, PRICE);
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
    assert_eq!(h.payouts.paid_to(&h.seller).await, PRICE);

    let second = h.market.withdraw_proceeds(&h.seller).await;
    assert!(matches!(second, Err(MarketError::NoProceeds { .. })));
    assert_eq!(h.payouts.paid_to(&h.seller).await, PRICE);
}

#[tokio::test]
async fn test_proceeds_accumulate_across_sales() {
    let h = harness().await;
    let second = h
        .registry
        .mint(&CollectionId::new("basic-nft"), &h.seller)
        .await;
    h.registry
        .set_approval_for_all(
            &second.collection,
            &h.seller,
            h.market.market_account(),
            true,
        )
        .await;

    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market
        .list_item(&second, UPDATED_PRICE, &h.seller)
        .await
        .unwrap();
    assert_eq!(h.market.listings_by_seller(&h.seller).await.len(), 2);

    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();
    h.market
        .buy_item(&second, &h.buyer, UPDATED_PRICE)
        .await
        .unwrap();

    assert_eq!(
        h.market.get_proceeds(&h.seller).await,
        Amount(PRICE.0 + UPDATED_PRICE.0)
    );
    assert_eq!(h.market.proceeds_entries(&h.seller).await.len(), 2);
    assert!(h.market.active_listings().await.is_empty());
}

// ============================================================================
// Collaborator failures
// ============================================================================

#[tokio::test]
async fn test_failed_transfer_reverts_sale() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    // Approval withdrawn after listing: the registry will refuse the move
    h.registry.approve(&h.key, &h.seller, None).await.unwrap();

    let result = h.market.buy_item(&h.key, &h.buyer, PRICE).await;

    assert!(matches!(result, Err(MarketError::TransferFailed { .. })));
    assert_eq!(h.market.get_listing(&h.key).await.unwrap().price, PRICE);
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.seller);
    assert_eq!(event_names(&h.market.events().await), vec!["ItemListed"]);
}

struct RefusesItems;

#[async_trait]
impl TransferReceiver for RefusesItems {
    async fn on_item_received(
        &self,
        _key: &ItemKey,
        _operator: &AccountId,
        _from: &AccountId,
    ) -> Result<(), String> {
        Err("cannot hold items".to_string())
    }
}

#[tokio::test]
async fn test_recipient_refusal_reverts_sale() {
    let h = harness().await;
    h.registry
        .register_receiver(&h.buyer, Arc::new(RefusesItems))
        .await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let result = h.market.buy_item(&h.key, &h.buyer, PRICE).await;

    match result {
        Err(MarketError::TransferFailed { reason }) => {
            assert!(reason.contains("cannot hold items"))
        }
        other => panic!("expected TransferFailed, got {:?}", other),
    }
    assert!(h.market.get_listing(&h.key).await.is_some());
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.seller);
    // The ledger keeps the credit and its reversal
    assert_eq!(h.market.proceeds_entries(&h.seller).await.len(), 2);
}

#[tokio::test]
async fn test_seller_gave_item_away_after_listing() {
    let h = harness().await;
    let other = AccountId::new("other");
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.registry
        .transfer(&h.key, &h.seller, &h.seller, &other)
        .await
        .unwrap();

    let result = h.market.buy_item(&h.key, &h.buyer, PRICE).await;

    assert!(matches!(result, Err(MarketError::TransferFailed { .. })));
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), other);
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());

    // The stale listing can still be canceled, but only by the current owner
    let result = h.market.cancel_listing(&h.key, &h.seller).await;
    assert!(matches!(result, Err(MarketError::NotOwner { .. })));
    h.market.cancel_listing(&h.key, &other).await.unwrap();
}

#[tokio::test]
async fn test_failed_payout_restores_balance() {
    let h = harness().await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();
    h.payouts.reject(&h.seller).await;

    let result = h.market.withdraw_proceeds(&h.seller).await;

    assert!(matches!(result, Err(MarketError::TransferFailed { .. })));
    assert_eq!(h.market.get_proceeds(&h.seller).await, PRICE);

    h.payouts.accept(&h.seller).await;
    assert_eq!(h.market.withdraw_proceeds(&h.seller).await.unwrap(), PRICE);
}

// ============================================================================
// Re-entrancy
// ============================================================================

/// On receiving the item, tries to buy it again and records what it saw
struct ReentrantBuyer {
    market: Marketplace,
    buyer: AccountId,
    observed: Mutex<Option<(Result<Purchase, MarketError>, Amount)>>,
}

#[async_trait]
impl TransferReceiver for ReentrantBuyer {
    async fn on_item_received(
        &self,
        key: &ItemKey,
        _operator: &AccountId,
        from: &AccountId,
    ) -> Result<(), String> {
        let again = self.market.buy_item(key, &self.buyer, PRICE).await;
        let proceeds = self.market.get_proceeds(from).await;
        *self.observed.lock().await = Some((again, proceeds));
        Ok(())
    }
}

#[tokio::test]
async fn test_reentrant_buy_sees_committed_sale() {
    let h = harness().await;
    let receiver = Arc::new(ReentrantBuyer {
        market: h.market.clone(),
        buyer: h.buyer.clone(),
        observed: Mutex::new(None),
    });
    h.registry
        .register_receiver(&h.buyer, receiver.clone())
        .await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();

    let observed = receiver.observed.lock().await.take().unwrap();
    assert!(matches!(observed.0, Err(MarketError::NotListed { .. })));
    assert_eq!(observed.1, PRICE);
    assert_eq!(h.market.get_proceeds(&h.seller).await, PRICE);
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.buyer);
}

/// On being paid, tries to withdraw again
struct ReentrantSeller {
    market: Marketplace,
    seller: AccountId,
    second: Mutex<Option<Result<Amount, MarketError>>>,
}

#[async_trait]
impl PayoutReceiver for ReentrantSeller {
    async fn on_payment(&self, _amount: Amount) -> Result<(), String> {
        let second = self.market.withdraw_proceeds(&self.seller).await;
        *self.second.lock().await = Some(second);
        Ok(())
    }
}

#[tokio::test]
async fn test_reentrant_withdraw_finds_nothing() {
    let h = harness().await;
    let receiver = Arc::new(ReentrantSeller {
        market: h.market.clone(),
        seller: h.seller.clone(),
        second: Mutex::new(None),
    });
    h.payouts
        .register_receiver(&h.seller, receiver.clone())
        .await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();

    let withdrawn = h.market.withdraw_proceeds(&h.seller).await.unwrap();

    assert_eq!(withdrawn, PRICE);
    let second = receiver.second.lock().await.take().unwrap();
    assert!(matches!(second, Err(MarketError::NoProceeds { .. })));
    assert_eq!(h.payouts.paid_to(&h.seller).await, PRICE);
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
}

/// Withdraws the receiving account's proceeds, then refuses the item
struct WithdrawThenRefuse {
    market: Marketplace,
    account: AccountId,
    withdrawn: Mutex<Option<Result<Amount, MarketError>>>,
}

#[async_trait]
impl TransferReceiver for WithdrawThenRefuse {
    async fn on_item_received(
        &self,
        _key: &ItemKey,
        _operator: &AccountId,
        _from: &AccountId,
    ) -> Result<(), String> {
        let withdrawn = self.market.withdraw_proceeds(&self.account).await;
        *self.withdrawn.lock().await = Some(withdrawn);
        Err("changed my mind".to_string())
    }
}

#[tokio::test]
async fn test_proceeds_of_an_unfinished_sale_cannot_be_withdrawn() {
    let h = harness().await;
    let receiver = Arc::new(WithdrawThenRefuse {
        market: h.market.clone(),
        account: h.seller.clone(),
        withdrawn: Mutex::new(None),
    });
    h.registry
        .register_receiver(&h.seller, receiver.clone())
        .await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    // Seller buys their own item; the hook runs on the seller's side
    let result = h.market.buy_item(&h.key, &h.seller, PRICE).await;

    assert!(matches!(result, Err(MarketError::TransferFailed { .. })));
    let withdrawn = receiver.withdrawn.lock().await.take().unwrap();
    assert!(matches!(withdrawn, Err(MarketError::NoProceeds { .. })));
    assert_eq!(h.payouts.paid_to(&h.seller).await, Amount::zero());
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
    assert_eq!(h.market.get_listing(&h.key).await.unwrap().price, PRICE);
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.seller);
}

#[tokio::test]
async fn test_settled_proceeds_stay_withdrawable_during_a_sale() {
    let h = harness().await;
    let second = h
        .registry
        .mint(&CollectionId::new("basic-nft"), &h.seller)
        .await;
    h.registry
        .set_approval_for_all(
            &second.collection,
            &h.seller,
            h.market.market_account(),
            true,
        )
        .await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap();

    let receiver = Arc::new(WithdrawThenRefuse {
        market: h.market.clone(),
        account: h.seller.clone(),
        withdrawn: Mutex::new(None),
    });
    h.registry
        .register_receiver(&h.seller, receiver.clone())
        .await;
    h.market
        .list_item(&second, UPDATED_PRICE, &h.seller)
        .await
        .unwrap();

    let result = h
        .market
        .buy_item(&second, &h.seller, UPDATED_PRICE)
        .await;

    assert!(matches!(result, Err(MarketError::TransferFailed { .. })));
    // Only the first sale was paid out; the second was fully reverted
    let withdrawn = receiver.withdrawn.lock().await.take().unwrap();
    assert_eq!(withdrawn.unwrap(), PRICE);
    assert_eq!(h.payouts.paid_to(&h.seller).await, PRICE);
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
    assert!(h.market.get_listing(&second).await.is_some());
}

/// Lists the item it just received, then refuses it
struct RelistThenRefuse {
    market: Marketplace,
    account: AccountId,
}

#[async_trait]
impl TransferReceiver for RelistThenRefuse {
    async fn on_item_received(
        &self,
        key: &ItemKey,
        _operator: &AccountId,
        _from: &AccountId,
    ) -> Result<(), String> {
        self.market
            .list_item(key, Amount(1), &self.account)
            .await
            .map_err(|err| err.to_string())?;
        Err("refused after relisting".to_string())
    }
}

#[tokio::test]
async fn test_failed_sale_restores_the_original_listing() {
    let h = harness().await;
    h.registry
        .set_approval_for_all(
            &h.key.collection,
            &h.buyer,
            h.market.market_account(),
            true,
        )
        .await;
    h.registry
        .register_receiver(
            &h.buyer,
            Arc::new(RelistThenRefuse {
                market: h.market.clone(),
                account: h.buyer.clone(),
            }),
        )
        .await;
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();

    let result = h.market.buy_item(&h.key, &h.buyer, PRICE).await;

    match result {
        Err(MarketError::TransferFailed { reason }) => {
            assert!(reason.contains("refused after relisting"))
        }
        other => panic!("expected TransferFailed, got {:?}", other),
    }
    let listing = h.market.get_listing(&h.key).await.unwrap();
    assert_eq!(listing.seller, h.seller);
    assert_eq!(listing.price, PRICE);
    assert_eq!(h.registry.owner_of(&h.key).await.unwrap(), h.seller);
    assert_eq!(h.market.get_proceeds(&h.seller).await, Amount::zero());
    assert_eq!(
        event_names(&h.market.events().await),
        vec!["ItemListed", "ItemListed"]
    );
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_subscribers_see_only_committed_actions_in_order() {
    let h = harness().await;
    let mut rx = h.market.subscribe();

    h.market.list_item(&h.key, Amount::zero(), &h.seller).await.unwrap_err();
    h.market.list_item(&h.key, PRICE, &h.seller).await.unwrap();
    h.market
        .update_listing(&h.key, UPDATED_PRICE, &h.seller)
        .await
        .unwrap();
    h.market.buy_item(&h.key, &h.buyer, PRICE).await.unwrap_err();
    h.market
        .buy_item(&h.key, &h.buyer, UPDATED_PRICE)
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Ok(record) = rx.try_recv() {
        received.push(record);
    }
    assert_eq!(
        event_names(&received),
        vec!["ItemListed", "ItemListed", "ItemBought"]
    );
    let sequences: Vec<u64> = received.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}
