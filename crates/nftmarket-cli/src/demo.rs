//! Marketplace walkthrough against in-memory collaborators
//!
//! mint → approve → list → (rejected attempts) → update → buy → withdraw

use std::sync::Arc;

use nftmarket_core::{
    AccountId, Amount, CollectionId, EventRecord, InMemoryPayoutRail, ItemKey, MarketConfig,
    Marketplace, Purchase, STANDARD_DECIMALS,
};
use nftmarket_registry::{AssetRegistry, InMemoryAssetRegistry};
use serde::Serialize;

use crate::display;

/// Everything the walkthrough did
#[derive(Debug, Serialize)]
pub struct Walkthrough {
    pub item: ItemKey,
    pub seller: AccountId,
    pub buyer: AccountId,
    /// Actions the marketplace refused along the way
    pub rejections: Vec<Rejection>,
    pub purchase: Purchase,
    pub withdrawn: Amount,
    pub final_owner: AccountId,
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Serialize)]
pub struct Rejection {
    pub action: String,
    pub error: String,
}

pub async fn run_walkthrough(
    config: MarketConfig,
    price: Amount,
    new_price: Amount,
) -> anyhow::Result<Walkthrough> {
    anyhow::ensure!(
        new_price != price,
        "the updated price must differ from the listing price"
    );

    let registry = InMemoryAssetRegistry::new();
    let payouts = InMemoryPayoutRail::new();
    let market = Marketplace::new(config, Arc::new(registry.clone()), Arc::new(payouts.clone()));

    let seller = AccountId::new("deployer");
    let buyer = AccountId::new("player");
    let mut rejections = Vec::new();

    let item = registry.mint(&CollectionId::new("basic-nft"), &seller).await;
    registry
        .approve(&item, &seller, Some(market.market_account().clone()))
        .await?;

    market.list_item(&item, price, &seller).await?;

    if let Err(err) = market.list_item(&item, price, &buyer).await {
        rejections.push(Rejection {
            action: "list by non-owner".to_string(),
            error: err.to_string(),
        });
    }

    market.update_listing(&item, new_price, &seller).await?;

    if let Err(err) = market.buy_item(&item, &buyer, price).await {
        rejections.push(Rejection {
            action: "buy at the old price".to_string(),
            error: err.to_string(),
        });
    }

    let purchase = market.buy_item(&item, &buyer, new_price).await?;
    let withdrawn = market.withdraw_proceeds(&seller).await?;

    if let Err(err) = market.withdraw_proceeds(&seller).await {
        rejections.push(Rejection {
            action: "second withdraw".to_string(),
            error: err.to_string(),
        });
    }

    Ok(Walkthrough {
        final_owner: registry.owner_of(&item).await?,
        item,
        seller,
        buyer,
        rejections,
        purchase,
        withdrawn,
        events: market.events().await,
    })
}

pub fn print_pretty(walkthrough: &Walkthrough) {
    display::section("nftmarket walkthrough");
    display::kv("item", &walkthrough.item.to_string());
    display::kv("seller", walkthrough.seller.as_str());
    display::kv("buyer", walkthrough.buyer.as_str());

    display::section("Outcome");
    display::step(&format!(
        "{} bought {} for {}",
        walkthrough.purchase.buyer,
        walkthrough.purchase.key,
        walkthrough.purchase.price.format_units(STANDARD_DECIMALS)
    ));
    display::step(&format!(
        "{} withdrew {}",
        walkthrough.seller,
        walkthrough.withdrawn.format_units(STANDARD_DECIMALS)
    ));
    display::kv("owner now", walkthrough.final_owner.as_str());
    for rejection in &walkthrough.rejections {
        display::rejected(&format!("{}: {}", rejection.action, rejection.error));
    }

    display::section("Notifications");
    for record in &walkthrough.events {
        display::event(record);
    }
    println!();
}
