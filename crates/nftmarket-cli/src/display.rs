//! Terminal output helpers

use colored::*;
use nftmarket_core::{EventRecord, MarketEvent, STANDARD_DECIMALS};

pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

pub fn step(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

pub fn rejected(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

pub fn kv(key: &str, value: &str) {
    println!("      {}: {}", key, value.bright_cyan());
}

/// One line per notification
pub fn event(record: &EventRecord) {
    let detail = match &record.event {
        MarketEvent::ItemListed {
            seller,
            collection,
            item,
            price,
        } => format!(
            "{}#{} by {} at {}",
            collection,
            item,
            seller,
            price.format_units(STANDARD_DECIMALS)
        ),
        MarketEvent::ItemCanceled {
            seller,
            collection,
            item,
        } => format!("{}#{} by {}", collection, item, seller),
        MarketEvent::ItemBought {
            buyer,
            collection,
            item,
            price,
        } => format!(
            "{}#{} by {} for {}",
            collection,
            item,
            buyer,
            price.format_units(STANDARD_DECIMALS)
        ),
    };
    println!(
        "  {:>3} {} {}",
        record.sequence.to_string().bright_black(),
        format!("{:<13}", record.event.name()).bright_blue(),
        detail
    );
}
