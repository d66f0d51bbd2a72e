//! Marketplace configuration

use nftmarket_types::AccountId;
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Identity the marketplace acts as when moving items; this is the
    /// account owners must approve
    #[serde(default = "default_market_account")]
    pub market_account: AccountId,

    /// Capacity of the notification broadcast channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Notifications kept in the in-memory log (0 = unbounded)
    #[serde(default = "default_event_log_limit")]
    pub event_log_limit: usize,

    /// Proceeds journal entries kept in memory (0 = unbounded)
    #[serde(default = "default_ledger_entry_limit")]
    pub ledger_entry_limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            market_account: default_market_account(),
            event_channel_capacity: default_event_channel_capacity(),
            event_log_limit: default_event_log_limit(),
            ledger_entry_limit: default_ledger_entry_limit(),
        }
    }
}

impl MarketConfig {
    pub fn with_market_account(mut self, account: AccountId) -> Self {
        self.market_account = account;
        self
    }
}

fn default_market_account() -> AccountId {
    AccountId::new("nftmarket")
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_event_log_limit() -> usize {
    10_000
}

fn default_ledger_entry_limit() -> usize {
    10_000
}
