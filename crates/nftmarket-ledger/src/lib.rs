//! nftmarket Ledger - Sale proceeds owed to sellers
//!
//! The ledger is:
//! - Account-keyed by AccountId
//! - Journaled (every balance change appends an entry)
//! - Withdraw-all (a withdrawal takes the whole settled balance)
//! - Bounded (the journal keeps the most recent entries when given a limit)
//!
//! A sale credit is *held* until its item transfer completes. Held proceeds
//! count toward the balance but cannot be withdrawn, so a failed sale can
//! always be reversed.
//!
//! # Invariants
//!
//! 1. Balances never go negative
//! 2. The held amount of an account never exceeds its balance
//! 3. A balance only decreases through a withdrawal or the reversal of a
//!    held credit whose sale did not complete
//! 4. A withdrawal debits the balance before the amount leaves the ledger
//!
//! The ledger holds plain state; callers provide exclusive access
//! (`&mut self`) for the duration of each action.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use nftmarket_types::{AccountId, Amount, ItemKey, MarketError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No proceeds for {account}")]
    NoProceeds { account: AccountId },

    #[error("Balance overflow for {account}")]
    BalanceOverflow { account: AccountId },

    #[error("Insufficient balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        required: Amount,
    },
}

impl From<LedgerError> for MarketError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NoProceeds { account } => MarketError::NoProceeds { account },
            LedgerError::BalanceOverflow { account } => MarketError::ProceedsOverflow { account },
            LedgerError::InsufficientBalance {
                account,
                available,
                required,
            } => MarketError::InsufficientProceeds {
                account,
                available,
                required,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Sale proceeds added to a balance
    Credit,
    /// Whole balance paid out
    Withdrawal,
    /// A credit taken back because its sale did not complete
    Reversal,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// Proceeds of a sale
    Sale { item: ItemKey, buyer: AccountId },
    /// Seller withdrawal
    Withdrawal,
    /// The item transfer for a sale failed
    SaleReverted { item: ItemKey },
    /// The payout for a withdrawal failed
    PayoutReverted,
}

/// A single ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceedsEntry {
    pub entry_id: EntryId,
    pub account: AccountId,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

/// Proceeds owed to each seller
#[derive(Debug, Clone, Default)]
pub struct ProceedsLedger {
    balances: HashMap<AccountId, Amount>,
    held: HashMap<AccountId, Amount>,
    entries: VecDeque<ProceedsEntry>,
    /// Journal entries kept (0 = unbounded)
    entry_limit: usize,
}

impl ProceedsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger whose journal keeps at most `limit` entries (0 = unbounded)
    pub fn with_entry_limit(limit: usize) -> Self {
        Self {
            entry_limit: limit,
            ..Self::default()
        }
    }

    /// Proceeds credited to an account, held ones included (zero if never
    /// credited)
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::zero())
    }

    /// Proceeds of sales that have not completed yet
    pub fn held(&self, account: &AccountId) -> Amount {
        self.held.get(account).copied().unwrap_or(Amount::zero())
    }

    /// The part of the balance a withdrawal may take
    pub fn available(&self, account: &AccountId) -> Amount {
        self.balance(account)
            .checked_sub(self.held(account))
            .unwrap_or(Amount::zero())
    }

    /// Add proceeds to an account
    ///
    /// A zero amount changes nothing and records no entry. Returns the new
    /// balance.
    pub fn credit(
        &mut self,
        account: &AccountId,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<Amount> {
        let current = self.balance(account);
        if amount.is_zero() {
            return Ok(current);
        }

        let new_balance = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                account: account.clone(),
            })?;

        self.balances.insert(account.clone(), new_balance);
        self.record(account, EntryType::Credit, amount, new_balance, reason);
        debug!("Credited {} to {} (balance {})", amount, account, new_balance);
        Ok(new_balance)
    }

    /// Credit sale proceeds and hold them until [`settle`](Self::settle)
    /// or [`reverse_credit`](Self::reverse_credit)
    pub fn credit_held(
        &mut self,
        account: &AccountId,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<Amount> {
        let new_held = self
            .held(account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                account: account.clone(),
            })?;
        let new_balance = self.credit(account, amount, reason)?;
        if !amount.is_zero() {
            self.held.insert(account.clone(), new_held);
        }
        Ok(new_balance)
    }

    /// Release a held credit; its sale completed
    pub fn settle(&mut self, account: &AccountId, amount: Amount) {
        self.release(account, amount);
    }

    /// Take the whole settled balance of an account
    ///
    /// Held proceeds stay in place. The balance is debited here; the caller
    /// is responsible for moving the returned amount out.
    pub fn withdraw(&mut self, account: &AccountId) -> Result<Amount> {
        let amount = self.available(account);
        if amount.is_zero() {
            return Err(LedgerError::NoProceeds {
                account: account.clone(),
            });
        }

        let remaining = self.held(account);
        self.balances.insert(account.clone(), remaining);
        self.record(
            account,
            EntryType::Withdrawal,
            amount,
            remaining,
            EntryReason::Withdrawal,
        );
        debug!("Withdrew {} for {}", amount, account);
        Ok(amount)
    }

    /// Take back a held credit whose sale did not complete
    pub fn reverse_credit(
        &mut self,
        account: &AccountId,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<Amount> {
        let current = self.balance(account);
        if amount.is_zero() {
            return Ok(current);
        }

        let new_balance =
            current
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::InsufficientBalance {
                    account: account.clone(),
                    available: current,
                    required: amount,
                })?;

        self.balances.insert(account.clone(), new_balance);
        self.release(account, amount);
        self.record(account, EntryType::Reversal, amount, new_balance, reason);
        debug!("Reversed {} from {} (balance {})", amount, account, new_balance);
        Ok(new_balance)
    }

    /// All entries for an account, oldest first
    pub fn account_entries(&self, account: &AccountId) -> Vec<ProceedsEntry> {
        self.entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Recent entries (newest first)
    pub fn recent_entries(&self, limit: usize) -> Vec<ProceedsEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Every account that has ever been credited
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self.balances.keys().cloned().collect();
        accounts.sort();
        accounts
    }

    fn release(&mut self, account: &AccountId, amount: Amount) {
        if let Some(held) = self.held.get_mut(account) {
            *held = held.checked_sub(amount).unwrap_or(Amount::zero());
            if held.is_zero() {
                self.held.remove(account);
            }
        }
    }

    fn record(
        &mut self,
        account: &AccountId,
        entry_type: EntryType,
        amount: Amount,
        balance_after: Amount,
        reason: EntryReason,
    ) {
        self.entries.push_back(ProceedsEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            entry_type,
            amount,
            balance_after,
            reason,
            created_at: Utc::now(),
        });
        while self.entry_limit > 0 && self.entries.len() > self.entry_limit {
            self.entries.pop_front();
        }
    }
}
