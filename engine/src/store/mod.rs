//! # Store Interfaces
//!
//! The engine never talks to a database directly — every durable entity is
//! reached through one of the repository traits below. The bundled
//! [`memory`] implementations back the node binary and the test suite; a
//! deployment wanting a relational store implements the same traits.
//!
//! Two persistence disciplines apply:
//!
//! - **Mutable current-state entities** (accounts, listings) carry a
//!   monotonically increasing `version` and are written with
//!   compare-and-swap updates. A stale version yields
//!   [`StoreError::VersionConflict`], which callers treat as retryable.
//! - **Append-only audit entities** (transactions, bids, quest progress)
//!   are saved and updated in place by their owning engine but never
//!   deleted.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::types::{Grains, Transaction};
use crate::marketplace::types::{Bid, Listing};
use crate::rewards::types::{Quest, QuestProgress};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entity with the given id exists.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. "account" or "listing".
        entity: &'static str,
        /// The id that missed.
        id: String,
    },

    /// A compare-and-swap update observed a newer version than expected.
    /// Retryable: re-read and re-validate before re-attempting.
    #[error("stale version for {entity} {id}: expected {expected}, found {found}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },

    /// An insert collided with an existing key.
    #[error("{entity} already exists: {id}")]
    DuplicateKey { entity: &'static str, id: String },

    /// A balance update would take the account below zero. The ledger
    /// checks balances before writing, so this is a last-line guard.
    #[error("balance underflow on account {id}: {balance} grains available, {debit} requested")]
    BalanceUnderflow { id: String, balance: Grains, debit: Grains },
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// The durable state of a user account, as the economy sees it.
///
/// `balance` is mutated only through [`AccountStore::apply_balance_delta`]
/// (and only the ledger calls that); `level`/`experience` are mutated only
/// by the reward engine through [`AccountStore::set_progression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable account identifier.
    pub id: String,
    /// Current balance in grains. Never negative by construction (u64 +
    /// underflow guard).
    pub balance: Grains,
    /// Current level, >= 1.
    pub level: u32,
    /// Lifetime accumulated experience points.
    pub experience: u64,
    /// Lifetime grains credited to this account.
    pub total_earned: Grains,
    /// Lifetime grains debited from this account.
    pub total_spent: Grains,
    /// Frozen accounts can neither send nor receive.
    pub locked: bool,
    /// Account creation time (feeds the fraud heuristic's age component).
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped on every write.
    pub version: u64,
}

impl Account {
    /// Creates a fresh level-1 account with the given opening balance.
    pub fn new(id: impl Into<String>, balance: Grains) -> Self {
        Self {
            id: id.into(),
            balance,
            level: 1,
            experience: 0,
            total_earned: 0,
            total_spent: 0,
            locked: false,
            created_at: Utc::now(),
            version: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Durable storage of accounts with atomic, versioned mutation.
pub trait AccountStore: Send + Sync {
    /// Fetches an account by id.
    fn get(&self, id: &str) -> Result<Account, StoreError>;

    /// Inserts a new account. Fails on duplicate id.
    fn insert(&self, account: Account) -> Result<(), StoreError>;

    /// Applies a signed balance delta if and only if the stored version
    /// matches `expected_version`. Positive deltas accumulate into
    /// `total_earned`, negative into `total_spent`. Returns the updated
    /// account.
    fn apply_balance_delta(
        &self,
        id: &str,
        delta: i64,
        expected_version: u64,
    ) -> Result<Account, StoreError>;

    /// Sets level and experience under the same CAS discipline.
    fn set_progression(
        &self,
        id: &str,
        level: u32,
        experience: u64,
        expected_version: u64,
    ) -> Result<Account, StoreError>;

    /// Freezes or unfreezes an account (compliance hold, manual review).
    fn set_locked(&self, id: &str, locked: bool) -> Result<(), StoreError>;

    /// Whether the account is currently frozen.
    fn is_locked(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.get(id)?.locked)
    }
}

/// Append-only transaction audit log.
pub trait TransactionStore: Send + Sync {
    /// Inserts or updates a transaction record by id. Records are never
    /// deleted.
    fn save(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Fetches a transaction by id.
    fn get(&self, id: &str) -> Result<Transaction, StoreError>;

    /// Transactions sent by `sender_id` created at or after `since`,
    /// regardless of status. Feeds the fraud velocity heuristic.
    fn find_recent(&self, sender_id: &str, since: DateTime<Utc>) -> Result<Vec<Transaction>, StoreError>;

    /// Pending transactions whose expiry deadline is at or before `now`.
    /// Consumed by the periodic sweep.
    fn find_pending_expired(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, StoreError>;
}

/// Mutable current-state storage of marketplace listings.
pub trait ListingStore: Send + Sync {
    /// Inserts a new listing. Fails on duplicate id.
    fn insert(&self, listing: Listing) -> Result<(), StoreError>;

    /// Fetches a listing by id.
    fn get(&self, id: &str) -> Result<Listing, StoreError>;

    /// Writes back a modified listing if `expected_version` still matches,
    /// bumping the stored version. Returns the stored copy.
    fn update(&self, listing: &Listing, expected_version: u64) -> Result<Listing, StoreError>;

    /// All listings currently in `Active` status (sweep input).
    fn active(&self) -> Result<Vec<Listing>, StoreError>;
}

/// Append-only bid history.
pub trait BidStore: Send + Sync {
    /// Records a bid. Bids are immutable once created; superseded bids
    /// stay in history for audit.
    fn append(&self, bid: Bid) -> Result<(), StoreError>;

    /// All bids for a listing in placement order.
    fn for_listing(&self, listing_id: &str) -> Result<Vec<Bid>, StoreError>;
}

/// Quest definitions (reward amounts and targets).
pub trait QuestStore: Send + Sync {
    fn insert(&self, quest: Quest) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<Quest, StoreError>;
}

/// Per-user quest progress, keyed by `(user_id, quest_id)`.
pub trait QuestProgressStore: Send + Sync {
    /// Creates an `InProgress` record. Fails with [`StoreError::DuplicateKey`]
    /// if any record (in progress, completed, or abandoned) already exists
    /// for the pair — the uniqueness invariant behind exactly-once payout.
    fn start(&self, progress: QuestProgress) -> Result<(), StoreError>;

    /// Fetches the record for a pair, if any.
    fn get(&self, user_id: &str, quest_id: &str) -> Result<Option<QuestProgress>, StoreError>;

    /// Writes back a modified record. The `complete` transition must be
    /// atomic with respect to concurrent completions; see
    /// [`memory::MemoryQuestProgressStore`].
    fn update(&self, progress: &QuestProgress) -> Result<(), StoreError>;

    /// Atomically transitions `InProgress -> Completed`, stamping
    /// `completed_at`. Returns the completed record, or
    /// [`StoreError::VersionConflict`] if the record is no longer in
    /// progress (a concurrent caller won the race).
    fn complete(
        &self,
        user_id: &str,
        quest_id: &str,
        now: DateTime<Utc>,
    ) -> Result<QuestProgress, StoreError>;
}
