//! # In-Memory Stores
//!
//! Concurrent-map-backed implementations of the store traits. These back
//! the node binary and the test suite; they honor the same versioning and
//! atomicity contracts a database-backed implementation would, so engine
//! code cannot tell the difference.
//!
//! `DashMap` entry handles give us per-key atomicity for the CAS updates:
//! the read-compare-write happens while the shard lock is held.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::ledger::types::{Transaction, TransactionStatus};
use crate::marketplace::types::{Bid, Listing};
use crate::rewards::types::{Quest, QuestProgress, QuestProgressStatus};
use crate::store::{
    Account, AccountStore, BidStore, ListingStore, QuestProgressStore, QuestStore, StoreError,
    TransactionStore,
};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// In-memory [`AccountStore`].
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<String, Account>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    fn get(&self, id: &str) -> Result<Account, StoreError> {
        self.accounts
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: id.to_string(),
            })
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        match self.accounts.entry(account.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                entity: "account",
                id: account.id,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    fn apply_balance_delta(
        &self,
        id: &str,
        delta: i64,
        expected_version: u64,
    ) -> Result<Account, StoreError> {
        let mut entry = self.accounts.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "account",
            id: id.to_string(),
        })?;

        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                entity: "account",
                id: id.to_string(),
                expected: expected_version,
                found: entry.version,
            });
        }

        if delta >= 0 {
            let credit = delta as u64;
            entry.balance = entry.balance.saturating_add(credit);
            entry.total_earned = entry.total_earned.saturating_add(credit);
        } else {
            let debit = delta.unsigned_abs();
            if entry.balance < debit {
                return Err(StoreError::BalanceUnderflow {
                    id: id.to_string(),
                    balance: entry.balance,
                    debit,
                });
            }
            entry.balance -= debit;
            entry.total_spent = entry.total_spent.saturating_add(debit);
        }

        entry.version += 1;
        Ok(entry.clone())
    }

    fn set_progression(
        &self,
        id: &str,
        level: u32,
        experience: u64,
        expected_version: u64,
    ) -> Result<Account, StoreError> {
        let mut entry = self.accounts.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "account",
            id: id.to_string(),
        })?;

        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                entity: "account",
                id: id.to_string(),
                expected: expected_version,
                found: entry.version,
            });
        }

        entry.level = level;
        entry.experience = experience;
        entry.version += 1;
        Ok(entry.clone())
    }

    fn set_locked(&self, id: &str, locked: bool) -> Result<(), StoreError> {
        let mut entry = self.accounts.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "account",
            id: id.to_string(),
        })?;
        entry.locked = locked;
        entry.version += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// In-memory [`TransactionStore`]. Append-only: `save` upserts, nothing
/// deletes.
#[derive(Default)]
pub struct MemoryTransactionStore {
    transactions: DashMap<String, Transaction>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions. Test/diagnostic helper.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn save(&self, tx: &Transaction) -> Result<(), StoreError> {
        self.transactions.insert(tx.id.clone(), tx.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Transaction, StoreError> {
        self.transactions
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound {
                entity: "transaction",
                id: id.to_string(),
            })
    }

    fn find_recent(
        &self,
        sender_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut found: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| {
                entry.sender_id.as_deref() == Some(sender_id) && entry.created_at >= since
            })
            .map(|entry| entry.clone())
            .collect();
        found.sort_by_key(|tx| tx.created_at);
        Ok(found)
    }

    fn find_pending_expired(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .transactions
            .iter()
            .filter(|entry| entry.status == TransactionStatus::Pending && entry.expires_at <= now)
            .map(|entry| entry.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// In-memory [`ListingStore`] with versioned writes.
#[derive(Default)]
pub struct MemoryListingStore {
    listings: DashMap<String, Listing>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListingStore for MemoryListingStore {
    fn insert(&self, listing: Listing) -> Result<(), StoreError> {
        match self.listings.entry(listing.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                entity: "listing",
                id: listing.id,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(listing);
                Ok(())
            }
        }
    }

    fn get(&self, id: &str) -> Result<Listing, StoreError> {
        self.listings
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound {
                entity: "listing",
                id: id.to_string(),
            })
    }

    fn update(&self, listing: &Listing, expected_version: u64) -> Result<Listing, StoreError> {
        let mut entry = self
            .listings
            .get_mut(&listing.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "listing",
                id: listing.id.clone(),
            })?;

        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                entity: "listing",
                id: listing.id.clone(),
                expected: expected_version,
                found: entry.version,
            });
        }

        let mut updated = listing.clone();
        updated.version = entry.version + 1;
        *entry = updated.clone();
        Ok(updated)
    }

    fn active(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .listings
            .iter()
            .filter(|entry| entry.status == crate::marketplace::types::ListingStatus::Active)
            .map(|entry| entry.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Bids
// ---------------------------------------------------------------------------

/// In-memory [`BidStore`]. A plain ordered log behind a read-write lock.
#[derive(Default)]
pub struct MemoryBidStore {
    bids: RwLock<Vec<Bid>>,
}

impl MemoryBidStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BidStore for MemoryBidStore {
    fn append(&self, bid: Bid) -> Result<(), StoreError> {
        self.bids.write().push(bid);
        Ok(())
    }

    fn for_listing(&self, listing_id: &str) -> Result<Vec<Bid>, StoreError> {
        Ok(self
            .bids
            .read()
            .iter()
            .filter(|b| b.listing_id == listing_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

/// In-memory [`QuestStore`].
#[derive(Default)]
pub struct MemoryQuestStore {
    quests: DashMap<String, Quest>,
}

impl MemoryQuestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuestStore for MemoryQuestStore {
    fn insert(&self, quest: Quest) -> Result<(), StoreError> {
        match self.quests.entry(quest.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                entity: "quest",
                id: quest.id,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(quest);
                Ok(())
            }
        }
    }

    fn get(&self, id: &str) -> Result<Quest, StoreError> {
        self.quests
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound {
                entity: "quest",
                id: id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Quest Progress
// ---------------------------------------------------------------------------

fn progress_key(user_id: &str, quest_id: &str) -> String {
    format!("{user_id}\u{1f}{quest_id}")
}

/// In-memory [`QuestProgressStore`].
///
/// The `complete` transition runs under the entry's shard lock, so two
/// concurrent completions of the same `(user, quest)` pair serialize and
/// exactly one of them observes `InProgress`.
#[derive(Default)]
pub struct MemoryQuestProgressStore {
    progress: DashMap<String, QuestProgress>,
}

impl MemoryQuestProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuestProgressStore for MemoryQuestProgressStore {
    fn start(&self, progress: QuestProgress) -> Result<(), StoreError> {
        let key = progress_key(&progress.user_id, &progress.quest_id);
        match self.progress.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                entity: "quest_progress",
                id: key,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(progress);
                Ok(())
            }
        }
    }

    fn get(&self, user_id: &str, quest_id: &str) -> Result<Option<QuestProgress>, StoreError> {
        Ok(self
            .progress
            .get(&progress_key(user_id, quest_id))
            .map(|entry| entry.clone()))
    }

    fn update(&self, progress: &QuestProgress) -> Result<(), StoreError> {
        let key = progress_key(&progress.user_id, &progress.quest_id);
        let mut entry = self.progress.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            entity: "quest_progress",
            id: key.clone(),
        })?;
        *entry = progress.clone();
        Ok(())
    }

    fn complete(
        &self,
        user_id: &str,
        quest_id: &str,
        now: DateTime<Utc>,
    ) -> Result<QuestProgress, StoreError> {
        let key = progress_key(user_id, quest_id);
        let mut entry = self.progress.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            entity: "quest_progress",
            id: key.clone(),
        })?;

        if entry.status != QuestProgressStatus::InProgress {
            // Not retryable in the usual sense, but VersionConflict tells the
            // caller someone else changed the record first.
            return Err(StoreError::VersionConflict {
                entity: "quest_progress",
                id: key,
                expected: 0,
                found: 1,
            });
        }

        entry.status = QuestProgressStatus::Completed;
        entry.progress_value = entry.progress_value.max(entry.target);
        entry.completed_at = Some(now);
        Ok(entry.clone())
    }
}
