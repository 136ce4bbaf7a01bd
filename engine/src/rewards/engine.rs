//! # Reward Engine
//!
//! XP accrual, the level curve, and quest payouts. Progression state
//! (level, experience) is committed to the account store first, under the
//! per-account lock; the matching `LevelReward` and `QuestReward` ledger
//! transactions are issued afterwards, outside the lock, so the ledger's
//! own locking never nests inside ours.
//!
//! Quest payouts are exactly-once: the `(user, quest)` progress record is
//! unique, and the `InProgress -> Completed` transition is atomic in the
//! store. Whichever caller wins that transition pays the reward; everyone
//! else gets [`RewardError::QuestAlreadyCompleted`].

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::service::{Ledger, LedgerError, ProcessOutcome};
use crate::ledger::types::{Grains, Transaction, TransactionType};
use crate::locks::LockTable;
use crate::rewards::level;
use crate::rewards::types::{Quest, QuestProgress, QuestProgressStatus};
use crate::store::{Account, AccountStore, QuestProgressStore, QuestStore, StoreError};

// ---------------------------------------------------------------------------
// Errors & results
// ---------------------------------------------------------------------------

/// Errors from reward operations.
#[derive(Debug, Error)]
pub enum RewardError {
    /// XP grants must be strictly positive.
    #[error("invalid experience amount: {amount}")]
    InvalidExperience { amount: u64 },

    /// The user has no progress record for this quest.
    #[error("quest {quest_id} not started by {user_id}")]
    QuestNotStarted { user_id: String, quest_id: String },

    /// The user already has a progress record for this quest.
    #[error("quest {quest_id} already started by {user_id}")]
    QuestAlreadyStarted { user_id: String, quest_id: String },

    /// The quest was already completed (and paid) for this user.
    #[error("quest {quest_id} already completed by {user_id}")]
    QuestAlreadyCompleted { user_id: String, quest_id: String },

    /// The progress record was abandoned; it cannot complete or restart.
    #[error("quest {quest_id} abandoned by {user_id}")]
    QuestAbandoned { user_id: String, quest_id: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The outcome of an XP grant.
#[derive(Debug)]
pub struct ProgressionUpdate {
    /// The account after the XP (and any level change) was committed.
    pub account: Account,
    pub old_level: u32,
    pub new_level: u32,
    /// One completed `LevelReward` transaction per level crossed, in
    /// ascending level order. Empty when no level was gained.
    pub reward_transactions: Vec<Transaction>,
}

impl ProgressionUpdate {
    /// Whether the grant crossed at least one level boundary.
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.old_level
    }
}

/// The outcome of a quest completion.
#[derive(Debug)]
pub struct QuestCompletion {
    pub progress: QuestProgress,
    pub xp_awarded: u64,
    /// The completed `QuestReward` transaction, when the quest pays coin.
    pub coin_transaction: Option<Transaction>,
    /// The XP grant's progression effect, when the quest pays XP.
    pub progression: Option<ProgressionUpdate>,
}

/// What [`RewardEngine::advance_progress`] did.
#[derive(Debug)]
pub enum AdvanceOutcome {
    /// Progress moved but the target is not yet reached.
    Advanced(QuestProgress),
    /// The increment reached the target; the quest completed and paid.
    Completed(QuestCompletion),
}

// ---------------------------------------------------------------------------
// RewardEngine
// ---------------------------------------------------------------------------

/// XP, levels, and quest payouts.
pub struct RewardEngine {
    accounts: Arc<dyn AccountStore>,
    quests: Arc<dyn QuestStore>,
    progress: Arc<dyn QuestProgressStore>,
    ledger: Arc<Ledger>,
    locks: Arc<LockTable>,
}

impl RewardEngine {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        quests: Arc<dyn QuestStore>,
        progress: Arc<dyn QuestProgressStore>,
        ledger: Arc<Ledger>,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            accounts,
            quests,
            progress,
            ledger,
            locks,
        }
    }

    // -----------------------------------------------------------------------
    // Experience
    // -----------------------------------------------------------------------

    /// Grants XP and commits any resulting level change, then pays one
    /// `LevelReward` per level crossed. The progression commit is atomic;
    /// the payouts reference the already-committed levels, so a crash
    /// between the two never double-levels anyone.
    pub fn add_experience(
        &self,
        user_id: &str,
        xp: u64,
    ) -> Result<ProgressionUpdate, RewardError> {
        if xp == 0 {
            return Err(RewardError::InvalidExperience { amount: xp });
        }

        // Commit XP and level under the account lock, then drop it before
        // touching the ledger (which locks the same key).
        let (account, old_level, new_level) = self.locks.with_key(user_id, || {
            let current = self.accounts.get(user_id)?;
            let old_level = current.level;
            let new_xp = current.experience.saturating_add(xp);
            // The stored level never decreases, even if the curve would.
            let new_level = level::level_for_xp(new_xp).max(old_level);
            let account =
                self.accounts
                    .set_progression(user_id, new_level, new_xp, current.version)?;
            Ok::<_, RewardError>((account, old_level, new_level))
        })?;

        let mut reward_transactions = Vec::new();
        for (crossed, reward) in level::rewards_for_range(old_level, new_level) {
            match self.pay_level_reward(user_id, crossed, reward) {
                Ok(tx) => reward_transactions.push(tx),
                Err(e) => {
                    // The level itself is already committed; a failed payout
                    // is a reconciliation item, not a rollback.
                    warn!(
                        user = user_id,
                        level = crossed,
                        error = %e,
                        "level reward payout failed"
                    );
                    return Err(e);
                }
            }
        }

        if new_level > old_level {
            info!(
                user = user_id,
                old_level,
                new_level,
                xp_granted = xp,
                "level up"
            );
        }

        Ok(ProgressionUpdate {
            account,
            old_level,
            new_level,
            reward_transactions,
        })
    }

    fn pay_level_reward(
        &self,
        user_id: &str,
        level: u32,
        reward: Grains,
    ) -> Result<Transaction, RewardError> {
        let tx = self.ledger.create(
            None,
            Some(user_id),
            reward,
            TransactionType::LevelReward,
            Some(format!("level:{level}")),
        )?;
        match self.ledger.process(&tx.id)? {
            ProcessOutcome::Completed(tx) => Ok(tx),
            ProcessOutcome::HeldForReview(tx) | ProcessOutcome::AlreadySettled(tx) => {
                // System credits are never risk-scored; anything but
                // completion is a logic error.
                Err(RewardError::Ledger(LedgerError::InvalidState {
                    current: tx.status,
                    expected: "completed level reward",
                }))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Quests
    // -----------------------------------------------------------------------

    /// Registers a quest definition.
    pub fn define_quest(&self, quest: Quest) -> Result<Quest, RewardError> {
        self.quests.insert(quest.clone())?;
        Ok(quest)
    }

    /// Starts a quest for a user. Each `(user, quest)` pair starts at most
    /// once, ever — this uniqueness record is the anchor of the
    /// exactly-once payout guarantee.
    pub fn start_quest(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<QuestProgress, RewardError> {
        self.accounts.get(user_id)?;
        let quest = self.quests.get(quest_id)?;

        let record = QuestProgress::start(user_id, &quest);
        match self.progress.start(record.clone()) {
            Ok(()) => {
                info!(user = user_id, quest = quest_id, "quest started");
                Ok(record)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                match self.progress.get(user_id, quest_id)? {
                    Some(existing) if existing.status == QuestProgressStatus::Completed => {
                        Err(RewardError::QuestAlreadyCompleted {
                            user_id: user_id.to_string(),
                            quest_id: quest_id.to_string(),
                        })
                    }
                    _ => Err(RewardError::QuestAlreadyStarted {
                        user_id: user_id.to_string(),
                        quest_id: quest_id.to_string(),
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Adds `units` of progress. When the accumulated value reaches the
    /// quest's target, the quest completes and pays immediately.
    pub fn advance_progress(
        &self,
        user_id: &str,
        quest_id: &str,
        units: u64,
    ) -> Result<AdvanceOutcome, RewardError> {
        let mut record = self.require_in_progress(user_id, quest_id)?;
        record.progress_value = record.progress_value.saturating_add(units);
        self.progress.update(&record)?;

        if record.target_reached() {
            return Ok(AdvanceOutcome::Completed(
                self.complete_quest(user_id, quest_id)?,
            ));
        }
        Ok(AdvanceOutcome::Advanced(record))
    }

    /// Completes a quest and pays its rewards, exactly once per
    /// `(user, quest)` pair. Safe to call concurrently: the store-level
    /// transition decides the single winner.
    pub fn complete_quest(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<QuestCompletion, RewardError> {
        let quest = self.quests.get(quest_id)?;
        self.require_in_progress(user_id, quest_id)?;

        let progress = match self.progress.complete(user_id, quest_id, Utc::now()) {
            Ok(p) => p,
            Err(StoreError::VersionConflict { .. }) => {
                // A concurrent completion won; it pays, we do not.
                return Err(RewardError::QuestAlreadyCompleted {
                    user_id: user_id.to_string(),
                    quest_id: quest_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let progression = if quest.xp_reward > 0 {
            Some(self.add_experience(user_id, quest.xp_reward)?)
        } else {
            None
        };

        let coin_transaction = if quest.coin_reward > 0 {
            Some(self.pay_quest_reward(user_id, &quest)?)
        } else {
            None
        };

        info!(
            user = user_id,
            quest = quest_id,
            xp = quest.xp_reward,
            coin = quest.coin_reward,
            "quest completed"
        );
        Ok(QuestCompletion {
            progress,
            xp_awarded: quest.xp_reward,
            coin_transaction,
            progression,
        })
    }

    /// Marks a quest abandoned. The record stays, so the pair can never be
    /// restarted for a second payout.
    pub fn abandon_quest(&self, user_id: &str, quest_id: &str) -> Result<(), RewardError> {
        let mut record = self.require_in_progress(user_id, quest_id)?;
        record.status = QuestProgressStatus::Abandoned;
        self.progress.update(&record)?;
        info!(user = user_id, quest = quest_id, "quest abandoned");
        Ok(())
    }

    /// Read access to a progress record.
    pub fn quest_progress(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<QuestProgress>, RewardError> {
        Ok(self.progress.get(user_id, quest_id)?)
    }

    fn require_in_progress(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<QuestProgress, RewardError> {
        match self.progress.get(user_id, quest_id)? {
            None => Err(RewardError::QuestNotStarted {
                user_id: user_id.to_string(),
                quest_id: quest_id.to_string(),
            }),
            Some(p) => match p.status {
                QuestProgressStatus::InProgress => Ok(p),
                QuestProgressStatus::Completed => Err(RewardError::QuestAlreadyCompleted {
                    user_id: user_id.to_string(),
                    quest_id: quest_id.to_string(),
                }),
                QuestProgressStatus::Abandoned => Err(RewardError::QuestAbandoned {
                    user_id: user_id.to_string(),
                    quest_id: quest_id.to_string(),
                }),
            },
        }
    }

    fn pay_quest_reward(&self, user_id: &str, quest: &Quest) -> Result<Transaction, RewardError> {
        let tx = self.ledger.create(
            None,
            Some(user_id),
            quest.coin_reward,
            TransactionType::QuestReward,
            Some(quest.id.clone()),
        )?;
        match self.ledger.process(&tx.id)? {
            ProcessOutcome::Completed(tx) => Ok(tx),
            ProcessOutcome::HeldForReview(tx) | ProcessOutcome::AlreadySettled(tx) => {
                Err(RewardError::Ledger(LedgerError::InvalidState {
                    current: tx.status,
                    expected: "completed quest reward",
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::crowns;
    use crate::gateway::ApprovingGateway;
    use crate::ledger::fraud::HeuristicRiskAssessor;
    use crate::store::memory::{
        MemoryAccountStore, MemoryQuestProgressStore, MemoryQuestStore, MemoryTransactionStore,
    };
    use crate::store::{AccountStore, TransactionStore};

    struct Fixture {
        accounts: Arc<MemoryAccountStore>,
        quests: Arc<MemoryQuestStore>,
        engine: RewardEngine,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(MemoryAccountStore::new());
        let transactions = Arc::new(MemoryTransactionStore::new());
        let quests = Arc::new(MemoryQuestStore::new());
        let progress = Arc::new(MemoryQuestProgressStore::new());
        let locks = Arc::new(LockTable::new());
        let risk = Arc::new(HeuristicRiskAssessor::new(
            Arc::clone(&accounts) as Arc<dyn AccountStore>,
            Arc::clone(&transactions) as Arc<dyn TransactionStore>,
        ));
        let ledger = Arc::new(Ledger::new(
            Arc::clone(&accounts) as _,
            Arc::clone(&transactions) as _,
            risk,
            Some(Arc::new(ApprovingGateway)),
            Arc::clone(&locks),
        ));
        let engine = RewardEngine::new(
            Arc::clone(&accounts) as _,
            Arc::clone(&quests) as _,
            progress,
            ledger,
            locks,
        );
        Fixture {
            accounts,
            quests,
            engine,
        }
    }

    fn seed_account(f: &Fixture, id: &str) {
        f.accounts.insert(Account::new(id, 0)).unwrap();
    }

    fn seed_quest(f: &Fixture, id: &str, xp: u64, coin: Grains, target: u64) {
        f.quests
            .insert(Quest {
                id: id.into(),
                name: id.into(),
                xp_reward: xp,
                coin_reward: coin,
                target,
            })
            .unwrap();
    }

    #[test]
    fn xp_below_threshold_does_not_level() {
        let f = fixture();
        seed_account(&f, "acct:alice");

        let update = f.engine.add_experience("acct:alice", 100).unwrap();
        assert_eq!(update.old_level, 1);
        assert_eq!(update.new_level, 1);
        assert!(!update.leveled_up());
        assert!(update.reward_transactions.is_empty());
        assert_eq!(f.accounts.get("acct:alice").unwrap().balance, 0);
    }

    #[test]
    fn crossing_the_threshold_levels_and_pays() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        f.engine.add_experience("acct:alice", 100).unwrap();

        // 100 + 50 = 150 XP: level 2.
        let update = f.engine.add_experience("acct:alice", 50).unwrap();
        assert_eq!(update.new_level, 2);
        assert_eq!(update.reward_transactions.len(), 1);
        let tx = &update.reward_transactions[0];
        assert_eq!(tx.tx_type, TransactionType::LevelReward);
        assert_eq!(tx.amount, 110_000);
        assert_eq!(tx.reference.as_deref(), Some("level:2"));

        let alice = f.accounts.get("acct:alice").unwrap();
        assert_eq!(alice.level, 2);
        assert_eq!(alice.experience, 150);
        assert_eq!(alice.balance, 110_000);
    }

    #[test]
    fn multi_level_jump_pays_each_level() {
        let f = fixture();
        seed_account(&f, "acct:alice");

        // 300 XP clears the 150 and 225 thresholds but not 337.
        let update = f.engine.add_experience("acct:alice", 300).unwrap();
        assert_eq!(update.new_level, 3);
        assert_eq!(update.reward_transactions.len(), 2);
        assert_eq!(
            f.accounts.get("acct:alice").unwrap().balance,
            110_000 + 120_000
        );
    }

    #[test]
    fn repeated_grants_never_repay_a_level() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        f.engine.add_experience("acct:alice", 150).unwrap();
        let balance_after_levelup = f.accounts.get("acct:alice").unwrap().balance;

        // More XP within level 2: no new reward.
        let update = f.engine.add_experience("acct:alice", 10).unwrap();
        assert!(!update.leveled_up());
        assert_eq!(
            f.accounts.get("acct:alice").unwrap().balance,
            balance_after_levelup
        );
    }

    #[test]
    fn zero_xp_rejected() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        assert!(matches!(
            f.engine.add_experience("acct:alice", 0).unwrap_err(),
            RewardError::InvalidExperience { .. }
        ));
    }

    #[test]
    fn quest_completion_pays_coin_and_xp_once() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        seed_quest(&f, "quest:first-trade", 150, crowns(1), 1);

        f.engine.start_quest("acct:alice", "quest:first-trade").unwrap();
        let completion = f
            .engine
            .complete_quest("acct:alice", "quest:first-trade")
            .unwrap();

        assert_eq!(completion.xp_awarded, 150);
        let coin_tx = completion.coin_transaction.unwrap();
        assert_eq!(coin_tx.tx_type, TransactionType::QuestReward);
        assert_eq!(coin_tx.fee, 0);
        assert_eq!(
            coin_tx.reference.as_deref(),
            Some("quest:first-trade")
        );
        assert!(completion.progression.unwrap().leveled_up());

        // 1 crown quest coin + level 2 reward.
        let alice = f.accounts.get("acct:alice").unwrap();
        assert_eq!(alice.balance, crowns(1) + 110_000);
        assert_eq!(alice.level, 2);

        // The second completion pays nothing.
        assert!(matches!(
            f.engine
                .complete_quest("acct:alice", "quest:first-trade")
                .unwrap_err(),
            RewardError::QuestAlreadyCompleted { .. }
        ));
        assert_eq!(f.accounts.get("acct:alice").unwrap().balance, crowns(1) + 110_000);
    }

    #[test]
    fn quest_must_be_started_first() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        seed_quest(&f, "quest:q", 10, 0, 1);

        assert!(matches!(
            f.engine.complete_quest("acct:alice", "quest:q").unwrap_err(),
            RewardError::QuestNotStarted { .. }
        ));
    }

    #[test]
    fn quest_cannot_restart_after_completion() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        seed_quest(&f, "quest:q", 10, crowns(1), 1);

        f.engine.start_quest("acct:alice", "quest:q").unwrap();
        f.engine.complete_quest("acct:alice", "quest:q").unwrap();

        assert!(matches!(
            f.engine.start_quest("acct:alice", "quest:q").unwrap_err(),
            RewardError::QuestAlreadyCompleted { .. }
        ));
    }

    #[test]
    fn double_start_rejected() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        seed_quest(&f, "quest:q", 10, 0, 5);

        f.engine.start_quest("acct:alice", "quest:q").unwrap();
        assert!(matches!(
            f.engine.start_quest("acct:alice", "quest:q").unwrap_err(),
            RewardError::QuestAlreadyStarted { .. }
        ));
    }

    #[test]
    fn advance_completes_at_target() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        seed_quest(&f, "quest:gather", 10, crowns(1), 3);
        f.engine.start_quest("acct:alice", "quest:gather").unwrap();

        let out = f.engine.advance_progress("acct:alice", "quest:gather", 2).unwrap();
        match out {
            AdvanceOutcome::Advanced(p) => assert_eq!(p.progress_value, 2),
            other => panic!("expected advance, got {other:?}"),
        }

        let out = f.engine.advance_progress("acct:alice", "quest:gather", 1).unwrap();
        assert!(matches!(out, AdvanceOutcome::Completed(_)));
        assert_eq!(f.accounts.get("acct:alice").unwrap().balance, crowns(1));

        // Further advances are rejected.
        assert!(matches!(
            f.engine
                .advance_progress("acct:alice", "quest:gather", 1)
                .unwrap_err(),
            RewardError::QuestAlreadyCompleted { .. }
        ));
    }

    #[test]
    fn abandoned_quest_cannot_complete_or_restart() {
        let f = fixture();
        seed_account(&f, "acct:alice");
        seed_quest(&f, "quest:q", 10, crowns(1), 1);

        f.engine.start_quest("acct:alice", "quest:q").unwrap();
        f.engine.abandon_quest("acct:alice", "quest:q").unwrap();

        assert!(matches!(
            f.engine.complete_quest("acct:alice", "quest:q").unwrap_err(),
            RewardError::QuestAbandoned { .. }
        ));
        assert!(matches!(
            f.engine.start_quest("acct:alice", "quest:q").unwrap_err(),
            RewardError::QuestAlreadyStarted { .. }
        ));
        assert_eq!(f.accounts.get("acct:alice").unwrap().balance, 0);
    }

    #[test]
    fn concurrent_completion_pays_exactly_once() {
        use std::thread;

        let f = Arc::new(fixture());
        seed_account(&f, "acct:alice");
        seed_quest(&f, "quest:q", 0, crowns(1), 1);
        f.engine.start_quest("acct:alice", "quest:q").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let f = Arc::clone(&f);
                thread::spawn(move || f.engine.complete_quest("acct:alice", "quest:q").is_ok())
            })
            .collect();
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(wins, 1);
        assert_eq!(f.accounts.get("acct:alice").unwrap().balance, crowns(1));
    }
}
