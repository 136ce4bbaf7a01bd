//! Quest and progression entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::types::Grains;

// ---------------------------------------------------------------------------
// Quest
// ---------------------------------------------------------------------------

/// A quest definition: what a player must do and what completing it pays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    /// Stable quest identifier, e.g. `"quest:first-trade"`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Experience awarded on completion.
    pub xp_reward: u64,
    /// Currency awarded on completion, in grains.
    pub coin_reward: Grains,
    /// Progress units required to complete (1 for one-shot quests).
    pub target: u64,
}

// ---------------------------------------------------------------------------
// QuestProgress
// ---------------------------------------------------------------------------

/// Per-user progress state for one quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestProgressStatus {
    /// Started and accumulating progress.
    InProgress,
    /// Target reached and reward paid. One-way; set exactly once per
    /// `(user, quest)` pair.
    Completed,
    /// Given up. The pair cannot be restarted (the uniqueness record
    /// remains, preventing a second payout path).
    Abandoned,
}

impl fmt::Display for QuestProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Progress of one user through one quest, keyed by `(user_id, quest_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub user_id: String,
    pub quest_id: String,
    pub status: QuestProgressStatus,
    /// Units of progress accumulated so far.
    pub progress_value: u64,
    /// Units required, copied from the quest definition at start.
    pub target: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuestProgress {
    /// Creates a fresh `InProgress` record for a user starting a quest.
    pub fn start(user_id: impl Into<String>, quest: &Quest) -> Self {
        Self {
            user_id: user_id.into(),
            quest_id: quest.id.clone(),
            status: QuestProgressStatus::InProgress,
            progress_value: 0,
            target: quest.target,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether accumulated progress has reached the target.
    pub fn target_reached(&self) -> bool {
        self.progress_value >= self.target
    }
}
