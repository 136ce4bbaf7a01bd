//! # Rewards & Progression
//!
//! The XP [`level`] curve, quest entities in [`types`], and the
//! [`engine`] that grants experience and pays quest rewards through the
//! ledger.

pub mod engine;
pub mod level;
pub mod types;

pub use engine::{
    AdvanceOutcome, ProgressionUpdate, QuestCompletion, RewardEngine, RewardError,
};
pub use level::{level_for_xp, level_reward};
pub use types::{Quest, QuestProgress, QuestProgressStatus};
