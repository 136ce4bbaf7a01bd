//! # Fraud Scoring
//!
//! Every sender-spend transaction gets a risk score in `[0, 100]` before its
//! balances move. Scores above [`crate::config::RISK_REVIEW_THRESHOLD`] park
//! the transaction in manual review; everything else proceeds.
//!
//! The bundled [`HeuristicRiskAssessor`] is deliberately simple: three
//! additive components (amount size, account age, sender velocity), no
//! model, no network calls. The [`RiskAssessor`] trait is the seam for a
//! real scoring service; a timeout there fails safe into manual review
//! rather than letting the transaction through unscored.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::debug;

use crate::config;
use crate::ledger::types::Transaction;
use crate::store::{AccountStore, StoreError, TransactionStore};

// ---------------------------------------------------------------------------
// Trait & errors
// ---------------------------------------------------------------------------

/// Errors from a risk assessor.
#[derive(Debug, Error)]
pub enum RiskError {
    /// The assessor did not answer in time. The ledger treats this as a
    /// maximal score: hold for review, never process unscored.
    #[error("risk assessment timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The assessor could not read the data it needs.
    #[error("risk assessment storage error: {0}")]
    Store(#[from] StoreError),
}

/// Scores a transaction's fraud risk before processing.
pub trait RiskAssessor: Send + Sync {
    /// Returns a score in `[0, 100]`. Higher means riskier.
    fn assess(&self, tx: &Transaction) -> Result<u8, RiskError>;
}

// ---------------------------------------------------------------------------
// Heuristic assessor
// ---------------------------------------------------------------------------

// Component weights. Each component contributes at most its top tier;
// the sum is clamped to 100.

const AMOUNT_LARGE_GRAINS: u64 = 1_000 * config::GRAINS_PER_CROWN;
const AMOUNT_MEDIUM_GRAINS: u64 = 100 * config::GRAINS_PER_CROWN;
const AMOUNT_SMALL_GRAINS: u64 = 10 * config::GRAINS_PER_CROWN;

const AMOUNT_LARGE_SCORE: u8 = 35;
const AMOUNT_MEDIUM_SCORE: u8 = 20;
const AMOUNT_SMALL_SCORE: u8 = 5;

const ACCOUNT_NEW_SCORE: u8 = 30; // younger than a day
const ACCOUNT_YOUNG_SCORE: u8 = 15; // younger than a week

const VELOCITY_HIGH_COUNT: usize = 10;
const VELOCITY_MEDIUM_COUNT: usize = 5;
const VELOCITY_LOW_COUNT: usize = 3;

const VELOCITY_HIGH_SCORE: u8 = 35;
const VELOCITY_MEDIUM_SCORE: u8 = 20;
const VELOCITY_LOW_SCORE: u8 = 10;

/// Additive three-component heuristic: transaction size, sender account
/// age, and how many transactions the sender initiated in the last hour.
pub struct HeuristicRiskAssessor {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
}

impl HeuristicRiskAssessor {
    pub fn new(accounts: Arc<dyn AccountStore>, transactions: Arc<dyn TransactionStore>) -> Self {
        Self {
            accounts,
            transactions,
        }
    }

    fn amount_component(amount: u64) -> u8 {
        if amount >= AMOUNT_LARGE_GRAINS {
            AMOUNT_LARGE_SCORE
        } else if amount >= AMOUNT_MEDIUM_GRAINS {
            AMOUNT_MEDIUM_SCORE
        } else if amount >= AMOUNT_SMALL_GRAINS {
            AMOUNT_SMALL_SCORE
        } else {
            0
        }
    }

    fn velocity_component(count: usize) -> u8 {
        if count >= VELOCITY_HIGH_COUNT {
            VELOCITY_HIGH_SCORE
        } else if count >= VELOCITY_MEDIUM_COUNT {
            VELOCITY_MEDIUM_SCORE
        } else if count >= VELOCITY_LOW_COUNT {
            VELOCITY_LOW_SCORE
        } else {
            0
        }
    }
}

impl RiskAssessor for HeuristicRiskAssessor {
    fn assess(&self, tx: &Transaction) -> Result<u8, RiskError> {
        // Only sender-spend types are scored; the ledger should not be
        // calling us for anything else, but score 0 is the right answer
        // for a system credit regardless.
        let Some(sender_id) = tx.sender_id.as_deref() else {
            return Ok(0);
        };

        let mut score = Self::amount_component(tx.amount) as u32;

        let sender = self.accounts.get(sender_id)?;
        let age = Utc::now() - sender.created_at;
        if age < Duration::days(1) {
            score += ACCOUNT_NEW_SCORE as u32;
        } else if age < Duration::days(7) {
            score += ACCOUNT_YOUNG_SCORE as u32;
        }

        let since = Utc::now() - Duration::hours(1);
        let recent = self.transactions.find_recent(sender_id, since)?;
        // The transaction under assessment is already saved; don't count it
        // against its own sender.
        let velocity = recent.iter().filter(|t| t.id != tx.id).count();
        score += Self::velocity_component(velocity) as u32;

        let score = score.min(100) as u8;
        debug!(
            tx_id = %tx.id,
            sender = sender_id,
            score,
            "risk assessment complete"
        );
        Ok(score)
    }
}
