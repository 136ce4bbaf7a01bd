//! Core type definitions for ledger transactions.
//!
//! These types form the vocabulary of every value movement in the economy.
//! Amounts are integer grains throughout (see [`crate::config`]) and the
//! transaction record is append-only: once created it is only ever mutated
//! by the ledger's own state transitions, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config;

/// A monetary quantity in grains, the smallest indivisible currency unit.
pub type Grains = u64;

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// Discriminant for the operation a transaction represents.
///
/// The type determines the fee schedule, which parties are required, and
/// whether fraud scoring applies before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Peer-to-peer value transfer between two accounts.
    Transfer,
    /// System-issued quest completion reward (no sender).
    QuestReward,
    /// System-issued level-up reward (no sender).
    LevelReward,
    /// Marketplace sale settled from buyer to seller.
    MarketplacePurchase,
    /// Value leaving the ledger to an external destination (no recipient).
    Withdrawal,
    /// Reversal of a previously completed transaction.
    Refund,
    /// Operator-initiated balance correction.
    AdminAdjustment,
}

impl TransactionType {
    /// Transaction types that require an existing sender whose balance is
    /// debited. These are the only types subject to fraud scoring.
    pub fn is_sender_spend(&self) -> bool {
        matches!(
            self,
            Self::Transfer | Self::MarketplacePurchase | Self::Withdrawal
        )
    }

    /// Types allowed to omit the sender (system-issued credits).
    pub fn allows_missing_sender(&self) -> bool {
        matches!(
            self,
            Self::QuestReward | Self::LevelReward | Self::AdminAdjustment
        )
    }

    /// Types allowed to omit the recipient (value leaving the ledger).
    pub fn allows_missing_recipient(&self) -> bool {
        matches!(self, Self::Withdrawal)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "transfer"),
            Self::QuestReward => write!(f, "quest_reward"),
            Self::LevelReward => write!(f, "level_reward"),
            Self::MarketplacePurchase => write!(f, "marketplace_purchase"),
            Self::Withdrawal => write!(f, "withdrawal"),
            Self::Refund => write!(f, "refund"),
            Self::AdminAdjustment => write!(f, "admin_adjustment"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a transaction.
///
/// Transitions are monotonic and one-directional:
///
/// ```text
/// pending -> processing -> { completed | failed }
/// pending | processing -> cancelled
/// completed -> refunded          (only via a full refund)
/// ```
///
/// `Completed`, `Failed`, `Cancelled`, and `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created and validated, awaiting processing (or manual review).
    Pending,
    /// The atomic balance mutation is underway.
    Processing,
    /// Balances were mutated; the transaction is settled.
    Completed,
    /// Validation or a business rule rejected the transaction. Terminal.
    Failed,
    /// Withdrawn before processing. No balance effect.
    Cancelled,
    /// A completed transaction that has been fully reversed.
    Refunded,
}

impl TransactionStatus {
    /// Terminal states admit no further transitions (refund of a completed
    /// transaction creates a *new* transaction; it does not reopen this one).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A single ledger transaction — the append-only audit record of one value
/// movement.
///
/// Invariant: `net_amount = amount - fee` at all times. The recipient is
/// credited `net_amount`; the sender is debited the full `amount`; the fee
/// is burned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Debited account. `None` for system-issued credits.
    pub sender_id: Option<String>,
    /// Credited account. `None` for withdrawals.
    pub recipient_id: Option<String>,
    /// Gross amount in grains. Always > 0.
    pub amount: Grains,
    /// Platform fee in grains, per the schedule in [`crate::ledger::fees`].
    pub fee: Grains,
    /// Amount actually credited to the recipient: `amount - fee`.
    pub net_amount: Grains,
    /// What kind of movement this is.
    pub tx_type: TransactionType,
    /// Current lifecycle state.
    pub status: TransactionStatus,
    /// Fraud risk score recorded at processing time, 0-100.
    pub risk_score: Option<u8>,
    /// Set when the risk score (or an assessor timeout) parks the
    /// transaction for a human reviewer. The transaction stays `Pending`.
    pub requires_manual_review: bool,
    /// Opaque link to the triggering entity (quest id, listing id,
    /// original transaction id for refunds).
    pub reference: Option<String>,
    /// Why the transaction failed, when it did.
    pub failure_reason: Option<String>,
    /// Caller-supplied audit reason, recorded on cancellations and on
    /// refund transactions.
    pub reason: Option<String>,
    /// Cumulative grains refunded against this transaction so far.
    pub refunded_amount: Grains,
    /// Sender balance snapshot immediately before the debit.
    pub sender_balance_before: Option<Grains>,
    /// Sender balance snapshot immediately after the debit.
    pub sender_balance_after: Option<Grains>,
    /// Recipient balance snapshot immediately before the credit.
    pub recipient_balance_before: Option<Grains>,
    /// Recipient balance snapshot immediately after the credit.
    pub recipient_balance_after: Option<Grains>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Deadline after which a still-pending transaction is swept to failed.
    pub expires_at: DateTime<Utc>,
    /// Settlement timestamp, set exactly once on completion.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Builds a new pending transaction. Callers go through
    /// [`crate::ledger::Ledger::create`], which validates parties and
    /// amounts before constructing this record.
    pub(crate) fn new(
        sender_id: Option<String>,
        recipient_id: Option<String>,
        amount: Grains,
        fee: Grains,
        tx_type: TransactionType,
        reference: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id,
            recipient_id,
            amount,
            fee,
            net_amount: amount - fee,
            tx_type,
            status: TransactionStatus::Pending,
            risk_score: None,
            requires_manual_review: false,
            reference,
            failure_reason: None,
            reason: None,
            refunded_amount: 0,
            sender_balance_before: None,
            sender_balance_after: None,
            recipient_balance_before: None,
            recipient_balance_after: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(config::PENDING_TX_TTL_HOURS),
            completed_at: None,
        }
    }

    /// Whether the pending deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == TransactionStatus::Pending && now > self.expires_at
    }

    /// Net amount still refundable against this transaction.
    pub fn refundable_remaining(&self) -> Grains {
        self.net_amount.saturating_sub(self.refunded_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction::new(
            Some("acct:alice".into()),
            Some("acct:bob".into()),
            1_000_000,
            10_000,
            TransactionType::Transfer,
            None,
        )
    }

    #[test]
    fn net_amount_is_amount_minus_fee() {
        let tx = sample_tx();
        assert_eq!(tx.net_amount, tx.amount - tx.fee);
        assert_eq!(tx.net_amount, 990_000);
    }

    #[test]
    fn new_transaction_is_pending_with_expiry() {
        let tx = sample_tx();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.expires_at > tx.created_at);
        assert!(!tx.requires_manual_review);
        assert_eq!(tx.refunded_amount, 0);
    }

    #[test]
    fn expiry_check_respects_status() {
        let mut tx = sample_tx();
        let past = Utc::now() + chrono::Duration::days(2);
        assert!(tx.is_expired(past));

        tx.status = TransactionStatus::Completed;
        assert!(!tx.is_expired(past));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
        assert!(TransactionStatus::Refunded.is_terminal());
    }

    #[test]
    fn sender_spend_classification() {
        assert!(TransactionType::Transfer.is_sender_spend());
        assert!(TransactionType::MarketplacePurchase.is_sender_spend());
        assert!(TransactionType::Withdrawal.is_sender_spend());
        assert!(!TransactionType::QuestReward.is_sender_spend());
        assert!(!TransactionType::Refund.is_sender_spend());
    }

    #[test]
    fn party_requirements_by_type() {
        assert!(TransactionType::QuestReward.allows_missing_sender());
        assert!(TransactionType::LevelReward.allows_missing_sender());
        assert!(TransactionType::Withdrawal.allows_missing_recipient());
        assert!(!TransactionType::Transfer.allows_missing_sender());
        assert!(!TransactionType::Transfer.allows_missing_recipient());
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&TransactionStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let json = serde_json::to_string(&TransactionType::MarketplacePurchase).unwrap();
        assert_eq!(json, "\"marketplace_purchase\"");
    }

    #[test]
    fn refundable_remaining_tracks_partials() {
        let mut tx = sample_tx();
        assert_eq!(tx.refundable_remaining(), 990_000);
        tx.refunded_amount = 400_000;
        assert_eq!(tx.refundable_remaining(), 590_000);
        tx.refunded_amount = 990_000;
        assert_eq!(tx.refundable_remaining(), 0);
    }
}
