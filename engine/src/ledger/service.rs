//! # Ledger Service
//!
//! The single authority over balance mutation. Every crown that moves in
//! the economy — transfers, marketplace settlements, quest and level
//! rewards, withdrawals, refunds — moves through [`Ledger::process`], under
//! the per-account lock table, with a versioned write to the account store
//! and an append to the transaction audit log.
//!
//! Lifecycle: [`Ledger::create`] validates and records a `Pending`
//! transaction; [`Ledger::process`] scores it for fraud, runs the external
//! payout for withdrawals, and performs the atomic debit/credit;
//! [`Ledger::cancel`] withdraws it before settlement; [`Ledger::refund`]
//! reverses a completed transaction with a new `Refund` transaction.
//!
//! Every state transition on a single transaction is serialized on a
//! per-transaction lock: a retried `process`, a racing cancel or refund,
//! and the expiry sweep all observe the settled record instead of
//! settling it again.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config;
use crate::gateway::{GatewayError, PaymentGateway};
use crate::ledger::fees;
use crate::ledger::fraud::{RiskAssessor, RiskError};
use crate::ledger::types::{Grains, Transaction, TransactionStatus, TransactionType};
use crate::locks::LockTable;
use crate::store::{AccountStore, StoreError, TransactionStore};

// ---------------------------------------------------------------------------
// Errors & outcomes
// ---------------------------------------------------------------------------

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amounts must be strictly positive (and fit signed 64-bit math).
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: Grains },

    /// A required party is absent for this transaction type.
    #[error("{tx_type} transaction requires a {party}")]
    MissingParty {
        party: &'static str,
        tx_type: TransactionType,
    },

    /// Sender and recipient are the same account.
    #[error("sender and recipient are the same account: {id}")]
    SelfTransfer { id: String },

    /// The computed fee would consume the whole amount.
    #[error("fee {fee} exceeds amount {amount}")]
    FeeExceedsAmount { amount: Grains, fee: Grains },

    /// The account is frozen and cannot participate.
    #[error("account is locked: {id}")]
    AccountLocked { id: String },

    /// The sender cannot cover the debit.
    #[error("insufficient balance on {id}: {balance} grains available, {required} required")]
    InsufficientBalance {
        id: String,
        balance: Grains,
        required: Grains,
    },

    /// The transaction is not in a state that admits this operation.
    #[error("invalid transaction state: {current}, expected {expected}")]
    InvalidState {
        current: TransactionStatus,
        expected: &'static str,
    },

    /// The pending deadline passed before processing.
    #[error("transaction expired: {id}")]
    Expired { id: String },

    /// A refund request exceeds what remains refundable.
    #[error("refund of {requested} exceeds refundable remainder {remaining}")]
    RefundExceedsRemaining {
        remaining: Grains,
        requested: Grains,
    },

    /// The external payout provider rejected a withdrawal.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Storage-layer failure (includes retryable version conflicts that
    /// outlasted the bounded retry).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What [`Ledger::process`] did with the transaction.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Balances moved; the transaction is settled.
    Completed(Transaction),
    /// Fraud scoring (or an assessor/gateway timeout) parked the
    /// transaction for a human. It remains `Pending`.
    HeldForReview(Transaction),
    /// The transaction had already reached a settled terminal state.
    /// Replay-safe no-op.
    AlreadySettled(Transaction),
}

/// Transaction locks share the table with account and listing keys; the
/// prefix keeps the namespaces disjoint.
fn tx_lock_key(tx_id: &str) -> String {
    format!("tx/{tx_id}")
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The transaction ledger. Shared across engines behind an `Arc`; all
/// methods take `&self`.
pub struct Ledger {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
    risk: Arc<dyn RiskAssessor>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    locks: Arc<LockTable>,
}

impl Ledger {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        risk: Arc<dyn RiskAssessor>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            accounts,
            transactions,
            risk,
            gateway,
            locks,
        }
    }

    /// Read access to a transaction record.
    pub fn transaction(&self, id: &str) -> Result<Transaction, LedgerError> {
        Ok(self.transactions.get(id)?)
    }

    // -----------------------------------------------------------------------
    // create
    // -----------------------------------------------------------------------

    /// Validates and records a new `Pending` transaction. No balances move
    /// here; the fee is computed and locked in at creation time.
    pub fn create(
        &self,
        sender_id: Option<&str>,
        recipient_id: Option<&str>,
        amount: Grains,
        tx_type: TransactionType,
        reference: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        if amount == 0 || amount > i64::MAX as u64 {
            return Err(LedgerError::InvalidAmount { amount });
        }

        match sender_id {
            None if !tx_type.allows_missing_sender() => {
                return Err(LedgerError::MissingParty {
                    party: "sender",
                    tx_type,
                })
            }
            Some(id) => {
                let sender = self.accounts.get(id)?;
                if sender.locked {
                    return Err(LedgerError::AccountLocked { id: id.to_string() });
                }
            }
            None => {}
        }

        match recipient_id {
            None if !tx_type.allows_missing_recipient() => {
                return Err(LedgerError::MissingParty {
                    party: "recipient",
                    tx_type,
                })
            }
            Some(id) => {
                let recipient = self.accounts.get(id)?;
                if recipient.locked {
                    return Err(LedgerError::AccountLocked { id: id.to_string() });
                }
            }
            None => {}
        }

        if let (Some(s), Some(r)) = (sender_id, recipient_id) {
            if s == r {
                return Err(LedgerError::SelfTransfer { id: s.to_string() });
            }
        }

        let fee = fees::fee_for(tx_type, amount);
        if fee >= amount {
            return Err(LedgerError::FeeExceedsAmount { amount, fee });
        }

        let tx = Transaction::new(
            sender_id.map(str::to_string),
            recipient_id.map(str::to_string),
            amount,
            fee,
            tx_type,
            reference,
        );
        self.transactions.save(&tx)?;

        info!(
            tx_id = %tx.id,
            tx_type = %tx_type,
            amount,
            fee,
            "transaction created"
        );
        Ok(tx)
    }

    // -----------------------------------------------------------------------
    // process
    // -----------------------------------------------------------------------

    /// Settles a pending transaction: fraud scoring, the external payout
    /// where applicable, then the atomic debit/credit under the account
    /// locks. Idempotent on settled transactions.
    pub fn process(&self, tx_id: &str) -> Result<ProcessOutcome, LedgerError> {
        // The status check and the settlement must be one critical section
        // per transaction, or a retried request moves money twice.
        self.locks
            .with_key(&tx_lock_key(tx_id), || self.process_locked(tx_id))
    }

    fn process_locked(&self, tx_id: &str) -> Result<ProcessOutcome, LedgerError> {
        let mut tx = self.transactions.get(tx_id)?;

        match tx.status {
            TransactionStatus::Completed
            | TransactionStatus::Failed
            | TransactionStatus::Refunded => {
                return Ok(ProcessOutcome::AlreadySettled(tx));
            }
            TransactionStatus::Cancelled => {
                return Err(LedgerError::InvalidState {
                    current: tx.status,
                    expected: "pending",
                });
            }
            TransactionStatus::Pending | TransactionStatus::Processing => {}
        }

        let now = Utc::now();
        if tx.is_expired(now) {
            tx.status = TransactionStatus::Failed;
            tx.failure_reason = Some("expired before processing".to_string());
            self.transactions.save(&tx)?;
            return Err(LedgerError::Expired { id: tx.id });
        }

        // A previously held transaction stays held until a reviewer
        // releases it.
        if tx.requires_manual_review {
            return Ok(ProcessOutcome::HeldForReview(tx));
        }

        if tx.tx_type.is_sender_spend() && tx.risk_score.is_none() {
            match self.risk.assess(&tx) {
                Ok(score) => {
                    tx.risk_score = Some(score);
                    if score > config::RISK_REVIEW_THRESHOLD {
                        tx.requires_manual_review = true;
                        self.transactions.save(&tx)?;
                        warn!(tx_id = %tx.id, score, "transaction held for manual review");
                        return Ok(ProcessOutcome::HeldForReview(tx));
                    }
                    self.transactions.save(&tx)?;
                }
                Err(RiskError::Timeout { elapsed_ms }) => {
                    // Never process unscored.
                    tx.requires_manual_review = true;
                    self.transactions.save(&tx)?;
                    warn!(tx_id = %tx.id, elapsed_ms, "risk assessor timed out; holding");
                    return Ok(ProcessOutcome::HeldForReview(tx));
                }
                Err(RiskError::Store(e)) => return Err(e.into()),
            }
        }

        self.settle(tx)
    }

    /// Clears a manual-review hold and settles the transaction. Reviewer
    /// operation; the risk score stays on the record.
    pub fn release_review(&self, tx_id: &str) -> Result<ProcessOutcome, LedgerError> {
        self.locks.with_key(&tx_lock_key(tx_id), || {
            let mut tx = self.transactions.get(tx_id)?;
            if tx.status != TransactionStatus::Pending || !tx.requires_manual_review {
                return Err(LedgerError::InvalidState {
                    current: tx.status,
                    expected: "pending under manual review",
                });
            }
            tx.requires_manual_review = false;
            self.transactions.save(&tx)?;
            info!(tx_id = %tx.id, "manual review hold released");
            self.settle(tx)
        })
    }

    /// The atomic settlement path: external payout for withdrawals, then
    /// debit + credit under the lock table.
    fn settle(&self, mut tx: Transaction) -> Result<ProcessOutcome, LedgerError> {
        tx.status = TransactionStatus::Processing;
        self.transactions.save(&tx)?;

        // Withdrawals clear the external provider before any balance moves,
        // so a decline leaves the ledger untouched.
        if tx.tx_type == TransactionType::Withdrawal {
            if let Some(gateway) = &self.gateway {
                let sender = tx.sender_id.as_deref().unwrap_or_default();
                match gateway.pay_out(sender, tx.net_amount, &tx.id) {
                    Ok(receipt) => {
                        info!(tx_id = %tx.id, provider_ref = %receipt.reference, "payout settled");
                    }
                    Err(GatewayError::Timeout { elapsed_ms }) => {
                        // Unknown provider state; a human reconciles.
                        tx.status = TransactionStatus::Pending;
                        tx.requires_manual_review = true;
                        self.transactions.save(&tx)?;
                        warn!(tx_id = %tx.id, elapsed_ms, "payout timed out; holding");
                        return Ok(ProcessOutcome::HeldForReview(tx));
                    }
                    Err(e) => {
                        tx.status = TransactionStatus::Failed;
                        tx.failure_reason = Some(e.to_string());
                        self.transactions.save(&tx)?;
                        return Err(e.into());
                    }
                }
            }
        }

        let sender = tx.sender_id.clone();
        let recipient = tx.recipient_id.clone();
        let result = self
            .locks
            .with_optional_pair(sender.as_deref(), recipient.as_deref(), || {
                self.move_balances(&mut tx)
            });

        match result {
            Ok(()) => {
                tx.status = TransactionStatus::Completed;
                tx.completed_at = Some(Utc::now());
                self.transactions.save(&tx)?;
                info!(
                    tx_id = %tx.id,
                    tx_type = %tx.tx_type,
                    amount = tx.amount,
                    fee = tx.fee,
                    "transaction completed"
                );
                Ok(ProcessOutcome::Completed(tx))
            }
            Err(e) => {
                tx.status = TransactionStatus::Failed;
                tx.failure_reason = Some(e.to_string());
                self.transactions.save(&tx)?;
                Err(e)
            }
        }
    }

    /// Debit the sender the gross amount, credit the recipient the net.
    /// Runs inside the lock-table critical section.
    fn move_balances(&self, tx: &mut Transaction) -> Result<(), LedgerError> {
        if let Some(sender_id) = tx.sender_id.clone() {
            let (before, after) = self.debit(&sender_id, tx.amount)?;
            tx.sender_balance_before = Some(before);
            tx.sender_balance_after = Some(after);
        }

        if let Some(recipient_id) = tx.recipient_id.clone() {
            match self.credit(&recipient_id, tx.net_amount) {
                Ok((before, after)) => {
                    tx.recipient_balance_before = Some(before);
                    tx.recipient_balance_after = Some(after);
                }
                Err(e) => {
                    // Compensate the debit so money is conserved even when
                    // the credit side fails.
                    if let Some(sender_id) = tx.sender_id.clone() {
                        if let Err(comp) = self.credit(&sender_id, tx.amount) {
                            warn!(
                                tx_id = %tx.id,
                                error = %comp,
                                "compensating re-credit failed; ledger requires reconciliation"
                            );
                        }
                        tx.sender_balance_before = None;
                        tx.sender_balance_after = None;
                    }
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn debit(&self, id: &str, amount: Grains) -> Result<(Grains, Grains), LedgerError> {
        let mut last_conflict = None;
        for _ in 0..config::MAX_CAS_RETRIES {
            let account = self.accounts.get(id)?;
            if account.locked {
                return Err(LedgerError::AccountLocked { id: id.to_string() });
            }
            if account.balance < amount {
                return Err(LedgerError::InsufficientBalance {
                    id: id.to_string(),
                    balance: account.balance,
                    required: amount,
                });
            }
            match self
                .accounts
                .apply_balance_delta(id, -(amount as i64), account.version)
            {
                Ok(updated) => return Ok((account.balance, updated.balance)),
                Err(e @ StoreError::VersionConflict { .. }) => last_conflict = Some(e),
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_conflict
            .expect("retry loop ran at least once")
            .into())
    }

    fn credit(&self, id: &str, amount: Grains) -> Result<(Grains, Grains), LedgerError> {
        let mut last_conflict = None;
        for _ in 0..config::MAX_CAS_RETRIES {
            let account = self.accounts.get(id)?;
            match self
                .accounts
                .apply_balance_delta(id, amount as i64, account.version)
            {
                Ok(updated) => return Ok((account.balance, updated.balance)),
                Err(e @ StoreError::VersionConflict { .. }) => last_conflict = Some(e),
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_conflict
            .expect("retry loop ran at least once")
            .into())
    }

    // -----------------------------------------------------------------------
    // cancel
    // -----------------------------------------------------------------------

    /// Withdraws a transaction before settlement. No balance effect. The
    /// caller-supplied reason lands on the record for the audit trail.
    pub fn cancel(&self, tx_id: &str, reason: Option<&str>) -> Result<Transaction, LedgerError> {
        self.locks.with_key(&tx_lock_key(tx_id), || {
            let mut tx = self.transactions.get(tx_id)?;
            if tx.status.is_terminal() {
                return Err(LedgerError::InvalidState {
                    current: tx.status,
                    expected: "pending or processing",
                });
            }
            tx.status = TransactionStatus::Cancelled;
            tx.reason = reason.map(str::to_string);
            self.transactions.save(&tx)?;
            info!(tx_id = %tx.id, reason = reason.unwrap_or("none given"), "transaction cancelled");
            Ok(tx)
        })
    }

    // -----------------------------------------------------------------------
    // refund
    // -----------------------------------------------------------------------

    /// Reverses value from a completed transaction back to its sender via a
    /// new, immediately processed `Refund` transaction. `amount` of `None`
    /// refunds everything still refundable. Partial refunds accumulate; the
    /// original flips to `Refunded` only when its full net amount has been
    /// returned. The caller-supplied reason lands on the refund record.
    pub fn refund(
        &self,
        original_tx_id: &str,
        amount: Option<Grains>,
        reason: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        // Serialized on the original's lock so two refunds cannot read the
        // same refunded_amount and together evade the cumulative cap.
        self.locks.with_key(&tx_lock_key(original_tx_id), || {
            self.refund_locked(original_tx_id, amount, reason)
        })
    }

    fn refund_locked(
        &self,
        original_tx_id: &str,
        amount: Option<Grains>,
        reason: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let mut original = self.transactions.get(original_tx_id)?;

        if original.status != TransactionStatus::Completed {
            return Err(LedgerError::InvalidState {
                current: original.status,
                expected: "completed",
            });
        }
        let (Some(sender), Some(recipient)) =
            (original.sender_id.clone(), original.recipient_id.clone())
        else {
            // One-sided transactions (system credits, withdrawals) have no
            // on-ledger counterparty to pull the value back from.
            return Err(LedgerError::MissingParty {
                party: "counterparty",
                tx_type: original.tx_type,
            });
        };

        let remaining = original.refundable_remaining();
        let amount = amount.unwrap_or(remaining);
        if amount == 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        if amount > remaining {
            return Err(LedgerError::RefundExceedsRemaining {
                remaining,
                requested: amount,
            });
        }

        // The refund flows recipient -> sender, fee-free, and settles
        // immediately. Refunds are not fraud-scored.
        let mut refund = self.create(
            Some(&recipient),
            Some(&sender),
            amount,
            TransactionType::Refund,
            Some(original.id.clone()),
        )?;
        if let Some(reason) = reason {
            refund.reason = Some(reason.to_string());
            self.transactions.save(&refund)?;
        }
        // The refund's own lock nests inside the original's; the keys are
        // distinct ids, so the pair never self-deadlocks.
        let outcome = self.process(&refund.id)?;
        let refund = match outcome {
            ProcessOutcome::Completed(tx) => tx,
            // Refunds carry no risk hold and are freshly created; anything
            // else here is a logic error surfaced as state mismatch.
            ProcessOutcome::HeldForReview(tx) | ProcessOutcome::AlreadySettled(tx) => {
                return Err(LedgerError::InvalidState {
                    current: tx.status,
                    expected: "completed refund",
                });
            }
        };

        original.refunded_amount += amount;
        if original.refunded_amount >= original.net_amount {
            original.status = TransactionStatus::Refunded;
        }
        self.transactions.save(&original)?;

        info!(
            original_tx = %original.id,
            refund_tx = %refund.id,
            amount,
            fully_refunded = original.status == TransactionStatus::Refunded,
            "refund completed"
        );
        Ok(refund)
    }

    // -----------------------------------------------------------------------
    // sweep
    // -----------------------------------------------------------------------

    /// Fails every pending transaction whose deadline has passed. Returns
    /// the failed transactions. Called by the node's periodic sweep.
    pub fn fail_expired(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut failed = Vec::new();
        for candidate in self.transactions.find_pending_expired(now)? {
            let swept = self.locks.with_key(&tx_lock_key(&candidate.id), || {
                // Re-read under the lock; a racing process or cancel may
                // have moved the transaction on since the scan.
                let mut tx = self.transactions.get(&candidate.id)?;
                if tx.status != TransactionStatus::Pending || !tx.is_expired(now) {
                    return Ok::<_, LedgerError>(None);
                }
                tx.status = TransactionStatus::Failed;
                tx.failure_reason = Some("expired before processing".to_string());
                self.transactions.save(&tx)?;
                info!(tx_id = %tx.id, "expired transaction failed by sweep");
                Ok(Some(tx))
            })?;
            if let Some(tx) = swept {
                failed.push(tx);
            }
        }
        Ok(failed)
    }
}
