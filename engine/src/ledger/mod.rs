//! # Transaction Ledger
//!
//! The system of record for every value movement. Submodules: entity
//! [`types`], the [`fees`] schedule, [`fraud`] scoring, and the
//! [`service`] state machine that ties them together.

pub mod fees;
pub mod fraud;
pub mod service;
pub mod types;

pub use fraud::{HeuristicRiskAssessor, RiskAssessor, RiskError};
pub use service::{Ledger, LedgerError, ProcessOutcome};
pub use types::{Grains, Transaction, TransactionStatus, TransactionType};
