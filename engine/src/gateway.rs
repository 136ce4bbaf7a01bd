//! # Payment Gateway
//!
//! Withdrawals hand value to an external payout provider. The [`PaymentGateway`]
//! trait is the seam: the ledger calls it before debiting the on-ledger
//! balance, so a declined or unreachable provider never leaves the account
//! short.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ledger::types::Grains;

/// Errors from the external payout provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider refused the payout. The withdrawal fails cleanly; the
    /// sender was never debited.
    #[error("payout declined: {reason}")]
    Declined { reason: String },

    /// No answer from the provider within the deadline. The payout may or
    /// may not have gone through, so the withdrawal is parked for manual
    /// review instead of failed.
    #[error("payout provider timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The provider is known to be down. Treated like a decline.
    #[error("payout provider unavailable")]
    Unavailable,
}

/// Provider acknowledgement of a settled payout.
#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    /// Provider-side reference for reconciliation.
    pub reference: String,
    /// When the provider confirmed settlement.
    pub settled_at: DateTime<Utc>,
}

/// External payout provider interface.
pub trait PaymentGateway: Send + Sync {
    /// Pays out `amount` grains worth of value on behalf of `account_id`.
    /// `reference` is the ledger transaction id, for provider-side
    /// idempotence and reconciliation.
    fn pay_out(
        &self,
        account_id: &str,
        amount: Grains,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError>;
}

/// A gateway that approves everything. Used in tests and local runs.
#[derive(Default)]
pub struct ApprovingGateway;

impl PaymentGateway for ApprovingGateway {
    fn pay_out(
        &self,
        _account_id: &str,
        _amount: Grains,
        reference: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        Ok(GatewayReceipt {
            reference: format!("mock-{reference}"),
            settled_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approving_gateway_echoes_reference() {
        let receipt = ApprovingGateway.pay_out("acct:alice", 100, "tx-1").unwrap();
        assert_eq!(receipt.reference, "mock-tx-1");
    }
}
