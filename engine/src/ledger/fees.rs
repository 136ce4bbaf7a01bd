//! # Fee Schedule
//!
//! The platform fee is a pure function of `(transaction type, amount)`.
//! Same inputs, same fee, forever — the schedule constants live in
//! [`crate::config`] and nothing here reads a clock, a store, or anything
//! else that could make two identical calls disagree.
//!
//! All math is integer grains with floor division. The percentage tiers:
//!
//! | Type                 | Fee                  |
//! |----------------------|----------------------|
//! | transfer             | 1%, min 0.01 crown   |
//! | marketplace purchase | 2.5%                 |
//! | withdrawal           | 2%, min 0.1 crown    |
//! | everything else      | 0                    |

use crate::config;
use crate::ledger::types::{Grains, TransactionType};

/// Computes the platform fee in grains for a transaction.
///
/// The returned fee may equal or exceed `amount` for tiny amounts (the
/// minimums dominate); [`crate::ledger::Ledger::create`] rejects those
/// transactions rather than producing a non-positive net amount.
pub fn fee_for(tx_type: TransactionType, amount: Grains) -> Grains {
    match tx_type {
        TransactionType::Transfer => percentage(amount, config::TRANSFER_FEE_BPS)
            .max(config::TRANSFER_MIN_FEE_GRAINS),
        TransactionType::MarketplacePurchase => {
            percentage(amount, config::MARKETPLACE_FEE_BPS)
        }
        TransactionType::Withdrawal => percentage(amount, config::WITHDRAWAL_FEE_BPS)
            .max(config::WITHDRAWAL_MIN_FEE_GRAINS),
        TransactionType::QuestReward
        | TransactionType::LevelReward
        | TransactionType::Refund
        | TransactionType::AdminAdjustment => 0,
    }
}

/// Floor-division basis-point percentage. Saturates on overflow; amounts
/// anywhere near that range are rejected long before fee computation.
fn percentage(amount: Grains, bps: u64) -> Grains {
    amount
        .checked_mul(bps)
        .map(|scaled| scaled / config::BPS_DENOMINATOR)
        .unwrap_or_else(|| (amount / config::BPS_DENOMINATOR).saturating_mul(bps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::crowns;

    #[test]
    fn transfer_fee_is_one_percent() {
        // 10 crowns -> 0.10 crown fee.
        assert_eq!(fee_for(TransactionType::Transfer, crowns(10)), 100_000);
        // 100 crowns -> 1 crown.
        assert_eq!(fee_for(TransactionType::Transfer, crowns(100)), crowns(1));
    }

    #[test]
    fn transfer_fee_minimum_applies_to_small_amounts() {
        // 1% of 0.5 crown = 0.005 crown, below the 0.01 crown floor.
        assert_eq!(fee_for(TransactionType::Transfer, 500_000), 10_000);
    }

    #[test]
    fn marketplace_fee_is_two_and_a_half_percent() {
        assert_eq!(
            fee_for(TransactionType::MarketplacePurchase, crowns(40)),
            crowns(1)
        );
        // No minimum on marketplace fees.
        assert_eq!(fee_for(TransactionType::MarketplacePurchase, 1_000), 25);
    }

    #[test]
    fn withdrawal_fee_is_two_percent_with_minimum() {
        assert_eq!(fee_for(TransactionType::Withdrawal, crowns(100)), crowns(2));
        // 2% of 1 crown = 0.02 crown, below the 0.1 crown floor.
        assert_eq!(fee_for(TransactionType::Withdrawal, crowns(1)), 100_000);
    }

    #[test]
    fn reward_types_are_free() {
        for t in [
            TransactionType::QuestReward,
            TransactionType::LevelReward,
            TransactionType::Refund,
            TransactionType::AdminAdjustment,
        ] {
            assert_eq!(fee_for(t, crowns(1_000)), 0, "{t} should carry no fee");
        }
    }

    #[test]
    fn fee_is_deterministic() {
        for _ in 0..10 {
            assert_eq!(
                fee_for(TransactionType::Transfer, 123_456_789),
                fee_for(TransactionType::Transfer, 123_456_789)
            );
        }
    }

    #[test]
    fn fee_rounds_down() {
        // 1% of 99 grains floors to 0, so the minimum kicks in.
        assert_eq!(fee_for(TransactionType::Transfer, 99), 10_000);
        // 2.5% of 39 grains floors to 0 and marketplace has no minimum.
        assert_eq!(fee_for(TransactionType::MarketplacePurchase, 39), 0);
    }
}
