// Copyright (c) 2026 Atrium Contributors. MIT License.
// See LICENSE for details.

//! # Atrium Engine
//!
//! The core of the Atrium virtual economy: a transaction ledger that owns
//! every balance mutation, an auction-capable marketplace, and an
//! XP/quest reward system. All three share one currency (the crown,
//! subdivided into a million grains) and one rule: money only moves
//! through the ledger.
//!
//! Module map:
//!
//! - [`config`] — every economic constant in one place
//! - [`store`] — repository traits and the in-memory implementations
//! - [`locks`] — per-key serialization for balance mutations
//! - [`ledger`] — transaction lifecycle, fees, fraud scoring
//! - [`gateway`] — external payout provider seam for withdrawals
//! - [`marketplace`] — listings, bidding, auction settlement
//! - [`rewards`] — XP curve, levels, quest payouts

pub mod config;
pub mod gateway;
pub mod ledger;
pub mod locks;
pub mod marketplace;
pub mod rewards;
pub mod store;

pub use gateway::{ApprovingGateway, GatewayError, GatewayReceipt, PaymentGateway};
pub use ledger::{
    Grains, Ledger, LedgerError, ProcessOutcome, Transaction, TransactionStatus, TransactionType,
};
pub use locks::LockTable;
pub use marketplace::{AuctionEngine, AuctionError, AuctionOutcome, Listing, ListingStatus};
pub use rewards::{Quest, RewardEngine, RewardError};
pub use store::{Account, StoreError};
