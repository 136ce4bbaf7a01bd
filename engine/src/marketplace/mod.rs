//! # Marketplace
//!
//! Fixed-price and auction listings. Entities live in [`types`]; the
//! [`engine`] module holds the lifecycle and bidding logic.

pub mod engine;
pub mod types;

pub use engine::{
    minimum_next_bid, AuctionEngine, AuctionError, AuctionOutcome, PurchaseOutcome,
};
pub use types::{Bid, Listing, ListingStatus};
