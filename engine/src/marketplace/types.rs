//! Marketplace entity definitions: listings and bids.
//!
//! A [`Listing`] is mutable current state (versioned, CAS-updated); a
//! [`Bid`] is an immutable audit record. All state *transitions* live in
//! [`crate::marketplace::AuctionEngine`] — the entities carry data and a
//! few pure predicates only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ledger::types::Grains;

// ---------------------------------------------------------------------------
// ListingStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a marketplace listing.
///
/// ```text
/// draft -> active -> { sold | cancelled | expired }
///            ^
///            v
///         reserved        (checkout hold, releasable)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Created but not yet visible to buyers.
    Draft,
    /// Published and purchasable.
    Active,
    /// Temporarily held for one buyer pending checkout confirmation
    /// (or a manual-review hold on the purchase transaction).
    Reserved,
    /// Purchased; a completed ledger transaction exists.
    Sold,
    /// Withdrawn by the seller before any commitment.
    Cancelled,
    /// Deadline elapsed without a qualifying sale.
    Expired,
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Reserved => write!(f, "reserved"),
            Self::Sold => write!(f, "sold"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A marketplace item entry, fixed-price or auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Account selling the item.
    pub seller_id: String,
    /// Display name of the item.
    pub name: String,
    /// Asking price for fixed-price listings; starting price (and first-bid
    /// minimum) for auctions. Grains.
    pub price: Grains,
    /// Whether this listing runs as an auction.
    pub is_auction: bool,
    /// Optional sale floor for auctions. A below-reserve highest bid means
    /// the auction ends unsold. Does not raise the first-bid minimum.
    pub reserve_price: Option<Grains>,
    /// Current lifecycle state.
    pub status: ListingStatus,
    /// Highest accepted bid so far. Non-decreasing.
    pub highest_bid: Option<Grains>,
    /// Account holding the highest bid.
    pub highest_bidder_id: Option<String>,
    /// Number of accepted bids.
    pub bid_count: u32,
    /// Auction deadline. Moves forward under the anti-snipe rule.
    pub auction_end_time: Option<DateTime<Utc>>,
    /// Units remaining for sale.
    pub quantity_available: u32,
    /// Buyer holding a checkout reservation, when `status == Reserved`.
    pub reserved_by: Option<String>,
    /// When the listing went live.
    pub listed_at: Option<DateTime<Utc>>,
    /// Deadline for fixed-price listings.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the (final) sale completed.
    pub sold_at: Option<DateTime<Utc>>,
    /// Ledger transaction that settled the most recent sale.
    pub sale_transaction_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped by the store on every write.
    pub version: u64,
}

impl Listing {
    /// Creates a draft fixed-price listing.
    pub fn fixed_price(seller_id: impl Into<String>, name: impl Into<String>, price: Grains) -> Self {
        Self::new(seller_id, name, price, false, None)
    }

    /// Creates a draft auction listing. `reserve_price` is the optional
    /// sale floor; the starting price doubles as the first-bid minimum.
    pub fn auction(
        seller_id: impl Into<String>,
        name: impl Into<String>,
        starting_price: Grains,
        reserve_price: Option<Grains>,
    ) -> Self {
        Self::new(seller_id, name, starting_price, true, reserve_price)
    }

    fn new(
        seller_id: impl Into<String>,
        name: impl Into<String>,
        price: Grains,
        is_auction: bool,
        reserve_price: Option<Grains>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            seller_id: seller_id.into(),
            name: name.into(),
            price,
            is_auction,
            reserve_price,
            status: ListingStatus::Draft,
            highest_bid: None,
            highest_bidder_id: None,
            bid_count: 0,
            auction_end_time: None,
            quantity_available: 1,
            reserved_by: None,
            listed_at: None,
            expires_at: None,
            sold_at: None,
            sale_transaction_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Whether the auction deadline has passed. Always `false` for
    /// fixed-price listings.
    pub fn auction_elapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.auction_end_time, Some(end) if now >= end)
    }

    /// Whether a fixed-price listing has outlived its shelf life.
    pub fn listing_elapsed(&self, now: DateTime<Utc>) -> bool {
        !self.is_auction && matches!(self.expires_at, Some(end) if now > end)
    }
}

// ---------------------------------------------------------------------------
// Bid
// ---------------------------------------------------------------------------

/// A single accepted bid. Immutable once created; superseded bids remain
/// in history for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Listing the bid was placed on.
    pub listing_id: String,
    /// Bidding account.
    pub bidder_id: String,
    /// Bid amount in grains.
    pub amount: Grains,
    /// When the bid was accepted.
    pub placed_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(listing_id: impl Into<String>, bidder_id: impl Into<String>, amount: Grains) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            listing_id: listing_id.into(),
            bidder_id: bidder_id.into(),
            amount,
            placed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::crowns;

    #[test]
    fn new_listing_starts_draft() {
        let listing = Listing::fixed_price("acct:seller", "iron sword", crowns(5));
        assert_eq!(listing.status, ListingStatus::Draft);
        assert_eq!(listing.bid_count, 0);
        assert_eq!(listing.quantity_available, 1);
        assert!(listing.listed_at.is_none());
    }

    #[test]
    fn auction_listing_carries_reserve() {
        let listing = Listing::auction("acct:seller", "rare gem", crowns(10), Some(crowns(50)));
        assert!(listing.is_auction);
        assert_eq!(listing.reserve_price, Some(crowns(50)));
        assert!(listing.auction_end_time.is_none());
    }

    #[test]
    fn auction_elapsed_requires_deadline() {
        let mut listing = Listing::auction("s", "gem", crowns(1), None);
        let now = Utc::now();
        assert!(!listing.auction_elapsed(now));

        listing.auction_end_time = Some(now - chrono::Duration::seconds(1));
        assert!(listing.auction_elapsed(now));

        listing.auction_end_time = Some(now + chrono::Duration::hours(1));
        assert!(!listing.auction_elapsed(now));
    }

    #[test]
    fn listing_elapsed_only_for_fixed_price() {
        let now = Utc::now();
        let mut fixed = Listing::fixed_price("s", "sword", crowns(1));
        fixed.expires_at = Some(now - chrono::Duration::days(1));
        assert!(fixed.listing_elapsed(now));

        let mut auction = Listing::auction("s", "gem", crowns(1), None);
        auction.expires_at = Some(now - chrono::Duration::days(1));
        assert!(!auction.listing_elapsed(now));
    }
}
