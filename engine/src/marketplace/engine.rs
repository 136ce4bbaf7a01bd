//! # Auction Engine
//!
//! Listing lifecycle and bidding. All money movement is delegated to the
//! ledger — the marketplace never touches a balance directly; it creates
//! and processes `MarketplacePurchase` transactions and reacts to their
//! outcomes.
//!
//! Listing state is mutated under the per-listing lock and written back
//! with a versioned compare-and-swap, so two bids racing on the same
//! listing serialize and the loser re-validates against the new highest
//! bid.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config;
use crate::ledger::service::{Ledger, LedgerError, ProcessOutcome};
use crate::ledger::types::{Grains, Transaction, TransactionType};
use crate::locks::LockTable;
use crate::marketplace::types::{Bid, Listing, ListingStatus};
use crate::store::{AccountStore, BidStore, ListingStore, StoreError};

// ---------------------------------------------------------------------------
// Errors & outcomes
// ---------------------------------------------------------------------------

/// Errors from marketplace operations.
#[derive(Debug, Error)]
pub enum AuctionError {
    /// The listing is not in a state that admits this operation.
    #[error("listing {id} is {current}, expected {expected}")]
    InvalidState {
        id: String,
        current: ListingStatus,
        expected: &'static str,
    },

    /// Bids only apply to auction listings.
    #[error("listing {id} is not an auction")]
    NotAnAuction { id: String },

    /// Direct purchase only applies to fixed-price listings.
    #[error("listing {id} is an auction; it settles at the deadline")]
    NotFixedPrice { id: String },

    /// The auction deadline has passed; no further bids.
    #[error("auction has ended: {id}")]
    AuctionEnded { id: String },

    /// The auction deadline has not passed yet; it cannot settle.
    #[error("auction still running: {id}")]
    AuctionStillRunning { id: String },

    /// Sellers cannot bid on or buy their own listings.
    #[error("seller cannot trade on own listing: {id}")]
    SellerOwnListing { id: String },

    /// The bid does not clear the minimum.
    #[error("bid of {offered} below minimum {minimum}")]
    BidTooLow { minimum: Grains, offered: Grains },

    /// The bidder cannot cover the bid.
    #[error("bidder {bidder_id} balance {balance} cannot cover bid of {amount}")]
    BidExceedsBalance {
        bidder_id: String,
        balance: Grains,
        amount: Grains,
    },

    /// The listing changed underneath the bid. Retryable.
    #[error("listing {id} changed concurrently; re-read and retry")]
    StaleBid { id: String },

    /// The listing is reserved for a different buyer.
    #[error("listing {id} is reserved for another buyer")]
    ReservedForOther { id: String },

    /// Listings with bids cannot be cancelled.
    #[error("listing {id} has bids and cannot be cancelled")]
    HasBids { id: String },

    /// Only the seller may cancel a listing.
    #[error("account {caller} does not own listing {id}")]
    NotSeller { id: String, caller: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How an ended auction resolved.
#[derive(Debug)]
pub enum AuctionOutcome {
    /// The highest bid cleared the reserve and settled on the ledger.
    Sold {
        listing: Listing,
        transaction: Transaction,
    },
    /// Bids existed but the highest stayed below the reserve. Unsold; no
    /// transaction was created.
    ReserveNotMet { listing: Listing, highest: Grains },
    /// Nobody bid. Unsold.
    NoBids { listing: Listing },
    /// The winner's purchase was parked for manual review; the listing is
    /// reserved for them until the review resolves.
    HeldForReview {
        listing: Listing,
        transaction: Transaction,
    },
}

/// How a direct purchase resolved.
#[derive(Debug)]
pub enum PurchaseOutcome {
    /// Settled; the listing's quantity dropped (to `Sold` at zero).
    Sold {
        listing: Listing,
        transaction: Transaction,
    },
    /// The purchase was parked for manual review; the listing is reserved
    /// for the buyer.
    HeldForReview {
        listing: Listing,
        transaction: Transaction,
    },
}

// ---------------------------------------------------------------------------
// Bid minimums
// ---------------------------------------------------------------------------

/// The smallest acceptable next bid for a listing.
///
/// The first bid must meet the starting price; afterwards the minimum is
/// the highest bid plus a tiered increment — a flat half crown at the low
/// end, a flat crown in the middle, and 5% of the highest bid above 100
/// crowns. The reserve price never raises this minimum; it only gates the
/// sale at settlement.
pub fn minimum_next_bid(listing: &Listing) -> Grains {
    match listing.highest_bid {
        None => listing.price,
        Some(h) if h < config::BID_TIER_SMALL_GRAINS => h + config::BID_INCREMENT_SMALL_GRAINS,
        Some(h) if h < config::BID_TIER_MEDIUM_GRAINS => h + config::BID_INCREMENT_MEDIUM_GRAINS,
        Some(h) => h + h * config::BID_INCREMENT_BPS / config::BPS_DENOMINATOR,
    }
}

// ---------------------------------------------------------------------------
// AuctionEngine
// ---------------------------------------------------------------------------

/// Marketplace listing lifecycle and auction mechanics.
pub struct AuctionEngine {
    listings: Arc<dyn ListingStore>,
    bids: Arc<dyn BidStore>,
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<Ledger>,
    locks: Arc<LockTable>,
}

impl AuctionEngine {
    pub fn new(
        listings: Arc<dyn ListingStore>,
        bids: Arc<dyn BidStore>,
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<Ledger>,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            listings,
            bids,
            accounts,
            ledger,
            locks,
        }
    }

    /// Read access to a listing.
    pub fn listing(&self, id: &str) -> Result<Listing, AuctionError> {
        Ok(self.listings.get(id)?)
    }

    /// Bid history for a listing, in placement order.
    pub fn bid_history(&self, listing_id: &str) -> Result<Vec<Bid>, AuctionError> {
        Ok(self.bids.for_listing(listing_id)?)
    }

    /// Records a new draft listing.
    pub fn create_listing(&self, listing: Listing) -> Result<Listing, AuctionError> {
        let id = listing.id.clone();
        self.listings.insert(listing)?;
        Ok(self.listings.get(&id)?)
    }

    /// Takes a draft listing live: fixed-price listings get a shelf life,
    /// auctions get a deadline.
    pub fn publish(&self, listing_id: &str) -> Result<Listing, AuctionError> {
        self.locks.with_key(listing_id, || {
            let mut listing = self.listings.get(listing_id)?;
            if listing.status != ListingStatus::Draft {
                return Err(AuctionError::InvalidState {
                    id: listing.id,
                    current: listing.status,
                    expected: "draft",
                });
            }

            let now = Utc::now();
            listing.status = ListingStatus::Active;
            listing.listed_at = Some(now);
            if listing.is_auction {
                listing.auction_end_time =
                    Some(now + Duration::hours(config::AUCTION_DURATION_HOURS));
            } else {
                listing.expires_at = Some(now + Duration::days(config::LISTING_TTL_DAYS));
            }
            listing.updated_at = now;

            let stored = self.listings.update(&listing, listing.version)?;
            info!(
                listing_id = %stored.id,
                is_auction = stored.is_auction,
                price = stored.price,
                "listing published"
            );
            Ok(stored)
        })
    }

    // -----------------------------------------------------------------------
    // Bidding
    // -----------------------------------------------------------------------

    /// Places a bid on an active auction. The bid must clear
    /// [`minimum_next_bid`] and the bidder's balance must cover it. A bid
    /// landing inside the anti-snipe window pushes the deadline out.
    pub fn place_bid(
        &self,
        listing_id: &str,
        bidder_id: &str,
        amount: Grains,
    ) -> Result<Bid, AuctionError> {
        self.locks.with_key(listing_id, || {
            let mut listing = self.listings.get(listing_id)?;

            if !listing.is_auction {
                return Err(AuctionError::NotAnAuction { id: listing.id });
            }
            if listing.status != ListingStatus::Active {
                return Err(AuctionError::InvalidState {
                    id: listing.id,
                    current: listing.status,
                    expected: "active",
                });
            }
            let now = Utc::now();
            if listing.auction_elapsed(now) {
                return Err(AuctionError::AuctionEnded { id: listing.id });
            }
            if bidder_id == listing.seller_id {
                return Err(AuctionError::SellerOwnListing { id: listing.id });
            }

            let bidder = self.accounts.get(bidder_id)?;
            if bidder.balance < amount {
                return Err(AuctionError::BidExceedsBalance {
                    bidder_id: bidder_id.to_string(),
                    balance: bidder.balance,
                    amount,
                });
            }

            let minimum = minimum_next_bid(&listing);
            if amount < minimum {
                return Err(AuctionError::BidTooLow {
                    minimum,
                    offered: amount,
                });
            }

            // Anti-snipe: a late bid buys everyone else time to respond.
            if let Some(end) = listing.auction_end_time {
                if end - now <= Duration::seconds(config::ANTI_SNIPE_WINDOW_SECS) {
                    let extended = end + Duration::seconds(config::ANTI_SNIPE_EXTENSION_SECS);
                    listing.auction_end_time = Some(extended);
                    info!(
                        listing_id = %listing.id,
                        new_deadline = %extended,
                        "anti-snipe extension applied"
                    );
                }
            }

            listing.highest_bid = Some(amount);
            listing.highest_bidder_id = Some(bidder_id.to_string());
            listing.bid_count += 1;
            listing.updated_at = now;

            let stored = self
                .listings
                .update(&listing, listing.version)
                .map_err(|e| match e {
                    StoreError::VersionConflict { .. } => AuctionError::StaleBid {
                        id: listing.id.clone(),
                    },
                    other => AuctionError::Store(other),
                })?;

            let bid = Bid::new(&stored.id, bidder_id, amount);
            self.bids.append(bid.clone())?;
            info!(
                listing_id = %stored.id,
                bidder = bidder_id,
                amount,
                bid_count = stored.bid_count,
                "bid accepted"
            );
            Ok(bid)
        })
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Settles an auction whose deadline has passed. With no bids, or a
    /// highest bid below the reserve, the listing expires unsold and no
    /// transaction is created. Otherwise the winner pays the highest bid
    /// (not the reserve) through the ledger.
    pub fn end_auction(
        &self,
        listing_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AuctionOutcome, AuctionError> {
        self.locks.with_key(listing_id, || {
            let mut listing = self.listings.get(listing_id)?;

            if !listing.is_auction {
                return Err(AuctionError::NotAnAuction { id: listing.id });
            }
            if listing.status != ListingStatus::Active {
                return Err(AuctionError::InvalidState {
                    id: listing.id,
                    current: listing.status,
                    expected: "active",
                });
            }
            if !listing.auction_elapsed(now) {
                return Err(AuctionError::AuctionStillRunning { id: listing.id });
            }

            let (highest, winner) = match (listing.highest_bid, listing.highest_bidder_id.clone())
            {
                (Some(h), Some(w)) => (h, w),
                _ => {
                    listing.status = ListingStatus::Expired;
                    listing.updated_at = now;
                    let stored = self.listings.update(&listing, listing.version)?;
                    info!(listing_id = %stored.id, "auction ended with no bids");
                    return Ok(AuctionOutcome::NoBids { listing: stored });
                }
            };

            if let Some(reserve) = listing.reserve_price {
                if highest < reserve {
                    listing.status = ListingStatus::Expired;
                    listing.updated_at = now;
                    let stored = self.listings.update(&listing, listing.version)?;
                    info!(
                        listing_id = %stored.id,
                        highest,
                        reserve,
                        "auction ended below reserve; unsold"
                    );
                    return Ok(AuctionOutcome::ReserveNotMet {
                        listing: stored,
                        highest,
                    });
                }
            }

            let tx = self.ledger.create(
                Some(&winner),
                Some(&listing.seller_id),
                highest,
                TransactionType::MarketplacePurchase,
                Some(listing.id.clone()),
            )?;
            match self.ledger.process(&tx.id) {
                Ok(ProcessOutcome::Completed(tx)) => {
                    listing.status = ListingStatus::Sold;
                    listing.sold_at = Some(now);
                    listing.sale_transaction_id = Some(tx.id.clone());
                    listing.quantity_available = 0;
                    listing.updated_at = now;
                    let stored = self.listings.update(&listing, listing.version)?;
                    info!(
                        listing_id = %stored.id,
                        winner = %winner,
                        price = highest,
                        tx_id = %tx.id,
                        "auction settled"
                    );
                    Ok(AuctionOutcome::Sold {
                        listing: stored,
                        transaction: tx,
                    })
                }
                Ok(ProcessOutcome::HeldForReview(tx)) => {
                    listing.status = ListingStatus::Reserved;
                    listing.reserved_by = Some(winner.clone());
                    listing.updated_at = now;
                    let stored = self.listings.update(&listing, listing.version)?;
                    warn!(
                        listing_id = %stored.id,
                        tx_id = %tx.id,
                        "auction settlement held for review"
                    );
                    Ok(AuctionOutcome::HeldForReview {
                        listing: stored,
                        transaction: tx,
                    })
                }
                Ok(ProcessOutcome::AlreadySettled(tx)) => {
                    // Freshly created transaction; cannot already be settled.
                    Err(AuctionError::Ledger(LedgerError::InvalidState {
                        current: tx.status,
                        expected: "pending",
                    }))
                }
                Err(e) => {
                    // The winner could not pay (e.g. spent the balance after
                    // bidding). The auction expires unsold.
                    listing.status = ListingStatus::Expired;
                    listing.updated_at = now;
                    self.listings.update(&listing, listing.version)?;
                    warn!(listing_id = %listing.id, error = %e, "auction settlement failed");
                    Err(e.into())
                }
            }
        })
    }

    /// Buys a fixed-price listing outright. Allowed while the listing is
    /// active, or while it is reserved for this buyer.
    pub fn buy_now(
        &self,
        listing_id: &str,
        buyer_id: &str,
    ) -> Result<PurchaseOutcome, AuctionError> {
        self.locks.with_key(listing_id, || {
            let mut listing = self.listings.get(listing_id)?;

            if listing.is_auction {
                return Err(AuctionError::NotFixedPrice { id: listing.id });
            }
            match listing.status {
                ListingStatus::Active => {}
                ListingStatus::Reserved
                    if listing.reserved_by.as_deref() == Some(buyer_id) => {}
                ListingStatus::Reserved => {
                    return Err(AuctionError::ReservedForOther { id: listing.id });
                }
                other => {
                    return Err(AuctionError::InvalidState {
                        id: listing.id,
                        current: other,
                        expected: "active",
                    });
                }
            }
            let now = Utc::now();
            if listing.listing_elapsed(now) {
                return Err(AuctionError::InvalidState {
                    id: listing.id,
                    current: listing.status,
                    expected: "active (listing has expired)",
                });
            }
            if buyer_id == listing.seller_id {
                return Err(AuctionError::SellerOwnListing { id: listing.id });
            }

            let tx = self.ledger.create(
                Some(buyer_id),
                Some(&listing.seller_id),
                listing.price,
                TransactionType::MarketplacePurchase,
                Some(listing.id.clone()),
            )?;
            match self.ledger.process(&tx.id)? {
                ProcessOutcome::Completed(tx) => {
                    listing.quantity_available = listing.quantity_available.saturating_sub(1);
                    listing.reserved_by = None;
                    if listing.quantity_available == 0 {
                        listing.status = ListingStatus::Sold;
                        listing.sold_at = Some(now);
                    } else {
                        listing.status = ListingStatus::Active;
                    }
                    listing.sale_transaction_id = Some(tx.id.clone());
                    listing.updated_at = now;
                    let stored = self.listings.update(&listing, listing.version)?;
                    info!(
                        listing_id = %stored.id,
                        buyer = buyer_id,
                        price = tx.amount,
                        tx_id = %tx.id,
                        "listing purchased"
                    );
                    Ok(PurchaseOutcome::Sold {
                        listing: stored,
                        transaction: tx,
                    })
                }
                ProcessOutcome::HeldForReview(tx) => {
                    listing.status = ListingStatus::Reserved;
                    listing.reserved_by = Some(buyer_id.to_string());
                    listing.updated_at = now;
                    let stored = self.listings.update(&listing, listing.version)?;
                    warn!(
                        listing_id = %stored.id,
                        buyer = buyer_id,
                        tx_id = %tx.id,
                        "purchase held for review; listing reserved"
                    );
                    Ok(PurchaseOutcome::HeldForReview {
                        listing: stored,
                        transaction: tx,
                    })
                }
                ProcessOutcome::AlreadySettled(tx) => {
                    Err(AuctionError::Ledger(LedgerError::InvalidState {
                        current: tx.status,
                        expected: "pending",
                    }))
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Reservations & cancellation
    // -----------------------------------------------------------------------

    /// Places a checkout hold on an active fixed-price listing.
    pub fn reserve(&self, listing_id: &str, buyer_id: &str) -> Result<Listing, AuctionError> {
        self.locks.with_key(listing_id, || {
            let mut listing = self.listings.get(listing_id)?;
            if listing.is_auction {
                return Err(AuctionError::NotFixedPrice { id: listing.id });
            }
            if listing.status != ListingStatus::Active {
                return Err(AuctionError::InvalidState {
                    id: listing.id,
                    current: listing.status,
                    expected: "active",
                });
            }
            if buyer_id == listing.seller_id {
                return Err(AuctionError::SellerOwnListing { id: listing.id });
            }
            listing.status = ListingStatus::Reserved;
            listing.reserved_by = Some(buyer_id.to_string());
            listing.updated_at = Utc::now();
            Ok(self.listings.update(&listing, listing.version)?)
        })
    }

    /// Releases a checkout hold, returning the listing to `Active`. Only
    /// the holding buyer may release.
    pub fn release_reservation(
        &self,
        listing_id: &str,
        buyer_id: &str,
    ) -> Result<Listing, AuctionError> {
        self.locks.with_key(listing_id, || {
            let mut listing = self.listings.get(listing_id)?;
            if listing.status != ListingStatus::Reserved {
                return Err(AuctionError::InvalidState {
                    id: listing.id,
                    current: listing.status,
                    expected: "reserved",
                });
            }
            if listing.reserved_by.as_deref() != Some(buyer_id) {
                return Err(AuctionError::ReservedForOther { id: listing.id });
            }
            listing.status = ListingStatus::Active;
            listing.reserved_by = None;
            listing.updated_at = Utc::now();
            Ok(self.listings.update(&listing, listing.version)?)
        })
    }

    /// Withdraws a listing. Sellers only, and only before any bid or sale
    /// commitment exists.
    pub fn cancel(&self, listing_id: &str, caller_id: &str) -> Result<Listing, AuctionError> {
        self.locks.with_key(listing_id, || {
            let mut listing = self.listings.get(listing_id)?;
            if caller_id != listing.seller_id {
                return Err(AuctionError::NotSeller {
                    id: listing.id,
                    caller: caller_id.to_string(),
                });
            }
            if !matches!(listing.status, ListingStatus::Draft | ListingStatus::Active) {
                return Err(AuctionError::InvalidState {
                    id: listing.id,
                    current: listing.status,
                    expected: "draft or active",
                });
            }
            if listing.bid_count > 0 {
                return Err(AuctionError::HasBids { id: listing.id });
            }
            listing.status = ListingStatus::Cancelled;
            listing.updated_at = Utc::now();
            let stored = self.listings.update(&listing, listing.version)?;
            info!(listing_id = %stored.id, "listing cancelled");
            Ok(stored)
        })
    }

    // -----------------------------------------------------------------------
    // Sweep
    // -----------------------------------------------------------------------

    /// Expires elapsed fixed-price listings and settles elapsed auctions.
    /// Returns how many listings changed state. Settlement failures are
    /// logged and skipped; the sweep keeps going.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, AuctionError> {
        let mut changed = 0;
        for listing in self.listings.active()? {
            if listing.is_auction && listing.auction_elapsed(now) {
                match self.end_auction(&listing.id, now) {
                    Ok(_) => changed += 1,
                    Err(e) => {
                        warn!(listing_id = %listing.id, error = %e, "sweep settlement failed");
                    }
                }
            } else if listing.listing_elapsed(now) {
                let result = self.locks.with_key(&listing.id, || {
                    let mut fresh = self.listings.get(&listing.id)?;
                    if fresh.status != ListingStatus::Active {
                        return Ok::<bool, AuctionError>(false);
                    }
                    fresh.status = ListingStatus::Expired;
                    fresh.updated_at = now;
                    self.listings.update(&fresh, fresh.version)?;
                    Ok(true)
                })?;
                if result {
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::crowns;
    use crate::gateway::ApprovingGateway;
    use crate::ledger::fraud::HeuristicRiskAssessor;
    use crate::ledger::types::TransactionStatus;
    use crate::store::memory::{
        MemoryAccountStore, MemoryBidStore, MemoryListingStore, MemoryTransactionStore,
    };
    use crate::store::Account;

    struct Fixture {
        accounts: Arc<MemoryAccountStore>,
        transactions: Arc<MemoryTransactionStore>,
        listings: Arc<MemoryListingStore>,
        ledger: Arc<Ledger>,
        engine: AuctionEngine,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(MemoryAccountStore::new());
        let transactions = Arc::new(MemoryTransactionStore::new());
        let listings = Arc::new(MemoryListingStore::new());
        let bids = Arc::new(MemoryBidStore::new());
        let locks = Arc::new(LockTable::new());
        let risk = Arc::new(HeuristicRiskAssessor::new(
            Arc::clone(&accounts) as _,
            Arc::clone(&transactions) as _,
        ));
        let ledger = Arc::new(Ledger::new(
            Arc::clone(&accounts) as _,
            Arc::clone(&transactions) as _,
            risk,
            Some(Arc::new(ApprovingGateway)),
            Arc::clone(&locks),
        ));
        let engine = AuctionEngine::new(
            Arc::clone(&listings) as _,
            bids,
            Arc::clone(&accounts) as _,
            Arc::clone(&ledger),
            locks,
        );
        Fixture {
            accounts,
            transactions,
            listings,
            ledger,
            engine,
        }
    }

    fn seed(f: &Fixture, id: &str, balance: Grains) {
        let mut account = Account::new(id, balance);
        account.created_at = Utc::now() - Duration::days(90);
        f.accounts.insert(account).unwrap();
    }

    fn balance(f: &Fixture, id: &str) -> Grains {
        f.accounts.get(id).unwrap().balance
    }

    /// Publishes an auction and force-dates its deadline.
    fn live_auction(f: &Fixture, reserve: Option<Grains>) -> Listing {
        let listing = f
            .engine
            .create_listing(Listing::auction("acct:seller", "rare gem", crowns(10), reserve))
            .unwrap();
        f.engine.publish(&listing.id).unwrap()
    }

    fn set_deadline(f: &Fixture, listing_id: &str, end: DateTime<Utc>) {
        let mut listing = f.listings.get(listing_id).unwrap();
        listing.auction_end_time = Some(end);
        f.listings.update(&listing, listing.version).unwrap();
    }

    #[test]
    fn minimum_next_bid_tiers() {
        let mut listing = Listing::auction("s", "gem", crowns(3), None);
        // No bids yet: the starting price.
        assert_eq!(minimum_next_bid(&listing), crowns(3));

        // Below 10 crowns: +0.5 crown.
        listing.highest_bid = Some(crowns(4));
        assert_eq!(minimum_next_bid(&listing), crowns(4) + 500_000);

        // Below 100 crowns: +1 crown.
        listing.highest_bid = Some(crowns(40));
        assert_eq!(minimum_next_bid(&listing), crowns(41));

        // At or above 100 crowns: +5%.
        listing.highest_bid = Some(crowns(200));
        assert_eq!(minimum_next_bid(&listing), crowns(210));
    }

    #[test]
    fn publish_sets_auction_deadline() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        let listing = live_auction(&f, None);
        assert_eq!(listing.status, ListingStatus::Active);
        let end = listing.auction_end_time.unwrap();
        let expected = Utc::now() + Duration::hours(config::AUCTION_DURATION_HOURS);
        assert!((end - expected).num_seconds().abs() < 5);
    }

    #[test]
    fn bids_must_be_monotonic() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));
        seed(&f, "acct:bob", crowns(1_000));
        let listing = live_auction(&f, None);

        // First bid below the starting price is rejected.
        assert!(matches!(
            f.engine.place_bid(&listing.id, "acct:alice", crowns(9)).unwrap_err(),
            AuctionError::BidTooLow { .. }
        ));

        f.engine.place_bid(&listing.id, "acct:alice", crowns(10)).unwrap();

        // Equal to the current highest: too low (10 < 10 + 1).
        assert!(matches!(
            f.engine.place_bid(&listing.id, "acct:bob", crowns(10)).unwrap_err(),
            AuctionError::BidTooLow { minimum, .. } if minimum == crowns(11)
        ));

        let updated = f
            .engine
            .place_bid(&listing.id, "acct:bob", crowns(12))
            .map(|_| f.listings.get(&listing.id).unwrap())
            .unwrap();
        assert_eq!(updated.highest_bid, Some(crowns(12)));
        assert_eq!(updated.highest_bidder_id.as_deref(), Some("acct:bob"));
        assert_eq!(updated.bid_count, 2);
    }

    #[test]
    fn seller_cannot_bid_on_own_auction() {
        let f = fixture();
        seed(&f, "acct:seller", crowns(1_000));
        let listing = live_auction(&f, None);
        assert!(matches!(
            f.engine.place_bid(&listing.id, "acct:seller", crowns(10)).unwrap_err(),
            AuctionError::SellerOwnListing { .. }
        ));
    }

    #[test]
    fn bid_requires_covering_balance() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:poor", crowns(5));
        let listing = live_auction(&f, None);
        assert!(matches!(
            f.engine.place_bid(&listing.id, "acct:poor", crowns(10)).unwrap_err(),
            AuctionError::BidExceedsBalance { .. }
        ));
    }

    #[test]
    fn late_bid_extends_the_deadline() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));
        let listing = live_auction(&f, None);

        // Two minutes to go: inside the five-minute window.
        let end = Utc::now() + Duration::minutes(2);
        set_deadline(&f, &listing.id, end);

        f.engine.place_bid(&listing.id, "acct:alice", crowns(10)).unwrap();
        let updated = f.listings.get(&listing.id).unwrap();
        let new_end = updated.auction_end_time.unwrap();
        assert_eq!(
            new_end,
            end + Duration::seconds(config::ANTI_SNIPE_EXTENSION_SECS)
        );
    }

    #[test]
    fn early_bid_leaves_deadline_alone() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));
        let listing = live_auction(&f, None);
        let original_end = f.listings.get(&listing.id).unwrap().auction_end_time;

        f.engine.place_bid(&listing.id, "acct:alice", crowns(10)).unwrap();
        assert_eq!(
            f.listings.get(&listing.id).unwrap().auction_end_time,
            original_end
        );
    }

    #[test]
    fn no_bids_after_deadline() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));
        let listing = live_auction(&f, None);
        set_deadline(&f, &listing.id, Utc::now() - Duration::seconds(1));

        assert!(matches!(
            f.engine.place_bid(&listing.id, "acct:alice", crowns(10)).unwrap_err(),
            AuctionError::AuctionEnded { .. }
        ));
    }

    #[test]
    fn auction_below_reserve_ends_unsold_with_no_transaction() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));
        let listing = live_auction(&f, Some(crowns(50)));

        // Bidding below the reserve is allowed.
        f.engine.place_bid(&listing.id, "acct:alice", crowns(40)).unwrap();

        set_deadline(&f, &listing.id, Utc::now() - Duration::seconds(1));
        let tx_count_before = f.transactions.len();

        let outcome = f.engine.end_auction(&listing.id, Utc::now()).unwrap();
        match outcome {
            AuctionOutcome::ReserveNotMet { listing, highest } => {
                assert_eq!(listing.status, ListingStatus::Expired);
                assert_eq!(highest, crowns(40));
            }
            other => panic!("expected reserve-not-met, got {other:?}"),
        }
        assert_eq!(f.transactions.len(), tx_count_before);
        assert_eq!(balance(&f, "acct:alice"), crowns(1_000));
    }

    #[test]
    fn auction_meeting_reserve_settles_at_highest_bid() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));
        let listing = live_auction(&f, Some(crowns(50)));

        f.engine.place_bid(&listing.id, "acct:alice", crowns(60)).unwrap();
        set_deadline(&f, &listing.id, Utc::now() - Duration::seconds(1));

        let outcome = f.engine.end_auction(&listing.id, Utc::now()).unwrap();
        let (listing, tx) = match outcome {
            AuctionOutcome::Sold {
                listing,
                transaction,
            } => (listing, transaction),
            other => panic!("expected sale, got {other:?}"),
        };

        assert_eq!(listing.status, ListingStatus::Sold);
        assert_eq!(listing.sale_transaction_id.as_deref(), Some(tx.id.as_str()));
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.amount, crowns(60));
        // 2.5% marketplace fee, charged out of the buyer's amount.
        assert_eq!(tx.fee, 1_500_000);
        assert_eq!(balance(&f, "acct:alice"), crowns(940));
        assert_eq!(balance(&f, "acct:seller"), crowns(60) - 1_500_000);
    }

    #[test]
    fn ended_auction_with_no_bids_expires() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        let listing = live_auction(&f, None);
        set_deadline(&f, &listing.id, Utc::now() - Duration::seconds(1));

        let outcome = f.engine.end_auction(&listing.id, Utc::now()).unwrap();
        assert!(matches!(outcome, AuctionOutcome::NoBids { .. }));
        assert_eq!(
            f.listings.get(&listing.id).unwrap().status,
            ListingStatus::Expired
        );
    }

    #[test]
    fn running_auction_cannot_be_ended() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        let listing = live_auction(&f, None);
        assert!(matches!(
            f.engine.end_auction(&listing.id, Utc::now()).unwrap_err(),
            AuctionError::AuctionStillRunning { .. }
        ));
    }

    #[test]
    fn buy_now_settles_and_sells_out() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:buyer", crowns(100));

        let listing = f
            .engine
            .create_listing(Listing::fixed_price("acct:seller", "iron sword", crowns(20)))
            .unwrap();
        let listing = f.engine.publish(&listing.id).unwrap();

        let outcome = f.engine.buy_now(&listing.id, "acct:buyer").unwrap();
        let (listing, tx) = match outcome {
            PurchaseOutcome::Sold {
                listing,
                transaction,
            } => (listing, transaction),
            other => panic!("expected sale, got {other:?}"),
        };

        assert_eq!(listing.status, ListingStatus::Sold);
        assert_eq!(listing.quantity_available, 0);
        assert_eq!(tx.fee, 500_000); // 2.5% of 20 crowns
        assert_eq!(balance(&f, "acct:buyer"), crowns(80));
        assert_eq!(balance(&f, "acct:seller"), crowns(20) - 500_000);

        // Sold out: a second buyer is turned away.
        seed(&f, "acct:late", crowns(100));
        assert!(matches!(
            f.engine.buy_now(&listing.id, "acct:late").unwrap_err(),
            AuctionError::InvalidState { .. }
        ));
    }

    #[test]
    fn reservation_blocks_other_buyers_until_released() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(100));
        seed(&f, "acct:bob", crowns(100));

        let listing = f
            .engine
            .create_listing(Listing::fixed_price("acct:seller", "iron sword", crowns(20)))
            .unwrap();
        f.engine.publish(&listing.id).unwrap();

        f.engine.reserve(&listing.id, "acct:alice").unwrap();
        assert!(matches!(
            f.engine.buy_now(&listing.id, "acct:bob").unwrap_err(),
            AuctionError::ReservedForOther { .. }
        ));

        // The holder can still complete the purchase.
        assert!(matches!(
            f.engine.buy_now(&listing.id, "acct:alice").unwrap(),
            PurchaseOutcome::Sold { .. }
        ));
    }

    #[test]
    fn cancel_rules() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));
        let listing = live_auction(&f, None);

        // Only the seller may cancel.
        assert!(matches!(
            f.engine.cancel(&listing.id, "acct:alice").unwrap_err(),
            AuctionError::NotSeller { .. }
        ));

        // A bid pins the listing.
        f.engine.place_bid(&listing.id, "acct:alice", crowns(10)).unwrap();
        assert!(matches!(
            f.engine.cancel(&listing.id, "acct:seller").unwrap_err(),
            AuctionError::HasBids { .. }
        ));

        // A bid-free listing cancels cleanly.
        let other = f
            .engine
            .create_listing(Listing::fixed_price("acct:seller", "shield", crowns(5)))
            .unwrap();
        let other = f.engine.publish(&other.id).unwrap();
        let cancelled = f.engine.cancel(&other.id, "acct:seller").unwrap();
        assert_eq!(cancelled.status, ListingStatus::Cancelled);
    }

    #[test]
    fn sweep_expires_and_settles() {
        let f = fixture();
        seed(&f, "acct:seller", 0);
        seed(&f, "acct:alice", crowns(1_000));

        // An elapsed fixed-price listing.
        let fixed = f
            .engine
            .create_listing(Listing::fixed_price("acct:seller", "sword", crowns(5)))
            .unwrap();
        let mut fixed = f.engine.publish(&fixed.id).unwrap();
        fixed.expires_at = Some(Utc::now() - Duration::days(1));
        f.listings.update(&fixed, fixed.version).unwrap();

        // An elapsed auction with a winning bid.
        let auction = live_auction(&f, None);
        f.engine.place_bid(&auction.id, "acct:alice", crowns(10)).unwrap();
        set_deadline(&f, &auction.id, Utc::now() - Duration::seconds(1));

        let changed = f.engine.sweep_expired(Utc::now()).unwrap();
        assert_eq!(changed, 2);
        assert_eq!(
            f.listings.get(&fixed.id).unwrap().status,
            ListingStatus::Expired
        );
        assert_eq!(
            f.listings.get(&auction.id).unwrap().status,
            ListingStatus::Sold
        );
    }
}
