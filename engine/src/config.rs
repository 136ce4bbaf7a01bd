//! # Economic Configuration & Constants
//!
//! Every magic number in the Atrium economy lives here. Fee schedules, bid
//! increments, expiry windows, the XP curve — all of it. If you're
//! hardcoding a constant somewhere else, you're doing it wrong.
//!
//! These values define the economy. Changing them after launch reprices
//! everything users own, so choose carefully and change deliberately.

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// The currency ticker, mainly for display and logging.
pub const CURRENCY_NAME: &str = "crown";

/// Smallest indivisible unit: the grain. All balance and amount arithmetic
/// is integer grains — no floating point anywhere near money.
pub const GRAINS_PER_CROWN: u64 = 1_000_000;

/// Number of decimal places when rendering grains as crowns.
pub const CURRENCY_DECIMALS: u32 = 6;

// ---------------------------------------------------------------------------
// Fee Schedule
// ---------------------------------------------------------------------------
//
// Fees are expressed in basis points (1 bp = 0.01%) and computed with floor
// division, so the platform never rounds in its own favor by more than one
// grain. Fees are burned: no platform account collects them, the global
// balance sum simply shrinks by the accumulated fee total.

/// Denominator for basis-point math.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Peer-to-peer transfer fee: 1%.
pub const TRANSFER_FEE_BPS: u64 = 100;

/// Minimum transfer fee: 0.01 crown.
pub const TRANSFER_MIN_FEE_GRAINS: u64 = 10_000;

/// Marketplace purchase fee: 2.5%, charged to the buyer's amount
/// (the seller receives the net).
pub const MARKETPLACE_FEE_BPS: u64 = 250;

/// Withdrawal fee: 2%.
pub const WITHDRAWAL_FEE_BPS: u64 = 200;

/// Minimum withdrawal fee: 0.1 crown.
pub const WITHDRAWAL_MIN_FEE_GRAINS: u64 = 100_000;

// ---------------------------------------------------------------------------
// Transaction Lifecycle
// ---------------------------------------------------------------------------

/// How long a pending transaction may sit before the sweep fails it.
pub const PENDING_TX_TTL_HOURS: i64 = 24;

/// Risk scores strictly above this threshold park the transaction in
/// manual review instead of auto-processing.
pub const RISK_REVIEW_THRESHOLD: u8 = 70;

/// Bounded retry count for versioned balance updates. Under the per-account
/// locks a conflict means another writer bypassed the lock table, so we
/// retry a handful of times and then surface a retryable conflict error.
pub const MAX_CAS_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Marketplace & Auctions
// ---------------------------------------------------------------------------

/// Default lifetime of a published fixed-price listing.
pub const LISTING_TTL_DAYS: i64 = 30;

/// Default auction duration from publish.
pub const AUCTION_DURATION_HOURS: i64 = 72;

/// A bid landing within this many seconds of the auction deadline triggers
/// the anti-snipe extension.
pub const ANTI_SNIPE_WINDOW_SECS: i64 = 300;

/// How far the deadline moves on a late bid. Repeatable — every late bid
/// extends again.
pub const ANTI_SNIPE_EXTENSION_SECS: i64 = 300;

/// Bid increment below [`BID_TIER_SMALL_GRAINS`]: 0.5 crown.
pub const BID_INCREMENT_SMALL_GRAINS: u64 = 500_000;

/// Bid increment below [`BID_TIER_MEDIUM_GRAINS`]: 1 crown.
pub const BID_INCREMENT_MEDIUM_GRAINS: u64 = 1_000_000;

/// Above the medium tier, the increment is a percentage of the current
/// highest bid: 5%.
pub const BID_INCREMENT_BPS: u64 = 500;

/// Upper bound of the small-increment tier: 10 crowns.
pub const BID_TIER_SMALL_GRAINS: u64 = 10 * GRAINS_PER_CROWN;

/// Upper bound of the medium-increment tier: 100 crowns.
pub const BID_TIER_MEDIUM_GRAINS: u64 = 100 * GRAINS_PER_CROWN;

// ---------------------------------------------------------------------------
// Levels & Rewards
// ---------------------------------------------------------------------------
//
// The level curve is the integer rendering of `floor(log1.5(xp/100)) + 1`:
// level 2 starts at 150 XP and each subsequent threshold is the previous
// times 3/2 with floor division. Integer iteration keeps the curve exactly
// reproducible on every platform — no transcendental floats deciding who
// leveled up.

/// Total XP at which level 2 begins. Below this, everyone is level 1.
pub const LEVEL_TWO_THRESHOLD_XP: u64 = 150;

/// Threshold growth ratio, numerator and denominator (3/2).
pub const LEVEL_GROWTH_NUM: u64 = 3;
pub const LEVEL_GROWTH_DEN: u64 = 2;

/// Hard cap on player level. XP keeps accumulating past this, but no
/// further levels (or level rewards) are granted.
pub const MAX_LEVEL: u32 = 60;

/// Base currency reward for crossing a level: 0.1 crown.
pub const LEVEL_REWARD_BASE_GRAINS: u64 = 100_000;

/// Additional reward per level above 1: 0.01 crown. Crossing level `n`
/// pays `BASE + STEP * (n - 1)` grains.
pub const LEVEL_REWARD_STEP_GRAINS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Service Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port for the node.
pub const DEFAULT_API_PORT: u16 = 7310;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 7311;

/// Default interval for the expiry sweep (failed expired transactions,
/// expired listings, elapsed auctions).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Convenience conversion for tests and seed data: whole crowns to grains.
pub const fn crowns(n: u64) -> u64 {
    n * GRAINS_PER_CROWN
}

/// Renders a grain amount as a human-readable crown string, e.g.
/// `109_900_000` becomes `"109.900000 crown"`.
pub fn format_grains(grains: u64) -> String {
    let whole = grains / GRAINS_PER_CROWN;
    let frac = grains % GRAINS_PER_CROWN;
    format!(
        "{}.{:0>width$} {}",
        whole,
        frac,
        CURRENCY_NAME,
        width = CURRENCY_DECIMALS as usize
    )
}
