//! # REST API
//!
//! Builds the axum router that exposes the economy engine over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                       |
//! |--------|-----------------------------|-----------------------------------|
//! | GET    | `/health`                   | Liveness probe                    |
//! | GET    | `/status`                   | Node status summary               |
//! | POST   | `/accounts`                 | Create an account                 |
//! | GET    | `/accounts/:id`             | Account state                     |
//! | POST   | `/transactions`             | Create a pending transaction      |
//! | GET    | `/transactions/:id`         | Transaction by id                 |
//! | POST   | `/transactions/:id/process` | Settle a pending transaction      |
//! | POST   | `/transactions/:id/release` | Clear a manual-review hold        |
//! | POST   | `/transactions/:id/cancel`  | Cancel before settlement          |
//! | POST   | `/transactions/:id/refund`  | Refund a completed transaction    |
//! | POST   | `/listings`                 | Create a draft listing            |
//! | GET    | `/listings/:id`             | Listing by id                     |
//! | GET    | `/listings/:id/bids`        | Bid history                      |
//! | POST   | `/listings/:id/publish`     | Take a draft listing live         |
//! | POST   | `/listings/:id/bids`        | Place an auction bid              |
//! | POST   | `/listings/:id/buy`         | Buy a fixed-price listing         |
//! | POST   | `/listings/:id/end`         | Settle an elapsed auction         |
//! | POST   | `/quests`                   | Define a quest                    |
//! | POST   | `/quests/:id/start`         | Start a quest for a user          |
//! | POST   | `/quests/:id/advance`       | Add quest progress                |
//! | POST   | `/quests/:id/complete`      | Complete a quest and pay          |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use atrium_engine::config;
use atrium_engine::gateway::GatewayError;
use atrium_engine::ledger::{Grains, Ledger, LedgerError, ProcessOutcome, TransactionType};
use atrium_engine::marketplace::{
    AuctionEngine, AuctionError, AuctionOutcome, Listing, PurchaseOutcome,
};
use atrium_engine::rewards::{AdvanceOutcome, Quest, RewardEngine, RewardError};
use atrium_engine::store::{Account, AccountStore, ListingStore, StoreError};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Account repository (reads; mutations go through the engines).
    pub accounts: Arc<dyn AccountStore>,
    /// Listing repository (reads and the active-listings gauge).
    pub listings: Arc<dyn ListingStore>,
    /// The transaction ledger.
    pub ledger: Arc<Ledger>,
    /// Marketplace listings and auctions.
    pub auctions: Arc<AuctionEngine>,
    /// XP, levels, and quest payouts.
    pub rewards: Arc<RewardEngine>,
}

impl AppState {
    fn refresh_listing_gauge(&self) {
        if let Ok(active) = self.listings.active() {
            self.metrics.active_listings.set(active.len() as i64);
        }
    }
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An HTTP-mapped engine error.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::DuplicateKey { .. } | StoreError::VersionConflict { .. } => {
                StatusCode::CONFLICT
            }
            StoreError::BalanceUnderflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Store(inner) => inner.into(),
            LedgerError::InvalidAmount { .. }
            | LedgerError::MissingParty { .. }
            | LedgerError::SelfTransfer { .. }
            | LedgerError::FeeExceedsAmount { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            LedgerError::AccountLocked { .. } => ApiError::new(StatusCode::FORBIDDEN, e.to_string()),
            LedgerError::InsufficientBalance { .. }
            | LedgerError::RefundExceedsRemaining { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            LedgerError::InvalidState { .. } => ApiError::new(StatusCode::CONFLICT, e.to_string()),
            LedgerError::Expired { .. } => ApiError::new(StatusCode::GONE, e.to_string()),
            LedgerError::Gateway(GatewayError::Timeout { .. }) => {
                ApiError::new(StatusCode::GATEWAY_TIMEOUT, e.to_string())
            }
            LedgerError::Gateway(_) => ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

impl From<AuctionError> for ApiError {
    fn from(e: AuctionError) -> Self {
        match e {
            AuctionError::Store(inner) => inner.into(),
            AuctionError::Ledger(inner) => inner.into(),
            AuctionError::NotAnAuction { .. }
            | AuctionError::NotFixedPrice { .. }
            | AuctionError::BidTooLow { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            AuctionError::SellerOwnListing { .. }
            | AuctionError::NotSeller { .. }
            | AuctionError::ReservedForOther { .. } => {
                ApiError::new(StatusCode::FORBIDDEN, e.to_string())
            }
            AuctionError::BidExceedsBalance { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AuctionError::AuctionEnded { .. } => ApiError::new(StatusCode::GONE, e.to_string()),
            AuctionError::InvalidState { .. }
            | AuctionError::AuctionStillRunning { .. }
            | AuctionError::StaleBid { .. }
            | AuctionError::HasBids { .. } => ApiError::new(StatusCode::CONFLICT, e.to_string()),
        }
    }
}

impl From<RewardError> for ApiError {
    fn from(e: RewardError) -> Self {
        match e {
            RewardError::Store(inner) => inner.into(),
            RewardError::Ledger(inner) => inner.into(),
            RewardError::InvalidExperience { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            RewardError::QuestNotStarted { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, e.to_string())
            }
            RewardError::QuestAlreadyStarted { .. }
            | RewardError::QuestAlreadyCompleted { .. }
            | RewardError::QuestAbandoned { .. } => {
                ApiError::new(StatusCode::CONFLICT, e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Request body for `POST /accounts`.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Stable account identifier.
    pub id: String,
    /// Opening balance in grains.
    #[serde(default)]
    pub opening_balance: Grains,
}

/// Request body for `POST /transactions`.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub sender_id: Option<String>,
    pub recipient_id: Option<String>,
    /// Gross amount in grains.
    pub amount: Grains,
    pub tx_type: TransactionType,
    pub reference: Option<String>,
}

/// Response body wrapping a processed transaction with its outcome.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// One of `completed`, `held_for_review`, `already_settled`.
    pub outcome: String,
    pub transaction: atrium_engine::ledger::Transaction,
}

/// Request body for `POST /transactions/:id/refund`.
#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    /// Grains to refund. Omit to refund everything still refundable.
    pub amount: Option<Grains>,
    /// Audit reason recorded on the refund transaction.
    pub reason: Option<String>,
}

/// Request body for `POST /transactions/:id/cancel`.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// Audit reason recorded on the cancelled transaction.
    pub reason: Option<String>,
}

/// Request body for `POST /listings`.
#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub seller_id: String,
    pub name: String,
    /// Asking price (fixed-price) or starting price (auction), in grains.
    pub price: Grains,
    #[serde(default)]
    pub is_auction: bool,
    /// Optional auction sale floor in grains.
    pub reserve_price: Option<Grains>,
}

/// Request body for `POST /listings/:id/bids`.
#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub bidder_id: String,
    pub amount: Grains,
}

/// Request body for `POST /listings/:id/buy`.
#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub buyer_id: String,
}

/// Response body for `POST /listings/:id/end`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EndAuctionResponse {
    /// One of `sold`, `reserve_not_met`, `no_bids`, `held_for_review`.
    pub outcome: String,
    pub listing: Listing,
    pub transaction: Option<atrium_engine::ledger::Transaction>,
}

/// Request body for the quest progression endpoints.
#[derive(Debug, Deserialize)]
pub struct QuestUserRequest {
    pub user_id: String,
}

/// Request body for `POST /quests/:id/advance`.
#[derive(Debug, Deserialize)]
pub struct AdvanceQuestRequest {
    pub user_id: String,
    /// Units of progress to add.
    pub units: u64,
}

/// Response body for `POST /quests/:id/complete` (and completing advances).
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestCompletionResponse {
    pub completed: bool,
    pub xp_awarded: u64,
    pub coin_transaction: Option<atrium_engine::ledger::Transaction>,
    pub new_level: Option<u32>,
    pub progress: atrium_engine::rewards::QuestProgress,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Currency ticker.
    pub currency: String,
    /// Listings currently active.
    pub active_listings: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/accounts", post(create_account_handler))
        .route("/accounts/:id", get(get_account_handler))
        .route("/transactions", post(create_transaction_handler))
        .route("/transactions/:id", get(get_transaction_handler))
        .route("/transactions/:id/process", post(process_transaction_handler))
        .route("/transactions/:id/release", post(release_transaction_handler))
        .route("/transactions/:id/cancel", post(cancel_transaction_handler))
        .route("/transactions/:id/refund", post(refund_transaction_handler))
        .route("/listings", post(create_listing_handler))
        .route("/listings/:id", get(get_listing_handler))
        .route("/listings/:id/publish", post(publish_listing_handler))
        .route(
            "/listings/:id/bids",
            get(bid_history_handler).post(place_bid_handler),
        )
        .route("/listings/:id/buy", post(buy_listing_handler))
        .route("/listings/:id/end", post(end_auction_handler))
        .route("/quests", post(create_quest_handler))
        .route("/quests/:id/start", post(start_quest_handler))
        .route("/quests/:id/advance", post(advance_quest_handler))
        .route("/quests/:id/complete", post(complete_quest_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers: health & status
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators. It intentionally does not
/// check internal subsystem health — that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — node status summary.
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let active = state.listings.active()?;
    Ok(Json(StatusResponse {
        version: state.version.clone(),
        currency: config::CURRENCY_NAME.to_string(),
        active_listings: active.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// Handlers: accounts
// ---------------------------------------------------------------------------

/// `POST /accounts` — creates a new level-1 account.
async fn create_account_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = Account::new(req.id, req.opening_balance);
    state.accounts.insert(account.clone())?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// `GET /accounts/:id` — account state.
async fn get_account_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.accounts.get(&id)?))
}

// ---------------------------------------------------------------------------
// Handlers: transactions
// ---------------------------------------------------------------------------

/// `POST /transactions` — validates and records a pending transaction.
async fn create_transaction_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx = state.ledger.create(
        req.sender_id.as_deref(),
        req.recipient_id.as_deref(),
        req.amount,
        req.tx_type,
        req.reference,
    )?;
    Ok((StatusCode::CREATED, Json(tx)))
}

/// `GET /transactions/:id` — transaction by id.
async fn get_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.ledger.transaction(&id)?))
}

fn outcome_response(state: &AppState, outcome: ProcessOutcome) -> ProcessResponse {
    match outcome {
        ProcessOutcome::Completed(tx) => {
            state.metrics.transactions_completed_total.inc();
            state.metrics.fees_burned_grains_total.inc_by(tx.fee);
            ProcessResponse {
                outcome: "completed".into(),
                transaction: tx,
            }
        }
        ProcessOutcome::HeldForReview(tx) => {
            state.metrics.transactions_held_total.inc();
            ProcessResponse {
                outcome: "held_for_review".into(),
                transaction: tx,
            }
        }
        ProcessOutcome::AlreadySettled(tx) => ProcessResponse {
            outcome: "already_settled".into(),
            transaction: tx,
        },
    }
}

/// `POST /transactions/:id/process` — settles a pending transaction.
async fn process_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let timer = state.metrics.transaction_latency_seconds.start_timer();
    let result = state.ledger.process(&id);
    timer.observe_duration();

    match result {
        Ok(outcome) => Ok(Json(outcome_response(&state, outcome))),
        Err(e) => {
            state.metrics.transactions_failed_total.inc();
            Err(e.into())
        }
    }
}

/// `POST /transactions/:id/release` — clears a manual-review hold and
/// settles. Reviewer operation.
async fn release_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let outcome = state.ledger.release_review(&id)?;
    Ok(Json(outcome_response(&state, outcome)))
}

/// `POST /transactions/:id/cancel` — cancels before settlement.
async fn cancel_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<CancelRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = body.and_then(|Json(req)| req.reason);
    Ok(Json(state.ledger.cancel(&id, reason.as_deref())?))
}

/// `POST /transactions/:id/refund` — refunds a completed transaction,
/// fully or partially.
async fn refund_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<RefundRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let refund = state.ledger.refund(&id, req.amount, req.reason.as_deref())?;
    state.metrics.transactions_completed_total.inc();
    Ok((StatusCode::CREATED, Json(refund)))
}

// ---------------------------------------------------------------------------
// Handlers: marketplace
// ---------------------------------------------------------------------------

/// `POST /listings` — creates a draft listing.
async fn create_listing_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // The seller must exist before anything can be listed on their behalf.
    state.accounts.get(&req.seller_id)?;

    let listing = if req.is_auction {
        Listing::auction(req.seller_id, req.name, req.price, req.reserve_price)
    } else {
        Listing::fixed_price(req.seller_id, req.name, req.price)
    };
    let stored = state.auctions.create_listing(listing)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `GET /listings/:id` — listing by id.
async fn get_listing_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.auctions.listing(&id)?))
}

/// `POST /listings/:id/publish` — takes a draft listing live.
async fn publish_listing_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state.auctions.publish(&id)?;
    state.refresh_listing_gauge();
    Ok(Json(listing))
}

/// `GET /listings/:id/bids` — bid history in placement order.
async fn bid_history_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.auctions.bid_history(&id)?))
}

/// `POST /listings/:id/bids` — places an auction bid.
async fn place_bid_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<PlaceBidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bid = state.auctions.place_bid(&id, &req.bidder_id, req.amount)?;
    state.metrics.bids_placed_total.inc();
    Ok((StatusCode::CREATED, Json(bid)))
}

/// `POST /listings/:id/buy` — buys a fixed-price listing outright.
async fn buy_listing_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<BuyRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let outcome = state.auctions.buy_now(&id, &req.buyer_id)?;
    state.refresh_listing_gauge();
    let resp = match outcome {
        PurchaseOutcome::Sold { transaction, .. } => {
            state.metrics.transactions_completed_total.inc();
            state
                .metrics
                .fees_burned_grains_total
                .inc_by(transaction.fee);
            ProcessResponse {
                outcome: "completed".into(),
                transaction,
            }
        }
        PurchaseOutcome::HeldForReview { transaction, .. } => {
            state.metrics.transactions_held_total.inc();
            ProcessResponse {
                outcome: "held_for_review".into(),
                transaction,
            }
        }
    };
    Ok(Json(resp))
}

/// `POST /listings/:id/end` — settles an auction whose deadline passed.
async fn end_auction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<EndAuctionResponse>, ApiError> {
    let outcome = state.auctions.end_auction(&id, chrono::Utc::now())?;
    state.metrics.auctions_settled_total.inc();
    state.refresh_listing_gauge();

    let resp = match outcome {
        AuctionOutcome::Sold {
            listing,
            transaction,
        } => {
            state.metrics.transactions_completed_total.inc();
            state
                .metrics
                .fees_burned_grains_total
                .inc_by(transaction.fee);
            EndAuctionResponse {
                outcome: "sold".into(),
                listing,
                transaction: Some(transaction),
            }
        }
        AuctionOutcome::ReserveNotMet { listing, .. } => EndAuctionResponse {
            outcome: "reserve_not_met".into(),
            listing,
            transaction: None,
        },
        AuctionOutcome::NoBids { listing } => EndAuctionResponse {
            outcome: "no_bids".into(),
            listing,
            transaction: None,
        },
        AuctionOutcome::HeldForReview {
            listing,
            transaction,
        } => {
            state.metrics.transactions_held_total.inc();
            EndAuctionResponse {
                outcome: "held_for_review".into(),
                listing,
                transaction: Some(transaction),
            }
        }
    };
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// Handlers: quests & rewards
// ---------------------------------------------------------------------------

/// `POST /quests` — defines a quest.
async fn create_quest_handler(
    State(state): State<AppState>,
    Json(quest): Json<Quest>,
) -> Result<impl IntoResponse, ApiError> {
    let quest = state.rewards.define_quest(quest)?;
    Ok((StatusCode::CREATED, Json(quest)))
}

/// `POST /quests/:id/start` — starts a quest for a user.
async fn start_quest_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<QuestUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let progress = state.rewards.start_quest(&req.user_id, &id)?;
    Ok((StatusCode::CREATED, Json(progress)))
}

fn completion_response(
    state: &AppState,
    completion: atrium_engine::rewards::QuestCompletion,
) -> QuestCompletionResponse {
    state.metrics.quests_completed_total.inc();
    if let Some(tx) = &completion.coin_transaction {
        state.metrics.transactions_completed_total.inc();
        state.metrics.fees_burned_grains_total.inc_by(tx.fee);
    }
    let new_level = completion
        .progression
        .as_ref()
        .filter(|p| p.leveled_up())
        .map(|p| p.new_level);
    QuestCompletionResponse {
        completed: true,
        xp_awarded: completion.xp_awarded,
        coin_transaction: completion.coin_transaction,
        new_level,
        progress: completion.progress,
    }
}

/// `POST /quests/:id/advance` — adds progress, completing and paying if
/// the target is reached.
async fn advance_quest_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<AdvanceQuestRequest>,
) -> Result<Json<QuestCompletionResponse>, ApiError> {
    match state.rewards.advance_progress(&req.user_id, &id, req.units)? {
        AdvanceOutcome::Advanced(progress) => Ok(Json(QuestCompletionResponse {
            completed: false,
            xp_awarded: 0,
            coin_transaction: None,
            new_level: None,
            progress,
        })),
        AdvanceOutcome::Completed(completion) => {
            Ok(Json(completion_response(&state, completion)))
        }
    }
}

/// `POST /quests/:id/complete` — completes a quest and pays its rewards.
async fn complete_quest_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<QuestUserRequest>,
) -> Result<Json<QuestCompletionResponse>, ApiError> {
    let completion = state.rewards.complete_quest(&req.user_id, &id)?;
    Ok(Json(completion_response(&state, completion)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
