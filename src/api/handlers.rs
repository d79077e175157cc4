//! REST API handlers for coordinator operations

use crate::backend::{AddressInfo, Balance};
use crate::core::{Coin, Transaction, TxOptions};
use crate::events::EventBus;
use crate::multisig::{
    AuthGate, CosignerDetails, CosignerOptions, MultisigError, MultisigManager, ProposalTxView,
    ProposalView, SendView, VoteView, WalletInfo, WalletOptions, WalletView,
};
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<MultisigManager>,
    pub events: Arc<EventBus>,
}

impl ApiState {
    pub fn new(manager: Arc<MultisigManager>) -> Self {
        let events = manager.events();
        Self { manager, events }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RescanResponse {
    pub success: bool,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct InfoQuery {
    #[serde(default)]
    pub details: bool,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub join_key: String,
    #[serde(flatten)]
    pub cosigner: CosignerOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct RotateRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RescanRequest {
    #[serde(default)]
    pub height: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    #[serde(default)]
    pub memo: String,
    #[serde(flatten)]
    pub options: TxOptions,
}

#[derive(Debug, Deserialize)]
pub struct ProposalQuery {
    #[serde(default = "default_pending")]
    pub pending: bool,
}

fn default_pending() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct ProposalTxQuery {
    #[serde(default)]
    pub paths: bool,
    #[serde(default)]
    pub scripts: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub signatures: Vec<String>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Bearer token from the `Authorization` header
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()
        .and_then(AuthGate::parse_bearer)
}

/// HTTP status for a coordinator error
pub fn status_for(err: &MultisigError) -> StatusCode {
    match err {
        MultisigError::AuthenticationError | MultisigError::BadToken => StatusCode::UNAUTHORIZED,
        MultisigError::WalletNotFound(_) | MultisigError::ProposalNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        MultisigError::WalletFull
        | MultisigError::DuplicateVote(_)
        | MultisigError::InvalidState(_)
        | MultisigError::CoinsLocked(_)
        | MultisigError::WalletExists(_) => StatusCode::CONFLICT,
        MultisigError::InsufficientFunds(_)
        | MultisigError::InvalidSignature
        | MultisigError::InvalidOptions(_)
        | MultisigError::NotRemovable(_) => StatusCode::BAD_REQUEST,
        MultisigError::Backend(_) => StatusCode::BAD_GATEWAY,
        MultisigError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply<T>(result: Result<T, MultisigError>) -> ApiResult<T> {
    result.map(Json).map_err(|e| {
        let status = status_for(&e);
        if status.is_server_error() {
            log::error!("Request failed: {}", e);
        }
        (status, Json(ApiError { error: e.to_string() }))
    })
}

// ============================================================================
// Wallet Handlers
// ============================================================================

/// GET /health - Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/multisig - List shared wallets (admin)
pub async fn list_wallets(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Vec<String>> {
    reply(state.manager.wallet_ids(bearer(&headers)).await)
}

/// PUT /api/multisig/{id} - Create a shared wallet
pub async fn create_wallet(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(options): Json<WalletOptions>,
) -> ApiResult<WalletView> {
    reply(state.manager.create_wallet(&id, options).await)
}

/// GET /api/multisig/{id} - Wallet info, `null` when unknown
pub async fn get_wallet(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<InfoQuery>,
    headers: HeaderMap,
) -> ApiResult<Option<WalletInfo>> {
    reply(
        state
            .manager
            .get_info(&id, bearer(&headers), query.details)
            .await,
    )
}

/// DELETE /api/multisig/{id} - Remove a shared wallet (admin)
pub async fn remove_wallet(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<RemoveResponse> {
    reply(
        state
            .manager
            .remove_wallet(&id, bearer(&headers))
            .await
            .map(|removed| RemoveResponse { removed }),
    )
}

/// POST /api/multisig/{id}/join - Join with the wallet's join key
pub async fn join_wallet(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<WalletView> {
    reply(state.manager.join(&id, &req.join_key, req.cosigner).await)
}

/// PUT /api/multisig/{id}/token - Rotate the caller's token
pub async fn rotate_token(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RotateRequest>,
) -> ApiResult<CosignerDetails> {
    reply(
        state
            .manager
            .rotate_token(&id, bearer(&headers), req.token.as_deref())
            .await,
    )
}

/// POST /api/rescan - Rescan from a height (admin)
pub async fn rescan(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<RescanRequest>,
) -> ApiResult<RescanResponse> {
    reply(
        state
            .manager
            .rescan(bearer(&headers), req.height)
            .await
            .map(|()| RescanResponse { success: true }),
    )
}

// ============================================================================
// Proxy Handlers
// ============================================================================

/// GET /api/multisig/{id}/balance
pub async fn get_balance(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Balance> {
    reply(state.manager.balance(&id, bearer(&headers)).await)
}

/// GET /api/multisig/{id}/coin
pub async fn get_coins(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Vec<Coin>> {
    reply(state.manager.coins(&id, bearer(&headers)).await)
}

/// POST /api/multisig/{id}/address
pub async fn create_address(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<AddressInfo> {
    reply(state.manager.create_address(&id, bearer(&headers)).await)
}

/// POST /api/multisig/{id}/create - Build an unsigned transaction
pub async fn create_tx(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(options): Json<TxOptions>,
) -> ApiResult<Transaction> {
    reply(
        state
            .manager
            .create_tx(&id, bearer(&headers), &options)
            .await,
    )
}

// ============================================================================
// Proposal Handlers
// ============================================================================

/// POST /api/multisig/{id}/proposal
pub async fn create_proposal(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ProposalRequest>,
) -> ApiResult<ProposalView> {
    reply(
        state
            .manager
            .create_proposal(&id, bearer(&headers), &req.memo, &req.options)
            .await,
    )
}

/// GET /api/multisig/{id}/proposal?pending=bool
pub async fn list_proposals(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<ProposalQuery>,
    headers: HeaderMap,
) -> ApiResult<Vec<ProposalView>> {
    reply(
        state
            .manager
            .proposals(&id, bearer(&headers), query.pending)
            .await,
    )
}

/// GET /api/multisig/{id}/proposal/{pid}
pub async fn get_proposal(
    State(state): State<ApiState>,
    Path((id, pid)): Path<(String, u32)>,
    headers: HeaderMap,
) -> ApiResult<ProposalView> {
    reply(state.manager.proposal(&id, bearer(&headers), pid).await)
}

/// GET /api/multisig/{id}/proposal/{pid}/tx?paths&scripts
pub async fn get_proposal_tx(
    State(state): State<ApiState>,
    Path((id, pid)): Path<(String, u32)>,
    Query(query): Query<ProposalTxQuery>,
    headers: HeaderMap,
) -> ApiResult<ProposalTxView> {
    reply(
        state
            .manager
            .proposal_tx(&id, bearer(&headers), pid, query.paths, query.scripts)
            .await,
    )
}

/// POST /api/multisig/{id}/proposal/{pid}/approve
pub async fn approve_proposal(
    State(state): State<ApiState>,
    Path((id, pid)): Path<(String, u32)>,
    headers: HeaderMap,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<VoteView> {
    reply(
        state
            .manager
            .approve(&id, bearer(&headers), pid, &req.signatures)
            .await,
    )
}

/// POST /api/multisig/{id}/proposal/{pid}/reject
pub async fn reject_proposal(
    State(state): State<ApiState>,
    Path((id, pid)): Path<(String, u32)>,
    headers: HeaderMap,
) -> ApiResult<VoteView> {
    reply(state.manager.reject(&id, bearer(&headers), pid).await)
}

/// POST /api/multisig/{id}/proposal/{pid}/send
pub async fn send_proposal(
    State(state): State<ApiState>,
    Path((id, pid)): Path<(String, u32)>,
    headers: HeaderMap,
) -> ApiResult<SendView> {
    reply(state.manager.send(&id, bearer(&headers), pid).await)
}
