//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket event sessions
        .route("/ws", get(ws_handler))
        // Wallets
        .route("/api/multisig", get(handlers::list_wallets))
        .route(
            "/api/multisig/{id}",
            put(handlers::create_wallet)
                .get(handlers::get_wallet)
                .delete(handlers::remove_wallet),
        )
        .route("/api/multisig/{id}/join", post(handlers::join_wallet))
        .route("/api/multisig/{id}/token", put(handlers::rotate_token))
        .route("/api/rescan", post(handlers::rescan))
        // Backend proxy
        .route("/api/multisig/{id}/balance", get(handlers::get_balance))
        .route("/api/multisig/{id}/coin", get(handlers::get_coins))
        .route("/api/multisig/{id}/address", post(handlers::create_address))
        .route("/api/multisig/{id}/create", post(handlers::create_tx))
        // Proposals
        .route(
            "/api/multisig/{id}/proposal",
            post(handlers::create_proposal).get(handlers::list_proposals),
        )
        .route(
            "/api/multisig/{id}/proposal/{pid}",
            get(handlers::get_proposal),
        )
        .route(
            "/api/multisig/{id}/proposal/{pid}/tx",
            get(handlers::get_proposal_tx),
        )
        .route(
            "/api/multisig/{id}/proposal/{pid}/approve",
            post(handlers::approve_proposal),
        )
        .route(
            "/api/multisig/{id}/proposal/{pid}/reject",
            post(handlers::reject_proposal),
        )
        .route(
            "/api/multisig/{id}/proposal/{pid}/send",
            post(handlers::send_proposal),
        )
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
