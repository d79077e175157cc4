//! REST API module
//!
//! Provides HTTP and WebSocket access to the coordinator. Callers
//! authenticate with `Authorization: Bearer <token>`.
//!
//! # Endpoints
//!
//! ## Wallets
//! - `GET /api/multisig` - List shared wallets (admin)
//! - `PUT /api/multisig/{id}` - Create wallet
//! - `GET /api/multisig/{id}?details=bool` - Wallet info
//! - `DELETE /api/multisig/{id}` - Remove wallet (admin)
//! - `POST /api/multisig/{id}/join` - Join with the join key
//! - `PUT /api/multisig/{id}/token` - Rotate own token
//! - `POST /api/rescan` - Rescan (admin)
//!
//! ## Proxy
//! - `GET /api/multisig/{id}/balance`, `GET /api/multisig/{id}/coin`
//! - `POST /api/multisig/{id}/address`, `POST /api/multisig/{id}/create`
//!
//! ## Proposals
//! - `POST|GET /api/multisig/{id}/proposal`
//! - `GET /api/multisig/{id}/proposal/{pid}` and `.../tx`
//! - `POST /api/multisig/{id}/proposal/{pid}/approve|reject|send`
//!
//! ## WebSocket
//! - `GET /ws` - Event sessions (join, proposal created/approved/rejected)

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
