//! Web server module for receiving site update notifications.
//!
//! Routes:
//! - `GET /health`
//! - `POST /notify/:site` (and the legacy `POST /webhook/:site`)

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, notify, AppState, HealthResponse, NotifyResponse};
pub use signature::{
    check_signature, compute_signature, parse_signature_header, verify_notification,
    verify_signature, SignatureError, SIGNATURE_HEADER,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/notify/:site", post(notify))
        .route("/webhook/:site", post(notify))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
