//! HTTP route handlers.

pub mod auth;
pub mod ops;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Application routes (health endpoints are mounted separately).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/ops/digest/run", post(ops::run_digest))
        .route("/ops/emails/welcome", post(ops::send_welcome))
        .route("/ops/email-logs/failures", get(ops::recent_failures))
        .route("/ops/email-logs/stats", get(ops::email_log_stats))
}
