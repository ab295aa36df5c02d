//! Authentication routes.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::state::AppState;

/// `POST /auth/login` request body.
///
/// `state` is echoed back to the caller for its own CSRF bookkeeping; the
/// server does not hold flow state between the redirect and this call.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Authorization code from the provider redirect.
    pub code: Option<String>,
    /// Opaque CSRF state from the caller's flow.
    pub state: Option<String>,
    /// PKCE code verifier matching the original challenge.
    pub code_verifier: Option<String>,
}

/// Exchange an authorization code for a verified identity and a session
/// token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = state
        .oauth()
        .exchange_code(
            request.code.as_deref().unwrap_or(""),
            request.code_verifier.as_deref().unwrap_or(""),
        )
        .await?;

    let token = state.signer().mint(&identity.subject_id);
    tracing::info!(subject_id = %identity.subject_id, "login exchange completed");

    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": identity,
        "state": request.state,
    })))
}
