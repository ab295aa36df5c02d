//! Operator routes.
//!
//! Deploy-internal surface for kicking off a digest run out of schedule,
//! sending the welcome email, and reconciling email log failures. These
//! sit behind the platform's private network, not end-user auth.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::db::EmailLogRepository;
use crate::error::AppError;
use crate::jobs::WeeklyDigestJob;
use crate::services::mailer::{EmailOptions, TemplateName};
use crate::state::AppState;

/// `POST /ops/digest/run` - run the weekly digest batch immediately.
pub async fn run_digest(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let job = WeeklyDigestJob::new(
        state.pool().clone(),
        state.mailer().clone(),
        state.config().digest.clone(),
    );
    let stats = job.run().await?;

    Ok(Json(json!({
        "total_users": stats.total_users,
        "success_count": stats.success_count,
        "error_count": stats.error_count,
        "success_rate": stats.success_rate(),
    })))
}

/// `POST /ops/emails/welcome` request body.
#[derive(Debug, Deserialize)]
pub struct WelcomeRequest {
    /// Recipient address.
    pub to: String,
    /// Name substituted into the template.
    pub name: String,
}

/// `POST /ops/emails/welcome` - send the welcome email to one recipient.
pub async fn send_welcome(
    State(state): State<AppState>,
    Json(request): Json<WelcomeRequest>,
) -> Result<Json<Value>, AppError> {
    let mut variables = HashMap::new();
    variables.insert("name".to_string(), request.name);

    let receipt = state
        .mailer()
        .send(EmailOptions {
            to: request.to,
            subject: "Welcome to Stride".to_string(),
            template: Some(TemplateName::Welcome),
            variables,
            ..Default::default()
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "log_id": receipt.log_id,
        "message_id": receipt.message_id,
    })))
}

/// `GET /ops/email-logs/failures` query parameters.
#[derive(Debug, Deserialize)]
pub struct FailuresQuery {
    /// Maximum rows to return.
    pub limit: Option<i64>,
}

/// `GET /ops/email-logs/failures` - recent failed sends, newest first.
pub async fn recent_failures(
    State(state): State<AppState>,
    Query(query): Query<FailuresQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let failures = EmailLogRepository::new(state.pool())
        .recent_failures(limit)
        .await?;

    let items: Vec<Value> = failures
        .into_iter()
        .map(|log| {
            json!({
                "id": log.id,
                "recipient": log.recipient,
                "subject": log.subject,
                "template": log.template,
                "email_type": log.email_type,
                "error_message": log.error_message,
                "failed_at": log.failed_at,
                "created_at": log.created_at,
            })
        })
        .collect();

    Ok(Json(json!({ "failures": items })))
}

/// `GET /ops/email-logs/stats` - log row counts per delivery status.
pub async fn email_log_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let counts = EmailLogRepository::new(state.pool())
        .status_counts()
        .await?;

    let stats: serde_json::Map<String, Value> = counts
        .into_iter()
        .map(|(status, count)| (status, json!(count)))
        .collect();

    Ok(Json(json!({ "counts": stats })))
}
