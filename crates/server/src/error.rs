//! Application error handling.
//!
//! [`AppError`] is the single error type handlers return. Conversion into
//! an HTTP response decides the status code, reports server-side errors to
//! Sentry, and makes sure internal detail (SQL, connection strings,
//! provider payloads) never reaches the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::mailer::MailerError;
use crate::services::oauth::OAuthError;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Login exchange failure.
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Email dispatch failure.
    #[error(transparent)]
    Mailer(#[from] MailerError),

    /// Database failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Malformed client request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and client-safe message for this error.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::OAuth(e) => match e {
                // Client-side protocol errors: the caller sent a bad or
                // stale exchange request.
                OAuthError::MissingCode
                | OAuthError::MissingVerifier
                | OAuthError::MissingEmail
                | OAuthError::InvalidEmail(_)
                | OAuthError::TokenExchange { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
                // Provider-side failures after a well-formed request.
                OAuthError::MissingAccessToken
                | OAuthError::ProfileFetch { .. }
                | OAuthError::Http(_) => (
                    StatusCode::BAD_GATEWAY,
                    "identity provider request failed".to_string(),
                ),
            },
            Self::Mailer(e) => match e {
                MailerError::InvalidOptions(_) | MailerError::MissingVariables { .. } => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                MailerError::TemplateNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                MailerError::Repository(_) | MailerError::Transport(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "email dispatch failed".to_string(),
                ),
            },
            Self::Repository(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            Self::Repository(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
            sentry::capture_error(&self);
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_code_is_bad_request() {
        let (status, _) = AppError::OAuth(OAuthError::MissingCode).status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_token_exchange_rejection_is_bad_request() {
        let err = AppError::OAuth(OAuthError::TokenExchange {
            status: 400,
            detail: "invalid_grant".to_string(),
        });
        let (status, _) = err.status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_profile_fetch_failure_is_bad_gateway() {
        let err = AppError::OAuth(OAuthError::ProfileFetch { status: 500 });
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!message.contains("500"));
    }

    #[test]
    fn test_repository_errors_do_not_leak_detail() {
        let err = AppError::Repository(RepositoryError::DataCorruption(
            "invalid email in database: user@".to_string(),
        ));
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("user@"));
    }

    #[test]
    fn test_template_not_found_maps_to_404() {
        let err = AppError::Mailer(MailerError::TemplateNotFound("welcome".to_string()));
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(message.contains("not found"));
    }
}
