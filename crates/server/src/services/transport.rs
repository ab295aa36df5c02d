//! Outbound email transport.
//!
//! [`EmailTransport`] is the seam the mailer depends on, so tests can
//! substitute a stub without touching a real provider. [`ResendClient`]
//! is the production implementation against the Resend HTTP API.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmailConfig;

/// Errors returned by the email transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Provider rate limit hit; retry after the given number of seconds.
    #[error("email transport rate limited, retry after {0}s")]
    RateLimited(u64),

    /// API key rejected.
    #[error("email transport authentication failed")]
    Unauthorized,

    /// Provider returned an API-level error.
    #[error("email transport error ({status}): {message}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider error message.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("failed to parse transport response: {0}")]
    Parse(String),
}

/// A fully-rendered email ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    /// Sender address (From header).
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Rendered HTML body.
    pub html: String,
    /// Plain-text alternative, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reply-To address, if different from the sender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Extra message headers (e.g. the priority header).
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub headers: std::collections::HashMap<String, String>,
}

/// Provider acknowledgement for an accepted email.
#[derive(Debug, Clone, Deserialize)]
pub struct SentEmail {
    /// Provider-assigned message id.
    pub id: String,
}

/// Delivery seam between the mailer and the outside world.
///
/// Implementations must be cheap to clone and safe to share across tasks.
pub trait EmailTransport: Send + Sync {
    /// Deliver one email, returning the provider acknowledgement.
    fn send(
        &self,
        email: &OutgoingEmail,
    ) -> impl Future<Output = Result<SentEmail, TransportError>> + Send;
}

/// Resend HTTP API client.
#[derive(Clone)]
pub struct ResendClient {
    inner: Arc<ResendClientInner>,
}

struct ResendClientInner {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl ResendClient {
    /// Create a new Resend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Parse` if the API key contains characters
    /// that cannot form an HTTP header value.
    pub fn new(config: &EmailConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth_value = HeaderValue::from_str(&bearer)
            .map_err(|e| TransportError::Parse(format!("invalid API key: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ResendClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    async fn parse_error(response: reqwest::Response) -> TransportError {
        let status = response.status();

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                TransportError::RateLimited(retry_after)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized,
            _ => {
                let message = match response.json::<ApiErrorBody>().await {
                    Ok(body) => body.message.unwrap_or_else(|| "unknown error".to_string()),
                    Err(_) => "unknown error".to_string(),
                };
                TransportError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

impl EmailTransport for ResendClient {
    async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, TransportError> {
        let url = format!("{}/emails", self.inner.base_url);
        let response = self.inner.client.post(&url).json(email).send().await?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        response
            .json::<SentEmail>()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))
    }
}

impl std::fmt::Debug for ResendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_client_construction_strips_trailing_slash() {
        let client = ResendClient::new(&EmailConfig {
            api_key: SecretString::from("re_k9vR2mQ8wX4nT7bJ1hL5cF3z"),
            from_address: "digest@stride.fit".to_string(),
            base_url: "https://api.resend.com/".to_string(),
        })
        .unwrap();
        assert_eq!(client.inner.base_url, "https://api.resend.com");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let result = ResendClient::new(&EmailConfig {
            api_key: SecretString::from("bad\nkey"),
            from_address: "digest@stride.fit".to_string(),
            base_url: "https://api.resend.com".to_string(),
        });
        assert!(matches!(result, Err(TransportError::Parse(_))));
    }

    #[test]
    fn test_outgoing_email_omits_empty_optionals() {
        let email = OutgoingEmail {
            from: "digest@stride.fit".to_string(),
            to: "user@example.com".to_string(),
            subject: "Your week".to_string(),
            html: "<p>hi</p>".to_string(),
            text: None,
            reply_to: None,
            headers: std::collections::HashMap::new(),
        };
        let json = serde_json::to_value(&email).unwrap();
        assert!(json.get("text").is_none());
        assert!(json.get("reply_to").is_none());
        assert!(json.get("headers").is_none());
        assert_eq!(json["to"], "user@example.com");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let client = ResendClient::new(&EmailConfig {
            api_key: SecretString::from("re_k9vR2mQ8wX4nT7bJ1hL5cF3z"),
            from_address: "digest@stride.fit".to_string(),
            base_url: "https://api.resend.com".to_string(),
        })
        .unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("re_k9vR2mQ8wX4nT7bJ1hL5cF3z"));
    }
}
