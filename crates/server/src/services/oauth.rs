//! OAuth login exchange against the identity provider.
//!
//! Implements the Authorization Code grant with PKCE: the client-supplied
//! code and verifier are exchanged at the token endpoint, the resulting
//! access token is used to fetch the userinfo profile, and the profile is
//! normalized into an [`Identity`].
//!
//! # Contract
//!
//! The unified userinfo endpoint is authoritative and email presence is a
//! hard requirement: a profile without an email fails the exchange with
//! [`OAuthError::MissingEmail`]. There is no tolerant fallback path.
//!
//! Failures are terminal - authorization codes are single-use, so callers
//! must obtain a fresh code before retrying; nothing here retries
//! automatically. The exchange has no side effects beyond the two
//! outbound HTTP calls and persists nothing.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use stride_core::Email;

use crate::config::OAuthConfig;
use crate::models::Identity;

/// Errors that can occur during the login exchange.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// The request carried no authorization code.
    #[error("missing authorization code")]
    MissingCode,

    /// The request carried no PKCE code verifier. Its absence is a client
    /// protocol error, not something to tolerate silently.
    #[error("missing PKCE code verifier")]
    MissingVerifier,

    /// The token endpoint rejected the exchange.
    #[error("token exchange failed with status {status}: {detail}")]
    TokenExchange {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider response body, surfaced as diagnostic detail.
        detail: String,
    },

    /// The token response decoded but carried no access token.
    #[error("token response did not include an access token")]
    MissingAccessToken,

    /// The userinfo endpoint rejected the profile fetch.
    #[error("profile fetch failed with status {status}")]
    ProfileFetch {
        /// HTTP status returned by the provider.
        status: u16,
    },

    /// The profile carried no email address.
    #[error("identity profile did not include an email address")]
    MissingEmail,

    /// The profile email failed validation.
    #[error("identity profile email is invalid: {0}")]
    InvalidEmail(#[from] stride_core::EmailError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Token endpoint response. Only the access token is consumed; refresh
/// tokens and expiry are the caller's concern in flows that keep sessions
/// alive, which this one does not.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Userinfo endpoint response (OpenID Connect standard claims).
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
    locale: Option<String>,
}

/// Identity provider OAuth client.
///
/// Redirect URI and client credentials come from trusted configuration,
/// never from client input.
#[derive(Clone)]
pub struct OAuthClient {
    inner: Arc<OAuthClientInner>,
}

struct OAuthClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    userinfo_url: String,
}

impl OAuthClient {
    /// Create a new OAuth client from configuration.
    #[must_use]
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            inner: Arc::new(OAuthClientInner {
                client: reqwest::Client::new(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
                redirect_uri: config.redirect_uri.clone(),
                token_url: config.token_url.clone(),
                userinfo_url: config.userinfo_url.clone(),
            }),
        }
    }

    /// Generate the authorization URL the client should redirect to,
    /// binding the flow to a CSRF `state` and a PKCE code challenge.
    #[must_use]
    pub fn authorization_url(&self, authorize_url: &str, state: &str, code_challenge: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope=openid%20email%20profile&state={}&code_challenge={}&code_challenge_method=S256",
            authorize_url,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(&self.inner.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge)
        )
    }

    /// Exchange an authorization code (plus PKCE verifier) for a verified
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::MissingCode`/`MissingVerifier` before any
    /// network call if either input is empty. Returns `TokenExchange`,
    /// `MissingAccessToken`, `ProfileFetch` or `MissingEmail` for provider
    /// failures, and `Http` if a request itself fails.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Identity, OAuthError> {
        if code.is_empty() {
            return Err(OAuthError::MissingCode);
        }
        if code_verifier.is_empty() {
            return Err(OAuthError::MissingVerifier);
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.inner.redirect_uri.as_str()),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .inner
            .client
            .post(&self.inner.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The body is diagnostic detail from the provider; it never
            // contains our client secret.
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "token exchange rejected");
            return Err(OAuthError::TokenExchange {
                status: status.as_u16(),
                detail,
            });
        }

        let token: TokenResponse = response.json().await?;
        let access_token = match token.access_token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(OAuthError::MissingAccessToken),
        };

        let response = self
            .inner
            .client
            .get(&self.inner.userinfo_url)
            .bearer_auth(&access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "profile fetch rejected");
            return Err(OAuthError::ProfileFetch {
                status: status.as_u16(),
            });
        }

        let profile: UserInfo = response.json().await?;
        let email = profile.email.ok_or(OAuthError::MissingEmail)?;
        let email = Email::parse(&email)?;

        Ok(Identity {
            subject_id: profile.sub,
            email,
            display_name: profile.name,
            given_name: profile.given_name,
            family_name: profile.family_name,
            picture_url: profile.picture,
            email_verified: profile.email_verified,
            locale: profile.locale,
        })
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.inner.client_id)
            .field("token_url", &self.inner.token_url)
            .finish_non_exhaustive()
    }
}
