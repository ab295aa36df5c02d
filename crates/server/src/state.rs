//! Shared application state.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::mailer::{Mailer, PgMailStore};
use crate::services::oauth::OAuthClient;
use crate::services::session::SessionSigner;
use crate::services::transport::{ResendClient, TransportError};

/// Shared application state, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    oauth: OAuthClient,
    mailer: Mailer<ResendClient>,
    signer: SessionSigner,
}

impl AppState {
    /// Build the state from configuration and an established pool.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the email client cannot be constructed.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, TransportError> {
        let oauth = OAuthClient::new(&config.oauth);
        let transport = ResendClient::new(&config.email)?;
        let mailer = Mailer::new(
            transport,
            PgMailStore::new(pool.clone()),
            config.email.from_address.clone(),
        );
        let signer = SessionSigner::new(config.session_secret.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                oauth,
                mailer,
                signer,
            }),
        })
    }

    /// Application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Identity provider OAuth client.
    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }

    /// Email dispatcher.
    #[must_use]
    pub fn mailer(&self) -> &Mailer<ResendClient> {
        &self.inner.mailer
    }

    /// Session token signer.
    #[must_use]
    pub fn signer(&self) -> &SessionSigner {
        &self.inner.signer
    }
}
