//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STRIDE_DATABASE_URL` - `PostgreSQL` connection string
//! - `STRIDE_BASE_URL` - Public URL for the API server
//! - `STRIDE_ALLOWED_ORIGIN` - Origin allowed to call the login endpoint (CORS)
//! - `STRIDE_SESSION_SECRET` - Session token signing secret (min 32 chars, high entropy)
//! - `GOOGLE_CLIENT_ID` - OAuth client ID for the identity provider
//! - `GOOGLE_CLIENT_SECRET` - OAuth client secret
//! - `GOOGLE_REDIRECT_URI` - Registered OAuth redirect URI
//! - `RESEND_API_KEY` - Transactional email transport API key
//! - `EMAIL_FROM` - Email sender address
//!
//! ## Optional
//! - `STRIDE_HOST` - Bind address (default: 127.0.0.1)
//! - `STRIDE_PORT` - Listen port (default: 3001)
//! - `GOOGLE_TOKEN_URL` - Token endpoint override (default: Google's)
//! - `GOOGLE_USERINFO_URL` - Userinfo endpoint override (default: Google's)
//! - `RESEND_BASE_URL` - Email transport base URL override
//! - `DIGEST_BATCH_SIZE` - Concurrent sends per digest batch (default: 10)
//! - `DIGEST_BATCH_DELAY_MS` - Pause between digest batches (default: 1000)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the API server
    pub base_url: String,
    /// Origin allowed to call the login endpoint (CORS)
    pub allowed_origin: String,
    /// Session token signing secret
    pub session_secret: SecretString,
    /// Identity provider OAuth configuration
    pub oauth: OAuthConfig,
    /// Transactional email transport configuration
    pub email: EmailConfig,
    /// Weekly digest batch job tuning
    pub digest: DigestConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Identity provider OAuth configuration (authorization code + PKCE).
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Registered redirect URI (trusted configuration, never client input)
    pub redirect_uri: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Userinfo endpoint URL
    pub userinfo_url: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .finish()
    }
}

/// Transactional email transport configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct EmailConfig {
    /// Transport API key (bearer credential)
    pub api_key: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
    /// Transport API base URL
    pub base_url: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Weekly digest batch job tuning.
///
/// The defaults (10 concurrent sends per batch, ~1 second between batches)
/// bound pressure on the email transport. The delay is a fixed courtesy
/// pause, not an adaptive backoff.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Number of recipients processed concurrently per batch
    pub batch_size: usize,
    /// Pause between batches, in milliseconds
    pub batch_delay_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STRIDE_DATABASE_URL")?;
        let host = get_env_or_default("STRIDE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STRIDE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("STRIDE_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("STRIDE_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("STRIDE_BASE_URL")?;
        let allowed_origin = get_required_env("STRIDE_ALLOWED_ORIGIN")?;
        let session_secret = get_validated_secret("STRIDE_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STRIDE_SESSION_SECRET")?;

        let oauth = OAuthConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let digest = DigestConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            allowed_origin,
            session_secret,
            oauth,
            email,
            digest,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl OAuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: get_required_env("GOOGLE_CLIENT_ID")?,
            client_secret: get_validated_secret("GOOGLE_CLIENT_SECRET")?,
            redirect_uri: get_required_env("GOOGLE_REDIRECT_URI")?,
            token_url: get_env_or_default("GOOGLE_TOKEN_URL", DEFAULT_TOKEN_URL),
            userinfo_url: get_env_or_default("GOOGLE_USERINFO_URL", DEFAULT_USERINFO_URL),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("RESEND_API_KEY")?,
            from_address: get_required_env("EMAIL_FROM")?,
            base_url: get_env_or_default("RESEND_BASE_URL", DEFAULT_RESEND_BASE_URL),
        })
    }
}

impl DigestConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let batch_size = get_env_or_default("DIGEST_BATCH_SIZE", "10")
            .parse::<usize>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DIGEST_BATCH_SIZE".to_string(), e.to_string())
            })?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "DIGEST_BATCH_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let batch_delay_ms = get_env_or_default("DIGEST_BATCH_DELAY_MS", "1000")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DIGEST_BATCH_DELAY_MS".to_string(), e.to_string())
            })?;

        Ok(Self {
            batch_size,
            batch_delay_ms,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            allowed_origin: "http://localhost:5173".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            oauth: OAuthConfig {
                client_id: "test_client_id".to_string(),
                client_secret: SecretString::from("test_client_secret"),
                redirect_uri: "http://localhost:5173/callback".to_string(),
                token_url: DEFAULT_TOKEN_URL.to_string(),
                userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            },
            email: EmailConfig {
                api_key: SecretString::from("re_test"),
                from_address: "digest@stride.fit".to_string(),
                base_url: DEFAULT_RESEND_BASE_URL.to_string(),
            },
            digest: DigestConfig {
                batch_size: 10,
                batch_delay_ms: 1000,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3001);
    }

    #[test]
    fn test_oauth_config_debug_redacts_secrets() {
        let config = OAuthConfig {
            client_id: "test_client_id".to_string(),
            client_secret: SecretString::from("super_secret_client_secret"),
            redirect_uri: "http://localhost:5173/callback".to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
        };

        let debug_output = format!("{config:?}");

        // Public fields should be visible
        assert!(debug_output.contains("test_client_id"));
        assert!(debug_output.contains("callback"));

        // Secret fields should be redacted
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_client_secret"));
    }

    #[test]
    fn test_email_config_debug_redacts_secrets() {
        let config = EmailConfig {
            api_key: SecretString::from("re_super_secret_api_key"),
            from_address: "digest@stride.fit".to_string(),
            base_url: DEFAULT_RESEND_BASE_URL.to_string(),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("digest@stride.fit"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("re_super_secret_api_key"));
    }
}
