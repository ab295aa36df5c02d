//! Database operations for the Stride `PostgreSQL` store.
//!
//! ## Tables
//!
//! - `users` - Account records synced from the identity provider
//! - `goals` - SMART goals owned by users (read-only for this core)
//! - `email_templates` - Named HTML/text bodies with `{{variable}}` placeholders
//! - `email_logs` - One row per send attempt (pending -> sent/failed)
//! - `digest_runs` - Aggregate statistics per weekly digest batch run
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and embedded via
//! [`MIGRATOR`]. They are NOT run automatically on startup; apply them
//! explicitly with `sqlx migrate run` (or `MIGRATOR.run(&pool)` from an
//! operational tool).

pub mod digest_runs;
pub mod email_log;
pub mod goals;
pub mod templates;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use digest_runs::{DigestRunRepository, DigestRunStats};
pub use email_log::{EmailLog, EmailLogRepository, EmailStatus, NewEmailLog};
pub use goals::GoalRepository;
pub use templates::{EmailTemplateRecord, EmailTemplateRepository};
pub use users::UserRepository;

/// Embedded migrations for the Stride schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
