//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stride_core::{Email, UserId};

use super::RepositoryError;

/// A user account record.
///
/// Accounts are created elsewhere in the system when a login identity is
/// first linked; this core only reads them.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Stable subject id issued by the identity provider.
    pub subject_id: String,
    /// Account email address.
    pub email: Email,
    /// Display name, if the provider supplied one.
    pub display_name: Option<String>,
    /// Whether the provider has verified the email address.
    pub email_verified: bool,
    /// Whether the user opted into the weekly digest.
    pub weekly_updates_enabled: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    subject_id: String,
    email: String,
    display_name: Option<String>,
    email_verified: bool,
    weekly_updates_enabled: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            subject_id: row.subject_id,
            email,
            display_name: row.display_name,
            email_verified: row.email_verified,
            weekly_updates_enabled: row.weekly_updates_enabled,
            created_at: row.created_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by id. Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, subject_id, email, display_name, email_verified,
                   weekly_updates_enabled, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List users eligible for the weekly digest: opted in and with a
    /// verified email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_digest_recipients(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, subject_id, email, display_name, email_verified,
                   weekly_updates_enabled, created_at
            FROM users
            WHERE weekly_updates_enabled = TRUE
              AND email_verified = TRUE
            ORDER BY created_at
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
