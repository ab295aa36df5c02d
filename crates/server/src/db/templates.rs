//! Email template repository for database operations.
//!
//! Templates are stored as documents so operators can tweak copy without a
//! deploy. The set of template names the application will ever request is
//! fixed by [`crate::services::mailer::TemplateName`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;

/// A stored email template: HTML and plain-text bodies with
/// `{{variable}}` placeholders. Subjects come from the caller.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmailTemplateRecord {
    /// Template name (primary key).
    pub name: String,
    /// HTML body.
    pub html_body: String,
    /// Plain-text body.
    pub text_body: String,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
}

/// Repository for email template database operations.
pub struct EmailTemplateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmailTemplateRepository<'a> {
    /// Create a new template repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a template by name. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name(
        &self,
        name: &str,
    ) -> Result<Option<EmailTemplateRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, EmailTemplateRecord>(
            r"
            SELECT name, html_body, text_body, updated_at
            FROM email_templates
            WHERE name = $1
            ",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }
}
