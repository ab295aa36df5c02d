//! Email log repository for database operations.
//!
//! Every send attempt creates a `pending` row before the transport call
//! and flips it to `sent` or `failed` afterwards. The create step returns
//! an [`stride_core::EmailLogId`] handle that the caller threads through
//! to the terminal update, so no lookup query is needed on the error path.
//! Rows are never deleted by this core; operators query them later for
//! failure reconciliation and aggregate statistics.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use stride_core::EmailLogId;

use super::RepositoryError;

/// Delivery status of a logged email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "email_status", rename_all = "lowercase")]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
    /// Reported asynchronously by the transport provider; recorded by an
    /// external webhook consumer, never set by this core.
    Bounced,
}

/// A durable record of one email send attempt and its outcome.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmailLog {
    /// Unique identifier.
    pub id: EmailLogId,
    /// Recipient address.
    pub recipient: String,
    /// Rendered subject line.
    pub subject: String,
    /// Template name, if the body was template-rendered.
    pub template: Option<String>,
    /// Current delivery status.
    pub status: EmailStatus,
    /// When the transport accepted the message.
    pub sent_at: Option<DateTime<Utc>>,
    /// When the attempt was marked failed.
    pub failed_at: Option<DateTime<Utc>>,
    /// Transport or rendering error detail.
    pub error_message: Option<String>,
    /// Message id assigned by the transport provider.
    pub provider_id: Option<String>,
    /// Logical category of the email (e.g. "weekly_digest", "welcome").
    pub email_type: String,
    /// Free-form metadata attached by the caller.
    pub metadata: Option<Value>,
    /// When the attempt was recorded.
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a pending log entry.
#[derive(Debug, Clone)]
pub struct NewEmailLog {
    /// Recipient address.
    pub recipient: String,
    /// Rendered subject line.
    pub subject: String,
    /// Template name, if any.
    pub template: Option<String>,
    /// Logical category of the email.
    pub email_type: String,
    /// Free-form metadata.
    pub metadata: Option<Value>,
}

/// Repository for email log database operations.
pub struct EmailLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmailLogRepository<'a> {
    /// Create a new email log repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `pending` entry and return its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_pending(&self, entry: NewEmailLog) -> Result<EmailLogId, RepositoryError> {
        let id: EmailLogId = sqlx::query_scalar(
            r"
            INSERT INTO email_logs (recipient, subject, template, status, email_type, metadata)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING id
            ",
        )
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(&entry.template)
        .bind(&entry.email_type)
        .bind(&entry.metadata)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Mark an entry as `sent`, recording the provider's message id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn mark_sent(
        &self,
        id: EmailLogId,
        provider_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE email_logs
            SET status = 'sent', sent_at = NOW(), provider_id = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(provider_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Mark an entry as `failed`, recording the error message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn mark_failed(
        &self,
        id: EmailLogId,
        error_message: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE email_logs
            SET status = 'failed', failed_at = NOW(), error_message = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error_message)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// List recent failed attempts, newest first, for operator reconciliation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_failures(&self, limit: i64) -> Result<Vec<EmailLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, EmailLog>(
            r"
            SELECT id, recipient, subject, template, status, sent_at, failed_at,
                   error_message, provider_id, email_type, metadata, created_at
            FROM email_logs
            WHERE status = 'failed'
            ORDER BY created_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(logs)
    }

    /// Count log entries per status, for aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            r"
            SELECT status::text, COUNT(*)
            FROM email_logs
            GROUP BY status
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(counts)
    }
}
