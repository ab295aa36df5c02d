//! Digest run statistics repository.
//!
//! One row is written after each weekly batch completes. There is no
//! checkpointing during a run; these rows and the per-recipient email logs
//! are the only observable outcome of the scheduled job.

use sqlx::PgPool;

use stride_core::DigestRunId;

use super::RepositoryError;

/// Aggregate outcome of one digest batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestRunStats {
    /// Number of eligible recipients processed.
    pub total_users: u64,
    /// Recipients whose digest was sent.
    pub success_count: u64,
    /// Recipients that failed (missing user, generation error, send error).
    pub error_count: u64,
}

impl DigestRunStats {
    /// Fraction of recipients processed successfully, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Recipient counts fit f64 precision
    pub fn success_rate(&self) -> f64 {
        if self.total_users == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_users as f64
    }
}

/// Repository for digest run statistics.
pub struct DigestRunRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DigestRunRepository<'a> {
    /// Create a new digest run repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record the aggregate outcome of one weekly batch run.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_weekly_batch(
        &self,
        stats: &DigestRunStats,
    ) -> Result<DigestRunId, RepositoryError> {
        #[allow(clippy::cast_possible_wrap)] // Recipient counts are far below i64::MAX
        let id: DigestRunId = sqlx::query_scalar(
            r"
            INSERT INTO digest_runs (kind, total_users, success_count, error_count, success_rate)
            VALUES ('weekly_batch', $1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(stats.total_users as i64)
        .bind(stats.success_count as i64)
        .bind(stats.error_count as i64)
        .bind(stats.success_rate())
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_zero_users() {
        let stats = DigestRunStats {
            total_users: 0,
            success_count: 0,
            error_count: 0,
        };
        assert!((stats.success_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate_partial() {
        let stats = DigestRunStats {
            total_users: 25,
            success_count: 24,
            error_count: 1,
        };
        assert!((stats.success_rate() - 0.96).abs() < 1e-9);
    }
}
