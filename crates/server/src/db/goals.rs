//! Goal repository for database operations.
//!
//! Goals are written by the CRUD surface of the wider application; digest
//! generation only ever reads them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stride_core::{GoalId, UserId};

use super::RepositoryError;

/// A SMART goal owned by a user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Goal {
    /// Unique identifier.
    pub id: GoalId,
    /// Owning user.
    pub owner_id: UserId,
    /// What the user wants to achieve.
    pub description: String,
    /// Free-form category label (e.g. "health", "career").
    pub category: String,
    /// Whether the goal has been completed.
    pub completed: bool,
    /// When the goal was completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Target completion date, if the goal is time-bound.
    pub target_date: Option<DateTime<Utc>>,
    /// How progress is measured, if the goal is measurable.
    pub measurable: Option<String>,
    /// When the goal was created.
    pub created_at: DateTime<Utc>,
}

/// Repository for goal database operations.
pub struct GoalRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GoalRepository<'a> {
    /// Create a new goal repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all goals owned by a user.
    ///
    /// The read is unbounded; goal counts per user are small at current
    /// scale. Ordering follows insertion order, which downstream summary
    /// code relies on for its tie-breaking behavior.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Goal>, RepositoryError> {
        let goals = sqlx::query_as::<_, Goal>(
            r"
            SELECT id, owner_id, description, category, completed,
                   completed_at, target_date, measurable, created_at
            FROM goals
            WHERE owner_id = $1
            ORDER BY created_at
            ",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(goals)
    }
}
