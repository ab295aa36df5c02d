//! Derived types for the weekly progress digest.
//!
//! All of these are computed from a user's goal set at generation time and
//! never persisted; the only durable artifacts of a digest run are the
//! email logs and the aggregate statistics row.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stride_core::GoalId;

/// An incomplete goal whose target date falls within the next two weeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingDeadline {
    /// Goal this deadline belongs to.
    pub goal_id: GoalId,
    /// Goal description, used as the display title.
    pub goal_title: String,
    /// Target date.
    pub due_date: DateTime<Utc>,
    /// Whole days until the target date, rounded up.
    pub days_remaining: i64,
    /// Goal category.
    pub category: String,
}

/// What kind of achievement is being celebrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    /// A goal was completed.
    GoalCompleted,
}

/// A recent accomplishment worth surfacing in the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Achievement {
    /// Achievement category.
    pub kind: AchievementKind,
    /// Short headline.
    pub title: String,
    /// One-line description.
    pub description: String,
    /// When the achievement happened.
    pub achieved_at: DateTime<Utc>,
    /// Goal that produced the achievement, if any.
    pub goal_id: Option<GoalId>,
}

/// Category of a weekly insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Celebrates completions this week.
    Progress,
    /// Nudges a user with goals but no recent completions.
    Motivation,
    /// Points out the category the user is most invested in.
    Category,
}

/// A rule-derived observation about the user's week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyInsight {
    /// Insight category.
    pub kind: InsightKind,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub message: String,
    /// Whether the insight asks the user to act.
    pub action_required: bool,
}

/// Everything that goes into one user's weekly digest email.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyProgressSummary {
    /// Total goals the user has recorded.
    pub total_goals: usize,
    /// Goals marked completed.
    pub goals_completed: usize,
    /// Goals still open.
    pub goals_in_progress: usize,
    /// Percentage of all goals completed within the trailing week.
    pub weekly_progress: f64,
    /// Up to five deadlines due within the next two weeks, soonest first.
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
    /// Up to three goals completed within the trailing week.
    pub recent_achievements: Vec<Achievement>,
    /// Rule-derived insights, fixed precedence.
    pub insights: Vec<WeeklyInsight>,
    /// Motivational quote, chosen uniformly at random per generation.
    pub quote: String,
}
