//! Weekly digest content generation.
//!
//! [`summarize`] is a pure read-and-derive step over a user's goal set,
//! except for the motivational quote which is intentionally randomized per
//! call. [`DigestService`] wraps it with the database reads.

use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use sqlx::PgPool;

use stride_core::UserId;

use crate::db::goals::Goal;
use crate::db::users::User;
use crate::db::{GoalRepository, RepositoryError, UserRepository};
use crate::models::{
    Achievement, AchievementKind, InsightKind, UpcomingDeadline, WeeklyInsight,
    WeeklyProgressSummary,
};

/// Deadlines further out than this many days are not worth surfacing yet.
const DEADLINE_WINDOW_DAYS: i64 = 14;
/// At most this many deadlines per digest.
const MAX_DEADLINES: usize = 5;
/// At most this many achievements per digest.
const MAX_ACHIEVEMENTS: usize = 3;
/// Trailing window for "this week" computations.
const TRAILING_WEEK_DAYS: i64 = 7;

/// Fixed motivational quote pool. One entry is chosen uniformly at random
/// per generated summary.
const QUOTES: &[&str] = &[
    "A goal without a plan is just a wish.",
    "Success is the sum of small efforts, repeated day in and day out.",
    "The secret of getting ahead is getting started.",
    "It always seems impossible until it's done.",
    "You don't have to be great to start, but you have to start to be great.",
    "Discipline is choosing between what you want now and what you want most.",
    "Little by little, one travels far.",
];

/// Generates weekly progress summaries from the document store.
#[derive(Clone)]
pub struct DigestService {
    pool: PgPool,
}

impl DigestService {
    /// Create a new digest service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Generate the weekly summary for one user.
    ///
    /// Returns `Ok(None)` if the user record does not exist - callers skip
    /// the recipient and count it as a processing failure for statistics,
    /// not a fatal error for the batch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a database read fails.
    pub async fn generate_summary(
        &self,
        user_id: UserId,
    ) -> Result<Option<WeeklyProgressSummary>, RepositoryError> {
        let users = UserRepository::new(&self.pool);
        let Some(user) = users.get(user_id).await? else {
            return Ok(None);
        };

        let goals = GoalRepository::new(&self.pool)
            .list_by_owner(user_id)
            .await?;

        Ok(Some(summarize(&user, &goals, Utc::now())))
    }
}

/// Build the weekly progress summary for a user from their goal set.
///
/// Pure apart from the random quote selection: the shape of the output is
/// fully determined by `goals` and `now`.
#[must_use]
pub fn summarize(_user: &User, goals: &[Goal], now: DateTime<Utc>) -> WeeklyProgressSummary {
    let total_goals = goals.len();
    let goals_completed = goals.iter().filter(|g| g.completed).count();
    let goals_in_progress = total_goals - goals_completed;

    let week_ago = now - Duration::days(TRAILING_WEEK_DAYS);
    let completed_this_week: Vec<&Goal> = goals
        .iter()
        .filter(|g| g.completed && g.completed_at.is_some_and(|at| at > week_ago && at <= now))
        .collect();

    let weekly_progress = if total_goals == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)] // Goal counts fit f64 precision
        let pct = completed_this_week.len() as f64 / total_goals as f64 * 100.0;
        pct
    };

    let upcoming_deadlines = upcoming_deadlines(goals, now);
    let recent_achievements = recent_achievements(&completed_this_week);
    let insights = insights(goals, completed_this_week.len());

    // The pool is non-empty, so choose() always yields a quote.
    let quote = QUOTES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(QUOTES[0])
        .to_string();

    WeeklyProgressSummary {
        total_goals,
        goals_completed,
        goals_in_progress,
        weekly_progress,
        upcoming_deadlines,
        recent_achievements,
        insights,
        quote,
    }
}

/// Whole days from `now` until `target`, rounded up.
fn days_until(now: DateTime<Utc>, target: DateTime<Utc>) -> i64 {
    let secs = (target - now).num_seconds();
    secs.div_euclid(86_400) + i64::from(secs.rem_euclid(86_400) > 0)
}

/// Incomplete goals due within the next two weeks, soonest first, capped.
fn upcoming_deadlines(goals: &[Goal], now: DateTime<Utc>) -> Vec<UpcomingDeadline> {
    let mut deadlines: Vec<UpcomingDeadline> = goals
        .iter()
        .filter(|g| !g.completed)
        .filter_map(|g| {
            let due_date = g.target_date?;
            let days_remaining = days_until(now, due_date);
            (days_remaining > 0 && days_remaining <= DEADLINE_WINDOW_DAYS).then(|| {
                UpcomingDeadline {
                    goal_id: g.id,
                    goal_title: g.description.clone(),
                    due_date,
                    days_remaining,
                    category: g.category.clone(),
                }
            })
        })
        .collect();

    // Stable sort: ties keep the underlying read order.
    deadlines.sort_by_key(|d| d.days_remaining);
    deadlines.truncate(MAX_DEADLINES);
    deadlines
}

/// One achievement per goal completed this week, read order, capped.
/// Ties among same-day completions follow the read order (accepted
/// nondeterminism).
fn recent_achievements(completed_this_week: &[&Goal]) -> Vec<Achievement> {
    completed_this_week
        .iter()
        .take(MAX_ACHIEVEMENTS)
        .filter_map(|g| {
            let achieved_at = g.completed_at?;
            Some(Achievement {
                kind: AchievementKind::GoalCompleted,
                title: "Goal completed".to_string(),
                description: g.description.clone(),
                achieved_at,
                goal_id: Some(g.id),
            })
        })
        .collect()
}

/// Rule-derived insights, fixed precedence: progress beats motivation,
/// and a category-focus insight is appended whenever the user has goals.
fn insights(goals: &[Goal], completed_this_week: usize) -> Vec<WeeklyInsight> {
    let mut insights = Vec::new();

    if completed_this_week > 0 {
        let plural = if completed_this_week == 1 { "goal" } else { "goals" };
        insights.push(WeeklyInsight {
            kind: InsightKind::Progress,
            title: "Great momentum!".to_string(),
            message: format!("You completed {completed_this_week} {plural} this week. Keep it up!"),
            action_required: false,
        });
    } else if !goals.is_empty() {
        insights.push(WeeklyInsight {
            kind: InsightKind::Motivation,
            title: "Time to check in".to_string(),
            message: "No goals completed this week. Pick one small step and take it today."
                .to_string(),
            action_required: true,
        });
    }

    if let Some((category, count)) = top_category(goals) {
        insights.push(WeeklyInsight {
            kind: InsightKind::Category,
            title: "Your focus area".to_string(),
            message: format!("Most of your energy is going into {category} ({count} goals)."),
            action_required: false,
        });
    }

    insights
}

/// The most frequent goal category. Ties are broken by alphabetical order
/// of the category name - stable but otherwise arbitrary.
fn top_category(goals: &[Goal]) -> Option<(String, usize)> {
    let mut tally: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for goal in goals {
        *tally.entry(goal.category.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (category, count) in tally {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((category, count));
        }
    }
    best.map(|(category, count)| (category.to_string(), count))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use stride_core::GoalId;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap()
    }

    fn user() -> User {
        User {
            id: UserId::generate(),
            subject_id: "sub-1".to_string(),
            email: stride_core::Email::parse("user@example.com").unwrap(),
            display_name: Some("Test User".to_string()),
            email_verified: true,
            weekly_updates_enabled: true,
            created_at: now() - Duration::days(90),
        }
    }

    fn goal(description: &str, category: &str) -> Goal {
        Goal {
            id: GoalId::generate(),
            owner_id: UserId::generate(),
            description: description.to_string(),
            category: category.to_string(),
            completed: false,
            completed_at: None,
            target_date: None,
            measurable: None,
            created_at: now() - Duration::days(30),
        }
    }

    fn completed_goal(description: &str, days_ago: i64) -> Goal {
        let mut g = goal(description, "health");
        g.completed = true;
        g.completed_at = Some(now() - Duration::days(days_ago));
        g
    }

    fn due_goal(description: &str, days_ahead: i64) -> Goal {
        let mut g = goal(description, "career");
        g.target_date = Some(now() + Duration::days(days_ahead));
        g
    }

    #[test]
    fn test_zero_goals_no_division_by_zero() {
        let summary = summarize(&user(), &[], now());
        assert_eq!(summary.total_goals, 0);
        assert_eq!(summary.goals_completed, 0);
        assert_eq!(summary.goals_in_progress, 0);
        assert!((summary.weekly_progress - 0.0).abs() < f64::EPSILON);
        assert!(summary.upcoming_deadlines.is_empty());
        assert!(summary.recent_achievements.is_empty());
        assert!(summary.insights.is_empty());
    }

    #[test]
    fn test_weekly_progress_percentage() {
        let goals = vec![
            completed_goal("run 5k", 2),
            goal("read a book", "learning"),
            goal("meditate daily", "health"),
            goal("ship side project", "career"),
        ];
        let summary = summarize(&user(), &goals, now());
        // 1 of 4 goals completed this week
        assert!((summary.weekly_progress - 25.0).abs() < 1e-9);
        assert_eq!(summary.goals_completed, 1);
        assert_eq!(summary.goals_in_progress, 3);
    }

    #[test]
    fn test_old_completions_do_not_count_as_weekly() {
        let goals = vec![completed_goal("run 5k", 30)];
        let summary = summarize(&user(), &goals, now());
        assert_eq!(summary.goals_completed, 1);
        assert!((summary.weekly_progress - 0.0).abs() < f64::EPSILON);
        assert!(summary.recent_achievements.is_empty());
    }

    #[test]
    fn test_deadline_window_filters_far_goals() {
        let goals = vec![due_goal("near", 10), due_goal("far", 20)];
        let summary = summarize(&user(), &goals, now());
        assert_eq!(summary.upcoming_deadlines.len(), 1);
        assert_eq!(summary.upcoming_deadlines[0].goal_title, "near");
        assert_eq!(summary.upcoming_deadlines[0].days_remaining, 10);
    }

    #[test]
    fn test_deadlines_exclude_past_due_and_completed() {
        let mut done = due_goal("done", 5);
        done.completed = true;
        done.completed_at = Some(now() - Duration::days(1));
        let goals = vec![due_goal("overdue", -2), done, due_goal("open", 3)];
        let summary = summarize(&user(), &goals, now());
        assert_eq!(summary.upcoming_deadlines.len(), 1);
        assert_eq!(summary.upcoming_deadlines[0].goal_title, "open");
    }

    #[test]
    fn test_deadlines_sorted_and_capped_at_five() {
        let goals: Vec<Goal> = (1..=8).map(|d| due_goal(&format!("goal-{d}"), d)).collect();
        let summary = summarize(&user(), &goals, now());
        assert_eq!(summary.upcoming_deadlines.len(), 5);
        let days: Vec<i64> = summary
            .upcoming_deadlines
            .iter()
            .map(|d| d.days_remaining)
            .collect();
        assert_eq!(days, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_days_until_rounds_up() {
        let target = now() + Duration::hours(25);
        assert_eq!(days_until(now(), target), 2);
        let target = now() + Duration::hours(24);
        assert_eq!(days_until(now(), target), 1);
        let target = now() - Duration::hours(1);
        assert_eq!(days_until(now(), target), 0);
    }

    #[test]
    fn test_achievements_capped_at_three() {
        let goals: Vec<Goal> = (0..7)
            .map(|i| completed_goal(&format!("goal-{i}"), 1))
            .collect();
        let summary = summarize(&user(), &goals, now());
        assert_eq!(summary.recent_achievements.len(), 3);
        assert!(
            summary
                .recent_achievements
                .iter()
                .all(|a| a.kind == AchievementKind::GoalCompleted)
        );
    }

    #[test]
    fn test_progress_insight_takes_precedence() {
        let goals = vec![completed_goal("run 5k", 1), goal("read", "learning")];
        let summary = summarize(&user(), &goals, now());
        assert_eq!(summary.insights[0].kind, InsightKind::Progress);
        assert!(!summary.insights[0].action_required);
        assert!(summary.insights[0].message.contains("1 goal"));
    }

    #[test]
    fn test_motivation_insight_when_no_weekly_completions() {
        let goals = vec![goal("read", "learning")];
        let summary = summarize(&user(), &goals, now());
        assert_eq!(summary.insights[0].kind, InsightKind::Motivation);
        assert!(summary.insights[0].action_required);
    }

    #[test]
    fn test_category_insight_names_most_frequent() {
        let goals = vec![
            goal("a", "health"),
            goal("b", "health"),
            goal("c", "career"),
        ];
        let summary = summarize(&user(), &goals, now());
        let category = summary
            .insights
            .iter()
            .find(|i| i.kind == InsightKind::Category)
            .unwrap();
        assert!(category.message.contains("health"));
        assert!(category.message.contains("2 goals"));
    }

    #[test]
    fn test_category_tie_broken_alphabetically() {
        let goals = vec![goal("a", "travel"), goal("b", "career")];
        let summary = summarize(&user(), &goals, now());
        let category = summary
            .insights
            .iter()
            .find(|i| i.kind == InsightKind::Category)
            .unwrap();
        assert!(category.message.contains("career"));
    }

    #[test]
    fn test_quote_comes_from_pool() {
        let summary = summarize(&user(), &[], now());
        assert!(QUOTES.contains(&summary.quote.as_str()));
    }
}
