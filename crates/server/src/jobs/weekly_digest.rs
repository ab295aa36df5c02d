//! Scheduled weekly digest dispatch.
//!
//! Every Monday at 09:00 UTC the job loads all eligible recipients,
//! generates each one's progress summary, renders it into the stored
//! `weekly_digest` template and sends it through the mailer. Recipients
//! are processed in bounded batches; one failure never aborts the run.
//! The only durable outputs are the per-recipient email logs and one
//! aggregate `digest_runs` row.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::json;
use sqlx::PgPool;

use crate::config::DigestConfig;
use crate::db::users::User;
use crate::db::{DigestRunRepository, DigestRunStats, RepositoryError, UserRepository};
use crate::jobs::batch::process_in_batches;
use crate::models::WeeklyProgressSummary;
use crate::services::mailer::{EmailOptions, Mailer, MailerError, TemplateName};
use crate::services::transport::EmailTransport;
use crate::services::DigestService;

/// Hour of day (UTC) at which the weekly run fires.
const RUN_HOUR_UTC: u32 = 9;

/// The weekly digest batch job.
pub struct WeeklyDigestJob<T> {
    pool: PgPool,
    digest: DigestService,
    mailer: Mailer<T>,
    config: DigestConfig,
}

impl<T: EmailTransport> WeeklyDigestJob<T> {
    /// Create a new job.
    #[must_use]
    pub fn new(pool: PgPool, mailer: Mailer<T>, config: DigestConfig) -> Self {
        Self {
            digest: DigestService::new(pool.clone()),
            pool,
            mailer,
            config,
        }
    }

    /// Run one full digest batch and record its statistics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` only if the recipient list cannot be
    /// loaded; per-recipient failures are counted, not propagated.
    pub async fn run(&self) -> Result<DigestRunStats, RepositoryError> {
        let recipients = UserRepository::new(&self.pool)
            .list_digest_recipients()
            .await?;
        tracing::info!(recipients = recipients.len(), "starting weekly digest run");

        let outcome = process_in_batches(
            recipients,
            self.config.batch_size,
            Duration::from_millis(self.config.batch_delay_ms),
            |user| self.send_one(user),
        )
        .await;

        let stats = DigestRunStats {
            total_users: outcome.total as u64,
            success_count: outcome.succeeded as u64,
            error_count: outcome.failed as u64,
        };

        if let Err(e) = DigestRunRepository::new(&self.pool)
            .record_weekly_batch(&stats)
            .await
        {
            // The emails are already out; losing the stats row is not
            // worth failing the run over.
            tracing::error!(error = %e, "failed to record digest run statistics");
        }

        tracing::info!(
            total = stats.total_users,
            succeeded = stats.success_count,
            failed = stats.error_count,
            "weekly digest run finished"
        );
        Ok(stats)
    }

    async fn send_one(&self, user: User) -> Result<(), MailerError> {
        let Some(summary) = self.digest.generate_summary(user.id).await? else {
            // Deleted between the recipient query and now.
            tracing::warn!(user_id = %user.id, "digest recipient no longer exists");
            return Err(RepositoryError::NotFound.into());
        };

        let name = user
            .display_name
            .clone()
            .unwrap_or_else(|| user.email.as_str().to_string());

        let mut variables = HashMap::new();
        variables.insert("name".to_string(), name);
        variables.insert("summary_html".to_string(), render_summary_html(&summary));

        self.mailer
            .send(EmailOptions {
                to: user.email.as_str().to_string(),
                subject: "Your weekly progress update".to_string(),
                template: Some(TemplateName::WeeklyDigest),
                variables,
                metadata: Some(json!({ "user_id": user.id })),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    /// Run forever on the weekly schedule.
    pub async fn run_on_schedule(self) {
        loop {
            let next = next_run_after(Utc::now());
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(next_run = %next, "weekly digest scheduled");
            tokio::time::sleep(wait).await;

            if let Err(e) = self.run().await {
                tracing::error!(error = %e, "weekly digest run failed");
            }
        }
    }
}

/// The next Monday 09:00 UTC strictly after `now`.
#[must_use]
pub fn next_run_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let days_ahead = i64::from((7 - today.weekday().num_days_from_monday()) % 7);
    let mut candidate = at_run_hour(today + chrono::Days::new(days_ahead.unsigned_abs()));
    if candidate <= now {
        candidate = at_run_hour(today + chrono::Days::new(days_ahead.unsigned_abs() + 7));
    }
    candidate
}

// 09:00:00 is always a valid wall-clock time.
#[allow(clippy::expect_used)]
fn at_run_hour(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(RUN_HOUR_UTC, 0, 0)
        .expect("valid time of day")
        .and_utc()
}

/// Render a progress summary as the HTML fragment substituted into the
/// stored digest template.
#[must_use]
pub fn render_summary_html(summary: &WeeklyProgressSummary) -> String {
    let mut html = String::new();

    html.push_str(&format!(
        "<p>You have <strong>{}</strong> goals: {} completed, {} in progress. \
         Weekly progress: {:.0}%.</p>",
        summary.total_goals,
        summary.goals_completed,
        summary.goals_in_progress,
        summary.weekly_progress
    ));

    if !summary.upcoming_deadlines.is_empty() {
        html.push_str("<h3>Upcoming deadlines</h3><ul>");
        for deadline in &summary.upcoming_deadlines {
            let days = if deadline.days_remaining == 1 { "day" } else { "days" };
            html.push_str(&format!(
                "<li>{} ({} {} left)</li>",
                escape_html(&deadline.goal_title),
                deadline.days_remaining,
                days
            ));
        }
        html.push_str("</ul>");
    }

    if !summary.recent_achievements.is_empty() {
        html.push_str("<h3>This week's wins</h3><ul>");
        for achievement in &summary.recent_achievements {
            html.push_str(&format!("<li>{}</li>", escape_html(&achievement.description)));
        }
        html.push_str("</ul>");
    }

    for insight in &summary.insights {
        html.push_str(&format!(
            "<p><strong>{}</strong> {}</p>",
            escape_html(&insight.title),
            escape_html(&insight.message)
        ));
    }

    html.push_str(&format!(
        "<blockquote>{}</blockquote>",
        escape_html(&summary.quote)
    ));
    html
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use crate::models::{InsightKind, WeeklyInsight};

    use super::*;

    #[test]
    fn test_next_run_midweek() {
        // Wednesday 2025-06-18
        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();
        let next = next_run_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 23, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_monday_before_nine() {
        let now = Utc.with_ymd_and_hms(2025, 6, 16, 8, 30, 0).unwrap();
        let next = next_run_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_monday_at_nine_rolls_a_week() {
        let now = Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap();
        let next = next_run_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 23, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_render_summary_escapes_user_content() {
        let summary = WeeklyProgressSummary {
            total_goals: 1,
            goals_completed: 0,
            goals_in_progress: 1,
            weekly_progress: 0.0,
            upcoming_deadlines: vec![],
            recent_achievements: vec![],
            insights: vec![WeeklyInsight {
                kind: InsightKind::Motivation,
                title: "Check in".to_string(),
                message: "<script>alert(1)</script>".to_string(),
                action_required: true,
            }],
            quote: "Little by little, one travels far.".to_string(),
        };
        let html = render_summary_html(&summary);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<blockquote>"));
    }

    #[test]
    fn test_render_summary_includes_counts() {
        let summary = WeeklyProgressSummary {
            total_goals: 4,
            goals_completed: 1,
            goals_in_progress: 3,
            weekly_progress: 25.0,
            upcoming_deadlines: vec![],
            recent_achievements: vec![],
            insights: vec![],
            quote: "q".to_string(),
        };
        let html = render_summary_html(&summary);
        assert!(html.contains("<strong>4</strong>"));
        assert!(html.contains("25%"));
    }
}
