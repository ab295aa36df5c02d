//! Domain models that are not database rows.

pub mod digest;
pub mod identity;

pub use digest::{
    Achievement, AchievementKind, InsightKind, UpcomingDeadline, WeeklyInsight,
    WeeklyProgressSummary,
};
pub use identity::Identity;
