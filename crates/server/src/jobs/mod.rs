//! Background jobs.

pub mod batch;
pub mod weekly_digest;

pub use batch::{BatchOutcome, process_in_batches};
pub use weekly_digest::{WeeklyDigestJob, next_run_after};
