//! Bounded-concurrency batch processing.
//!
//! Items are processed in fixed-size batches. Within a batch all
//! operations run concurrently; batches themselves run strictly in
//! sequence with an optional pause between them, which bounds pressure on
//! whatever the operation talks to. One failing item never affects the
//! rest of its batch or later batches.

use std::time::Duration;

use futures::future::join_all;

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Items processed.
    pub total: usize,
    /// Items whose operation returned `Ok`.
    pub succeeded: usize,
    /// Items whose operation returned `Err`.
    pub failed: usize,
}

/// Run `op` over `items` in batches of `batch_size`, pausing `delay`
/// between consecutive batches (never after the last one).
///
/// A `batch_size` of 0 is treated as 1.
pub async fn process_in_batches<T, F, Fut, E>(
    items: Vec<T>,
    batch_size: usize,
    delay: Duration,
    op: F,
) -> BatchOutcome
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let total = items.len();
    let mut succeeded = 0;
    let mut failed = 0;

    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        let batch: Vec<T> = iter.by_ref().take(batch_size.max(1)).collect();
        for result in join_all(batch.into_iter().map(&op)).await {
            if result.is_ok() {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }

        if iter.peek().is_some() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    BatchOutcome {
        total,
        succeeded,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_all_items_processed_in_bounded_batches() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let items: Vec<u32> = (0..25).collect();
        let outcome = process_in_batches(items, 10, Duration::ZERO, |_| {
            let in_flight = Arc::clone(&in_flight);
            let high_water = Arc::clone(&high_water);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), ()>(())
            }
        })
        .await;

        assert_eq!(outcome.total, 25);
        assert_eq!(outcome.succeeded, 25);
        assert_eq!(outcome.failed, 0);
        // 25 items in batches of 10 never exceed 10 concurrent operations.
        assert!(high_water.load(Ordering::SeqCst) <= 10);
    }

    #[tokio::test]
    async fn test_failures_isolated_and_counted() {
        let items: Vec<u32> = (0..25).collect();
        let outcome = process_in_batches(items, 10, Duration::ZERO, |i| async move {
            if i == 7 { Err(()) } else { Ok(()) }
        })
        .await;

        assert_eq!(outcome.total, 25);
        assert_eq!(outcome.succeeded, 24);
        assert_eq!(outcome.failed, 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome =
            process_in_batches(Vec::<u32>::new(), 10, Duration::ZERO, |_| async move {
                Ok::<(), ()>(())
            })
            .await;
        assert_eq!(
            outcome,
            BatchOutcome {
                total: 0,
                succeeded: 0,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_zero_batch_size_treated_as_one() {
        let items: Vec<u32> = (0..3).collect();
        let outcome = process_in_batches(items, 0, Duration::ZERO, |_| async move {
            Ok::<(), ()>(())
        })
        .await;
        assert_eq!(outcome.succeeded, 3);
    }
}
