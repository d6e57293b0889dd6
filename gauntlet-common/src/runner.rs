//! Bounded-concurrency scatter-gather runner.
//!
//! Executes a batch of asynchronous operation closures with at most `limit`
//! in flight at once. This is a semaphore-gated worker pool, not a "chunk
//! and wait" strategy: as each operation settles, the next queued one starts
//! immediately, so operations overlap arbitrarily and contention on the
//! backend stays realistic.
//!
//! Guarantees:
//! - The returned list has exactly one outcome per submitted closure.
//! - Outcome `i` corresponds to closure `i`, regardless of completion order.
//! - A closure that fails or panics becomes a [`Outcome::Rejected`] entry;
//!   its siblings run to completion.
//!
//! There is no cancellation: once submitted, every operation runs to
//! completion. The caller's scenario-level timeout is the only bound.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Result of one operation closure.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The closure ran and returned a value (which may itself describe an
    /// HTTP failure status; that is data, not rejection).
    Completed(T),
    /// The closure returned an error or panicked.
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    /// The completed value, if any.
    pub fn completed(&self) -> Option<&T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Why an operation produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The closure returned an error (typically a transport failure).
    Error(String),
    /// The closure panicked; the payload is preserved when printable.
    Panic(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Error(msg) => write!(f, "operation error: {msg}"),
            Rejection::Panic(msg) => write!(f, "operation panicked: {msg}"),
        }
    }
}

/// Run every closure with at most `limit` in flight, returning outcomes in
/// submission order.
///
/// # Panics
///
/// Panics if `limit` is zero; the concurrency budget is a positive integer
/// by contract.
pub async fn run_all<T, E, F, Fut>(ops: Vec<F>, limit: usize) -> Vec<Outcome<T>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display,
{
    assert!(limit >= 1, "concurrency budget must be at least 1");

    let gate = Arc::new(Semaphore::new(limit));
    let mut handles = Vec::with_capacity(ops.len());

    for op in ops {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            // The semaphore is never closed, so acquisition only fails if
            // the runtime is tearing down underneath us.
            let _permit = gate
                .acquire_owned()
                .await
                .expect("runner semaphore closed");
            op().await.map_err(|e| e.to_string())
        }));
    }

    // Gather in submission order; completion order is unconstrained.
    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|result| match result {
            Ok(Ok(value)) => Outcome::Completed(value),
            Ok(Err(message)) => Outcome::Rejected(Rejection::Error(message)),
            Err(join_error) => Outcome::Rejected(Rejection::Panic(panic_message(join_error))),
        })
        .collect()
}

/// Build `count` operations from a factory and run them under `limit`.
///
/// The factory receives the submission index, which outcomes preserve, so
/// assertions can attribute a result to the operation that produced it.
pub async fn run_repeat<T, E, F, Fut>(count: usize, limit: usize, factory: F) -> Vec<Outcome<T>>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display,
{
    let factory = Arc::new(factory);
    let ops: Vec<_> = (0..count)
        .map(|index| {
            let factory = Arc::clone(&factory);
            move || async move { factory(index).await }
        })
        .collect();
    run_all(ops, limit).await
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    match join_error.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "opaque panic payload".to_string()
            }
        }
        Err(join_error) => join_error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_empty_batch_returns_empty() {
        let ops: Vec<fn() -> std::future::Ready<Result<u32, Infallible>>> = Vec::new();
        let outcomes = run_all(ops, 4).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_outcome_count_matches_submission_count() {
        for count in [1usize, 2, 7, 32] {
            let outcomes = run_repeat(count, 3, |i| async move {
                Ok::<usize, Infallible>(i)
            })
            .await;
            assert_eq!(outcomes.len(), count);
        }
    }

    #[tokio::test]
    async fn test_index_correspondence_under_reversed_completion() {
        // Later submissions finish first; outcomes must still line up.
        let outcomes = run_repeat(8, 8, |i| async move {
            tokio::time::sleep(std::time::Duration::from_millis((8 - i as u64) * 5)).await;
            Ok::<usize, Infallible>(i * 10)
        })
        .await;
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.completed(), Some(&(i * 10)));
        }
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        const LIMIT: usize = 3;
        static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
        static HIGH_WATER: AtomicUsize = AtomicUsize::new(0);

        let outcomes = run_repeat(24, LIMIT, |_| async {
            let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
            HIGH_WATER.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
            Ok::<(), Infallible>(())
        })
        .await;

        assert_eq!(outcomes.len(), 24);
        let high = HIGH_WATER.load(Ordering::SeqCst);
        assert!(high <= LIMIT, "observed {high} concurrent operations");
        assert!(high >= 2, "operations never actually overlapped");
    }

    #[tokio::test]
    async fn test_rejection_does_not_block_siblings() {
        static RAN_LAST: AtomicUsize = AtomicUsize::new(0);

        let outcomes = run_repeat(3, 1, |i| async move {
            match i {
                1 => Err("boom".to_string()),
                2 => {
                    RAN_LAST.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                }
                _ => Ok(i),
            }
        })
        .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].completed(), Some(&0));
        assert_eq!(
            outcomes[1].rejection(),
            Some(&Rejection::Error("boom".to_string()))
        );
        assert_eq!(outcomes[2].completed(), Some(&2));
        assert_eq!(RAN_LAST.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_is_a_distinguishable_rejection() {
        let outcomes = run_repeat(2, 2, |i| async move {
            if i == 0 {
                panic!("deliberate");
            }
            Ok::<usize, Infallible>(i)
        })
        .await;

        match outcomes[0].rejection() {
            Some(Rejection::Panic(msg)) => assert!(msg.contains("deliberate")),
            other => panic!("expected panic rejection, got {other:?}"),
        }
        assert_eq!(outcomes[1].completed(), Some(&1));
    }

    #[tokio::test]
    #[should_panic(expected = "concurrency budget must be at least 1")]
    async fn test_zero_limit_is_a_caller_bug() {
        let _ = run_repeat(1, 0, |i| async move { Ok::<usize, Infallible>(i) }).await;
    }

    #[tokio::test]
    async fn test_limit_larger_than_batch_is_fine() {
        let outcomes = run_repeat(2, 64, |i| async move { Ok::<usize, Infallible>(i) }).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(Outcome::is_completed));
    }
}
