//! Queue item, ticket and snapshot types

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::OperationError;

/// How a dispatched operation ended, as seen by the queue's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobReport {
    Succeeded,
    Failed,
    Panicked,
}

/// Type-erased operation plus the sender half of its ticket
pub(crate) type Job = Box<dyn FnOnce() -> BoxFuture<'static, JobReport> + Send>;

/// One pending unit of work
pub(crate) struct QueueItem {
    pub seq: u64,
    pub submitted_at: Instant,
    pub job: Job,
}

impl QueueItem {
    /// Wrap a caller operation, returning the item and the caller's ticket
    pub fn new<F, Fut, T, E>(seq: u64, operation: F) -> (Self, Ticket<T, E>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            async move {
                // Calling `operation` happens inside the guarded future so a
                // panic before the first await is caught too.
                let outcome = match AssertUnwindSafe(async move { operation().await })
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(OperationError::Failure(err)),
                    Err(payload) => Err(OperationError::from_panic(payload)),
                };

                let report = match &outcome {
                    Ok(_) => JobReport::Succeeded,
                    Err(OperationError::Failure(_)) => JobReport::Failed,
                    Err(_) => JobReport::Panicked,
                };

                // The caller may have dropped its ticket; the work still counts.
                let _ = tx.send(outcome);
                report
            }
            .boxed()
        });

        let item = Self {
            seq,
            submitted_at: Instant::now(),
            job,
        };

        (item, Ticket { seq, rx })
    }
}

/// Eventual result of a submitted operation
///
/// Resolves exactly once with the operation's own outcome. Dropping a ticket
/// does not withdraw the operation from the queue.
#[must_use = "a ticket does nothing unless awaited; the operation runs regardless"]
pub struct Ticket<T, E> {
    seq: u64,
    rx: oneshot::Receiver<Result<T, OperationError<E>>>,
}

impl<T, E> Ticket<T, E> {
    /// Sequence number assigned at submission (1-based, per queue)
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<T, E> Future for Ticket<T, E> {
    type Output = Result<T, OperationError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(OperationError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> std::fmt::Debug for Ticket<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket").field("seq", &self.seq).finish()
    }
}

/// Statistics for a queue
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
    pub peak_pending: usize,
    /// Sum of the time dispatched items spent waiting in the queue
    pub total_wait: Duration,
}

impl QueueStats {
    /// Operations that have finished, whatever the outcome
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }

    /// Mean time a dispatched item waited before starting
    pub fn average_wait(&self) -> Option<Duration> {
        if self.dispatched == 0 {
            return None;
        }
        let nanos = self.total_wait.as_nanos() / u128::from(self.dispatched);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    pub(crate) fn record(&mut self, report: JobReport) {
        match report {
            JobReport::Succeeded => self.succeeded += 1,
            JobReport::Failed => self.failed += 1,
            JobReport::Panicked => self.panicked += 1,
        }
    }
}

/// Point-in-time view of a queue
#[derive(Debug, Clone)]
pub struct QueueState {
    pub pending: usize,
    pub in_flight: usize,
    pub draining: bool,
    /// Time since the most recent dispatch, if anything has been dispatched
    pub since_last_start: Option<Duration>,
    pub stats: QueueStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_delivers_value() {
        let (item, ticket) = QueueItem::new(1, || async { Ok::<_, String>("value") });
        assert_eq!(item.seq, 1);
        assert_eq!(ticket.seq(), 1);

        let report = (item.job)().await;
        assert_eq!(report, JobReport::Succeeded);
        assert_eq!(ticket.await.unwrap(), "value");
    }

    #[tokio::test]
    async fn test_job_delivers_failure() {
        let (item, ticket) = QueueItem::new(2, || async { Err::<(), _>("nope") });

        assert_eq!((item.job)().await, JobReport::Failed);
        let err = ticket.await.unwrap_err();
        assert_eq!(err.into_failure(), Some("nope"));
    }

    #[tokio::test]
    async fn test_job_catches_panic() {
        let (item, ticket) = QueueItem::new(3, || async {
            if true {
                panic!("exploded");
            }
            Ok::<(), ()>(())
        });

        assert_eq!((item.job)().await, JobReport::Panicked);
        assert!(matches!(ticket.await, Err(OperationError::Panicked { reason }) if reason == "exploded"));
    }

    #[tokio::test]
    async fn test_job_catches_panic_before_future() {
        let (item, ticket) = QueueItem::new(4, || -> futures::future::Ready<Result<(), ()>> {
            panic!("eager");
        });

        assert_eq!((item.job)().await, JobReport::Panicked);
        assert!(matches!(ticket.await, Err(OperationError::Panicked { .. })));
    }

    #[tokio::test]
    async fn test_dropped_ticket_still_runs() {
        let (item, ticket) = QueueItem::new(5, || async { Ok::<_, ()>(5) });
        drop(ticket);
        assert_eq!((item.job)().await, JobReport::Succeeded);
    }

    #[tokio::test]
    async fn test_unrun_item_abandons_ticket() {
        let (item, ticket) = QueueItem::new(6, || async { Ok::<_, ()>(()) });
        drop(item);
        assert!(matches!(ticket.await, Err(OperationError::Abandoned)));
    }

    #[test]
    fn test_stats_record_and_average() {
        let mut stats = QueueStats::default();
        assert_eq!(stats.average_wait(), None);

        stats.record(JobReport::Succeeded);
        stats.record(JobReport::Failed);
        stats.record(JobReport::Panicked);
        assert_eq!(stats.completed(), 3);

        stats.dispatched = 2;
        stats.total_wait = Duration::from_millis(300);
        assert_eq!(stats.average_wait(), Some(Duration::from_millis(150)));
    }

    #[test]
    fn test_average_wait_with_huge_dispatch_count() {
        // 2^32 dispatches would wrap a u32 divisor to zero
        let stats = QueueStats {
            dispatched: 1u64 << 32,
            total_wait: Duration::from_secs(1u64 << 32),
            ..Default::default()
        };
        assert_eq!(stats.average_wait(), Some(Duration::from_secs(1)));
    }
}
