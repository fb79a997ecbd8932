//! Rate-limited queue implementation

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{DispatchMode, QueueConfig};
use super::item::{JobReport, QueueItem, QueueState, QueueStats, Ticket};

/// Stand-in for "never" when an offset would overflow `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `base + offset`, clamped to a far-future instant instead of overflowing
fn saturating_add(base: Instant, offset: Duration) -> Instant {
    base.checked_add(offset)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// Internal state protected by mutex
struct QueueInner {
    /// Items waiting for dispatch, in submission order
    pending: VecDeque<QueueItem>,

    /// True while a drain task owns the queue
    draining: bool,

    /// When the most recent operation started
    last_start: Option<Instant>,

    /// Externally imposed earliest next start
    not_before: Option<Instant>,

    /// Dispatched operations that have not reported back yet
    in_flight: usize,

    /// Next sequence number to hand out
    next_seq: u64,

    /// Statistics
    stats: QueueStats,
}

impl QueueInner {
    /// Earliest instant the next operation may start
    fn next_start(&self, min_delay: Duration) -> Option<Instant> {
        let paced = self.last_start.map(|t| saturating_add(t, min_delay));
        match (paced, self.not_before) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// What the drain loop does next
enum Next {
    /// Nothing pending; the drain has released the queue
    Idle,
    /// Too early; sleep until the given instant and look again
    Wait(Instant),
    /// Head item claimed and stamped as started
    Run(QueueItem),
}

struct Shared {
    config: QueueConfig,
    state: Mutex<QueueInner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // Critical sections never run user code, so a poisoned lock still
        // holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide the drain loop's next step, claiming the head item if it may start
    fn next(&self, min_delay: Duration) -> Next {
        let mut inner = self.lock();

        let now = Instant::now();
        if !inner.pending.is_empty() {
            if let Some(start) = inner.next_start(min_delay).filter(|start| *start > now) {
                return Next::Wait(start);
            }
        }

        let Some(item) = inner.pending.pop_front() else {
            inner.draining = false;
            return Next::Idle;
        };

        inner.last_start = Some(now);
        inner.in_flight += 1;
        inner.stats.dispatched += 1;
        inner.stats.total_wait += now.saturating_duration_since(item.submitted_at);
        Next::Run(item)
    }

    fn finish(&self, seq: u64, report: JobReport) {
        debug!(seq, ?report, "RateQueue::finish: called");
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.stats.record(report);
        if report == JobReport::Panicked {
            warn!(seq, "Queued operation panicked");
        }
    }
}

/// A FIFO queue that starts submitted operations one at a time, never two
/// starts closer together than the configured minimum delay.
///
/// Handles are cheap to clone and all refer to the same queue. Independent
/// queues are independent values; nothing is shared between them.
#[derive(Clone)]
pub struct RateQueue {
    shared: Arc<Shared>,
}

impl RateQueue {
    /// Create a new queue with the given configuration
    pub fn new(config: QueueConfig) -> Self {
        debug!(?config, "RateQueue::new: called");
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(QueueInner {
                    pending: VecDeque::new(),
                    draining: false,
                    last_start: None,
                    not_before: None,
                    in_flight: 0,
                    next_seq: 1,
                    stats: QueueStats::default(),
                }),
            }),
        }
    }

    /// Create a queue with the given minimum delay and default dispatch mode
    pub fn with_min_delay(min_delay: Duration) -> Self {
        Self::new(QueueConfig::with_min_delay(min_delay))
    }

    /// Enqueue an operation and return a ticket for its eventual result
    ///
    /// Never blocks and never fails. Must be called from within a Tokio
    /// runtime, since the first submission to an idle queue spawns its
    /// drain task.
    pub fn submit<F, Fut, T, E>(&self, operation: F) -> Ticket<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut inner = self.shared.lock();

        let seq = inner.next_seq;
        inner.next_seq += 1;
        debug!(seq, pending = inner.pending.len(), "RateQueue::submit: called");

        let (item, ticket) = QueueItem::new(seq, operation);
        inner.pending.push_back(item);
        inner.stats.submitted += 1;
        inner.stats.peak_pending = inner.stats.peak_pending.max(inner.pending.len());

        if inner.draining {
            debug!(seq, "RateQueue::submit: drain already running");
        } else {
            debug!(seq, "RateQueue::submit: starting drain");
            inner.draining = true;
            tokio::spawn(drain(self.shared.clone()));
        }

        ticket
    }

    /// Number of items waiting for dispatch, not counting running ones
    pub fn len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Check if nothing is waiting for dispatch
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hold off the next start until at least `duration` from now
    ///
    /// Use when an upstream service asks callers to back off. An existing
    /// longer hold-off is kept. Operations already running are unaffected.
    pub fn hold_off(&self, duration: Duration) {
        debug!(?duration, "RateQueue::hold_off: called");
        let until = saturating_add(Instant::now(), duration);
        let mut inner = self.shared.lock();
        match inner.not_before {
            Some(existing) if existing >= until => {
                debug!("RateQueue::hold_off: existing hold-off is longer, keeping it");
            }
            _ => {
                info!(?duration, "Holding off queue dispatch");
                inner.not_before = Some(until);
            }
        }
    }

    /// Get current queue state
    pub fn state(&self) -> QueueState {
        debug!("RateQueue::state: called");
        let inner = self.shared.lock();
        QueueState {
            pending: inner.pending.len(),
            in_flight: inner.in_flight,
            draining: inner.draining,
            since_last_start: inner.last_start.map(|t| t.elapsed()),
            stats: inner.stats.clone(),
        }
    }

    /// Get the queue statistics
    pub fn stats(&self) -> QueueStats {
        debug!("RateQueue::stats: called");
        self.shared.lock().stats.clone()
    }

    /// Minimum time between consecutive starts
    pub fn min_delay(&self) -> Duration {
        self.shared.config.min_delay()
    }

    pub fn mode(&self) -> DispatchMode {
        self.shared.config.dispatch
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for RateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateQueue")
            .field("config", &self.shared.config)
            .field("pending", &self.len())
            .finish()
    }
}

/// Drain loop: pop, pace and run items until the queue is empty
async fn drain(shared: Arc<Shared>) {
    debug!("drain: called");
    let min_delay = shared.config.min_delay();

    loop {
        let item = match shared.next(min_delay) {
            Next::Idle => {
                debug!("drain: queue empty, stopping");
                return;
            }
            Next::Wait(start) => {
                debug!(?start, "drain: pacing, sleeping");
                tokio::time::sleep_until(start).await;
                // Re-check: a hold-off may have moved the start while asleep.
                continue;
            }
            Next::Run(item) => item,
        };

        let seq = item.seq;
        debug!(seq, "drain: dispatching");
        let job = (item.job)();

        match shared.config.dispatch {
            DispatchMode::Sequential => {
                let report = job.await;
                shared.finish(seq, report);
            }
            DispatchMode::Paced => {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let report = job.await;
                    shared.finish(seq, report);
                });
            }
        }
    }
}
