//! Synthetic workload for exercising a queue from the command line

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::error::OperationError;
use crate::queue::RateQueue;

/// Shape of the synthetic workload
#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    pub count: u32,
    /// How long each operation sleeps before finishing
    pub work: Duration,
    /// Every K-th operation fails; 0 disables
    pub fail_every: u32,
    /// 1-based index of an operation that panics
    pub panic_at: Option<u32>,
}

/// Error returned by a synthetic operation told to fail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("synthetic failure in operation {index}")]
pub struct DemoFailure {
    pub index: u32,
}

/// How one synthetic operation went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoOutcome {
    Ok,
    Failed(String),
    Panicked(String),
    Abandoned,
}

impl DemoOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, DemoOutcome::Ok)
    }
}

/// One line of the demo timeline
#[derive(Debug, Clone)]
pub struct DemoLine {
    pub seq: u64,
    /// Start time relative to the first submission; unknown if the
    /// operation never reported one
    pub started: Option<Duration>,
    pub outcome: DemoOutcome,
}

/// Outcome counts over a demo timeline
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DemoSummary {
    pub ok: usize,
    pub failed: usize,
    pub panicked: usize,
    pub abandoned: usize,
}

impl DemoSummary {
    pub fn from_lines(lines: &[DemoLine]) -> Self {
        lines.iter().fold(Self::default(), |mut summary, line| {
            match line.outcome {
                DemoOutcome::Ok => summary.ok += 1,
                DemoOutcome::Failed(_) => summary.failed += 1,
                DemoOutcome::Panicked(_) => summary.panicked += 1,
                DemoOutcome::Abandoned => summary.abandoned += 1,
            }
            summary
        })
    }
}

/// Submit `options.count` operations at once and wait for all of them
///
/// Lines come back in submission order.
pub async fn run(queue: &RateQueue, options: &DemoOptions) -> Vec<DemoLine> {
    debug!(?options, "demo::run: called");
    let t0 = Instant::now();

    let tickets: Vec<_> = (1..=options.count)
        .map(|index| {
            let work = options.work;
            let fails = options.fail_every > 0 && index % options.fail_every == 0;
            let panics = options.panic_at == Some(index);
            queue.submit(move || async move {
                let started = Instant::now();
                if panics {
                    panic!("synthetic panic in operation {}", index);
                }
                if !work.is_zero() {
                    tokio::time::sleep(work).await;
                }
                if fails {
                    return Err((started, DemoFailure { index }));
                }
                Ok(started)
            })
        })
        .collect();

    let mut lines = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let seq = ticket.seq();
        let (started, outcome) = match ticket.await {
            Ok(started) => (Some(started), DemoOutcome::Ok),
            Err(OperationError::Failure((started, failure))) => (Some(started), DemoOutcome::Failed(failure.to_string())),
            Err(OperationError::Panicked { reason }) => (None, DemoOutcome::Panicked(reason)),
            Err(OperationError::Abandoned) => (None, DemoOutcome::Abandoned),
        };
        lines.push(DemoLine {
            seq,
            started: started.map(|s| s - t0),
            outcome,
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_demo_timeline() {
        let queue = RateQueue::with_min_delay(Duration::from_millis(100));
        let options = DemoOptions {
            count: 4,
            fail_every: 2,
            ..Default::default()
        };

        let lines = run(&queue, &options).await;

        assert_eq!(lines.len(), 4);
        let seqs: Vec<u64> = lines.iter().map(|l| l.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        let starts: Vec<u64> = lines.iter().map(|l| l.started.unwrap().as_millis() as u64).collect();
        assert_eq!(starts, vec![0, 100, 200, 300]);
        assert!(lines[0].outcome.is_ok());
        assert_eq!(
            lines[1].outcome,
            DemoOutcome::Failed("synthetic failure in operation 2".to_string())
        );
        assert!(lines[2].outcome.is_ok());
        assert!(!lines[3].outcome.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_panic_does_not_stop_the_rest() {
        let queue = RateQueue::with_min_delay(Duration::from_millis(10));
        let options = DemoOptions {
            count: 3,
            panic_at: Some(2),
            ..Default::default()
        };

        let lines = run(&queue, &options).await;

        assert!(lines[0].outcome.is_ok());
        assert_eq!(
            lines[1].outcome,
            DemoOutcome::Panicked("synthetic panic in operation 2".to_string())
        );
        // No start time is reported for the panicked item
        assert_eq!(lines[1].started, None);
        assert!(lines[2].outcome.is_ok());
        assert_eq!(lines[2].started, Some(Duration::from_millis(20)));

        let summary = DemoSummary::from_lines(&lines);
        assert_eq!(
            summary,
            DemoSummary {
                ok: 2,
                failed: 0,
                panicked: 1,
                abandoned: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_work_time_in_sequential_mode() {
        let queue = RateQueue::with_min_delay(Duration::from_millis(10));
        let options = DemoOptions {
            count: 2,
            work: Duration::from_millis(50),
            ..Default::default()
        };

        let lines = run(&queue, &options).await;
        assert_eq!(lines[1].started, Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_summary_counts_abandoned_separately() {
        let line = |outcome| DemoLine {
            seq: 1,
            started: None,
            outcome,
        };
        let lines = vec![
            line(DemoOutcome::Ok),
            line(DemoOutcome::Failed("x".to_string())),
            line(DemoOutcome::Abandoned),
            line(DemoOutcome::Abandoned),
        ];

        let summary = DemoSummary::from_lines(&lines);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.panicked, 0);
        assert_eq!(summary.abandoned, 2);
    }
}
