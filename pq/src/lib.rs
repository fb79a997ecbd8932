//! pacequeue - start-rate limited FIFO queue for asynchronous operations
//!
//! Callers hand the queue zero-argument async operations (typically calls to
//! a rate-limited upstream API). The queue starts them one at a time in
//! submission order, never two starts closer together than a configured
//! minimum delay, and hands each caller its own operation's outcome.
//!
//! # Modules
//!
//! - [`queue`] - The rate-limited queue, its configuration and tickets
//! - [`registry`] - Independent named queues, one per upstream provider
//! - [`config`] - Configuration types and loading
//! - [`demo`] - Synthetic workload used by the `pq demo` command
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pacequeue::RateQueue;
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = RateQueue::with_min_delay(Duration::from_secs(1));
//!
//!     let first = queue.submit(|| async { Ok::<_, std::io::Error>("first") });
//!     let second = queue.submit(|| async { Ok::<_, std::io::Error>("second") });
//!
//!     // `second` starts no sooner than one second after `first` did.
//!     assert_eq!(first.await.unwrap(), "first");
//!     assert_eq!(second.await.unwrap(), "second");
//! }
//! ```

pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod queue;
pub mod registry;

// Re-export commonly used types
pub use config::Config;
pub use error::OperationError;
pub use queue::{DispatchMode, QueueConfig, QueueState, QueueStats, RateQueue, Ticket};
pub use registry::QueueSet;
