//! Start-rate limited FIFO queue
//!
//! Serializes asynchronous operations in submission order and keeps the
//! start of consecutive operations at least a minimum delay apart.

mod config;
mod core;
mod item;

pub use config::{DispatchMode, QueueConfig};
pub use core::RateQueue;
pub use item::{QueueState, QueueStats, Ticket};
