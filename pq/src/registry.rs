//! Named, independent queues, one per upstream provider

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::config::Config;
use crate::queue::{QueueConfig, RateQueue};

/// A set of independently paced queues looked up by name
///
/// Each name gets its own [`RateQueue`] on first use. Queues in the set share
/// no state, so a slow provider never holds back another.
#[derive(Debug)]
pub struct QueueSet {
    config: Config,
    queues: Mutex<HashMap<String, RateQueue>>,
}

impl QueueSet {
    /// Create an empty set where every queue uses `default`
    pub fn new(default: QueueConfig) -> Self {
        debug!(?default, "QueueSet::new: called");
        Self::from_config(&Config {
            queue: default,
            ..Default::default()
        })
    }

    /// Create a set honouring the provider overrides in `config`
    pub fn from_config(config: &Config) -> Self {
        debug!(providers = config.providers.len(), "QueueSet::from_config: called");
        Self {
            config: config.clone(),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Get the queue registered under `name`, creating it if needed
    pub fn queue(&self, name: &str) -> RateQueue {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = queues.get(name) {
            return queue.clone();
        }

        let config = self.config.provider(name);
        debug!(%name, ?config, "QueueSet::queue: creating queue");
        let queue = RateQueue::new(config);
        queues.insert(name.to_string(), queue.clone());
        queue
    }

    /// Names of the queues created so far, sorted
    pub fn names(&self) -> Vec<String> {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Items waiting across every queue in the set
    pub fn total_pending(&self) -> usize {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.values().map(RateQueue::len).sum()
    }
}
