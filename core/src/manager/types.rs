use serde::{Deserialize, Serialize};

/// Result of processing one task within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded { cached: bool },
    Failed,
    /// Re-insert scheduled; the task settles later in the same drain.
    RetryScheduled,
    /// Dispatched before a queue clear; result dropped.
    Cancelled,
}

/// What one drain did, returned by `process_queue`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainSummary {
    pub epochs: usize,
    pub batches: usize,
    pub batch_sizes: Vec<usize>,
    pub success: usize,
    pub failed: usize,
    pub retried: usize,
    pub cancelled: usize,
    pub cache_hits: usize,
    pub duration_ms: u64,
}

impl DrainSummary {
    pub(crate) fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded { cached } => {
                self.success += 1;
                if cached {
                    self.cache_hits += 1;
                }
            }
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::RetryScheduled => self.retried += 1,
            TaskOutcome::Cancelled => self.cancelled += 1,
        }
    }

    pub fn settled(&self) -> usize {
        self.success + self.failed
    }
}
