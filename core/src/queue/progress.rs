use serde::{Deserialize, Serialize};

/// Aggregate counters for one drain epoch.
///
/// `processed == success + failed` holds after every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub epoch: u64,
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub percentage: u8,
}

impl Progress {
    pub fn new(epoch: u64, total: usize) -> Self {
        Self {
            epoch,
            total,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.success += 1;
        self.record_processed();
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
        self.record_processed();
    }

    fn record_processed(&mut self) {
        self.processed = self.success + self.failed;
        self.percentage = percentage(self.processed, self.total);
    }

    /// Every task counted in this epoch has settled.
    pub fn is_settled(&self) -> bool {
        self.processed >= self.total
    }
}

fn percentage(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}
