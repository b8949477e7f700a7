mod history;
mod progress;
mod settings;
mod store;

pub use history::{HistoryRecord, HISTORY_LIMIT};
pub use progress::Progress;
pub use settings::{BackoffKind, GenerationSettings, SettingsPatch};
pub use store::{BatchPoll, QueueCounts, QueueStatistics, QueueStore};
