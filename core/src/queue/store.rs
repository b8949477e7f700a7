use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::task::{ImageTask, TaskKind, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM};
use crate::util::RingLog;

use super::history::{HistoryRecord, HISTORY_LIMIT};
use super::progress::Progress;
use super::settings::{GenerationSettings, SettingsPatch};

/// History records included in statistics.
const RECENT_HISTORY: usize = 10;

/// What the drain should do next within an epoch.
#[derive(Debug, PartialEq)]
pub enum BatchPoll {
    Ready(Vec<ImageTask>),
    /// Nothing queued for the epoch yet, but retries are on their way back.
    AwaitRetries,
    Exhausted,
}

struct QueueState {
    queue: Vec<ImageTask>,
    processing: bool,
    progress: Progress,
    settings: GenerationSettings,
    cache: HashMap<String, String>,
    history: RingLog<HistoryRecord>,
    next_seq: u64,
    next_epoch: u64,
    /// Bumped by `clear_queue`; tasks remember the value they were enqueued under.
    generation: u64,
    /// Tasks waiting out a retry delay before re-insertion.
    pending_retries: usize,
}

impl QueueState {
    fn new(settings: GenerationSettings) -> Self {
        Self {
            queue: Vec::new(),
            processing: false,
            progress: Progress::default(),
            settings,
            cache: HashMap::new(),
            history: RingLog::new(HISTORY_LIMIT),
            next_seq: 0,
            next_epoch: 0,
            generation: 0,
            pending_retries: 0,
        }
    }

    fn bump_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    fn reset_progress(&mut self) {
        let epoch = self.bump_epoch();
        self.progress = Progress::new(epoch, 0);
    }

    fn take_batch(&mut self, limit: usize, epoch: u64) -> Vec<ImageTask> {
        let mut eligible: Vec<&ImageTask> = self
            .queue
            .iter()
            .filter(|t| t.epoch == Some(epoch))
            .collect();
        eligible.sort_by(|a, b| a.dispatch_cmp(b));
        let picked: HashSet<String> = eligible.into_iter().take(limit).map(|t| t.id.clone()).collect();

        let (mut batch, rest): (Vec<_>, Vec<_>) =
            self.queue.drain(..).partition(|t| picked.contains(&t.id));
        self.queue = rest;
        batch.sort_by(ImageTask::dispatch_cmp);
        batch
    }

    fn sorted_queue(&self) -> Vec<ImageTask> {
        let mut sorted = self.queue.clone();
        sorted.sort_by(ImageTask::dispatch_cmp);
        sorted
    }
}

/// Canonical queue, progress, cache, settings, and history.
///
/// Pure bookkeeping: every method takes the lock, mutates, and returns. The
/// lock is never held across an `.await`.
pub struct QueueStore {
    state: Mutex<QueueState>,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new(GenerationSettings::default())
    }
}

impl QueueStore {
    pub fn new(settings: GenerationSettings) -> Self {
        Self {
            state: Mutex::new(QueueState::new(settings)),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- queue ----

    /// Append tasks in insertion order. Returns the new queue length.
    pub fn add_to_queue(&self, tasks: impl IntoIterator<Item = ImageTask>) -> usize {
        let mut state = self.state();
        for mut task in tasks {
            state.next_seq += 1;
            task.seq = state.next_seq;
            task.epoch = None;
            task.generation = state.generation;
            state.queue.push(task);
        }
        state.queue.len()
    }

    pub fn remove_from_queue(&self, task_id: &str) -> Option<ImageTask> {
        let mut state = self.state();
        let index = state.queue.iter().position(|t| t.id == task_id)?;
        Some(state.queue.remove(index))
    }

    /// Drop every queued task and reset progress. Returns how many were removed.
    pub fn clear_queue(&self) -> usize {
        let mut state = self.state();
        let removed = state.queue.len();
        state.queue.clear();
        state.generation += 1;
        state.reset_progress();
        removed
    }

    /// Snapshot in dispatch order.
    pub fn queue(&self) -> Vec<ImageTask> {
        self.state().sorted_queue()
    }

    pub fn queue_len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn has_active_jobs(&self) -> bool {
        let state = self.state();
        state.processing || !state.queue.is_empty() || state.pending_retries > 0
    }

    // ---- processing flag ----

    pub fn set_processing(&self, processing: bool) {
        self.state().processing = processing;
    }

    pub fn is_processing(&self) -> bool {
        self.state().processing
    }

    /// Atomically claim the drain. Returns `false` if one is already running.
    pub fn try_begin_processing(&self) -> bool {
        let mut state = self.state();
        if state.processing {
            return false;
        }
        state.processing = true;
        true
    }

    // ---- progress ----

    pub fn initialize_progress(&self, total: usize) -> u64 {
        let mut state = self.state();
        let epoch = state.bump_epoch();
        state.progress = Progress::new(epoch, total);
        epoch
    }

    /// Start a counting epoch over every queued task. Returns the epoch id
    /// and its total.
    pub fn begin_epoch(&self) -> (u64, usize) {
        let mut state = self.state();
        let epoch = state.bump_epoch();
        for task in state.queue.iter_mut() {
            task.epoch = Some(epoch);
        }
        let total = state.queue.len();
        state.progress = Progress::new(epoch, total);
        (epoch, total)
    }

    /// Remove up to `limit` tasks of `epoch` in dispatch order.
    pub fn take_batch(&self, limit: usize, epoch: u64) -> Vec<ImageTask> {
        self.state().take_batch(limit, epoch)
    }

    /// Take the next batch of `epoch`, or say why there is none. The queue,
    /// the progress and the retry count are read under the same lock so a
    /// retry landing in between cannot end the epoch early.
    pub fn next_batch(&self, limit: usize, epoch: u64) -> BatchPoll {
        let mut state = self.state();
        let batch = state.take_batch(limit, epoch);
        if !batch.is_empty() {
            return BatchPoll::Ready(batch);
        }
        let settled = state.progress.epoch != epoch || state.progress.is_settled();
        if settled || state.pending_retries == 0 {
            BatchPoll::Exhausted
        } else {
            BatchPoll::AwaitRetries
        }
    }

    pub fn increment_success(&self) {
        self.state().progress.record_success();
    }

    pub fn increment_failed(&self) {
        self.state().progress.record_failed();
    }

    /// Count a settled task if its epoch is still the one being tracked.
    pub fn count_outcome(&self, epoch: Option<u64>, success: bool) -> bool {
        let mut state = self.state();
        if epoch != Some(state.progress.epoch) {
            return false;
        }
        if success {
            state.progress.record_success();
        } else {
            state.progress.record_failed();
        }
        true
    }

    pub fn progress(&self) -> Progress {
        self.state().progress
    }

    pub fn epoch_settled(&self, epoch: u64) -> bool {
        let state = self.state();
        state.progress.epoch != epoch || state.progress.is_settled()
    }

    // ---- retries ----

    pub(crate) fn retry_scheduled(&self) {
        self.state().pending_retries += 1;
    }

    /// Re-insert a task whose retry delay elapsed, keeping its sequence
    /// number so it sorts ahead of work queued after it.
    ///
    /// A task dispatched before the last clear is handed back instead when
    /// `cancel_stale` is set; otherwise it joins the next epoch.
    pub(crate) fn requeue_retry(&self, mut task: ImageTask, cancel_stale: bool) -> Option<ImageTask> {
        let mut state = self.state();
        state.pending_retries = state.pending_retries.saturating_sub(1);
        if task.generation != state.generation {
            if cancel_stale {
                return Some(task);
            }
            task.epoch = None;
            task.generation = state.generation;
        }
        state.queue.push(task);
        None
    }

    pub fn pending_retries(&self) -> usize {
        self.state().pending_retries
    }

    /// Queued tasks and pending retries, read together.
    pub fn backlog(&self) -> (usize, usize) {
        let state = self.state();
        (state.queue.len(), state.pending_retries)
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    // ---- settings ----

    pub fn settings(&self) -> GenerationSettings {
        self.state().settings.clone()
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<GenerationSettings, String> {
        let mut state = self.state();
        let next = state.settings.merged(patch);
        next.validate()?;
        state.settings = next.clone();
        Ok(next)
    }

    // ---- cache ----

    pub fn get_cache(&self, prompt: &str) -> Option<String> {
        let state = self.state();
        if !state.settings.enable_cache {
            return None;
        }
        state.cache.get(prompt).cloned()
    }

    pub fn set_cache(&self, prompt: &str, url: &str) {
        let mut state = self.state();
        if state.settings.enable_cache {
            state.cache.insert(prompt.to_string(), url.to_string());
        }
    }

    pub fn clear_cache(&self) {
        self.state().cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.state().cache.len()
    }

    // ---- history ----

    pub fn add_to_history(&self, record: HistoryRecord) {
        self.state().history.push(record);
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.state().history.to_vec()
    }

    /// The `n` most recent records, newest first.
    pub fn recent_history(&self, n: usize) -> Vec<HistoryRecord> {
        self.state().history.iter().rev().take(n).cloned().collect()
    }

    pub fn clear_history(&self) {
        self.state().history.clear();
    }

    /// Clear queue, progress and cache. History is kept, and the processing
    /// flag stays with the drain that holds it.
    pub fn reset_all(&self) {
        let mut state = self.state();
        state.queue.clear();
        state.generation += 1;
        state.reset_progress();
        state.cache.clear();
    }

    pub fn statistics(&self) -> QueueStatistics {
        let state = self.state();
        let count_kind = |kind: TaskKind| state.queue.iter().filter(|t| t.kind() == kind).count();
        let count_priority = |p: u8| state.queue.iter().filter(|t| t.priority == p).count();

        let history_total = state.history.len();
        let succeeded = state.history.iter().filter(|r| r.success).count();
        let success_rate = if history_total == 0 {
            0
        } else {
            (succeeded as f64 / history_total as f64 * 100.0).round() as u8
        };

        QueueStatistics {
            queue: QueueCounts {
                total: state.queue.len(),
                static_tasks: count_kind(TaskKind::Static),
                interactive_tasks: count_kind(TaskKind::Interactive),
                high_priority: count_priority(PRIORITY_HIGH),
                medium_priority: count_priority(PRIORITY_MEDIUM),
                low_priority: count_priority(PRIORITY_LOW),
                pending_retries: state.pending_retries,
            },
            processing: state.processing,
            progress: state.progress,
            cache_size: state.cache.len(),
            cache_enabled: state.settings.enable_cache,
            history_total,
            success_rate,
            recent: state
                .history
                .iter()
                .rev()
                .take(RECENT_HISTORY)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub total: usize,
    pub static_tasks: usize,
    pub interactive_tasks: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
    pub pending_retries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatistics {
    pub queue: QueueCounts,
    pub processing: bool,
    pub progress: Progress,
    pub cache_size: usize,
    pub cache_enabled: bool,
    pub history_total: usize,
    /// Rounded percent of successful history records.
    pub success_rate: u8,
    /// Newest first.
    pub recent: Vec<HistoryRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DataPath;
    use crate::task::{Dimensions, TaskTarget};

    fn static_task(element: &str) -> ImageTask {
        ImageTask::new(
            TaskTarget::Static {
                slide_id: "s1".to_string(),
                element_id: element.to_string(),
            },
            format!("prompt {}", element),
            Dimensions::STATIC_DEFAULT,
        )
    }

    fn interactive_task(path: &str) -> ImageTask {
        ImageTask::new(
            TaskTarget::Interactive {
                slide_id: "s1".to_string(),
                path: DataPath::parse(path),
            },
            "interactive",
            Dimensions::INTERACTIVE_DEFAULT,
        )
    }

    #[test]
    fn test_take_batch_follows_priority_then_insertion() {
        let store = QueueStore::default();
        let low = static_task("low").with_priority(PRIORITY_LOW);
        let a = static_task("a");
        let b = static_task("b");
        store.add_to_queue([low, a, b]);

        let (epoch, total) = store.begin_epoch();
        assert_eq!(total, 3);

        let batch = store.take_batch(2, epoch);
        let ids: Vec<_> = batch
            .iter()
            .map(|t| match &t.target {
                TaskTarget::Static { element_id, .. } => element_id.clone(),
                TaskTarget::Interactive { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.queue_len(), 1);
        assert_eq!(store.take_batch(2, epoch).len(), 1);
        assert!(store.take_batch(2, epoch).is_empty());
    }

    #[test]
    fn test_tasks_added_mid_epoch_wait_for_next_epoch() {
        let store = QueueStore::default();
        store.add_to_queue([static_task("a")]);
        let (epoch, total) = store.begin_epoch();
        assert_eq!(total, 1);

        store.add_to_queue([static_task("late")]);
        let batch = store.take_batch(5, epoch);
        assert_eq!(batch.len(), 1);
        assert!(store.take_batch(5, epoch).is_empty());
        assert_eq!(store.queue_len(), 1);

        assert!(store.count_outcome(batch[0].epoch, true));
        assert!(store.epoch_settled(epoch));

        let (next, total) = store.begin_epoch();
        assert_ne!(next, epoch);
        assert_eq!(total, 1);
        assert_eq!(store.progress().total, 1);
    }

    #[test]
    fn test_count_outcome_ignores_stale_epoch() {
        let store = QueueStore::default();
        store.add_to_queue([static_task("a"), static_task("b")]);
        let (epoch, _) = store.begin_epoch();
        let batch = store.take_batch(1, epoch);

        assert_eq!(store.clear_queue(), 1);
        assert!(!store.count_outcome(batch[0].epoch, true));
        let progress = store.progress();
        assert_eq!((progress.total, progress.processed), (0, 0));
        assert!(store.epoch_settled(epoch));
    }

    #[test]
    fn test_progress_increments() {
        let store = QueueStore::default();
        store.initialize_progress(4);
        store.increment_success();
        store.increment_failed();
        let p = store.progress();
        assert_eq!((p.total, p.processed, p.success, p.failed), (4, 2, 1, 1));
        assert_eq!(p.percentage, 50);
    }

    #[test]
    fn test_try_begin_processing_is_exclusive() {
        let store = QueueStore::default();
        assert!(store.try_begin_processing());
        assert!(!store.try_begin_processing());
        store.set_processing(false);
        assert!(store.try_begin_processing());
    }

    #[test]
    fn test_cache_gated_by_setting() {
        let store = QueueStore::default();
        store.set_cache("apple", "u1");
        assert_eq!(store.get_cache("apple").as_deref(), Some("u1"));

        store
            .update_settings(&SettingsPatch {
                enable_cache: Some(false),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(store.get_cache("apple"), None);
        store.set_cache("pear", "u2");
        assert_eq!(store.cache_len(), 1);
    }

    #[test]
    fn test_update_settings_rejects_invalid() {
        let store = QueueStore::default();
        let err = store.update_settings(&SettingsPatch {
            concurrency: Some(0),
            ..SettingsPatch::default()
        });
        assert!(err.is_err());
        assert_eq!(store.settings().concurrency, 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let store = QueueStore::default();
        let task = static_task("a");
        for i in 0..(HISTORY_LIMIT + 5) {
            let mut record = HistoryRecord::succeeded(&task, "u");
            record.id = i.to_string();
            store.add_to_history(record);
        }
        let history = store.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].id, "5");
        assert_eq!(store.recent_history(1)[0].id, (HISTORY_LIMIT + 4).to_string());
    }

    #[test]
    fn test_statistics() {
        let store = QueueStore::default();
        store.add_to_queue([
            static_task("a"),
            static_task("b").with_priority(PRIORITY_MEDIUM),
            interactive_task("q.imgUrl"),
        ]);
        let task = static_task("x");
        store.add_to_history(HistoryRecord::succeeded(&task, "u"));
        store.add_to_history(HistoryRecord::failed(&task, "boom"));
        store.add_to_history(HistoryRecord::succeeded(&task, "u"));

        let stats = store.statistics();
        assert_eq!(stats.queue.total, 3);
        assert_eq!(stats.queue.static_tasks, 2);
        assert_eq!(stats.queue.interactive_tasks, 1);
        assert_eq!(stats.queue.high_priority, 2);
        assert_eq!(stats.queue.medium_priority, 1);
        assert_eq!(stats.history_total, 3);
        assert_eq!(stats.success_rate, 67);
        assert!(stats.recent[0].success);
        assert!(!stats.recent[1].success);
    }

    #[test]
    fn test_requeue_retry_handles_stale_tasks() {
        let store = QueueStore::default();
        store.add_to_queue([static_task("a"), static_task("b")]);
        let (epoch, _) = store.begin_epoch();
        let mut batch = store.take_batch(2, epoch);
        store.retry_scheduled();
        store.retry_scheduled();

        let fresh = batch.remove(0);
        assert!(store.requeue_retry(fresh, true).is_none());
        assert_eq!(store.take_batch(1, epoch).len(), 1);

        store.clear_queue();
        let stale = batch.remove(0);
        assert!(store.requeue_retry(stale.clone(), true).is_some());
        store.retry_scheduled();
        assert!(store.requeue_retry(stale, false).is_none());
        assert_eq!(store.pending_retries(), 0);

        let (next, total) = store.begin_epoch();
        assert_eq!(total, 1);
        assert_eq!(store.take_batch(1, next).len(), 1);
    }

    #[test]
    fn test_next_batch_waits_for_pending_retries() {
        let store = QueueStore::default();
        store.add_to_queue([static_task("a"), static_task("b")]);
        let (epoch, _) = store.begin_epoch();

        let BatchPoll::Ready(mut batch) = store.next_batch(2, epoch) else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 2);
        store.count_outcome(batch[0].epoch, true);
        store.retry_scheduled();
        assert_eq!(store.next_batch(2, epoch), BatchPoll::AwaitRetries);
        assert_eq!(store.backlog(), (0, 1));

        // A retry landing after the empty take is still picked up by the same epoch.
        assert!(store.requeue_retry(batch.remove(1), true).is_none());
        assert_eq!(store.backlog(), (1, 0));
        let BatchPoll::Ready(retried) = store.next_batch(2, epoch) else {
            panic!("expected the retried task");
        };
        assert_eq!(retried.len(), 1);
        store.count_outcome(retried[0].epoch, false);
        assert_eq!(store.next_batch(2, epoch), BatchPoll::Exhausted);
    }

    #[test]
    fn test_reset_all_keeps_history() {
        let store = QueueStore::default();
        store.add_to_queue([static_task("a")]);
        store.set_cache("apple", "u");
        store.add_to_history(HistoryRecord::succeeded(&static_task("a"), "u"));

        let generation = store.generation();
        store.reset_all();

        assert_eq!(store.queue_len(), 0);
        assert_eq!(store.progress().total, 0);
        assert_eq!(store.cache_len(), 0);
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.generation(), generation + 1);
    }
}
