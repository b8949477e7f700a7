use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, Notify};

use crate::client::{GenerateRequest, GenerateResponse, ImageGenerator, DEFAULT_MODEL};
use crate::document::{Slide, SlideStore};
use crate::error::ManagerError;
use crate::events::GenerationEvent;
use crate::queue::{
    BatchPoll, GenerationSettings, HistoryRecord, Progress, QueueStatistics, QueueStore,
    SettingsPatch,
};
use crate::router::{ResultRouter, RouterConfig};
use crate::task::{collect_tasks, CollectOptions, Dimensions, ImageTask, TaskTarget};

use super::retry::strategy_for;
use super::scheduler::execute_batch;
use super::types::{DrainSummary, TaskOutcome};

const CANCELLED_BY_CLEAR: &str = "cancelled by queue clear";
const DEFAULT_EVENT_CAPACITY: usize = 256;

type SharedGeneration = Shared<BoxFuture<'static, GenerateResponse>>;

/// Orchestrates collection, queueing, bounded batch dispatch, retries and
/// result routing for one editing session.
///
/// Cheap to clone; every clone drives the same queue.
#[derive(Clone)]
pub struct ImageGenerationManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    store: QueueStore,
    slides: Arc<dyn SlideStore>,
    generator: Arc<dyn ImageGenerator>,
    router: ResultRouter,
    model: String,
    collect: CollectOptions,
    events: broadcast::Sender<GenerationEvent>,
    /// Calls currently running, keyed by prompt.
    in_flight: Mutex<HashMap<String, SharedGeneration>>,
    /// Signalled whenever a retry is re-inserted or dropped.
    retry_ready: Notify,
}

pub struct ImageGenerationManagerBuilder {
    generator: Arc<dyn ImageGenerator>,
    slides: Arc<dyn SlideStore>,
    settings: GenerationSettings,
    collect: CollectOptions,
    router: RouterConfig,
    model: String,
    event_capacity: usize,
}

impl ImageGenerationManagerBuilder {
    pub fn new(generator: Arc<dyn ImageGenerator>, slides: Arc<dyn SlideStore>) -> Self {
        Self {
            generator,
            slides,
            settings: GenerationSettings::default(),
            collect: CollectOptions::default(),
            router: RouterConfig::default(),
            model: DEFAULT_MODEL.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn collect_options(mut self, collect: CollectOptions) -> Self {
        self.collect = collect;
        self
    }

    pub fn router_config(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Result<ImageGenerationManager, ManagerError> {
        self.settings
            .validate()
            .map_err(ManagerError::InvalidSettings)?;

        let (events, _) = broadcast::channel(self.event_capacity);
        let router = ResultRouter::new(Arc::clone(&self.slides), self.router, events.clone());

        Ok(ImageGenerationManager {
            inner: Arc::new(ManagerInner {
                store: QueueStore::new(self.settings),
                slides: self.slides,
                generator: self.generator,
                router,
                model: self.model,
                collect: self.collect,
                events,
                in_flight: Mutex::new(HashMap::new()),
                retry_ready: Notify::new(),
            }),
        })
    }
}

impl ManagerInner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedGeneration>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the drain claim even if the drain unwinds.
struct ProcessingGuard<'a>(&'a QueueStore);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_processing(false);
    }
}

impl ImageGenerationManager {
    pub fn builder(
        generator: Arc<dyn ImageGenerator>,
        slides: Arc<dyn SlideStore>,
    ) -> ImageGenerationManagerBuilder {
        ImageGenerationManagerBuilder::new(generator, slides)
    }

    // ---- entry points ----

    /// Collect the tasks of a slide snapshot and queue them without draining.
    pub fn enqueue_slide(&self, slide: &Slide) -> usize {
        let tasks = collect_tasks(slide, &self.inner.collect);
        let count = tasks.len();
        if count > 0 {
            let queued = self.inner.store.add_to_queue(tasks);
            tracing::debug!(
                target: "imagegen.manager",
                stage = "manager.enqueue",
                slide_id = %slide.id,
                tasks = count,
                queued = queued
            );
        }
        count
    }

    pub fn enqueue(&self, tasks: impl IntoIterator<Item = ImageTask>) -> usize {
        self.inner.store.add_to_queue(tasks)
    }

    /// Generate every missing image of one slide.
    ///
    /// Returns `None` when nothing was collected or another drain is already
    /// running (that drain picks the new tasks up).
    pub async fn process_slide_images(
        &self,
        slide_id: &str,
    ) -> Result<Option<DrainSummary>, ManagerError> {
        let slide = self
            .inner
            .slides
            .find_slide(slide_id)
            .ok_or_else(|| ManagerError::SlideNotFound(slide_id.to_string()))?;
        if self.enqueue_slide(&slide) == 0 {
            tracing::debug!(target: "imagegen.manager", stage = "manager.slide.empty", slide_id = %slide_id);
            return Ok(None);
        }
        Ok(self.process_queue().await)
    }

    /// Generate every missing image of every slide in the store.
    pub async fn process_document(&self) -> Option<DrainSummary> {
        let mut collected = 0;
        for slide_id in self.inner.slides.slide_ids() {
            if let Some(slide) = self.inner.slides.find_slide(&slide_id) {
                collected += self.enqueue_slide(&slide);
            }
        }
        tracing::info!(target: "imagegen.manager", stage = "manager.document.collected", tasks = collected);
        if collected == 0 {
            return None;
        }
        self.process_queue().await
    }

    /// Queue a single image for `target` and drain.
    pub async fn request_image(
        &self,
        target: TaskTarget,
        prompt: impl Into<String>,
        dimensions: Dimensions,
    ) -> Option<DrainSummary> {
        let task = ImageTask::new(target, prompt, dimensions);
        tracing::debug!(
            target: "imagegen.manager",
            stage = "manager.request",
            task_id = %task.id,
            target = %task.target
        );
        self.inner.store.add_to_queue([task]);
        self.process_queue().await
    }

    /// Drain the queue unless a drain is already running.
    pub async fn process_queue(&self) -> Option<DrainSummary> {
        let store = &self.inner.store;
        if !store.try_begin_processing() {
            tracing::debug!(target: "imagegen.manager", stage = "manager.drain.busy");
            return None;
        }

        let summary = {
            let _guard = ProcessingGuard(store);
            self.drain().await
        };
        self.emit(GenerationEvent::DrainFinished {
            summary: summary.clone(),
            timestamp: Utc::now(),
        });
        Some(summary)
    }

    // ---- drain ----

    async fn drain(&self) -> DrainSummary {
        let store = &self.inner.store;
        let started = Instant::now();
        let mut summary = DrainSummary::default();

        let queued = store.queue_len();
        tracing::info!(target: "imagegen.manager", stage = "manager.drain.start", queued = queued);
        self.emit(GenerationEvent::DrainStarted {
            queued,
            timestamp: Utc::now(),
        });

        loop {
            let (queued, pending) = store.backlog();
            if queued == 0 {
                if pending == 0 {
                    break;
                }
                self.inner.retry_ready.notified().await;
                continue;
            }

            let (epoch, total) = store.begin_epoch();
            summary.epochs += 1;
            tracing::debug!(
                target: "imagegen.manager",
                stage = "manager.epoch.start",
                epoch = epoch,
                total = total
            );
            self.emit(GenerationEvent::EpochStarted {
                epoch,
                total,
                timestamp: Utc::now(),
            });
            self.drain_epoch(epoch, &mut summary).await;
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            target: "imagegen.manager",
            stage = "manager.drain.end",
            epochs = summary.epochs,
            batches = summary.batches,
            success = summary.success,
            failed = summary.failed,
            retried = summary.retried,
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms
        );
        summary
    }

    async fn drain_epoch(&self, epoch: u64, summary: &mut DrainSummary) {
        let store = &self.inner.store;
        loop {
            // Settings are re-read per batch so updates apply to the next one.
            let settings = store.settings();
            let batch = match store.next_batch(settings.concurrency, epoch) {
                BatchPoll::Ready(batch) => batch,
                BatchPoll::AwaitRetries => {
                    self.inner.retry_ready.notified().await;
                    continue;
                }
                BatchPoll::Exhausted => return,
            };

            summary.batches += 1;
            summary.batch_sizes.push(batch.len());
            tracing::debug!(
                target: "imagegen.manager",
                stage = "manager.batch.start",
                epoch = epoch,
                batch = summary.batches,
                size = batch.len()
            );
            self.emit(GenerationEvent::BatchStarted {
                epoch,
                batch: summary.batches,
                size: batch.len(),
                timestamp: Utc::now(),
            });

            let manager = self;
            let settings_ref = &settings;
            let outcomes = execute_batch(batch, settings.concurrency, move |task| {
                manager.process_task(task, settings_ref)
            })
            .await;
            for outcome in outcomes {
                summary.record(outcome);
            }
        }
    }

    // ---- per task ----

    async fn process_task(&self, task: ImageTask, settings: &GenerationSettings) -> TaskOutcome {
        let store = &self.inner.store;
        let (response, cached) = match store.get_cache(&task.prompt) {
            Some(url) => {
                tracing::debug!(
                    target: "imagegen.manager",
                    stage = "manager.task.cache_hit",
                    task_id = %task.id
                );
                (GenerateResponse::ok(url), true)
            }
            None => (self.generate(&task, settings.enable_cache).await, false),
        };

        if settings.cancel_on_clear && task.generation != store.generation() {
            tracing::info!(
                target: "imagegen.manager",
                stage = "manager.task.cancelled",
                task_id = %task.id,
                target = %task.target
            );
            store.add_to_history(HistoryRecord::failed(&task, CANCELLED_BY_CLEAR));
            return TaskOutcome::Cancelled;
        }

        match response.url() {
            Some(url) => {
                let url = url.to_string();
                self.apply(task, &url, cached)
            }
            None => self.handle_failure(task, &response, settings),
        }
    }

    /// Issue the call, or join one already running for the same prompt.
    async fn generate(&self, task: &ImageTask, coalesce: bool) -> GenerateResponse {
        let request = GenerateRequest::new(task.prompt.clone(), self.inner.model.clone(), task.dimensions);
        if !coalesce {
            return self.inner.generator.generate(&request).await;
        }

        let call = {
            let mut in_flight = self.in_flight();
            match in_flight.get(&task.prompt) {
                Some(call) => {
                    tracing::debug!(
                        target: "imagegen.manager",
                        stage = "manager.task.coalesced",
                        task_id = %task.id
                    );
                    call.clone()
                }
                None => {
                    let call = self.shared_call(task.prompt.clone(), request);
                    in_flight.insert(task.prompt.clone(), call.clone());
                    call
                }
            }
        };
        call.await
    }

    /// The call caches its URL and leaves the in-flight map itself, so the
    /// entry is released by whichever task finishes polling it, even when
    /// the task that started it was dropped.
    fn shared_call(&self, prompt: String, request: GenerateRequest) -> SharedGeneration {
        let generator = Arc::clone(&self.inner.generator);
        let inner = Arc::downgrade(&self.inner);
        async move {
            let response = generator.generate(&request).await;
            if let Some(inner) = inner.upgrade() {
                if let Some(url) = response.url() {
                    inner.store.set_cache(&prompt, url);
                }
                inner.in_flight().remove(&prompt);
            }
            response
        }
        .boxed()
        .shared()
    }

    fn apply(&self, task: ImageTask, url: &str, cached: bool) -> TaskOutcome {
        let store = &self.inner.store;
        if let Err(err) = self.inner.router.route(&task.target, url) {
            tracing::warn!(
                target: "imagegen.manager",
                stage = "manager.task.route_failed",
                task_id = %task.id,
                target = %task.target,
                error = %err
            );
            return self.settle_failed(&task, &err.to_string());
        }

        store.count_outcome(task.epoch, true);
        store.add_to_history(HistoryRecord::succeeded(&task, url));
        tracing::info!(
            target: "imagegen.manager",
            stage = "manager.task.applied",
            task_id = %task.id,
            target = %task.target,
            cached = cached
        );
        self.emit_completed(&task, Some(url), None);
        TaskOutcome::Succeeded { cached }
    }

    fn handle_failure(
        &self,
        task: ImageTask,
        response: &GenerateResponse,
        settings: &GenerationSettings,
    ) -> TaskOutcome {
        let strategy = strategy_for(settings);
        if strategy.should_retry(task.retry_count, response.error_kind) {
            if let Some(delay) = strategy.next_delay(task.retry_count) {
                self.schedule_retry(task, delay, response.error_message());
                return TaskOutcome::RetryScheduled;
            }
        }

        tracing::warn!(
            target: "imagegen.manager",
            stage = "manager.task.failed",
            task_id = %task.id,
            target = %task.target,
            retries = task.retry_count,
            kind = ?response.error_kind,
            error = %response.error_message()
        );
        self.settle_failed(&task, response.error_message())
    }

    fn settle_failed(&self, task: &ImageTask, error: &str) -> TaskOutcome {
        let store = &self.inner.store;
        store.count_outcome(task.epoch, false);
        store.add_to_history(HistoryRecord::failed(task, error));
        self.emit_completed(task, None, Some(error));
        TaskOutcome::Failed
    }

    fn schedule_retry(&self, mut task: ImageTask, delay: Duration, error: &str) {
        task.retry_count += 1;
        self.inner.store.retry_scheduled();
        tracing::info!(
            target: "imagegen.manager",
            stage = "manager.task.retry_scheduled",
            task_id = %task.id,
            attempt = task.retry_count,
            delay_ms = delay.as_millis() as u64,
            error = %error
        );
        self.emit(GenerationEvent::TaskRetryScheduled {
            task_id: task.id.clone(),
            attempt: task.retry_count,
            delay_ms: delay.as_millis() as u64,
            timestamp: Utc::now(),
        });

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.resume_retry(task);
        });
    }

    fn resume_retry(&self, task: ImageTask) {
        let store = &self.inner.store;
        let cancel_stale = store.settings().cancel_on_clear;
        if let Some(dropped) = store.requeue_retry(task, cancel_stale) {
            tracing::info!(
                target: "imagegen.manager",
                stage = "manager.task.retry_cancelled",
                task_id = %dropped.id
            );
            store.add_to_history(HistoryRecord::failed(&dropped, CANCELLED_BY_CLEAR));
        }
        self.inner.retry_ready.notify_one();
    }

    // ---- queue control and snapshots ----

    /// Drop every queued task. Tasks already dispatched still finish.
    pub fn clear_queue(&self) -> usize {
        let removed = self.inner.store.clear_queue();
        tracing::info!(target: "imagegen.manager", stage = "manager.queue.cleared", removed = removed);
        self.emit(GenerationEvent::QueueCleared {
            removed,
            timestamp: Utc::now(),
        });
        self.inner.retry_ready.notify_one();
        removed
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<GenerationSettings, ManagerError> {
        let settings = self
            .inner
            .store
            .update_settings(patch)
            .map_err(ManagerError::InvalidSettings)?;
        tracing::debug!(target: "imagegen.manager", stage = "manager.settings.updated", settings = ?settings);
        Ok(settings)
    }

    pub fn settings(&self) -> GenerationSettings {
        self.inner.store.settings()
    }

    pub fn progress(&self) -> Progress {
        self.inner.store.progress()
    }

    pub fn queue(&self) -> Vec<ImageTask> {
        self.inner.store.queue()
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.inner.store.history()
    }

    pub fn statistics(&self) -> QueueStatistics {
        self.inner.store.statistics()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.store.is_processing()
    }

    pub fn clear_cache(&self) {
        self.inner.store.clear_cache();
    }

    pub fn clear_history(&self) {
        self.inner.store.clear_history();
    }

    pub fn reset_all(&self) {
        self.inner.store.reset_all();
        self.inner.retry_ready.notify_one();
        tracing::info!(target: "imagegen.manager", stage = "manager.reset");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: GenerationEvent) {
        let _ = self.inner.events.send(event);
    }

    fn emit_completed(&self, task: &ImageTask, image_url: Option<&str>, error: Option<&str>) {
        self.emit(GenerationEvent::TaskCompleted {
            task_id: task.id.clone(),
            slide_id: task.slide_id().to_string(),
            kind: task.kind(),
            success: error.is_none(),
            image_url: image_url.map(str::to_string),
            error: error.map(str::to_string),
            progress: self.inner.store.progress(),
            timestamp: Utc::now(),
        });
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedGeneration>> {
        self.inner.in_flight()
    }
}
