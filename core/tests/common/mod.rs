#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use imagegen_core::api::{
    Deck, GenerateErrorKind, GenerateRequest, GenerateResponse, GenerationSettings,
    ImageGenerationManager, ImageGenerator, InMemorySlideStore, RouterConfig, Slide,
};

/// Generator double: counts calls, tracks peak in-flight calls, and fails
/// scripted prompts a given number of times before succeeding.
pub struct ScriptedGenerator {
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    failures: Mutex<HashMap<String, (usize, GenerateErrorKind)>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(5),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `times` calls for `prompt` with `kind`.
    pub fn fail_first(self, prompt: &str, times: usize, kind: GenerateErrorKind) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(prompt.to_string(), (times, kind));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerateRequest) -> GenerateResponse {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let scripted = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&request.prompt) {
                Some((left, kind)) if *left > 0 => {
                    *left -= 1;
                    Some(*kind)
                }
                _ => None,
            }
        };
        match scripted {
            Some(kind) => GenerateResponse::failed(kind, "scripted failure"),
            None => GenerateResponse::ok(format!(
                "https://img.test/{}/{}",
                call,
                request.prompt.replace(' ', "-")
            )),
        }
    }
}

pub fn store_with(slides: Vec<Slide>) -> Arc<InMemorySlideStore> {
    Arc::new(InMemorySlideStore::new(Deck {
        slides,
        ..Deck::default()
    }))
}

pub fn manager_with(
    generator: Arc<ScriptedGenerator>,
    store: Arc<InMemorySlideStore>,
    settings: GenerationSettings,
) -> ImageGenerationManager {
    ImageGenerationManager::builder(generator, store)
        .settings(settings)
        .router_config(RouterConfig { debounce_ms: 0 })
        .build()
        .expect("valid settings")
}

pub fn settings(concurrency: usize) -> GenerationSettings {
    GenerationSettings {
        concurrency,
        retry_delay_ms: 10,
        ..GenerationSettings::default()
    }
}
