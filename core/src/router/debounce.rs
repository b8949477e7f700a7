use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::events::GenerationEvent;

/// Coalesces bursts of per-slide data updates into one
/// [`GenerationEvent::SlideDataUpdated`] per quiet window.
#[derive(Clone)]
pub(crate) struct DataUpdateNotifier {
    window: Duration,
    events: broadcast::Sender<GenerationEvent>,
    /// Latest mark per slide; a timer only fires if it is still the latest.
    marks: Arc<Mutex<HashMap<String, u64>>>,
}

impl DataUpdateNotifier {
    pub(crate) fn new(window: Duration, events: broadcast::Sender<GenerationEvent>) -> Self {
        Self {
            window,
            events,
            marks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn mark(&self, slide_id: &str) {
        let handle = match Handle::try_current() {
            Ok(handle) if !self.window.is_zero() => handle,
            _ => {
                emit(&self.events, slide_id);
                return;
            }
        };

        let token = {
            let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
            let token = marks.get(slide_id).map_or(1, |t| t.wrapping_add(1));
            marks.insert(slide_id.to_string(), token);
            token
        };

        let window = self.window;
        let marks = Arc::clone(&self.marks);
        let events = self.events.clone();
        let slide_id = slide_id.to_string();
        handle.spawn(async move {
            tokio::time::sleep(window).await;
            let latest = {
                let mut marks = marks.lock().unwrap_or_else(PoisonError::into_inner);
                if marks.get(&slide_id) == Some(&token) {
                    marks.remove(&slide_id);
                    true
                } else {
                    false
                }
            };
            if latest {
                emit(&events, &slide_id);
            }
        });
    }
}

fn emit(events: &broadcast::Sender<GenerationEvent>, slide_id: &str) {
    tracing::debug!(target: "imagegen.router", stage = "router.data_updated", slide_id = %slide_id);
    let _ = events.send(GenerationEvent::SlideDataUpdated {
        slide_id: slide_id.to_string(),
        timestamp: Utc::now(),
    });
}
