//! Applies generated URLs back into the slide document.

mod debounce;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::document::{DataPath, ElementPatch, PathError, SlideStore, StoreError};
use crate::events::GenerationEvent;
use crate::task::TaskTarget;

use debounce::DataUpdateNotifier;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("element '{element_id}' on slide '{slide_id}' is not an image")]
    NotAnImage { slide_id: String, element_id: String },

    #[error("data path '{path}' on slide '{slide_id}' no longer resolves: {source}")]
    Path {
        slide_id: String,
        path: DataPath,
        #[source]
        source: PathError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Quiet window before a slide data update is announced.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

pub struct ResultRouter {
    store: Arc<dyn SlideStore>,
    notifier: DataUpdateNotifier,
}

impl ResultRouter {
    pub fn new(
        store: Arc<dyn SlideStore>,
        config: RouterConfig,
        events: broadcast::Sender<GenerationEvent>,
    ) -> Self {
        Self {
            store,
            notifier: DataUpdateNotifier::new(Duration::from_millis(config.debounce_ms), events),
        }
    }

    pub fn route(&self, target: &TaskTarget, image_url: &str) -> Result<(), RouteError> {
        match target {
            TaskTarget::Static {
                slide_id,
                element_id,
            } => self.route_static(slide_id, element_id, image_url),
            TaskTarget::Interactive { slide_id, path } => {
                self.route_interactive(slide_id, path, image_url)
            }
        }
    }

    fn route_static(&self, slide_id: &str, element_id: &str, image_url: &str) -> Result<(), RouteError> {
        let slide = self
            .store
            .find_slide(slide_id)
            .ok_or_else(|| StoreError::SlideNotFound(slide_id.to_string()))?;
        let element = slide.element(element_id).ok_or_else(|| StoreError::ElementNotFound {
            slide_id: slide_id.to_string(),
            element_id: element_id.to_string(),
        })?;
        if !element.is_image() {
            return Err(RouteError::NotAnImage {
                slide_id: slide_id.to_string(),
                element_id: element_id.to_string(),
            });
        }

        self.store
            .update_element(slide_id, element_id, &ElementPatch::src(image_url))?;
        tracing::debug!(
            target: "imagegen.router",
            stage = "router.static.applied",
            slide_id = %slide_id,
            element_id = %element_id
        );
        Ok(())
    }

    fn route_interactive(&self, slide_id: &str, path: &DataPath, image_url: &str) -> Result<(), RouteError> {
        let slide = self
            .store
            .find_slide(slide_id)
            .ok_or_else(|| StoreError::SlideNotFound(slide_id.to_string()))?;

        let mut data = slide
            .template_data
            .unwrap_or_else(|| Value::Object(Map::new()));
        path.set(&mut data, Value::String(image_url.to_string()))
            .map_err(|source| RouteError::Path {
                slide_id: slide_id.to_string(),
                path: path.clone(),
                source,
            })?;

        self.store.update_slide_data(slide_id, data)?;
        tracing::debug!(
            target: "imagegen.router",
            stage = "router.interactive.applied",
            slide_id = %slide_id,
            path = %path
        );
        self.notifier.mark(slide_id);
        Ok(())
    }
}
