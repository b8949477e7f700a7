//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `imagegen_core::api` instead of reaching into internal modules.

pub use crate::client::{
    extract_error_message, extract_image_url, reports_success, GenerateErrorKind,
    GenerateRequest, GenerateResponse, ImageGenerator, DEFAULT_MODEL,
};
pub use crate::config::{load_default, AppConfig, ClientConfig, LoggingConfig};
pub use crate::document::{
    DataPath, Deck, ElementPatch, InMemorySlideStore, Slide, SlideElement, SlideStore,
    StoreError,
};
pub use crate::error::{CliError, ManagerError};
pub use crate::events::GenerationEvent;
pub use crate::manager::{DrainSummary, ImageGenerationManager, ImageGenerationManagerBuilder};
pub use crate::queue::{
    BackoffKind, GenerationSettings, HistoryRecord, Progress, QueueStatistics, SettingsPatch,
};
pub use crate::router::{RouteError, RouterConfig};
pub use crate::task::{CollectOptions, Dimensions, ImageTask, TaskKind, TaskTarget};
