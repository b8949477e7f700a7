use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{ImageTask, TaskKind};

/// Most recent records kept by the queue store.
pub const HISTORY_LIMIT: usize = 100;

/// Audit trail entry for one settled task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub slide_id: String,
    pub prompt: String,
    pub image_url: Option<String>,
    pub kind: TaskKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryRecord {
    pub fn succeeded(task: &ImageTask, image_url: &str) -> Self {
        Self::from_task(task, Some(image_url.to_string()), None)
    }

    pub fn failed(task: &ImageTask, error: impl Into<String>) -> Self {
        Self::from_task(task, None, Some(error.into()))
    }

    fn from_task(task: &ImageTask, image_url: Option<String>, error: Option<String>) -> Self {
        Self {
            id: task.id.clone(),
            timestamp: Utc::now(),
            slide_id: task.slide_id().to_string(),
            prompt: task.prompt.clone(),
            success: error.is_none(),
            image_url,
            kind: task.kind(),
            error,
        }
    }
}
