//! Notifications for presentation layers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::manager::DrainSummary;
use crate::queue::Progress;
use crate::task::TaskKind;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    DrainStarted {
        queued: usize,
        timestamp: DateTime<Utc>,
    },
    EpochStarted {
        epoch: u64,
        total: usize,
        timestamp: DateTime<Utc>,
    },
    BatchStarted {
        epoch: u64,
        batch: usize,
        size: usize,
        timestamp: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        slide_id: String,
        kind: TaskKind,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        progress: Progress,
        timestamp: DateTime<Utc>,
    },
    TaskRetryScheduled {
        task_id: String,
        attempt: u32,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },
    DrainFinished {
        summary: DrainSummary,
        timestamp: DateTime<Utc>,
    },
    QueueCleared {
        removed: usize,
        timestamp: DateTime<Utc>,
    },
    /// A slide's secondary data blob changed; emitted once per debounce window.
    SlideDataUpdated {
        slide_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl GenerationEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::DrainStarted { timestamp, .. }
            | Self::EpochStarted { timestamp, .. }
            | Self::BatchStarted { timestamp, .. }
            | Self::TaskCompleted { timestamp, .. }
            | Self::TaskRetryScheduled { timestamp, .. }
            | Self::DrainFinished { timestamp, .. }
            | Self::QueueCleared { timestamp, .. }
            | Self::SlideDataUpdated { timestamp, .. } => *timestamp,
        }
    }

    pub fn slide_id(&self) -> Option<&str> {
        match self {
            Self::TaskCompleted { slide_id, .. } | Self::SlideDataUpdated { slide_id, .. } => {
                Some(slide_id)
            }
            _ => None,
        }
    }
}
