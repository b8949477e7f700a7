use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::DataPath;

/// Highest dispatch priority; every collected task uses it.
pub const PRIORITY_HIGH: u8 = 0;
pub const PRIORITY_MEDIUM: u8 = 1;
pub const PRIORITY_LOW: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Static,
    Interactive,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Interactive => "interactive",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested output size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const STATIC_DEFAULT: Self = Self::new(800, 600);
    pub const INTERACTIVE_DEFAULT: Self = Self::new(400, 300);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where a generated image must land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskTarget {
    /// `src` of an image element.
    Static {
        slide_id: String,
        element_id: String,
    },
    /// Key inside the slide's secondary data blob.
    Interactive { slide_id: String, path: DataPath },
}

impl TaskTarget {
    pub fn slide_id(&self) -> &str {
        match self {
            Self::Static { slide_id, .. } | Self::Interactive { slide_id, .. } => slide_id,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Static { .. } => TaskKind::Static,
            Self::Interactive { .. } => TaskKind::Interactive,
        }
    }
}

impl fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static {
                slide_id,
                element_id,
            } => write!(f, "{}#{}", slide_id, element_id),
            Self::Interactive { slide_id, path } => write!(f, "{}:{}", slide_id, path),
        }
    }
}

/// One unit of "generate an image for this prompt and place it there".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTask {
    pub id: String,
    pub target: TaskTarget,
    pub prompt: String,
    pub dimensions: Dimensions,
    /// Lower dispatches sooner.
    pub priority: u8,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,

    /// Insertion order, assigned by the queue store.
    #[serde(skip)]
    pub(crate) seq: u64,
    /// Progress epoch the task is counted in, assigned when an epoch begins.
    #[serde(skip)]
    pub(crate) epoch: Option<u64>,
    /// Cancellation generation at enqueue time.
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl ImageTask {
    pub fn new(target: TaskTarget, prompt: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target,
            prompt: prompt.into(),
            dimensions,
            priority: PRIORITY_HIGH,
            retry_count: 0,
            created_at: Utc::now(),
            seq: 0,
            epoch: None,
            generation: 0,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn kind(&self) -> TaskKind {
        self.target.kind()
    }

    pub fn slide_id(&self) -> &str {
        self.target.slide_id()
    }

    /// Dispatch order: priority, then creation time, then insertion order.
    pub(crate) fn dispatch_cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.created_at.cmp(&other.created_at))
            .then(self.seq.cmp(&other.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_accessors() {
        let target = TaskTarget::Interactive {
            slide_id: "s1".to_string(),
            path: DataPath::parse("quiz.imgUrl"),
        };
        assert_eq!(target.slide_id(), "s1");
        assert_eq!(target.kind(), TaskKind::Interactive);
        assert_eq!(target.to_string(), "s1:quiz.imgUrl");
    }

    #[test]
    fn test_dispatch_order() {
        let target = TaskTarget::Static {
            slide_id: "s1".to_string(),
            element_id: "e1".to_string(),
        };
        let mut a = ImageTask::new(target.clone(), "a", Dimensions::STATIC_DEFAULT);
        let mut b = ImageTask::new(target.clone(), "b", Dimensions::STATIC_DEFAULT);
        b.created_at = a.created_at;
        a.seq = 2;
        b.seq = 1;
        assert_eq!(a.dispatch_cmp(&b), Ordering::Greater);

        let low = ImageTask::new(target, "c", Dimensions::STATIC_DEFAULT).with_priority(PRIORITY_LOW);
        assert_eq!(low.dispatch_cmp(&a), Ordering::Greater);
    }

    #[test]
    fn test_task_serializes_target_kind() {
        let task = ImageTask::new(
            TaskTarget::Static {
                slide_id: "s1".to_string(),
                element_id: "e1".to_string(),
            },
            "a cat",
            Dimensions::new(320, 240),
        );
        let v = serde_json::to_value(&task).unwrap();
        assert_eq!(v["target"]["kind"], "static");
        assert_eq!(v["dimensions"]["width"], 320);
        assert!(v.get("seq").is_none());
    }
}
