use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure to resolve a [`DataPath`] inside a JSON blob.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty data path")]
    Empty,

    #[error("segment '{segment}' descends into a non-container value")]
    NotContainer { segment: String },

    #[error("segment '{segment}' is not a valid index into an array of {len}")]
    BadIndex { segment: String, len: usize },
}

/// Dotted path into a slide's secondary data blob, e.g. `quiz.itemA.imgUrl`.
///
/// Numeric segments index into arrays; every other segment is an object key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DataPath(Vec<String>);

impl DataPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => None,
        })
    }

    /// Write `value` at this path, creating intermediate objects for missing
    /// or null keys. Returns the previous value when one was present.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<Option<Value>, PathError> {
        let Some((last, parents)) = self.0.split_last() else {
            return Err(PathError::Empty);
        };

        let mut current = root;
        for segment in parents {
            current = slot_mut(current, segment)?;
        }

        let slot = slot_mut(current, last)?;
        match std::mem::replace(slot, value) {
            Value::Null => Ok(None),
            previous => Ok(Some(previous)),
        }
    }
}

fn slot_mut<'a>(current: &'a mut Value, segment: &str) -> Result<&'a mut Value, PathError> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }

    match current {
        Value::Object(map) => Ok(map.entry(segment.to_string()).or_insert(Value::Null)),
        Value::Array(items) => {
            let len = items.len();
            segment
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i))
                .ok_or_else(|| PathError::BadIndex {
                    segment: segment.to_string(),
                    len,
                })
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Err(PathError::NotContainer {
                segment: segment.to_string(),
            })
        }
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for DataPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for DataPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for DataPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
