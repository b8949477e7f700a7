//! Batch image generation for slide decks.
//!
//! Collects image prompts from slides, queues them, drains the queue through
//! an [`client::ImageGenerator`] in bounded batches, and writes the resulting
//! URLs back into the document.

pub mod api;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod manager;
pub mod queue;
pub mod router;
pub mod task;
pub mod util;
