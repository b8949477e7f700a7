//! Slide document model and the store interface the generator writes into.
//!
//! The editor owns the document; the generator only reads slides to collect
//! work and writes results back through [`SlideStore`].

mod model;
mod path;
mod store;

pub use model::{Deck, ElementPatch, Slide, SlideElement, IMAGE_ELEMENT_TYPE};
pub use path::{DataPath, PathError};
pub use store::{InMemorySlideStore, SlideStore, StoreError};
