use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use thiserror::Error;

use super::model::{Deck, ElementPatch, Slide};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("slide not found: {0}")]
    SlideNotFound(String),

    #[error("element '{element_id}' not found on slide '{slide_id}'")]
    ElementNotFound { slide_id: String, element_id: String },
}

/// Access to the slide document owned by the editor.
///
/// Implementations must be cheap to call from async code: every method is
/// synchronous and must not block on I/O.
pub trait SlideStore: Send + Sync {
    fn find_slide(&self, slide_id: &str) -> Option<Slide>;

    fn slide_ids(&self) -> Vec<String>;

    fn update_element(
        &self,
        slide_id: &str,
        element_id: &str,
        patch: &ElementPatch,
    ) -> Result<(), StoreError>;

    fn update_slide_data(&self, slide_id: &str, data: Value) -> Result<(), StoreError>;
}

/// [`SlideStore`] over an in-memory [`Deck`].
#[derive(Debug, Default)]
pub struct InMemorySlideStore {
    deck: RwLock<Deck>,
}

impl InMemorySlideStore {
    pub fn new(deck: Deck) -> Self {
        Self {
            deck: RwLock::new(deck),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Deck> {
        self.deck.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Deck> {
        self.deck.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Deck {
        self.read().clone()
    }

    pub fn insert_slide(&self, slide: Slide) {
        let mut deck = self.write();
        match deck.slide_mut(&slide.id) {
            Some(existing) => *existing = slide,
            None => deck.slides.push(slide),
        }
    }

    pub fn remove_slide(&self, slide_id: &str) -> Option<Slide> {
        let mut deck = self.write();
        let index = deck.slides.iter().position(|s| s.id == slide_id)?;
        Some(deck.slides.remove(index))
    }

    pub fn remove_element(&self, slide_id: &str, element_id: &str) -> bool {
        let mut deck = self.write();
        let Some(slide) = deck.slide_mut(slide_id) else {
            return false;
        };
        let before = slide.elements.len();
        slide.elements.retain(|e| e.id != element_id);
        slide.elements.len() != before
    }
}

impl SlideStore for InMemorySlideStore {
    fn find_slide(&self, slide_id: &str) -> Option<Slide> {
        self.read().slide(slide_id).cloned()
    }

    fn slide_ids(&self) -> Vec<String> {
        self.read().slides.iter().map(|s| s.id.clone()).collect()
    }

    fn update_element(
        &self,
        slide_id: &str,
        element_id: &str,
        patch: &ElementPatch,
    ) -> Result<(), StoreError> {
        let mut deck = self.write();
        let slide = deck
            .slide_mut(slide_id)
            .ok_or_else(|| StoreError::SlideNotFound(slide_id.to_string()))?;
        let element = slide
            .element_mut(element_id)
            .ok_or_else(|| StoreError::ElementNotFound {
                slide_id: slide_id.to_string(),
                element_id: element_id.to_string(),
            })?;
        patch.apply(element);
        Ok(())
    }

    fn update_slide_data(&self, slide_id: &str, data: Value) -> Result<(), StoreError> {
        let mut deck = self.write();
        let slide = deck
            .slide_mut(slide_id)
            .ok_or_else(|| StoreError::SlideNotFound(slide_id.to_string()))?;
        slide.template_data = Some(data);
        Ok(())
    }
}
