use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Element type string carried by first-class image elements.
pub const IMAGE_ELEMENT_TYPE: &str = "image";

/// A whole slide deck as exchanged with the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    #[serde(default)]
    pub slides: Vec<Slide>,

    /// Fields owned by the editor that the generator never touches.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Deck {
    pub fn slide(&self, slide_id: &str) -> Option<&Slide> {
        self.slides.iter().find(|s| s.id == slide_id)
    }

    pub fn slide_mut(&mut self, slide_id: &str) -> Option<&mut Slide> {
        self.slides.iter_mut().find(|s| s.id == slide_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,

    #[serde(default)]
    pub elements: Vec<SlideElement>,

    /// Secondary free-form blob consumed by embedded mini-applications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_data: Option<Value>,

    /// Per-slide explicit image size, `{width,height}` or `"WxH"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_config: Option<Value>,

    /// Data left behind by the AI authoring session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_data: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Slide {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_element(mut self, element: SlideElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_template_data(mut self, data: Value) -> Self {
        self.template_data = Some(data);
        self
    }

    pub fn element(&self, element_id: &str) -> Option<&SlideElement> {
        self.elements.iter().find(|e| e.id == element_id)
    }

    pub fn element_mut(&mut self, element_id: &str) -> Option<&mut SlideElement> {
        self.elements.iter_mut().find(|e| e.id == element_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideElement {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlideElement {
    /// Image element with a descriptive alt text awaiting generation.
    pub fn image(id: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: IMAGE_ELEMENT_TYPE.to_string(),
            alt: Some(alt.into()),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn is_image(&self) -> bool {
        self.kind == IMAGE_ELEMENT_TYPE
    }
}

/// Property changes applied to a single element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementPatch {
    pub src: Option<String>,
}

impl ElementPatch {
    pub fn src(url: impl Into<String>) -> Self {
        Self {
            src: Some(url.into()),
        }
    }

    pub fn apply(&self, element: &mut SlideElement) {
        if let Some(src) = &self.src {
            element.src = Some(src.clone());
        }
    }
}
