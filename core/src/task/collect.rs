//! Pure scans that turn a slide snapshot into image tasks.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{DataPath, Slide, SlideElement};

use super::types::{Dimensions, ImageTask, TaskTarget};

/// Alt text value marking an element the authoring session wants dropped.
pub const REMOVE_SENTINEL: &str = "REMOVE_THIS_ELEMENT";
/// Key holding the prompt inside the secondary blob.
pub const ALT_KEY: &str = "imgAlt";
/// Sibling key receiving the generated URL.
pub const URL_KEY: &str = "imgUrl";

lazy_static! {
    static ref SIZE_PATTERN: Regex = Regex::new(r"^(\d+)\s*[xX]\s*(\d+)$").expect("valid size regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectOptions {
    /// Skip interactive slots whose `imgUrl` is already filled.
    #[serde(default = "default_skip_filled")]
    pub skip_filled_interactive: bool,
}

fn default_skip_filled() -> bool {
    true
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            skip_filled_interactive: default_skip_filled(),
        }
    }
}

/// Static tasks first, then interactive ones.
pub fn collect_tasks(slide: &Slide, opts: &CollectOptions) -> Vec<ImageTask> {
    let mut tasks = collect_static_tasks(slide);
    tasks.extend(collect_interactive_tasks(slide, opts));
    tasks
}

pub fn collect_static_tasks(slide: &Slide) -> Vec<ImageTask> {
    slide
        .elements
        .iter()
        .filter_map(|element| {
            let prompt = static_prompt(element)?;
            Some(ImageTask::new(
                TaskTarget::Static {
                    slide_id: slide.id.clone(),
                    element_id: element.id.clone(),
                },
                prompt,
                element_dimensions(element),
            ))
        })
        .collect()
}

fn static_prompt(element: &SlideElement) -> Option<&str> {
    if !element.is_image() {
        return None;
    }
    let alt = element.alt.as_deref()?.trim();
    if alt.is_empty() || alt == REMOVE_SENTINEL {
        return None;
    }
    Some(alt)
}

fn element_dimensions(element: &SlideElement) -> Dimensions {
    let fallback = Dimensions::STATIC_DEFAULT;
    Dimensions::new(
        element.width.and_then(positive_px).unwrap_or(fallback.width),
        element.height.and_then(positive_px).unwrap_or(fallback.height),
    )
}

fn positive_px(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 1.0).then(|| value.round() as u32)
}

pub fn collect_interactive_tasks(slide: &Slide, opts: &CollectOptions) -> Vec<ImageTask> {
    let Some(data) = slide.template_data.as_ref() else {
        return Vec::new();
    };
    let dimensions = effective_image_config(slide).unwrap_or(Dimensions::INTERACTIVE_DEFAULT);

    let mut slots = Vec::new();
    find_slots(data, &DataPath::root(), opts, &mut slots);

    slots
        .into_iter()
        .map(|(path, prompt)| {
            ImageTask::new(
                TaskTarget::Interactive {
                    slide_id: slide.id.clone(),
                    path,
                },
                prompt,
                dimensions,
            )
        })
        .collect()
}

/// Number of interactive slots that still need an image.
pub fn count_interactive_images(slide: &Slide) -> usize {
    let Some(data) = slide.template_data.as_ref() else {
        return 0;
    };
    let mut slots = Vec::new();
    find_slots(data, &DataPath::root(), &CollectOptions::default(), &mut slots);
    slots.len()
}

pub fn has_interactive_images(slide: &Slide) -> bool {
    count_interactive_images(slide) > 0
}

fn find_slots(value: &Value, path: &DataPath, opts: &CollectOptions, out: &mut Vec<(DataPath, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::String(alt) if key == ALT_KEY && !alt.trim().is_empty() => {
                        if opts.skip_filled_interactive && slot_filled(map) {
                            continue;
                        }
                        out.push((path.child(URL_KEY), alt.trim().to_string()));
                    }
                    _ => find_slots(child, &path.child(key.as_str()), opts, out),
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                find_slots(item, &path.child(index.to_string()), opts, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

fn slot_filled(map: &Map<String, Value>) -> bool {
    map.get(URL_KEY)
        .and_then(Value::as_str)
        .is_some_and(|url| !url.trim().is_empty())
}

/// Resolve interactive image dimensions, first valid source wins:
/// slide config, AI interactive config, AI config, blob config, blob
/// interactive config.
pub fn effective_image_config(slide: &Slide) -> Option<Dimensions> {
    let ai = slide.ai_data.as_ref();
    let blob = slide.template_data.as_ref();

    [
        slide.image_config.as_ref(),
        ai.and_then(|v| DataPath::parse("interactiveData.imageConfig").get(v)),
        ai.and_then(|v| v.get("imageConfig")),
        blob.and_then(|v| v.get("imageConfig")),
        blob.and_then(|v| DataPath::parse("interactiveData.imageConfig").get(v)),
    ]
    .into_iter()
    .flatten()
    .find_map(parse_image_config)
}

/// Accepts `{width, height}` (numbers or numeric strings) or `"WIDTHxHEIGHT"`.
pub fn parse_image_config(value: &Value) -> Option<Dimensions> {
    match value {
        Value::String(raw) => {
            let caps = SIZE_PATTERN.captures(raw.trim())?;
            let width = caps[1].parse::<u32>().ok().filter(|w| *w > 0)?;
            let height = caps[2].parse::<u32>().ok().filter(|h| *h > 0)?;
            Some(Dimensions::new(width, height))
        }
        Value::Object(map) => {
            let width = map.get("width").and_then(number_like)?;
            let height = map.get("height").and_then(number_like)?;
            Some(Dimensions::new(width, height))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::Array(_) => None,
    }
}

fn number_like(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    positive_px(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use serde_json::json;

    fn slide_with_blob(blob: Value) -> Slide {
        Slide::new("s1").with_template_data(blob)
    }

    #[test]
    fn test_static_scan_filters_elements() {
        let mut text = SlideElement::image("t1", "ignored");
        text.kind = "text".to_string();
        let slide = Slide::new("s1")
            .with_element(SlideElement::image("e1", "  a red apple ").with_size(320.4, 240.0))
            .with_element(SlideElement::image("e2", "   "))
            .with_element(SlideElement::image("e3", REMOVE_SENTINEL))
            .with_element(SlideElement::image("e4", "a pear"))
            .with_element(text);

        let tasks = collect_static_tasks(&slide);
        assert_eq!(tasks.len(), 2);

        assert_eq!(tasks[0].prompt, "a red apple");
        assert_eq!(tasks[0].dimensions, Dimensions::new(320, 240));
        assert_eq!(tasks[0].kind(), TaskKind::Static);
        assert_eq!(tasks[0].priority, 0);
        assert_eq!(
            tasks[0].target,
            TaskTarget::Static {
                slide_id: "s1".to_string(),
                element_id: "e1".to_string()
            }
        );
        assert_eq!(tasks[1].dimensions, Dimensions::STATIC_DEFAULT);
    }

    #[test]
    fn test_interactive_scan_targets_sibling_url() {
        let slide = slide_with_blob(json!({"quiz": {"itemA": {"imgAlt": "a cat"}}}));
        let tasks = collect_interactive_tasks(&slide, &CollectOptions::default());

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].prompt, "a cat");
        assert_eq!(tasks[0].kind(), TaskKind::Interactive);
        assert_eq!(tasks[0].dimensions, Dimensions::INTERACTIVE_DEFAULT);
        assert_eq!(
            tasks[0].target,
            TaskTarget::Interactive {
                slide_id: "s1".to_string(),
                path: DataPath::parse("quiz.itemA.imgUrl")
            }
        );
    }

    #[test]
    fn test_interactive_scan_walks_arrays() {
        let slide = slide_with_blob(json!({
            "cards": [{"imgAlt": "one"}, {"label": "no image"}, {"imgAlt": "three"}]
        }));
        let paths: Vec<String> = collect_interactive_tasks(&slide, &CollectOptions::default())
            .iter()
            .map(|t| match &t.target {
                TaskTarget::Interactive { path, .. } => path.to_string(),
                TaskTarget::Static { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(paths, vec!["cards.0.imgUrl", "cards.2.imgUrl"]);
    }

    #[test]
    fn test_filled_slot_is_skipped_unless_overridden() {
        let slide = slide_with_blob(json!({
            "a": {"imgAlt": "filled", "imgUrl": "https://img/a.png"},
            "b": {"imgAlt": "empty", "imgUrl": "  "}
        }));

        let default_tasks = collect_interactive_tasks(&slide, &CollectOptions::default());
        assert_eq!(default_tasks.len(), 1);
        assert_eq!(default_tasks[0].prompt, "empty");

        let all = collect_interactive_tasks(
            &slide,
            &CollectOptions {
                skip_filled_interactive: false,
            },
        );
        assert_eq!(all.len(), 2);
        assert_eq!(count_interactive_images(&slide), 1);
        assert!(has_interactive_images(&slide));
    }

    #[test]
    fn test_image_config_priority_chain() {
        let mut slide = slide_with_blob(json!({
            "imageConfig": "640x480",
            "interactiveData": {"imageConfig": {"width": 100, "height": 100}},
            "q": {"imgAlt": "x"}
        }));
        assert_eq!(effective_image_config(&slide), Some(Dimensions::new(640, 480)));

        slide.ai_data = Some(json!({"imageConfig": {"width": "512", "height": "256"}}));
        assert_eq!(effective_image_config(&slide), Some(Dimensions::new(512, 256)));

        slide.ai_data = Some(json!({
            "imageConfig": {"width": 512, "height": 256},
            "interactiveData": {"imageConfig": "1024 X 768"}
        }));
        assert_eq!(effective_image_config(&slide), Some(Dimensions::new(1024, 768)));

        slide.image_config = Some(json!("not a size"));
        assert_eq!(effective_image_config(&slide), Some(Dimensions::new(1024, 768)));

        slide.image_config = Some(json!({"width": 300, "height": 200}));
        let tasks = collect_interactive_tasks(&slide, &CollectOptions::default());
        assert_eq!(tasks[0].dimensions, Dimensions::new(300, 200));
    }

    #[test]
    fn test_parse_image_config_rejects_invalid() {
        assert_eq!(parse_image_config(&json!("0x10")), None);
        assert_eq!(parse_image_config(&json!("10x")), None);
        assert_eq!(parse_image_config(&json!({"width": -1, "height": 10})), None);
        assert_eq!(parse_image_config(&json!({"width": 10})), None);
        assert_eq!(parse_image_config(&json!(42)), None);
    }

    #[test]
    fn test_collect_tasks_orders_static_first() {
        let slide = Slide::new("s1")
            .with_element(SlideElement::image("e1", "static"))
            .with_template_data(json!({"imgAlt": "interactive"}));
        let kinds: Vec<TaskKind> = collect_tasks(&slide, &CollectOptions::default())
            .iter()
            .map(ImageTask::kind)
            .collect();
        assert_eq!(kinds, vec![TaskKind::Static, TaskKind::Interactive]);
    }
}
