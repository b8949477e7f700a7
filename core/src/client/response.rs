use serde_json::Value;

use crate::document::DataPath;

pub const DEFAULT_ERROR_MESSAGE: &str = "image generation failed";

const JIMENG_MODEL: &str = "jimeng";

/// True when the body claims success in the shape `model` answers with:
/// `{"status": "success"}` for `jimeng`, `{"success": true}` for the rest.
pub fn reports_success(body: &Value, model: &str) -> bool {
    if model == JIMENG_MODEL {
        body.get("status").and_then(Value::as_str) == Some("success")
    } else {
        body.get("success").and_then(Value::as_bool) == Some(true)
    }
}

/// Pull the image URL out of a successful relay response body.
pub fn extract_image_url(body: &Value, model: &str) -> Option<String> {
    if !reports_success(body, model) {
        return None;
    }
    let candidates: &[&str] = if model == JIMENG_MODEL {
        &["data.data.image_url", "data.image_url", "image_url"]
    } else {
        &["data.url"]
    };
    candidates
        .iter()
        .find_map(|path| non_empty_str(DataPath::parse(path).get(body)))
        .map(str::to_string)
}

pub fn extract_error_message(body: &Value) -> String {
    ["message", "errorMessage", "error_message"]
        .iter()
        .find_map(|key| non_empty_str(body.get(*key)))
        .unwrap_or(DEFAULT_ERROR_MESSAGE)
        .to_string()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
