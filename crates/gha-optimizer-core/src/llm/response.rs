use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?[ \t]*\r?\n?(.*?)\r?\n?```").expect("valid fence pattern")
});

/// Why a completion could not be used as a recommendation list.
#[derive(Error, Debug, PartialEq)]
pub enum ShapeError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response is a JSON {0}, expected an array of objects")]
    NotAnArray(&'static str),

    #[error("response array contains no objects")]
    NoObjects,
}

/// Pull the JSON payload out of a completion.
///
/// Prefers the first fenced code block (optionally tagged `json`), then the span from
/// the first `[` to the last `]`, then the whole trimmed text.
pub fn extract_json(text: &str) -> &str {
    if let Some(block) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        return block.as_str().trim();
    }

    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            return text[start..=end].trim();
        }
    }

    text.trim()
}

/// Parse a completion into raw recommendation entries.
///
/// The payload must be a JSON array. An empty array is a valid answer; a non-empty
/// array with no objects at all is not. Individual non-object entries are left for
/// validation to drop.
pub fn parse_recommendation_array(text: &str) -> Result<Vec<Value>, ShapeError> {
    let payload = extract_json(text);
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ShapeError::InvalidJson(e.to_string()))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(_) => return Err(ShapeError::NotAnArray("object")),
        Value::String(_) => return Err(ShapeError::NotAnArray("string")),
        Value::Number(_) => return Err(ShapeError::NotAnArray("number")),
        Value::Bool(_) => return Err(ShapeError::NotAnArray("boolean")),
        Value::Null => return Err(ShapeError::NotAnArray("null")),
    };

    if !entries.is_empty() && !entries.iter().any(Value::is_object) {
        return Err(ShapeError::NoObjects);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_fenced_block() {
        let text = "Here are the results:\n```json\n[{\"title\": \"a\"}]\n```\nDone [x].";
        assert_eq!(extract_json(text), "[{\"title\": \"a\"}]");

        let untagged = "```\n[]\n```";
        assert_eq!(extract_json(untagged), "[]");

        let upper = "```JSON\n[1]\n```";
        assert_eq!(extract_json(upper), "[1]");
    }

    #[test]
    fn test_extract_outermost_array() {
        let text = "Sure! [{\"title\": \"a\", \"tags\": [\"x\"]}] hope that helps";
        assert_eq!(extract_json(text), "[{\"title\": \"a\", \"tags\": [\"x\"]}]");
    }

    #[test]
    fn test_extract_plain_text() {
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(extract_json("] backwards ["), "] backwards [");
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(parse_recommendation_array("[]").unwrap().len(), 0);
        assert_eq!(
            parse_recommendation_array("[{\"title\":\"a\"}, 3]").unwrap().len(),
            2
        );
        assert_eq!(
            parse_recommendation_array("{\"title\":\"a\"}"),
            Err(ShapeError::NotAnArray("object"))
        );
        assert_eq!(
            parse_recommendation_array("[1, 2]"),
            Err(ShapeError::NoObjects)
        );
        assert!(matches!(
            parse_recommendation_array("I could not analyze these workflows."),
            Err(ShapeError::InvalidJson(_))
        ));
    }
}
