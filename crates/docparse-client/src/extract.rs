//! Result payload extraction

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::config::ResultType;

/// Extracted content of a finished job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text or markdown
    Text(String),
    /// Structured payload (e.g. the `json` result type)
    Structured(Value),
}

impl Content {
    /// Text content, if this is a textual result
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Structured(_) => None,
        }
    }

    /// Length in characters of the rendered content
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.chars().count(),
            Self::Structured(v) => v.to_string().chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Text(s)),
            other => Some(Self::Structured(other)),
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Structured(v) => match serde_json::to_string_pretty(v) {
                Ok(pretty) => f.write_str(&pretty),
                Err(_) => write!(f, "{}", v),
            },
        }
    }
}

/// Pull the content out of a result body
///
/// A JSON object yields its `result_type` field, falling back to
/// `content`; `null` fields count as absent. Any other body is the content
/// itself. `None` means the job produced nothing, which is not an error.
pub fn extract_content(body: &str, result_type: ResultType) -> Option<Content> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) => {
            let field = map
                .remove(result_type.as_str())
                .filter(|v| !v.is_null())
                .or_else(|| map.remove("content"));
            field.and_then(Content::from_value)
        }
        Ok(other) => Content::from_value(other),
        Err(_) => Some(Content::Text(body.to_string())),
    }
}
