use serde::{Deserialize, Serialize};

/// Snapshot of a tool as reported by its server at connect time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Any non-text content (images, resources, structured output) in JSON form.
    Json(serde_json::Value),
}

/// Result of `tools/call` after protocol decoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolCallResult {
    pub is_error: bool,
    pub content: Vec<ContentPart>,
}

impl ToolCallResult {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![ContentPart::Text(content.into())],
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![ContentPart::Text(message.into())],
        }
    }

    /// All text segments joined by newlines, or `None` when there are none.
    #[must_use]
    pub fn joined_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|c| match c {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Json(_) => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }

    /// JSON array of the non-text segments, or `None` when there are none.
    #[must_use]
    pub fn json_fallback(&self) -> Option<String> {
        let values: Vec<&serde_json::Value> = self
            .content
            .iter()
            .filter_map(|c| match c {
                ContentPart::Json(v) => Some(v),
                ContentPart::Text(_) => None,
            })
            .collect();
        if values.is_empty() {
            None
        } else {
            serde_json::to_string(&values).ok()
        }
    }
}
