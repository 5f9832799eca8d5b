//! Projection of MCP tool input schemas onto the subset of JSON Schema the
//! Gemini function-declaration API accepts.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Sub-schemas nested deeper than this are dropped.
pub const MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ScalarKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    fn accepts_enum(self) -> bool {
        !matches!(self, Self::Boolean)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SchemaNode {
    Scalar {
        kind: ScalarKind,
        description: Option<String>,
        enum_values: Option<Vec<Value>>,
    },
    Object {
        description: Option<String>,
        properties: BTreeMap<String, SchemaNode>,
        required: Vec<String>,
    },
    Array {
        description: Option<String>,
        items: Option<Box<SchemaNode>>,
    },
}

impl SchemaNode {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar { kind, .. } => kind.as_str(),
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Scalar { description, .. }
            | Self::Object { description, .. }
            | Self::Array { description, .. } => description.as_deref(),
        }
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.type_name())?;
        if let Some(description) = self.description() {
            map.serialize_entry("description", description)?;
        }
        match self {
            Self::Scalar { enum_values, .. } => {
                if let Some(values) = enum_values {
                    map.serialize_entry("enum", values)?;
                }
            }
            Self::Object {
                properties,
                required,
                ..
            } => {
                if !properties.is_empty() {
                    map.serialize_entry("properties", properties)?;
                }
                if !required.is_empty() {
                    map.serialize_entry("required", required)?;
                }
            }
            Self::Array { items, .. } => {
                if let Some(items) = items {
                    map.serialize_entry("items", items)?;
                }
            }
        }
        map.end()
    }
}

/// Clean `schema` for use as function-declaration parameters.
///
/// Returns `None` only when the root is not a JSON object, in which case the
/// tool should be declared without parameters.
#[must_use]
pub fn clean(schema: &Value, tool_name: &str) -> Option<SchemaNode> {
    clean_at(schema, tool_name, "root", 0)
}

fn clean_at(schema: &Value, tool: &str, path: &str, depth: usize) -> Option<SchemaNode> {
    let Value::Object(obj) = schema else {
        if path == "root" {
            tracing::warn!(tool, "input schema is not an object, declaring tool without parameters");
        } else {
            tracing::warn!(tool, path, "dropping non-object sub-schema");
        }
        return None;
    };
    if depth > MAX_DEPTH {
        tracing::warn!(tool, path, max = MAX_DEPTH, "dropping sub-schema nested too deeply");
        return None;
    }

    let type_name = match obj.get("type").and_then(Value::as_str) {
        Some(t @ ("string" | "number" | "integer" | "boolean" | "array" | "object")) => t,
        other => {
            let fallback = if obj.contains_key("properties") {
                "object"
            } else {
                "string"
            };
            tracing::warn!(tool, path, found = ?other, fallback, "invalid schema type, substituting");
            fallback
        }
    };

    let description = match obj.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    let node = match type_name {
        "object" => {
            let mut properties = BTreeMap::new();
            if let Some(Value::Object(props)) = obj.get("properties") {
                for (name, sub) in props {
                    let sub_path = format!("{path}.properties.{name}");
                    if let Some(node) = clean_at(sub, tool, &sub_path, depth + 1) {
                        properties.insert(name.clone(), node);
                    }
                }
            }
            let required = if properties.is_empty() {
                Vec::new()
            } else {
                obj.get("required")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .filter(|n| properties.contains_key(*n))
                            .map(str::to_owned)
                            .collect()
                    })
                    .unwrap_or_default()
            };
            SchemaNode::Object {
                description,
                properties,
                required,
            }
        }
        "array" => {
            let items_path = format!("{path}.items");
            let items = obj
                .get("items")
                .and_then(|items| clean_at(items, tool, &items_path, depth + 1));
            if items.is_none() {
                tracing::warn!(tool, path, "array schema has no valid item schema");
            }
            SchemaNode::Array {
                description,
                items: items.map(Box::new),
            }
        }
        scalar => {
            let kind = match scalar {
                "number" => ScalarKind::Number,
                "integer" => ScalarKind::Integer,
                "boolean" => ScalarKind::Boolean,
                _ => ScalarKind::String,
            };
            let enum_values = obj
                .get("enum")
                .and_then(Value::as_array)
                .filter(|_| kind.accepts_enum())
                .and_then(|values| {
                    let kept: Vec<Value> = values
                        .iter()
                        .filter(|v| v.is_string() || v.is_number() || v.is_boolean())
                        .cloned()
                        .collect();
                    if kept.is_empty() {
                        tracing::warn!(tool, path, "enum has no scalar values, dropping it");
                        None
                    } else {
                        Some(kept)
                    }
                });
            SchemaNode::Scalar {
                kind,
                description,
                enum_values,
            }
        }
    };
    Some(node)
}
