//! Built-in converters.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};

use super::{ComponentLoader, Converter};
use crate::engine::IndexDocument;

pub const STRING_MAP: &str = "string-map";
pub const NOOP: &str = "noop";
pub const SCHEMA_ELEMENT: &str = "schema-element";
pub const TASK: &str = "task";
pub const ISSUE_STATISTIC: &str = "issue-statistic";

pub(super) fn register_builtins(loader: &mut ComponentLoader) {
    loader
        .register_default_converter::<StringMapConverter>(STRING_MAP)
        .register_default_converter::<NoopConverter>(NOOP)
        .register_converter(SCHEMA_ELEMENT, || {
            Ok(Box::new(FieldProjectionConverter::schema_element()) as Box<dyn Converter>)
        })
        .register_converter(TASK, || {
            Ok(Box::new(FieldProjectionConverter::task()) as Box<dyn Converter>)
        })
        .register_converter(ISSUE_STATISTIC, || {
            Ok(Box::new(FieldProjectionConverter::issue_statistic()) as Box<dyn Converter>)
        });
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| anyhow!("{what} expects a JSON object, got {}", kind_of(value)))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Scalar rendered as text; `None` for null and containers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Flat `{"key": "value"}` objects.
///
/// Every entry becomes a `key: value` line of the body; `id` (if present) is
/// the document id.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringMapConverter;

impl Converter for StringMapConverter {
    fn to_document(&self, value: &Value) -> Result<IndexDocument> {
        let map = as_object(value, "string-map converter")?;
        let mut body = Vec::with_capacity(map.len());
        for (key, entry) in map {
            let Value::String(text) = entry else {
                bail!("string-map entry '{key}' is a {}, not a string", kind_of(entry));
            };
            body.push(format!("{key}: {text}"));
        }
        let id = map
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(IndexDocument::new(id, body.join("\n"), value.clone()))
    }

    fn from_document(&self, document: &IndexDocument) -> Result<Value> {
        let map = as_object(&document.payload, "string-map converter")?;
        if let Some((key, _)) = map.iter().find(|(_, v)| !v.is_string()) {
            bail!("stored string-map entry '{key}' is not a string");
        }
        Ok(document.payload.clone())
    }
}

/// Stores the value verbatim without searchable text.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConverter;

impl Converter for NoopConverter {
    fn to_document(&self, value: &Value) -> Result<IndexDocument> {
        let id = value
            .get("id")
            .and_then(scalar_text)
            .unwrap_or_default();
        Ok(IndexDocument::new(id, String::new(), value.clone()))
    }

    fn from_document(&self, document: &IndexDocument) -> Result<Value> {
        Ok(document.payload.clone())
    }
}

/// Projects a fixed id field and a list of text fields out of an object.
#[derive(Debug, Clone, Copy)]
pub struct FieldProjectionConverter {
    id_field: &'static str,
    text_fields: &'static [&'static str],
}

impl FieldProjectionConverter {
    pub const fn new(id_field: &'static str, text_fields: &'static [&'static str]) -> Self {
        Self {
            id_field,
            text_fields,
        }
    }

    /// Elements of a structured schema (name, type, documentation).
    pub const fn schema_element() -> Self {
        Self::new("path", &["name", "type", "documentation", "path"])
    }

    pub const fn task() -> Self {
        Self::new("id", &["title", "description", "owner", "status"])
    }

    /// Aggregated issue counters.
    pub const fn issue_statistic() -> Self {
        Self::new("issue", &["issue", "condition", "node", "count"])
    }
}

impl Converter for FieldProjectionConverter {
    fn to_document(&self, value: &Value) -> Result<IndexDocument> {
        let map = as_object(value, "projection converter")?;
        let id = map
            .get(self.id_field)
            .and_then(scalar_text)
            .with_context(|| format!("missing scalar '{}' field", self.id_field))?;
        let body = self
            .text_fields
            .iter()
            .filter_map(|f| map.get(*f).and_then(scalar_text))
            .collect::<Vec<_>>()
            .join(" ");
        Ok(IndexDocument::new(id, body, value.clone()))
    }

    fn from_document(&self, document: &IndexDocument) -> Result<Value> {
        let map = as_object(&document.payload, "projection converter")?;
        if !map.contains_key(self.id_field) {
            bail!("stored document lacks '{}' field", self.id_field);
        }
        Ok(document.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_map_body_and_id() {
        let value = json!({ "id": "t-1", "tag": "network" });
        let doc = StringMapConverter.to_document(&value).unwrap();
        assert_eq!(doc.id, "t-1");
        assert_eq!(doc.body, "id: t-1\ntag: network");
        assert_eq!(StringMapConverter.from_document(&doc).unwrap(), value);
    }

    #[test]
    fn string_map_rejects_non_strings() {
        let err = StringMapConverter
            .to_document(&json!({ "count": 3 }))
            .unwrap_err();
        assert!(err.to_string().contains("count"));
        assert!(StringMapConverter.to_document(&json!(["a"])).is_err());
    }

    #[test]
    fn noop_keeps_payload_only() {
        let value = json!({ "id": 7, "nested": { "x": [1, 2] } });
        let doc = NoopConverter.to_document(&value).unwrap();
        assert_eq!(doc.id, "7");
        assert!(doc.body.is_empty());
        assert_eq!(NoopConverter.from_document(&doc).unwrap(), value);
    }

    #[test]
    fn task_projection() {
        let value = json!({
            "id": 42,
            "title": "Restart node",
            "status": "open",
            "ignored": "x",
        });
        let conv = FieldProjectionConverter::task();
        let doc = conv.to_document(&value).unwrap();
        assert_eq!(doc.id, "42");
        assert_eq!(doc.body, "Restart node open");
        assert_eq!(conv.from_document(&doc).unwrap(), value);
    }

    #[test]
    fn projection_requires_id_field() {
        let conv = FieldProjectionConverter::issue_statistic();
        let err = conv.to_document(&json!({ "count": 1 })).unwrap_err();
        assert!(err.to_string().contains("issue"));
    }
}
