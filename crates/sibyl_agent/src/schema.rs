//! Parameter-schema bridge between the tool catalogue and the oracle.
//!
//! Provider schema validators accept only a subset of JSON Schema, so every
//! declaration passes through `sanitize_schema` before it is sent:
//! `additionalProperties` is stripped at every depth, `title` only at the
//! root (the tool name already serves as the title; nested titles such as a
//! property literally named "title" must survive).

use crate::api_types::Tool;
use crate::registry::ToolId;
use serde_json::Value;

pub fn sanitize_schema(schema: &Value) -> Value {
    sanitize(schema, true)
}

fn sanitize(value: &Value, is_root: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, child) in map {
                if key == "additionalProperties" {
                    continue;
                }
                if is_root && key == "title" {
                    continue;
                }
                out.insert(key.clone(), sanitize(child, false));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize(v, false)).collect()),
        other => other.clone(),
    }
}

/// The full set of tool declarations, built once at startup. Infallible:
/// every schema is a literal owned by the catalogue.
pub fn build_declarations() -> Vec<Tool> {
    ToolId::ALL
        .iter()
        .map(|id| Tool {
            name: id.name().to_string(),
            description: id.description().to_string(),
            input_schema: sanitize_schema(&id.parameters()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_additional_properties_at_all_depths() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "filters": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": { "name": { "type": "string" } }
                }
            }
        });
        let clean = sanitize_schema(&schema);
        assert_eq!(clean.get("additionalProperties"), None);
        assert_eq!(
            clean.pointer("/properties/filters/additionalProperties"),
            None
        );
        assert!(clean.pointer("/properties/filters/properties/name").is_some());
    }

    #[test]
    fn test_strips_title_only_at_root() {
        let schema = json!({
            "title": "run_query arguments",
            "type": "object",
            "properties": {
                "title": { "type": "string", "title": "Chart title" }
            }
        });
        let clean = sanitize_schema(&schema);
        assert_eq!(clean.get("title"), None);
        // A property named "title" and its own nested "title" keyword stay.
        assert!(clean.pointer("/properties/title").is_some());
        assert_eq!(
            clean.pointer("/properties/title/title"),
            Some(&json!("Chart title"))
        );
    }

    #[test]
    fn test_declarations_cover_whole_catalogue() {
        let declarations = build_declarations();
        assert_eq!(declarations.len(), ToolId::ALL.len());
        for tool in &declarations {
            assert!(!tool.name.is_empty());
            assert!(!tool.description.is_empty());
            assert_eq!(tool.input_schema["type"], json!("object"));
            assert_eq!(tool.input_schema.get("additionalProperties"), None);
            assert_eq!(tool.input_schema.get("title"), None);
        }
        // Names are unique.
        let mut names: Vec<_> = declarations.iter().map(|t| &t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), declarations.len());
    }
}
