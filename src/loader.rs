//! Schema loading from JSON documents.
//!
//! Reads Swagger 2.0 style parameter and schema objects into
//! [`SchemaBuilder`]s. Internal `$ref` pointers (`#/definitions/...`) are
//! followed against the document root.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::schema::{SchemaBuilder, SchemaNode};
use crate::types::{json_type_name, CollectionFormat, DataType, Format};

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `SchemaError::FileNotFound` if the file doesn't exist,
/// or `SchemaError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, SchemaError> {
    if !path.exists() {
        return Err(SchemaError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_schema_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `SchemaError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, SchemaError> {
    serde_json::from_str(content).map_err(|source| SchemaError::InvalidJson { source })
}

/// Navigate a JSON Pointer fragment (e.g. "#/definitions/Tags").
///
/// Returns the value at the given path within `root`.
pub fn navigate_fragment<'a>(root: &'a Value, fragment: &str) -> Result<&'a Value, SchemaError> {
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(root);
    }

    let mut current = root;
    for part in path.split('/') {
        // ~1 = /, ~0 = ~
        let key = part.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => other.get(&key),
        };
        current = next.ok_or_else(|| SchemaError::UnresolvedRef {
            reference: fragment.to_string(),
        })?;
    }
    Ok(current)
}

/// Read a schema object into a builder, using the object itself as the root
/// for `$ref` resolution.
///
/// # Errors
///
/// Returns `SchemaError` for unknown type/format names, wrongly typed
/// keywords, and broken or circular references.
pub fn schema_from_json(value: &Value) -> Result<SchemaBuilder, SchemaError> {
    Reader::new(value).read(value, "#")
}

/// Read the schema found at `fragment` inside `root`.
pub fn schema_from_fragment(root: &Value, fragment: &str) -> Result<SchemaBuilder, SchemaError> {
    let node = navigate_fragment(root, fragment)?;
    Reader::new(root).read(node, fragment)
}

/// Read and build a schema object in one step.
pub fn build_schema(value: &Value) -> Result<SchemaNode, SchemaError> {
    schema_from_json(value)?.build()
}

struct Reader<'a> {
    root: &'a Value,
    stack: Vec<String>,
}

impl<'a> Reader<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            stack: Vec::new(),
        }
    }

    fn read(&mut self, node: &Value, path: &str) -> Result<SchemaBuilder, SchemaError> {
        let obj = node.as_object().ok_or_else(|| SchemaError::InvalidSchema {
            path: path.to_string(),
            message: format!("expected object, found {}", json_type_name(node)),
        })?;

        let builder = match obj.get("$ref") {
            Some(reference) => self.follow(reference, path)?,
            None => SchemaBuilder::default(),
        };
        self.apply(builder, obj, path)
    }

    fn follow(&mut self, reference: &Value, path: &str) -> Result<SchemaBuilder, SchemaError> {
        let reference = reference.as_str().ok_or_else(|| SchemaError::InvalidSchema {
            path: format!("{path}/$ref"),
            message: "expected string".to_string(),
        })?;
        if !reference.starts_with('#') {
            return Err(SchemaError::UnresolvedRef {
                reference: reference.to_string(),
            });
        }
        if self.stack.iter().any(|r| r == reference) {
            return Err(SchemaError::CircularRef {
                reference: reference.to_string(),
            });
        }

        tracing::debug!(reference, from = path, "following schema reference");
        let root = self.root;
        let target = navigate_fragment(root, reference)?;
        self.stack.push(reference.to_string());
        let result = self.read(target, reference);
        self.stack.pop();
        result
    }

    fn apply(
        &mut self,
        mut b: SchemaBuilder,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Result<SchemaBuilder, SchemaError> {
        if let Some(name) = str_field(obj, "type", path)? {
            b = b.data_type(name.parse::<DataType>()?);
        }
        if let Some(name) = str_field(obj, "format", path)? {
            b = b.format(name.parse::<Format>()?);
        }
        if let Some(name) = str_field(obj, "collectionFormat", path)? {
            b = b.collection_format(name.parse::<CollectionFormat>()?);
        }
        if let Some(pattern) = str_field(obj, "pattern", path)? {
            b = b.pattern(pattern);
        }
        if let Some(values) = obj.get("enum") {
            let values = values.as_array().ok_or_else(|| wrong_type(path, "enum", "array"))?;
            b = b.enum_values(values.iter().map(literal));
        }
        if let Some(n) = u64_field(obj, "minLength", path)? {
            b = b.min_length(n);
        }
        if let Some(n) = u64_field(obj, "maxLength", path)? {
            b = b.max_length(n);
        }
        if let Some(flag) = obj.get("required").and_then(Value::as_bool) {
            b = b.required(flag);
        }
        if let Some(flag) = bool_field(obj, "allowEmptyValue", path)? {
            b = b.allow_empty_value(flag);
        }
        if let Some(default) = obj.get("default") {
            b = b.default_value(literal(default));
        }

        if let Some(items) = obj.get("items") {
            b = b.items(self.read(items, &format!("{path}/items"))?);
        }
        if let Some(props) = obj.get("properties") {
            let props = props
                .as_object()
                .ok_or_else(|| wrong_type(path, "properties", "object"))?;
            let required = required_names(obj, path)?;
            for (name, prop) in props {
                let mut child = self.read(prop, &format!("{path}/properties/{name}"))?;
                if required.contains(&name.as_str()) {
                    child = child.required(true);
                }
                b = b.property(name.clone(), child);
            }
        }
        // A boolean `additionalProperties` leaves the untyped fallback in place.
        if let Some(extra) = obj.get("additionalProperties").filter(|v| v.is_object()) {
            b = b.additional_properties(self.read(extra, &format!("{path}/additionalProperties"))?);
        }

        if let Some(n) = f64_field(obj, "maximum", path)? {
            b = b.maximum(n);
        }
        if let Some(n) = f64_field(obj, "minimum", path)? {
            b = b.minimum(n);
        }
        b = match obj.get("exclusiveMaximum") {
            Some(Value::Bool(flag)) => b.exclusive_maximum(*flag),
            Some(Value::Number(n)) => b
                .maximum(n.as_f64().unwrap_or_default())
                .exclusive_maximum(true),
            Some(_) => return Err(wrong_type(path, "exclusiveMaximum", "boolean")),
            None => b,
        };
        b = match obj.get("exclusiveMinimum") {
            Some(Value::Bool(flag)) => b.exclusive_minimum(*flag),
            Some(Value::Number(n)) => b
                .minimum(n.as_f64().unwrap_or_default())
                .exclusive_minimum(true),
            Some(_) => return Err(wrong_type(path, "exclusiveMinimum", "boolean")),
            None => b,
        };
        if let Some(n) = f64_field(obj, "multipleOf", path)? {
            b = b.multiple_of(n);
        }
        if let Some(n) = u64_field(obj, "maxItems", path)? {
            b = b.max_items(n);
        }
        if let Some(n) = u64_field(obj, "minItems", path)? {
            b = b.min_items(n);
        }
        if let Some(flag) = bool_field(obj, "uniqueItems", path)? {
            b = b.unique_items(flag);
        }
        if let Some(n) = u64_field(obj, "maxProperties", path)? {
            b = b.max_properties(n);
        }
        if let Some(n) = u64_field(obj, "minProperties", path)? {
            b = b.min_properties(n);
        }
        Ok(b)
    }
}

/// String form of a JSON literal: strings verbatim, everything else as JSON.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Property names listed in an object schema's `required` array.
fn required_names<'v>(obj: &'v Map<String, Value>, path: &str) -> Result<Vec<&'v str>, SchemaError> {
    match obj.get("required") {
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| n.as_str().ok_or_else(|| wrong_type(path, "required", "array of strings")))
            .collect(),
        Some(Value::Bool(_)) | None => Ok(Vec::new()),
        Some(_) => Err(wrong_type(path, "required", "boolean or array")),
    }
}

fn wrong_type(path: &str, key: &str, expected: &str) -> SchemaError {
    SchemaError::InvalidSchema {
        path: format!("{path}/{key}"),
        message: format!("expected {expected}"),
    }
}

fn str_field<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'v str>, SchemaError> {
    obj.get(key)
        .map(|v| v.as_str().ok_or_else(|| wrong_type(path, key, "string")))
        .transpose()
}

fn u64_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<u64>, SchemaError> {
    obj.get(key)
        .map(|v| {
            v.as_u64()
                .ok_or_else(|| wrong_type(path, key, "non-negative integer"))
        })
        .transpose()
}

fn f64_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>, SchemaError> {
    obj.get(key)
        .map(|v| v.as_f64().ok_or_else(|| wrong_type(path, key, "number")))
        .transpose()
}

fn bool_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<bool>, SchemaError> {
    obj.get(key)
        .map(|v| v.as_bool().ok_or_else(|| wrong_type(path, key, "boolean")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_schema_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "array"}}"#).unwrap();

        let doc = load_schema(file.path()).unwrap();
        assert_eq!(doc["type"], "array");
    }

    #[test]
    fn load_schema_file_not_found() {
        let result = load_schema(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(SchemaError::FileNotFound { .. })));
    }

    #[test]
    fn load_schema_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_schema(file.path());
        assert!(matches!(result, Err(SchemaError::InvalidJson { .. })));
    }

    #[test]
    fn load_schema_str_invalid() {
        let result = load_schema_str("not json");
        assert!(matches!(result, Err(SchemaError::InvalidJson { .. })));
    }

    #[test]
    fn navigate_fragment_paths() {
        let doc = json!({"definitions": {"a/b": {"type": "string"}, "list": [1, {"x": 2}]}});
        assert_eq!(
            navigate_fragment(&doc, "#/definitions/a~1b").unwrap()["type"],
            "string"
        );
        assert_eq!(navigate_fragment(&doc, "#/definitions/list/1/x").unwrap(), 2);
        assert_eq!(navigate_fragment(&doc, "#").unwrap(), &doc);
        assert!(matches!(
            navigate_fragment(&doc, "#/definitions/missing"),
            Err(SchemaError::UnresolvedRef { .. })
        ));
    }

    #[test]
    fn reads_parameter_attributes() {
        let node = build_schema(&json!({
            "type": "array",
            "collectionFormat": "pipes",
            "required": true,
            "minItems": 1,
            "uniqueItems": true,
            "items": {"type": "integer", "format": "int64", "maximum": 10}
        }))
        .unwrap();

        assert_eq!(node.data_type(), DataType::Array);
        assert_eq!(node.collection_format(), CollectionFormat::Pipes);
        assert!(node.is_required());
        assert_eq!(node.min_items(), Some(1));
        assert!(node.unique_items());
        let items = node.items().unwrap();
        assert_eq!(items.format(), Format::Int64);
        assert_eq!(items.maximum(), Some(10.0));
    }

    #[test]
    fn enum_and_default_use_string_forms() {
        let node = build_schema(&json!({
            "type": "integer",
            "enum": [1, 2, "three"],
            "default": 2
        }))
        .unwrap();
        assert_eq!(node.enum_values(), ["1", "2", "three"]);
        assert_eq!(node.default_value(), Some("2"));
    }

    #[test]
    fn required_array_marks_properties() {
        let node = build_schema(&json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string"}
            },
            "additionalProperties": {"type": "boolean"}
        }))
        .unwrap();
        assert!(!node.is_required());
        assert!(node.property("id").unwrap().is_required());
        assert!(!node.property("name").unwrap().is_required());
        assert_eq!(
            node.additional_properties().unwrap().data_type(),
            DataType::Boolean
        );
    }

    #[test]
    fn follows_internal_refs() {
        let doc = json!({
            "definitions": {
                "Tag": {"type": "string", "pattern": "[a-z]+"}
            },
            "parameters": {
                "tags": {
                    "type": "array",
                    "items": {"$ref": "#/definitions/Tag"}
                }
            }
        });
        let node = schema_from_fragment(&doc, "#/parameters/tags")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(node.items().unwrap().pattern(), Some("[a-z]+"));
    }

    #[test]
    fn ref_siblings_override_target() {
        let doc = json!({
            "definitions": {"Tag": {"type": "string", "maxLength": 3}},
            "$ref": "#/definitions/Tag",
            "maxLength": 5
        });
        let node = build_schema(&doc).unwrap();
        assert_eq!(node.data_type(), DataType::String);
        assert_eq!(node.max_length(), Some(5));
    }

    #[test]
    fn circular_refs_are_rejected() {
        let doc = json!({
            "definitions": {
                "Node": {"type": "array", "items": {"$ref": "#/definitions/Node"}}
            },
            "$ref": "#/definitions/Node"
        });
        let result = schema_from_json(&doc);
        assert!(matches!(result, Err(SchemaError::CircularRef { .. })));
    }

    #[test]
    fn external_refs_are_unresolved() {
        let result = schema_from_json(&json!({"$ref": "other.json#/Tag"}));
        assert!(matches!(result, Err(SchemaError::UnresolvedRef { .. })));
    }

    #[test]
    fn unknown_names_are_errors() {
        let result = schema_from_json(&json!({"type": "bogus"}));
        assert!(matches!(
            result,
            Err(SchemaError::UnknownName { kind: "type", .. })
        ));
        let result = schema_from_json(&json!({"type": "string", "format": "password"}));
        assert!(matches!(result, Err(SchemaError::UnknownName { .. })));
    }

    #[test]
    fn wrongly_typed_keywords_report_path() {
        let result = schema_from_json(&json!({"items": {"minLength": "3"}}));
        match result {
            Err(SchemaError::InvalidSchema { path, .. }) => assert_eq!(path, "#/items/minLength"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn exclusive_bounds_accept_both_styles() {
        let node = build_schema(&json!({"type": "number", "maximum": 5, "exclusiveMaximum": true}))
            .unwrap();
        assert_eq!(node.maximum(), Some(5.0));
        assert!(node.exclusive_maximum());

        let node = build_schema(&json!({"type": "number", "exclusiveMinimum": 1})).unwrap();
        assert_eq!(node.minimum(), Some(1.0));
        assert!(node.exclusive_minimum());
    }
}
