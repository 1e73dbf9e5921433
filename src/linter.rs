//! Schema linting - static analysis of part schema files.
//!
//! Validates schema files for:
//! - JSON syntax errors
//! - Structural errors (wrongly typed keywords, unknown type or format names)
//! - Broken `$ref` references and invalid regex patterns
//! - Settings the schema builder accepts but the codec never consults

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::convert::TargetType;
use crate::error::SchemaError;
use crate::loader::{load_schema, navigate_fragment, schema_from_fragment};
use crate::parser::PartParser;
use crate::types::{json_type_name, DataType, Format, SCHEMA_KEYS};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// What a diagnostic reports. Errors are `E` codes, warnings `W` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LintCode {
    /// E001: the file is not readable JSON.
    Syntax,
    /// E002: the document does not match the part meta-schema.
    Structure,
    /// E003: a `$ref` is external, dangling or circular.
    Reference,
    /// E004: a `pattern` does not compile.
    Pattern,
    /// W001
    IgnoredCollectionFormat,
    /// W002
    IgnoredItems,
    /// W003
    IgnoredProperties,
    /// W004
    FormatMismatch,
    /// W005
    InvertedBounds,
    /// W006
    InvalidDefault,
}

impl LintCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LintCode::Syntax => "E001",
            LintCode::Structure => "E002",
            LintCode::Reference => "E003",
            LintCode::Pattern => "E004",
            LintCode::IgnoredCollectionFormat => "W001",
            LintCode::IgnoredItems => "W002",
            LintCode::IgnoredProperties => "W003",
            LintCode::FormatMismatch => "W004",
            LintCode::InvertedBounds => "W005",
            LintCode::InvalidDefault => "W006",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            LintCode::Syntax | LintCode::Structure | LintCode::Reference | LintCode::Pattern => {
                Severity::Error
            }
            _ => Severity::Warning,
        }
    }
}

impl std::fmt::Display for LintCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LintCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One finding in a schema file.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: LintCode,
    pub file: PathBuf,
    /// JSON Pointer to the offending keyword, e.g. "/definitions/Tags/items".
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: LintCode, file: &Path, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            file: file.to_path_buf(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            message: message.into(),
        }
    }
}

/// Worst severity found in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

impl FileStatus {
    fn of(diagnostics: &[Diagnostic]) -> Self {
        if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            FileStatus::Error
        } else if diagnostics.is_empty() {
            FileStatus::Ok
        } else {
            FileStatus::Warning
        }
    }

    fn fails(&self, strict: bool) -> bool {
        match self {
            FileStatus::Ok => false,
            FileStatus::Error => true,
            FileStatus::Warning => strict,
        }
    }
}

/// Diagnostics for one schema file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    /// Path relative to the linted root.
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl FileResult {
    fn new(file: PathBuf, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            file,
            status: FileStatus::of(&diagnostics),
            diagnostics,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Report over every schema file under a path.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// True when no file produced an error, whatever the strictness.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.results.iter().flat_map(|r| r.diagnostics.iter())
    }
}

/// Lint a schema file, or every `.json` file below a directory.
///
/// With `strict`, files with only warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let results: Vec<FileResult> = collect_schema_files(path)
        .iter()
        .map(|file| lint_file(file, path))
        .collect();

    let failed = results.iter().filter(|r| r.status.fails(strict)).count();
    LintResult {
        path: path.to_path_buf(),
        files_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors: results.iter().map(|r| r.count(Severity::Error)).sum(),
        warnings: results.iter().map(|r| r.count(Severity::Warning)).sum(),
        results,
    }
}

/// Lint a single schema file.
///
/// A file holds either one schema object or a document with `definitions`
/// and/or `parameters` sections.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    tracing::debug!(file = %file.display(), "linting schema file");
    let relative = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();

    let doc = match load_schema(file) {
        Ok(doc) => doc,
        Err(e) => {
            let syntax = Diagnostic::new(LintCode::Syntax, file, "", format!("syntax error: {e}"));
            return FileResult::new(relative, vec![syntax]);
        }
    };

    let mut checker = FileLint {
        file,
        root: &doc,
        diagnostics: Vec::new(),
    };
    checker.check_structure();
    checker.check_refs_and_patterns(&doc, "");
    for (path, node) in entry_points(&doc) {
        checker.check_cycles(&path);
        checker.check_node(node, &path);
    }

    FileResult::new(relative, checker.diagnostics)
}

/// Meta-schema for part schema documents.
fn meta_schema() -> Value {
    let count = json!({"type": "integer", "minimum": 0});
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$ref": "#/definitions/node",
        "definitions": {
            "node": {
                "type": "object",
                "properties": {
                    "type": {"enum": ["string", "array", "object", "boolean", "integer", "number", "file"]},
                    "format": {"enum": [
                        "byte", "binary", "binary-spaced", "date", "date-time",
                        "uon", "int32", "int64", "float", "double"
                    ]},
                    "collectionFormat": {"enum": ["csv", "pipes", "ssv", "tsv", "uon", "multi"]},
                    "pattern": {"type": "string"},
                    "enum": {"type": "array"},
                    "minLength": count,
                    "maxLength": count,
                    "required": {
                        "oneOf": [
                            {"type": "boolean"},
                            {"type": "array", "items": {"type": "string"}}
                        ]
                    },
                    "allowEmptyValue": {"type": "boolean"},
                    "items": {"$ref": "#/definitions/node"},
                    "properties": {
                        "type": "object",
                        "additionalProperties": {"$ref": "#/definitions/node"}
                    },
                    "additionalProperties": {
                        "oneOf": [{"type": "boolean"}, {"$ref": "#/definitions/node"}]
                    },
                    "maximum": {"type": "number"},
                    "minimum": {"type": "number"},
                    "exclusiveMaximum": {"type": ["boolean", "number"]},
                    "exclusiveMinimum": {"type": ["boolean", "number"]},
                    "multipleOf": {"type": "number", "exclusiveMinimum": 0},
                    "maxItems": count,
                    "minItems": count,
                    "uniqueItems": {"type": "boolean"},
                    "maxProperties": count,
                    "minProperties": count,
                    "$ref": {"type": "string"},
                    "schema": {"$ref": "#/definitions/node"},
                    "definitions": {
                        "type": "object",
                        "additionalProperties": {"$ref": "#/definitions/node"}
                    },
                    "parameters": {
                        "type": ["object", "array"],
                        "additionalProperties": {"$ref": "#/definitions/node"},
                        "items": {"$ref": "#/definitions/node"}
                    }
                }
            }
        }
    })
}

static META_VALIDATOR: OnceLock<Option<jsonschema::Validator>> = OnceLock::new();

fn meta_validator() -> Option<&'static jsonschema::Validator> {
    META_VALIDATOR
        .get_or_init(|| match jsonschema::validator_for(&meta_schema()) {
            Ok(validator) => Some(validator),
            Err(e) => {
                tracing::warn!(error = %e, "part meta-schema failed to compile");
                None
            }
        })
        .as_ref()
}

/// Schema nodes a document exposes: the root itself when it carries schema
/// keywords, plus every entry of `definitions` and `parameters`.
fn entry_points(doc: &Value) -> Vec<(String, &Value)> {
    let mut entries = Vec::new();
    let Some(obj) = doc.as_object() else {
        return entries;
    };
    if obj.contains_key("$ref") || SCHEMA_KEYS.iter().any(|k| obj.contains_key(*k)) {
        entries.push((String::new(), doc));
    }
    for section in ["definitions", "parameters"] {
        match obj.get(section) {
            Some(Value::Object(map)) => {
                for (name, node) in map {
                    entries.push((format!("/{section}/{}", escape(name)), node));
                }
            }
            Some(Value::Array(list)) => {
                for (i, node) in list.iter().enumerate() {
                    entries.push((format!("/{section}/{i}"), node));
                }
            }
            _ => {}
        }
    }
    entries
}

/// Escape a key for use in a JSON Pointer.
fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

struct FileLint<'a> {
    file: &'a Path,
    root: &'a Value,
    diagnostics: Vec<Diagnostic>,
}

impl FileLint<'_> {
    fn push(&mut self, code: LintCode, path: &str, message: String) {
        self.diagnostics
            .push(Diagnostic::new(code, self.file, path, message));
    }

    /// E002: document shape against the part meta-schema.
    fn check_structure(&mut self) {
        let Some(validator) = meta_validator() else {
            return;
        };
        let errors: Vec<(String, String)> = validator
            .iter_errors(self.root)
            .map(|e| (e.instance_path.to_string(), e.to_string()))
            .collect();
        for (path, message) in errors {
            self.push(LintCode::Structure, &path, message);
        }
    }

    /// E003 for `$ref`s that don't resolve, E004 for uncompilable patterns.
    fn check_refs_and_patterns(&mut self, value: &Value, path: &str) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    self.check_ref(reference, path);
                }
                if let Some(Value::String(pattern)) = map.get("pattern") {
                    if let Err(e) = regex::Regex::new(pattern) {
                        self.push(
                            LintCode::Pattern,
                            &format!("{path}/pattern"),
                            format!("invalid pattern \"{pattern}\": {e}"),
                        );
                    }
                }
                for (key, child) in map {
                    // Literal values, not schemas.
                    if key == "enum" || key == "default" {
                        continue;
                    }
                    self.check_refs_and_patterns(child, &format!("{path}/{}", escape(key)));
                }
            }
            Value::Array(list) => {
                for (i, item) in list.iter().enumerate() {
                    self.check_refs_and_patterns(item, &format!("{path}/{i}"));
                }
            }
            _ => {}
        }
    }

    fn check_ref(&mut self, reference: &str, path: &str) {
        if !reference.starts_with('#') {
            self.push(
                LintCode::Reference,
                path,
                format!("external reference not supported: {reference}"),
            );
        } else if navigate_fragment(self.root, reference).is_err() {
            self.push(
                LintCode::Reference,
                path,
                format!("reference not found: {reference}"),
            );
        }
    }

    /// E003 for reference cycles reachable from an entry point.
    fn check_cycles(&mut self, path: &str) {
        if let Err(SchemaError::CircularRef { reference }) =
            schema_from_fragment(self.root, &format!("#{path}"))
        {
            self.push(
                LintCode::Reference,
                path,
                format!("circular reference: {reference}"),
            );
        }
    }

    /// W001-W006 on one schema node, then its children.
    fn check_node(&mut self, node: &Value, path: &str) {
        let Some(obj) = node.as_object() else {
            return;
        };
        let data_type = obj
            .get("type")
            .and_then(Value::as_str)
            .and_then(DataType::parse)
            .unwrap_or_default();

        if data_type != DataType::None {
            self.check_applicability(obj, data_type, path);
        }
        self.check_bounds(obj, path);
        if obj.contains_key("default") {
            self.check_default(obj, path);
        }

        if let Some(items) = obj.get("items") {
            self.check_node(items, &format!("{path}/items"));
        }
        if let Some(Value::Object(props)) = obj.get("properties") {
            for (name, prop) in props {
                self.check_node(prop, &format!("{path}/properties/{}", escape(name)));
            }
        }
        if let Some(extra) = obj.get("additionalProperties").filter(|v| v.is_object()) {
            self.check_node(extra, &format!("{path}/additionalProperties"));
        }
        if let Some(schema) = obj.get("schema") {
            self.check_node(schema, &format!("{path}/schema"));
        }
    }

    fn check_applicability(&mut self, obj: &Map<String, Value>, data_type: DataType, path: &str) {
        let name = data_type.as_str();
        if obj.contains_key("collectionFormat")
            && !matches!(data_type, DataType::Array | DataType::Object)
        {
            self.push(
                LintCode::IgnoredCollectionFormat,
                &format!("{path}/collectionFormat"),
                format!("collectionFormat is ignored for type \"{name}\""),
            );
        }
        if obj.contains_key("items") && data_type != DataType::Array {
            self.push(
                LintCode::IgnoredItems,
                &format!("{path}/items"),
                format!("items is ignored for type \"{name}\""),
            );
        }
        if data_type != DataType::Object {
            for key in ["properties", "additionalProperties"] {
                if obj.contains_key(key) {
                    self.push(
                        LintCode::IgnoredProperties,
                        &format!("{path}/{key}"),
                        format!("{key} is ignored for type \"{name}\""),
                    );
                }
            }
        }
        if let Some(format) = obj.get("format").and_then(Value::as_str).and_then(Format::parse) {
            if !format.applies_to(data_type) {
                self.push(
                    LintCode::FormatMismatch,
                    &format!("{path}/format"),
                    format!("format \"{format}\" does not apply to type \"{name}\""),
                );
            }
        }
    }

    fn check_bounds(&mut self, obj: &Map<String, Value>, path: &str) {
        for (min_key, max_key) in [
            ("minLength", "maxLength"),
            ("minimum", "maximum"),
            ("minItems", "maxItems"),
            ("minProperties", "maxProperties"),
        ] {
            let min = obj.get(min_key).and_then(Value::as_f64);
            let max = obj.get(max_key).and_then(Value::as_f64);
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    self.push(
                        LintCode::InvertedBounds,
                        &format!("{path}/{min_key}"),
                        format!("{min_key} ({min}) is greater than {max_key} ({max})"),
                    );
                }
            }
        }
    }

    /// W006: the default must pass the node's own parsing and validation.
    fn check_default(&mut self, obj: &Map<String, Value>, path: &str) {
        // Structural problems are reported elsewhere.
        let Ok(node) = schema_from_fragment(self.root, &format!("#{path}")).and_then(|b| b.build())
        else {
            return;
        };
        if let Err(e) = PartParser::new().parse(&node, None, &TargetType::Any) {
            let default = obj.get("default").map(json_literal).unwrap_or_default();
            self.push(
                LintCode::InvalidDefault,
                &format!("{path}/default"),
                format!("default value {default} is not valid: {e}"),
            );
        }
    }
}

fn json_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => format!("{other} ({})", json_type_name(other)),
    }
}

/// Every `.json` file at `path`, sorted. A directory is walked recursively;
/// unreadable directories are skipped.
pub fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(next) = pending.pop() {
        if next.is_dir() {
            if let Ok(entries) = std::fs::read_dir(&next) {
                pending.extend(entries.flatten().map(|entry| entry.path()));
            }
        } else if is_json(&next) {
            files.push(next);
        }
    }
    files.sort();
    files
}

fn is_json(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == "json")
}
