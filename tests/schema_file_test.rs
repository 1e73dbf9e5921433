//! Integration tests for schema documents: loading and linting.

use std::fs;

use openapi_part::{
    lint, lint_file, load_schema, schema_from_fragment, FileStatus, PartParser, PartSerializer,
    PartValue, SchemaError, Severity, TargetType,
};
use tempfile::tempdir;

const PETSTORE: &str = r##"{
    "definitions": {
        "Tag": {"type": "string", "pattern": "[a-z]+", "maxLength": 10}
    },
    "parameters": {
        "tags": {
            "type": "array",
            "collectionFormat": "pipes",
            "required": true,
            "items": {"$ref": "#/definitions/Tag"}
        },
        "limit": {
            "type": "integer",
            "format": "int32",
            "minimum": 1,
            "maximum": 100,
            "default": 20
        }
    }
}"##;

// === Loading ===

mod loading {
    use super::*;

    #[test]
    fn parameters_drive_the_codec() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("petstore.json");
        fs::write(&path, PETSTORE).unwrap();

        let doc = load_schema(&path).unwrap();
        let tags = schema_from_fragment(&doc, "#/parameters/tags")
            .unwrap()
            .build()
            .unwrap();
        let limit = schema_from_fragment(&doc, "#/parameters/limit")
            .unwrap()
            .build()
            .unwrap();

        let wire = PartSerializer::new()
            .serialize(&tags, &PartValue::list(["dog", "cat"]))
            .unwrap();
        assert_eq!(wire, "dog|cat");
        assert!(PartSerializer::new()
            .serialize(&tags, &PartValue::list(["Dog"]))
            .is_err());

        let parser = PartParser::new();
        let n: i32 = parser.parse_as(&limit, None).unwrap();
        assert_eq!(n, 20);
        assert!(parser.parse(&limit, Some("500"), &TargetType::Any).is_err());

        let err = parser.parse(&tags, None, &TargetType::Any).unwrap_err();
        assert_eq!(err.to_string(), "No value specified.");
    }

    #[test]
    fn missing_fragment() {
        let doc = serde_json::from_str(PETSTORE).unwrap();
        let result = schema_from_fragment(&doc, "#/parameters/offset");
        assert!(matches!(result, Err(SchemaError::UnresolvedRef { .. })));
    }
}

// === Linting ===

mod linting {
    use super::*;

    #[test]
    fn clean_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("petstore.json");
        fs::write(&path, PETSTORE).unwrap();

        let result = lint_file(&path, dir.path());
        assert_eq!(result.status, FileStatus::Ok, "{:?}", result.diagnostics);
        assert_eq!(result.file, std::path::Path::new("petstore.json"));
    }

    #[test]
    fn mixed_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("petstore.json"), PETSTORE).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested/bad.json"),
            r##"{
                "parameters": {
                    "id": {"type": "string", "items": {"$ref": "#/nope"}},
                    "name": {"type": "string", "default": ""}
                }
            }"##,
        )
        .unwrap();

        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.failed, 1);
        assert!(!result.is_ok());

        let bad = result
            .results
            .iter()
            .find(|r| r.status == FileStatus::Error)
            .unwrap();
        let codes: Vec<_> = bad.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert!(codes.contains(&"E003"));
        assert!(codes.contains(&"W002"));
        assert!(codes.contains(&"W006"));
        assert!(bad
            .diagnostics
            .iter()
            .filter(|d| d.code.as_str().starts_with('W'))
            .all(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn report_serializes_to_json() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("warn.json"),
            r#"{"type": "string", "minLength": 3, "maxLength": 1}"#,
        )
        .unwrap();

        let result = lint(dir.path(), true);
        let report = serde_json::to_value(&result).unwrap();
        assert_eq!(report["failed"], 1);
        assert_eq!(report["results"][0]["status"], "warning");
        assert_eq!(report["results"][0]["diagnostics"][0]["code"], "W005");
        assert_eq!(report["results"][0]["diagnostics"][0]["severity"], "warning");
    }
}
