//! OpenAPI Part Codec
//!
//! Schema-directed serialization and parsing of HTTP parts (headers, query
//! parameters, path segments, form fields) as described by OpenAPI 2.0
//! parameter schemas.
//!
//! A [`SchemaNode`] describes the expected shape of a value. The
//! [`PartSerializer`] turns a [`PartValue`] into the single-string wire form
//! and validates it; the [`PartParser`] reverses the process. Coercions
//! between value shapes go through a [`ConversionRegistry`].
//!
//! # Example
//!
//! ```
//! use openapi_part::{
//!     schema_of, CollectionFormat, DataType, PartParser, PartSerializer, PartValue, TargetType,
//! };
//!
//! let ps = schema_of(DataType::Array)
//!     .collection_format(CollectionFormat::Pipes)
//!     .items(schema_of(DataType::Integer).maximum(100.0))
//!     .build()
//!     .unwrap();
//!
//! let wire = PartSerializer::new()
//!     .serialize(&ps, &PartValue::list([1, 2, 3]))
//!     .unwrap();
//! assert_eq!(wire, "1|2|3");
//!
//! let parsed = PartParser::new()
//!     .parse(&ps, Some("4|5"), &TargetType::list(TargetType::Long))
//!     .unwrap();
//! assert_eq!(parsed, PartValue::list([4i64, 5]));
//! ```
//!
//! # Collection Formats
//!
//! | Format | Array | Object |
//! |--------|-------|--------|
//! | `csv`, `multi`, none | `a,b` (`\,` escapes) | `k=v,k2=v2` (none: UON) |
//! | `pipes` | `a\|b` (`\|` escapes) | `k=v\|k2=v2` |
//! | `ssv` | `a b` | `k=v k2=v2` |
//! | `tsv` | tab separated | tab separated |
//! | `uon` | `@(a,b)` | `(k=v,k2=v2)` |
//!
//! # Schemas from JSON
//!
//! ```
//! use openapi_part::{build_schema, PartSerializer, PartValue};
//! use serde_json::json;
//!
//! let ps = build_schema(&json!({"type": "string", "pattern": "x.*"})).unwrap();
//! let err = PartSerializer::new()
//!     .serialize(&ps, &PartValue::from("y"))
//!     .unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "Value does not match expected pattern.  Must match pattern: x.*"
//! );
//! ```

mod config;
mod convert;
mod error;
mod linter;
mod loader;
mod parser;
mod schema;
mod serializer;
mod types;
pub mod uon;
mod value;

pub use config::PartConfig;
pub use convert::{
    Accessor, Constructor, ConversionRegistry, ConversionRegistryBuilder, ConversionStrategy,
    PartConvertible, TargetType,
};
pub use error::{ConversionError, ParseError, PartError, SchemaError, SchemaValidationError};
pub use linter::{
    collect_schema_files, lint, lint_file, Diagnostic, FileResult, FileStatus, LintCode,
    LintResult, Severity,
};
pub use loader::{
    build_schema, load_schema, load_schema_str, navigate_fragment, schema_from_fragment,
    schema_from_json,
};
pub use parser::PartParser;
pub use schema::{schema, schema_of, schema_with_format, SchemaBuilder, SchemaNode};
pub use serializer::PartSerializer;
pub use types::{CollectionFormat, DataType, Format};
pub use value::{FromPartValue, PartValue, ValueKind};
