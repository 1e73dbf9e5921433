//! Core vocabulary types for OpenAPI part schemas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;

/// Schema keys understood by the loader and linter.
pub const SCHEMA_KEYS: &[&str] = &[
    "type",
    "format",
    "collectionFormat",
    "pattern",
    "enum",
    "minLength",
    "maxLength",
    "required",
    "allowEmptyValue",
    "default",
    "items",
    "properties",
    "additionalProperties",
    "maximum",
    "minimum",
    "exclusiveMaximum",
    "exclusiveMinimum",
    "multipleOf",
    "maxItems",
    "minItems",
    "uniqueItems",
    "maxProperties",
    "minProperties",
];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The `type` of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Array,
    Object,
    Boolean,
    Integer,
    Number,
    File,
    /// No type declared; the codec infers one from the value.
    #[default]
    None,
}

impl DataType {
    /// Parse a type from its OpenAPI name.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Some(DataType::String),
            "array" => Some(DataType::Array),
            "object" => Some(DataType::Object),
            "boolean" => Some(DataType::Boolean),
            "integer" => Some(DataType::Integer),
            "number" => Some(DataType::Number),
            "file" => Some(DataType::File),
            "" | "none" => Some(DataType::None),
            _ => None,
        }
    }

    /// Returns the OpenAPI name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Array => "array",
            DataType::Object => "object",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::File => "file",
            DataType::None => "none",
        }
    }

    /// True for types whose serialized form is a single token.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataType::Array | DataType::Object)
    }
}

/// The `format` of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Byte,
    Binary,
    BinarySpaced,
    Date,
    DateTime,
    Uon,
    Int32,
    Int64,
    Float,
    Double,
    #[default]
    None,
}

impl Format {
    /// Parse a format from its OpenAPI name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "byte" => Some(Format::Byte),
            "binary" => Some(Format::Binary),
            "binary-spaced" => Some(Format::BinarySpaced),
            "date" => Some(Format::Date),
            "date-time" => Some(Format::DateTime),
            "uon" => Some(Format::Uon),
            "int32" => Some(Format::Int32),
            "int64" => Some(Format::Int64),
            "float" => Some(Format::Float),
            "double" => Some(Format::Double),
            "" | "none" => Some(Format::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Byte => "byte",
            Format::Binary => "binary",
            Format::BinarySpaced => "binary-spaced",
            Format::Date => "date",
            Format::DateTime => "date-time",
            Format::Uon => "uon",
            Format::Int32 => "int32",
            Format::Int64 => "int64",
            Format::Float => "float",
            Format::Double => "double",
            Format::None => "none",
        }
    }

    /// Returns true if this format has a meaning for the given type.
    ///
    /// `None` applies everywhere and `uon` applies to any type.
    pub fn applies_to(&self, data_type: DataType) -> bool {
        match self {
            Format::None | Format::Uon => true,
            Format::Byte
            | Format::Binary
            | Format::BinarySpaced
            | Format::Date
            | Format::DateTime => matches!(data_type, DataType::String | DataType::None),
            Format::Int32 | Format::Int64 => {
                matches!(data_type, DataType::Integer | DataType::None)
            }
            Format::Float | Format::Double => {
                matches!(data_type, DataType::Number | DataType::None)
            }
        }
    }
}

/// The `collectionFormat` of an array (or object) schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionFormat {
    Csv,
    Pipes,
    Ssv,
    Tsv,
    Uon,
    Multi,
    #[default]
    None,
}

impl CollectionFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(CollectionFormat::Csv),
            "pipes" => Some(CollectionFormat::Pipes),
            "ssv" => Some(CollectionFormat::Ssv),
            "tsv" => Some(CollectionFormat::Tsv),
            "uon" => Some(CollectionFormat::Uon),
            "multi" => Some(CollectionFormat::Multi),
            "" | "none" => Some(CollectionFormat::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionFormat::Csv => "csv",
            CollectionFormat::Pipes => "pipes",
            CollectionFormat::Ssv => "ssv",
            CollectionFormat::Tsv => "tsv",
            CollectionFormat::Uon => "uon",
            CollectionFormat::Multi => "multi",
            CollectionFormat::None => "none",
        }
    }

    /// Returns the token delimiter, or `None` for the UON form.
    pub fn delimiter(&self) -> Option<char> {
        match self {
            CollectionFormat::Pipes => Some('|'),
            CollectionFormat::Ssv => Some(' '),
            CollectionFormat::Tsv => Some('\t'),
            CollectionFormat::Uon => None,
            CollectionFormat::Csv | CollectionFormat::Multi | CollectionFormat::None => Some(','),
        }
    }

    /// Whether the delimiter is backslash-escaped inside tokens.
    pub fn escapes_delimiter(&self) -> bool {
        !matches!(self, CollectionFormat::Ssv | CollectionFormat::Tsv)
    }
}

macro_rules! wire_name_impls {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = SchemaError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::parse(s).ok_or_else(|| SchemaError::UnknownName {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }
    };
}

wire_name_impls!(DataType, "type");
wire_name_impls!(Format, "format");
wire_name_impls!(CollectionFormat, "collectionFormat");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_parse_valid() {
        assert_eq!(DataType::parse("array"), Some(DataType::Array));
        assert_eq!(DataType::parse("INTEGER"), Some(DataType::Integer));
        assert_eq!(DataType::parse(""), Some(DataType::None));
    }

    #[test]
    fn data_type_parse_invalid() {
        assert_eq!(DataType::parse("list"), None);
        assert!("list".parse::<DataType>().is_err());
    }

    #[test]
    fn format_names_round_trip() {
        for f in [
            Format::Byte,
            Format::Binary,
            Format::BinarySpaced,
            Format::Date,
            Format::DateTime,
            Format::Uon,
            Format::Int32,
            Format::Int64,
            Format::Float,
            Format::Double,
        ] {
            assert_eq!(f.as_str().parse::<Format>().unwrap(), f);
        }
    }

    #[test]
    fn format_applicability() {
        assert!(Format::Byte.applies_to(DataType::String));
        assert!(!Format::Byte.applies_to(DataType::Integer));
        assert!(Format::Int64.applies_to(DataType::Integer));
        assert!(Format::Uon.applies_to(DataType::Array));
    }

    #[test]
    fn collection_format_delimiters() {
        assert_eq!(CollectionFormat::Csv.delimiter(), Some(','));
        assert_eq!(CollectionFormat::Pipes.delimiter(), Some('|'));
        assert_eq!(CollectionFormat::Ssv.delimiter(), Some(' '));
        assert_eq!(CollectionFormat::Tsv.delimiter(), Some('\t'));
        assert_eq!(CollectionFormat::Multi.delimiter(), Some(','));
        assert_eq!(CollectionFormat::Uon.delimiter(), None);
        assert!(!CollectionFormat::Ssv.escapes_delimiter());
        assert!(CollectionFormat::Pipes.escapes_delimiter());
    }

    #[test]
    fn serde_uses_wire_names() {
        let f: Format = serde_json::from_str(r#""binary-spaced""#).unwrap();
        assert_eq!(f, Format::BinarySpaced);
        let f: Format = serde_json::from_str(r#""date-time""#).unwrap();
        assert_eq!(f, Format::DateTime);
        let cf: CollectionFormat = serde_json::from_str(r#""pipes""#).unwrap();
        assert_eq!(cf, CollectionFormat::Pipes);
    }
}
