//! Error types for part schema construction, conversion, and validation.

use std::path::PathBuf;
use thiserror::Error;

/// A value did not satisfy the constraints of its schema node.
///
/// Messages are fixed and surfaced verbatim to callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaValidationError {
    #[error("Required value not provided.")]
    RequiredValueNotProvided,

    #[error("No value specified.")]
    NoValueSpecified,

    #[error("Empty value not allowed.")]
    EmptyValue,

    #[error("Value does not match expected pattern.  Must match pattern: {pattern}")]
    PatternMismatch { pattern: String },

    #[error("Value does not match one of the expected values.  Must be one of the following: {}", allowed.join(", "))]
    EnumMismatch { allowed: Vec<String> },

    #[error("Minimum length of value not met.")]
    MinLength,

    #[error("Maximum length of value exceeded.")]
    MaxLength,

    #[error("Minimum value not met.")]
    Minimum,

    #[error("Maximum value exceeded.")]
    Maximum,

    #[error("Multiple-of not met.")]
    MultipleOf,

    #[error("Minimum number of items not met.")]
    MinItems,

    #[error("Maximum number of items exceeded.")]
    MaxItems,

    #[error("Duplicate items not allowed.")]
    DuplicateItems,

    #[error("Minimum number of properties not met.")]
    MinProperties,

    #[error("Maximum number of properties exceeded.")]
    MaxProperties,
}

/// No conversion rule could coerce a value to the requested type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("cannot convert {from} to {to}")]
    NoApplicableRule { from: String, to: String },

    #[error("invalid {to} literal '{input}'")]
    InvalidLiteral { to: String, input: String },

    #[error("value {value} is out of range for {to}")]
    OutOfRange { value: String, to: String },

    #[error("constructor for {target} rejected input: {message}")]
    ConstructorFailed { target: String, message: String },
}

/// Malformed wire input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("malformed UON at position {position}: {message}")]
    Uon { position: usize, message: String },

    #[error("invalid base64 input: {message}")]
    Base64 { message: String },

    #[error("invalid hex input: {message}")]
    Hex { message: String },

    #[error("invalid {format} value '{input}'")]
    Temporal { format: &'static str, input: String },

    #[error("malformed key/value pair '{token}'")]
    KeyValue { token: String },
}

/// Errors while building or loading a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown {kind} \"{value}\"")]
    UnknownName { kind: &'static str, value: String },

    #[error("invalid pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("reference not found: {reference}")]
    UnresolvedRef { reference: String },

    #[error("circular reference detected: {reference}")]
    CircularRef { reference: String },
}

/// Umbrella error returned by the part serializer and parser.
#[derive(Debug, Error)]
pub enum PartError {
    #[error(transparent)]
    Validation(#[from] SchemaValidationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("parts of type {data_type} cannot be {action}")]
    Unsupported {
        data_type: &'static str,
        action: &'static str,
    },
}

impl PartError {
    /// Returns the HTTP status a REST layer should answer with.
    ///
    /// Every caller-input failure maps to 400; schema misuse maps to 500.
    pub fn status_code(&self) -> u16 {
        match self {
            PartError::Validation(_) | PartError::Conversion(_) | PartError::Parse(_) => 400,
            PartError::Unsupported { .. } => 500,
        }
    }

    /// Returns the validation failure, if that is what this error is.
    pub fn as_validation(&self) -> Option<&SchemaValidationError> {
        match self {
            PartError::Validation(e) => Some(e),
            _ => None,
        }
    }
}
