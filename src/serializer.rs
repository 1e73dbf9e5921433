//! Schema-directed serialization of values into part strings.

use base64::Engine as _;

use crate::config::PartConfig;
use crate::convert::TargetType;
use crate::error::{ConversionError, PartError, SchemaValidationError};
use crate::schema::SchemaNode;
use crate::types::{CollectionFormat, DataType, Format};
use crate::uon;
use crate::value::{format_date, format_date_time, PartValue};

/// Serializes values to the string form of an HTTP part.
///
/// Holds no per-call state; one instance can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct PartSerializer {
    config: PartConfig,
}

impl PartSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PartConfig {
        &self.config
    }

    /// Serialize `value` according to `schema`.
    ///
    /// # Errors
    ///
    /// Returns `PartError::Validation` when a constraint is violated,
    /// `PartError::Conversion` when the value cannot be coerced to the
    /// schema's type, and `PartError::Unsupported` for `file` schemas.
    pub fn serialize(&self, schema: &SchemaNode, value: &PartValue) -> Result<String, PartError> {
        let format = self.config.effective_format(schema.format());

        if value.is_null() {
            if schema.is_required() && format != Format::Uon {
                return Err(SchemaValidationError::RequiredValueNotProvided.into());
            }
            return Ok("null".to_string());
        }

        let (data_type, format) = infer_type(schema.data_type(), format, value);
        tracing::trace!(
            data_type = data_type.as_str(),
            format = format.as_str(),
            value = value.type_name(),
            "serializing part"
        );

        let out = if format == Format::Uon && !is_numeric_or_boolean(data_type) {
            if data_type == DataType::File {
                return Err(unsupported_file());
            }
            uon::to_uon(value)
        } else {
            match data_type {
                DataType::String | DataType::None => self.serialize_string(format, value)?,
                DataType::Array => self.serialize_array(schema, value)?,
                DataType::Object => self.serialize_object(schema, value)?,
                DataType::Boolean => self.coerce(value, &TargetType::Boolean)?.to_string(),
                DataType::Integer | DataType::Number => {
                    self.serialize_number(schema, value, &number_target(data_type, format, value))?
                }
                DataType::File => return Err(unsupported_file()),
            }
        };

        if data_type.is_scalar() {
            schema.validate_string(&out)?;
        }
        Ok(out)
    }

    fn coerce(&self, value: &PartValue, target: &TargetType) -> Result<PartValue, ConversionError> {
        self.config.conversions().resolve(value, target)
    }

    fn serialize_string(&self, format: Format, value: &PartValue) -> Result<String, PartError> {
        let out = match format {
            Format::Byte => {
                let bytes = self.bytes(value)?;
                base64::engine::general_purpose::STANDARD.encode(bytes)
            }
            Format::Binary => hex::encode(self.bytes(value)?),
            Format::BinarySpaced => self
                .bytes(value)?
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" "),
            Format::Date => match self.coerce(value, &TargetType::Date)? {
                PartValue::Date(d) => format_date(&d),
                other => other.to_string(),
            },
            Format::DateTime => match self.coerce(value, &TargetType::DateTime)? {
                PartValue::DateTime(dt) => format_date_time(&dt),
                other => other.to_string(),
            },
            _ => self.coerce(value, &TargetType::String)?.to_string(),
        };
        Ok(out)
    }

    fn bytes(&self, value: &PartValue) -> Result<Vec<u8>, PartError> {
        let coerced = self.coerce(value, &TargetType::Bytes)?;
        coerced.into_bytes().ok_or_else(|| {
            ConversionError::NoApplicableRule {
                from: value.type_name().to_string(),
                to: TargetType::Bytes.to_string(),
            }
            .into()
        })
    }

    fn serialize_number(
        &self,
        schema: &SchemaNode,
        value: &PartValue,
        target: &TargetType,
    ) -> Result<String, PartError> {
        let n = self.coerce(value, target)?;
        if let Some(f) = n.as_f64() {
            schema.validate_number(f)?;
        }
        Ok(n.to_string())
    }

    fn serialize_array(&self, schema: &SchemaNode, value: &PartValue) -> Result<String, PartError> {
        let list = self
            .coerce(value, &TargetType::list(TargetType::Any))?
            .into_list()
            .unwrap_or_default();
        schema.validate_items(&list)?;

        let items = schema.items_or_default();
        let cf = self
            .config
            .effective_collection_format(schema.collection_format());

        let mut tokens = Vec::with_capacity(list.len());
        for element in &list {
            let token = self.serialize(items, element)?;
            tokens.push(if cf == CollectionFormat::Uon {
                self.embed_uon(items, element, token)
            } else {
                token
            });
        }

        Ok(match cf {
            CollectionFormat::Uon => format!("@({})", tokens.join(",")),
            CollectionFormat::None => {
                let joined = join_tokens(&tokens, cf);
                // A bare leading "@(" would read back as UON.
                if joined.starts_with("@(") {
                    format!("\\{joined}")
                } else {
                    joined
                }
            }
            other => join_tokens(&tokens, other),
        })
    }

    fn serialize_object(&self, schema: &SchemaNode, value: &PartValue) -> Result<String, PartError> {
        let map = self
            .coerce(value, &TargetType::map(TargetType::Any))?
            .into_map()
            .unwrap_or_default();
        schema.validate_properties(map.len())?;

        let cf = self
            .config
            .effective_collection_format(schema.collection_format());
        let as_uon = matches!(cf, CollectionFormat::Uon | CollectionFormat::None);

        let mut pairs = Vec::with_capacity(map.len());
        for (key, v) in &map {
            let child = schema.property_or_additional(key);
            let token = self.serialize(child, v)?;
            pairs.push(if as_uon {
                format!("{}={}", uon::encode_string(key), self.embed_uon(child, v, token))
            } else {
                format!("{}={token}", escape_key(key))
            });
        }
        for (name, property) in schema.properties() {
            if property.is_required() && !map.contains_key(name) {
                tracing::debug!(property = name, "required property missing");
                return Err(SchemaValidationError::RequiredValueNotProvided.into());
            }
        }

        Ok(if as_uon {
            format!("({})", pairs.join(","))
        } else {
            join_tokens(&pairs, cf)
        })
    }

    /// Place an already-serialized child token inside a UON container.
    ///
    /// Literals and nested UON stay bare; anything else is quoted as a
    /// UON string when needed.
    fn embed_uon(&self, schema: &SchemaNode, value: &PartValue, token: String) -> String {
        if value.is_null() {
            return token;
        }
        let format = self.config.effective_format(schema.format());
        let (data_type, format) = infer_type(schema.data_type(), format, value);
        let nested_uon = match data_type {
            DataType::Array => {
                self.config
                    .effective_collection_format(schema.collection_format())
                    == CollectionFormat::Uon
            }
            DataType::Object => matches!(
                self.config
                    .effective_collection_format(schema.collection_format()),
                CollectionFormat::Uon | CollectionFormat::None
            ),
            _ => false,
        };
        if is_numeric_or_boolean(data_type) || nested_uon || format == Format::Uon {
            token
        } else {
            uon::encode_string(&token)
        }
    }
}

pub(crate) fn is_numeric_or_boolean(data_type: DataType) -> bool {
    matches!(
        data_type,
        DataType::Boolean | DataType::Integer | DataType::Number
    )
}

/// Width to coerce a number to. Without a declared format, 32-bit sources
/// stay 32-bit and everything else is carried at 64 bits.
fn number_target(data_type: DataType, format: Format, value: &PartValue) -> TargetType {
    match (data_type, format) {
        (DataType::Integer, Format::Int32) => TargetType::Integer,
        (DataType::Integer, Format::None) if matches!(value, PartValue::Integer(_)) => {
            TargetType::Integer
        }
        (DataType::Integer, _) => TargetType::Long,
        (_, Format::Float) => TargetType::Float,
        (_, Format::None) if matches!(value, PartValue::Float(_)) => TargetType::Float,
        _ => TargetType::Double,
    }
}

fn unsupported_file() -> PartError {
    PartError::Unsupported {
        data_type: DataType::File.as_str(),
        action: "serialized",
    }
}

/// Pick the effective type and format for an untyped schema from the value.
pub(crate) fn infer_type(declared: DataType, format: Format, value: &PartValue) -> (DataType, Format) {
    if declared != DataType::None {
        return (declared, format);
    }
    let or = |implied: Format| {
        if format == Format::None {
            implied
        } else {
            format
        }
    };
    match value {
        PartValue::Boolean(_) => (DataType::Boolean, format),
        PartValue::Integer(_) => (DataType::Integer, or(Format::Int32)),
        PartValue::Long(_) => (DataType::Integer, or(Format::Int64)),
        PartValue::Float(_) => (DataType::Number, or(Format::Float)),
        PartValue::Double(_) => (DataType::Number, or(Format::Double)),
        PartValue::List(_) => (DataType::Array, format),
        PartValue::Map(_) => (DataType::Object, format),
        PartValue::Bytes(_) => (DataType::String, or(Format::Byte)),
        PartValue::Date(_) => (DataType::String, or(Format::Date)),
        PartValue::DateTime(_) => (DataType::String, or(Format::DateTime)),
        _ => (DataType::String, format),
    }
}

/// Backslash-escape `=` in a key so the first bare `=` of a pair separates
/// key from value.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if c == '=' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Join tokens with the collection format's delimiter, backslash-escaping
/// the delimiter and backslashes where the format calls for it.
fn join_tokens(tokens: &[String], cf: CollectionFormat) -> String {
    let d = cf.delimiter().unwrap_or(',');
    let escape = cf.escapes_delimiter();
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(d);
        }
        if escape {
            for c in token.chars() {
                if c == d || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
        } else {
            out.push_str(token);
        }
    }
    out
}
