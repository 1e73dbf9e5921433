//! Schema-directed parsing of part strings back into values.

use base64::Engine as _;
use indexmap::IndexMap;

use crate::config::PartConfig;
use crate::convert::{parse_date, parse_date_time, TargetType};
use crate::error::{ParseError, PartError, SchemaValidationError};
use crate::schema::SchemaNode;
use crate::serializer::is_numeric_or_boolean;
use crate::types::{CollectionFormat, DataType, Format};
use crate::uon::{self, UonNode};
use crate::value::{FromPartValue, PartValue};

/// Parses HTTP part strings into values, the inverse of
/// [`PartSerializer`](crate::PartSerializer).
#[derive(Debug, Clone, Default)]
pub struct PartParser {
    config: PartConfig,
}

impl PartParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PartConfig {
        &self.config
    }

    /// Parse `input` according to `schema` and coerce the result to `target`.
    ///
    /// An absent input falls back to the schema default. Without a default,
    /// a required schema fails and an optional one yields `Null`.
    pub fn parse(
        &self,
        schema: &SchemaNode,
        input: Option<&str>,
        target: &TargetType,
    ) -> Result<PartValue, PartError> {
        let text = match input.or(schema.default_value()) {
            Some(text) => text,
            None if schema.is_required() => {
                return Err(SchemaValidationError::NoValueSpecified.into())
            }
            None => return Ok(PartValue::Null),
        };
        self.parse_node(schema, text, target)
    }

    /// Parse into a concrete Rust type.
    ///
    /// ```
    /// use openapi_part::{schema_of, DataType, PartParser};
    ///
    /// let ps = schema_of(DataType::Array).build().unwrap();
    /// let out: Vec<String> = PartParser::new().parse_as(&ps, Some("a,b")).unwrap();
    /// assert_eq!(out, ["a", "b"]);
    /// ```
    pub fn parse_as<T: FromPartValue>(
        &self,
        schema: &SchemaNode,
        input: Option<&str>,
    ) -> Result<T, PartError> {
        let value = self.parse(schema, input, &T::target_type())?;
        Ok(T::from_part_value(value)?)
    }

    fn parse_node(
        &self,
        schema: &SchemaNode,
        text: &str,
        target: &TargetType,
    ) -> Result<PartValue, PartError> {
        let format = self.config.effective_format(schema.format());
        let (data_type, format) = infer_type(schema.data_type(), format, target);
        tracing::trace!(
            data_type = data_type.as_str(),
            format = format.as_str(),
            %target,
            "parsing part"
        );

        if data_type == DataType::File {
            return Err(PartError::Unsupported {
                data_type: DataType::File.as_str(),
                action: "parsed",
            });
        }
        if is_numeric_or_boolean(data_type) && text == "null" {
            return Ok(PartValue::Null);
        }
        if data_type.is_scalar() {
            schema.validate_string(text)?;
        }

        if format == Format::Uon && !is_numeric_or_boolean(data_type) {
            let node = uon::parse(text)?;
            return self.from_uon(schema, node, target);
        }

        match data_type {
            DataType::Array => self.parse_array(schema, text, target),
            DataType::Object => self.parse_object(schema, text, target),
            _ => self.parse_scalar(schema, data_type, format, text, target),
        }
    }

    fn parse_scalar(
        &self,
        schema: &SchemaNode,
        data_type: DataType,
        format: Format,
        text: &str,
        target: &TargetType,
    ) -> Result<PartValue, PartError> {
        let value = match data_type {
            DataType::Boolean | DataType::Integer | DataType::Number => {
                if text == "null" {
                    return Ok(PartValue::Null);
                }
                let wanted = match data_type {
                    DataType::Boolean => TargetType::Boolean,
                    DataType::Integer
                        if format == Format::Int32 || *target == TargetType::Integer =>
                    {
                        TargetType::Integer
                    }
                    DataType::Integer => TargetType::Long,
                    _ if format == Format::Float || *target == TargetType::Float => {
                        TargetType::Float
                    }
                    _ => TargetType::Double,
                };
                let n = self
                    .config
                    .conversions()
                    .resolve(&PartValue::String(text.to_string()), &wanted)?;
                if let Some(f) = n.as_f64() {
                    schema.validate_number(f)?;
                }
                if format == Format::None {
                    narrow(n)
                } else {
                    n
                }
            }
            _ => decode_string(format, text)?,
        };
        self.finish(value, target)
    }

    fn parse_array(
        &self,
        schema: &SchemaNode,
        text: &str,
        target: &TargetType,
    ) -> Result<PartValue, PartError> {
        let cf = self
            .config
            .effective_collection_format(schema.collection_format());
        let sniff = cf == CollectionFormat::None && text.starts_with("@(");
        if cf == CollectionFormat::Uon || sniff {
            let node = uon::parse(text)?;
            return self.from_uon(schema, node, target);
        }

        let items = schema.items_or_default();
        let element = element_target(target);
        let mut list = Vec::new();
        if !text.is_empty() {
            for token in split_tokens(text, cf) {
                list.push(if token == "null" {
                    PartValue::Null
                } else {
                    self.parse_node(items, &token, element)?
                });
            }
        }
        schema.validate_items(&list)?;
        self.finish(PartValue::List(list), target)
    }

    fn parse_object(
        &self,
        schema: &SchemaNode,
        text: &str,
        target: &TargetType,
    ) -> Result<PartValue, PartError> {
        let cf = self
            .config
            .effective_collection_format(schema.collection_format());
        let sniff = cf == CollectionFormat::None && text.starts_with('(');
        if cf == CollectionFormat::Uon || sniff {
            let node = uon::parse(text)?;
            return self.from_uon(schema, node, target);
        }

        let entry = entry_target(target);
        let mut map = IndexMap::new();
        if !text.is_empty() {
            for token in split_tokens(text, cf) {
                let Some((key, raw)) = split_pair(&token) else {
                    return Err(ParseError::KeyValue {
                        token: token.clone(),
                    }
                    .into());
                };
                let value = if raw == "null" {
                    PartValue::Null
                } else {
                    self.parse_node(schema.property_or_additional(&key), raw, entry)?
                };
                map.insert(key, value);
            }
        }
        self.fill_absent(schema, &mut map, entry)?;
        schema.validate_properties(map.len())?;
        self.finish(PartValue::Map(map), target)
    }

    /// Interpret a parsed UON tree against `schema`.
    fn from_uon(
        &self,
        schema: &SchemaNode,
        node: UonNode,
        target: &TargetType,
    ) -> Result<PartValue, PartError> {
        if node.is_null() {
            return Ok(PartValue::Null);
        }
        let format = self.config.effective_format(schema.format());
        let (data_type, format) = infer_type(schema.data_type(), format, target);

        match node {
            UonNode::List(nodes) => {
                let items = schema.items_or_default();
                let element = element_target(target);
                let list = nodes
                    .into_iter()
                    .map(|n| self.from_uon_child(items, n, element))
                    .collect::<Result<Vec<_>, _>>()?;
                schema.validate_items(&list)?;
                self.finish(PartValue::List(list), target)
            }
            UonNode::Map(entries) => {
                let entry = entry_target(target);
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, n) in entries {
                    let value = self.from_uon_child(schema.property_or_additional(&key), n, entry)?;
                    map.insert(key, value);
                }
                self.fill_absent(schema, &mut map, entry)?;
                schema.validate_properties(map.len())?;
                self.finish(PartValue::Map(map), target)
            }
            token @ UonNode::Token { .. }
                if schema.data_type() == DataType::None && *target == TargetType::Any =>
            {
                Ok(token.into_value())
            }
            UonNode::Token { text, quoted } => match data_type {
                DataType::Array => {
                    let token = UonNode::Token { text, quoted };
                    let single = self.from_uon_child(
                        schema.items_or_default(),
                        token,
                        element_target(target),
                    )?;
                    schema.validate_items(std::slice::from_ref(&single))?;
                    self.finish(PartValue::List(vec![single]), target)
                }
                DataType::Object => Err(ParseError::KeyValue { token: text }.into()),
                _ => {
                    // A token's own text is never UON again.
                    let format = if format == Format::Uon {
                        Format::None
                    } else {
                        format
                    };
                    self.parse_scalar(schema, data_type, format, &text, target)
                }
            },
        }
    }

    fn from_uon_child(
        &self,
        schema: &SchemaNode,
        node: UonNode,
        target: &TargetType,
    ) -> Result<PartValue, PartError> {
        if let UonNode::Token { text, .. } = &node {
            if !node.is_null() && schema.data_type().is_scalar() {
                schema.validate_string(text)?;
            }
        }
        self.from_uon(schema, node, target)
    }

    /// Declared properties the input left out take their default; a required
    /// one without a default fails.
    fn fill_absent(
        &self,
        schema: &SchemaNode,
        map: &mut IndexMap<String, PartValue>,
        target: &TargetType,
    ) -> Result<(), PartError> {
        for (name, property) in schema.properties() {
            if map.contains_key(name) {
                continue;
            }
            let value = self.parse(property, None, target)?;
            if !value.is_null() {
                map.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    fn finish(&self, value: PartValue, target: &TargetType) -> Result<PartValue, PartError> {
        if *target == TargetType::Any {
            return Ok(value);
        }
        Ok(self.config.conversions().resolve(&value, target)?)
    }
}

/// Pick the effective type and format for an untyped schema from the
/// requested target.
fn infer_type(declared: DataType, format: Format, target: &TargetType) -> (DataType, Format) {
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
    match target {
        TargetType::Boolean => (DataType::Boolean, format),
        TargetType::Integer => (DataType::Integer, or(Format::Int32)),
        TargetType::Long => (DataType::Integer, or(Format::Int64)),
        TargetType::Float => (DataType::Number, or(Format::Float)),
        TargetType::Double => (DataType::Number, or(Format::Double)),
        TargetType::Bytes => (DataType::String, or(Format::Byte)),
        TargetType::Date => (DataType::String, or(Format::Date)),
        TargetType::DateTime => (DataType::String, or(Format::DateTime)),
        TargetType::List(_) => (DataType::Array, format),
        TargetType::Map(_) => (DataType::Object, format),
        _ => (DataType::String, format),
    }
}

/// Without a declared format, a number that fits 32 bits exactly is
/// reported at 32 bits.
fn narrow(n: PartValue) -> PartValue {
    match n {
        PartValue::Long(v) => i32::try_from(v).map_or(n, PartValue::Integer),
        PartValue::Double(v) if f64::from(v as f32) == v => PartValue::Float(v as f32),
        other => other,
    }
}

static ANY: TargetType = TargetType::Any;

fn element_target(target: &TargetType) -> &TargetType {
    match target {
        TargetType::List(inner) => inner,
        _ => &ANY,
    }
}

fn entry_target(target: &TargetType) -> &TargetType {
    match target {
        TargetType::Map(inner) => inner,
        _ => &ANY,
    }
}

fn decode_string(format: Format, text: &str) -> Result<PartValue, ParseError> {
    let value = match format {
        Format::Byte => base64::engine::general_purpose::STANDARD
            .decode(text)
            .map(PartValue::Bytes)
            .map_err(|e| ParseError::Base64 {
                message: e.to_string(),
            })?,
        Format::Binary => hex::decode(text)
            .map(PartValue::Bytes)
            .map_err(|e| ParseError::Hex {
                message: e.to_string(),
            })?,
        Format::BinarySpaced => {
            let mut bytes = Vec::new();
            for pair in text.split_whitespace() {
                let decoded = hex::decode(pair).map_err(|e| ParseError::Hex {
                    message: e.to_string(),
                })?;
                bytes.extend(decoded);
            }
            PartValue::Bytes(bytes)
        }
        Format::Date => parse_date(text)
            .map(PartValue::Date)
            .ok_or_else(|| ParseError::Temporal {
                format: "date",
                input: text.to_string(),
            })?,
        Format::DateTime => parse_date_time(text)
            .map(PartValue::DateTime)
            .ok_or_else(|| ParseError::Temporal {
                format: "date-time",
                input: text.to_string(),
            })?,
        _ => PartValue::String(text.to_string()),
    };
    Ok(value)
}

/// Split a `key=value` token at the first unescaped `=`, unescaping the key.
fn split_pair(token: &str) -> Option<(String, &str)> {
    let mut key = String::new();
    let mut chars = token.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, next)) => key.push(next),
                None => key.push(c),
            },
            '=' => return Some((key, &token[i + 1..])),
            _ => key.push(c),
        }
    }
    None
}

/// Split on the collection format's delimiter. Where the format escapes its
/// delimiter, a backslash makes the next character literal.
fn split_tokens(text: &str, cf: CollectionFormat) -> Vec<String> {
    let d = cf.delimiter().unwrap_or(',');
    if !cf.escapes_delimiter() {
        return text.split(d).map(String::from).collect();
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => current.push(next),
                None => current.push(c),
            }
        } else if c == d {
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    tokens.push(current);
    tokens
}
