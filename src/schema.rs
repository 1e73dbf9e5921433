//! Immutable part schema nodes and their builder.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{SchemaError, SchemaValidationError};
use crate::types::{CollectionFormat, DataType, Format};
use crate::value::PartValue;

/// A compiled `pattern` constraint. Matching is against the whole string.
#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    fn compile(source: &str) -> Result<Self, SchemaError> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            SchemaError::InvalidPattern {
                pattern: source.to_string(),
                source: e,
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }
}

/// Expected shape and constraints for one value position.
///
/// Built once with [`SchemaBuilder`] and then shared read-only; the type
/// decides which of the other attributes are consulted.
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    data_type: DataType,
    format: Format,
    collection_format: CollectionFormat,
    pattern: Option<Pattern>,
    enum_values: Vec<String>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    required: bool,
    allow_empty_value: bool,
    default: Option<String>,
    items: Option<Arc<SchemaNode>>,
    properties: IndexMap<String, Arc<SchemaNode>>,
    additional_properties: Option<Arc<SchemaNode>>,
    maximum: Option<f64>,
    minimum: Option<f64>,
    exclusive_maximum: bool,
    exclusive_minimum: bool,
    multiple_of: Option<f64>,
    max_items: Option<u64>,
    min_items: Option<u64>,
    unique_items: bool,
    max_properties: Option<u64>,
    min_properties: Option<u64>,
}

static STRING_SCHEMA: OnceLock<SchemaNode> = OnceLock::new();
static UNTYPED_SCHEMA: OnceLock<SchemaNode> = OnceLock::new();

impl SchemaNode {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Implicit schema for array items when none is declared.
    pub fn default_items() -> &'static SchemaNode {
        STRING_SCHEMA.get_or_init(|| SchemaNode {
            data_type: DataType::String,
            ..SchemaNode::default()
        })
    }

    /// Schema with no declared type or constraints.
    pub fn untyped() -> &'static SchemaNode {
        UNTYPED_SCHEMA.get_or_init(SchemaNode::default)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn collection_format(&self) -> CollectionFormat {
        self.collection_format
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|p| p.source.as_str())
    }

    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    pub fn min_length(&self) -> Option<u64> {
        self.min_length
    }

    pub fn max_length(&self) -> Option<u64> {
        self.max_length
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn allow_empty_value(&self) -> bool {
        self.allow_empty_value
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn items(&self) -> Option<&SchemaNode> {
        self.items.as_deref()
    }

    /// Declared items, or the implicit string schema.
    pub fn items_or_default(&self) -> &SchemaNode {
        self.items().unwrap_or_else(|| SchemaNode::default_items())
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.get(name).map(Arc::as_ref)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn additional_properties(&self) -> Option<&SchemaNode> {
        self.additional_properties.as_deref()
    }

    /// Schema for an object key: the declared property, then
    /// `additionalProperties`, then an untyped schema.
    pub fn property_or_additional(&self, name: &str) -> &SchemaNode {
        self.property(name)
            .or_else(|| self.additional_properties())
            .unwrap_or_else(|| SchemaNode::untyped())
    }

    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    pub fn minimum(&self) -> Option<f64> {
        self.minimum
    }

    pub fn exclusive_maximum(&self) -> bool {
        self.exclusive_maximum
    }

    pub fn exclusive_minimum(&self) -> bool {
        self.exclusive_minimum
    }

    pub fn multiple_of(&self) -> Option<f64> {
        self.multiple_of
    }

    pub fn max_items(&self) -> Option<u64> {
        self.max_items
    }

    pub fn min_items(&self) -> Option<u64> {
        self.min_items
    }

    pub fn unique_items(&self) -> bool {
        self.unique_items
    }

    pub fn max_properties(&self) -> Option<u64> {
        self.max_properties
    }

    pub fn min_properties(&self) -> Option<u64> {
        self.min_properties
    }

    /// Check the string form of a value.
    ///
    /// Order: empty, pattern, enum, minimum length, maximum length. The first
    /// failure is returned.
    pub fn validate_string(&self, s: &str) -> Result<(), SchemaValidationError> {
        if !self.allow_empty_value && s.is_empty() {
            return Err(SchemaValidationError::EmptyValue);
        }
        if let Some(p) = &self.pattern {
            if !p.regex.is_match(s) {
                return Err(SchemaValidationError::PatternMismatch {
                    pattern: p.source.clone(),
                });
            }
        }
        if !self.enum_values.is_empty() && !self.enum_values.iter().any(|e| e == s) {
            return Err(SchemaValidationError::EnumMismatch {
                allowed: self.enum_values.clone(),
            });
        }
        let len = s.chars().count() as u64;
        if self.min_length.is_some_and(|min| len < min) {
            return Err(SchemaValidationError::MinLength);
        }
        if self.max_length.is_some_and(|max| len > max) {
            return Err(SchemaValidationError::MaxLength);
        }
        Ok(())
    }

    /// Check `minimum`, `maximum`, and `multipleOf` against a number.
    pub fn validate_number(&self, n: f64) -> Result<(), SchemaValidationError> {
        if let Some(min) = self.minimum {
            if n < min || (self.exclusive_minimum && n == min) {
                return Err(SchemaValidationError::Minimum);
            }
        }
        if let Some(max) = self.maximum {
            if n > max || (self.exclusive_maximum && n == max) {
                return Err(SchemaValidationError::Maximum);
            }
        }
        if let Some(m) = self.multiple_of {
            if m != 0.0 {
                let q = n / m;
                if (q - q.round()).abs() > 1e-9 {
                    return Err(SchemaValidationError::MultipleOf);
                }
            }
        }
        Ok(())
    }

    /// Check item count and uniqueness of an array value.
    pub fn validate_items(&self, items: &[PartValue]) -> Result<(), SchemaValidationError> {
        let len = items.len() as u64;
        if self.min_items.is_some_and(|min| len < min) {
            return Err(SchemaValidationError::MinItems);
        }
        if self.max_items.is_some_and(|max| len > max) {
            return Err(SchemaValidationError::MaxItems);
        }
        if self.unique_items {
            for (i, item) in items.iter().enumerate() {
                if items[..i].contains(item) {
                    return Err(SchemaValidationError::DuplicateItems);
                }
            }
        }
        Ok(())
    }

    /// Check the property count of an object value.
    pub fn validate_properties(&self, count: usize) -> Result<(), SchemaValidationError> {
        let count = count as u64;
        if self.min_properties.is_some_and(|min| count < min) {
            return Err(SchemaValidationError::MinProperties);
        }
        if self.max_properties.is_some_and(|max| count > max) {
            return Err(SchemaValidationError::MaxProperties);
        }
        Ok(())
    }

    /// A builder initialised with this node's settings.
    pub fn to_builder(&self) -> SchemaBuilder {
        SchemaBuilder {
            data_type: self.data_type,
            format: self.format,
            collection_format: self.collection_format,
            pattern: self.pattern.as_ref().map(|p| p.source.clone()),
            enum_values: self.enum_values.clone(),
            min_length: self.min_length,
            max_length: self.max_length,
            required: self.required,
            allow_empty_value: self.allow_empty_value,
            default: self.default.clone(),
            items: self.items.as_ref().map(|n| Box::new(n.to_builder())),
            properties: self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_builder()))
                .collect(),
            additional_properties: self
                .additional_properties
                .as_ref()
                .map(|n| Box::new(n.to_builder())),
            maximum: self.maximum,
            minimum: self.minimum,
            exclusive_maximum: self.exclusive_maximum,
            exclusive_minimum: self.exclusive_minimum,
            multiple_of: self.multiple_of,
            max_items: self.max_items,
            min_items: self.min_items,
            unique_items: self.unique_items,
            max_properties: self.max_properties,
            min_properties: self.min_properties,
        }
    }
}

/// Accumulates schema settings and produces [`SchemaNode`] snapshots.
///
/// No combination of settings is rejected: attributes that do not apply to
/// the chosen type are simply not consulted by the codec.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    data_type: DataType,
    format: Format,
    collection_format: CollectionFormat,
    pattern: Option<String>,
    enum_values: Vec<String>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    required: bool,
    allow_empty_value: bool,
    default: Option<String>,
    items: Option<Box<SchemaBuilder>>,
    properties: IndexMap<String, SchemaBuilder>,
    additional_properties: Option<Box<SchemaBuilder>>,
    maximum: Option<f64>,
    minimum: Option<f64>,
    exclusive_maximum: bool,
    exclusive_minimum: bool,
    multiple_of: Option<f64>,
    max_items: Option<u64>,
    min_items: Option<u64>,
    unique_items: bool,
    max_properties: Option<u64>,
    min_properties: Option<u64>,
}

/// An empty builder.
pub fn schema() -> SchemaBuilder {
    SchemaBuilder::default()
}

/// A builder with the given type.
pub fn schema_of(data_type: DataType) -> SchemaBuilder {
    schema().data_type(data_type)
}

/// A builder with the given type and format.
pub fn schema_with_format(data_type: DataType, format: Format) -> SchemaBuilder {
    schema().data_type(data_type).format(format)
}

impl SchemaBuilder {
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn collection_format(mut self, collection_format: CollectionFormat) -> Self {
        self.collection_format = collection_format;
        self
    }

    /// Set the regex the string form must fully match. Blank clears it.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.pattern = if pattern.trim().is_empty() {
            None
        } else {
            Some(pattern)
        };
        self
    }

    /// Add allowed string forms. Blank entries are ignored.
    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for v in values {
            let v = v.into();
            if !v.trim().is_empty() && !self.enum_values.contains(&v) {
                self.enum_values.push(v);
            }
        }
        self
    }

    pub fn min_length(mut self, min: u64) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: u64) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn allow_empty_value(mut self, allow: bool) -> Self {
        self.allow_empty_value = allow;
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn items(mut self, items: impl Into<SchemaBuilder>) -> Self {
        self.items = Some(Box::new(items.into()));
        self
    }

    pub fn property(mut self, name: impl Into<String>, schema: impl Into<SchemaBuilder>) -> Self {
        self.properties.insert(name.into(), schema.into());
        self
    }

    pub fn additional_properties(mut self, schema: impl Into<SchemaBuilder>) -> Self {
        self.additional_properties = Some(Box::new(schema.into()));
        self
    }

    pub fn maximum(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }

    pub fn minimum(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }

    pub fn exclusive_maximum(mut self, exclusive: bool) -> Self {
        self.exclusive_maximum = exclusive;
        self
    }

    pub fn exclusive_minimum(mut self, exclusive: bool) -> Self {
        self.exclusive_minimum = exclusive;
        self
    }

    pub fn multiple_of(mut self, m: f64) -> Self {
        self.multiple_of = Some(m);
        self
    }

    pub fn max_items(mut self, max: u64) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn min_items(mut self, min: u64) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn unique_items(mut self, unique: bool) -> Self {
        self.unique_items = unique;
        self
    }

    pub fn max_properties(mut self, max: u64) -> Self {
        self.max_properties = Some(max);
        self
    }

    pub fn min_properties(mut self, min: u64) -> Self {
        self.min_properties = Some(min);
        self
    }

    /// Produce an immutable snapshot of the current settings.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidPattern` if this node or any nested node
    /// has a pattern that is not a valid regular expression.
    pub fn build(&self) -> Result<SchemaNode, SchemaError> {
        let pattern = self.pattern.as_deref().map(Pattern::compile).transpose()?;
        let items = match &self.items {
            Some(b) => Some(Arc::new(b.build()?)),
            None => None,
        };
        let additional_properties = match &self.additional_properties {
            Some(b) => Some(Arc::new(b.build()?)),
            None => None,
        };
        let properties = self
            .properties
            .iter()
            .map(|(k, b)| b.build().map(|n| (k.clone(), Arc::new(n))))
            .collect::<Result<IndexMap<_, _>, _>>()?;

        Ok(SchemaNode {
            data_type: self.data_type,
            format: self.format,
            collection_format: self.collection_format,
            pattern,
            enum_values: self.enum_values.clone(),
            min_length: self.min_length,
            max_length: self.max_length,
            required: self.required,
            allow_empty_value: self.allow_empty_value,
            default: self.default.clone(),
            items,
            properties,
            additional_properties,
            maximum: self.maximum,
            minimum: self.minimum,
            exclusive_maximum: self.exclusive_maximum,
            exclusive_minimum: self.exclusive_minimum,
            multiple_of: self.multiple_of,
            max_items: self.max_items,
            min_items: self.min_items,
            unique_items: self.unique_items,
            max_properties: self.max_properties,
            min_properties: self.min_properties,
        })
    }
}

impl From<&SchemaNode> for SchemaBuilder {
    fn from(node: &SchemaNode) -> Self {
        node.to_builder()
    }
}

impl From<SchemaNode> for SchemaBuilder {
    fn from(node: SchemaNode) -> Self {
        node.to_builder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_returns_independent_snapshots() {
        let builder = schema_of(DataType::String).min_length(1);
        let first = builder.build().unwrap();
        let builder = builder.max_length(3);
        let second = builder.build().unwrap();

        assert_eq!(first.max_length(), None);
        assert_eq!(second.max_length(), Some(3));
        assert_eq!(second.min_length(), Some(1));
    }

    #[test]
    fn contradictory_settings_are_accepted() {
        let node = schema_of(DataType::Integer)
            .collection_format(CollectionFormat::Pipes)
            .format(Format::Byte)
            .items(schema_of(DataType::String))
            .build()
            .unwrap();
        assert_eq!(node.collection_format(), CollectionFormat::Pipes);
        assert!(node.items().is_some());
    }

    #[test]
    fn invalid_pattern_fails_build() {
        let result = schema().pattern("(unclosed").build();
        assert!(matches!(result, Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn nested_invalid_pattern_fails_build() {
        let result = schema_of(DataType::Array)
            .items(schema().pattern("["))
            .build();
        assert!(matches!(result, Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn blank_pattern_and_enum_entries_are_ignored() {
        let node = schema()
            .pattern("  ")
            .enum_values(["", " ", "a", "a"])
            .build()
            .unwrap();
        assert_eq!(node.pattern(), None);
        assert_eq!(node.enum_values(), ["a".to_string()]);
    }

    #[test]
    fn pattern_matches_whole_string() {
        let node = schema().pattern("x.*").build().unwrap();
        assert!(node.validate_string("x").is_ok());
        assert!(node.validate_string("xx").is_ok());
        assert_eq!(
            node.validate_string("yx"),
            Err(SchemaValidationError::PatternMismatch {
                pattern: "x.*".into()
            })
        );

        let node = schema().pattern("a|b").build().unwrap();
        assert!(node.validate_string("b").is_ok());
        assert!(node.validate_string("ab").is_err());
    }

    #[test]
    fn validation_order_short_circuits() {
        let node = schema()
            .pattern("x+")
            .enum_values(["xx"])
            .max_length(1)
            .build()
            .unwrap();
        assert_eq!(node.validate_string(""), Err(SchemaValidationError::EmptyValue));
        assert!(matches!(
            node.validate_string("y"),
            Err(SchemaValidationError::PatternMismatch { .. })
        ));
        assert!(matches!(
            node.validate_string("x"),
            Err(SchemaValidationError::EnumMismatch { .. })
        ));
        assert_eq!(
            node.validate_string("xx"),
            Err(SchemaValidationError::MaxLength)
        );
    }

    #[test]
    fn allow_empty_value() {
        let node = schema().allow_empty_value(true).build().unwrap();
        assert!(node.validate_string("").is_ok());
    }

    #[test]
    fn min_length_counts_characters() {
        let node = schema().min_length(3).build().unwrap();
        assert!(node.validate_string("äöü").is_ok());
        assert_eq!(
            node.validate_string("äö"),
            Err(SchemaValidationError::MinLength)
        );
    }

    #[test]
    fn numeric_bounds() {
        let node = schema_of(DataType::Integer)
            .minimum(1.0)
            .maximum(10.0)
            .exclusive_maximum(true)
            .multiple_of(3.0)
            .build()
            .unwrap();
        assert!(node.validate_number(3.0).is_ok());
        assert_eq!(node.validate_number(0.0), Err(SchemaValidationError::Minimum));
        assert_eq!(node.validate_number(10.0), Err(SchemaValidationError::Maximum));
        assert_eq!(
            node.validate_number(4.0),
            Err(SchemaValidationError::MultipleOf)
        );
    }

    #[test]
    fn item_constraints() {
        let node = schema_of(DataType::Array)
            .min_items(1)
            .max_items(2)
            .unique_items(true)
            .build()
            .unwrap();
        assert_eq!(node.validate_items(&[]), Err(SchemaValidationError::MinItems));
        let three = [PartValue::Integer(1), PartValue::Integer(2), PartValue::Integer(3)];
        assert_eq!(
            node.validate_items(&three),
            Err(SchemaValidationError::MaxItems)
        );
        let dup = [PartValue::from("a"), PartValue::from("a")];
        assert_eq!(
            node.validate_items(&dup),
            Err(SchemaValidationError::DuplicateItems)
        );
    }

    #[test]
    fn property_fallbacks() {
        let node = schema_of(DataType::Object)
            .property("a", schema_of(DataType::Integer))
            .additional_properties(schema_of(DataType::Boolean))
            .build()
            .unwrap();
        assert_eq!(node.property_or_additional("a").data_type(), DataType::Integer);
        assert_eq!(node.property_or_additional("z").data_type(), DataType::Boolean);

        let bare = schema_of(DataType::Object).build().unwrap();
        assert_eq!(bare.property_or_additional("z").data_type(), DataType::None);
    }

    #[test]
    fn default_items_is_string() {
        let node = schema_of(DataType::Array).build().unwrap();
        assert_eq!(node.items_or_default().data_type(), DataType::String);
    }

    #[test]
    fn to_builder_round_trips() {
        let node = schema_of(DataType::Array)
            .collection_format(CollectionFormat::Pipes)
            .items(schema_of(DataType::String).pattern("a.*"))
            .build()
            .unwrap();
        let copy = node.to_builder().build().unwrap();
        assert_eq!(copy.collection_format(), CollectionFormat::Pipes);
        assert_eq!(copy.items().unwrap().pattern(), Some("a.*"));
    }

    #[test]
    fn schema_nodes_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemaNode>();
        assert_send_sync::<SchemaBuilder>();
    }
}
