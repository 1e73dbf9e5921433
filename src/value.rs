//! In-memory values exchanged with the part codec.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::convert::{PartConvertible, TargetType};
use crate::error::ConversionError;
use crate::uon;

/// A dynamically typed value tree.
///
/// This is what the serializer consumes and the parser produces. Custom
/// application types participate through [`PartValue::Object`] and the
/// [`PartConvertible`] capability trait.
#[derive(Debug, Clone)]
pub enum PartValue {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    List(Vec<PartValue>),
    Map(IndexMap<String, PartValue>),
    Object(Arc<dyn PartConvertible>),
}

/// The runtime shape of a [`PartValue`], used as a conversion cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Date,
    DateTime,
    List,
    Map,
    Object,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::Date => "date",
            ValueKind::DateTime => "date-time",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Object => "object",
        }
    }
}

impl PartValue {
    /// Wrap an application type exposing conversion capabilities.
    pub fn object<T: PartConvertible + 'static>(value: T) -> Self {
        PartValue::Object(Arc::new(value))
    }

    /// Build a list from anything convertible into values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<PartValue>,
    {
        PartValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Build an insertion-ordered map.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PartValue>,
    {
        PartValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            PartValue::Null => ValueKind::Null,
            PartValue::Boolean(_) => ValueKind::Boolean,
            PartValue::Integer(_) => ValueKind::Integer,
            PartValue::Long(_) => ValueKind::Long,
            PartValue::Float(_) => ValueKind::Float,
            PartValue::Double(_) => ValueKind::Double,
            PartValue::String(_) => ValueKind::String,
            PartValue::Bytes(_) => ValueKind::Bytes,
            PartValue::Date(_) => ValueKind::Date,
            PartValue::DateTime(_) => ValueKind::DateTime,
            PartValue::List(_) => ValueKind::List,
            PartValue::Map(_) => ValueKind::Map,
            PartValue::Object(_) => ValueKind::Object,
        }
    }

    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PartValue::Object(o) => o.type_name(),
            other => other.kind().name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PartValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PartValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PartValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PartValue]> {
        match self {
            PartValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, PartValue>> {
        match self {
            PartValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric view of integer and floating point values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PartValue::Integer(n) => Some(f64::from(*n)),
            PartValue::Long(n) => Some(*n as f64),
            PartValue::Float(n) => Some(f64::from(*n)),
            PartValue::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            PartValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<PartValue>> {
        match self {
            PartValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<IndexMap<String, PartValue>> {
        match self {
            PartValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// ISO-8601 calendar date, e.g. `2012-12-21`.
pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// ISO-8601 timestamp with `Z` for a zero offset.
pub(crate) fn format_date_time(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl fmt::Display for PartValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartValue::Null => f.write_str("null"),
            PartValue::Boolean(b) => write!(f, "{b}"),
            PartValue::Integer(n) => write!(f, "{n}"),
            PartValue::Long(n) => write!(f, "{n}"),
            PartValue::Float(n) => write!(f, "{n}"),
            PartValue::Double(n) => write!(f, "{n}"),
            PartValue::String(s) => f.write_str(s),
            PartValue::Bytes(b) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
            PartValue::Date(d) => f.write_str(&format_date(d)),
            PartValue::DateTime(dt) => f.write_str(&format_date_time(dt)),
            PartValue::List(_) | PartValue::Map(_) => f.write_str(&uon::to_uon(self)),
            PartValue::Object(o) => write!(f, "{o}"),
        }
    }
}

impl PartialEq for PartValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PartValue::Null, PartValue::Null) => true,
            (PartValue::Boolean(a), PartValue::Boolean(b)) => a == b,
            (PartValue::Integer(a), PartValue::Integer(b)) => a == b,
            (PartValue::Long(a), PartValue::Long(b)) => a == b,
            (PartValue::Float(a), PartValue::Float(b)) => a == b,
            (PartValue::Double(a), PartValue::Double(b)) => a == b,
            (PartValue::String(a), PartValue::String(b)) => a == b,
            (PartValue::Bytes(a), PartValue::Bytes(b)) => a == b,
            (PartValue::Date(a), PartValue::Date(b)) => a == b,
            (PartValue::DateTime(a), PartValue::DateTime(b)) => a == b,
            (PartValue::List(a), PartValue::List(b)) => a == b,
            (PartValue::Map(a), PartValue::Map(b)) => a == b,
            (PartValue::Object(a), PartValue::Object(b)) => {
                Arc::ptr_eq(a, b) || (a.type_name() == b.type_name() && a.to_string() == b.to_string())
            }
            _ => false,
        }
    }
}

impl From<bool> for PartValue {
    fn from(v: bool) -> Self {
        PartValue::Boolean(v)
    }
}

impl From<i32> for PartValue {
    fn from(v: i32) -> Self {
        PartValue::Integer(v)
    }
}

impl From<i64> for PartValue {
    fn from(v: i64) -> Self {
        PartValue::Long(v)
    }
}

impl From<f32> for PartValue {
    fn from(v: f32) -> Self {
        PartValue::Float(v)
    }
}

impl From<f64> for PartValue {
    fn from(v: f64) -> Self {
        PartValue::Double(v)
    }
}

impl From<&str> for PartValue {
    fn from(v: &str) -> Self {
        PartValue::String(v.to_string())
    }
}

impl From<String> for PartValue {
    fn from(v: String) -> Self {
        PartValue::String(v)
    }
}

impl From<&[u8]> for PartValue {
    fn from(v: &[u8]) -> Self {
        PartValue::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for PartValue {
    fn from(v: Vec<u8>) -> Self {
        PartValue::Bytes(v)
    }
}

impl From<NaiveDate> for PartValue {
    fn from(v: NaiveDate) -> Self {
        PartValue::Date(v)
    }
}

impl From<DateTime<FixedOffset>> for PartValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        PartValue::DateTime(v)
    }
}

impl From<DateTime<Utc>> for PartValue {
    fn from(v: DateTime<Utc>) -> Self {
        PartValue::DateTime(v.fixed_offset())
    }
}

impl From<Vec<PartValue>> for PartValue {
    fn from(v: Vec<PartValue>) -> Self {
        PartValue::List(v)
    }
}

impl From<IndexMap<String, PartValue>> for PartValue {
    fn from(v: IndexMap<String, PartValue>) -> Self {
        PartValue::Map(v)
    }
}

impl<T: Into<PartValue>> From<Option<T>> for PartValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PartValue::Null, Into::into)
    }
}

impl<T: Into<PartValue>> FromIterator<T> for PartValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        PartValue::list(iter)
    }
}

/// Typed extraction of a parsed value.
///
/// `target_type` tells the parser which representation to coerce into;
/// `from_part_value` unwraps the coerced result.
pub trait FromPartValue: Sized {
    fn target_type() -> TargetType;

    fn from_part_value(value: PartValue) -> Result<Self, ConversionError>;
}

fn mismatch(value: &PartValue, to: TargetType) -> ConversionError {
    ConversionError::NoApplicableRule {
        from: value.type_name().to_string(),
        to: to.to_string(),
    }
}

macro_rules! scalar_from_part_value {
    ($ty:ty, $variant:ident, $target:ident) => {
        impl FromPartValue for $ty {
            fn target_type() -> TargetType {
                TargetType::$target
            }

            fn from_part_value(value: PartValue) -> Result<Self, ConversionError> {
                match value {
                    PartValue::$variant(v) => Ok(v),
                    other => Err(mismatch(&other, TargetType::$target)),
                }
            }
        }
    };
}

scalar_from_part_value!(bool, Boolean, Boolean);
scalar_from_part_value!(i32, Integer, Integer);
scalar_from_part_value!(i64, Long, Long);
scalar_from_part_value!(f32, Float, Float);
scalar_from_part_value!(f64, Double, Double);
scalar_from_part_value!(String, String, String);
scalar_from_part_value!(NaiveDate, Date, Date);
scalar_from_part_value!(DateTime<FixedOffset>, DateTime, DateTime);

impl FromPartValue for PartValue {
    fn target_type() -> TargetType {
        TargetType::Any
    }

    fn from_part_value(value: PartValue) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl<T: FromPartValue> FromPartValue for Option<T> {
    fn target_type() -> TargetType {
        T::target_type()
    }

    fn from_part_value(value: PartValue) -> Result<Self, ConversionError> {
        match value {
            PartValue::Null => Ok(None),
            other => T::from_part_value(other).map(Some),
        }
    }
}

impl<T: FromPartValue> FromPartValue for Vec<T> {
    fn target_type() -> TargetType {
        TargetType::list(T::target_type())
    }

    fn from_part_value(value: PartValue) -> Result<Self, ConversionError> {
        match value {
            PartValue::List(items) => items.into_iter().map(T::from_part_value).collect(),
            other => Err(mismatch(&other, Self::target_type())),
        }
    }
}

impl<T: FromPartValue> FromPartValue for IndexMap<String, T> {
    fn target_type() -> TargetType {
        TargetType::map(T::target_type())
    }

    fn from_part_value(value: PartValue) -> Result<Self, ConversionError> {
        match value {
            PartValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_part_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch(&other, Self::target_type())),
        }
    }
}
