//! Type-conversion registry.
//!
//! Resolves how a source value is coerced into a declared target type. The
//! rules are tried in a fixed order, first match wins:
//!
//! 1. the source already has the target shape
//! 2. built-in scalar coercions (numeric widening/narrowing, string parsing)
//! 3. a constructor registered for a named target type
//! 4. an accessor capability exposed by the source ([`Accessor`])
//! 5. the source's string form
//!
//! The chosen [`ConversionStrategy`] is cached per (source, target) pair.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::RwLock;

use crate::error::ConversionError;
use crate::uon;
use crate::value::{PartValue, ValueKind};

/// A declared target type for coercion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetType {
    /// Keep whatever shape the value has.
    Any,
    String,
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    Bytes,
    Date,
    DateTime,
    List(Box<TargetType>),
    Map(Box<TargetType>),
    /// An application type built by a registered constructor.
    Named(Cow<'static, str>),
}

impl TargetType {
    pub fn list(element: TargetType) -> Self {
        TargetType::List(Box::new(element))
    }

    pub fn map(value: TargetType) -> Self {
        TargetType::Map(Box::new(value))
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        TargetType::Named(name.into())
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Any => f.write_str("any"),
            TargetType::String => f.write_str("string"),
            TargetType::Boolean => f.write_str("boolean"),
            TargetType::Integer => f.write_str("integer"),
            TargetType::Long => f.write_str("long"),
            TargetType::Float => f.write_str("float"),
            TargetType::Double => f.write_str("double"),
            TargetType::Bytes => f.write_str("bytes"),
            TargetType::Date => f.write_str("date"),
            TargetType::DateTime => f.write_str("date-time"),
            TargetType::List(inner) => write!(f, "list<{inner}>"),
            TargetType::Map(inner) => write!(f, "map<{inner}>"),
            TargetType::Named(name) => f.write_str(name),
        }
    }
}

/// Conversion capabilities an application type may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    ByteArray,
    StringArray,
    Boolean,
    BooleanArray,
    Integer,
    IntegerArray,
    Long,
    LongArray,
}

impl Accessor {
    /// Name of the trait method backing this capability.
    pub fn method_name(&self) -> &'static str {
        match self {
            Accessor::ByteArray => "to_byte_array",
            Accessor::StringArray => "to_string_array",
            Accessor::Boolean => "to_boolean",
            Accessor::BooleanArray => "to_boolean_array",
            Accessor::Integer => "to_integer",
            Accessor::IntegerArray => "to_integer_array",
            Accessor::Long => "to_long",
            Accessor::LongArray => "to_long_array",
        }
    }

    fn invoke(&self, source: &dyn PartConvertible) -> Option<PartValue> {
        match self {
            Accessor::ByteArray => source.to_byte_array().map(PartValue::Bytes),
            Accessor::StringArray => source.to_string_array().map(PartValue::list),
            Accessor::Boolean => source.to_boolean().map(PartValue::Boolean),
            Accessor::BooleanArray => source.to_boolean_array().map(PartValue::list),
            Accessor::Integer => source.to_integer().map(PartValue::Integer),
            Accessor::IntegerArray => source.to_integer_array().map(PartValue::list),
            Accessor::Long => source.to_long().map(PartValue::Long),
            Accessor::LongArray => source.to_long_array().map(PartValue::list),
        }
    }

    /// Accessors able to produce the given target, in preference order.
    fn candidates(target: &TargetType) -> &'static [Accessor] {
        match target {
            TargetType::Bytes => &[Accessor::ByteArray],
            TargetType::Boolean => &[Accessor::Boolean],
            TargetType::Integer => &[Accessor::Integer, Accessor::Long],
            TargetType::Long | TargetType::Float | TargetType::Double => {
                &[Accessor::Long, Accessor::Integer]
            }
            TargetType::List(inner) => match inner.as_ref() {
                TargetType::Boolean => &[Accessor::BooleanArray, Accessor::StringArray],
                TargetType::Integer => &[
                    Accessor::IntegerArray,
                    Accessor::LongArray,
                    Accessor::StringArray,
                ],
                TargetType::Long => &[
                    Accessor::LongArray,
                    Accessor::IntegerArray,
                    Accessor::StringArray,
                ],
                TargetType::Any => &[
                    Accessor::StringArray,
                    Accessor::IntegerArray,
                    Accessor::LongArray,
                    Accessor::BooleanArray,
                ],
                _ => &[Accessor::StringArray],
            },
            _ => &[],
        }
    }
}

/// An application type that can take part in conversions.
///
/// Implementors list the capabilities they support in `accessors` and
/// override the matching `to_*` methods. `Display` is the string fallback.
pub trait PartConvertible: fmt::Debug + fmt::Display + Send + Sync {
    /// Stable name of the implementing type; conversion strategies are
    /// cached under this name.
    fn type_name(&self) -> &'static str;

    fn accessors(&self) -> &'static [Accessor] {
        &[]
    }

    fn to_byte_array(&self) -> Option<Vec<u8>> {
        None
    }

    fn to_string_array(&self) -> Option<Vec<String>> {
        None
    }

    fn to_boolean(&self) -> Option<bool> {
        None
    }

    fn to_boolean_array(&self) -> Option<Vec<bool>> {
        None
    }

    fn to_integer(&self) -> Option<i32> {
        None
    }

    fn to_integer_array(&self) -> Option<Vec<i32>> {
        None
    }

    fn to_long(&self) -> Option<i64> {
        None
    }

    fn to_long_array(&self) -> Option<Vec<i64>> {
        None
    }
}

/// How a value of one shape is coerced into a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStrategy {
    Identity,
    Numeric,
    Temporal,
    ParseString,
    Elements,
    Entries,
    Constructor,
    Accessor(Accessor),
    Stringify,
}

/// Single-argument constructor for a named target type.
pub type Constructor = Arc<dyn Fn(&PartValue) -> Result<PartValue, String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SourceKey {
    kind: ValueKind,
    type_name: Option<&'static str>,
}

impl SourceKey {
    fn of(value: &PartValue) -> Self {
        let type_name = match value {
            PartValue::Object(o) => Some(o.type_name()),
            _ => None,
        };
        Self {
            kind: value.kind(),
            type_name,
        }
    }
}

type CacheKey = (SourceKey, TargetType);

/// Builder for [`ConversionRegistry`].
#[derive(Default)]
pub struct ConversionRegistryBuilder {
    constructors: HashMap<(String, ValueKind), Constructor>,
}

impl ConversionRegistryBuilder {
    /// Register a constructor producing `target` from values of kind `source`.
    pub fn constructor<F>(mut self, target: impl Into<String>, source: ValueKind, f: F) -> Self
    where
        F: Fn(&PartValue) -> Result<PartValue, String> + Send + Sync + 'static,
    {
        self.constructors
            .insert((target.into(), source), Arc::new(f));
        self
    }

    pub fn build(self) -> ConversionRegistry {
        ConversionRegistry {
            constructors: self.constructors,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

/// Immutable set of conversion rules with an append-only strategy cache.
///
/// Share one instance across threads with `Arc`.
pub struct ConversionRegistry {
    constructors: HashMap<(String, ValueKind), Constructor>,
    cache: RwLock<HashMap<CacheKey, Option<ConversionStrategy>>>,
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));
        f.debug_struct("ConversionRegistry")
            .field("constructors", &names)
            .field("cached_strategies", &self.cached_strategies())
            .finish()
    }
}

impl ConversionRegistry {
    /// Registry with only the built-in rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ConversionRegistryBuilder {
        ConversionRegistryBuilder::default()
    }

    /// Number of (source, target) pairs resolved so far.
    pub fn cached_strategies(&self) -> usize {
        self.cache.read().len()
    }

    /// Coerce `value` into `target`.
    ///
    /// `Null` converts to `Null` for every target.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError` when no rule applies or the applicable rule
    /// rejects the value.
    pub fn resolve(
        &self,
        value: &PartValue,
        target: &TargetType,
    ) -> Result<PartValue, ConversionError> {
        if value.is_null() {
            return Ok(PartValue::Null);
        }
        match self.strategy(value, target) {
            Some(strategy) => self.apply(strategy, value, target),
            None => Err(no_rule(value, target)),
        }
    }

    /// Returns the (cached) strategy for converting `value` to `target`.
    pub fn strategy(&self, value: &PartValue, target: &TargetType) -> Option<ConversionStrategy> {
        let key = (SourceKey::of(value), target.clone());
        if let Some(found) = self.cache.read().get(&key) {
            return *found;
        }

        let strategy = self.discover(value, target);
        tracing::debug!(
            source = value.type_name(),
            %target,
            ?strategy,
            "discovered conversion strategy"
        );
        self.cache.write().insert(key, strategy);
        strategy
    }

    fn discover(&self, value: &PartValue, target: &TargetType) -> Option<ConversionStrategy> {
        use ConversionStrategy as S;
        use TargetType as T;

        // 1. already assignable
        let assignable = match (value, target) {
            (_, T::Any) => true,
            (PartValue::Boolean(_), T::Boolean)
            | (PartValue::Integer(_), T::Integer)
            | (PartValue::Long(_), T::Long)
            | (PartValue::Float(_), T::Float)
            | (PartValue::Double(_), T::Double)
            | (PartValue::String(_), T::String)
            | (PartValue::Bytes(_), T::Bytes)
            | (PartValue::Date(_), T::Date)
            | (PartValue::DateTime(_), T::DateTime) => true,
            (PartValue::Object(o), T::Named(name)) => o.type_name() == name.as_ref(),
            _ => false,
        };
        if assignable {
            return Some(S::Identity);
        }

        // 2. built-in coercions
        match (value, target) {
            (PartValue::List(_), T::List(_)) => return Some(S::Elements),
            (PartValue::Map(_), T::Map(_)) => return Some(S::Entries),
            (
                PartValue::Integer(_)
                | PartValue::Long(_)
                | PartValue::Float(_)
                | PartValue::Double(_),
                T::Integer | T::Long | T::Float | T::Double,
            ) => return Some(S::Numeric),
            (PartValue::Date(_), T::DateTime) | (PartValue::DateTime(_), T::Date) => {
                return Some(S::Temporal)
            }
            (
                PartValue::String(_),
                T::Boolean
                | T::Integer
                | T::Long
                | T::Float
                | T::Double
                | T::Bytes
                | T::Date
                | T::DateTime
                | T::List(_)
                | T::Map(_),
            ) => return Some(S::ParseString),
            _ => {}
        }

        // 3. registered constructor
        if let T::Named(name) = target {
            if self
                .constructors
                .contains_key(&(name.to_string(), value.kind()))
            {
                return Some(S::Constructor);
            }
        }

        // 4. accessor capability
        if let PartValue::Object(o) = value {
            let exposed = o.accessors();
            if let Some(a) = Accessor::candidates(target)
                .iter()
                .find(|a| exposed.contains(a))
            {
                return Some(S::Accessor(*a));
            }
        }

        // 5. string form
        if *target == T::String {
            return Some(S::Stringify);
        }

        None
    }

    fn apply(
        &self,
        strategy: ConversionStrategy,
        value: &PartValue,
        target: &TargetType,
    ) -> Result<PartValue, ConversionError> {
        match strategy {
            ConversionStrategy::Identity => Ok(value.clone()),
            ConversionStrategy::Numeric => convert_numeric(value, target),
            ConversionStrategy::Temporal => Ok(match value {
                PartValue::Date(d) => PartValue::DateTime(midnight_utc(*d)),
                PartValue::DateTime(dt) => PartValue::Date(dt.date_naive()),
                other => other.clone(),
            }),
            ConversionStrategy::ParseString => {
                let s = value.as_str().unwrap_or_default();
                self.parse_string(s, target)
            }
            ConversionStrategy::Elements => {
                let TargetType::List(inner) = target else {
                    return Err(no_rule(value, target));
                };
                let items = value.as_list().unwrap_or_default();
                items
                    .iter()
                    .map(|item| self.resolve(item, inner))
                    .collect::<Result<Vec<_>, _>>()
                    .map(PartValue::List)
            }
            ConversionStrategy::Entries => {
                let (TargetType::Map(inner), Some(map)) = (target, value.as_map()) else {
                    return Err(no_rule(value, target));
                };
                map.iter()
                    .map(|(k, v)| self.resolve(v, inner).map(|v| (k.clone(), v)))
                    .collect::<Result<_, _>>()
                    .map(PartValue::Map)
            }
            ConversionStrategy::Constructor => {
                let TargetType::Named(name) = target else {
                    return Err(no_rule(value, target));
                };
                let ctor = self
                    .constructors
                    .get(&(name.to_string(), value.kind()))
                    .ok_or_else(|| no_rule(value, target))?;
                ctor(value).map_err(|message| ConversionError::ConstructorFailed {
                    target: name.to_string(),
                    message,
                })
            }
            ConversionStrategy::Accessor(accessor) => {
                let PartValue::Object(o) = value else {
                    return Err(no_rule(value, target));
                };
                let produced = accessor
                    .invoke(o.as_ref())
                    .ok_or_else(|| no_rule(value, target))?;
                self.resolve(&produced, target)
            }
            ConversionStrategy::Stringify => Ok(PartValue::String(value.to_string())),
        }
    }

    fn parse_string(&self, s: &str, target: &TargetType) -> Result<PartValue, ConversionError> {
        let invalid = || ConversionError::InvalidLiteral {
            to: target.to_string(),
            input: s.to_string(),
        };
        match target {
            TargetType::Boolean => {
                if s.eq_ignore_ascii_case("true") {
                    Ok(PartValue::Boolean(true))
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(PartValue::Boolean(false))
                } else {
                    Err(invalid())
                }
            }
            TargetType::Integer => match s.trim().parse::<i32>() {
                Ok(n) => Ok(PartValue::Integer(n)),
                Err(_) if s.trim().parse::<i64>().is_ok() => Err(ConversionError::OutOfRange {
                    value: s.to_string(),
                    to: target.to_string(),
                }),
                Err(_) => Err(invalid()),
            },
            TargetType::Long => s
                .trim()
                .parse::<i64>()
                .map(PartValue::Long)
                .map_err(|_| invalid()),
            TargetType::Float => s
                .trim()
                .parse::<f32>()
                .map(PartValue::Float)
                .map_err(|_| invalid()),
            TargetType::Double => s
                .trim()
                .parse::<f64>()
                .map(PartValue::Double)
                .map_err(|_| invalid()),
            TargetType::Bytes => Ok(PartValue::Bytes(s.as_bytes().to_vec())),
            TargetType::Date => parse_date(s).map(PartValue::Date).ok_or_else(invalid),
            TargetType::DateTime => parse_date_time(s)
                .map(PartValue::DateTime)
                .ok_or_else(invalid),
            TargetType::List(_) => {
                let list = if s.starts_with("@(") {
                    uon::parse(s).map_err(|_| invalid())?.into_value()
                } else {
                    PartValue::List(vec![PartValue::String(s.to_string())])
                };
                self.resolve(&list, target)
            }
            TargetType::Map(_) => {
                if !s.starts_with('(') {
                    return Err(invalid());
                }
                let map = uon::parse(s).map_err(|_| invalid())?.into_value();
                self.resolve(&map, target)
            }
            _ => Err(invalid()),
        }
    }
}

fn no_rule(value: &PartValue, target: &TargetType) -> ConversionError {
    ConversionError::NoApplicableRule {
        from: value.type_name().to_string(),
        to: target.to_string(),
    }
}

fn convert_numeric(value: &PartValue, target: &TargetType) -> Result<PartValue, ConversionError> {
    let out_of_range = || ConversionError::OutOfRange {
        value: value.to_string(),
        to: target.to_string(),
    };
    let as_i64 = |v: &PartValue| -> Result<i64, ConversionError> {
        match v {
            PartValue::Integer(n) => Ok(i64::from(*n)),
            PartValue::Long(n) => Ok(*n),
            PartValue::Float(n) => float_to_i64(f64::from(*n)).ok_or_else(out_of_range),
            PartValue::Double(n) => float_to_i64(*n).ok_or_else(out_of_range),
            _ => Err(out_of_range()),
        }
    };
    let as_f64 = value.as_f64().ok_or_else(out_of_range)?;

    match target {
        TargetType::Integer => {
            let n = as_i64(value)?;
            i32::try_from(n)
                .map(PartValue::Integer)
                .map_err(|_| out_of_range())
        }
        TargetType::Long => as_i64(value).map(PartValue::Long),
        TargetType::Float => Ok(PartValue::Float(as_f64 as f32)),
        TargetType::Double => Ok(PartValue::Double(as_f64)),
        _ => Err(no_rule(value, target)),
    }
}

/// Truncates toward zero; `None` for non-finite or out-of-range values.
fn float_to_i64(n: f64) -> Option<i64> {
    if !n.is_finite() {
        return None;
    }
    let t = n.trunc();
    if t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return None;
    }
    Some(t as i64)
}

fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}

/// Parse an ISO-8601 calendar date, accepting a full timestamp as well.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(s).map(|dt| dt.date_naive()))
}

/// Parse an ISO-8601 timestamp. A missing offset is read as UTC and a bare
/// date as midnight UTC.
pub(crate) fn parse_date_time(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(midnight_utc)
}
