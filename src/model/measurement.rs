use crate::error::{AggrError, Result};
use crate::id::EntityId;
use crate::window::TimestampMs;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Typed value stored in a measurement's field map.
///
/// Timestamps serialize as RFC 3339 strings and are recognised again on read,
/// so variant order matters for the untagged representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    /// Interpret raw text the way the readers do: integer, then float, then
    /// boolean, then RFC 3339 timestamp, falling back to text.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Self::Float(f);
        }
        match s {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Self::Timestamp(t.with_timezone(&Utc)),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(_) | Self::Timestamp(_) | Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Timestamp(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Field map of a measurement; ordered so output is stable.
pub type Fields = BTreeMap<String, FieldValue>;

/// One input or derived data point.
///
/// A measurement is a value object: once constructed it is never changed, only
/// copied into new, derived measurements. Its parent set holds the ids of the
/// entities it was derived from; these are lookups, not ownership.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    id: EntityId,
    vector: Vec<f64>,
    fields: Fields,
    timestamp: Option<TimestampMs>,
    parents: BTreeSet<EntityId>,
}

impl Measurement {
    /// A source measurement (no parents).
    pub fn new(id: EntityId, vector: Vec<f64>) -> Self {
        Self {
            id,
            vector,
            fields: Fields::new(),
            timestamp: None,
            parents: BTreeSet::new(),
        }
    }

    /// A measurement derived from `parents`.
    ///
    /// # Errors
    /// [`AggrError::Lineage`] if any parent id is not strictly older than `id`.
    pub fn derive(
        id: EntityId,
        vector: Vec<f64>,
        parents: impl IntoIterator<Item = EntityId>,
    ) -> Result<Self> {
        let parents: BTreeSet<EntityId> = parents.into_iter().collect();
        if let Some(&parent) = parents.iter().find(|p| **p >= id) {
            return Err(AggrError::Lineage { child: id, parent });
        }
        Ok(Self {
            parents,
            ..Self::new(id, vector)
        })
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<Option<TimestampMs>>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn vector(&self) -> &[f64] {
        &self.vector
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Numeric value of field `name`.
    ///
    /// # Errors
    /// [`AggrError::MissingField`] if the field is absent or not numeric.
    pub fn numeric_field(&self, name: &str) -> Result<f64> {
        self.field(name)
            .and_then(FieldValue::as_f64)
            .ok_or_else(|| AggrError::MissingField {
                id: self.id,
                field: name.to_string(),
            })
    }

    pub fn timestamp(&self) -> Option<TimestampMs> {
        self.timestamp
    }

    pub fn parents(&self) -> &BTreeSet<EntityId> {
        &self.parents
    }
}

/// Check that every measurement has the same vector length as the first one.
///
/// Returns the common dimension (`0` for an empty slice).
pub fn check_dimensions(measurements: &[Measurement]) -> Result<usize> {
    let Some(first) = measurements.first() else {
        return Ok(0);
    };
    let expected = first.dimension();
    match measurements.iter().find(|m| m.dimension() != expected) {
        Some(m) => Err(AggrError::DimensionMismatch {
            id: m.id(),
            expected,
            actual: m.dimension(),
        }),
        None => Ok(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_rejects_younger_parent() {
        let err = Measurement::derive(EntityId::new(3), vec![0.0], [EntityId::new(5)]).unwrap_err();
        assert!(matches!(err, AggrError::Lineage { .. }));
    }

    #[test]
    fn derive_rejects_self_parent() {
        let id = EntityId::new(3);
        assert!(Measurement::derive(id, vec![0.0], [id]).is_err());
    }

    #[test]
    fn field_value_parse_prefers_numbers() {
        assert_eq!(FieldValue::parse("42"), FieldValue::Int(42));
        assert_eq!(FieldValue::parse("4.5"), FieldValue::Float(4.5));
        assert_eq!(FieldValue::parse("true"), FieldValue::Bool(true));
        assert_eq!(FieldValue::parse("gent"), FieldValue::Text("gent".into()));
    }

    #[test]
    fn timestamp_fields_survive_text_and_json() {
        let ended = FieldValue::parse("2017-07-14T04:40:00+02:00");
        let FieldValue::Timestamp(t) = &ended else {
            panic!("expected a timestamp, got {ended:?}");
        };
        assert_eq!(t.timestamp_millis(), 1_500_000_000_000);
        assert_eq!(ended.to_string(), "2017-07-14T02:40:00.000Z");
        assert_eq!(FieldValue::parse(&ended.to_string()), ended);
        assert_eq!(ended.as_f64(), None);

        let json = serde_json::to_string(&ended).unwrap();
        assert_eq!(serde_json::from_str::<FieldValue>(&json).unwrap(), ended);
        // plain strings stay text
        let text: FieldValue = serde_json::from_str("\"hub-1\"").unwrap();
        assert_eq!(text, FieldValue::Text("hub-1".into()));
    }

    #[test]
    fn check_dimensions_reports_offender() {
        let ms = vec![
            Measurement::new(EntityId::new(1), vec![1.0, 2.0]),
            Measurement::new(EntityId::new(2), vec![1.0]),
        ];
        match check_dimensions(&ms) {
            Err(AggrError::DimensionMismatch { id, expected, actual }) => {
                assert_eq!(id.raw(), 2);
                assert_eq!((expected, actual), (2, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
