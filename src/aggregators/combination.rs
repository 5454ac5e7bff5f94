//! Combination of measurement sets that describe the same points.
//!
//! Inputs are grouped by source (a text field naming the set they came from)
//! and matched across groups by an identity: the value of a match field, or the
//! vector itself. For each identity one child is produced whose `key` field is
//! the sum, difference or mean of the matched values.

use super::{Aggregator, MeasurementStream, collect_input};
use crate::combiners::{AverageF64, Sum, fold_all};
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::id::EntityId;
use crate::model::{AggregationKind, AggregationResult, Dataset, Measurement};
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const TYPE_PARAM: &str = "combination.type";
pub const KEY_PARAM: &str = "combination.key";
pub const PRIMARY_PARAM: &str = "combination.primary";
pub const OTHERS_PARAM: &str = "combination.others";
pub const AMOUNT_PARAM: &str = "combination.amount";
pub const SOURCE_FIELD_PARAM: &str = "combination.source_field";
pub const MATCH_FIELD_PARAM: &str = "combination.match_field";

pub const DEFAULT_KEY: &str = "value";
pub const DEFAULT_SOURCE_FIELD: &str = "source";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CombinationKind {
    Sum,
    #[default]
    Difference,
    Average,
}

impl FromStr for CombinationKind {
    type Err = AggrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" | "basic" => Ok(Self::Sum),
            "difference" | "diff" => Ok(Self::Difference),
            "average" | "avg" => Ok(Self::Average),
            other => Err(AggrError::config(
                TYPE_PARAM,
                format!("unknown combination `{other}` (expected sum, difference or average)"),
            )),
        }
    }
}

/// What makes two measurements from different sources "the same point".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum IdentityKey {
    Field(String),
    Vector(Vec<OrderedFloat<f64>>),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(v) => write!(f, "identity `{v}`"),
            Self::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.0.to_string()).collect();
                write!(f, "vector [{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinationAggregator {
    kind: CombinationKind,
    key: String,
    primary: String,
    others: Vec<String>,
    amount: usize,
    source_field: String,
    match_field: Option<String>,
}

pub(super) fn create(ctx: &Context) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(CombinationAggregator::from_context(ctx)?))
}

impl CombinationAggregator {
    /// # Errors
    /// [`AggrError::Config`] if a difference does not have exactly one subtrahend.
    pub fn new(
        kind: CombinationKind,
        primary: impl Into<String>,
        others: Vec<String>,
    ) -> Result<Self> {
        if kind == CombinationKind::Difference && others.len() != 1 {
            return Err(AggrError::config(
                OTHERS_PARAM,
                format!("a difference needs exactly one other source, got {}", others.len()),
            ));
        }
        Ok(Self {
            kind,
            key: DEFAULT_KEY.to_string(),
            primary: primary.into(),
            amount: 1 + others.len(),
            others,
            source_field: DEFAULT_SOURCE_FIELD.to_string(),
            match_field: None,
        })
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Declare how many values each identity must have.
    ///
    /// # Errors
    /// [`AggrError::CardinalityMismatch`] if `amount` differs from the number of
    /// sources (primary plus others).
    pub fn with_amount(mut self, amount: usize) -> Result<Self> {
        let sources = 1 + self.others.len();
        if amount != sources {
            return Err(AggrError::CardinalityMismatch {
                identity: AMOUNT_PARAM.to_string(),
                expected: sources,
                actual: amount,
            });
        }
        self.amount = amount;
        Ok(self)
    }

    pub fn with_source_field(mut self, field: impl Into<String>) -> Self {
        self.source_field = field.into();
        self
    }

    pub fn with_match_field(mut self, field: Option<String>) -> Self {
        self.match_field = field;
        self
    }

    pub fn from_context(ctx: &Context) -> Result<Self> {
        let params = ctx.params();
        let kind = params
            .get_parsed::<CombinationKind>(TYPE_PARAM)?
            .unwrap_or_default();
        let mut agg = Self::new(kind, params.require(PRIMARY_PARAM)?, params.get_list(OTHERS_PARAM))?
            .with_key(params.get(KEY_PARAM).unwrap_or(DEFAULT_KEY))
            .with_source_field(params.get(SOURCE_FIELD_PARAM).unwrap_or(DEFAULT_SOURCE_FIELD))
            .with_match_field(params.get(MATCH_FIELD_PARAM).map(str::to_string));
        if let Some(amount) = params.get_parsed::<usize>(AMOUNT_PARAM)? {
            agg = agg.with_amount(amount)?;
        }
        Ok(agg)
    }

    pub fn kind(&self) -> CombinationKind {
        self.kind
    }

    fn sources(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.others.iter().map(String::as_str))
    }

    fn identity(&self, m: &Measurement) -> Result<IdentityKey> {
        match &self.match_field {
            Some(field) => m
                .field(field)
                .map(|v| IdentityKey::Field(v.to_string()))
                .ok_or_else(|| AggrError::MissingField {
                    id: m.id(),
                    field: field.clone(),
                }),
            None => Ok(IdentityKey::Vector(
                m.vector().iter().copied().map(OrderedFloat).collect(),
            )),
        }
    }

    fn aggregation_kind(&self) -> AggregationKind {
        match self.kind {
            CombinationKind::Sum => AggregationKind::Basic {
                key: self.key.clone(),
            },
            CombinationKind::Difference => AggregationKind::Diff {
                key: self.key.clone(),
                subtrahend: self.others.first().cloned().unwrap_or_default(),
            },
            CombinationKind::Average => AggregationKind::Average {
                key: self.key.clone(),
                amount: self.amount,
                others: self.others.clone(),
            },
        }
    }

    /// Match inputs across sources. Each row holds one slot per source, in
    /// source order; rows follow the first appearance of their identity.
    fn match_rows<'m>(
        &self,
        inputs: &'m [Measurement],
    ) -> Result<Vec<(IdentityKey, Vec<Option<&'m Measurement>>)>> {
        let sources: Vec<&str> = self.sources().collect();
        let mut rows: Vec<(IdentityKey, Vec<Option<&Measurement>>)> = Vec::new();
        let mut row_of: HashMap<IdentityKey, usize> = HashMap::new();
        let mut seen_sources = vec![false; sources.len()];
        let mut ignored = 0usize;

        for m in inputs {
            let slot = m
                .field(&self.source_field)
                .map(ToString::to_string)
                .and_then(|s| sources.iter().position(|name| *name == s));
            let Some(slot) = slot else {
                ignored += 1;
                continue;
            };
            seen_sources[slot] = true;

            let identity = self.identity(m)?;
            let row = *row_of.entry(identity.clone()).or_insert_with(|| {
                rows.push((identity.clone(), vec![None; sources.len()]));
                rows.len() - 1
            });
            let cell = &mut rows[row].1[slot];
            if cell.is_some() {
                return Err(AggrError::CardinalityMismatch {
                    identity: format!("{identity} in source `{}`", sources[slot]),
                    expected: 1,
                    actual: 2,
                });
            }
            *cell = Some(m);
        }

        if let Some(missing) = seen_sources.iter().position(|seen| !seen) {
            return Err(AggrError::CardinalityMismatch {
                identity: format!("source `{}`", sources[missing]),
                expected: 1,
                actual: 0,
            });
        }
        debug!(rows = rows.len(), ignored, "matched combination inputs");
        Ok(rows)
    }

    fn check_row(&self, identity: &IdentityKey, row: &[Option<&Measurement>]) -> Result<()> {
        let present = row.iter().flatten().count();
        let expected = match self.kind {
            CombinationKind::Sum => return Ok(()),
            CombinationKind::Difference => 2,
            CombinationKind::Average => self.amount,
        };
        if present != expected {
            return Err(AggrError::CardinalityMismatch {
                identity: identity.to_string(),
                expected,
                actual: present,
            });
        }
        Ok(())
    }

    fn combine_values(&self, row: &[Option<&Measurement>]) -> Result<f64> {
        let values = row
            .iter()
            .flatten()
            .map(|m| m.numeric_field(&self.key))
            .collect::<Result<Vec<f64>>>()?;
        Ok(match self.kind {
            CombinationKind::Sum => fold_all(&Sum, &values),
            CombinationKind::Average => fold_all(&AverageF64, &values),
            CombinationKind::Difference => values[0] - values[1],
        })
    }
}

impl Aggregator for CombinationAggregator {
    fn name(&self) -> &'static str {
        "combination"
    }

    fn aggregate(
        &self,
        dataset: &Dataset,
        input: MeasurementStream<'_>,
        ctx: &Context,
    ) -> Result<Vec<AggregationResult>> {
        let inputs = collect_input(input)?;
        let rows = self.match_rows(&inputs)?;
        for (identity, row) in &rows {
            self.check_row(identity, row)?;
        }
        let values = ctx.runner().map(&rows, |(_, row)| self.combine_values(row))?;

        let mut sources: BTreeSet<EntityId> = BTreeSet::new();
        let mut children = Vec::with_capacity(rows.len());
        for ((_, row), value) in rows.iter().zip(values) {
            let contributors: Vec<&Measurement> = row.iter().flatten().copied().collect();
            // primary when present, otherwise the first source that has the identity
            let Some(template) = contributors.first() else {
                continue;
            };
            sources.extend(contributors.iter().map(|m| m.id()));
            children.push(
                ctx.derive_measurement(
                    template.vector().to_vec(),
                    contributors.iter().map(|m| m.id()),
                )?
                .with_fields(template.fields().clone())
                .with_field(self.key.clone(), value)
                .with_timestamp(template.timestamp()),
            );
        }

        let aggregation = ctx.new_aggregation(dataset, self.aggregation_kind(), sources, &children);
        Ok(vec![AggregationResult::new(aggregation, children)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_needs_one_subtrahend() {
        assert!(CombinationAggregator::new(CombinationKind::Difference, "a", vec![]).is_err());
        assert!(
            CombinationAggregator::new(CombinationKind::Difference, "a", vec!["b".into(), "c".into()])
                .is_err()
        );
    }

    #[test]
    fn declared_amount_must_match_sources() -> Result<()> {
        let agg = CombinationAggregator::new(CombinationKind::Average, "a", vec!["b".into()])?;
        match agg.with_amount(3) {
            Err(AggrError::CardinalityMismatch { expected, actual, .. }) => {
                assert_eq!((expected, actual), (2, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn kind_parses_aliases() -> Result<()> {
        assert_eq!("Average".parse::<CombinationKind>()?, CombinationKind::Average);
        assert_eq!("diff".parse::<CombinationKind>()?, CombinationKind::Difference);
        assert_eq!("sum".parse::<CombinationKind>()?, CombinationKind::Sum);
        assert!("median".parse::<CombinationKind>().is_err());
        Ok(())
    }
}
