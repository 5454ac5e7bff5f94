//! Aggregation strategies.
//!
//! Every strategy implements [`Aggregator`]: it consumes a lazy stream of
//! measurements and returns the aggregations it built. Strategies never do I/O;
//! reading and writing belong to the driver.
//!
//! | name          | strategy                         | results per run          |
//! |---------------|----------------------------------|--------------------------|
//! | `grid`        | [`GridAggregator`]               | one                      |
//! | `time`        | [`TimeAggregator`]               | one per distinct window  |
//! | `kmeans`      | [`KMeansAggregator`]             | one                      |
//! | `combination` | [`CombinationAggregator`]        | one                      |
//!
//! Names are resolved through an [`AggregatorRegistry`] carried by the
//! [`Context`]; there is no global lookup table.

pub mod combination;
pub mod grid;
pub mod kmeans;
pub mod time;

pub use combination::{CombinationAggregator, CombinationKind};
pub use grid::GridAggregator;
pub use kmeans::{KMeansAggregator, KMeansInit};
pub use time::TimeAggregator;

use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::model::{AggregationResult, Dataset, Measurement, check_dimensions};
use std::collections::BTreeMap;

/// Lazy, single-pass sequence of measurements as produced by a reader.
pub type MeasurementStream<'a> = Box<dyn Iterator<Item = Result<Measurement>> + Send + 'a>;

pub trait Aggregator: Send + Sync {
    /// Registry name of this strategy.
    fn name(&self) -> &'static str;

    fn aggregate(
        &self,
        dataset: &Dataset,
        input: MeasurementStream<'_>,
        ctx: &Context,
    ) -> Result<Vec<AggregationResult>>;
}

/// Build an aggregator from the run's parameters.
pub type AggregatorFactory = fn(&Context) -> Result<Box<dyn Aggregator>>;

#[derive(Clone, Debug, Default)]
pub struct AggregatorRegistry {
    factories: BTreeMap<String, AggregatorFactory>,
}

impl AggregatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the four built-in strategies.
    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        reg.register("grid", grid::create);
        reg.register("time", time::create);
        reg.register("kmeans", kmeans::create);
        reg.register("combination", combination::create);
        reg
    }

    pub fn register(&mut self, name: impl Into<String>, factory: AggregatorFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the aggregator registered under `name`.
    ///
    /// # Errors
    /// [`AggrError::UnknownAggregator`] for an unregistered name, or whatever
    /// parameter validation the factory performs.
    pub fn create(&self, name: &str, ctx: &Context) -> Result<Box<dyn Aggregator>> {
        let factory = self
            .factories
            .get(name.trim())
            .ok_or_else(|| AggrError::UnknownAggregator {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })?;
        factory(ctx)
    }
}

/// Drain a stream into memory and check that all vectors share one dimension.
pub(crate) fn collect_input(input: MeasurementStream<'_>) -> Result<Vec<Measurement>> {
    let measurements = input.collect::<Result<Vec<_>>>()?;
    check_dimensions(&measurements)?;
    Ok(measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    #[test]
    fn unknown_name_lists_known_strategies() -> Result<()> {
        let ctx = Context::new(Parameters::new())?;
        match ctx.registry().create("hexbin", &ctx) {
            Err(AggrError::UnknownAggregator { name, known }) => {
                assert_eq!(name, "hexbin");
                assert_eq!(known, "combination, grid, kmeans, time");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(agg) => panic!("unexpected aggregator {}", agg.name()),
        }
        Ok(())
    }

    #[test]
    fn builtin_names_resolve() -> Result<()> {
        let ctx = Context::new(Parameters::new())?;
        for name in ["grid", "time", "kmeans"] {
            assert_eq!(ctx.registry().create(name, &ctx)?.name(), name);
        }
        Ok(())
    }
}
