//! Run-scoped state handed to readers, aggregators and writers.
//!
//! A [`Context`] bundles:
//! - the [`Parameters`] of the run,
//! - the [`IdFactory`] every new measurement and aggregation draws from,
//! - the optional [`PartitionedBackend`] capability (absent means local execution),
//! - the [`AggregatorRegistry`] the driver resolves aggregator names against.
//!
//! The [`Runner`] is built once from the backend flag; aggregators only ever ask
//! for `ctx.runner()` and never care which shape they run on.

use crate::aggregators::AggregatorRegistry;
use crate::error::Result;
use crate::id::{EntityId, IdFactory};
use crate::model::{Aggregation, AggregationKind, Dataset, Measurement};
use crate::params::{OUTPUT_PARAM, PARTITIONS_PARAM, PROVENANCE_PARAM, Parameters, THREADS_PARAM};
use crate::runner::{ExecMode, Runner};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const DEFAULT_OUTPUT: &str = "aggr-out";

/// Capability flag for partitioned execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionedBackend {
    /// Number of contiguous partitions; `None` picks a default from the CPU count.
    pub partitions: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Context {
    params: Parameters,
    ids: Arc<IdFactory>,
    backend: Option<PartitionedBackend>,
    threads: Option<usize>,
    registry: Arc<AggregatorRegistry>,
    runner: Runner,
    provenance: bool,
}

impl Context {
    /// Build a context from parameters.
    ///
    /// `exec.partitions` turns on the partitioned backend, `exec.threads` pins
    /// the worker count, `provenance` toggles lineage in written records.
    pub fn new(params: Parameters) -> Result<Self> {
        let backend = params
            .get_parsed::<usize>(PARTITIONS_PARAM)?
            .map(|n| PartitionedBackend { partitions: Some(n) });
        let threads = params.get_parsed::<usize>(THREADS_PARAM)?;
        let provenance = params.get_bool(PROVENANCE_PARAM, false)?;
        let runner = Runner::new(exec_mode(backend, threads))?;
        Ok(Self {
            params,
            ids: Arc::new(IdFactory::new()),
            backend,
            threads,
            registry: Arc::new(AggregatorRegistry::builtin()),
            runner,
            provenance,
        })
    }

    /// Replace the execution backend; `None` falls back to local execution.
    pub fn with_backend(mut self, backend: Option<PartitionedBackend>) -> Result<Self> {
        self.runner = Runner::new(exec_mode(backend, self.threads))?;
        self.backend = backend;
        Ok(self)
    }

    pub fn with_registry(mut self, registry: AggregatorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Share an id factory with another context, so both draw from one sequence.
    pub fn with_ids(mut self, ids: Arc<IdFactory>) -> Self {
        self.ids = ids;
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn ids(&self) -> &Arc<IdFactory> {
        &self.ids
    }

    pub fn backend(&self) -> Option<&PartitionedBackend> {
        self.backend.as_ref()
    }

    pub fn registry(&self) -> &AggregatorRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn write_provenance(&self) -> bool {
        self.provenance
    }

    pub fn output_root(&self) -> &str {
        self.params.get(OUTPUT_PARAM).unwrap_or(DEFAULT_OUTPUT)
    }

    /// Data-channel locator for the measurements of aggregation `id`.
    pub fn data_path_for(&self, dataset: &Dataset, id: EntityId) -> String {
        format!("{}/{}/{}.csv", self.output_root(), dataset.id(), id)
    }

    /// A fresh source measurement.
    pub fn new_measurement(&self, vector: Vec<f64>) -> Measurement {
        Measurement::new(self.ids.next_id(), vector)
    }

    /// A fresh measurement derived from `parents`.
    pub fn derive_measurement(
        &self,
        vector: Vec<f64>,
        parents: impl IntoIterator<Item = EntityId>,
    ) -> Result<Measurement> {
        Measurement::derive(self.ids.next_id(), vector, parents)
    }

    /// Allocate an aggregation over already-built `components`.
    pub fn new_aggregation(
        &self,
        dataset: &Dataset,
        kind: AggregationKind,
        sources: BTreeSet<EntityId>,
        components: &[Measurement],
    ) -> Aggregation {
        let id = self.ids.next_id();
        Aggregation::new(
            id,
            dataset,
            chrono::Utc::now().timestamp_millis(),
            self.data_path_for(dataset, id),
            kind,
            sources,
            components,
        )
    }
}

fn exec_mode(backend: Option<PartitionedBackend>, threads: Option<usize>) -> ExecMode {
    match backend {
        Some(b) => ExecMode::Partitioned {
            partitions: b.partitions,
            threads,
        },
        None => ExecMode::Local { threads },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_param_enables_backend() -> Result<()> {
        let ctx = Context::new(Parameters::from_pairs([("exec.partitions", "3")]))?;
        assert_eq!(ctx.backend(), Some(&PartitionedBackend { partitions: Some(3) }));
        assert!(ctx.runner().is_partitioned());

        let ctx = ctx.with_backend(None)?;
        assert!(!ctx.runner().is_partitioned());
        Ok(())
    }

    #[test]
    fn data_path_uses_output_root() -> Result<()> {
        let ctx = Context::new(Parameters::from_pairs([("output", "/tmp/run")]))?;
        let ds = Dataset::new("rides", "")?;
        let agg = ctx.new_aggregation(
            &ds,
            AggregationKind::Grid { grid_size: 1.0 },
            BTreeSet::new(),
            &[],
        );
        assert_eq!(agg.data_path(), format!("/tmp/run/rides/{}.csv", agg.id()));
        Ok(())
    }

    #[test]
    fn derived_measurements_are_younger_than_parents() -> Result<()> {
        let ctx = Context::new(Parameters::new())?;
        let parent = ctx.new_measurement(vec![1.0]);
        let child = ctx.derive_measurement(vec![1.0], [parent.id()])?;
        assert!(child.id() > parent.id());
        Ok(())
    }
}
