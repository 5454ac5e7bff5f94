//! One aggregation run: read, aggregate, write.
//!
//! [`Execution::run`] wires the collaborators from the context's parameters;
//! [`Execution::run_with`] takes them explicitly. Either way the steps are:
//!
//! 1. resolve the aggregator by name (unknown names fail before any I/O),
//! 2. build the run's [`Dataset`],
//! 3. read the input lazily and hand it to the aggregator,
//! 4. write every result in order,
//! 5. write the dataset once, only if at least one result was produced,
//! 6. finish the writer.
//!
//! The first error stops the run. File outputs are only created once the
//! aggregator has returned, so a failed read leaves earlier outputs in place.

use crate::aggregators::Aggregator;
use crate::context::Context;
use crate::error::Result;
use crate::io::{AggrReader, reader_for};
use crate::model::{AggregationResult, Dataset};
use crate::params::{DATASET_ID_PARAM, DATASET_TITLE_PARAM, INPUT_PARAM};
use crate::writer::{AggrResultWriter, CompositeAggrWriter};
use std::time::Instant;
use tracing::info;

pub const DEFAULT_DATASET_ID: &str = "aggr";

/// What a finished run produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub aggregator: String,
    pub dataset: String,
    pub results: usize,
    pub measurements: usize,
    pub dataset_written: bool,
}

pub struct Execution {
    aggregator: Box<dyn Aggregator>,
    dataset: Dataset,
}

impl Execution {
    /// Resolve `aggregator` against the context's registry and build the dataset.
    pub fn new(aggregator: &str, ctx: &Context) -> Result<Self> {
        let aggregator = ctx.registry().create(aggregator, ctx)?;
        let params = ctx.params();
        let id = params.get(DATASET_ID_PARAM).unwrap_or(DEFAULT_DATASET_ID);
        let dataset = Dataset::new(id, params.get(DATASET_TITLE_PARAM).unwrap_or(id))?;
        Ok(Self {
            aggregator,
            dataset,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Run with the reader picked from `input` and the file writer from `output`.
    pub fn run(&self, ctx: &Context) -> Result<RunSummary> {
        let location = ctx.params().require(INPUT_PARAM)?.to_string();
        let reader = reader_for(&location)?;
        let started = Instant::now();
        let results = self.aggregate_input(reader.as_ref(), &location, ctx)?;
        let mut writer = CompositeAggrWriter::from_context(ctx)?;
        self.write_results(&results, &mut writer, ctx, started)
    }

    pub fn run_with(
        &self,
        reader: &dyn AggrReader,
        location: &str,
        writer: &mut dyn AggrResultWriter,
        ctx: &Context,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let results = self.aggregate_input(reader, location, ctx)?;
        self.write_results(&results, writer, ctx, started)
    }

    fn aggregate_input(
        &self,
        reader: &dyn AggrReader,
        location: &str,
        ctx: &Context,
    ) -> Result<Vec<AggregationResult>> {
        info!(
            aggregator = self.aggregator.name(),
            dataset = self.dataset.id(),
            input = location,
            partitioned = ctx.runner().is_partitioned(),
            "starting aggregation run"
        );

        let input = reader.read(location, ctx)?;
        self.aggregator.aggregate(&self.dataset, input, ctx)
    }

    fn write_results(
        &self,
        results: &[AggregationResult],
        writer: &mut dyn AggrResultWriter,
        ctx: &Context,
        started: Instant,
    ) -> Result<RunSummary> {
        let mut measurements = 0;
        for result in results {
            writer.write_result(result, ctx)?;
            measurements += result.measurements.len();
            info!(
                aggregation = %result.aggregation.id(),
                kind = result.aggregation.kind().type_tag(),
                measurements = result.measurements.len(),
                "wrote aggregation"
            );
        }

        let dataset_written = !results.is_empty();
        if dataset_written {
            writer.write_dataset(&self.dataset, ctx)?;
            info!(dataset = self.dataset.id(), "wrote dataset");
        }
        writer.finish()?;

        info!(
            results = results.len(),
            measurements,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregation run finished"
        );
        Ok(RunSummary {
            aggregator: self.aggregator.name().to_string(),
            dataset: self.dataset.id().to_string(),
            results: results.len(),
            measurements,
            dataset_written,
        })
    }
}
