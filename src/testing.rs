//! Testing utilities for aggregation runs.
//!
//! - **Assertions**: compare vectors with a tolerance, compare collections, and
//!   check that an [`AggregationResult`](crate::model::AggregationResult) has
//!   consistent provenance links.
//! - **Fixtures**: small measurement sets built through a [`Context`], so their
//!   ids come from the run's factory and lineage checks hold.
//! - [`TestContext`]: a context plus a [`MemoryWriter`](crate::writer::MemoryWriter)
//!   for end-to-end runs without files.
//!
//! # Quick Start
//!
//! ```
//! use aggrbeam::aggregators::{Aggregator, GridAggregator};
//! use aggrbeam::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let t = TestContext::new()?;
//! let input = points(&t.ctx, &[[12.0, 7.0]]);
//! let results = GridAggregator::new(5.0)?.aggregate(&t.dataset, stream(input), &t.ctx)?;
//!
//! assert_vectors_close(results[0].measurements[0].vector(), &[10.0, 5.0], 1e-9);
//! assert_provenance_consistent(&results[0]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

use crate::context::Context;
use crate::error::Result;
use crate::model::Dataset;
use crate::params::Parameters;
use crate::runner::ExecMode;
use crate::writer::MemoryWriter;

/// A context, a dataset and an in-memory writer for one test run.
#[derive(Clone, Debug)]
pub struct TestContext {
    pub ctx: Context,
    pub dataset: Dataset,
    pub writer: MemoryWriter,
}

impl TestContext {
    pub fn new() -> Result<Self> {
        Self::with_params(Parameters::new())
    }

    pub fn with_params(params: Parameters) -> Result<Self> {
        Ok(Self {
            ctx: Context::new(params)?,
            dataset: Dataset::new("test", "Test dataset")?,
            writer: MemoryWriter::new(),
        })
    }

    /// Both execution shapes over the same parameters, for equivalence checks.
    ///
    /// The two contexts share one id factory so inputs built through either can
    /// be aggregated by both.
    pub fn local_and_partitioned(params: Parameters, partitions: usize) -> Result<(Self, Self)> {
        let local = Self::with_params(params.clone())?;
        let mut parted = Self::with_params(params.with("exec.partitions", partitions))?;
        parted.ctx = parted.ctx.with_ids(local.ctx.ids().clone());
        debug_assert!(matches!(
            parted.ctx.runner().mode,
            ExecMode::Partitioned { .. }
        ));
        Ok((local, parted))
    }
}
