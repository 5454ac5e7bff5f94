//! # aggrbeam
//!
//! Provenance-aware aggregation of time-stamped, vector-valued measurements.
//!
//! A run reads measurements, hands them to one **aggregator** and writes the
//! resulting **aggregations**: grid-quantized points, hierarchical time buckets,
//! KMeans centroids, or combinations (sum, difference, average) of measurement
//! sets. Every derived measurement names the measurements it came from, and
//! every aggregation lists its sources and components, so the output forms a
//! lineage graph back to the raw input.
//!
//! ## Key Features
//!
//! - **Four strategies** behind one [`Aggregator`] trait, resolved by name through
//!   an [`AggregatorRegistry`](aggregators::AggregatorRegistry)
//! - **Two execution shapes**: local (rayon) and partitioned (contiguous
//!   partitions, combiners merged at a barrier); both give the same results
//! - **Dual-channel output**: bulk measurement data and metadata/provenance can go
//!   to different sinks ([`CompositeAggrWriter`](writer::CompositeAggrWriter))
//! - **I/O**: CSV and JSON Lines readers, CSV data and JSONL metadata writers,
//!   transparent gzip/zstd (all optional via feature flags)
//! - **Configuration** as dotted string keys, loadable from TOML
//!
//! ## Quick Start
//!
//! ```
//! use aggrbeam::aggregators::{Aggregator, KMeansAggregator};
//! use aggrbeam::metric::DistanceMetric;
//! use aggrbeam::testing::{TestContext, points, stream};
//!
//! # fn main() -> anyhow::Result<()> {
//! let t = TestContext::new()?;
//! let input = points(&t.ctx, &[[0.0, 0.0], [0.0, 1.0], [10.0, 10.0], [10.0, 11.0]]);
//!
//! let kmeans = KMeansAggregator::new(2, 5, DistanceMetric::Euclidean)?;
//! let results = kmeans.aggregate(&t.dataset, stream(input), &t.ctx)?;
//!
//! let centroids = &results[0].measurements;
//! assert_eq!(centroids.len(), 2);
//! assert_eq!(centroids[0].vector(), &[0.0, 0.5]);
//! assert_eq!(centroids[1].vector(), &[10.0, 10.5]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running a whole pass
//!
//! [`Execution`] wires reader, aggregator and writer from a [`Context`]:
//!
//! ```no_run
//! use aggrbeam::{Context, Execution, Parameters};
//!
//! # fn main() -> anyhow::Result<()> {
//! let params = Parameters::from_pairs([
//!     ("input", "rides.csv.gz"),
//!     ("output", "out"),
//!     ("grid.size", "0.001"),
//!     ("provenance", "true"),
//! ]);
//! let ctx = Context::new(params)?;
//! let summary = Execution::new("grid", &ctx)?.run(&ctx)?;
//! println!("{} aggregations written", summary.results);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | feature            | default | enables                          |
//! |--------------------|---------|----------------------------------|
//! | `io-csv`           | yes     | CSV reader and CSV data writer   |
//! | `io-jsonl`         | yes     | JSON Lines reader                |
//! | `compression-gzip` | yes     | `.gz` input and output           |
//! | `compression-zstd` | yes     | `.zst` input and output          |

pub mod aggregators;
pub mod combiners;
pub mod context;
pub mod error;
pub mod exec;
pub mod id;
pub mod io;
pub mod metric;
pub mod model;
pub mod params;
pub mod runner;
pub mod testing;
pub mod window;
pub mod writer;

// General re-exports
pub use aggregators::{Aggregator, AggregatorRegistry, MeasurementStream};
pub use combiners::{AverageF64, CombineFn, Sum, TimeSpan};
pub use context::{Context, PartitionedBackend};
pub use error::{AggrError, Result};
pub use exec::{Execution, RunSummary};
pub use id::{EntityId, IdFactory};
pub use metric::DistanceMetric;
pub use model::{Aggregation, AggregationKind, AggregationResult, Dataset, FieldValue, Measurement};
pub use params::Parameters;
pub use runner::{ExecMode, Runner};
pub use window::{TimestampMs, Window};
pub use writer::{AggrResultWriter, AggrWriter, CompositeAggrWriter, MemoryWriter};
