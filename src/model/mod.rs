//! Provenance-aware data model.
//!
//! - [`Measurement`]: an input or derived data point (vector, fields, optional
//!   timestamp, parent ids).
//! - [`Dataset`]: the run-level container every aggregation is part of.
//! - [`Aggregation`] + [`AggregationKind`]: metadata of one transformation with its
//!   source and component links.
//! - [`AggregationResult`]: an aggregation together with its produced measurements.
//! - [`record`]: the serialized shapes handed to writers.

mod aggregation;
mod dataset;
mod measurement;
pub mod record;

pub use aggregation::{Aggregation, AggregationKind, AggregationResult};
pub use dataset::Dataset;
pub use measurement::{check_dimensions, FieldValue, Fields, Measurement};
pub use record::{AggregationRecord, MeasurementRecord, MetadataRecord};
