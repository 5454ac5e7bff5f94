//! Result writers.
//!
//! Two layers:
//! - [`AggrWriter`]: raw primitives (`write_measurement(s)`, `write_aggregation`,
//!   `write_dataset`) implemented by concrete sinks.
//! - [`AggrResultWriter`]: what the driver talks to. It persists whole
//!   [`AggregationResult`]s and the run's [`Dataset`].
//!
//! [`CompositeAggrWriter`] bridges the two: bulk measurement data goes to the
//! data channel, aggregation metadata to the metadata channel. Both channels may
//! be one sink.
//!
//! Whether parent, source and component links are written is decided by
//! [`Context::write_provenance`]; sinks serialize through the
//! [`record`](crate::model::record) types, which apply that toggle.
//!
//! Writers are called from the driver thread only.

mod composite;
#[cfg(feature = "io-csv")]
mod csv;
mod jsonl;
mod memory;

pub use composite::{Channels, CompositeAggrWriter};
#[cfg(feature = "io-csv")]
pub use self::csv::CsvDataWriter;
pub use jsonl::JsonlMetaWriter;
pub use memory::{Captured, MemoryWriter};

use crate::context::Context;
use crate::error::Result;
use crate::model::{Aggregation, AggregationResult, Dataset, Measurement};

pub const METADATA_PARAM: &str = "output.metadata";
pub const DATA_CSV_PARAM: &str = "output.data_csv";

pub trait AggrWriter: Send {
    /// Append one measurement to the sink at `location`.
    fn write_measurement(&mut self, location: &str, m: &Measurement, ctx: &Context) -> Result<()>;

    fn write_measurements(
        &mut self,
        location: &str,
        measurements: &[Measurement],
        ctx: &Context,
    ) -> Result<()> {
        for m in measurements {
            self.write_measurement(location, m, ctx)?;
        }
        Ok(())
    }

    fn write_aggregation(&mut self, aggregation: &Aggregation, ctx: &Context) -> Result<()>;

    fn write_dataset(&mut self, dataset: &Dataset, ctx: &Context) -> Result<()>;

    /// Flush and close everything written so far.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub trait AggrResultWriter {
    fn write_result(&mut self, result: &AggregationResult, ctx: &Context) -> Result<()>;

    fn write_dataset(&mut self, dataset: &Dataset, ctx: &Context) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}
