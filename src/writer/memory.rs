use super::AggrWriter;
use crate::context::Context;
use crate::error::Result;
use crate::model::{
    Aggregation, AggregationRecord, Dataset, Measurement, MeasurementRecord,
};
use std::sync::{Arc, Mutex, PoisonError};

/// Everything a [`MemoryWriter`] received, as serialized records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Captured {
    /// `(location, record)` pairs in write order.
    pub measurements: Vec<(String, MeasurementRecord)>,
    pub aggregations: Vec<AggregationRecord>,
    pub datasets: Vec<Dataset>,
    pub flushes: usize,
}

impl Captured {
    /// Measurements written to `location`.
    pub fn measurements_at(&self, location: &str) -> Vec<&MeasurementRecord> {
        self.measurements
            .iter()
            .filter(|(loc, _)| loc == location)
            .map(|(_, r)| r)
            .collect()
    }
}

/// In-memory sink; clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemoryWriter {
    inner: Arc<Mutex<Captured>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Captured {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Captured) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl AggrWriter for MemoryWriter {
    fn write_measurement(&mut self, location: &str, m: &Measurement, ctx: &Context) -> Result<()> {
        let record = MeasurementRecord::new(m, ctx.write_provenance());
        self.with(|c| c.measurements.push((location.to_string(), record)));
        Ok(())
    }

    fn write_aggregation(&mut self, aggregation: &Aggregation, ctx: &Context) -> Result<()> {
        let record = AggregationRecord::new(aggregation, ctx.write_provenance());
        self.with(|c| c.aggregations.push(record));
        Ok(())
    }

    fn write_dataset(&mut self, dataset: &Dataset, _ctx: &Context) -> Result<()> {
        self.with(|c| c.datasets.push(dataset.clone()));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.with(|c| c.flushes += 1);
        Ok(())
    }
}
