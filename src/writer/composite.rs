use super::{AggrResultWriter, AggrWriter, DATA_CSV_PARAM, JsonlMetaWriter, METADATA_PARAM};
use crate::context::Context;
use crate::error::Result;
use crate::model::{AggregationResult, Dataset};
use tracing::debug;

/// Where the two output channels go.
pub enum Channels {
    /// Data and metadata share one sink.
    Shared(Box<dyn AggrWriter>),
    Split {
        data: Box<dyn AggrWriter>,
        meta: Box<dyn AggrWriter>,
    },
}

pub struct CompositeAggrWriter {
    channels: Channels,
}

impl CompositeAggrWriter {
    pub fn new(channels: Channels) -> Self {
        Self { channels }
    }

    pub fn shared(writer: impl AggrWriter + 'static) -> Self {
        Self::new(Channels::Shared(Box::new(writer)))
    }

    pub fn split(data: impl AggrWriter + 'static, meta: impl AggrWriter + 'static) -> Self {
        Self::new(Channels::Split {
            data: Box::new(data),
            meta: Box::new(meta),
        })
    }

    /// File-backed writer configured from the run's parameters.
    ///
    /// Metadata goes to `output.metadata` (default `<output>/metadata.jsonl`).
    /// With `output.data_csv` on (the default, needs feature `io-csv`) measurement
    /// data is written as one CSV per aggregation; otherwise both channels share
    /// the metadata file.
    pub fn from_context(ctx: &Context) -> Result<Self> {
        let meta_location = ctx
            .params()
            .get(METADATA_PARAM)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/metadata.jsonl", ctx.output_root()));
        let meta = JsonlMetaWriter::create(&meta_location)?;
        let data_csv = ctx.params().get_bool(DATA_CSV_PARAM, cfg!(feature = "io-csv"))?;
        debug!(metadata = %meta_location, data_csv, "opening writers");

        #[cfg(feature = "io-csv")]
        if data_csv {
            return Ok(Self::split(super::CsvDataWriter::new(), meta));
        }
        #[cfg(not(feature = "io-csv"))]
        if data_csv {
            return Err(crate::error::AggrError::config(
                DATA_CSV_PARAM,
                "CSV output needs the `io-csv` feature",
            ));
        }
        Ok(Self::shared(meta))
    }

    fn data(&mut self) -> &mut dyn AggrWriter {
        match &mut self.channels {
            Channels::Shared(w) => w.as_mut(),
            Channels::Split { data, .. } => data.as_mut(),
        }
    }

    fn meta(&mut self) -> &mut dyn AggrWriter {
        match &mut self.channels {
            Channels::Shared(w) => w.as_mut(),
            Channels::Split { meta, .. } => meta.as_mut(),
        }
    }
}

impl AggrResultWriter for CompositeAggrWriter {
    fn write_result(&mut self, result: &AggregationResult, ctx: &Context) -> Result<()> {
        let aggregation = &result.aggregation;
        self.data()
            .write_measurements(aggregation.data_path(), &result.measurements, ctx)?;
        self.meta().write_aggregation(aggregation, ctx)
    }

    fn write_dataset(&mut self, dataset: &Dataset, ctx: &Context) -> Result<()> {
        self.meta().write_dataset(dataset, ctx)
    }

    fn finish(&mut self) -> Result<()> {
        match &mut self.channels {
            Channels::Shared(w) => w.flush(),
            Channels::Split { data, meta } => {
                data.flush()?;
                meta.flush()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AggregationKind;
    use crate::params::Parameters;
    use crate::writer::MemoryWriter;

    #[test]
    fn split_channels_route_separately() -> Result<()> {
        let ctx = Context::new(Parameters::new())?;
        let ds = Dataset::new("d", "")?;
        let parent = ctx.new_measurement(vec![1.0]);
        let child = ctx.derive_measurement(vec![1.0], [parent.id()])?;
        let agg = ctx.new_aggregation(
            &ds,
            AggregationKind::Grid { grid_size: 1.0 },
            [parent.id()].into(),
            std::slice::from_ref(&child),
        );

        let data = MemoryWriter::new();
        let meta = MemoryWriter::new();
        let mut writer = CompositeAggrWriter::split(data.clone(), meta.clone());
        writer.write_result(&AggregationResult::new(agg, vec![child]), &ctx)?;
        writer.write_dataset(&ds, &ctx)?;
        writer.finish()?;

        let (data, meta) = (data.snapshot(), meta.snapshot());
        assert_eq!(data.measurements.len(), 1);
        assert!(data.aggregations.is_empty());
        assert!(meta.measurements.is_empty());
        assert_eq!(meta.aggregations.len(), 1);
        assert_eq!(meta.datasets.len(), 1);
        assert_eq!(meta.flushes, 1);
        Ok(())
    }
}
