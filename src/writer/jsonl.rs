use super::AggrWriter;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::io::compression::{DynWrite, FinishWrite, auto_detect_writer};
use crate::model::{
    Aggregation, AggregationRecord, Dataset, Measurement, MeasurementRecord, MetadataRecord,
};
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::Path;

/// Metadata sink writing one [`MetadataRecord`] per line.
///
/// [`AggrWriter::flush`] ends the stream (writing any compression trailer);
/// records written after that are rejected.
pub struct JsonlMetaWriter {
    location: String,
    out: Option<DynWrite>,
    written: usize,
}

impl JsonlMetaWriter {
    /// Create (or truncate) the file at `location`, compressing by extension.
    pub fn create(location: &str) -> Result<Self> {
        let path = Path::new(location);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).map_err(|e| AggrError::io(parent.display().to_string(), e))?;
        }
        let file = File::create(path).map_err(|e| AggrError::io(location, e))?;
        Ok(Self::new(location, auto_detect_writer(file, location)?))
    }

    pub fn new(location: impl Into<String>, out: DynWrite) -> Self {
        Self {
            location: location.into(),
            out: Some(out),
            written: 0,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn written(&self) -> usize {
        self.written
    }

    fn emit(&mut self, record: &MetadataRecord) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(AggrError::io(
                self.location.as_str(),
                std::io::Error::other("metadata stream already finished"),
            ));
        };
        serde_json::to_writer(&mut *out, record)
            .map_err(|e| AggrError::json(self.location.as_str(), e))?;
        out.write_all(b"\n")
            .map_err(|e| AggrError::io(self.location.as_str(), e))?;
        self.written += 1;
        Ok(())
    }
}

impl AggrWriter for JsonlMetaWriter {
    fn write_measurement(&mut self, location: &str, m: &Measurement, ctx: &Context) -> Result<()> {
        self.emit(&MetadataRecord::Measurement {
            location: location.to_string(),
            record: MeasurementRecord::new(m, ctx.write_provenance()),
        })
    }

    fn write_aggregation(&mut self, aggregation: &Aggregation, ctx: &Context) -> Result<()> {
        self.emit(&MetadataRecord::Aggregation(AggregationRecord::new(
            aggregation,
            ctx.write_provenance(),
        )))
    }

    fn write_dataset(&mut self, dataset: &Dataset, _ctx: &Context) -> Result<()> {
        self.emit(&MetadataRecord::Dataset(dataset.clone()))
    }

    fn flush(&mut self) -> Result<()> {
        match self.out.take() {
            Some(out) => out
                .finish()
                .map_err(|e| AggrError::io(self.location.as_str(), e)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn flush_completes_compressed_stream() -> Result<()> {
        use crate::io::compression::auto_detect_reader;
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("meta/metadata.jsonl.gz").display().to_string();
        let ctx = Context::new(Parameters::new())?;

        let mut writer = JsonlMetaWriter::create(&location)?;
        writer.write_dataset(&Dataset::new("rides", "Rides")?, &ctx)?;
        writer.flush()?;
        assert_eq!(writer.written(), 1);

        let mut text = String::new();
        auto_detect_reader(File::open(&location).unwrap(), &location)?
            .read_to_string(&mut text)
            .unwrap();
        let record: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(record["kind"], "dataset");
        assert_eq!(record["id"], "rides");
        Ok(())
    }

    #[test]
    fn records_after_flush_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("metadata.jsonl").display().to_string();
        let ctx = Context::new(Parameters::new())?;

        let mut writer = JsonlMetaWriter::create(&location)?;
        writer.flush()?;
        // a second flush is a no-op
        writer.flush()?;
        let err = writer.write_dataset(&Dataset::new("late", "")?, &ctx).unwrap_err();
        assert!(matches!(err, AggrError::Io { .. }));
        Ok(())
    }
}
