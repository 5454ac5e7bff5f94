use super::AggrWriter;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::io::compression::{DynWrite, FinishWrite, auto_detect_writer};
use crate::model::{Aggregation, Dataset, Measurement, MeasurementRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, create_dir_all};
use std::path::Path;

/// Data sink writing one CSV file per location.
///
/// Columns: `id`, `timestamp`, `parents` (only with provenance on), one `x<i>`
/// column per vector component, then every field name that occurs in the batch
/// that opened the file, sorted. Parent ids are joined with `;`. A measurement
/// written later with a field outside those columns is an error.
#[derive(Default)]
pub struct CsvDataWriter {
    open: BTreeMap<String, OpenFile>,
}

struct OpenFile {
    writer: csv::Writer<DynWrite>,
    dimension: usize,
    fields: Vec<String>,
}

impl CsvDataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_file(
        &mut self,
        location: &str,
        dimension: usize,
        fields: Vec<String>,
        provenance: bool,
    ) -> Result<()> {
        let path = Path::new(location);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).map_err(|e| AggrError::io(parent.display().to_string(), e))?;
        }
        let file = File::create(path).map_err(|e| AggrError::io(location, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(auto_detect_writer(file, location)?);

        let mut header = vec!["id".to_string(), "timestamp".to_string()];
        if provenance {
            header.push("parents".to_string());
        }
        header.extend((0..dimension).map(|i| format!("x{i}")));
        header.extend(fields.iter().cloned());
        writer
            .write_record(&header)
            .map_err(|e| AggrError::csv(location, e))?;

        self.open.insert(
            location.to_string(),
            OpenFile {
                writer,
                dimension,
                fields,
            },
        );
        Ok(())
    }
}

impl OpenFile {
    fn write_row(&mut self, location: &str, record: &MeasurementRecord) -> Result<()> {
        if record.vector.len() != self.dimension {
            return Err(AggrError::DimensionMismatch {
                id: record.id,
                expected: self.dimension,
                actual: record.vector.len(),
            });
        }
        if let Some(extra) = record.fields.keys().find(|k| !self.fields.contains(k)) {
            return Err(AggrError::UnknownColumn {
                location: location.to_string(),
                id: record.id,
                field: extra.clone(),
            });
        }

        let mut row = vec![
            record.id.to_string(),
            record.timestamp.map(|t| t.to_string()).unwrap_or_default(),
        ];
        if let Some(parents) = &record.parents {
            let ids: Vec<String> = parents.iter().map(ToString::to_string).collect();
            row.push(ids.join(";"));
        }
        row.extend(record.vector.iter().map(f64::to_string));
        row.extend(self.fields.iter().map(|name| {
            record
                .fields
                .get(name)
                .map(ToString::to_string)
                .unwrap_or_default()
        }));
        self.writer
            .write_record(&row)
            .map_err(|e| AggrError::csv(location, e))
    }
}

impl AggrWriter for CsvDataWriter {
    fn write_measurement(&mut self, location: &str, m: &Measurement, ctx: &Context) -> Result<()> {
        self.write_measurements(location, std::slice::from_ref(m), ctx)
    }

    fn write_measurements(
        &mut self,
        location: &str,
        measurements: &[Measurement],
        ctx: &Context,
    ) -> Result<()> {
        let provenance = ctx.write_provenance();
        if !self.open.contains_key(location) {
            // an empty batch still leaves a file behind so every data path resolves
            let dimension = measurements.first().map_or(0, Measurement::dimension);
            let fields: BTreeSet<&String> =
                measurements.iter().flat_map(|m| m.fields().keys()).collect();
            let fields = fields.into_iter().cloned().collect();
            self.open_file(location, dimension, fields, provenance)?;
        }
        let Some(file) = self.open.get_mut(location) else {
            return Ok(());
        };
        for m in measurements {
            file.write_row(location, &MeasurementRecord::new(m, provenance))?;
        }
        Ok(())
    }

    fn write_aggregation(&mut self, _aggregation: &Aggregation, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    fn write_dataset(&mut self, _dataset: &Dataset, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    /// Close every open file, ending compressed streams.
    fn flush(&mut self) -> Result<()> {
        for (location, file) in std::mem::take(&mut self.open) {
            let out = file
                .writer
                .into_inner()
                .map_err(|e| AggrError::io(location.as_str(), std::io::Error::other(e.to_string())))?;
            out.finish().map_err(|e| AggrError::io(location.as_str(), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    fn ride(ctx: &Context, fields: &[(&str, &str)]) -> Measurement {
        fields
            .iter()
            .fold(ctx.new_measurement(vec![51.05, 3.72]), |m, (name, value)| {
                m.with_field(*name, *value)
            })
    }

    #[test]
    fn header_covers_fields_of_every_measurement() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("rides/cells.csv").display().to_string();
        let ctx = Context::new(Parameters::from_pairs([("provenance", "false")]))?;
        let batch = vec![
            ride(&ctx, &[("source", "a")]),
            ride(&ctx, &[("source", "b"), ("station", "gent")]),
        ];

        let mut writer = CsvDataWriter::new();
        writer.write_measurements(&location, &batch, &ctx)?;
        writer.flush()?;

        let text = std::fs::read_to_string(&location).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,timestamp,x0,x1,source,station");
        assert!(lines[1].ends_with(",a,"));
        assert!(lines[2].ends_with(",b,gent"));
        Ok(())
    }

    #[test]
    fn field_without_column_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("cells.csv").display().to_string();
        let ctx = Context::new(Parameters::new())?;

        let mut writer = CsvDataWriter::new();
        writer.write_measurement(&location, &ride(&ctx, &[]), &ctx)?;
        let err = writer
            .write_measurement(&location, &ride(&ctx, &[("station", "gent")]), &ctx)
            .unwrap_err();
        assert!(matches!(err, AggrError::UnknownColumn { ref field, .. } if field == "station"));
        Ok(())
    }

    #[test]
    fn empty_batch_writes_header_only() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("empty.csv").display().to_string();
        let ctx = Context::new(Parameters::from_pairs([("provenance", "true")]))?;

        let mut writer = CsvDataWriter::new();
        writer.write_measurements(&location, &[], &ctx)?;
        writer.flush()?;
        let text = std::fs::read_to_string(&location).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), ["id,timestamp,parents"]);
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn flush_completes_gzip_data_file() -> Result<()> {
        use crate::io::AggrReader;
        use crate::io::csv::CsvAggrReader;

        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("cells.csv.gz").display().to_string();
        let ctx = Context::new(Parameters::from_pairs([
            ("provenance", "false"),
            ("input.vector_fields", "x0,x1"),
        ]))?;
        let batch = vec![ride(&ctx, &[("station", "gent")]), ride(&ctx, &[])];

        let mut writer = CsvDataWriter::new();
        writer.write_measurements(&location, &batch, &ctx)?;
        writer.flush()?;

        let read = CsvAggrReader
            .read(&location, &ctx)?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].field("station").map(ToString::to_string), Some("gent".into()));
        Ok(())
    }
}
