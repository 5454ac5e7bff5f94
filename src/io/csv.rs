//! CSV measurement reader.
//!
//! The first row is a header. Columns named by `input.vector_fields` make up the
//! vector (in that order), the `input.timestamp_field` column becomes the
//! timestamp and every other column is kept as a typed field. Records are
//! parsed lazily while the stream is consumed.

use super::{AggrReader, open, parse_timestamp, timestamp_field, vector_fields};
use crate::aggregators::MeasurementStream;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::id::IdFactory;
use crate::model::{FieldValue, Fields, Measurement};
use crate::params::INPUT_PARAM;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default)]
pub struct CsvAggrReader;

/// Column positions resolved against the header row.
#[derive(Clone, Debug)]
struct Layout {
    vector: Vec<usize>,
    timestamp: Option<usize>,
    fields: Vec<(usize, String)>,
}

impl Layout {
    fn resolve(headers: &csv::StringRecord, ctx: &Context, location: &str) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let vector = vector_fields(ctx)
            .iter()
            .map(|name| {
                position(name).ok_or_else(|| {
                    AggrError::config(
                        INPUT_PARAM,
                        format!("{location} has no vector column `{name}`"),
                    )
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        let timestamp = position(&timestamp_field(ctx));
        let fields = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !vector.contains(i) && Some(*i) != timestamp)
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();
        Ok(Self {
            vector,
            timestamp,
            fields,
        })
    }

    fn measurement(
        &self,
        record: &csv::StringRecord,
        ids: &IdFactory,
        location: &str,
        line: u64,
    ) -> Result<Measurement> {
        let parse_err = |message: String| AggrError::Parse {
            location: location.to_string(),
            line,
            message,
        };
        let cell = |i: usize| record.get(i).unwrap_or("");

        let vector = self
            .vector
            .iter()
            .map(|&i| {
                cell(i)
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| parse_err(format!("column {i}: {e}")))
            })
            .collect::<Result<Vec<f64>>>()?;
        let timestamp = match self.timestamp {
            Some(i) => parse_timestamp(cell(i)).map_err(parse_err)?,
            None => None,
        };
        let fields: Fields = self
            .fields
            .iter()
            .filter(|(i, _)| !cell(*i).is_empty())
            .map(|(i, name)| (name.clone(), FieldValue::parse(cell(*i))))
            .collect();

        Ok(Measurement::new(ids.next_id(), vector)
            .with_fields(fields)
            .with_timestamp(timestamp))
    }
}

impl AggrReader for CsvAggrReader {
    fn read(&self, location: &str, ctx: &Context) -> Result<MeasurementStream<'static>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(open(location)?);
        let headers = rdr
            .headers()
            .map_err(|e| AggrError::csv(location, e))?
            .clone();
        let layout = Layout::resolve(&headers, ctx, location)?;
        let ids: Arc<IdFactory> = Arc::clone(ctx.ids());
        let location = location.to_string();

        Ok(Box::new(rdr.into_records().enumerate().map(
            move |(i, rec)| {
                // header is line 1
                let line = i as u64 + 2;
                let rec = rec.map_err(|e| AggrError::csv(location.as_str(), e))?;
                layout.measurement(&rec, &ids, &location, line)
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;
    use std::io::Write;

    #[test]
    fn reads_vector_timestamp_and_fields() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "latitude,longitude,timestamp,source,value").unwrap();
        writeln!(file, "51.05,3.72,1000,a,10").unwrap();
        writeln!(file, "51.06,3.73,1970-01-01T00:00:02Z,b,2.5").unwrap();
        file.flush().unwrap();
        let location = file.path().display().to_string();

        let ctx = Context::new(Parameters::new())?;
        let ms = CsvAggrReader
            .read(&location, &ctx)?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(ms.len(), 2);
        assert_eq!(ms[0].vector(), &[51.05, 3.72]);
        assert_eq!(ms[0].timestamp(), Some(1000));
        assert_eq!(ms[0].field("source"), Some(&FieldValue::Text("a".into())));
        assert_eq!(ms[1].timestamp(), Some(2000));
        assert_eq!(ms[1].numeric_field("value")?, 2.5);
        assert!(ms[0].id() < ms[1].id());
        Ok(())
    }

    #[test]
    fn malformed_number_reports_line() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "x\n1.0\nnope").unwrap();
        file.flush().unwrap();
        let location = file.path().display().to_string();

        let ctx = Context::new(Parameters::from_pairs([("input.vector_fields", "x")]))?;
        let out: Vec<Result<Measurement>> = CsvAggrReader.read(&location, &ctx)?.collect();
        assert!(out[0].is_ok());
        match &out[1] {
            Err(AggrError::Parse { line, .. }) => assert_eq!(*line, 3),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn missing_vector_column_is_a_config_error() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "lat,lon\n1,2").unwrap();
        file.flush().unwrap();
        let ctx = Context::new(Parameters::new())?;
        assert!(matches!(
            CsvAggrReader.read(&file.path().display().to_string(), &ctx),
            Err(AggrError::Config { .. })
        ));
        Ok(())
    }
}
