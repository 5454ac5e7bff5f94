//! JSON Lines measurement reader.
//!
//! One JSON object per line:
//!
//! ```json
//! {"id": 17, "vector": [51.05, 3.72], "timestamp": 1500, "fields": {"source": "a"}}
//! ```
//!
//! Only `vector` is required. `timestamp` may be integer milliseconds or a
//! date-time string. Blank lines are skipped. The input's own `id` is not
//! reused; it is kept as a field named by `input.id_field`.

use super::{AggrReader, ID_FIELD_PARAM, DEFAULT_ID_FIELD, open, parse_timestamp};
use crate::aggregators::MeasurementStream;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::id::IdFactory;
use crate::model::{FieldValue, Fields, Measurement};
use crate::window::TimestampMs;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonlAggrReader;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(TimestampMs),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct InputRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    vector: Vec<f64>,
    #[serde(default)]
    fields: Fields,
    #[serde(default)]
    timestamp: Option<RawTimestamp>,
}

impl InputRecord {
    fn into_measurement(
        self,
        ids: &IdFactory,
        id_field: &str,
        location: &str,
        line: u64,
    ) -> Result<Measurement> {
        let timestamp = match self.timestamp {
            None => None,
            Some(RawTimestamp::Millis(ms)) => Some(ms),
            Some(RawTimestamp::Text(s)) => {
                parse_timestamp(&s).map_err(|message| AggrError::Parse {
                    location: location.to_string(),
                    line,
                    message,
                })?
            }
        };
        let mut fields = self.fields;
        if let Some(id) = self.id {
            let value = match id {
                serde_json::Value::String(s) => FieldValue::Text(s),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => FieldValue::Int(i),
                    None => FieldValue::Text(n.to_string()),
                },
                other => FieldValue::Text(other.to_string()),
            };
            fields.insert(id_field.to_string(), value);
        }
        Ok(Measurement::new(ids.next_id(), self.vector)
            .with_fields(fields)
            .with_timestamp(timestamp))
    }
}

impl AggrReader for JsonlAggrReader {
    fn read(&self, location: &str, ctx: &Context) -> Result<MeasurementStream<'static>> {
        let reader = BufReader::new(open(location)?);
        let ids: Arc<IdFactory> = Arc::clone(ctx.ids());
        let id_field = ctx
            .params()
            .get(ID_FIELD_PARAM)
            .unwrap_or(DEFAULT_ID_FIELD)
            .to_string();
        let location = location.to_string();

        let records = reader
            .lines()
            .enumerate()
            .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
            .map(move |(i, line)| {
                let line_no = i as u64 + 1;
                let text = line.map_err(|e| AggrError::io(location.as_str(), e))?;
                let record: InputRecord = serde_json::from_str(&text).map_err(|e| {
                    AggrError::Parse {
                        location: location.clone(),
                        line: line_no,
                        message: e.to_string(),
                    }
                })?;
                record.into_measurement(&ids, &id_field, &location, line_no)
            });
        Ok(Box::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;
    use std::io::Write;

    #[test]
    fn keeps_input_id_as_field() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(file, r#"{{"id": 17, "vector": [1.0, 2.0], "timestamp": 1500}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"vector": [3.0, 4.0], "timestamp": "1970-01-01T00:00:01Z", "fields": {{"source": "b"}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let ctx = Context::new(Parameters::new())?;
        let ms = JsonlAggrReader
            .read(&file.path().display().to_string(), &ctx)?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(ms.len(), 2);
        assert_eq!(ms[0].field("input_id"), Some(&FieldValue::Int(17)));
        assert_eq!(ms[0].timestamp(), Some(1500));
        assert_eq!(ms[1].timestamp(), Some(1000));
        assert_eq!(ms[1].field("source"), Some(&FieldValue::Text("b".into())));
        Ok(())
    }

    #[test]
    fn bad_line_is_a_parse_error() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(file, r#"{{"vector": "north"}}"#).unwrap();
        file.flush().unwrap();

        let ctx = Context::new(Parameters::new())?;
        let first = JsonlAggrReader
            .read(&file.path().display().to_string(), &ctx)?
            .next();
        assert!(matches!(first, Some(Err(AggrError::Parse { line: 1, .. }))));
        Ok(())
    }
}
