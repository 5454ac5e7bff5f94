//! Measurement readers.
//!
//! A reader turns a location into a lazy, single-pass stream of measurements.
//! Each record gets a fresh id from the run's [`IdFactory`](crate::id::IdFactory),
//! so every input is older than anything derived from it.
//!
//! Built-in readers:
//! - [`csv::CsvAggrReader`] (feature `io-csv`)
//! - [`jsonl::JsonlAggrReader`] (feature `io-jsonl`)
//! - [`MemoryReader`] for tests and embedding
//!
//! [`reader_for`] picks a file reader from the location's extension; gzip and
//! zstd suffixes are looked through.

pub mod compression;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;

use crate::aggregators::MeasurementStream;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::model::Measurement;
use crate::params::INPUT_PARAM;
use crate::window::TimestampMs;
use chrono::{DateTime, NaiveDateTime};
use std::fs::File;
use std::path::Path;

pub const VECTOR_FIELDS_PARAM: &str = "input.vector_fields";
pub const TIMESTAMP_FIELD_PARAM: &str = "input.timestamp_field";
pub const ID_FIELD_PARAM: &str = "input.id_field";

pub const DEFAULT_VECTOR_FIELDS: [&str; 2] = ["latitude", "longitude"];
pub const DEFAULT_TIMESTAMP_FIELD: &str = "timestamp";
pub const DEFAULT_ID_FIELD: &str = "input_id";

pub trait AggrReader: Send + Sync {
    fn read(&self, location: &str, ctx: &Context) -> Result<MeasurementStream<'static>>;
}

/// Serves a fixed set of measurements regardless of location.
#[derive(Clone, Debug, Default)]
pub struct MemoryReader {
    measurements: Vec<Measurement>,
}

impl MemoryReader {
    pub fn new(measurements: Vec<Measurement>) -> Self {
        Self { measurements }
    }
}

impl AggrReader for MemoryReader {
    fn read(&self, _location: &str, _ctx: &Context) -> Result<MeasurementStream<'static>> {
        Ok(Box::new(self.measurements.clone().into_iter().map(Ok)))
    }
}

/// Choose a reader from the extension of `location`.
///
/// # Errors
/// [`AggrError::Config`] for an extension no enabled reader handles.
pub fn reader_for(location: &str) -> Result<Box<dyn AggrReader>> {
    let base = compression::strip_compression_extension(location).to_ascii_lowercase();
    let ext = Path::new(&base)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    match ext.as_str() {
        #[cfg(feature = "io-csv")]
        "csv" => Ok(Box::new(csv::CsvAggrReader)),
        #[cfg(feature = "io-jsonl")]
        "jsonl" | "ndjson" | "json" => Ok(Box::new(jsonl::JsonlAggrReader)),
        _ => Err(AggrError::config(
            INPUT_PARAM,
            format!("no reader for `{location}`"),
        )),
    }
}

/// Vector column names, in order.
pub(crate) fn vector_fields(ctx: &Context) -> Vec<String> {
    let fields = ctx.params().get_list(VECTOR_FIELDS_PARAM);
    if fields.is_empty() {
        DEFAULT_VECTOR_FIELDS.iter().map(|s| s.to_string()).collect()
    } else {
        fields
    }
}

pub(crate) fn timestamp_field(ctx: &Context) -> String {
    ctx.params()
        .get(TIMESTAMP_FIELD_PARAM)
        .unwrap_or(DEFAULT_TIMESTAMP_FIELD)
        .to_string()
}

/// Open `location` for reading, decompressing when needed.
pub(crate) fn open(location: &str) -> Result<compression::DynRead> {
    let file = File::open(location).map_err(|e| AggrError::io(location, e))?;
    compression::auto_detect_reader(file, location)
}

/// Parse a timestamp cell: integer milliseconds, RFC 3339, or a naive
/// `YYYY-MM-DD HH:MM:SS[.fff]` date-time taken as UTC. Blank means absent.
pub fn parse_timestamp(raw: &str) -> std::result::Result<Option<TimestampMs>, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(Some(ms));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.timestamp_millis()));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Some(dt.and_utc().timestamp_millis()));
        }
    }
    Err(format!("`{s}` is not a timestamp"))
}
