//! Pre-built measurement sets.

use crate::aggregators::MeasurementStream;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::model::Measurement;
use crate::window::TimestampMs;

/// Wrap already-built measurements as an aggregator input stream.
pub fn stream(measurements: Vec<Measurement>) -> MeasurementStream<'static> {
    Box::new(measurements.into_iter().map(Ok))
}

/// Two-dimensional points without timestamps.
pub fn points(ctx: &Context, vectors: &[[f64; 2]]) -> Vec<Measurement> {
    vectors
        .iter()
        .map(|v| ctx.new_measurement(v.to_vec()))
        .collect()
}

/// Two-dimensional points with a timestamp each.
pub fn timed_points(ctx: &Context, rows: &[([f64; 2], TimestampMs)]) -> Vec<Measurement> {
    rows.iter()
        .map(|(v, ts)| ctx.new_measurement(v.to_vec()).with_timestamp(*ts))
        .collect()
}

/// Points tagged with `source = <source>` and a numeric `value` field, as
/// consumed by the combination aggregator.
pub fn sourced_values(ctx: &Context, source: &str, rows: &[([f64; 2], f64)]) -> Vec<Measurement> {
    rows.iter()
        .map(|(v, value)| {
            ctx.new_measurement(v.to_vec())
                .with_field("source", source)
                .with_field("value", *value)
        })
        .collect()
}

/// Twelve bike-share pickups in Ghent around two hubs, one minute apart.
///
/// Six points sit near the station (51.036, 3.710), six near the centre
/// (51.054, 3.725).
pub fn sample_rides(ctx: &Context) -> Vec<Measurement> {
    const START: TimestampMs = 1_500_000_000_000;
    const MINUTE: TimestampMs = 60_000;
    let hubs = [[51.036, 3.710], [51.054, 3.725]];
    let offsets = [
        [0.0001, 0.0002],
        [-0.0002, 0.0001],
        [0.0003, -0.0001],
        [-0.0001, -0.0003],
        [0.0002, 0.0003],
        [0.0000, -0.0002],
    ];

    let mut out = Vec::with_capacity(12);
    for (h, hub) in hubs.iter().enumerate() {
        for (i, off) in offsets.iter().enumerate() {
            let minute = (h * offsets.len() + i) as TimestampMs;
            out.push(
                ctx.new_measurement(vec![hub[0] + off[0], hub[1] + off[1]])
                    .with_timestamp(START + minute * MINUTE)
                    .with_field("station", format!("hub-{h}")),
            );
        }
    }
    out
}

/// CSV text equivalent of a few pickups, with an RFC 3339 and a millisecond
/// timestamp to exercise both notations.
pub const SAMPLE_RIDES_CSV: &str = "\
latitude,longitude,timestamp,station
51.0361,3.7102,2017-07-14T02:40:00Z,hub-0
51.0358,3.7101,1500000060000,hub-0
51.0541,3.7252,1500000120000,hub-1
";

/// A temporary directory that is removed on drop, handing out file locations
/// as strings the way readers and writers take them.
pub struct TempWorkspace {
    dir: tempfile::TempDir,
}

impl TempWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| AggrError::io("temporary directory", e))?;
        Ok(Self { dir })
    }

    /// Location of `name` inside the workspace (not created).
    pub fn location(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }

    /// Write `contents` to `name` and return its location.
    pub fn write(&self, name: &str, contents: &str) -> Result<String> {
        let location = self.location(name);
        std::fs::write(&location, contents).map_err(|e| AggrError::io(location.as_str(), e))?;
        Ok(location)
    }
}
