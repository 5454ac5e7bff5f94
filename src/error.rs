//! Error type shared by every stage of an aggregation run.
//!
//! Readers, aggregators and writers all return [`AggrError`]. The driver does not
//! retry anything: the first error aborts the run and is handed back to the caller.

use crate::id::EntityId;
use thiserror::Error;

/// Convenience alias for results carrying an [`AggrError`].
pub type Result<T> = std::result::Result<T, AggrError>;

#[derive(Debug, Error)]
pub enum AggrError {
    #[error("I/O error on {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "io-csv")]
    #[error("CSV error in {location}: {source}")]
    Csv {
        location: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("TOML error in {location}: {source}")]
    Toml {
        location: String,
        #[source]
        source: toml::de::Error,
    },

    /// A record was readable but its content could not be turned into a measurement.
    #[error("malformed record {line} in {location}: {message}")]
    Parse {
        location: String,
        line: u64,
        message: String,
    },

    #[error("invalid configuration for `{key}`: {message}")]
    Config { key: String, message: String },

    #[error("unknown aggregator `{name}` (known: {known})")]
    UnknownAggregator { name: String, known: String },

    #[error("measurement {0} has no timestamp")]
    MissingTimestamp(EntityId),

    #[error("measurement {id} has {actual} vector components, expected {expected}")]
    DimensionMismatch {
        id: EntityId,
        expected: usize,
        actual: usize,
    },

    #[error("{child} cannot derive from {parent}: parents must be created before their children")]
    Lineage { child: EntityId, parent: EntityId },

    #[error("cardinality mismatch for {identity}: expected {expected} values, found {actual}")]
    CardinalityMismatch {
        identity: String,
        expected: usize,
        actual: usize,
    },

    #[error("measurement {id} has field `{field}` with no column in {location}")]
    UnknownColumn {
        location: String,
        id: EntityId,
        field: String,
    },

    #[error("measurement {id} has no numeric field `{field}`")]
    MissingField { id: EntityId, field: String },

    #[error("worker pool: {0}")]
    Pool(String),
}

impl AggrError {
    pub fn io(location: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            location: location.into(),
            source,
        }
    }

    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    #[cfg(feature = "io-csv")]
    pub(crate) fn csv(location: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            location: location.into(),
            source,
        }
    }

    pub(crate) fn json(location: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            location: location.into(),
            source,
        }
    }
}
