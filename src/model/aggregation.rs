use crate::id::EntityId;
use crate::metric::DistanceMetric;
use crate::model::{Dataset, Measurement};
use crate::window::TimestampMs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Variant-specific part of an aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationKind {
    Grid {
        grid_size: f64,
    },
    Time {
        start: TimestampMs,
        end: TimestampMs,
    },
    #[serde(rename = "kmeans")]
    KMeans {
        k: usize,
        iterations: usize,
        metric: DistanceMetric,
    },
    Basic {
        key: String,
    },
    Diff {
        key: String,
        subtrahend: String,
    },
    Average {
        key: String,
        amount: usize,
        others: Vec<String>,
    },
}

impl AggregationKind {
    /// Tag written to the metadata channel.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Grid { .. } => "GridAggregation",
            Self::Time { .. } => "TimeAggregation",
            Self::KMeans { .. } => "KMeansAggregation",
            Self::Basic { .. } => "BasicAggregation",
            Self::Diff { .. } => "DiffAggregation",
            Self::Average { .. } => "AverageAggregation",
        }
    }
}

/// Metadata describing one transformation and the measurements it produced.
///
/// `sources` are the measurements consumed, `components` the measurements
/// produced; together they form the provenance graph of the run. Both hold ids
/// only. Built by [`Context::new_aggregation`](crate::context::Context::new_aggregation).
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    id: EntityId,
    dataset: String,
    created: TimestampMs,
    data_path: String,
    sources: BTreeSet<EntityId>,
    components: Vec<EntityId>,
    kind: AggregationKind,
}

impl Aggregation {
    pub(crate) fn new(
        id: EntityId,
        dataset: &Dataset,
        created: TimestampMs,
        data_path: String,
        kind: AggregationKind,
        sources: BTreeSet<EntityId>,
        components: &[Measurement],
    ) -> Self {
        Self {
            id,
            dataset: dataset.id().to_string(),
            created,
            data_path,
            sources,
            components: components.iter().map(Measurement::id).collect(),
            kind,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Id of the dataset this aggregation is part of.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn created(&self) -> TimestampMs {
        self.created
    }

    /// Locator of the produced measurements on the data channel.
    pub fn data_path(&self) -> &str {
        &self.data_path
    }

    pub fn sources(&self) -> &BTreeSet<EntityId> {
        &self.sources
    }

    pub fn components(&self) -> &[EntityId] {
        &self.components
    }

    pub fn kind(&self) -> &AggregationKind {
        &self.kind
    }
}

/// One aggregation paired with the measurements it produced, in output order.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregationResult {
    pub aggregation: Aggregation,
    pub measurements: Vec<Measurement>,
}

impl AggregationResult {
    pub fn new(aggregation: Aggregation, measurements: Vec<Measurement>) -> Self {
        Self {
            aggregation,
            measurements,
        }
    }

    /// Look up a produced measurement by id.
    pub fn measurement(&self, id: EntityId) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.id() == id)
    }
}
