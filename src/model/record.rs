//! Persisted shapes of the model.
//!
//! Writers never serialize the model types directly; they go through these
//! records so the provenance toggle is applied in exactly one place. With
//! provenance off, parent, source and component links are left out entirely.

use crate::id::EntityId;
use crate::model::{Aggregation, AggregationKind, Dataset, Fields, Measurement};
use crate::window::TimestampMs;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: EntityId,
    pub vector: Vec<f64>,
    #[serde(default, skip_serializing_if = "Fields::is_empty")]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<EntityId>>,
}

impl MeasurementRecord {
    pub fn new(m: &Measurement, provenance: bool) -> Self {
        Self {
            id: m.id(),
            vector: m.vector().to_vec(),
            fields: m.fields().clone(),
            timestamp: m.timestamp(),
            parents: provenance.then(|| m.parents().iter().copied().collect()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationRecord {
    pub id: EntityId,
    pub dataset: String,
    pub created: TimestampMs,
    pub data_path: String,
    pub type_tag: String,
    #[serde(flatten)]
    pub kind: AggregationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<EntityId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<EntityId>>,
}

impl AggregationRecord {
    pub fn new(a: &Aggregation, provenance: bool) -> Self {
        Self {
            id: a.id(),
            dataset: a.dataset().to_string(),
            created: a.created(),
            data_path: a.data_path().to_string(),
            type_tag: a.kind().type_tag().to_string(),
            kind: a.kind().clone(),
            sources: provenance.then(|| a.sources().iter().copied().collect()),
            components: provenance.then(|| a.components().to_vec()),
        }
    }
}

/// One line of the metadata channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetadataRecord {
    Measurement {
        location: String,
        #[serde(flatten)]
        record: MeasurementRecord,
    },
    Aggregation(AggregationRecord),
    Dataset(Dataset),
}
