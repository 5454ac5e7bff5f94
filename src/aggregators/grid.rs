//! Grid quantization: snap every vector component to a multiple of the grid size.

use super::{Aggregator, MeasurementStream, collect_input};
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::model::{AggregationKind, AggregationResult, Dataset};
use tracing::debug;

pub const GRID_SIZE_PARAM: &str = "grid.size";
pub const DEFAULT_GRID_SIZE: f64 = 0.0005;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridAggregator {
    grid_size: f64,
}

pub(super) fn create(ctx: &Context) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(GridAggregator::from_context(ctx)?))
}

impl GridAggregator {
    /// # Errors
    /// [`AggrError::Config`] unless `grid_size` is finite and positive.
    pub fn new(grid_size: f64) -> Result<Self> {
        if !grid_size.is_finite() || grid_size <= 0.0 {
            return Err(AggrError::config(
                GRID_SIZE_PARAM,
                format!("grid size must be finite and > 0, got {grid_size}"),
            ));
        }
        Ok(Self { grid_size })
    }

    pub fn from_context(ctx: &Context) -> Result<Self> {
        Self::new(ctx.params().get_or(GRID_SIZE_PARAM, DEFAULT_GRID_SIZE)?)
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    /// Round each component half-up to the nearest grid multiple.
    pub fn quantize(&self, vector: &[f64]) -> Vec<f64> {
        vector
            .iter()
            .map(|v| (v / self.grid_size + 0.5).floor() * self.grid_size)
            .collect()
    }
}

impl Aggregator for GridAggregator {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn aggregate(
        &self,
        dataset: &Dataset,
        input: MeasurementStream<'_>,
        ctx: &Context,
    ) -> Result<Vec<AggregationResult>> {
        let inputs = collect_input(input)?;
        let rounded = ctx.runner().map(&inputs, |m| Ok(self.quantize(m.vector())))?;
        debug!(inputs = inputs.len(), grid_size = self.grid_size, "quantized");

        let mut children = Vec::with_capacity(inputs.len());
        for (parent, vector) in inputs.iter().zip(rounded) {
            let child = ctx
                .derive_measurement(vector, [parent.id()])?
                .with_fields(parent.fields().clone())
                .with_timestamp(parent.timestamp());
            children.push(child);
        }

        let aggregation = ctx.new_aggregation(
            dataset,
            AggregationKind::Grid {
                grid_size: self.grid_size,
            },
            inputs.iter().map(|m| m.id()).collect(),
            &children,
        );
        Ok(vec![AggregationResult::new(aggregation, children)])
    }
}
