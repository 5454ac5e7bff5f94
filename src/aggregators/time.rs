//! Hierarchical time bucketing.
//!
//! The observed span `[min, max]` is cut into 1, 2, 4, ... windows, doubling up
//! to the configured detail. Every window becomes one aggregation holding
//! copies of the measurements that fall inside it. Windows that repeat an
//! earlier `(start, end)` pair are dropped, so the coarsest level wins.

use super::{Aggregator, MeasurementStream, collect_input};
use crate::combiners::TimeSpan;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::model::{AggregationKind, AggregationResult, Dataset, Measurement};
use crate::window::{TimestampMs, Window};
use std::collections::HashSet;
use tracing::debug;

pub const DETAIL_PARAM: &str = "time.detail";
pub const DEFAULT_DETAIL: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeAggregator {
    detail: u32,
}

pub(super) fn create(ctx: &Context) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(TimeAggregator::from_context(ctx)?))
}

impl TimeAggregator {
    pub fn new(detail: u32) -> Result<Self> {
        if detail == 0 {
            return Err(AggrError::config(DETAIL_PARAM, "detail must be at least 1"));
        }
        Ok(Self { detail })
    }

    pub fn from_context(ctx: &Context) -> Result<Self> {
        Self::new(ctx.params().get_or(DETAIL_PARAM, DEFAULT_DETAIL)?)
    }

    pub fn detail(&self) -> u32 {
        self.detail
    }

    /// Window counts per level: 1, 2, 4, ... up to `detail`.
    pub fn levels(&self) -> Vec<u32> {
        std::iter::successors(Some(1u32), |d| d.checked_mul(2))
            .take_while(|d| *d <= self.detail)
            .collect()
    }
}

impl Aggregator for TimeAggregator {
    fn name(&self) -> &'static str {
        "time"
    }

    fn aggregate(
        &self,
        dataset: &Dataset,
        input: MeasurementStream<'_>,
        ctx: &Context,
    ) -> Result<Vec<AggregationResult>> {
        let inputs = collect_input(input)?;
        let runner = ctx.runner();

        let timestamps: Vec<TimestampMs> = runner.map(&inputs, |m| {
            m.timestamp().ok_or(AggrError::MissingTimestamp(m.id()))
        })?;
        let Some((min, max)) = runner.combine(&timestamps, &TimeSpan) else {
            return Ok(Vec::new());
        };
        debug!(min, max, detail = self.detail, "time span");

        let mut seen: HashSet<Window> = HashSet::new();
        let mut results = Vec::new();
        for level in self.levels() {
            let windows = Window::subdivide(min, max, level);
            let buckets = runner.map(&timestamps, |ts| Ok(Window::locate(&windows, *ts, max)))?;

            for (idx, window) in windows.iter().enumerate() {
                if !seen.insert(*window) {
                    continue;
                }
                let members: Vec<&Measurement> = inputs
                    .iter()
                    .zip(&buckets)
                    .filter(|(_, b)| **b == Some(idx))
                    .map(|(m, _)| m)
                    .collect();

                let mut children = Vec::with_capacity(members.len());
                for parent in &members {
                    children.push(
                        ctx.derive_measurement(parent.vector().to_vec(), [parent.id()])?
                            .with_fields(parent.fields().clone())
                            .with_timestamp(parent.timestamp()),
                    );
                }
                let aggregation = ctx.new_aggregation(
                    dataset,
                    AggregationKind::Time {
                        start: window.start,
                        end: window.end,
                    },
                    members.iter().map(|m| m.id()).collect(),
                    &children,
                );
                results.push(AggregationResult::new(aggregation, children));
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_double_up_to_detail() -> Result<()> {
        assert_eq!(TimeAggregator::new(8)?.levels(), vec![1, 2, 4, 8]);
        assert_eq!(TimeAggregator::new(6)?.levels(), vec![1, 2, 4]);
        assert_eq!(TimeAggregator::new(1)?.levels(), vec![1]);
        Ok(())
    }

    #[test]
    fn zero_detail_is_rejected() {
        assert!(TimeAggregator::new(0).is_err());
    }
}
