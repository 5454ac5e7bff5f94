//! KMeans clustering with a fixed iteration budget.
//!
//! Each round assigns every measurement to its nearest centroid and moves the
//! centroids to the mean of their members. The update runs as a combiner: in
//! partitioned mode every partition sums its members against the same
//! centroid snapshot, the partial sums are merged at a barrier and the new
//! snapshot is used by the next round.
//!
//! After the last round one more assignment pass decides lineage: a centroid
//! lists exactly the measurements closest to its final position as parents.

use super::{Aggregator, MeasurementStream, collect_input};
use crate::combiners::CombineFn;
use crate::context::Context;
use crate::error::{AggrError, Result};
use crate::id::EntityId;
use crate::metric::DistanceMetric;
use crate::model::{AggregationKind, AggregationResult, Dataset, Measurement};
use crate::runner::Runner;
use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, warn};

pub const CENTROIDS_PARAM: &str = "kmeans.centroids";
pub const ITERATIONS_PARAM: &str = "kmeans.iterations";
pub const METRIC_PARAM: &str = "kmeans.metric";
pub const INIT_PARAM: &str = "kmeans.init";
pub const SEED_PARAM: &str = "kmeans.seed";

pub const DEFAULT_CENTROIDS: usize = 5;
pub const DEFAULT_ITERATIONS: usize = 10;

/// Field set on every centroid: the number of members after the final assignment.
pub const SIZE_FIELD: &str = "size";

/// How the starting centroids are picked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KMeansInit {
    /// The first `k` distinct vectors in input order.
    #[default]
    First,
    /// `k` distinct input positions drawn with a seeded RNG.
    Random { seed: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct KMeansAggregator {
    k: usize,
    iterations: usize,
    metric: DistanceMetric,
    init: KMeansInit,
}

pub(super) fn create(ctx: &Context) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(KMeansAggregator::from_context(ctx)?))
}

impl KMeansAggregator {
    pub fn new(k: usize, iterations: usize, metric: DistanceMetric) -> Result<Self> {
        if k == 0 {
            return Err(AggrError::config(CENTROIDS_PARAM, "need at least one centroid"));
        }
        Ok(Self {
            k,
            iterations,
            metric,
            init: KMeansInit::First,
        })
    }

    pub fn with_init(mut self, init: KMeansInit) -> Self {
        self.init = init;
        self
    }

    pub fn from_context(ctx: &Context) -> Result<Self> {
        let params = ctx.params();
        let metric = match params.get(METRIC_PARAM) {
            Some(raw) => DistanceMetric::from_str(raw)?,
            None => DistanceMetric::default(),
        };
        let init = match params.get(INIT_PARAM).map(|s| s.trim().to_ascii_lowercase()) {
            None => KMeansInit::First,
            Some(s) if s == "first" => KMeansInit::First,
            Some(s) if s == "random" => KMeansInit::Random {
                seed: params.get_or(SEED_PARAM, 0u64)?,
            },
            Some(other) => {
                return Err(AggrError::config(
                    INIT_PARAM,
                    format!("unknown policy `{other}` (expected first or random)"),
                ));
            }
        };
        Ok(Self::new(
            params.get_or(CENTROIDS_PARAM, DEFAULT_CENTROIDS)?,
            params.get_or(ITERATIONS_PARAM, DEFAULT_ITERATIONS)?,
            metric,
        )?
        .with_init(init))
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Starting centroids; empty when there is no input.
    ///
    /// With fewer distinct candidates than `k` the candidates are repeated in
    /// order, so the result always holds exactly `k` vectors.
    pub fn initial_centroids(&self, inputs: &[Measurement]) -> Vec<Vec<f64>> {
        let candidates: Vec<&[f64]> = match self.init {
            KMeansInit::First => {
                let mut seen = HashSet::new();
                inputs
                    .iter()
                    .map(Measurement::vector)
                    .filter(|v| seen.insert(v.iter().copied().map(OrderedFloat).collect::<Vec<_>>()))
                    .take(self.k)
                    .collect()
            }
            KMeansInit::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let amount = self.k.min(inputs.len());
                rand::seq::index::sample(&mut rng, inputs.len(), amount)
                    .into_iter()
                    .map(|i| inputs[i].vector())
                    .collect()
            }
        };
        if candidates.is_empty() {
            return Vec::new();
        }
        (0..self.k)
            .map(|i| candidates[i % candidates.len()].to_vec())
            .collect()
    }

    /// Run the configured number of rounds and return the final centroids.
    pub fn fit(&self, inputs: &[Measurement], runner: &Runner) -> Vec<Vec<f64>> {
        let mut centroids = self.initial_centroids(inputs);
        if centroids.is_empty() {
            return centroids;
        }
        for round in 0..self.iterations {
            let update = CentroidUpdate {
                centroids: &centroids,
                metric: self.metric,
            };
            let next = runner.combine(inputs, &update);
            debug!(round, moved = moved(&centroids, &next), "kmeans round");
            centroids = next;
        }
        centroids
    }
}

fn moved(before: &[Vec<f64>], after: &[Vec<f64>]) -> usize {
    before.iter().zip(after).filter(|(a, b)| a != b).count()
}

/// Index of the closest centroid; ties go to the lowest index.
pub fn nearest(centroids: &[Vec<f64>], vector: &[f64], metric: DistanceMetric) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (idx, c) in centroids.iter().enumerate() {
        let dist = metric.distance(c, vector);
        if dist < best_dist {
            best = idx;
            best_dist = dist;
        }
    }
    best
}

/// One assign + update round against an immutable centroid snapshot.
///
/// Partial result per centroid: `(component sum, member count)`. A centroid
/// without members keeps its position.
struct CentroidUpdate<'a> {
    centroids: &'a [Vec<f64>],
    metric: DistanceMetric,
}

impl CombineFn<Measurement, Vec<(Vec<f64>, u64)>, Vec<Vec<f64>>> for CentroidUpdate<'_> {
    fn create(&self) -> Vec<(Vec<f64>, u64)> {
        let dim = self.centroids.first().map_or(0, Vec::len);
        vec![(vec![0.0; dim], 0); self.centroids.len()]
    }

    fn add_input(&self, acc: &mut Vec<(Vec<f64>, u64)>, m: &Measurement) {
        let (sum, count) = &mut acc[nearest(self.centroids, m.vector(), self.metric)];
        for (s, v) in sum.iter_mut().zip(m.vector()) {
            *s += v;
        }
        *count += 1;
    }

    fn merge(&self, acc: &mut Vec<(Vec<f64>, u64)>, other: Vec<(Vec<f64>, u64)>) {
        for ((sum, count), (other_sum, other_count)) in acc.iter_mut().zip(other) {
            for (s, o) in sum.iter_mut().zip(other_sum) {
                *s += o;
            }
            *count += other_count;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(&self, acc: Vec<(Vec<f64>, u64)>) -> Vec<Vec<f64>> {
        acc.into_iter()
            .zip(self.centroids)
            .map(|((sum, count), old)| {
                if count == 0 {
                    old.clone()
                } else {
                    sum.into_iter().map(|s| s / count as f64).collect()
                }
            })
            .collect()
    }
}

impl Aggregator for KMeansAggregator {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn aggregate(
        &self,
        dataset: &Dataset,
        input: MeasurementStream<'_>,
        ctx: &Context,
    ) -> Result<Vec<AggregationResult>> {
        let inputs = collect_input(input)?;
        let kind = AggregationKind::KMeans {
            k: self.k,
            iterations: self.iterations,
            metric: self.metric,
        };
        if inputs.is_empty() {
            warn!("kmeans received no measurements; emitting an empty aggregation");
            let aggregation = ctx.new_aggregation(dataset, kind, Default::default(), &[]);
            return Ok(vec![AggregationResult::new(aggregation, Vec::new())]);
        }

        let runner = ctx.runner();
        let centroids = self.fit(&inputs, runner);
        let assignment = runner.map(&inputs, |m| Ok(nearest(&centroids, m.vector(), self.metric)))?;

        let mut members: Vec<Vec<EntityId>> = vec![Vec::new(); centroids.len()];
        for (m, idx) in inputs.iter().zip(&assignment) {
            members[*idx].push(m.id());
        }

        let mut children = Vec::with_capacity(centroids.len());
        for (centroid, parents) in centroids.into_iter().zip(members) {
            let size = i64::try_from(parents.len()).unwrap_or(i64::MAX);
            children.push(ctx.derive_measurement(centroid, parents)?.with_field(SIZE_FIELD, size));
        }

        let aggregation = ctx.new_aggregation(
            dataset,
            kind,
            inputs.iter().map(Measurement::id).collect(),
            &children,
        );
        Ok(vec![AggregationResult::new(aggregation, children)])
    }
}
