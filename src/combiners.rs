//! Combiners: associative folds the [`Runner`](crate::runner::Runner) can execute
//! either as one pass or as per-partition accumulators merged at a barrier.
//!
//! A [`CombineFn`] splits a reduction into four steps:
//! `create` an empty accumulator, `add_input` one element, `merge` two
//! accumulators and `finish` into the output. The runner guarantees that the
//! result does not depend on how the input was partitioned, as long as `merge`
//! is associative.
//!
//! Built-in combiners:
//! - [`TimeSpan`] -- minimum and maximum timestamp.
//! - [`Sum`] -- sum of `f64` values.
//! - [`AverageF64`] -- arithmetic mean of `f64` values.
//!
//! The KMeans partial-sum combiner lives next to the clustering code in
//! [`aggregators::kmeans`](crate::aggregators::kmeans).

use crate::window::TimestampMs;

pub trait CombineFn<V, A, O>: Send + Sync {
    fn create(&self) -> A;
    fn add_input(&self, acc: &mut A, v: &V);
    fn merge(&self, acc: &mut A, other: A);
    fn finish(&self, acc: A) -> O;
}

/* ===================== TimeSpan ===================== */

/// `(min, max)` over timestamps; `None` for empty input.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeSpan;

impl CombineFn<TimestampMs, Option<(TimestampMs, TimestampMs)>, Option<(TimestampMs, TimestampMs)>>
    for TimeSpan
{
    fn create(&self) -> Option<(TimestampMs, TimestampMs)> {
        None
    }

    fn add_input(&self, acc: &mut Option<(TimestampMs, TimestampMs)>, v: &TimestampMs) {
        *acc = Some(match *acc {
            Some((lo, hi)) => (lo.min(*v), hi.max(*v)),
            None => (*v, *v),
        });
    }

    fn merge(
        &self,
        acc: &mut Option<(TimestampMs, TimestampMs)>,
        other: Option<(TimestampMs, TimestampMs)>,
    ) {
        if let Some((lo, hi)) = other {
            self.add_input(acc, &lo);
            self.add_input(acc, &hi);
        }
    }

    fn finish(
        &self,
        acc: Option<(TimestampMs, TimestampMs)>,
    ) -> Option<(TimestampMs, TimestampMs)> {
        acc
    }
}

/* ===================== Sum ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Sum;

impl CombineFn<f64, f64, f64> for Sum {
    fn create(&self) -> f64 {
        0.0
    }

    fn add_input(&self, acc: &mut f64, v: &f64) {
        *acc += v;
    }

    fn merge(&self, acc: &mut f64, other: f64) {
        *acc += other;
    }

    fn finish(&self, acc: f64) -> f64 {
        acc
    }
}

/* ===================== AverageF64 ===================== */

/// Average of `f64` values.
///
/// - Accumulator: `(sum, count)`
/// - Output: `f64`
///
/// Empty input produces `0.0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AverageF64;

impl CombineFn<f64, (f64, u64), f64> for AverageF64 {
    fn create(&self) -> (f64, u64) {
        (0.0, 0)
    }

    fn add_input(&self, acc: &mut (f64, u64), v: &f64) {
        acc.0 += v;
        acc.1 += 1;
    }

    fn merge(&self, acc: &mut (f64, u64), other: (f64, u64)) {
        acc.0 += other.0;
        acc.1 += other.1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(&self, acc: (f64, u64)) -> f64 {
        if acc.1 == 0 {
            0.0
        } else {
            acc.0 / (acc.1 as f64)
        }
    }
}

/// Fold a slice with a combiner in one pass, without a runner.
pub fn fold_all<V, A, O, C: CombineFn<V, A, O>>(comb: &C, values: &[V]) -> O {
    let mut acc = comb.create();
    for v in values {
        comb.add_input(&mut acc, v);
    }
    comb.finish(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_span_merges_partials() {
        let comb = TimeSpan;
        let mut left = comb.create();
        comb.add_input(&mut left, &50);
        comb.add_input(&mut left, &10);
        let mut right = comb.create();
        comb.add_input(&mut right, &70);
        comb.merge(&mut left, right);
        assert_eq!(comb.finish(left), Some((10, 70)));
        assert_eq!(fold_all(&comb, &[] as &[TimestampMs]), None);
    }

    #[test]
    fn average_of_three() {
        assert_eq!(fold_all(&AverageF64, &[10.0, 20.0, 30.0]), 20.0);
        assert_eq!(fold_all(&AverageF64, &[] as &[f64]), 0.0);
        assert_eq!(fold_all(&Sum, &[1.5, 2.5]), 4.0);
    }
}
