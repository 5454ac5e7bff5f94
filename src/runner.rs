//! Execution engine shared by all aggregators.
//!
//! Two execution shapes satisfy the same contract and must produce the same
//! logical results:
//!
//! - [`ExecMode::Local`]: one process, element-wise work spread over a rayon pool.
//!   Combines fold fixed-size chunks and merge them in chunk order, so the
//!   result does not depend on the pool size or on scheduling.
//! - [`ExecMode::Partitioned`]: the input is split into contiguous partitions that
//!   are processed by independent workers; per-partition outputs are concatenated
//!   in partition order, per-partition accumulators are merged at a barrier.
//!
//! The runner only runs pure per-element functions and combiners. Anything that
//! allocates ids or assembles aggregations stays on the calling thread.
//! A failing element aborts the whole call; no partial output is returned.

use crate::combiners::CombineFn;
use crate::error::{AggrError, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use tracing::debug;

/// Elements per accumulator in local combines.
const LOCAL_CHUNK: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Local {
        threads: Option<usize>,
    },
    Partitioned {
        partitions: Option<usize>,
        threads: Option<usize>,
    },
}

impl Default for ExecMode {
    fn default() -> Self {
        ExecMode::Local { threads: None }
    }
}

#[derive(Clone)]
pub struct Runner {
    pub mode: ExecMode,
    pub default_partitions: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::default(),
            default_partitions: 2 * num_cpus::get().max(2),
            pool: None,
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("mode", &self.mode)
            .field("default_partitions", &self.default_partitions)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Build a runner; a dedicated pool is created when the mode pins a thread count.
    pub fn new(mode: ExecMode) -> Result<Self> {
        let threads = match mode {
            ExecMode::Local { threads } | ExecMode::Partitioned { threads, .. } => threads,
        };
        let pool = match threads {
            Some(t) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(t.max(1))
                    .build()
                    .map_err(|e| AggrError::Pool(e.to_string()))?,
            )),
            None => None,
        };
        Ok(Self {
            mode,
            pool,
            ..Default::default()
        })
    }

    pub fn is_partitioned(&self) -> bool {
        matches!(self.mode, ExecMode::Partitioned { .. })
    }

    /// Number of partitions used for `len` elements (1 in local mode).
    pub fn partitions_for(&self, len: usize) -> usize {
        match self.mode {
            ExecMode::Local { .. } => 1,
            ExecMode::Partitioned { partitions, .. } => partitions
                .unwrap_or(self.default_partitions)
                .max(1)
                .min(len.max(1)),
        }
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Apply `f` to every element, keeping input order.
    pub fn map<T, O, F>(&self, input: &[T], f: F) -> Result<Vec<O>>
    where
        T: Sync,
        O: Send,
        F: Fn(&T) -> Result<O> + Sync + Send,
    {
        match self.mode {
            ExecMode::Local { .. } => {
                self.install(|| input.par_iter().map(&f).collect::<Result<Vec<O>>>())
            }
            ExecMode::Partitioned { .. } => {
                let ranges = split_ranges(input.len(), self.partitions_for(input.len()));
                debug!(partitions = ranges.len(), elements = input.len(), "partitioned map");
                let parts = self.install(|| {
                    ranges
                        .into_par_iter() // one worker per partition
                        .map(|(start, end)| {
                            input[start..end].iter().map(&f).collect::<Result<Vec<O>>>()
                        })
                        .collect::<Result<Vec<Vec<O>>>>()
                })?;
                Ok(parts.into_iter().flatten().collect())
            }
        }
    }

    /// Fold every element into one output with `comb`.
    ///
    /// Each chunk (local mode) or partition builds its own accumulator; the merge
    /// step runs once all of them are done, in input order.
    pub fn combine<T, A, O, C>(&self, input: &[T], comb: &C) -> O
    where
        T: Sync,
        A: Send,
        C: CombineFn<T, A, O>,
    {
        match self.mode {
            ExecMode::Local { .. } => {
                let locals: Vec<A> = self.install(|| {
                    input
                        .par_chunks(LOCAL_CHUNK)
                        .map(|chunk| fold_slice(comb, chunk))
                        .collect()
                });
                merge_in_order(comb, locals)
            }
            ExecMode::Partitioned { .. } => {
                let ranges = split_ranges(input.len(), self.partitions_for(input.len()));
                debug!(partitions = ranges.len(), elements = input.len(), "partitioned combine");
                let locals: Vec<A> = self.install(|| {
                    ranges
                        .into_par_iter()
                        .map(|(start, end)| fold_slice(comb, &input[start..end]))
                        .collect()
                });
                // barrier: every partition has finished before merging
                merge_in_order(comb, locals)
            }
        }
    }
}

fn fold_slice<T, A, O, C: CombineFn<T, A, O>>(comb: &C, slice: &[T]) -> A {
    let mut acc = comb.create();
    for v in slice {
        comb.add_input(&mut acc, v);
    }
    acc
}

fn merge_in_order<T, A, O, C: CombineFn<T, A, O>>(comb: &C, locals: Vec<A>) -> O {
    let mut merged = comb.create();
    for acc in locals {
        comb.merge(&mut merged, acc);
    }
    comb.finish(merged)
}

/// Split `[0, len)` into `parts` contiguous `(start, end)` ranges.
///
/// Remainders go to the leading ranges; ranges are never empty. An empty input
/// yields no ranges.
fn split_ranges(len: usize, parts: usize) -> Vec<(usize, usize)> {
    let parts = parts.max(1).min(len.max(1));
    let base = len / parts;
    let rem = len % parts;

    let mut out = Vec::with_capacity(parts);
    let mut start = 0usize;
    for idx in 0..parts {
        let extra = usize::from(idx < rem);
        let end = start + base + extra;
        if start < end {
            out.push((start, end));
        }
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiners::AverageF64;

    #[test]
    fn split_ranges_cover_input() {
        assert_eq!(split_ranges(10, 3), vec![(0, 4), (4, 7), (7, 10)]);
        assert_eq!(split_ranges(2, 8), vec![(0, 1), (1, 2)]);
        assert!(split_ranges(0, 4).is_empty());
    }

    #[test]
    fn map_preserves_order_in_both_modes() -> Result<()> {
        let input: Vec<u32> = (0..1000).collect();
        let local = Runner::new(ExecMode::Local { threads: Some(2) })?;
        let parted = Runner::new(ExecMode::Partitioned {
            partitions: Some(7),
            threads: Some(3),
        })?;
        let a = local.map(&input, |x| Ok(x * 2))?;
        let b = parted.map(&input, |x| Ok(x * 2))?;
        assert_eq!(a, b);
        assert_eq!(a[999], 1998);
        Ok(())
    }

    #[test]
    fn map_fails_fast() {
        let runner = Runner::new(ExecMode::Partitioned {
            partitions: Some(4),
            threads: None,
        })
        .unwrap();
        let input: Vec<u32> = (0..100).collect();
        let out = runner.map(&input, |x| {
            if *x == 42 {
                Err(AggrError::Pool("boom".into()))
            } else {
                Ok(*x)
            }
        });
        assert!(out.is_err());
    }

    #[test]
    fn combine_is_partition_independent() -> Result<()> {
        let input: Vec<f64> = (1..=100).map(f64::from).collect();
        let local = Runner::new(ExecMode::default())?;
        let parted = Runner::new(ExecMode::Partitioned {
            partitions: Some(9),
            threads: None,
        })?;
        assert_eq!(local.combine(&input, &AverageF64), 50.5);
        assert_eq!(parted.combine(&input, &AverageF64), 50.5);
        Ok(())
    }

    #[test]
    fn local_combine_ignores_pool_size() -> Result<()> {
        // sums that cancel are sensitive to the order of additions
        let input: Vec<f64> = (0..20_000)
            .map(|i| match i % 3 {
                0 => 1e16,
                1 => 1.0 + f64::from(i) * 1e-3,
                _ => -1e16,
            })
            .collect();
        let single = Runner::new(ExecMode::Local { threads: Some(1) })?;
        let wide = Runner::new(ExecMode::Local { threads: Some(8) })?;

        let expected = single.combine(&input, &AverageF64).to_bits();
        for _ in 0..5 {
            assert_eq!(wide.combine(&input, &AverageF64).to_bits(), expected);
        }
        Ok(())
    }
}
