//! Local and partitioned execution must produce the same aggregations.

use aggrbeam::aggregators::Aggregator;
use aggrbeam::testing::*;
use aggrbeam::{AggregationResult, Measurement, Parameters};
use anyhow::Result;

fn run(t: &TestContext, name: &str, input: &[Measurement]) -> Result<Vec<AggregationResult>> {
    let aggregator = t.ctx.registry().create(name, &t.ctx)?;
    Ok(aggregator.aggregate(&t.dataset, stream(input.to_vec()), &t.ctx)?)
}

fn assert_equivalent(local: &[AggregationResult], parted: &[AggregationResult], tolerance: f64) {
    assert_eq!(local.len(), parted.len(), "result count");
    for (l, p) in local.iter().zip(parted) {
        assert_eq!(l.aggregation.kind(), p.aggregation.kind());
        assert_eq!(l.aggregation.sources(), p.aggregation.sources());
        assert_eq!(l.measurements.len(), p.measurements.len());
        for (lm, pm) in l.measurements.iter().zip(&p.measurements) {
            assert_vectors_close(pm.vector(), lm.vector(), tolerance);
            assert_eq!(lm.fields(), pm.fields());
            assert_eq!(lm.timestamp(), pm.timestamp());
            assert_eq!(lm.parents(), pm.parents());
        }
        assert_provenance_consistent(p);
    }
}

#[test]
fn grid_is_mode_independent() -> Result<()> {
    let (local, parted) = TestContext::local_and_partitioned(Parameters::new(), 3)?;
    let input = sample_rides(&local.ctx);
    assert_equivalent(&run(&local, "grid", &input)?, &run(&parted, "grid", &input)?, 0.0);
    Ok(())
}

#[test]
fn time_is_mode_independent() -> Result<()> {
    let params = Parameters::from_pairs([("time.detail", "4")]);
    let (local, parted) = TestContext::local_and_partitioned(params, 5)?;
    let input = sample_rides(&local.ctx);
    let l = run(&local, "time", &input)?;
    assert_eq!(l.len(), 7);
    assert_equivalent(&l, &run(&parted, "time", &input)?, 0.0);
    Ok(())
}

#[test]
fn kmeans_is_mode_independent() -> Result<()> {
    let params = Parameters::from_pairs([("kmeans.centroids", "2"), ("kmeans.iterations", "6")]);
    let (local, parted) = TestContext::local_and_partitioned(params, 4)?;
    let input = sample_rides(&local.ctx);
    let l = run(&local, "kmeans", &input)?;
    assert_eq!(l[0].measurements.len(), 2);
    // partial sums are added in a different order
    assert_equivalent(&l, &run(&parted, "kmeans", &input)?, 1e-9);
    Ok(())
}

#[test]
fn combination_is_mode_independent() -> Result<()> {
    let params = Parameters::from_pairs([
        ("combination.type", "difference"),
        ("combination.primary", "late"),
        ("combination.others", "early"),
    ]);
    let (local, parted) = TestContext::local_and_partitioned(params, 2)?;
    let rows: Vec<([f64; 2], f64)> = (0..9).map(|i| ([i as f64, 1.0], i as f64 * 2.0)).collect();
    let mut input = sourced_values(&local.ctx, "late", &rows);
    let earlier: Vec<([f64; 2], f64)> = rows.iter().rev().map(|(v, x)| (*v, x / 2.0)).collect();
    input.extend(sourced_values(&parted.ctx, "early", &earlier));

    let l = run(&local, "combination", &input)?;
    assert_eq!(l[0].measurements.len(), 9);
    assert_eq!(l[0].measurements[4].numeric_field("value")?, 4.0);
    assert_equivalent(&l, &run(&parted, "combination", &input)?, 0.0);
    Ok(())
}
