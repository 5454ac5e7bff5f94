use aggrbeam::aggregators::{Aggregator, TimeAggregator};
use aggrbeam::testing::*;
use aggrbeam::{AggrError, AggregationKind, AggregationResult, Parameters};
use anyhow::Result;
use std::collections::BTreeSet;

fn window(r: &AggregationResult) -> (i64, i64) {
    match r.aggregation.kind() {
        AggregationKind::Time { start, end } => (*start, *end),
        other => panic!("not a time aggregation: {other:?}"),
    }
}

/// Eleven points, one every 100 ms from 0 to 1000.
fn ticks(t: &TestContext) -> Vec<aggrbeam::Measurement> {
    let rows: Vec<([f64; 2], i64)> = (0..=10).map(|i| ([i as f64, 0.0], i * 100)).collect();
    timed_points(&t.ctx, &rows)
}

#[test]
fn detail_four_yields_seven_windows() -> Result<()> {
    let t = TestContext::new()?;
    let results = TimeAggregator::new(4)?.aggregate(&t.dataset, stream(ticks(&t)), &t.ctx)?;
    assert_eq!(results.len(), 7);

    let windows: Vec<(i64, i64)> = results.iter().map(window).collect();
    assert_collections_equal(
        &windows,
        &[
            (0, 1000),
            (0, 500),
            (500, 1000),
            (0, 250),
            (250, 500),
            (500, 750),
            (750, 1000),
        ],
    );
    for r in &results {
        assert_provenance_consistent(r);
    }
    Ok(())
}

#[test]
fn finest_level_partitions_the_input() -> Result<()> {
    let t = TestContext::new()?;
    let input = ticks(&t);
    let all: BTreeSet<_> = input.iter().map(|m| m.id()).collect();
    let results = TimeAggregator::new(4)?.aggregate(&t.dataset, stream(input), &t.ctx)?;

    let finest = &results[3..];
    let sizes: Vec<usize> = finest.iter().map(|r| r.measurements.len()).collect();
    // the maximum (1000) lands in the last window
    assert_collections_equal(&sizes, &[3, 2, 3, 3]);

    let mut covered = BTreeSet::new();
    for r in finest {
        for source in r.aggregation.sources() {
            assert!(covered.insert(*source), "{source} is in two windows");
        }
    }
    assert_eq!(covered, all);

    // coarsest level holds everything
    assert_eq!(results[0].measurements.len(), 11);
    Ok(())
}

#[test]
fn children_copy_vector_and_timestamp() -> Result<()> {
    let t = TestContext::new()?;
    let input = ticks(&t);
    let results = TimeAggregator::new(1)?.aggregate(&t.dataset, stream(input.clone()), &t.ctx)?;
    assert_eq!(results.len(), 1);
    for (child, parent) in results[0].measurements.iter().zip(&input) {
        assert_eq!(child.vector(), parent.vector());
        assert_eq!(child.timestamp(), parent.timestamp());
        assert_eq!(child.parents(), &BTreeSet::from([parent.id()]));
        assert!(child.id() > parent.id());
    }
    Ok(())
}

#[test]
fn default_detail_is_eight() -> Result<()> {
    let t = TestContext::new()?;
    let agg = TimeAggregator::from_context(&t.ctx)?;
    assert_eq!(agg.detail(), 8);
    let results = agg.aggregate(&t.dataset, stream(ticks(&t)), &t.ctx)?;
    assert_eq!(results.len(), 1 + 2 + 4 + 8);
    Ok(())
}

#[test]
fn identical_timestamps_collapse_to_one_window() -> Result<()> {
    let t = TestContext::with_params(Parameters::from_pairs([("time.detail", "4")]))?;
    let input = timed_points(&t.ctx, &[([0.0, 0.0], 42), ([1.0, 1.0], 42)]);
    let results = TimeAggregator::from_context(&t.ctx)?.aggregate(&t.dataset, stream(input), &t.ctx)?;
    assert_eq!(results.len(), 1);
    assert_eq!(window(&results[0]), (42, 42));
    assert_eq!(results[0].measurements.len(), 2);
    Ok(())
}

#[test]
fn empty_input_yields_nothing() -> Result<()> {
    let t = TestContext::new()?;
    let results = TimeAggregator::new(8)?.aggregate(&t.dataset, stream(Vec::new()), &t.ctx)?;
    assert!(results.is_empty());
    Ok(())
}

#[test]
fn missing_timestamp_is_an_error() -> Result<()> {
    let t = TestContext::new()?;
    let mut input = timed_points(&t.ctx, &[([0.0, 0.0], 1)]);
    let bare = t.ctx.new_measurement(vec![1.0, 1.0]);
    let bare_id = bare.id();
    input.push(bare);

    let err = TimeAggregator::new(2)?
        .aggregate(&t.dataset, stream(input), &t.ctx)
        .unwrap_err();
    assert!(matches!(err, AggrError::MissingTimestamp(id) if id == bare_id));
    Ok(())
}
