use aggrbeam::aggregators::MeasurementStream;
use aggrbeam::io::{AggrReader, MemoryReader};
use aggrbeam::testing::*;
use aggrbeam::{AggrError, CompositeAggrWriter, Context, Execution, Parameters};
use anyhow::Result;

/// Yields one good measurement, then an I/O failure.
struct FailingReader;

impl AggrReader for FailingReader {
    fn read(&self, location: &str, ctx: &Context) -> aggrbeam::Result<MeasurementStream<'static>> {
        let first = ctx.new_measurement(vec![1.0, 2.0]);
        let failure = AggrError::io(
            location,
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"),
        );
        Ok(Box::new([Ok(first), Err(failure)].into_iter()))
    }
}

#[test]
fn unknown_aggregator_fails_before_reading() -> Result<()> {
    let ctx = Context::new(Parameters::from_pairs([("input", "/nonexistent/rides.csv")]))?;
    match Execution::new("hexbin", &ctx) {
        Err(AggrError::UnknownAggregator { name, known }) => {
            assert_eq!(name, "hexbin");
            assert!(known.contains("kmeans"));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("hexbin should not resolve"),
    }
    Ok(())
}

#[test]
fn empty_time_run_writes_no_dataset() -> Result<()> {
    let t = TestContext::new()?;
    let mut writer = CompositeAggrWriter::shared(t.writer.clone());
    let summary = Execution::new("time", &t.ctx)?.run_with(
        &MemoryReader::default(),
        "empty",
        &mut writer,
        &t.ctx,
    )?;

    assert_eq!(summary.results, 0);
    assert!(!summary.dataset_written);
    let captured = t.writer.snapshot();
    assert!(captured.aggregations.is_empty());
    assert!(captured.datasets.is_empty());
    assert_eq!(captured.flushes, 1);
    Ok(())
}

#[test]
fn empty_grid_run_still_writes_dataset_once() -> Result<()> {
    let t = TestContext::with_params(Parameters::from_pairs([("dataset.id", "quiet")]))?;
    let mut writer = CompositeAggrWriter::shared(t.writer.clone());
    let summary = Execution::new("grid", &t.ctx)?.run_with(
        &MemoryReader::default(),
        "empty",
        &mut writer,
        &t.ctx,
    )?;

    assert_eq!(summary.results, 1);
    assert_eq!(summary.measurements, 0);
    let captured = t.writer.snapshot();
    assert_eq!(captured.aggregations.len(), 1);
    assert_eq!(captured.datasets.len(), 1);
    assert_eq!(captured.datasets[0].id(), "quiet");
    Ok(())
}

#[test]
fn results_are_written_in_order() -> Result<()> {
    let t = TestContext::with_params(Parameters::from_pairs([("time.detail", "2")]))?;
    let input = timed_points(&t.ctx, &[([0.0, 0.0], 0), ([1.0, 0.0], 10), ([2.0, 0.0], 20)]);
    let mut writer = CompositeAggrWriter::shared(t.writer.clone());
    let execution = Execution::new("time", &t.ctx)?;
    assert_eq!(execution.dataset().id(), "aggr");
    let summary = execution.run_with(&MemoryReader::new(input), "memory", &mut writer, &t.ctx)?;

    assert_eq!(summary.results, 3);
    let captured = t.writer.snapshot();
    let ids: Vec<_> = captured.aggregations.iter().map(|a| a.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_collections_equal(&ids, &sorted);
    assert_eq!(
        captured.measurements_at(&captured.aggregations[0].data_path).len(),
        3
    );
    Ok(())
}

#[test]
fn reader_failure_aborts_without_output() -> Result<()> {
    let t = TestContext::new()?;
    let mut writer = CompositeAggrWriter::shared(t.writer.clone());
    let err = Execution::new("grid", &t.ctx)?
        .run_with(&FailingReader, "broken.csv", &mut writer, &t.ctx)
        .unwrap_err();
    assert!(matches!(err, AggrError::Io { ref location, .. } if location == "broken.csv"));

    let captured = t.writer.snapshot();
    assert!(captured.measurements.is_empty());
    assert!(captured.aggregations.is_empty());
    assert!(captured.datasets.is_empty());
    assert_eq!(captured.flushes, 0);
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn missing_input_keeps_previous_metadata() -> Result<()> {
    let ws = TempWorkspace::new()?;
    let output = ws.location("out");
    std::fs::create_dir(&output)?;
    let previous = "{\"kind\":\"dataset\",\"id\":\"rides\",\"title\":\"rides\"}\n";
    let metadata = ws.write("out/metadata.jsonl", previous)?;

    let ctx = Context::new(Parameters::from_pairs([
        ("input", ws.location("missing.csv").as_str()),
        ("output", output.as_str()),
    ]))?;
    let err = Execution::new("grid", &ctx)?.run(&ctx).unwrap_err();
    assert!(matches!(err, AggrError::Io { .. }));

    assert_eq!(std::fs::read_to_string(&metadata)?, previous);
    let entries = std::fs::read_dir(&output)?.count();
    assert_eq!(entries, 1);
    Ok(())
}
