use aggrbeam::context::Context as AggrContext;
use aggrbeam::exec::Execution;
use aggrbeam::params::{
    DATASET_ID_PARAM, INPUT_PARAM, OUTPUT_PARAM, PARTITIONS_PARAM, PROVENANCE_PARAM, Parameters,
    THREADS_PARAM,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aggrbeam")]
#[command(about = "Aggregate time-stamped vector measurements with provenance", long_about = None)]
struct Cli {
    /// Aggregator to run: grid, time, kmeans or combination
    aggregator: String,

    /// TOML file with parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    input: Option<String>,

    #[arg(short, long)]
    output: Option<String>,

    #[arg(long)]
    dataset: Option<String>,

    /// Write parent, source and component links
    #[arg(long)]
    provenance: bool,

    /// Run partitioned with this many partitions
    #[arg(long)]
    partitions: Option<usize>,

    #[arg(long)]
    threads: Option<usize>,

    /// Extra parameter as key=value, repeatable (e.g. -p grid.size=0.001)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,
}

impl Cli {
    fn parameters(&self) -> Result<Parameters> {
        let mut params = match &self.config {
            Some(path) => Parameters::from_toml_file(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => Parameters::new(),
        };
        for raw in &self.params {
            let (k, v) = Parameters::parse_assignment(raw)?;
            params.set(k, v);
        }
        let flags = [
            (INPUT_PARAM, self.input.clone()),
            (OUTPUT_PARAM, self.output.clone()),
            (DATASET_ID_PARAM, self.dataset.clone()),
            (PARTITIONS_PARAM, self.partitions.map(|n| n.to_string())),
            (THREADS_PARAM, self.threads.map(|n| n.to_string())),
            (PROVENANCE_PARAM, self.provenance.then(|| "true".to_string())),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                params.set(key, value);
            }
        }
        Ok(params)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let ctx = AggrContext::new(cli.parameters()?).context("build context")?;
    let execution = Execution::new(&cli.aggregator, &ctx)
        .with_context(|| format!("set up `{}` aggregation", cli.aggregator))?;
    let summary = execution.run(&ctx).context("aggregation run failed")?;

    info!(
        results = summary.results,
        measurements = summary.measurements,
        dataset = %summary.dataset,
        "done"
    );
    Ok(())
}
