//! Find n-grams whose daily frequency trend correlates with reference time
//! series (event indicators, case counts...), over large text corpora.
//!
//! The pipeline runs in two phases. `build` aggregates raw per-day
//! occurrence observations into one daily time series per n-gram, filtering
//! out n-grams that occur too rarely to matter. `correlate` loads the
//! aggregated table, normalizes each series to a per-million rate against
//! its source project's daily totals, and ranks n-grams by the magnitude of
//! their masked Pearson correlation with each reference series.

mod config;
mod correlate;
mod datevec;
mod mask;
mod progress;
mod rank;
mod series;
mod table;
mod targets;
mod totals;
mod tsv;

use crate::{
    config::{BuildConfig, CorrelateConfig},
    correlate::CorrelateContext,
    progress::ProgressReport,
};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use rayon::prelude::*;
use std::{num::NonZeroU64, path::PathBuf};

/// Correlate n-gram frequency time series against reference series
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate raw observations into per-n-gram daily time series
    Build(BuildArgs),

    /// Correlate an aggregated series table against reference series
    Correlate(CorrelateArgs),
}

/// Arguments of the aggregation phase
#[derive(clap::Args, Debug)]
pub(crate) struct BuildArgs {
    /// Observation files to aggregate
    ///
    /// Tab-separated rows of `ngram`, `day ordinal`, `count`; files ending
    /// in .gz are decompressed on the fly. Rows for one n-gram may be
    /// spread across files and arrive in any order.
    #[arg(required = true)]
    pub(crate) inputs: Vec<PathBuf>,

    /// Where to write the aggregated series table
    #[arg(short, long)]
    pub(crate) output: PathBuf,

    /// Minimum total occurrence count to retain an n-gram
    ///
    /// N-grams occurring fewer times than this across the whole input are
    /// dropped from the table. Extremely rare n-grams cannot produce a
    /// meaningful daily trend, and dropping them early keeps the table (and
    /// every later correlation run) small.
    #[arg(short = 'm', long, default_value = "5")]
    pub(crate) min_occur: NonZeroU64,
}

/// Arguments of the correlation phase
#[derive(clap::Args, Debug)]
pub(crate) struct CorrelateArgs {
    /// Aggregated series table produced by the build phase
    pub(crate) table: PathBuf,

    /// Per-project daily totals file
    ///
    /// Maps each source project tag to the total number of observations
    /// collected per day, which is what n-gram series are normalized
    /// against.
    #[arg(short, long)]
    pub(crate) totals: PathBuf,

    /// Reference CSV files to correlate against
    ///
    /// One file per target group: a `date` column of ISO dates plus one
    /// column per named series, with optional `<name>:mask` columns. The
    /// file stem becomes part of each target's name.
    #[arg(short, long, required = true)]
    pub(crate) reference: Vec<PathBuf>,

    /// Directory receiving one ranked TSV output file per target
    #[arg(short, long)]
    pub(crate) out_dir: PathBuf,

    /// Minimum normalized peak, in parts per million
    ///
    /// An n-gram whose rate never reaches this many parts per million of
    /// its project's daily volume is too invisible for its correlation to
    /// mean anything, and is skipped before any correlation is computed.
    #[arg(long, default_value = "10")]
    pub(crate) min_ppm: f32,

    /// Minimum correlation magnitude to report a match
    #[arg(long, default_value = "0.8")]
    pub(crate) min_similarity: f64,

    /// Sampling rate of sparse sources
    ///
    /// Fraction of the full stream that sparse sources actually collect,
    /// used by the per-day data-sufficiency heuristic.
    #[arg(long, default_value = "0.01")]
    pub(crate) sample_rate: f64,

    /// Project tag whose data has holes and needs sufficiency masking
    ///
    /// May be given several times. Days with too little data from these
    /// projects are excluded from correlation.
    #[arg(long, default_value = "t@")]
    pub(crate) sparse_project: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse();

    match args.command {
        Command::Build(args) => run_build(args).await,
        Command::Correlate(args) => run_correlate(args).await,
    }
}

/// Run the aggregation phase
async fn run_build(args: BuildArgs) -> Result<()> {
    let config = BuildConfig::new(&args);
    let report = ProgressReport::new();
    let table = tsv::read_and_aggregate_all(config, args.inputs, &report).await?;
    log::info!("Aggregated {} ngrams above the occurrence threshold", table.len());
    table::save(&args.output, &table).await
}

/// Run the correlation phase
async fn run_correlate(args: CorrelateArgs) -> Result<()> {
    let config = CorrelateConfig::new(&args)?;
    let report = ProgressReport::new();

    // Load the read-only run state: series table, totals, targets
    let table = table::load(&args.table).await?;
    let totals = totals::load(&config, &args.totals).await?;
    let targets = targets::load(&args.reference).await?;
    anyhow::ensure!(
        !targets.is_empty(),
        "reference files contain no target series"
    );
    log::info!(
        "Correlating {} ngrams against {} targets",
        table.len(),
        targets.len()
    );
    let context = CorrelateContext {
        config,
        totals,
        targets,
    };

    // Sweep over n-grams in parallel; evaluations only read shared state.
    // Collecting in table order keeps the ranker's tie-break deterministic.
    let sweep = report.add_percent("Correlating", table.len());
    let matches = table
        .par_iter()
        .map(|ngram| {
            let matches = context.evaluate(ngram);
            sweep.inc(1);
            matches
        })
        .collect::<Result<Vec<_>>>()?;
    sweep.finish_and_clear();

    // Rank each target's matches and write them out
    let mut per_target =
        rank::collect_by_target(context.targets.len(), matches.into_iter().flatten());
    for matches in &mut per_target {
        rank::sort_matches(matches);
    }
    rank::write_ranked(&args.out_dir, &context.targets, per_target).await
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Project-tagged n-gram key
pub type Ngram = Box<str>;

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
