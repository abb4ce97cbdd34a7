//! Ingest of tab-separated observation files
//!
//! Observation files hold one raw occurrence record per row, keyed by
//! project-tagged n-gram:
//!
//! ```text
//! <ngram> \t <day ordinal> \t <count>
//! ```
//!
//! Rows for one n-gram may be spread across files and arrive in any order.
//! Files ending in `.gz` are decompressed on the fly. Each file is read and
//! pre-aggregated by its own task, per-file partial aggregations are merged
//! as tasks finish, and the merged result is finalized in parallel.

use crate::{
    config::BuildConfig,
    datevec::Day,
    progress::ProgressReport,
    series::{NgramSeries, SeriesBuilder},
    Ngram, Result,
};
use anyhow::Context;
use async_compression::tokio::bufread::GzipDecoder;
use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Deserialize;
use std::{
    collections::{hash_map, HashMap},
    path::PathBuf,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, BufReader},
    task::JoinSet,
};
use tokio_util::io::InspectReader;

/// One raw occurrence record from an observation file
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct Observation {
    /// Project-tagged n-gram key
    ngram: Ngram,

    /// Day of occurrence, as a proleptic Gregorian ordinal
    day: Day,

    /// Number of occurrences recorded on that day
    count: u64,
}

/// Partial aggregation of the observations from one file
type FileBuilders = HashMap<Ngram, SeriesBuilder>;

/// Read a set of observation files, aggregate and filter their n-grams
pub async fn read_and_aggregate_all(
    config: Arc<BuildConfig>,
    paths: Vec<PathBuf>,
    report: &ProgressReport,
) -> Result<Vec<NgramSeries>> {
    // Size up the inputs so byte-level progress can be tracked
    let mut total_bytes = 0;
    for path in &paths {
        let metadata = (fs::metadata(path).await)
            .with_context(|| format!("inspecting observation file {}", path.display()))?;
        total_bytes += metadata.len();
    }
    let files = report.add_steps("Reading observation files", paths.len());
    let bytes = report.add_bytes("Processing observation bytes", total_bytes);

    // Read and pre-aggregate each file in its own task
    let mut tasks = JoinSet::new();
    for path in paths {
        tasks.spawn(read_and_aggregate(path, bytes.clone()));
    }

    // Merge partial aggregations as files finish
    let mut builders = FileBuilders::new();
    while let Some(file_builders) = tasks.join_next().await {
        let file_builders = file_builders.context("collecting results from one observation file")??;
        for (ngram, builder) in file_builders {
            match builders.entry(ngram) {
                hash_map::Entry::Occupied(o) => o.into_mut().merge(builder),
                hash_map::Entry::Vacant(v) => {
                    v.insert(builder);
                }
            }
        }
        files.inc(1);
    }
    files.finish_and_clear();
    bytes.finish_and_clear();

    // Densify and filter each n-gram, in parallel since every key is
    // independent; sort for deterministic table order
    let mut table = builders
        .into_par_iter()
        .filter_map(|(ngram, builder)| builder.finish(ngram, &config))
        .collect::<Vec<_>>();
    table.par_sort_unstable_by(|a, b| a.ngram.cmp(&b.ngram));
    Ok(table)
}

/// Read one observation file and aggregate its rows per n-gram
async fn read_and_aggregate(path: PathBuf, bytes: ProgressBar) -> Result<FileBuilders> {
    let context = || format!("reading observation file {}", path.display());
    let file = File::open(&path).await.with_context(context)?;

    // Track how many raw (compressed) bytes have been read so far
    let file = InspectReader::new(file, move |chunk: &[u8]| bytes.inc(chunk.len() as u64));
    let reader = BufReader::new(file);

    // Decompress on the fly when the file is gzipped
    let reader: Box<dyn AsyncRead + Send + Unpin> =
        if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzipDecoder::new(reader))
        } else {
            Box::new(reader)
        };

    // Apply TSV decoder to the byte stream
    let mut observations = AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .create_deserializer(reader)
        .into_deserialize::<Observation>();

    // Accumulate observations per n-gram key
    let mut builders = FileBuilders::new();
    while let Some(observation) = observations.next().await {
        let Observation { ngram, day, count } = observation.with_context(context)?;
        builders.entry(ngram).or_default().add(day, count);
    }
    Ok(builders)
}
