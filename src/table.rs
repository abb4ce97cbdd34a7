//! On-disk n-gram series table
//!
//! Output of the aggregation phase and input of the correlation phase: all
//! retained [`NgramSeries`] records, bincode-encoded as one sequence. The
//! n-gram key lives inside each record, so the table needs no separate
//! index.

use crate::{series::NgramSeries, Result};
use anyhow::Context;
use std::path::Path;
use tokio::fs;

/// Persist an aggregated series table
pub async fn save(path: &Path, table: &[NgramSeries]) -> Result<()> {
    let bytes = bincode::serialize(table).context("encoding the series table")?;
    (fs::write(path, bytes).await)
        .with_context(|| format!("writing series table {}", path.display()))
}

/// Load a series table produced by an earlier aggregation run
pub async fn load(path: &Path) -> Result<Vec<NgramSeries>> {
    let bytes = (fs::read(path).await)
        .with_context(|| format!("reading series table {}", path.display()))?;
    bincode::deserialize(&bytes)
        .with_context(|| format!("decoding series table {}", path.display()))
}
