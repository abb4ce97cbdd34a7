//! Per-project daily totals and their sufficiency masks
//!
//! The totals file maps each source project tag to the total number of
//! observations collected per day from that project. It is produced upstream
//! of this tool and consumed read-only here: once to normalize every n-gram
//! series to a per-million rate, and once per sparse project to derive the
//! sufficiency mask.

use crate::{
    config::CorrelateConfig,
    datevec::DateVector,
    mask::{self, VolumeFloor},
    Result,
};
use anyhow::Context;
use std::{collections::HashMap, path::Path};
use tokio::fs;

/// Daily totals of one source project, ready for correlation
#[derive(Clone, Debug, PartialEq)]
pub struct TotalsEntry {
    /// Total observations collected per day
    pub series: DateVector<f32>,

    /// Sufficiency mask, present for sparse projects only
    pub mask: Option<DateVector<bool>>,
}

/// On-disk form of the totals file: project tag to daily totals
pub type TotalsFile = HashMap<String, DateVector<f32>>;

/// Source project tag of an n-gram key
///
/// N-gram keys are prefixed with their source project tag, separated by a
/// space (e.g. `t@ hello` for a sparse-source n-gram).
pub fn project_tag(ngram: &str) -> &str {
    ngram.split(' ').next().unwrap_or(ngram)
}

/// Load the totals file and derive sparse-project masks
pub async fn load(config: &CorrelateConfig, path: &Path) -> Result<HashMap<Box<str>, TotalsEntry>> {
    let bytes = (fs::read(path).await)
        .with_context(|| format!("reading totals file {}", path.display()))?;
    let raw = bincode::deserialize::<TotalsFile>(&bytes)
        .with_context(|| format!("decoding totals file {}", path.display()))?;
    let mut totals = HashMap::with_capacity(raw.len());
    for (project, series) in raw {
        let mask = if config.is_sparse(&project) {
            let mask = mask::build_mask(
                &project,
                &series,
                config.sample_rate,
                &VolumeFloor::default(),
            )?;
            let masked = mask.values().iter().filter(|&&ok| !ok).count();
            log::debug!(
                "Masked {masked} of {} days of sparse project {project:?}",
                mask.len()
            );
            Some(mask)
        } else {
            None
        };
        totals.insert(project.into(), TotalsEntry { series, mask });
    }
    Ok(totals)
}
