//! Processing pipeline configuration

use crate::{BuildArgs, CorrelateArgs, Result};
use std::{num::NonZeroU64, sync::Arc};

/// Final configuration of the aggregation phase
///
/// This is the result of digesting [`BuildArgs`]. Please refer to
/// [`BuildArgs`] to know more about individual fields.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BuildConfig {
    /// Minimum total occurrence count for an n-gram to be retained
    pub min_occur: NonZeroU64,
}
//
impl BuildConfig {
    /// Determine aggregation configuration from CLI arguments
    pub(crate) fn new(args: &BuildArgs) -> Arc<Self> {
        Arc::new(Self {
            min_occur: args.min_occur,
        })
    }
}

/// Final configuration of the correlation phase
///
/// This is the result of digesting [`CorrelateArgs`]. Please refer to
/// [`CorrelateArgs`] to know more about individual fields.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelateConfig {
    /// Minimum normalized peak (parts per million) to keep a candidate
    pub min_ppm: f32,

    /// Minimum correlation magnitude to report a match
    pub min_similarity: f64,

    /// Sampling rate of sparse sources, for the sufficiency heuristic
    pub sample_rate: f64,

    /// Project tags whose data has holes and needs sufficiency masking
    pub sparse_projects: Vec<Box<str>>,
}
//
impl CorrelateConfig {
    /// Determine correlation configuration from CLI arguments
    pub(crate) fn new(args: &CorrelateArgs) -> Result<Arc<Self>> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&args.min_similarity),
            "a correlation magnitude threshold of {} can never be met",
            args.min_similarity
        );
        anyhow::ensure!(
            args.sample_rate > 0.0 && args.sample_rate <= 1.0,
            "sample rate {} is not a valid sampling fraction",
            args.sample_rate
        );
        Ok(Arc::new(Self {
            min_ppm: args.min_ppm,
            min_similarity: args.min_similarity,
            sample_rate: args.sample_rate,
            sparse_projects: (args.sparse_project.iter())
                .map(|tag| tag.as_str().into())
                .collect(),
        }))
    }

    /// Truth that a project's data is sparse and subject to masking
    pub fn is_sparse(&self, project: &str) -> bool {
        self.sparse_projects.iter().any(|tag| &**tag == project)
    }
}
