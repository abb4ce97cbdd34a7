//! Per-n-gram aggregation of raw daily occurrence counts
//!
//! Accumulated using [`SeriesBuilder`], one builder per distinct n-gram key.

use crate::{
    config::BuildConfig,
    datevec::{DateVector, Day},
    Ngram,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Daily occurrence time series of one n-gram
///
/// The n-gram is carried inside the record (redundantly with any key it may
/// be stored under) so that a series can be used without retaining the key.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NgramSeries {
    /// The n-gram, prefixed with its source project tag
    pub ngram: Ngram,

    /// Total number of occurrences across all days
    pub total: u64,

    /// Occurrences per day, spanning first to last day of occurrence
    pub series: DateVector<f32>,
}

/// Accumulator for one n-gram's raw `(day, count)` observations
///
/// Observations may arrive in any order and the same day may occur several
/// times; counts for one day accumulate. The observed day range is tracked
/// as an explicit "nothing seen yet" state rather than sentinel bounds.
#[derive(Clone, Debug, Default)]
pub struct SeriesBuilder {
    /// Accumulated count per observed day
    counts: HashMap<Day, u64>,

    /// First and last day observed so far, if any
    bounds: Option<(Day, Day)>,
}
//
impl SeriesBuilder {
    /// Set up the accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate one raw observation
    pub fn add(&mut self, day: Day, count: u64) {
        *self.counts.entry(day).or_insert(0) += count;
        self.bounds = match self.bounds {
            Some((first, last)) => Some((first.min(day), last.max(day))),
            None => Some((day, day)),
        };
    }

    /// Merge observations accumulated by another builder for the same key
    ///
    /// Used when several input files were aggregated independently and their
    /// partial results must be combined before finalization.
    pub fn merge(&mut self, rhs: SeriesBuilder) {
        for (day, count) in rhs.counts {
            *self.counts.entry(day).or_insert(0) += count;
        }
        self.bounds = match (self.bounds, rhs.bounds) {
            (Some((f1, l1)), Some((f2, l2))) => Some((f1.min(f2), l1.max(l2))),
            (bounds, None) | (None, bounds) => bounds,
        };
    }

    /// Convert accumulated counts into a dense daily series
    ///
    /// Produces nothing when the n-gram occurred fewer than
    /// `config.min_occur` times in total (including the degenerate case of
    /// zero observations). This is a normal filtering outcome, not an error.
    pub fn finish(self, ngram: Ngram, config: &BuildConfig) -> Option<NgramSeries> {
        let Some((first_day, last_day)) = self.bounds else {
            log::trace!("Rejected ngram {ngram:?} with no observations");
            return None;
        };
        let total: u64 = self.counts.values().sum();
        if total < config.min_occur.get() {
            log::trace!(
                "Rejected ngram {ngram:?} with {total} total occurrences \
                 (minimum is {})",
                config.min_occur
            );
            return None;
        }
        // The sparse day->count map converts into a preallocated dense array
        // spanning exactly the first-to-last occurrence range.
        let mut series = DateVector::<f32>::zeros(first_day, last_day)
            .expect("bounds tracking guarantees first_day <= last_day");
        for (day, count) in self.counts {
            series.set(day, count as f32);
        }
        Some(NgramSeries {
            ngram,
            total,
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU64;

    fn config(min_occur: u64) -> BuildConfig {
        BuildConfig {
            min_occur: NonZeroU64::new(min_occur).unwrap(),
        }
    }

    fn builder(observations: &[(Day, u64)]) -> SeriesBuilder {
        let mut builder = SeriesBuilder::new();
        for &(day, count) in observations {
            builder.add(day, count);
        }
        builder
    }

    #[test]
    fn duplicate_days_accumulate() {
        let out = builder(&[(734797, 3), (734799, 2), (734797, 1)])
            .finish("t@ hello".into(), &config(5))
            .unwrap();
        assert_eq!(out.total, 6);
        assert_eq!(out.series.first_day(), 734797);
        assert_eq!(out.series.last_day(), 734799);
        assert_eq!(out.series.values(), &[4.0, 0.0, 2.0]);
    }

    #[test]
    fn total_matches_series_sum() {
        let out = builder(&[(100, 2), (105, 7), (103, 1)])
            .finish("en wiki".into(), &config(1))
            .unwrap();
        let sum: f32 = out.series.values().iter().sum();
        assert_eq!(out.total as f32, sum);
    }

    #[test]
    fn below_min_occur_produces_nothing() {
        let out = builder(&[(734797, 3), (734799, 2), (734797, 1)])
            .finish("t@ hello".into(), &config(7));
        assert!(out.is_none());
    }

    #[test]
    fn empty_builder_produces_nothing() {
        assert!(SeriesBuilder::new().finish("x".into(), &config(1)).is_none());
    }

    #[test]
    fn single_observation_yields_single_day_series() {
        let out = builder(&[(734797, 9)])
            .finish("t@ solo".into(), &config(5))
            .unwrap();
        assert_eq!(out.series.len(), 1);
        assert_eq!(out.series.values(), &[9.0]);
        assert_eq!(out.total, 9);
    }

    #[test]
    fn merge_combines_partial_aggregations() {
        let mut a = builder(&[(100, 1), (102, 2)]);
        let b = builder(&[(102, 3), (98, 4)]);
        a.merge(b);
        let out = a.finish("en word".into(), &config(1)).unwrap();
        assert_eq!(out.total, 10);
        assert_eq!(out.series.first_day(), 98);
        assert_eq!(out.series.last_day(), 102);
        assert_eq!(out.series.values(), &[4.0, 0.0, 1.0, 0.0, 5.0]);
    }
}
