//! Data-sufficiency masks for sparse sources
//!
//! Some sources (e.g. a sampled social-media stream) have days where the
//! collection pipeline was down or degraded. Correlating against the raw
//! series would mistake those collection artifacts for genuine dips, so each
//! sparse project gets a per-day boolean mask and masked-out days are
//! excluded from correlation. Dense sources carry no mask, which downstream
//! code reads as "every day is trustworthy".

use crate::datevec::{day_to_iso, DateVector};
use crate::Result;

/// Per-day data sufficiency heuristic
///
/// Given a day's series value, its raw observation count and the source's
/// sampling rate, decides whether that day carries enough data to trust.
/// The exact test is source-specific, so it is pluggable; implementations
/// must be cheap since they run once per day of every sparse project.
pub trait SufficiencyCheck: Sync {
    /// Truth that this day's sample is large enough to trust
    fn is_enough(&self, day_value: f32, day_count: f32, sample_rate: f64) -> bool;
}

/// Default sufficiency heuristic for sampled streams
///
/// A day is trusted when its observed count, extrapolated through the
/// sampling rate, reaches a fixed full-volume floor. A healthy sampled
/// stream sits far above the floor, while a day with a collection outage
/// falls well below it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeFloor {
    /// Minimum plausible full-stream daily volume
    pub min_daily_volume: f64,
}
//
impl Default for VolumeFloor {
    fn default() -> Self {
        Self {
            min_daily_volume: 1_000_000.0,
        }
    }
}
//
impl SufficiencyCheck for VolumeFloor {
    fn is_enough(&self, _day_value: f32, day_count: f32, sample_rate: f64) -> bool {
        f64::from(day_count) / sample_rate >= self.min_daily_volume
    }
}

/// Derive the sufficiency mask of one sparse project's totals series
///
/// For the totals series, a day's value is its raw observation count, so
/// both are passed to the heuristic unchanged.
///
/// Fails when more than half of the days are insufficient: a correlation
/// computed over mostly-masked data would be statistically meaningless, so
/// this stops the run instead of degrading silently. The usual cause is a
/// misconfigured sample rate rather than genuinely bad data.
pub fn build_mask(
    project: &str,
    series: &DateVector<f32>,
    sample_rate: f64,
    check: &dyn SufficiencyCheck,
) -> Result<DateVector<bool>> {
    let mut flags = Vec::with_capacity(series.len());
    for (i, &count) in series.values().iter().enumerate() {
        let ok = check.is_enough(count, count, sample_rate);
        if !ok {
            log::trace!(
                "Distrusting {} for project {project:?} ({count} observations)",
                day_to_iso(series.date(i))
            );
        }
        flags.push(ok);
    }
    let sufficient = flags.iter().filter(|&&ok| ok).count();
    anyhow::ensure!(
        2 * sufficient >= flags.len(),
        "project {project:?} has too many low-data days \
         ({} of {} spanning {}..={}); check sample rate?",
        flags.len() - sufficient,
        flags.len(),
        day_to_iso(series.first_day()),
        day_to_iso(series.last_day()),
    );
    DateVector::from_values(series.first_day(), flags)
}
