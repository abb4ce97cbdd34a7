//! Masked correlation of n-gram series against reference targets
//!
//! For each n-gram and each target, the n-gram's raw daily counts are grown
//! to cover the target's date range (so genuine leading/trailing zero
//! activity is kept), normalized to a parts-per-million rate against its
//! project's daily totals, and compared to the target through a Pearson
//! coefficient restricted to days that both sufficiency masks trust.
//!
//! Candidates are filtered cheaply before the correlation is computed (peak
//! below `min_ppm`) and again after it (magnitude below `min_similarity`);
//! with millions of n-grams times dozens of targets, early rejection is what
//! keeps the sweep affordable.

use crate::{
    config::CorrelateConfig,
    datevec::{day_to_iso, DateVector},
    series::NgramSeries,
    targets::TargetSeries,
    totals::{self, TotalsEntry},
    Ngram, Result,
};
use anyhow::Context;
use std::{collections::HashMap, sync::Arc};

/// Normalization scale: series are compared in parts per million
pub const PARTS_PER_MILLION: f32 = 1e6;

/// One n-gram found to correlate with one target
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    /// The matching n-gram, with its project tag prefix
    pub ngram: Ngram,

    /// Masked Pearson correlation coefficient, in `[-1, 1]`
    pub correlation: f64,

    /// Highest normalized rate (parts per million) over the aligned range
    pub peak: f32,

    /// Lowest normalized rate over the aligned range
    pub trough: f32,
}

/// Read-only state shared by every n-gram evaluation of one run
///
/// Loaded once at start-up; the correlation sweep only ever reads it, so
/// parallel workers need no synchronization.
pub struct CorrelateContext {
    /// Correlation configuration
    pub config: Arc<CorrelateConfig>,

    /// Per-project daily totals with sparse-project masks
    pub totals: HashMap<Box<str>, TotalsEntry>,

    /// Every target series loaded from the reference files
    pub targets: Vec<TargetSeries>,
}
//
impl CorrelateContext {
    /// Evaluate one n-gram against every target
    ///
    /// Returns the matches that pass all thresholds, each tagged with the
    /// index of the target it belongs to. An empty result is the normal
    /// outcome for the vast majority of n-grams. Errors are reserved for
    /// data-integrity problems (unknown project, totals not covering a
    /// target, mask/series bounds mismatch) that must abort the run.
    pub fn evaluate(&self, ngram: &NgramSeries) -> Result<Vec<(usize, Match)>> {
        let project = totals::project_tag(&ngram.ngram);
        let totals = self.totals.get(project).with_context(|| {
            format!(
                "no totals series for project {project:?} (ngram {:?})",
                ngram.ngram
            )
        })?;
        let mut matches = Vec::new();
        for (index, target) in self.targets.iter().enumerate() {
            if let Some(m) = self.evaluate_one(ngram, totals, target)? {
                matches.push((index, m));
            }
        }
        Ok(matches)
    }

    /// Evaluate one (n-gram, target) pair
    fn evaluate_one(
        &self,
        ngram: &NgramSeries,
        totals: &TotalsEntry,
        target: &TargetSeries,
    ) -> Result<Option<Match>> {
        // Extend the n-gram series to the target's range so leading and
        // trailing zeroes are not lost, then to the totals' range since
        // normalization requires exactly matching bounds.
        let window = ngram.series.grow_to(&target.series);
        let grown = window.grow_to(&totals.series);
        anyhow::ensure!(
            grown.bounds_eq(&totals.series),
            "totals for project {:?} cover {}..={} but target {} and ngram {:?} \
             extend to {}..={}",
            totals::project_tag(&ngram.ngram),
            day_to_iso(totals.series.first_day()),
            day_to_iso(totals.series.last_day()),
            target.name,
            ngram.ngram,
            day_to_iso(grown.first_day()),
            day_to_iso(grown.last_day()),
        );
        let rate = grown.normalize(&totals.series, PARTS_PER_MILLION)?;

        // Ignore n-grams whose presence never reaches the visibility floor,
        // before paying for a correlation. Peak and trough are judged over
        // the n-gram/target window; days beyond it exist only to align with
        // the totals and would otherwise dent the trough to zero.
        let visible = rate.shrink_to(&window)?;
        let peak = visible.max();
        let trough = visible.min();
        if peak < self.config.min_ppm {
            log::trace!(
                "Ignoring ngram {:?} for target {}: peak {peak} ppm below {}",
                ngram.ngram,
                target.name,
                self.config.min_ppm
            );
            return Ok(None);
        }

        // A mask that does not line up with its series means the reference
        // data is malformed; correlating through it would silently produce
        // nonsense.
        if let Some(mask) = &target.mask {
            anyhow::ensure!(
                target.series.bounds_eq(mask),
                "mask/series bounds mismatch for target {}",
                target.name
            );
        }

        let Some(correlation) = masked_pearson(
            &rate,
            &target.series,
            totals.mask.as_ref(),
            target.mask.as_ref(),
        ) else {
            log::trace!(
                "Ignoring ngram {:?} for target {}: correlation undefined \
                 over the unmasked days",
                ngram.ngram,
                target.name
            );
            return Ok(None);
        };
        if correlation.abs() < self.config.min_similarity {
            log::trace!(
                "Ignoring ngram {:?} for target {}: |{correlation}| below {}",
                ngram.ngram,
                target.name,
                self.config.min_similarity
            );
            return Ok(None);
        }
        Ok(Some(Match {
            ngram: ngram.ngram.clone(),
            correlation,
            peak,
            trough,
        }))
    }
}

/// Pearson correlation over the days both masks trust
///
/// The two series are aligned by absolute day over their overlapping range;
/// an absent mask trusts every day. Returns `None` when the correlation is
/// undefined: no overlap, fewer than two trusted days, zero variance on
/// either side, or non-finite samples. Sums are carried in `f64` since the
/// payloads are `f32`.
pub fn masked_pearson(
    x: &DateVector<f32>,
    y: &DateVector<f32>,
    x_mask: Option<&DateVector<bool>>,
    y_mask: Option<&DateVector<bool>>,
) -> Option<f64> {
    let first = x.first_day().max(y.first_day());
    let last = x.last_day().min(y.last_day());
    if first > last {
        return None;
    }
    let trusted = |mask: Option<&DateVector<bool>>, day| {
        mask.map_or(true, |mask| mask.get(day).copied().unwrap_or(false))
    };
    let mut xs = Vec::with_capacity((last - first + 1) as usize);
    let mut ys = Vec::with_capacity(xs.capacity());
    for day in first..=last {
        if trusted(x_mask, day) && trusted(y_mask, day) {
            xs.push(f64::from(*x.get(day).expect("day is within x's range")));
            ys.push(f64::from(*y.get(day).expect("day is within y's range")));
        }
    }
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in xs.iter().zip(&ys) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let r = cov / (var_x * var_y).sqrt();
    // A non-finite sample (e.g. a zero-totals day driving a rate to
    // infinity) poisons the sums and makes the coefficient undefined; that
    // is a filtering outcome, never a reportable match.
    if !r.is_finite() {
        return None;
    }
    Some(r.clamp(-1.0, 1.0))
}
