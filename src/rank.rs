//! Ranking and output of correlation matches
//!
//! One ranked TSV file per target: rows are `ngram`, `correlation`, `peak`,
//! `trough`, sorted by correlation magnitude. Output files are recreated on
//! each run, and each target's file is owned by exactly one writer opened
//! once for the whole run.

use crate::{correlate::Match, targets::TargetSeries, Result};
use anyhow::Context;
use std::path::Path;
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};

/// Group flat `(target index, match)` records by target
///
/// The per-target arrival order of the input is preserved, which makes the
/// later sort's tie-break deterministic.
pub fn collect_by_target(
    num_targets: usize,
    matches: impl IntoIterator<Item = (usize, Match)>,
) -> Vec<Vec<Match>> {
    let mut per_target = vec![Vec::new(); num_targets];
    for (index, m) in matches {
        per_target[index].push(m);
    }
    per_target
}

/// Sort one target's matches by correlation magnitude, strongest first
///
/// The sort is stable; ties keep their arrival order since no secondary key
/// is defined.
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        (b.correlation.abs())
            .partial_cmp(&a.correlation.abs())
            .expect("correlation coefficients are never NaN")
    });
}

/// Write every target's ranked matches under the output directory
///
/// Each target's file is truncated and rewritten; targets with no matches
/// still get an (empty) file, so stale results from earlier runs cannot
/// survive a rerun.
pub async fn write_ranked(
    out_dir: &Path,
    targets: &[TargetSeries],
    per_target: Vec<Vec<Match>>,
) -> Result<()> {
    fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    for (target, matches) in targets.iter().zip(per_target) {
        let path = out_dir.join(format!("{}.tsv", target.name));
        let context = || format!("writing ranked output {}", path.display());
        let file = File::create(&path).await.with_context(context)?;
        let mut writer = BufWriter::new(file);
        for m in &matches {
            let row = format!(
                "{}\t{}\t{}\t{}\n",
                m.ngram, m.correlation, m.peak, m.trough
            );
            writer.write_all(row.as_bytes()).await.with_context(context)?;
        }
        writer.flush().await.with_context(context)?;
        log::info!("Wrote {} matches for target {}", matches.len(), target.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(ngram: &str, correlation: f64) -> Match {
        Match {
            ngram: ngram.into(),
            correlation,
            peak: 100.0,
            trough: 0.0,
        }
    }

    #[test]
    fn matches_route_to_their_target() {
        let per_target = collect_by_target(
            3,
            vec![(2, m("a", 0.9)), (0, m("b", -0.8)), (2, m("c", 0.85))],
        );
        assert_eq!(per_target[0].len(), 1);
        assert!(per_target[1].is_empty());
        assert_eq!(per_target[2].len(), 2);
    }

    #[test]
    fn sort_is_by_magnitude_descending() {
        let mut matches = vec![m("a", 0.5), m("b", -0.9), m("c", 0.7)];
        sort_matches(&mut matches);
        for pair in matches.windows(2) {
            assert!(pair[0].correlation.abs() >= pair[1].correlation.abs());
        }
        assert_eq!(&*matches[0].ngram, "b");
        assert_eq!(&*matches[2].ngram, "a");
    }

    #[test]
    fn ties_keep_arrival_order() {
        let mut matches = vec![m("first", -0.8), m("second", 0.8), m("third", 0.9)];
        sort_matches(&mut matches);
        assert_eq!(&*matches[0].ngram, "third");
        assert_eq!(&*matches[1].ngram, "first");
        assert_eq!(&*matches[2].ngram, "second");
    }
}
