//! Reference (target) time series from spreadsheet-like CSV files
//!
//! Each reference file holds one target group: a `date` column of ISO dates
//! plus one column per named series. A column named `<series>:mask` carries
//! an explicit 0/1 sufficiency mask for `<series>`; independently of that,
//! days missing from the file or with an empty cell are masked out. Target
//! display names combine the file stem and the column name, both
//! percent-encoded so that every target maps to a safe output file name.

use crate::{
    datevec::{DateVector, Day},
    Result,
};
use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};
use tokio::{fs::File, io::BufReader};

/// One named reference series to correlate n-grams against
///
/// Loaded once per correlation run and held read-only for its duration.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSeries {
    /// Display name, `<quoted file stem>:<quoted column name>`
    pub name: Box<str>,

    /// Daily values over the target's date range
    pub series: DateVector<f32>,

    /// Per-day sufficiency mask, absent when every day is trustworthy
    pub mask: Option<DateVector<bool>>,
}

/// Load every target series from a set of reference CSV files
///
/// File stems are disambiguated by stripping the directory prefix shared by
/// all reference files, so that same-named series from different files get
/// distinct target names.
pub async fn load(paths: &[PathBuf]) -> Result<Vec<TargetSeries>> {
    let mut targets = Vec::new();
    for (path, stem) in paths.iter().zip(short_names(paths)) {
        let group = load_group(path, &stem)
            .await
            .with_context(|| format!("loading reference file {}", path.display()))?;
        targets.extend(group);
    }
    Ok(targets)
}

/// Load the target group contained in one reference file
async fn load_group(path: &Path, stem: &str) -> Result<Vec<TargetSeries>> {
    let file = File::open(path).await.context("opening the file")?;
    let mut reader = AsyncReaderBuilder::new().create_reader(BufReader::new(file));
    let headers = (reader.headers().await.context("reading the header row")?)
        .iter()
        .map(String::from)
        .collect::<Vec<_>>();

    // Collect rows as (day, one optional cell per non-date column)
    let mut rows = Vec::new();
    let mut records = reader.records();
    while let Some(record) = records.next().await {
        let record = record.context("reading a data row")?;
        let date_cell = record.get(0).unwrap_or("");
        let date = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d")
            .with_context(|| format!("parsing date {date_cell:?}"))?;
        let cells = (1..headers.len())
            .map(|i| {
                let cell = record.get(i).unwrap_or("").trim();
                if cell.is_empty() {
                    Ok(None)
                } else {
                    cell.parse::<f32>()
                        .map(Some)
                        .with_context(|| format!("parsing cell {cell:?} on {date_cell}"))
                }
            })
            .collect::<Result<Vec<Option<f32>>>>()?;
        rows.push((date.num_days_from_ce(), cells));
    }
    assemble(stem, &headers, rows)
}

/// Turn parsed rows into one target per value column
fn assemble(
    stem: &str,
    headers: &[String],
    rows: Vec<(Day, Vec<Option<f32>>)>,
) -> Result<Vec<TargetSeries>> {
    anyhow::ensure!(
        headers.first().map(String::as_str) == Some("date"),
        "first column must be \"date\", found {:?}",
        headers.first()
    );
    anyhow::ensure!(!rows.is_empty(), "no data rows");
    let mut days_seen = rows.iter().map(|&(day, _)| day).collect::<Vec<_>>();
    days_seen.sort_unstable();
    if let Some(w) = days_seen.windows(2).find(|w| w[0] == w[1]) {
        anyhow::bail!("duplicate date {}", crate::datevec::day_to_iso(w[0]));
    }
    let (first_day, last_day) = (days_seen[0], days_seen[days_seen.len() - 1]);

    let mut targets = Vec::new();
    for (col, name) in headers.iter().enumerate().skip(1) {
        // Mask columns attach to their base series instead of becoming
        // targets of their own
        if name.ends_with(MASK_SUFFIX) {
            continue;
        }
        let mask_col = (headers.iter())
            .position(|h| h.strip_suffix(MASK_SUFFIX) == Some(name.as_str()));
        let mut series = DateVector::<f32>::zeros(first_day, last_day)?;
        let mut mask = DateVector::<bool>::zeros(first_day, last_day)?;
        for (day, cells) in &rows {
            let Some(value) = cells[col - 1] else {
                continue;
            };
            series.set(*day, value);
            let explicit = match mask_col {
                Some(mc) => cells[mc - 1].is_some_and(|flag| flag != 0.0),
                None => true,
            };
            mask.set(*day, explicit);
        }
        targets.push(TargetSeries {
            name: format!("{}:{}", quote_plus(stem), quote_plus(name)).into(),
            series,
            mask: Some(mask),
        });
    }
    Ok(targets)
}

/// Suffix marking a column as the mask of another column
const MASK_SUFFIX: &str = ":mask";

/// Characters that survive [`quote_plus`] unencoded
const KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-');

/// Percent-encode a string into a filename-safe form
///
/// Follows the form-urlencoded convention: everything outside
/// `[A-Za-z0-9_.-]` is percent-encoded, except spaces which become `+`.
pub fn quote_plus(s: &str) -> String {
    utf8_percent_encode(s, KEEP).to_string().replace("%20", "+")
}

/// File stems with the shared directory prefix and extension removed
fn short_names(paths: &[PathBuf]) -> Vec<String> {
    let full = (paths.iter())
        .map(|path| path.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    let Some(first) = full.first() else {
        return Vec::new();
    };

    // Longest prefix common to all paths, clipped back to a whole number of
    // directory components so a lone input keeps its full base name
    let mut prefix_len = first.len();
    for other in &full[1..] {
        let common = (first.bytes().zip(other.bytes()))
            .take_while(|(a, b)| a == b)
            .count();
        prefix_len = prefix_len.min(common);
    }
    let dir_len = first[..prefix_len].rfind('/').map(|i| i + 1).unwrap_or(0);

    (full.iter())
        .map(|path| {
            let name = &path[dir_len..];
            match name.rfind('.') {
                Some(dot) if dot > name.rfind('/').map(|i| i + 1).unwrap_or(0) => {
                    name[..dot].to_owned()
                }
                _ => name.to_owned(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|&n| n.to_owned()).collect()
    }

    #[test]
    fn quote_plus_mirrors_urllib() {
        assert_eq!(quote_plus("flu season 2012"), "flu+season+2012");
        assert_eq!(quote_plus("a/b:c"), "a%2Fb%3Ac");
        assert_eq!(quote_plus("safe_name-1.0"), "safe_name-1.0");
        assert_eq!(quote_plus("50%+"), "50%25%2B");
    }

    #[test]
    fn short_names_strip_shared_directories_and_extensions() {
        let paths = vec![
            PathBuf::from("/data/refs/flu.csv"),
            PathBuf::from("/data/refs/events/riots.csv"),
        ];
        assert_eq!(short_names(&paths), vec!["flu", "events/riots"]);
    }

    #[test]
    fn lone_input_keeps_its_base_name() {
        let paths = vec![PathBuf::from("/data/refs/flu.csv")];
        assert_eq!(short_names(&paths), vec!["flu"]);
    }

    #[test]
    fn assemble_fills_gaps_and_masks_them_out() {
        // Day 102 is missing from the file entirely
        let rows = vec![
            (100, vec![Some(1.0)]),
            (101, vec![Some(2.0)]),
            (103, vec![Some(4.0)]),
        ];
        let targets = assemble("flu", &headers(&["date", "cases"]), rows).unwrap();
        assert_eq!(targets.len(), 1);
        let t = &targets[0];
        assert_eq!(&*t.name, "flu:cases");
        assert_eq!(t.series.values(), &[1.0, 2.0, 0.0, 4.0]);
        assert_eq!(
            t.mask.as_ref().unwrap().values(),
            &[true, true, false, true]
        );
    }

    #[test]
    fn explicit_mask_columns_override_presence() {
        let rows = vec![
            (100, vec![Some(1.0), Some(1.0)]),
            (101, vec![Some(2.0), Some(0.0)]),
        ];
        let targets = assemble("flu", &headers(&["date", "cases", "cases:mask"]), rows).unwrap();
        assert_eq!(targets.len(), 1, "mask columns are not targets");
        let t = &targets[0];
        assert_eq!(t.mask.as_ref().unwrap().values(), &[true, false]);
    }

    #[test]
    fn several_value_columns_become_several_targets() {
        let rows = vec![(100, vec![Some(1.0), Some(5.0)])];
        let targets = assemble("refs", &headers(&["date", "a", "b"]), rows).unwrap();
        let names = (targets.iter()).map(|t| &*t.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["refs:a", "refs:b"]);
    }

    #[test]
    fn duplicate_dates_are_malformed_input() {
        let rows = vec![(100, vec![Some(1.0)]), (100, vec![Some(2.0)])];
        assert!(assemble("flu", &headers(&["date", "cases"]), rows).is_err());
    }

    #[test]
    fn missing_date_header_is_malformed_input() {
        let rows = vec![(100, vec![Some(1.0)])];
        assert!(assemble("flu", &headers(&["day", "cases"]), rows).is_err());
    }
}
