//! Progress reporting infrastructure
//!
//! To avoid corrupted terminal output, nothing should be written to stdout
//! or stderr while a report is being displayed. Please use logs for debug
//! messages.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::borrow::Cow;

/// CLI progress report of ongoing operations
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Prepare to report progress on the cli
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an operation with a known number of discrete steps
    pub fn add_steps(&self, what: impl Into<Cow<'static, str>>, steps: usize) -> ProgressBar {
        self.add(what, steps as u64, "{pos}/{len}")
    }

    /// Track a long operation with a percentage display and time estimate
    pub fn add_percent(&self, what: impl Into<Cow<'static, str>>, steps: usize) -> ProgressBar {
        self.add(what, steps as u64, "{percent:>2}% (~{eta} left)")
    }

    /// Track an operation over a known number of bytes
    pub fn add_bytes(&self, what: impl Into<Cow<'static, str>>, bytes: u64) -> ProgressBar {
        self.add(
            what,
            bytes,
            "{decimal_bytes}/{decimal_total_bytes} ({decimal_bytes_per_sec})",
        )
    }

    fn add(
        &self,
        what: impl Into<Cow<'static, str>>,
        work: u64,
        trailer: &str,
    ) -> ProgressBar {
        let bar = ProgressBar::new(work).with_prefix(what.into()).with_style(
            ProgressStyle::with_template(&format!("{{prefix}} {{wide_bar}} {trailer}"))
                .expect("the styles above should be valid indicatif styles"),
        );
        self.0.add(bar.clone());
        bar
    }
}
