#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the coverage map binaries.
//!
//! [`IndicatifProgress`] renders pipeline progress as `indicatif` bars, and
//! [`init_logger`] routes `log` output through the same [`MultiProgress`]
//! so log lines print above the bars instead of through them.

use std::sync::Arc;
use std::time::Duration;

use coverage_map_allocation::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const TICK: Duration = Duration::from_millis(100);

/// An `indicatif` [`ProgressBar`] behind [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied whenever a stage announces its length.
    counted: ProgressStyle,
    /// Applied between stages while the length is unknown.
    idle: Option<ProgressStyle>,
}

impl IndicatifProgress {
    /// Top-level bar counting pipeline stages. The number of stages is
    /// known up front, so it is a bar from the start.
    #[must_use]
    pub fn steps_bar(multi: &MultiProgress, total: u64) -> Arc<dyn ProgressCallback> {
        let counted = bar_style("{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]");
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(counted.clone());

        Arc::new(Self {
            bar,
            counted,
            idle: None,
        })
    }

    /// Bar reused across stages for per-precinct and per-zone work.
    ///
    /// Spins until a stage calls [`ProgressCallback::set_total`], then
    /// shows a count with an ETA. A new message drops it back to a spinner
    /// until the next stage sizes itself.
    #[must_use]
    pub fn stage_bar(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::stage(multi))
    }

    fn stage(multi: &MultiProgress) -> Self {
        let idle = ProgressStyle::with_template("  {spinner:.yellow} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(idle.clone());
        bar.enable_steady_tick(TICK);

        Self {
            bar,
            counted: bar_style("  {msg} {wide_bar:.yellow/dim} {pos}/{len} {percent}% [{eta}]"),
            idle: Some(idle),
        }
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.counted.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        if let Some(idle) = &self.idle {
            self.bar.set_style(idle.clone());
        }
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] every bar must be added to. Calling this
/// twice keeps the first logger.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
