#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the air-map ingestion tool.
//!
//! [`IndicatifProgress`] renders [`ProgressCallback`] updates as `indicatif`
//! bars, and [`init_logger`] routes `log` output through
//! `indicatif-log-bridge` so log lines don't tear the bars.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use air_map_source::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const TICK: Duration = Duration::from_millis(100);

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
///
/// The prefix names what is being ingested (a source id or a file name);
/// the message carries the phase reported by the ingestion library.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
}

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

impl IndicatifProgress {
    fn spinner(multi: &MultiProgress, prefix: String, color: &str, bar_template: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(TICK);
        bar.set_style(style(
            &format!("{{spinner:.{color}}} [{{prefix}}] {{msg}}"),
            ProgressStyle::default_spinner,
        ));
        bar.set_prefix(prefix);
        bar.set_message("waiting");

        let bar_style = style(bar_template, ProgressStyle::default_bar).progress_chars("=>-");
        Self { bar, bar_style }
    }

    fn new_readings(multi: &MultiProgress, source_id: &str) -> Self {
        Self::spinner(
            multi,
            source_id.to_string(),
            "cyan",
            "[{prefix}] {msg:9} {wide_bar:.cyan/dim} {pos}/{len} readings [{eta}]",
        )
    }

    fn new_rows(multi: &MultiProgress, path: &Path) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self::spinner(
            multi,
            name,
            "yellow",
            "[{prefix}] {wide_bar:.yellow/dim} {pos}/{len} rows {percent}% {msg}",
        )
    }

    fn new_stages(multi: &MultiProgress, title: &str, stages: u64) -> Self {
        let bar = multi.add(ProgressBar::new(stages));
        let bar_style = style(
            "{prefix} {wide_bar:.green/dim} {pos}/{len} stages: {msg} [{elapsed_precise}]",
            ProgressStyle::default_bar,
        )
        .progress_chars("=>-");
        bar.set_style(bar_style.clone());
        bar.set_prefix(title.to_string());
        Self { bar, bar_style }
    }

    /// A bar for readings pulled from a remote source. Spins while the
    /// request is in flight and counts stored readings once the batch size
    /// is known.
    #[must_use]
    pub fn readings_bar(multi: &MultiProgress, source_id: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::new_readings(multi, source_id))
    }

    /// A bar for a CSV import, labelled with the file name.
    #[must_use]
    pub fn rows_bar(multi: &MultiProgress, path: &Path) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::new_rows(multi, path))
    }

    /// A bar over a fixed number of named stages (e.g. seeding mock data).
    #[must_use]
    pub fn stages_bar(multi: &MultiProgress, title: &str, stages: u64) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::new_stages(multi, title, stages))
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when called twice (tests).
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn readings_bar_spins_until_batch_size_is_known() {
        let multi = hidden();
        let progress = IndicatifProgress::new_readings(&multi, "openaq_nairobi");
        assert_eq!(progress.bar.prefix(), "openaq_nairobi");
        assert_eq!(progress.bar.length(), None);

        progress.set_message("fetching".to_string());
        progress.set_total(1200);
        progress.inc(500);
        progress.inc(500);
        assert_eq!(progress.bar.length(), Some(1200));
        assert_eq!(progress.bar.position(), 1000);
        assert_eq!(progress.bar.message(), "fetching");
    }

    #[test]
    fn rows_bar_is_labelled_with_the_file_name() {
        let multi = hidden();
        let progress =
            IndicatifProgress::new_rows(&multi, Path::new("/data/imports/monitoring.csv"));
        assert_eq!(progress.bar.prefix(), "monitoring.csv");

        progress.set_total(0);
        progress.finish("0 readings stored".to_string());
        assert!(progress.bar.is_finished());
        assert_eq!(progress.bar.message(), "0 readings stored");
    }

    #[test]
    fn stages_bar_knows_its_length_up_front() {
        let multi = hidden();
        let progress = IndicatifProgress::new_stages(&multi, "Seeding mock data", 4);
        assert_eq!(progress.bar.length(), Some(4));

        progress.set_message("zones".to_string());
        progress.inc(1);
        assert_eq!(progress.bar.position(), 1);
        assert_eq!(progress.bar.message(), "zones");
    }
}
