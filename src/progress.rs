//! Progress indicators for the utilities CLI.

use declarative::{ApplyResult, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Clear the indicator and drop its line
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Progress bar driven by the executor, one tick per instance
///
/// Hidden when quiet, so nothing is drawn for scripted runs.
pub struct ApplyProgress {
    label: String,
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl ApplyProgress {
    pub fn new(label: &str, quiet: bool) -> Self {
        Self {
            label: label.to_string(),
            quiet,
            bar: None,
        }
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_batch_start(&mut self, count: usize) {
        if self.quiet || count == 0 {
            return;
        }
        let pb = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.set_message(self.label.clone());
        self.bar = Some(pb);
    }

    fn on_resource_start(&mut self, address: &str) {
        if let Some(pb) = &self.bar {
            pb.set_message(address.to_string());
        }
    }

    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult) {
        log::debug!("{address}: {result:?}");
        if let Some(pb) = &self.bar {
            pb.inc(1);
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}
