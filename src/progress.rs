//! Progress bar for a benchmark run.

use indicatif::{ProgressBar, ProgressStyle};

/// Progress of writing pairs, drawn on stderr.
pub struct RunProgress {
    progress: ProgressBar,
}

impl RunProgress {
    /// Create a progress bar for a run that writes `total` pairs.
    ///
    /// If `visible` is false, nothing is drawn.
    pub fn new(total: u64, visible: bool) -> Self {
        let progress = if visible {
            ProgressBar::new(total)
        } else {
            ProgressBar::hidden()
        };
        let parts = vec![
            "{wide_bar}",
            "elapsed: {elapsed}",
            "pairs: {pos}/{len} ({per_sec})",
            "{spinner}",
        ];
        progress.set_style(ProgressStyle::default_bar().template(&parts.join("\n")));
        progress.enable_steady_tick(100);

        Self { progress }
    }

    /// Record a written batch.
    pub fn wrote_batch(&self, pairs: u64) {
        self.progress.inc(pairs);
    }

    /// Remove the progress bar.
    pub fn finish(&self) {
        self.progress.set_length(self.progress.position());
        self.progress.finish_and_clear();
    }
}
