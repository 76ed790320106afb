//! Progress reporting for test execution using indicatif.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

/// Style templates for progress bars.
pub mod styles {
    use super::*;

    /// Progress bar style for per-test coverage runs.
    pub fn test_runs() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.green/white}] {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("=>-")
    }

    /// Spinner style for indeterminate operations.
    pub fn spinner() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template")
    }
}

/// Thread-safe progress tracker counting successful and failed test runs.
#[derive(Clone)]
pub struct RunProgress {
    bar: ProgressBar,
    ok: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl RunProgress {
    /// Create a tracker for `total` runs, visible only when stderr is a TTY.
    pub fn new(total: usize, prefix: &str) -> Self {
        let bar = if is_tty() {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(styles::test_runs());
            bar.set_prefix(prefix.to_string());
            bar
        } else {
            Self::hidden_bar(total)
        };
        Self::with_bar(bar)
    }

    /// Create a hidden tracker (for non-TTY output and tests).
    pub fn hidden(total: usize) -> Self {
        Self::with_bar(Self::hidden_bar(total))
    }

    fn hidden_bar(total: usize) -> ProgressBar {
        let bar = ProgressBar::hidden();
        bar.set_length(total as u64);
        bar
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            ok: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Record a finished run and return its 1-based completion index.
    pub fn record(&self, name: &str, succeeded: bool) -> usize {
        if succeeded {
            self.ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.bar.inc(1);
        self.bar.set_message(name.to_string());
        self.completed()
    }

    /// Number of finished runs.
    pub fn completed(&self) -> usize {
        self.ok.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed)
    }

    /// Number of failed runs.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Total number of runs expected.
    pub fn total(&self) -> usize {
        self.bar.length().unwrap_or(0) as usize
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Check if stderr is a TTY (for deciding whether to show progress bars).
pub fn is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

/// Create a spinner for indeterminate operations.
pub fn create_spinner(message: &str) -> ProgressBar {
    if is_tty() {
        let bar = ProgressBar::new_spinner();
        bar.set_style(styles::spinner());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}
