use acl_lens_core::{ProgressReporter, ScanProgress};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Spinner for the walk; the total folder count is unknown until the end.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, root: &str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message(format!("Scanning {}...", root));
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_folder_scanned(&self, progress: &ScanProgress, _path: &str) {
        self.with_bar(|pb| {
            pb.set_message(format!(
                "Scanning... {} folders, {} queued, {} errors",
                progress.processed_folders, progress.queued_folders, progress.errors
            ))
        });
    }

    fn on_scan_complete(&self, progress: &ScanProgress, cancelled: bool) {
        self.finish_bar();
        let verb = if cancelled { "cancelled" } else { "complete" };
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan {}: {} folders, {} errors in {:.2}s",
            verb,
            progress.processed_folders,
            progress.errors,
            progress.elapsed.as_secs_f64()
        );
    }

    fn on_diff_complete(&self, folders: usize, duration_secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Parent diffs computed for {} folders in {:.2}s",
            folders, duration_secs
        );
    }
}
