use std::time::Duration;

/// Snapshot of scan progress, emitted after every folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub processed_folders: usize,
    pub queued_folders: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

/// Trait for reporting scan progress.
///
/// Called on the scanning thread, so implementations must return quickly.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &str) {}
    fn on_folder_scanned(&self, _progress: &ScanProgress, _path: &str) {}
    fn on_scan_complete(&self, _progress: &ScanProgress, _cancelled: bool) {}
    fn on_diff_complete(&self, _folders: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
