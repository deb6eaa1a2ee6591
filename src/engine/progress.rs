//! Progress bar utilities for displaying processing status

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::pipeline::events::{FailureReason, ScanObserver, SkipReason};
use crate::{FileRecord, ScanStatistics};

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " files"
    )))
}

/// Force a refresh of the bar (e.g. so counter shows "0 files" immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Advance the counter by one candidate and show the failed/skipped split.
fn tick(pb: &ProgressBar, stats: &ScanStatistics) {
    if let Ok(mut bar) = pb.try_lock() {
        bar.set_postfix(format!("failed={}, skipped={}", stats.failed, stats.skipped));
        let _ = bar.update(1);
    }
}

/// Observer that drives a kdam counter: one tick per traversal candidate.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let bar = create_counter("Publishing");
        refresh_bar(&bar);
        Self { bar }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanObserver for ProgressObserver {
    fn on_processed(&self, _record: &FileRecord, stats: &ScanStatistics) {
        tick(&self.bar, stats);
    }

    fn on_failed(&self, _path: &std::path::Path, _reason: &FailureReason, stats: &ScanStatistics) {
        tick(&self.bar, stats);
    }

    fn on_skipped(&self, _path: &std::path::Path, _reason: &SkipReason, stats: &ScanStatistics) {
        tick(&self.bar, stats);
    }

    fn on_finished(&self, _stats: &ScanStatistics) {
        if let Ok(mut bar) = self.bar.lock() {
            let _ = bar.refresh();
            eprintln!();
        }
    }
}
