//! Scan orchestrator: traversal → extractor → confirm manager, one file at a time.
//!
//! Holds at most one [`FileRecord`](crate::FileRecord) and one pending confirm, so peak memory does
//! not depend on how many files the roots contain. Per-file errors become statistics; only the
//! initial broker connection can fail the run.

use log::{error, info};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::ScanStatistics;
use crate::broker::{ConnectionManager, Transport};
use crate::errors::ConnectionError;
use crate::pipeline::events::{FailureReason, LogObserver, ScanObserver};
use crate::pipeline::metadata::MetadataExtractor;
use crate::pipeline::walk::{Traversal, WalkOutcome};

pub struct ScanOrchestrator<T: Transport> {
    traversal: Traversal,
    extractor: MetadataExtractor,
    manager: ConnectionManager<T>,
    observer: Arc<dyn ScanObserver>,
    stop: Option<Arc<AtomicBool>>,
}

impl<T: Transport> ScanOrchestrator<T> {
    /// Compose pre-built collaborators. Events go to [`LogObserver`] until replaced.
    pub fn new(
        traversal: Traversal,
        extractor: MetadataExtractor,
        mut manager: ConnectionManager<T>,
    ) -> Self {
        let observer: Arc<dyn ScanObserver> = Arc::new(LogObserver);
        manager.set_observer(Arc::clone(&observer));
        Self {
            traversal,
            extractor,
            manager,
            observer,
            stop: None,
        }
    }

    /// Route file and connection events to `observer` (replaces the default).
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.manager.set_observer(Arc::clone(&observer));
        self.observer = observer;
        self
    }

    /// Checked between files; an in-flight publish always resolves first.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Connect, drain the traversal, close. Returns the final counters, or the connection error
    /// when the broker could not be reached at startup (nothing is traversed in that case).
    pub fn run(mut self) -> Result<ScanStatistics, ConnectionError> {
        let mut stats = ScanStatistics::default();
        if let Err(e) = self.manager.connect() {
            error!("Failed to connect to broker: {}", e);
            self.manager.close();
            return Err(e);
        }

        let started = Instant::now();
        let mut interrupted = false;
        loop {
            if self.stop_requested() {
                interrupted = true;
                break;
            }
            let Some(outcome) = self.traversal.next() else {
                break;
            };
            match outcome {
                WalkOutcome::Skipped { path, reason } => {
                    stats.skipped += 1;
                    self.observer.on_skipped(&path, &reason, &stats);
                }
                WalkOutcome::File(path) => self.process_file(&path, &mut stats),
            }
        }

        self.manager.close();
        if interrupted {
            info!("Scan interrupted by user after {:?}", started.elapsed());
        } else {
            info!("Traversal finished in {:?}", started.elapsed());
        }
        self.observer.on_finished(&stats);
        Ok(stats)
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn process_file(&mut self, path: &Path, stats: &mut ScanStatistics) {
        let record = match self.extractor.extract(path) {
            Ok(record) => record,
            Err(e) => {
                stats.failed += 1;
                self.observer
                    .on_failed(path, &FailureReason::Extraction(e), stats);
                return;
            }
        };

        match self.manager.publish(&record) {
            Ok(()) => {
                stats.processed += 1;
                self.observer.on_processed(&record, stats);
            }
            Err(e) => {
                stats.failed += 1;
                self.observer
                    .on_failed(record.path(), &FailureReason::Publish(e), stats);
            }
        }
    }
}

/// Single entry point for callers holding pre-built collaborators.
pub fn run_scan<T: Transport>(
    traversal: Traversal,
    extractor: MetadataExtractor,
    manager: ConnectionManager<T>,
) -> Result<ScanStatistics, ConnectionError> {
    ScanOrchestrator::new(traversal, extractor, manager).run()
}
