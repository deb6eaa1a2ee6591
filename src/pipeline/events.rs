//! Observer seam for per-file and connection events. The core emits; sinks decide what to do.

use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::broker::ConnectionState;
use crate::errors::{ExtractionError, PublishError, TraversalError};
use crate::utils::config::ProgressConsts;
use crate::{FileRecord, ScanStatistics};

/// Why a traversal candidate was counted as skipped.
#[derive(Debug)]
pub enum SkipReason {
    /// Extension not in the allow-list. Carries the file's normalized extension.
    Filtered { extension: String },
    /// FIFO, socket, or device node.
    NotRegularFile,
    /// Directory (or root) could not be listed; its contents were never seen.
    Unreachable(TraversalError),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filtered { extension } if extension.is_empty() => {
                write!(f, "extension filter (no extension)")
            }
            Self::Filtered { extension } => write!(f, "extension filter ({extension})"),
            Self::NotRegularFile => write!(f, "not a regular file"),
            Self::Unreachable(e) => write!(f, "unreachable: {e}"),
        }
    }
}

/// Why a file was counted as failed.
#[derive(Debug)]
pub enum FailureReason {
    Extraction(ExtractionError),
    Publish(PublishError),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction(e) => write!(f, "metadata: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
        }
    }
}

/// Receives discrete scan events. Every method defaults to a no-op.
/// `stats` is the running tally after the event was counted.
pub trait ScanObserver {
    fn on_processed(&self, _record: &FileRecord, _stats: &ScanStatistics) {}

    fn on_failed(&self, _path: &Path, _reason: &FailureReason, _stats: &ScanStatistics) {}

    fn on_skipped(&self, _path: &Path, _reason: &SkipReason, _stats: &ScanStatistics) {}

    fn on_connection_state(&self, _from: ConnectionState, _to: ConnectionState) {}

    fn on_finished(&self, _stats: &ScanStatistics) {}
}

/// Ignores everything.
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Default sink: routes events to the `log` facade.
pub struct LogObserver;

impl ScanObserver for LogObserver {
    fn on_processed(&self, record: &FileRecord, stats: &ScanStatistics) {
        debug!("Published: {}", record.name());
        if stats
            .processed
            .is_multiple_of(ProgressConsts::LOG_EVERY_PROCESSED)
        {
            info!("Progress: {}", stats);
        }
    }

    fn on_failed(&self, path: &Path, reason: &FailureReason, _stats: &ScanStatistics) {
        warn!("Failed {}: {}", path.display(), reason);
    }

    fn on_skipped(&self, path: &Path, reason: &SkipReason, _stats: &ScanStatistics) {
        match reason {
            SkipReason::Filtered { .. } | SkipReason::NotRegularFile => {
                debug!("Skipped {}: {}", path.display(), reason)
            }
            SkipReason::Unreachable(_) => warn!("Skipped {}: {}", path.display(), reason),
        }
    }

    fn on_connection_state(&self, from: ConnectionState, to: ConnectionState) {
        match to {
            ConnectionState::Reconnecting | ConnectionState::Disconnected
                if from.is_connected() || from == ConnectionState::Reconnecting =>
            {
                warn!("Broker connection {:?} -> {:?}", from, to)
            }
            _ => debug!("Broker connection {:?} -> {:?}", from, to),
        }
    }

    fn on_finished(&self, stats: &ScanStatistics) {
        info!("Scan completed. {}", stats);
    }
}

/// Fans each event out to several observers in order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn ScanObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl ScanObserver for ObserverSet {
    fn on_processed(&self, record: &FileRecord, stats: &ScanStatistics) {
        for o in &self.observers {
            o.on_processed(record, stats);
        }
    }

    fn on_failed(&self, path: &Path, reason: &FailureReason, stats: &ScanStatistics) {
        for o in &self.observers {
            o.on_failed(path, reason, stats);
        }
    }

    fn on_skipped(&self, path: &Path, reason: &SkipReason, stats: &ScanStatistics) {
        for o in &self.observers {
            o.on_skipped(path, reason, stats);
        }
    }

    fn on_connection_state(&self, from: ConnectionState, to: ConnectionState) {
        for o in &self.observers {
            o.on_connection_state(from, to);
        }
    }

    fn on_finished(&self, stats: &ScanStatistics) {
        for o in &self.observers {
            o.on_finished(stats);
        }
    }
}
