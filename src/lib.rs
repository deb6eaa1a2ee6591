//! Filequeue: reliable filesystem-to-queue producer.
//!
//! Walks one or more directory trees, extracts per-file metadata, and publishes one
//! publisher-confirmed, persistent JSON message per file. Single-threaded and sequential per file:
//! a record is only counted as processed after the broker acked it.

pub mod broker;
pub mod engine;
pub mod errors;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use broker::{AmqpTransport, ConnectionManager, ConnectionState, Transport};
pub use errors::{ConnectionError, ExtractionError, PublishError, TraversalError};
pub use pipeline::{MetadataExtractor, ScanObserver, ScanOrchestrator, Traversal, run_scan};

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Result alias used by the application-facing API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Build the AMQP-backed collaborators from a resolved `config` and run one scan.
///
/// - **`stop`**: checked between files; set it (e.g. from a Ctrl+C handler) to end early with the
///   counters gathered so far.
/// - **`observer`**: receives per-file and connection events. Pass [`pipeline::LogObserver`] for
///   plain logging.
///
/// Returns an error only when the broker cannot be reached at startup.
pub fn scan_to_broker(
    config: &ProducerConfig,
    stop: Option<Arc<AtomicBool>>,
    observer: Arc<dyn ScanObserver>,
) -> Result<ScanStatistics> {
    let transport = AmqpTransport::new(&config.broker)?;
    let manager = ConnectionManager::new(transport, config.broker.clone());
    let traversal = Traversal::new(config.scan.roots.clone(), config.scan.extensions.as_deref());
    let extractor = MetadataExtractor::new(config.scan.with_hash);

    let mut orchestrator = ScanOrchestrator::new(traversal, extractor, manager).with_observer(observer);
    if let Some(stop) = stop {
        orchestrator = orchestrator.with_stop_flag(stop);
    }
    Ok(orchestrator.run()?)
}
