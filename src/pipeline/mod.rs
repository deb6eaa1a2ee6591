//! Pipeline components: walk, metadata, events, orchestration.

pub mod events;
pub mod metadata;
pub mod orchestrator;
pub mod walk;

pub use events::{
    FailureReason, LogObserver, NoopObserver, ObserverSet, ScanObserver, SkipReason,
};
pub use metadata::MetadataExtractor;
pub use orchestrator::{ScanOrchestrator, run_scan};
pub use walk::{Traversal, WalkOutcome};
