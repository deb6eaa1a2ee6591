//! Engine module: CLI surface and the helpers the pipeline stages share

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::{handle_run, resolve_config};
pub use hashing::{hash_file, should_hash};
pub use progress::ProgressObserver;
pub use tools::{
    file_extension, format_size, normalize_extension, normalize_extensions, resolve_root,
    running_as_root,
};
