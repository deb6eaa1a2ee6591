pub mod config;
pub mod credentials;
pub mod filequeue_toml;
pub mod logger;

pub use config::*;
pub use credentials::broker_password_from_env;
pub use filequeue_toml::{
    FilequeueToml, apply_file_to_config, load_config_file, load_default_config,
};
pub use logger::setup_logging;
