//! Load `filequeue.toml` (CLI only). The lib never reads files; callers pass a resolved
//! [`ProducerConfig`](crate::ProducerConfig).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ProducerConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilequeueToml {
    #[serde(default)]
    broker: BrokerSection,
    #[serde(default)]
    scan: ScanSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BrokerSection {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    vhost: Option<String>,
    queue: Option<String>,
    max_retries: Option<u32>,
    retry_delay_secs: Option<u64>,
    max_retry_delay_secs: Option<u64>,
    confirm_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    heartbeat_secs: Option<u16>,
    health_check_every: Option<u64>,
    health_check_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScanSection {
    input_dirs: Option<Vec<PathBuf>>,
    extensions: Option<Vec<String>>,
    calculate_hash: Option<bool>,
}

impl FilequeueToml {
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse config")
    }
}

/// Load an explicit config file. Missing or malformed is an error.
pub fn load_config_file(path: &Path) -> Result<FilequeueToml> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    FilequeueToml::parse(&s).with_context(|| format!("in {}", path.display()))
}

/// Load the default config file from `dir` if present. A malformed file is logged and ignored.
pub fn load_default_config(dir: &Path) -> Option<FilequeueToml> {
    let path = dir.join(crate::utils::config::PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    FilequeueToml::parse(&s)
        .map_err(|e| log::warn!("{}: {:#}", path.display(), e))
        .ok()
}

/// Overwrite config field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $target:expr, $field:ident => $($target_field:ident).+) => {
        if let Some(v) = $section.$field.clone() {
            $target.$($target_field).+ = v;
        }
    };
}

/// Apply file values to `config` (only fields present in the file). Call before env and CLI layers.
pub fn apply_file_to_config(file: &FilequeueToml, config: &mut ProducerConfig) {
    let b = &file.broker;
    apply_file_opt!(b, config, host => broker.host);
    apply_file_opt!(b, config, port => broker.port);
    apply_file_opt!(b, config, username => broker.username);
    apply_file_opt!(b, config, password => broker.password);
    apply_file_opt!(b, config, vhost => broker.vhost);
    apply_file_opt!(b, config, queue => broker.queue);
    apply_file_opt!(b, config, max_retries => broker.retry.max_attempts);
    apply_file_opt!(b, config, heartbeat_secs => broker.heartbeat_secs);
    apply_file_opt!(b, config, health_check_every => broker.health_check.every_messages);
    if let Some(secs) = b.retry_delay_secs {
        config.broker.retry.base_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = b.max_retry_delay_secs {
        config.broker.retry.max_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = b.confirm_timeout_secs {
        config.broker.confirm_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = b.connect_timeout_secs {
        config.broker.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = b.health_check_interval_secs {
        config.broker.health_check.interval = Duration::from_secs(secs);
    }

    let s = &file.scan;
    apply_file_opt!(s, config, input_dirs => scan.roots);
    apply_file_opt!(s, config, calculate_hash => scan.with_hash);
    if let Some(exts) = &s.extensions {
        config.scan.extensions = Some(exts.clone());
    }
}
