//! Application configuration constants.
//! Defaults and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Config file looked up in the current directory when `--config` is not given.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Name of an environment variable owned by this package, e.g. `FILEQUEUE_BROKER_PASSWORD`.
    pub fn env_var(&self, suffix: &str) -> String {
        format!("{}_{}", self.env_prefix, suffix)
    }
}

// ---- Broker ----

/// Broker connection defaults (RabbitMQ out of the box).
pub struct BrokerDefaults;

impl BrokerDefaults {
    pub const HOST: &'static str = "localhost";
    pub const PORT: u16 = 5672;
    pub const USERNAME: &'static str = "guest";
    pub const PASSWORD: &'static str = "guest";
    pub const VHOST: &'static str = "/";
    pub const QUEUE: &'static str = "file_scan_queue";
    /// AMQP heartbeat negotiated with the broker (seconds). Long enough to survive a slow hash.
    pub const HEARTBEAT_SECS: u16 = 600;
    /// Upper bound for establishing the TCP connection + channel.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Upper bound for waiting on a single publisher confirm.
    pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Connect/reconnect attempt budget and backoff curve.
pub struct RetryConsts;

impl RetryConsts {
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Delay after the first failed attempt; doubles per attempt up to [`Self::MAX_DELAY`].
    pub const BASE_DELAY: Duration = Duration::from_secs(2);
    pub const MAX_DELAY: Duration = Duration::from_secs(30);
}

/// Proactive liveness checks between publishes.
pub struct HealthCheckConsts;

impl HealthCheckConsts {
    /// Check the connection every N publishes.
    pub const EVERY_MESSAGES: u64 = 100;
    /// ...or when this much wall time passed since the last check.
    pub const INTERVAL: Duration = Duration::from_secs(60);
}

// ---- Progress ----

pub struct ProgressConsts;

impl ProgressConsts {
    /// Log a progress line every N processed files.
    pub const LOG_EVERY_PROCESSED: u64 = 100;
}

// ---- Hashing ----

/// Hashing limits and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// Files at or above this size are never hashed (bytes). 100 MiB.
    pub const MAX_HASH_SIZE: u64 = 100 * 1024 * 1024;
    /// Chunk size for streaming reads while hashing (bytes). 64 KiB.
    pub const HASH_READ_CHUNK_SIZE: usize = 64 * 1024;
}

/// Units used by human-readable size formatting (base 1024).
pub const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
