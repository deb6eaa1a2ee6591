//! Public types: the per-file record, run statistics, and the producer configuration.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::config::{BrokerDefaults, HealthCheckConsts, RetryConsts};

/// Immutable metadata snapshot for one scanned file. Serializes to the queue message body.
///
/// Built only by the metadata extractor; there is no way to mutate a record once produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "file_path")]
    path: String,
    #[serde(rename = "file_name")]
    name: String,
    #[serde(rename = "file_extension")]
    extension: String,
    #[serde(rename = "file_size_bytes")]
    size_bytes: u64,
    #[serde(rename = "file_size_human")]
    size_human: String,
    #[serde(rename = "created_time", with = "micros")]
    created_at: NaiveDateTime,
    #[serde(rename = "modified_time", with = "micros")]
    modified_at: NaiveDateTime,
    #[serde(rename = "accessed_time", with = "micros")]
    accessed_at: NaiveDateTime,
    is_symlink: bool,
    #[serde(with = "micros")]
    scan_timestamp: NaiveDateTime,
    #[serde(
        rename = "sha256_hash",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    content_hash: Option<String>,
}

/// Field values for [`FileRecord::new`]. Kept separate so the extractor can fill them by name.
pub(crate) struct FileRecordParts {
    pub path: String,
    pub name: String,
    pub extension: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub accessed_at: NaiveDateTime,
    pub is_symlink: bool,
    pub scan_timestamp: NaiveDateTime,
    pub content_hash: Option<String>,
}

impl FileRecord {
    pub(crate) fn new(parts: FileRecordParts) -> Self {
        Self {
            path: parts.path,
            name: parts.name,
            extension: parts.extension,
            size_bytes: parts.size_bytes,
            size_human: parts.size_human,
            created_at: parts.created_at,
            modified_at: parts.modified_at,
            accessed_at: parts.accessed_at,
            is_symlink: parts.is_symlink,
            scan_timestamp: parts.scan_timestamp,
            content_hash: parts.content_hash,
        }
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased extension with leading dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn size_human(&self) -> &str {
        &self.size_human
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn modified_at(&self) -> NaiveDateTime {
        self.modified_at
    }

    pub fn accessed_at(&self) -> NaiveDateTime {
        self.accessed_at
    }

    pub fn is_symlink(&self) -> bool {
        self.is_symlink
    }

    pub fn scan_timestamp(&self) -> NaiveDateTime {
        self.scan_timestamp
    }

    /// SHA-256 hex digest, present only when hashing was enabled and the file was under the size cap.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    /// UTF-8 JSON message body.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Timestamps as ISO-8601 local time with exactly six fractional digits.
mod micros {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Run counters. Owned by the orchestrator; at the end of a run
/// `processed + failed + skipped` equals the number of traversal candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl ScanStatistics {
    pub fn total(&self) -> u64 {
        self.processed + self.failed + self.skipped
    }
}

impl fmt::Display for ScanStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {}, Failed: {}, Skipped: {}",
            self.processed, self.failed, self.skipped
        )
    }
}

/// Bounded connect/reconnect policy: `max_attempts` tries with exponential backoff capped at `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RetryConsts::MAX_ATTEMPTS,
            base_delay: RetryConsts::BASE_DELAY,
            max_delay: RetryConsts::MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// When to proactively verify the broker connection between publishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthCheckPolicy {
    /// Check every N publishes (0 disables the count trigger).
    pub every_messages: u64,
    /// Check when this much time passed since the last check.
    pub interval: Duration,
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self {
            every_messages: HealthCheckConsts::EVERY_MESSAGES,
            interval: HealthCheckConsts::INTERVAL,
        }
    }
}

/// Broker endpoint, queue, and delivery tuning.
#[derive(Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Durable queue; also the routing key on the default exchange.
    pub queue: String,
    pub heartbeat_secs: u16,
    pub connect_timeout: Duration,
    pub confirm_timeout: Duration,
    pub retry: RetryPolicy,
    pub health_check: HealthCheckPolicy,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: BrokerDefaults::HOST.to_string(),
            port: BrokerDefaults::PORT,
            username: BrokerDefaults::USERNAME.to_string(),
            password: BrokerDefaults::PASSWORD.to_string(),
            vhost: BrokerDefaults::VHOST.to_string(),
            queue: BrokerDefaults::QUEUE.to_string(),
            heartbeat_secs: BrokerDefaults::HEARTBEAT_SECS,
            connect_timeout: BrokerDefaults::CONNECT_TIMEOUT,
            confirm_timeout: BrokerDefaults::CONFIRM_TIMEOUT,
            retry: RetryPolicy::default(),
            health_check: HealthCheckPolicy::default(),
        }
    }
}

impl BrokerSettings {
    /// `host:port` for log lines.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("queue", &self.queue)
            .field("heartbeat_secs", &self.heartbeat_secs)
            .field("connect_timeout", &self.connect_timeout)
            .field("confirm_timeout", &self.confirm_timeout)
            .field("retry", &self.retry)
            .field("health_check", &self.health_check)
            .finish()
    }
}

/// What to scan and how.
#[derive(Clone, Debug, Default)]
pub struct ScanOpts {
    /// Root directories, walked in order.
    pub roots: Vec<PathBuf>,
    /// Allowed extensions (`.pdf`, `pdf`, `PDF` all accepted). None = every file.
    pub extensions: Option<Vec<String>>,
    /// Compute a SHA-256 digest for files under the size cap.
    pub with_hash: bool,
}

/// Fully resolved producer configuration. Read once at construction time, never mid-run.
#[derive(Clone, Debug, Default)]
pub struct ProducerConfig {
    pub broker: BrokerSettings,
    pub scan: ScanOpts,
}
