//! Metadata extractor: one path in, one immutable [`FileRecord`] (or a typed error) out.

use chrono::{DateTime, Local, NaiveDateTime, Offset, SubsecRound, TimeZone};
use log::debug;
use std::fs::{self, Metadata};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::hashing::{hash_file, should_hash};
use crate::engine::tools::{file_extension, format_size};
use crate::errors::ExtractionError;
use crate::types::{FileRecord, FileRecordParts};

/// Stateless apart from its hashing switch; no retries, one call per file.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetadataExtractor {
    with_hash: bool,
}

impl MetadataExtractor {
    pub fn new(with_hash: bool) -> Self {
        Self { with_hash }
    }

    pub fn with_hash(&self) -> bool {
        self.with_hash
    }

    /// Stat `path` and build its record. Hashes only when enabled and the statted size is under
    /// the cap; oversized files are never opened.
    ///
    /// Timestamps chrono cannot represent (e.g. a far-future mtime) fail the file with
    /// [`ExtractionError::TimestampOutOfRange`].
    pub fn extract(&self, path: &Path) -> Result<FileRecord, ExtractionError> {
        let link_meta = fs::symlink_metadata(path).map_err(|e| ExtractionError::io(path, e))?;
        let is_symlink = link_meta.file_type().is_symlink();
        let meta = if is_symlink {
            resolve_link(path, link_meta)
        } else {
            link_meta
        };

        let absolute = std::path::absolute(path).map_err(|e| ExtractionError::io(path, e))?;
        let out_of_range = || ExtractionError::TimestampOutOfRange {
            path: absolute.clone(),
        };
        let modified_at =
            local_time(meta.modified().unwrap_or(UNIX_EPOCH)).ok_or_else(out_of_range)?;
        let accessed_at =
            local_time(meta.accessed().unwrap_or(UNIX_EPOCH)).ok_or_else(out_of_range)?;

        let size_bytes = meta.len();
        // A dangling link has nothing to read.
        let content_hash = if meta.is_file() && should_hash(self.with_hash, size_bytes) {
            let digest = hash_file(&absolute).map_err(|source| match source.kind() {
                // Vanished or locked between stat and open: same taxonomy as the stat stage.
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ExtractionError::io(&absolute, source)
                }
                _ => ExtractionError::HashRead {
                    path: absolute.clone(),
                    source,
                },
            })?;
            Some(digest)
        } else {
            None
        };

        Ok(FileRecord::new(FileRecordParts {
            path: absolute.to_string_lossy().into_owned(),
            name: absolute
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: file_extension(&absolute),
            size_bytes,
            size_human: format_size(size_bytes),
            created_at: created_time(&meta).unwrap_or(modified_at),
            modified_at,
            accessed_at,
            is_symlink,
            scan_timestamp: Local::now().naive_local().trunc_subsecs(6),
            content_hash,
        }))
    }
}

/// Target metadata for a symlink, or the link's own metadata when the target cannot be resolved
/// (dangling, loop, denied).
fn resolve_link(path: &Path, link_meta: Metadata) -> Metadata {
    match fs::metadata(path) {
        Ok(target) => target,
        Err(e) => {
            debug!(
                "Cannot resolve symlink {} ({}); describing the link itself",
                path.display(),
                e
            );
            link_meta
        }
    }
}

/// Local wall time for `t`, or `None` when it lies outside chrono's representable range.
fn local_time(t: SystemTime) -> Option<NaiveDateTime> {
    let (secs, nanos) = match t.duration_since(UNIX_EPOCH) {
        Ok(after) => (i64::try_from(after.as_secs()).ok()?, after.subsec_nanos()),
        Err(before) => {
            let before = before.duration();
            let secs = -i64::try_from(before.as_secs()).ok()?;
            match before.subsec_nanos() {
                0 => (secs, 0),
                n => (secs.checked_sub(1)?, 1_000_000_000 - n),
            }
        }
    };
    from_unix(secs, nanos)
}

/// Checked at both steps: the epoch conversion and the local offset shift.
fn from_unix(secs: i64, nanos: u32) -> Option<NaiveDateTime> {
    let utc = DateTime::from_timestamp(secs, nanos)?.naive_utc();
    let offset = Local.offset_from_utc_datetime(&utc).fix();
    utc.checked_add_offset(offset).map(|t| t.trunc_subsecs(6))
}

/// Birth time where the filesystem reports it, else inode change time on Unix.
fn created_time(meta: &Metadata) -> Option<NaiveDateTime> {
    meta.created()
        .ok()
        .and_then(local_time)
        .or_else(|| status_change_time(meta))
}

#[cfg(unix)]
fn status_change_time(meta: &Metadata) -> Option<NaiveDateTime> {
    use std::os::unix::fs::MetadataExt;
    from_unix(meta.ctime(), u32::try_from(meta.ctime_nsec()).ok()?)
}

#[cfg(not(unix))]
fn status_change_time(_meta: &Metadata) -> Option<NaiveDateTime> {
    None
}
