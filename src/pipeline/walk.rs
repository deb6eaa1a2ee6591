//! Traversal engine: a lazy, depth-first walk over one or more roots.
//!
//! Yields one [`WalkOutcome`] per candidate: a file to process, or a skip (filtered extension,
//! special file, unreadable subtree). Memory is bounded by directory depth; the file list is never
//! collected. Consumed by value, so a traversal cannot be restarted.

use log::debug;
use std::fs;
use std::iter::FusedIterator;
use std::path::PathBuf;

use walkdir::{DirEntry, WalkDir};

use crate::engine::tools::{file_extension, normalize_extensions};
use crate::errors::TraversalError;
use crate::pipeline::events::SkipReason;

/// One candidate produced by the walk.
#[derive(Debug)]
pub enum WalkOutcome {
    /// Regular file (or symlink to one) that passed the extension filter.
    File(PathBuf),
    /// Counted as skipped; never reaches the extractor.
    Skipped { path: PathBuf, reason: SkipReason },
}

pub struct Traversal {
    roots: std::vec::IntoIter<PathBuf>,
    current: Option<walkdir::IntoIter>,
    current_root: PathBuf,
    allowed: Option<Vec<String>>,
}

impl Traversal {
    /// Walk `roots` in order. `extensions` is normalized (`pdf`, `.PDF` → `.pdf`);
    /// `None` or an empty list lets every file through.
    pub fn new(roots: Vec<PathBuf>, extensions: Option<&[String]>) -> Self {
        let allowed = extensions
            .map(normalize_extensions)
            .filter(|exts| !exts.is_empty());
        if let Some(exts) = &allowed {
            debug!("Filtering by extensions: {:?}", exts);
        }
        Self {
            roots: roots.into_iter(),
            current: None,
            current_root: PathBuf::new(),
            allowed,
        }
    }

    /// Only the files to process; skips are dropped. For callers that do not keep statistics.
    pub fn files(self) -> impl Iterator<Item = PathBuf> {
        self.filter_map(|outcome| match outcome {
            WalkOutcome::File(path) => Some(path),
            WalkOutcome::Skipped { .. } => None,
        })
    }

    fn classify(&self, entry: DirEntry) -> Option<WalkOutcome> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }
        if file_type.is_symlink() {
            // Links are never followed into directories (cycles); a dangling link is still a file candidate.
            match fs::metadata(entry.path()) {
                Ok(target) if target.is_dir() => {
                    debug!("Not following directory symlink {}", entry.path().display());
                    return None;
                }
                Ok(target) if !target.is_file() => return Some(special_file(entry)),
                _ => {}
            }
        } else if !file_type.is_file() {
            return Some(special_file(entry));
        }

        let path = entry.into_path();
        if let Some(allowed) = &self.allowed {
            let extension = file_extension(&path);
            if !allowed.contains(&extension) {
                return Some(WalkOutcome::Skipped {
                    path,
                    reason: SkipReason::Filtered { extension },
                });
            }
        }
        Some(WalkOutcome::File(path))
    }
}

/// FIFOs, sockets, and devices are counted but never opened (a read could block forever).
fn special_file(entry: DirEntry) -> WalkOutcome {
    WalkOutcome::Skipped {
        path: entry.into_path(),
        reason: SkipReason::NotRegularFile,
    }
}

impl Iterator for Traversal {
    type Item = WalkOutcome;

    fn next(&mut self) -> Option<WalkOutcome> {
        loop {
            let Some(walker) = self.current.as_mut() else {
                let root = self.roots.next()?;
                debug!("Starting walk of {}", root.display());
                self.current = Some(WalkDir::new(&root).follow_links(false).into_iter());
                self.current_root = root;
                continue;
            };
            match walker.next() {
                None => self.current = None,
                Some(Ok(entry)) => {
                    if let Some(outcome) = self.classify(entry) {
                        return Some(outcome);
                    }
                }
                Some(Err(err)) => {
                    let error = TraversalError::from_walkdir(&err, &self.current_root);
                    return Some(WalkOutcome::Skipped {
                        path: error.path().clone(),
                        reason: SkipReason::Unreachable(error),
                    });
                }
            }
        }
    }
}

impl FusedIterator for Traversal {}
