//! Path, extension, and formatting utilities

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::utils::config::SIZE_UNITS;

/// Human-readable size, base 1024, two decimals: `1024` → `"1.00 KB"`.
/// Sizes past the last unit stay in TB.
pub fn format_size(size_bytes: u64) -> String {
    let mut value = size_bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, SIZE_UNITS[unit])
}

/// Lowercased extension with leading dot (`"Report.PDF"` → `".pdf"`), or empty when there is none.
/// Dotfiles such as `.bashrc` have no extension.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Normalize one allow-list entry: trim, lowercase, ensure a leading dot. Empty input stays empty.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Normalize an allow-list, dropping empty entries and duplicates (order kept).
pub fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(exts.len());
    for ext in exts.iter().map(|e| normalize_extension(e)) {
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

/// Make `root` absolute against the current directory and resolve symlinks when it exists.
/// A missing root is returned absolute but unresolved so the walk can report it as unreachable.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(root)
        .with_context(|| format!("resolve {} against current directory", root.display()))?;
    Ok(absolute.canonicalize().unwrap_or(absolute))
}

/// True if the process is running with effective uid 0 (permission checks do not apply).
#[cfg(unix)]
pub fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(524_288), "512.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
        assert_eq!(format_size(1024_u64.pow(4)), "1.00 TB");
        assert_eq!(format_size(2048 * 1024_u64.pow(4)), "2048.00 TB");
    }

    #[test]
    fn test_file_extension_normalized() {
        assert_eq!(file_extension(Path::new("/a/Report.PDF")), ".pdf");
        assert_eq!(file_extension(Path::new("/a/archive.tar.gz")), ".gz");
        assert_eq!(file_extension(Path::new("/a/Makefile")), "");
        assert_eq!(file_extension(Path::new("/a/.bashrc")), "");
    }

    #[test]
    fn test_normalize_extensions() {
        let raw = vec![
            "pdf".to_string(),
            ".PDF".to_string(),
            " Jpg ".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_extensions(&raw), vec![".pdf", ".jpg"]);
    }
}
