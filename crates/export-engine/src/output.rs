//! Output file naming and cleanup in the scratch directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use splice_common::error::SpliceResult;
use splice_media_model::plan::OutputFormat;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Pick a fresh output path `<label>_<timestamp>_<seq>.<ext>` in `scratch_dir`.
///
/// The directory is created if needed and anything already at the chosen
/// path is deleted. The returned path is absolute.
pub fn allocate_output_path(
    scratch_dir: &Path,
    label: &str,
    format: OutputFormat,
) -> SpliceResult<PathBuf> {
    let dir = if scratch_dir.is_absolute() {
        scratch_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(scratch_dir)
    };
    std::fs::create_dir_all(&dir)?;

    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
    let path = dir.join(format!("{label}_{stamp}_{seq}.{}", format.extension()));

    if remove_if_present(&path)? {
        tracing::debug!(path = %path.display(), "Removed stale file at output path");
    }
    Ok(path)
}

/// Delete `path` if it exists. Returns whether a file was removed.
pub fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Best-effort removal of partial output, logging instead of failing.
pub(crate) fn discard_partial(path: &Path) {
    match remove_if_present(path) {
        Ok(true) => tracing::info!(path = %path.display(), "Deleted partial output"),
        Ok(false) => {}
        Err(err) => tracing::warn!(
            error = %err,
            path = %path.display(),
            "Failed to delete partial output"
        ),
    }
}

/// Whether `path` is a regular file with at least one byte.
pub fn is_non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_unique_and_named_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let a = allocate_output_path(dir.path(), "trim", OutputFormat::Mp4).unwrap();
        let b = allocate_output_path(dir.path(), "trim", OutputFormat::Mp4).unwrap();
        assert_ne!(a, b);
        assert!(a.is_absolute());
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("trim_"));
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn test_creates_missing_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = allocate_output_path(&nested, "thumbnail", OutputFormat::Jpeg).unwrap();
        assert!(nested.is_dir());
        assert_eq!(path.extension().unwrap(), "jpg");
    }

    #[test]
    fn test_remove_if_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.mp4");
        assert!(!remove_if_present(&path).unwrap());
        std::fs::write(&path, b"x").unwrap();
        assert!(is_non_empty_file(&path));
        assert!(remove_if_present(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_file_is_not_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        std::fs::write(&path, b"").unwrap();
        assert!(!is_non_empty_file(&path));
        assert!(!is_non_empty_file(dir.path()));
    }
}
