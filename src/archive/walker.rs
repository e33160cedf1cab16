//! Source tree traversal
//!
//! Symbolic links are never followed, which rules out cycles and keeps the
//! archive confined to the source tree. Every symlink, special file, and
//! unreadable entry is reported as skipped instead of aborting the walk.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{SnapvaultError, SnapvaultResult};

/// A regular file to archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Path relative to the source root
    pub relative_path: PathBuf,
}

/// An entry left out of the archive, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedEntry {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result of walking a source tree
#[derive(Debug, Default)]
pub struct SourceListing {
    /// Regular files, sorted by relative path
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedEntry>,
}

/// Collect every regular file under `root` in deterministic order
pub fn collect_files(root: &Path) -> SnapvaultResult<SourceListing> {
    collect_files_excluding(root, None)
}

/// Like [`collect_files`], but leaves out the `exclude` subtree when it lies
/// inside `root`
///
/// The excluded directory is reported once as skipped and never descended.
pub fn collect_files_excluding(
    root: &Path,
    exclude: Option<&Path>,
) -> SnapvaultResult<SourceListing> {
    let metadata = fs::metadata(root).map_err(|e| {
        SnapvaultError::Archive(format!("Cannot read source {}: {}", root.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(SnapvaultError::Archive(format!(
            "Source is not a directory: {}",
            root.display()
        )));
    }

    let excluded = exclude.and_then(|dir| nested_relative(root, dir));
    let mut listing = SourceListing::default();
    let mut entries = WalkDir::new(root).follow_links(false).min_depth(1).into_iter();

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                listing.skipped.push(SkippedEntry::new(path, e.to_string()));
                continue;
            }
        };

        let relative_path = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());

        let file_type = entry.file_type();
        if file_type.is_dir() {
            if excluded.as_deref() == Some(relative_path.as_path()) {
                listing
                    .skipped
                    .push(SkippedEntry::new(entry.path(), "backup directory excluded"));
                entries.skip_current_dir();
            }
            continue;
        }
        if file_type.is_symlink() {
            listing
                .skipped
                .push(SkippedEntry::new(entry.path(), "symbolic link not followed"));
            continue;
        }
        if !file_type.is_file() {
            listing
                .skipped
                .push(SkippedEntry::new(entry.path(), "not a regular file"));
            continue;
        }

        listing.files.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative_path,
        });
    }

    listing
        .files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    listing.skipped.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(listing)
}

/// Path of `dir` relative to `root` when `dir` sits strictly below it
fn nested_relative(root: &Path, dir: &Path) -> Option<PathBuf> {
    let root = fs::canonicalize(root).ok()?;
    let dir = fs::canonicalize(dir).ok()?;
    dir.strip_prefix(&root)
        .ok()
        .filter(|relative| !relative.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn relative_paths(listing: &SourceListing) -> Vec<PathBuf> {
        listing
            .files
            .iter()
            .map(|f| f.relative_path.clone())
            .collect()
    }

    #[test]
    fn test_sorted_regular_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("z.txt"), "z").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("sub/b.txt"), "b").unwrap();
        fs::write(root.join("sub/deeper/c.txt"), "c").unwrap();

        let listing = collect_files(root).unwrap();
        assert_eq!(
            relative_paths(&listing),
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("sub/b.txt"),
                PathBuf::from("sub/deeper/c.txt"),
                PathBuf::from("z.txt"),
            ]
        );
        assert!(listing.skipped.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped_and_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("real.txt"), "data").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("missing"), root.join("broken")).unwrap();
        std::os::unix::fs::symlink(root, root.join("loop")).unwrap();

        let listing = collect_files(root).unwrap();
        assert_eq!(relative_paths(&listing), vec![PathBuf::from("real.txt")]);
        assert_eq!(listing.skipped.len(), 3);
        assert!(listing
            .skipped
            .iter()
            .all(|s| s.reason == "symbolic link not followed"));
    }

    #[test]
    fn test_nested_backup_dir_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("vault/deeper")).unwrap();
        fs::write(root.join("real.txt"), "data").unwrap();
        fs::write(root.join("vault/old.enc"), "snapshot").unwrap();
        fs::write(root.join("vault/deeper/manifest.json"), "[]").unwrap();

        let listing = collect_files_excluding(root, Some(&root.join("vault"))).unwrap();
        assert_eq!(relative_paths(&listing), vec![PathBuf::from("real.txt")]);
        assert_eq!(
            listing.skipped,
            vec![SkippedEntry::new(root.join("vault"), "backup directory excluded")]
        );
    }

    #[test]
    fn test_outside_exclusion_ignored() {
        let source = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "a").unwrap();

        let listing = collect_files_excluding(source.path(), Some(elsewhere.path())).unwrap();
        assert_eq!(relative_paths(&listing), vec![PathBuf::from("a.txt")]);
        assert!(listing.skipped.is_empty());
    }

    #[test]
    fn test_missing_source_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = collect_files(&temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, SnapvaultError::Archive(_)));
    }

    #[test]
    fn test_file_source_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            collect_files(&file),
            Err(SnapvaultError::Archive(_))
        ));
    }
}
