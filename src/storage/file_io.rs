//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt data on failure. Every
//! write goes to a temp file in the same directory, is synced, and is then
//! renamed over the destination.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::SnapvaultError;

/// Temp path used when atomically replacing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(crate::config::paths::TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, SnapvaultError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| SnapvaultError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| SnapvaultError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to the temp file for `path` without publishing it
///
/// Returns the temp path. Nothing is visible at `path` until
/// [`commit_temp`] renames it into place.
pub fn write_json_temp<T, P>(path: P, data: &T) -> Result<PathBuf, SnapvaultError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SnapvaultError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Create temp file in same directory (important for atomic rename)
    let temp_path = temp_path_for(path);

    let file = File::create(&temp_path)
        .map_err(|e| SnapvaultError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    let written = serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| SnapvaultError::Storage(format!("Failed to serialize data: {}", e)))
        .and_then(|()| {
            writer
                .flush()
                .map_err(|e| SnapvaultError::Storage(format!("Failed to flush data: {}", e)))
        })
        .and_then(|()| {
            // Sync to disk before rename
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| SnapvaultError::Storage(format!("Failed to sync data: {}", e)))
        });

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    Ok(temp_path)
}

/// Atomically rename a fully written temp file over `path`
pub fn commit_temp(temp_path: &Path, path: &Path) -> Result<(), SnapvaultError> {
    fs::rename(temp_path, path).map_err(|e| {
        // Try to clean up temp file if rename fails
        let _ = fs::remove_file(temp_path);
        SnapvaultError::Storage(format!("Failed to rename temp file: {}", e))
    })
}

/// Write JSON to a file atomically (write to temp, then rename)
///
/// This ensures that the file is either completely written or not modified at all,
/// preventing corruption on crashes or power failures.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), SnapvaultError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = write_json_temp(path, data)?;
    commit_temp(&temp_path, path)
}

/// Write raw bytes to `path` through `temp_path` and an atomic rename
pub fn write_bytes_atomic(path: &Path, temp_path: &Path, bytes: &[u8]) -> Result<(), SnapvaultError> {
    let written = File::create(temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });

    if let Err(e) = written {
        let _ = fs::remove_file(temp_path);
        return Err(SnapvaultError::Io(format!(
            "Failed to write {}: {}",
            temp_path.display(),
            e
        )));
    }

    fs::rename(temp_path, path).map_err(|e| {
        let _ = fs::remove_file(temp_path);
        SnapvaultError::Io(format!("Failed to rename into {}: {}", path.display(), e))
    })
}
