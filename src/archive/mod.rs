//! Directory archiving
//!
//! Serializes a source tree into a gzip-compressed tar stream and extracts
//! it again. Archives are deterministic: entries are sorted by relative
//! path, and timestamps and ownership are zeroed, so identical trees produce
//! identical bytes.
//!
//! Extraction is all-or-nothing. Entries are unpacked into a staging
//! directory next to the destination, which is renamed into place only
//! after every entry succeeded.

pub mod walker;

use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use tar::{EntryType, Header};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{SnapvaultError, SnapvaultResult};

pub use walker::{SkippedEntry, SourceFile};

/// Default compression level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Summary of a pack operation
#[derive(Debug, Default, Clone)]
pub struct PackStats {
    /// Number of files archived
    pub file_count: usize,
    /// Uncompressed bytes archived
    pub total_bytes: u64,
    /// Entries left out of the archive
    pub skipped: Vec<SkippedEntry>,
}

/// Summary of an unpack operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnpackStats {
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Packs and unpacks directory trees
#[derive(Debug, Clone, Copy)]
pub struct Archiver {
    compression: Compression,
}

impl Archiver {
    /// Create an archiver; level 0 stores data uncompressed
    pub fn new(level: u32) -> Self {
        Self {
            compression: Compression::new(level.min(9)),
        }
    }

    /// Compression level in use
    pub fn level(&self) -> u32 {
        self.compression.level()
    }

    /// Archive every regular file under `source_dir` into `out`
    ///
    /// Unreadable files are skipped and listed in the returned stats.
    pub fn pack<W: Write>(&self, source_dir: &Path, out: W) -> SnapvaultResult<PackStats> {
        self.pack_excluding(source_dir, None, out)
    }

    /// Archive `source_dir`, leaving out the `exclude` subtree if it is nested inside
    pub fn pack_excluding<W: Write>(
        &self,
        source_dir: &Path,
        exclude: Option<&Path>,
        out: W,
    ) -> SnapvaultResult<PackStats> {
        let listing = walker::collect_files_excluding(source_dir, exclude)?;
        let mut stats = PackStats {
            skipped: listing.skipped,
            ..Default::default()
        };

        // No file name and a zero mtime in the gzip header
        let encoder = GzBuilder::new().mtime(0).write(out, self.compression);
        let mut builder = tar::Builder::new(encoder);

        for file in listing.files {
            let contents = match fs::read(&file.path) {
                Ok(contents) => contents,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping unreadable file");
                    stats
                        .skipped
                        .push(SkippedEntry::new(&file.path, e.to_string()));
                    continue;
                }
            };
            let mode = match fs::metadata(&file.path) {
                Ok(metadata) => permission_bits(&metadata),
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping unreadable file");
                    stats
                        .skipped
                        .push(SkippedEntry::new(&file.path, e.to_string()));
                    continue;
                }
            };

            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(contents.len() as u64);
            header.set_mode(mode);
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);

            builder
                .append_data(&mut header, &file.relative_path, contents.as_slice())
                .map_err(|e| {
                    SnapvaultError::Archive(format!(
                        "Failed to append {}: {}",
                        file.relative_path.display(),
                        e
                    ))
                })?;

            stats.file_count += 1;
            stats.total_bytes += contents.len() as u64;
        }

        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| SnapvaultError::Archive(format!("Failed to finish archive: {}", e)))?;

        debug!(
            files = stats.file_count,
            bytes = stats.total_bytes,
            skipped = stats.skipped.len(),
            "Packed source tree"
        );
        Ok(stats)
    }

    /// Extract an archive into `dest_dir`, which must be absent or empty
    ///
    /// On failure `dest_dir` is left exactly as it was.
    pub fn unpack<R: Read>(&self, input: R, dest_dir: &Path) -> SnapvaultResult<UnpackStats> {
        if dest_dir.exists() {
            let is_empty_dir = dest_dir.is_dir()
                && fs::read_dir(dest_dir)
                    .map(|mut entries| entries.next().is_none())
                    .unwrap_or(false);
            if !is_empty_dir {
                return Err(SnapvaultError::Archive(format!(
                    "Destination is not an empty directory: {}",
                    dest_dir.display()
                )));
            }
        }

        let dest_name = dest_dir
            .file_name()
            .ok_or_else(|| {
                SnapvaultError::Archive(format!("Invalid destination: {}", dest_dir.display()))
            })?
            .to_string_lossy()
            .to_string();
        let parent = dest_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let staging = parent.join(format!(".{}.staging-{}", dest_name, Uuid::new_v4()));
        fs::create_dir(&staging)?;

        let result = extract_into(input, &staging).and_then(|stats| {
            swap_into_place(&staging, dest_dir)?;
            Ok(stats)
        });

        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    }
}

impl Default for Archiver {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

/// Rename `staging` onto `dest_dir`, replacing it if it is an empty directory
///
/// If the rename fails, a replaced `dest_dir` is created again.
fn swap_into_place(staging: &Path, dest_dir: &Path) -> SnapvaultResult<()> {
    let replaced = dest_dir.exists();
    if replaced {
        fs::remove_dir(dest_dir)?;
    }
    if let Err(e) = fs::rename(staging, dest_dir) {
        if replaced {
            if let Err(restore_err) = fs::create_dir(dest_dir) {
                warn!(path = %dest_dir.display(), error = %restore_err, "Failed to recreate destination");
            }
        }
        return Err(e.into());
    }
    Ok(())
}

fn extract_into<R: Read>(input: R, staging: &Path) -> SnapvaultResult<UnpackStats> {
    let malformed = |e: std::io::Error| SnapvaultError::Archive(format!("Malformed archive: {}", e));

    let mut archive = tar::Archive::new(GzDecoder::new(input));
    archive.set_preserve_mtime(false);
    let mut stats = UnpackStats::default();

    for entry in archive.entries().map_err(malformed)? {
        let mut entry = entry.map_err(malformed)?;

        let entry_type = entry.header().entry_type();
        if !matches!(entry_type, EntryType::Regular | EntryType::Directory) {
            return Err(SnapvaultError::Archive(format!(
                "Unsupported entry type: {:?}",
                entry_type
            )));
        }

        let path = entry.path().map_err(malformed)?.to_path_buf();
        let escapes = path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(SnapvaultError::Archive(format!(
                "Entry escapes destination: {}",
                path.display()
            )));
        }

        let size = entry.size();
        if !entry.unpack_in(staging).map_err(malformed)? {
            return Err(SnapvaultError::Archive(format!(
                "Entry escapes destination: {}",
                path.display()
            )));
        }

        if entry_type == EntryType::Regular {
            stats.file_count += 1;
            stats.total_bytes += size;
        }
    }

    Ok(stats)
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_source() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"0123456789").unwrap();
        fs::write(root.join("sub/b.txt"), b"01234567890123456789").unwrap();
        temp_dir
    }

    fn pack_to_vec(archiver: &Archiver, source: &Path) -> (Vec<u8>, PackStats) {
        let mut buffer = Vec::new();
        let stats = archiver.pack(source, &mut buffer).unwrap();
        (buffer, stats)
    }

    #[test]
    fn test_round_trip() {
        let source = create_source();
        let archiver = Archiver::default();
        let (bytes, stats) = pack_to_vec(&archiver, source.path());
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_bytes, 30);
        assert!(stats.skipped.is_empty());

        let out = TempDir::new().unwrap();
        let dest = out.path().join("restored");
        let unpacked = archiver.unpack(bytes.as_slice(), &dest).unwrap();
        assert_eq!(
            unpacked,
            UnpackStats {
                file_count: 2,
                total_bytes: 30
            }
        );

        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"0123456789");
        assert_eq!(
            fs::read(dest.join("sub/b.txt")).unwrap(),
            b"01234567890123456789"
        );
    }

    #[test]
    fn test_deterministic_output() {
        let source = create_source();
        let archiver = Archiver::new(9);

        let (first, _) = pack_to_vec(&archiver, source.path());
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let (second, _) = pack_to_vec(&archiver, source.path());
        assert_eq!(first, second);
    }

    #[test]
    fn test_uncompressed_level_round_trips() {
        let source = create_source();
        let archiver = Archiver::new(0);
        assert_eq!(archiver.level(), 0);

        let (bytes, _) = pack_to_vec(&archiver, source.path());
        let out = TempDir::new().unwrap();
        let dest = out.path().join("restored");
        archiver.unpack(bytes.as_slice(), &dest).unwrap();
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"0123456789");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let source = create_source();
        let script = source.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

        let archiver = Archiver::default();
        let (bytes, _) = pack_to_vec(&archiver, source.path());
        let out = TempDir::new().unwrap();
        let dest = out.path().join("restored");
        archiver.unpack(bytes.as_slice(), &dest).unwrap();

        let mode = fs::metadata(dest.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_skipped_but_pack_succeeds() {
        let source = create_source();
        std::os::unix::fs::symlink("/nonexistent", source.path().join("dangling")).unwrap();

        let (_, stats) = pack_to_vec(&Archiver::default(), source.path());
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.skipped[0].path, source.path().join("dangling"));
    }

    #[test]
    fn test_unpack_into_existing_empty_dir() {
        let source = create_source();
        let archiver = Archiver::default();
        let (bytes, _) = pack_to_vec(&archiver, source.path());

        let out = TempDir::new().unwrap();
        archiver.unpack(bytes.as_slice(), out.path()).unwrap();
        assert!(out.path().join("sub/b.txt").exists());
    }

    #[test]
    fn test_failed_swap_keeps_empty_destination() {
        let out = TempDir::new().unwrap();
        let dest = out.path().join("restored");
        fs::create_dir(&dest).unwrap();

        let err = swap_into_place(&out.path().join("never-staged"), &dest).unwrap_err();
        assert!(matches!(err, SnapvaultError::Io(_)));
        assert!(dest.is_dir());
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_pack_excluding_nested_dir() {
        let source = create_source();
        let vault = source.path().join("backups");
        fs::create_dir_all(&vault).unwrap();
        fs::write(vault.join("old.enc"), b"previous snapshot").unwrap();

        let mut buffer = Vec::new();
        let stats = Archiver::default()
            .pack_excluding(source.path(), Some(&vault), &mut buffer)
            .unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.skipped[0].path, vault);
    }

    #[test]
    fn test_unpack_refuses_non_empty_destination() {
        let source = create_source();
        let archiver = Archiver::default();
        let (bytes, _) = pack_to_vec(&archiver, source.path());

        let out = TempDir::new().unwrap();
        fs::write(out.path().join("existing.txt"), "keep me").unwrap();

        let err = archiver.unpack(bytes.as_slice(), out.path()).unwrap_err();
        assert!(matches!(err, SnapvaultError::Archive(_)));
        assert_eq!(
            fs::read_to_string(out.path().join("existing.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_malformed_archive_leaves_nothing_behind() {
        let archiver = Archiver::default();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("restored");

        let err = archiver
            .unpack(&b"definitely not a gzip stream"[..], &dest)
            .unwrap_err();
        assert!(matches!(err, SnapvaultError::Archive(_)));
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_escaping_entry_rejected() {
        // Hand-build an archive whose entry climbs out of the destination
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(4);
        header.set_mode(0o644);
        {
            let gnu = header.as_gnu_mut().unwrap();
            let name = b"../evil.txt";
            gnu.name[..name.len()].copy_from_slice(name);
        }
        header.set_cksum();

        let encoder = GzBuilder::new().write(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append(&header, &b"evil"[..]).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let out = TempDir::new().unwrap();
        let dest = out.path().join("inner").join("restored");
        let err = Archiver::default().unpack(bytes.as_slice(), &dest).unwrap_err();
        assert!(matches!(err, SnapvaultError::Archive(_)));
        assert!(!dest.exists());
        assert!(!out.path().join("inner").join("evil.txt").exists());
    }
}
