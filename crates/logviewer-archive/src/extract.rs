//! Streaming extraction for zip and tar archives.
//!
//! Entries are written strictly in archive order. Parents are created on
//! demand, so archives that list a file before its directory still unpack.
//! Nothing is rolled back on failure: a destination that saw an error should
//! be treated as contaminated by the caller.
//!
//! # Platform Behavior
//!
//! **Unix**: mode bits are applied according to [`PermissionStrategy`](crate::options::PermissionStrategy)
//! and symlinks are created as-is once their target is proven to stay inside
//! the destination.
//!
//! **Windows**: permission handling is a no-op. Symlinks become file or
//! directory links depending on what the target resolves to.

use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::entry::{ArchiveReport, Entry, EntryKind, SkipReason, SkippedEntry};
use crate::error::{Error, Result};
use crate::format::{self, ArchiveFormat};
use crate::options::{ExtractOptions, Progress};
use crate::sanitize::{ensure_contained, physical_path, sanitize_entry_path, sanitize_symlink_target};

mod tar;
mod zip;

pub use tar::TarSource;
pub use zip::ZipSource;

/// An entry read from an archive but not yet written.
pub struct PendingEntry<'a> {
    pub original_path: PathBuf,
    pub size: u64,
    pub mode: Option<u32>,
    /// `None` for member kinds that are never extracted.
    pub kind: Option<EntryKind>,
    pub reader: Option<&'a mut dyn Read>,
}

/// Format-specific walker over archive members.
pub trait EntrySource {
    fn format(&self) -> ArchiveFormat;

    /// Feed every member to `visitor` in archive order, stopping at the first error.
    fn visit(&mut self, visitor: &mut dyn FnMut(PendingEntry<'_>) -> Result<()>) -> Result<()>;
}

/// Extract `reader`, which holds an archive of `format`, into `destination`.
pub fn extract<R: Read + Seek>(
    reader: R,
    format: ArchiveFormat,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    match format {
        ArchiveFormat::Zip => {
            let mut source = ZipSource::new(reader)?;
            extract_with_source(&mut source, destination.as_ref(), options)
        }
        ArchiveFormat::Tar(codec) => {
            let mut source = TarSource::new(reader, codec);
            extract_with_source(&mut source, destination.as_ref(), options)
        }
    }
}

/// Extract the archive at `path`. Without an explicit format the magic bytes
/// decide, falling back to the file extension.
pub fn extract_file(
    path: impl AsRef<Path>,
    format: Option<ArchiveFormat>,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(Error::UnreadableSource)?;
    let format = match format {
        Some(format) => format,
        None => format::detect_from_reader(&mut file)
            .map_err(Error::UnreadableSource)?
            .or_else(|| ArchiveFormat::from_path(path))
            .ok_or(Error::UnsupportedFormat)?,
    };
    info!(archive = %path.display(), %format, destination = %destination.as_ref().display(), "extracting");
    extract(io::BufReader::new(file), format, destination, options)
}

/// Extract with automatic format detection.
pub fn extract_from_reader<R: Read + Seek>(
    mut reader: R,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let format = format::detect_from_reader(&mut reader)
        .map_err(Error::UnreadableSource)?
        .ok_or(Error::UnsupportedFormat)?;
    extract(reader, format, destination, options)
}

/// Extract using an explicit source.
pub fn extract_with_source<S: EntrySource>(
    source: &mut S,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    fs::create_dir_all(destination).map_err(Error::write(destination))?;
    let root = destination.canonicalize().map_err(Error::write(destination))?;

    let mut writer = Writer {
        root,
        options,
        entries: Vec::new(),
        skipped: Vec::new(),
        total_bytes: 0,
    };
    source.visit(&mut |pending| writer.write(pending))?;

    debug!(
        entries = writer.entries.len(),
        skipped = writer.skipped.len(),
        bytes = writer.total_bytes,
        "extraction finished"
    );
    Ok(ArchiveReport {
        format: source.format(),
        destination: writer.root,
        entry_count: writer.entries.len(),
        total_bytes: writer.total_bytes,
        entries: writer.entries,
        skipped: writer.skipped,
    })
}

struct Writer<'o> {
    root: PathBuf,
    options: &'o ExtractOptions,
    entries: Vec<Entry>,
    skipped: Vec<SkippedEntry>,
    total_bytes: u64,
}

impl Writer<'_> {
    fn write(&mut self, pending: PendingEntry<'_>) -> Result<()> {
        let raw = pending.original_path;
        if self.options.is_skipped(&raw.to_string_lossy()) {
            debug!(entry = %raw.display(), "skipping reserved entry");
            return self.skip(raw, SkipReason::ReservedPrefix);
        }
        let Some(kind) = pending.kind else {
            debug!(entry = %raw.display(), "skipping unsupported entry kind");
            return self.skip(raw, SkipReason::UnsupportedKind);
        };

        let sanitized = sanitize_entry_path(&raw, &self.root)?;
        if sanitized.relative.as_os_str().is_empty() {
            return match kind {
                EntryKind::Directory => Ok(()),
                _ => Err(Error::malformed(Some(raw), "entry has an empty name")),
            };
        }
        let target = sanitized.resolved;
        ensure_contained(&target, &self.root, &raw)?;

        match &kind {
            EntryKind::Directory => {
                ensure_directory(&target)?;
                self.options
                    .perm_strategy
                    .apply_to_path(&target, pending.mode, true)?;
            }
            EntryKind::File => {
                create_parent(&target)?;
                write_file(pending.reader, &target, &raw)?;
                self.options
                    .perm_strategy
                    .apply_to_path(&target, pending.mode, false)?;
            }
            EntryKind::Symlink { target: link_target } => {
                // Parents may already be links written by earlier entries.
                let link = physical_path(&target)?;
                let resolved_target = sanitize_symlink_target(link_target, &link, &self.root)?;
                create_parent(&target)?;
                write_symlink(link_target, &resolved_target, &target)?;
            }
        }
        debug!(entry = %raw.display(), "extracted");

        self.total_bytes += pending.size;
        let current_file = raw.clone();
        self.entries
            .push(Entry::new(raw, pending.size, pending.mode, kind).with_target_path(target));

        let entries_processed = self.entries.len();
        let bytes_processed = self.total_bytes;
        self.options.report(|| Progress {
            entries_processed,
            bytes_processed,
            current_file,
        });
        Ok(())
    }

    fn skip(&mut self, path: PathBuf, reason: SkipReason) -> Result<()> {
        self.skipped.push(SkippedEntry { path, reason });
        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.is_dir() => {
            fs::create_dir_all(parent).map_err(Error::write(parent))
        }
        _ => Ok(()),
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.is_dir() {
            return Ok(());
        }
        // A stale link or file from an earlier run is in the way.
        fs::remove_file(path).map_err(Error::write(path))?;
    }
    fs::create_dir_all(path).map_err(Error::write(path))
}

/// Remove a non-directory left at `path` so it is replaced, never followed.
fn clear_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Err(Error::FilesystemWrite {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "a directory is in the way"),
        }),
        Ok(_) => fs::remove_file(path).map_err(Error::write(path)),
        Err(_) => Ok(()),
    }
}

fn write_file(reader: Option<&mut dyn Read>, path: &Path, entry: &Path) -> Result<()> {
    clear_path(path)?;
    let mut file = File::create(path).map_err(Error::write(path))?;
    let Some(reader) = reader else {
        return Ok(());
    };

    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::malformed(Some(entry.to_path_buf()), e)),
        };
        file.write_all(&buffer[..n]).map_err(Error::write(path))?;
    }
    file.flush().map_err(Error::write(path))
}

#[cfg(unix)]
fn write_symlink(target: &Path, _resolved_target: &Path, link: &Path) -> Result<()> {
    clear_path(link)?;
    std::os::unix::fs::symlink(target, link).map_err(Error::write(link))
}

#[cfg(windows)]
fn write_symlink(target: &Path, resolved_target: &Path, link: &Path) -> Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};
    clear_path(link)?;
    let is_dir_target = resolved_target.is_dir() || target.to_string_lossy().ends_with('/');
    if is_dir_target {
        symlink_dir(target, link).map_err(Error::write(link))
    } else {
        symlink_file(target, link).map_err(Error::write(link))
    }
}
