use std::path::{Path, PathBuf};

use crate::format::ArchiveFormat;

/// One archive member as it was written to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub original_path: PathBuf,
    pub target_path: Option<PathBuf>,
    pub size: u64,
    pub mode: Option<u32>,
    pub kind: EntryKind,
}

impl Entry {
    pub fn new(original_path: PathBuf, size: u64, mode: Option<u32>, kind: EntryKind) -> Self {
        Self {
            original_path,
            target_path: None,
            size,
            mode,
            kind,
        }
    }

    pub fn with_target_path(mut self, target_path: PathBuf) -> Self {
        self.target_path = Some(target_path);
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, EntryKind::Symlink { .. })
    }

    pub fn symlink_target(&self) -> Option<&Path> {
        match &self.kind {
            EntryKind::Symlink { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.mode.is_some_and(|m| m & 0o111 != 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink { target: PathBuf },
}

/// Why an entry was not written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Matched one of [`ExtractOptions::skip_prefixes`](crate::ExtractOptions).
    ReservedPrefix,
    /// Hard links, devices, fifos and metadata records.
    UnsupportedKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Clone, Debug)]
pub struct ArchiveReport {
    pub format: ArchiveFormat,
    pub destination: PathBuf,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<Entry>,
    pub skipped: Vec<SkippedEntry>,
}

impl ArchiveReport {
    /// Top-level names created under the destination, in archive order.
    pub fn top_level_names(&self) -> Vec<PathBuf> {
        let mut names: Vec<PathBuf> = Vec::new();
        for entry in &self.entries {
            let Some(first) = entry.original_path.components().find_map(|c| match c {
                std::path::Component::Normal(part) => Some(PathBuf::from(part)),
                _ => None,
            }) else {
                continue;
            };
            if !names.contains(&first) {
                names.push(first);
            }
        }
        names
    }
}
