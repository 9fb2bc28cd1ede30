//! Archive extraction with path containment.
//!
//! # Architecture
//!
//! - `format.rs` - Format detection and tar decoders
//! - `sanitize.rs` - Entry and symlink containment checks
//! - `extract/` - Streaming writer plus per-format entry sources
//! - `entry.rs` - Entries and the extraction report
//! - `options.rs` - Permission strategy, skipped prefixes, progress

pub use entry::{ArchiveReport, Entry, EntryKind, SkipReason, SkippedEntry};
pub use error::{Error, Result};
pub use extract::{extract, extract_file, extract_from_reader, extract_with_source};
pub use format::{ArchiveFormat, TarCompress, detect_format};
pub use options::{ExtractOptions, MACOS_METADATA_PREFIX, PermissionStrategy, Progress};
pub use sanitize::{SanitizedPath, sanitize_entry_path, sanitize_symlink_target};

pub mod entry;
mod error;
pub mod extract;
pub mod format;
pub mod options;
mod sanitize;
