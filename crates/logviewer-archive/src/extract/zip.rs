use std::io::{Read, Seek};
use std::path::PathBuf;

use crate::Result;
use crate::entry::EntryKind;
use crate::error::Error;
use crate::extract::{EntrySource, PendingEntry};
use crate::format::ArchiveFormat;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub struct ZipSource<R: Read + Seek> {
    archive: ::zip::ZipArchive<R>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ::zip::ZipArchive::new(reader).map_err(|e| Error::malformed(None, e))?;
        Ok(Self { archive })
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn visit(&mut self, visitor: &mut dyn FnMut(PendingEntry<'_>) -> Result<()>) -> Result<()> {
        for index in 0..self.archive.len() {
            let mut file = self
                .archive
                .by_index(index)
                .map_err(|e| Error::malformed(None, format!("entry #{index}: {e}")))?;

            // Raw name on purpose: containment is checked by the extractor,
            // which must see `..` to report it. Backslashes come from
            // archivers that ignore the zip spec.
            let original_path = PathBuf::from(file.name().replace('\\', "/"));
            let size = file.size();
            let mode = file.unix_mode();

            let kind = if file.is_dir() {
                EntryKind::Directory
            } else if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
                let mut target = String::new();
                file.read_to_string(&mut target)
                    .map_err(|e| Error::malformed(Some(original_path.clone()), e))?;
                EntryKind::Symlink {
                    target: PathBuf::from(target),
                }
            } else {
                EntryKind::File
            };

            let reader: Option<&mut dyn Read> = match kind {
                EntryKind::File => Some(&mut file),
                _ => None,
            };
            visitor(PendingEntry {
                original_path,
                size,
                mode,
                kind: Some(kind),
                reader,
            })?;
        }
        Ok(())
    }
}
