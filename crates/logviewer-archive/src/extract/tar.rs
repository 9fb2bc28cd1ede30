use std::io::Read;
use std::path::PathBuf;

use ::tar::EntryType;

use crate::Result;
use crate::entry::EntryKind;
use crate::error::Error;
use crate::extract::{EntrySource, PendingEntry};
use crate::format::{ArchiveFormat, Decoder, TarCompress};

pub struct TarSource<R: Read> {
    archive: ::tar::Archive<Decoder<R>>,
    codec: TarCompress,
}

impl<R: Read> TarSource<R> {
    pub fn new(reader: R, codec: TarCompress) -> Self {
        Self {
            archive: ::tar::Archive::new(codec.decoder(reader)),
            codec,
        }
    }
}

impl<R: Read> EntrySource for TarSource<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar(self.codec)
    }

    fn visit(&mut self, visitor: &mut dyn FnMut(PendingEntry<'_>) -> Result<()>) -> Result<()> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| Error::malformed(None, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| Error::malformed(None, e))?;
            let original_path = entry
                .path()
                .map_err(|e| Error::malformed(None, e))?
                .into_owned();

            let header = entry.header();
            let mode = header.mode().ok();
            let size = entry.size();

            let kind = match header.entry_type() {
                EntryType::Directory => Some(EntryKind::Directory),
                EntryType::Regular | EntryType::Continuous => Some(EntryKind::File),
                EntryType::Symlink => {
                    let target = entry
                        .link_name()
                        .map_err(|e| Error::malformed(Some(original_path.clone()), e))?
                        .ok_or_else(|| {
                            Error::malformed(Some(original_path.clone()), "symlink without a target")
                        })?
                        .into_owned();
                    Some(EntryKind::Symlink { target })
                }
                _ => None,
            };

            let reader: Option<&mut dyn Read> = match kind {
                Some(EntryKind::File) => Some(&mut entry),
                _ => None,
            };
            visitor(PendingEntry {
                original_path,
                size,
                mode,
                kind,
                reader,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn plain_tar() -> Vec<u8> {
        let mut builder = ::tar::Builder::new(Vec::new());
        let mut header = ::tar::Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o640);
        header.set_entry_type(EntryType::Regular);
        builder.append_data(&mut header, "notes.txt", &b"hello"[..]).unwrap();

        let mut fifo = ::tar::Header::new_gnu();
        fifo.set_size(0);
        fifo.set_entry_type(EntryType::Fifo);
        builder.append_data(&mut fifo, "pipe", &b""[..]).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn visits_entries_in_order() {
        let mut source = TarSource::new(Cursor::new(plain_tar()), TarCompress::None);
        assert_eq!(source.format(), ArchiveFormat::Tar(TarCompress::None));

        let mut seen = Vec::new();
        source
            .visit(&mut |pending| {
                let mut body = String::new();
                if let Some(reader) = pending.reader {
                    reader.read_to_string(&mut body).unwrap();
                }
                seen.push((pending.original_path, pending.kind, pending.mode, body));
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, PathBuf::from("notes.txt"));
        assert_eq!(seen[0].1, Some(EntryKind::File));
        assert_eq!(seen[0].2, Some(0o640));
        assert_eq!(seen[0].3, "hello");
        assert_eq!(seen[1].1, None);
    }

    #[test]
    fn garbage_is_malformed() {
        let mut data = vec![0x1f, 0x8b];
        data.extend_from_slice(&[0xAB; 64]);
        let mut source = TarSource::new(Cursor::new(data), TarCompress::Gzip);
        let result = source.visit(&mut |_| Ok(()));
        assert!(matches!(result, Err(Error::MalformedArchive { .. })));
    }
}
