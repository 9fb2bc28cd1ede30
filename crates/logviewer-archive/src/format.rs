use std::fmt;
use std::io::{self, Read, Seek};
use std::path::Path;
use std::str::FromStr;

use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Tar(TarCompress),
}

/// Compression codec wrapped around a tar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TarCompress {
    None,
    Gzip,
}

impl ArchiveFormat {
    pub const TAR_GZ: Self = Self::Tar(TarCompress::Gzip);

    /// Guess the format from a file name's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TAR_GZ)
        } else if name.ends_with(".tar") {
            Some(Self::Tar(TarCompress::None))
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar(TarCompress::Gzip) => "tar.gz",
            Self::Tar(TarCompress::None) => "tar",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(Self::Zip),
            "tar.gz" | "tgz" | "tar-gz" | "targz" => Ok(Self::TAR_GZ),
            "tar" => Ok(Self::Tar(TarCompress::None)),
            _ => Err(Error::UnsupportedFormat),
        }
    }
}

impl TarCompress {
    pub fn decoder<R: Read>(self, reader: R) -> Decoder<R> {
        match self {
            Self::None => Decoder::Passthrough(reader),
            Self::Gzip => Decoder::Gzip(Box::new(flate2::read::GzDecoder::new(reader))),
        }
    }
}

#[derive(Debug)]
pub enum Decoder<R> {
    Passthrough(R),
    Gzip(Box<flate2::read::GzDecoder<R>>),
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Passthrough(r) => r.read(buf),
            Self::Gzip(d) => d.read(buf),
        }
    }
}

pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    match data {
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] => Some(ArchiveFormat::Zip),
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::TAR_GZ),
        _ if is_tar_header(data) => Some(ArchiveFormat::Tar(TarCompress::None)),
        _ => None,
    }
}

fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 263 && &data[257..262] == b"ustar"
}

/// Sniff the format from the first bytes of `reader`, leaving it rewound.
pub fn detect_from_reader<R: Read + Seek>(reader: &mut R) -> io::Result<Option<ArchiveFormat>> {
    let mut header = Vec::with_capacity(512);
    reader.by_ref().take(512).read_to_end(&mut header)?;
    reader.rewind()?;
    Ok(detect_format(&header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detect_zip_format() {
        let zip_header = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&zip_header), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detect_empty_zip() {
        let eocd = [0x50, 0x4B, 0x05, 0x06, 0x00, 0x00];
        assert_eq!(detect_format(&eocd), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detect_tar_gz_format() {
        assert_eq!(
            detect_format(&[0x1F, 0x8B, 0x08, 0x00]),
            Some(ArchiveFormat::TAR_GZ)
        );
    }

    #[test]
    fn detect_plain_tar() {
        let mut block = [0u8; 512];
        block[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(
            detect_format(&block),
            Some(ArchiveFormat::Tar(TarCompress::None))
        );
    }

    #[test]
    fn detect_unknown_and_short() {
        assert_eq!(detect_format(&[0xDE, 0xAD, 0xBE, 0xEF]), None);
        assert_eq!(detect_format(&[]), None);
    }

    #[test]
    fn detect_rewinds_reader() {
        let mut cursor = Cursor::new(vec![0x1F, 0x8B, 0x08]);
        let format = detect_from_reader(&mut cursor).unwrap();
        assert_eq!(format, Some(ArchiveFormat::TAR_GZ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn format_from_file_name() {
        assert_eq!(
            ArchiveFormat::from_path("elasticsearch-7.17.20-windows-x86_64.zip"),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::from_path("/tmp/kibana-7.17.20-linux-x86_64.TAR.GZ"),
            Some(ArchiveFormat::TAR_GZ)
        );
        assert_eq!(ArchiveFormat::from_path("jdk.tgz"), Some(ArchiveFormat::TAR_GZ));
        assert_eq!(ArchiveFormat::from_path("jdk-17_windows-x64_bin.msi"), None);
    }

    #[test]
    fn format_parse_and_display() {
        assert_eq!("zip".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("tar-gz".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::TAR_GZ);
        assert!(matches!(
            "rar".parse::<ArchiveFormat>(),
            Err(Error::UnsupportedFormat)
        ));
        assert_eq!(ArchiveFormat::TAR_GZ.to_string(), "tar.gz");
    }

    #[test]
    fn passthrough_decoder_reads_through() {
        let mut decoder = TarCompress::None.decoder(Cursor::new(b"hello".to_vec()));
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
    }
}
