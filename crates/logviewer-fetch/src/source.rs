use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{Error, Result};

/// Where an artifact comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Remote(Url),
}

impl Source {
    /// Parse a location. Relative paths are resolved against `base_dir`;
    /// `http(s)://` becomes a download and `file://` a local path.
    pub fn parse(location: &str, base_dir: &Path) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::InvalidSource(location.to_string()));
        }
        if !location.contains("://") {
            return Ok(Self::Local(base_dir.join(location)));
        }

        let url = Url::parse(location).map_err(|_| Error::InvalidSource(location.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(url)),
            "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| Error::InvalidSource(location.to_string())),
            _ => Err(Error::InvalidSource(location.to_string())),
        }
    }

    /// File name the artifact is stored under locally.
    pub fn file_name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "artifact".into()),
            Self::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .unwrap_or("download")
                .to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// A SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    pub fn of_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }

    pub fn of_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|_| Error::SourceNotFound(path.to_path_buf()))?;
        Self::of_reader(io::BufReader::new(file)).map_err(Error::io(path))
    }

    pub fn verify(&self, actual: &Sha256Digest) -> Result<()> {
        if self == actual {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({self})")
    }
}

impl FromStr for Sha256Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("sha256:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| Error::InvalidChecksum(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidChecksum(s.to_string()))?;
        Ok(Self(bytes))
    }
}
