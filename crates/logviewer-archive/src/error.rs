use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read archive source: {0}")]
    UnreadableSource(#[source] io::Error),

    #[error("unsupported archive format")]
    UnsupportedFormat,

    #[error("malformed archive: {reason}")]
    MalformedArchive {
        entry: Option<PathBuf>,
        reason: String,
    },

    #[error("path traversal: entry '{entry}' resolves to '{resolved}' outside the destination")]
    PathTraversal { entry: PathBuf, resolved: PathBuf },

    #[error("symlink '{link}' points at '{target}' which escapes the destination")]
    SymlinkEscape { link: PathBuf, target: PathBuf },

    #[error("failed to write '{path}': {source}")]
    FilesystemWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn malformed(entry: Option<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedArchive {
            entry,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::FilesystemWrite { path, source }
    }

    /// The archive entry the failure is attributed to, when there is one.
    pub fn entry(&self) -> Option<&std::path::Path> {
        match self {
            Self::MalformedArchive { entry, .. } => entry.as_deref(),
            Self::PathTraversal { entry, .. } => Some(entry),
            Self::SymlinkEscape { link, .. } => Some(link),
            Self::FilesystemWrite { path, .. } => Some(path),
            Self::UnreadableSource(_) | Self::UnsupportedFormat => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
