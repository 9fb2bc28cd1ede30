use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("unknown shell: {0}")]
    UnknownShell(String),

    #[error("cannot locate the user home directory")]
    HomeNotFound,

    #[error("command failed: {cmd}, source: {source}")]
    CommandFailed {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build PATH: {0}")]
    InvalidPath(#[from] std::env::JoinPathsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
