use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::fetcher::{FetchOptions, Fetcher};
use crate::http::ReqwestClient;
use crate::source::{Sha256Digest, Source};

/// An artifact available on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub path: PathBuf,
    /// True when the file was downloaded into the staging directory.
    pub downloaded: bool,
}

/// Make `source` available locally, blocking until done.
///
/// Local sources are used in place. Remote sources are downloaded into
/// `staging_dir` on a private single-threaded runtime.
pub fn acquire(source: &Source, staging_dir: &Path, options: &FetchOptions) -> Result<Acquired> {
    match source {
        Source::Local(path) => {
            if !path.is_file() {
                return Err(Error::SourceNotFound(path.clone()));
            }
            if let Some(expected) = &options.checksum {
                expected.verify(&Sha256Digest::of_file(path)?)?;
            }
            Ok(Acquired {
                path: path.clone(),
                downloaded: false,
            })
        }
        Source::Remote(url) => {
            let destination = staging_dir.join(source.file_name());
            info!(%url, destination = %destination.display(), "downloading");
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(Error::Runtime)?;
            let fetcher = Fetcher::new(ReqwestClient::new());
            let path = runtime.block_on(fetcher.fetch(url.as_str(), &destination, options))?;
            Ok(Acquired {
                path,
                downloaded: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_source_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("kibana.tar.gz");
        std::fs::write(&artifact, b"bytes").unwrap();

        let acquired = acquire(
            &Source::Local(artifact.clone()),
            &dir.path().join("staging"),
            &FetchOptions::default(),
        )
        .unwrap();

        assert_eq!(acquired.path, artifact);
        assert!(!acquired.downloaded);
        assert!(!dir.path().join("staging").exists());
    }

    #[test]
    fn missing_local_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = acquire(
            &Source::Local(dir.path().join("absent.zip")),
            dir.path(),
            &FetchOptions::default(),
        );
        assert!(matches!(result, Err(Error::SourceNotFound(_))));
    }

    #[test]
    fn local_checksum_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("es.zip");
        std::fs::write(&artifact, b"hello world").unwrap();
        let options = FetchOptions::default().checksum(Some(Sha256Digest([7u8; 32])));

        let result = acquire(&Source::Local(artifact), dir.path(), &options);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn unreachable_remote_fails_with_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::parse("http://127.0.0.1:9/es.tar.gz", dir.path()).unwrap();
        let options = FetchOptions::default().max_retries(0);

        let result = acquire(&source, dir.path(), &options);
        assert!(matches!(result, Err(Error::Network { .. })));
    }
}
