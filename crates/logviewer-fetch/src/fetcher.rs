use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::retry::retry_delay;
use crate::source::Sha256Digest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Connecting,
    Downloading,
    Verifying,
    Committing,
    Completed,
}

#[derive(Debug, Clone)]
pub struct Progress {
    pub phase: FetchPhase,
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    pub retry_count: u32,
}

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

#[derive(Clone)]
pub struct FetchOptions {
    pub checksum: Option<Sha256Digest>,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            checksum: None,
            max_retries: 3,
            retry_base: Duration::from_millis(500),
            on_progress: None,
        }
    }
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("checksum", &self.checksum)
            .field("max_retries", &self.max_retries)
            .field("retry_base", &self.retry_base)
            .finish_non_exhaustive()
    }
}

impl FetchOptions {
    pub fn checksum(mut self, checksum: Option<Sha256Digest>) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Downloads a URL to a file, verifying it before it appears at the destination.
pub struct Fetcher<C: HttpClient> {
    client: C,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Fetch `url` into `destination`, retrying transient failures.
    ///
    /// Bytes land in `<destination>.part` first and are renamed only after the
    /// optional checksum matches.
    pub async fn fetch(&self, url: &str, destination: &Path, options: &FetchOptions) -> Result<PathBuf> {
        let mut retry_count = 0;
        loop {
            match self.fetch_once(url, destination, options, retry_count).await {
                Ok(path) => return Ok(path),
                Err(e) if e.is_retryable() && retry_count < options.max_retries => {
                    let delay = retry_delay(retry_count, options.retry_base);
                    warn!(%url, error = %e, ?delay, "download failed, retrying");
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) if e.is_retryable() && options.max_retries > 0 => {
                    return Err(Error::MaxRetriesExceeded {
                        count: retry_count + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
        retry_count: u32,
    ) -> Result<PathBuf> {
        let report = |phase, bytes_downloaded, total_bytes| {
            if let Some(callback) = &options.on_progress {
                callback(&Progress {
                    phase,
                    bytes_downloaded,
                    total_bytes,
                    retry_count,
                });
            }
        };
        let network = |e: C::Error| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        report(FetchPhase::Connecting, 0, None);
        let total_bytes = match self.client.head(url).await {
            Ok(len) => len,
            Err(e) => {
                debug!(%url, error = %e, "HEAD failed, size unknown");
                None
            }
        };
        let mut stream = self.client.stream(url).await.map_err(network)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::io(parent))?;
        }
        let partial = part_path(destination);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(Error::io(&partial))?;
        let mut hasher = Sha256::new();
        let mut bytes_downloaded = 0u64;

        report(FetchPhase::Downloading, 0, total_bytes);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network)?;
            hasher.update(&chunk);
            file.write_all(&chunk).await.map_err(Error::io(&partial))?;
            bytes_downloaded += chunk.len() as u64;
            report(FetchPhase::Downloading, bytes_downloaded, total_bytes);
        }
        file.flush().await.map_err(Error::io(&partial))?;
        drop(file);

        report(FetchPhase::Verifying, bytes_downloaded, total_bytes);
        if let Some(expected) = &options.checksum {
            let actual = Sha256Digest(hasher.finalize().into());
            if let Err(e) = expected.verify(&actual) {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        }

        report(FetchPhase::Committing, bytes_downloaded, total_bytes);
        tokio::fs::rename(&partial, destination)
            .await
            .map_err(Error::io(destination))?;

        report(FetchPhase::Completed, bytes_downloaded, total_bytes);
        debug!(%url, destination = %destination.display(), bytes = bytes_downloaded, "download complete");
        Ok(destination.to_path_buf())
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
