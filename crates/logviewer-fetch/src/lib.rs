//! Artifact acquisition: local paths or HTTP downloads with SHA-256 checks.

pub use acquire::{Acquired, acquire};
pub use error::{Error, Result};
pub use fetcher::{FetchOptions, FetchPhase, Fetcher, Progress, ProgressCallback};
pub use http::{HttpClient, ReqwestClient};
pub use progress::progress_bar;
pub use retry::{capped_delay, retry_delay};
pub use source::{Sha256Digest, Source};

mod acquire;
mod error;
pub mod fetcher;
pub mod http;
mod progress;
pub mod retry;
mod source;
