use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

pub type BodyStream<E> = BoxStream<'static, std::result::Result<Bytes, E>>;

/// Asynchronous HTTP client abstraction.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + 'static;

    /// Open a streaming GET. Non-success statuses are errors.
    fn stream(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<BodyStream<Self::Error>, Self::Error>> + Send;

    /// Content-Length from a HEAD request, when the server reports one.
    fn head(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<Option<u64>, Self::Error>> + Send;
}

/// Production HTTP client implementation using reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpClient for ReqwestClient {
    type Error = reqwest::Error;

    async fn stream(&self, url: &str) -> std::result::Result<BodyStream<Self::Error>, Self::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map(Bytes::from))))
    }

    async fn head(&self, url: &str) -> std::result::Result<Option<u64>, Self::Error> {
        let response = self.client.head(url).send().await?;
        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        Ok(content_length)
    }
}
