//! Plain HTTP GET for checksum manifests and disk images.
//!
//! No authentication, no retry, no resume. A failed download may leave a
//! truncated file behind; the next acquisition detects it by checksum.

mod progress;

pub use progress::{ProgressThrottle, format_progress};

use crate::constants::timing;
use crate::errors::{CtgenError, CtgenResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// Progress callback: `(bytes_done, bytes_total)`; total is `None` when
/// the server sends no length.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Source of remote content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body as text.
    async fn fetch_text(&self, url: &str) -> CtgenResult<String>;

    /// Stream `url` into a new file at `path`, returning the bytes written.
    async fn download(&self, path: &Path, url: &str, on_progress: ProgressFn<'_>)
    -> CtgenResult<u64>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> CtgenResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CtgenError::Network(format!("HTTP request failed: {}", e)))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(CtgenError::Network(format!(
                "bad status: {}",
                response.status()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> CtgenResult<String> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| CtgenError::Network(format!("response body read failed: {}", e)))
    }

    async fn download(
        &self,
        path: &Path,
        url: &str,
        on_progress: ProgressFn<'_>,
    ) -> CtgenResult<u64> {
        tracing::info!(url = %url, dest = %path.display(), "Downloading");

        let response = self.get(url).await?;
        let total = response.content_length();

        let mut file = tokio::fs::File::create(path).await.map_err(|e| {
            CtgenError::Storage(format!("create file failed {}: {}", path.display(), e))
        })?;

        let mut throttle = ProgressThrottle::new(timing::PROGRESS_INTERVAL);
        let mut done: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| CtgenError::Network(format!("response body read failed: {}", e)))?;
            file.write_all(&chunk).await.map_err(|e| {
                CtgenError::Storage(format!("write failed {}: {}", path.display(), e))
            })?;
            done += chunk.len() as u64;

            if throttle.should_report(Instant::now()) {
                on_progress(done, total);
            }
        }

        file.flush()
            .await
            .map_err(|e| CtgenError::Storage(format!("flush failed {}: {}", path.display(), e)))?;
        on_progress(done, total);

        if let Some(expected) = total
            && expected != done
        {
            return Err(CtgenError::Network(format!(
                "incomplete download: received {} of {} bytes",
                done, expected
            )));
        }

        tracing::info!(dest = %path.display(), bytes = done, "Download complete");
        Ok(done)
    }
}
