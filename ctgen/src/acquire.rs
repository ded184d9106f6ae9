//! Acquisition stage: make sure a verified copy of an image is cached.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checksum::{self, hash_file};
use crate::config::ImageSpec;
use crate::errors::{CtgenError, CtgenResult};
use crate::fetch::Fetcher;
use crate::sink::Reporter;

/// Reuses or (re)downloads `<iso_dir>/<image name>`.
pub struct Acquirer {
    fetcher: Arc<dyn Fetcher>,
    iso_dir: PathBuf,
}

impl Acquirer {
    pub fn new(fetcher: Arc<dyn Fetcher>, iso_dir: PathBuf) -> Self {
        Self { fetcher, iso_dir }
    }

    /// Return the path of a usable local copy of `image`.
    ///
    /// Checksum problems are absorbed: the cached file is deleted and
    /// downloaded again. Only a failed download is an error.
    pub async fn acquire(&self, image: &ImageSpec, reporter: &Reporter) -> CtgenResult<PathBuf> {
        let path = self.iso_dir.join(&image.name);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            if !image.has_checksum() {
                reporter
                    .output("☑️ File exists, no checksum URL provided. Skipping check and download.");
                return Ok(path);
            }

            if self.verify_cached(image, &path, reporter).await {
                return Ok(path);
            }
            discard(&path).await;
        }

        self.download(image, &path, reporter).await?;
        Ok(path)
    }

    /// True when the cached file matches the vendor digest.
    async fn verify_cached(&self, image: &ImageSpec, path: &Path, reporter: &Reporter) -> bool {
        reporter.output("🔎 Verifying checksum...");

        let expected =
            match checksum::resolve(self.fetcher.as_ref(), &image.checksum_url, image.url_filename())
                .await
            {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(image = %image.name, "Could not get checksum: {}", e);
                    reporter.output(format!("⚠️ Could not get checksum: {}. Re-downloading...", e));
                    return false;
                }
            };

        let local = match hash_file(path, expected.algorithm).await {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(image = %image.name, "Could not calculate local checksum: {}", e);
                reporter.output(format!(
                    "⚠️ Could not calculate local checksum: {}. Re-downloading...",
                    e
                ));
                return false;
            }
        };

        if expected.matches(&local) {
            reporter.output(format!(
                "✅ Checksum match ({}). Skipping download.",
                expected.algorithm
            ));
            true
        } else {
            tracing::warn!(
                image = %image.name,
                expected = %expected.digest,
                actual = %local,
                "Checksum mismatch"
            );
            reporter.output(format!(
                "❌ Checksum mismatch ({}). Re-downloading...",
                expected.algorithm
            ));
            false
        }
    }

    async fn download(&self, image: &ImageSpec, path: &Path, reporter: &Reporter) -> CtgenResult<()> {
        let progress = |done: u64, total: Option<u64>| reporter.progress(done, total);

        self.fetcher
            .download(path, &image.url, &progress)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                CtgenError::Network(msg) => CtgenError::Network(format!("download failed: {}", msg)),
                CtgenError::Storage(msg) => CtgenError::Storage(format!("download failed: {}", msg)),
                other => other,
            })
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(file = %path.display(), "Failed to remove cached file: {}", e);
    }
}
