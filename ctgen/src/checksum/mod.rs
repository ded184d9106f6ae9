//! Checksum resolution and local file verification.
//!
//! - [`parse_manifest`] locates the expected digest inside a vendor manifest
//! - [`resolve`] fetches the manifest first
//! - [`hash_file`] computes a local digest with the inferred algorithm

mod hash;
mod manifest;

pub use hash::hash_file;
pub use manifest::parse_manifest;

use crate::errors::{CtgenError, CtgenResult};
use crate::fetch::Fetcher;

/// Hash function, inferred from digest length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha512,
    Sha256,
    Sha1,
    Md5,
}

impl ChecksumAlgorithm {
    /// Map a hex digest length to its algorithm.
    pub fn from_digest_len(len: usize) -> CtgenResult<Self> {
        match len {
            128 => Ok(ChecksumAlgorithm::Sha512),
            64 => Ok(ChecksumAlgorithm::Sha256),
            40 => Ok(ChecksumAlgorithm::Sha1),
            32 => Ok(ChecksumAlgorithm::Md5),
            other => Err(CtgenError::UnsupportedAlgorithm(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha512 => "sha512",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Md5 => "md5",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expected digest of one file. Computed per acquisition attempt, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord {
    /// Hex digest as published by the vendor.
    pub digest: String,
    pub algorithm: ChecksumAlgorithm,
}

impl ChecksumRecord {
    /// Compare against a locally computed lowercase hex digest.
    pub fn matches(&self, computed: &str) -> bool {
        self.digest.eq_ignore_ascii_case(computed)
    }
}

/// Fetch the manifest at `checksum_url` and look up `filename` in it.
pub async fn resolve(
    fetcher: &dyn Fetcher,
    checksum_url: &str,
    filename: &str,
) -> CtgenResult<ChecksumRecord> {
    let body = fetcher.fetch_text(checksum_url).await?;
    let record = parse_manifest(&body, filename)?;

    tracing::debug!(
        url = %checksum_url,
        file = %filename,
        algorithm = %record.algorithm,
        "Resolved expected checksum"
    );

    Ok(record)
}
