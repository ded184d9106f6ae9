//! Streaming file digests.

use super::ChecksumAlgorithm;
use crate::errors::{CtgenError, CtgenResult};
use sha2::Digest;
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Hash the whole file at `path`, returning a lowercase hex digest.
///
/// The file is read in fixed-size chunks, so multi-gigabyte images never
/// need to fit in memory.
pub async fn hash_file(path: &Path, algorithm: ChecksumAlgorithm) -> CtgenResult<String> {
    match algorithm {
        ChecksumAlgorithm::Sha512 => digest_file::<sha2::Sha512>(path).await,
        ChecksumAlgorithm::Sha256 => digest_file::<sha2::Sha256>(path).await,
        ChecksumAlgorithm::Sha1 => digest_file::<sha1::Sha1>(path).await,
        ChecksumAlgorithm::Md5 => digest_file::<md5::Md5>(path).await,
    }
}

async fn digest_file<D: Digest + Send>(path: &Path) -> CtgenResult<String> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        CtgenError::Storage(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut hasher = D::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer).await.map_err(|e| {
            CtgenError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
