//! Streaming content hashing
//!
//! Files are read in fixed-size blocks and fed into an incremental SHA-256,
//! so memory use is constant regardless of artifact size. The block size does
//! not affect the digest.

use crate::types::ContentHash;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Block size used when streaming a file into the hasher
pub const BLOCK_SIZE: usize = 8 * 1024;

/// Compute the SHA-256 digest of a file
///
/// Fails only if the file cannot be opened or read.
pub fn digest(path: &Path) -> std::io::Result<ContentHash> {
    digest_with_block_size(path, BLOCK_SIZE)
}

/// Compute the SHA-256 digest of a file using a specific block size
pub fn digest_with_block_size(path: &Path, block_size: usize) -> std::io::Result<ContentHash> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; block_size.max(1)];

    loop {
        let read = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..read]);
    }

    Ok(ContentHash::from_hex(format!("{:x}", hasher.finalize())))
}

/// Compute a file digest on the blocking thread pool
pub async fn digest_async(path: PathBuf) -> std::io::Result<ContentHash> {
    tokio::task::spawn_blocking(move || digest(&path))
        .await
        .map_err(std::io::Error::other)?
}
