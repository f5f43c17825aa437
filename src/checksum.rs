//! SHA-512/256 digests for checking a downloaded file against the served
//! payload.

use std::path::Path;

use sha2::{Digest, Sha512_256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Lowercase hex SHA-512/256 of `bytes`.
pub fn sha512_256(bytes: &[u8]) -> String {
    hex::encode(Sha512_256::digest(bytes))
}

/// Lowercase hex SHA-512/256 of the file at `path`.
pub async fn sha512_256_file<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha512_256::new();
    let mut buffer = [0u8; 1024 * 64];

    loop {
        let count = file.read(&mut buffer).await?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// One output line per file: `<digest> <file>`, or the read error in place
/// of the digest.
pub async fn checksum_line<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    let digest = match sha512_256_file(path).await {
        Ok(digest) => digest,
        Err(e) => e.to_string(),
    };

    format!("{} {}", digest, path.display())
}
