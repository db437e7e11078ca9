use super::content_digest_hasher::{ContentDigest, ContentDigestVerifier};
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncReadExt;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Streams `path` through a hasher for `expected` and reports whether the
/// digests agree. A missing file never matches. `on_read` receives the size of
/// every buffer consumed so hashing passes can be accounted as bytes read.
pub async fn file_matches(
    path: &Path,
    expected: &ContentDigest,
    on_read: impl Fn(u64),
) -> std::io::Result<bool> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut reader = tokio::io::BufReader::new(file);
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut verifier = ContentDigestVerifier::new(expected);

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        verifier.update(&buffer[..bytes_read]);
        on_read(bytes_read as u64);
    }

    Ok(verifier.verify().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::ChecksumKind;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_file_matches_reports_bytes_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let digest =
            ContentDigest::from_hex_digest(ChecksumKind::Md5, "5d41402abc4b2a76b9719d911017c592")
                .unwrap();
        let read = AtomicU64::new(0);
        let matches = file_matches(&path, &digest, |n| {
            read.fetch_add(n, Ordering::Relaxed);
        })
        .await
        .unwrap();

        assert!(matches);
        assert_eq!(read.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_missing_file_does_not_match() {
        let dir = tempfile::tempdir().unwrap();
        let digest = ContentDigest::Md5(vec![0; 16]);
        let matches = file_matches(&dir.path().join("absent"), &digest, |_| {})
            .await
            .unwrap();
        assert!(!matches);
    }
}
