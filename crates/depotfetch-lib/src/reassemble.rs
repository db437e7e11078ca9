use crate::error::DepotFetchError;
use crate::fetch::remove_if_exists;
use crate::item::{ChunkRef, chunk_temp_path};
use crate::progress::ProgressSink;
use crate::verification::{ContentDigest, ContentDigestVerifier};
use flate2::read::ZlibDecoder;
use itertools::Itertools;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// A fetched chunk file waiting to be appended, with the digest of its
/// decompressed bytes.
#[derive(Clone, Debug)]
pub struct ChunkArtifact {
    pub path: PathBuf,
    pub expected: ContentDigest,
}

/// Decompresses the chunk files in the given order and appends each one to
/// `destination`. Order matters: the destination is append-only.
///
/// If any chunk fails, every chunk file not yet consumed and the partial
/// destination are removed before the error is returned.
///
/// Returns the number of decompressed bytes appended.
pub async fn reassemble(
    destination: &Path,
    chunks: &[ChunkArtifact],
    progress: &dyn ProgressSink,
) -> Result<u64, DepotFetchError> {
    let mut total = 0;
    for (position, chunk) in chunks.iter().enumerate() {
        match append_chunk(chunk, destination, progress).await {
            Ok(written) => total += written,
            Err(e) => {
                discard(destination, &chunks[position..]).await;
                return Err(e);
            }
        }
    }
    Ok(total)
}

async fn discard(destination: &Path, chunks: &[ChunkArtifact]) {
    for path in chunks.iter().map(|c| c.path.as_path()).chain([destination]) {
        if let Err(e) = remove_if_exists(path).await {
            warn!(
                path = %path.display(),
                "Failed to remove leftover after reassembly error: {}",
                e
            );
        }
    }
}

/// Decompresses one chunk file onto the end of `destination`. The chunk file
/// is removed once read, whether or not it decompresses and verifies.
pub async fn append_chunk(
    chunk: &ChunkArtifact,
    destination: &Path,
    progress: &dyn ProgressSink,
) -> Result<u64, DepotFetchError> {
    let chunk_file = chunk.path.as_path();
    let compressed = match tokio::fs::read(chunk_file).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DepotFetchError::MissingChunkArtifact {
                path: chunk_file.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    progress.update_bytes_read(compressed.len() as u64);

    let expected = chunk.expected.clone();
    let inflated = tokio::task::spawn_blocking(move || {
        let decompressed = inflate(&compressed)?;
        let mut verifier = ContentDigestVerifier::new(&expected);
        verifier.update(&decompressed);
        Ok::<_, std::io::Error>((decompressed, verifier.verify()))
    })
    .await?;
    remove_if_exists(chunk_file).await?;

    let (decompressed, verified) = inflated.map_err(|e| DepotFetchError::Decompression {
        path: chunk_file.to_path_buf(),
        reason: e.to_string(),
    })?;
    verified.map_err(|source| DepotFetchError::ChunkVerification {
        path: chunk_file.to_path_buf(),
        source,
    })?;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(destination)
        .await?;
    file.write_all(&decompressed).await?;
    file.flush().await?;

    let written = decompressed.len() as u64;
    progress.update_bytes_written(written);
    progress.update_decompressed_speed(written);
    tracing::trace!(
        chunk = %chunk_file.display(),
        destination = %destination.display(),
        bytes = written,
        "Appended chunk"
    );
    Ok(written)
}

fn inflate(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Chunk files for `destination`, in reassembly order.
pub fn ordered_chunk_artifacts<'a>(
    destination: &Path,
    chunks: impl IntoIterator<Item = &'a ChunkRef>,
) -> Vec<ChunkArtifact> {
    chunks
        .into_iter()
        .sorted_by_key(|chunk| chunk.index)
        .map(|chunk| ChunkArtifact {
            path: chunk_temp_path(destination, chunk.index),
            expected: chunk.decompressed_digest.clone(),
        })
        .collect()
}
