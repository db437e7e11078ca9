use super::types::VerifySummary;
use crate::error::DepotFetchError;
use crate::item::{Classified, ItemDescriptor, ItemPaths};
use crate::progress::ProgressSink;
use crate::verification::{ContentDigest, file_matches};
use futures::stream::StreamExt;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemState {
    Valid,
    Missing,
    Mismatched,
    Unverifiable,
}

/// Checks items on disk against their descriptors without touching the network.
pub async fn verify_all(
    items: &[ItemDescriptor],
    install_path: &Path,
    game_id: &str,
    progress: &dyn ProgressSink,
    checking_parallelism: usize,
) -> Result<VerifySummary, DepotFetchError> {
    let mut checks = futures::stream::iter(items.iter().map(|item| async move {
        let state = verify_item(item, install_path, game_id, progress).await?;
        Ok::<_, DepotFetchError>((item.path(), state))
    }))
    .buffer_unordered(checking_parallelism.max(1));

    let mut summary = VerifySummary::default();
    while let Some(result) = checks.next().await {
        let (path, state) = result?;
        match state {
            ItemState::Valid => summary.valid += 1,
            ItemState::Missing => {
                tracing::info!(path = %path, "Missing");
                summary.missing += 1;
            }
            ItemState::Mismatched => {
                tracing::info!(path = %path, "Checksum mismatch");
                summary.mismatched += 1;
            }
            ItemState::Unverifiable => {
                tracing::debug!(path = %path, "No digest to verify against");
                summary.unverifiable += 1;
            }
        }
    }
    Ok(summary)
}

async fn verify_item(
    item: &ItemDescriptor,
    install_path: &Path,
    game_id: &str,
    progress: &dyn ProgressSink,
) -> Result<ItemState, DepotFetchError> {
    let paths = ItemPaths::resolve(install_path, game_id, item.path(), item.is_support())?;
    let target = paths.target.as_path();

    let expected = match item.classify()? {
        Classified::Directory => {
            return Ok(if tokio::fs::metadata(target).await.is_ok_and(|m| m.is_dir()) {
                ItemState::Valid
            } else {
                ItemState::Missing
            });
        }
        Classified::EmptyFile => {
            return Ok(match tokio::fs::metadata(target).await {
                Ok(metadata) if metadata.len() == 0 => ItemState::Valid,
                Ok(_) => ItemState::Mismatched,
                Err(_) => ItemState::Missing,
            });
        }
        Classified::Chunked(file) => file.expected_digest().cloned(),
        Classified::Ranged(file) => Some(file.expected_digest()),
    };

    if !tokio::fs::try_exists(target).await? {
        return Ok(ItemState::Missing);
    }
    Ok(match expected {
        None => ItemState::Unverifiable,
        Some(expected) => check_digest(target, &expected, progress).await?,
    })
}

async fn check_digest(
    target: &Path,
    expected: &ContentDigest,
    progress: &dyn ProgressSink,
) -> Result<ItemState, DepotFetchError> {
    if file_matches(target, expected, |n| progress.update_bytes_read(n)).await? {
        Ok(ItemState::Valid)
    } else {
        Ok(ItemState::Mismatched)
    }
}
