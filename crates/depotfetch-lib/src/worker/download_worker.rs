use super::context::WorkerContext;
use super::fetchable::Fetchable;
use super::post_process::{copy_to_app_tree, make_executable};
use super::state::{StateTracker, WorkerState};
use crate::error::DepotFetchError;
use crate::fetch::{FetchOutcome, Fetcher, RetryBudget, remove_if_exists};
use crate::item::{Classified, ItemDescriptor, ItemPaths};
use crate::verification::file_matches;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a worker finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A directory or empty file was created.
    Created,
    /// The file on disk already matched its digest.
    AlreadyComplete,
    Downloaded,
    /// A transient failure outlasted the retry budget.
    Abandoned,
    /// Downloaded data kept failing verification.
    IntegrityExhausted,
    /// The content server kept refusing freshly refreshed links.
    AuthorizationExhausted,
}

impl ItemOutcome {
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            ItemOutcome::Created | ItemOutcome::AlreadyComplete | ItemOutcome::Downloaded
        )
    }
}

/// Downloads a single depot item. `run` consumes the worker, so each instance
/// handles exactly one item and its retry budget is never shared.
pub struct DownloadWorker {
    item: ItemDescriptor,
    context: Arc<WorkerContext>,
    state: StateTracker,
}

impl DownloadWorker {
    pub fn new(item: ItemDescriptor, context: Arc<WorkerContext>) -> Self {
        let state = StateTracker::new(item.path());
        Self {
            item,
            context,
            state,
        }
    }

    pub async fn run(mut self) -> Result<ItemOutcome, DepotFetchError> {
        let context = &self.context;
        let item = &self.item;
        let paths = ItemPaths::resolve(
            &context.install_path,
            &context.game_id,
            item.path(),
            item.is_support(),
        )?;
        let target = paths.target.as_path();

        self.state.advance(WorkerState::Classified);
        let fetchable = match item.classify()? {
            Classified::Directory => {
                tokio::fs::create_dir_all(target).await?;
                self.state.advance(WorkerState::ShortCircuitDone);
                self.state.advance(WorkerState::Completed);
                return Ok(ItemOutcome::Created);
            }
            Classified::EmptyFile => {
                ensure_parent(target).await?;
                tokio::fs::File::create(target).await?;
                self.state.advance(WorkerState::ShortCircuitDone);
                self.state.advance(WorkerState::Completed);
                return Ok(ItemOutcome::Created);
            }
            Classified::Chunked(file) => Fetchable::chunked(file, context),
            Classified::Ranged(file) => Fetchable::ranged(file, context)?,
        };

        self.state.advance(WorkerState::Verifying);
        let progress = context.progress.as_ref();
        if let Some(expected) = fetchable.expected_digest() {
            if file_matches(target, &expected, |n| progress.update_bytes_read(n)).await? {
                debug!(
                    path = %target.display(),
                    "File exists with matching digest, skipping download"
                );
                progress.update_downloaded_size(fetchable.already_complete_credit());
                self.state.advance(WorkerState::AlreadyComplete);
                self.state.advance(WorkerState::Completed);
                return Ok(ItemOutcome::AlreadyComplete);
            }
        }
        remove_if_exists(target).await?;
        ensure_parent(target).await?;

        let budget = RetryBudget::new(context.options.max_retries);
        let fetcher = Fetcher::new(
            context.provider.as_ref(),
            progress,
            &budget,
            context.options.limits,
        );

        let mut integrity_failures = 0u32;
        loop {
            self.state.advance(WorkerState::Fetching);
            match fetchable.fetch(&fetcher, target).await? {
                FetchOutcome::Abandoned => {
                    warn!(path = %target.display(), "Abandoning item after exhausting retries");
                    self.state.advance(WorkerState::Abandoned);
                    return Ok(ItemOutcome::Abandoned);
                }
                FetchOutcome::AuthorizationExhausted => {
                    self.state.advance(WorkerState::Abandoned);
                    return Ok(ItemOutcome::AuthorizationExhausted);
                }
                FetchOutcome::IntegrityExhausted => {
                    self.state.advance(WorkerState::IntegrityExhausted);
                    return Ok(ItemOutcome::IntegrityExhausted);
                }
                FetchOutcome::Fetched | FetchOutcome::AlreadyPresent => {}
            }

            self.state.advance(WorkerState::Reassembling);
            let verified = match fetchable.reassemble(target, progress).await {
                Ok(()) => fetchable.verify_reassembled(target, progress).await?,
                Err(DepotFetchError::ChunkVerification { path, source }) => {
                    warn!(
                        chunk = %path.display(),
                        "Decompressed chunk failed verification: {}",
                        source
                    );
                    false
                }
                Err(e) => return Err(e),
            };
            if verified {
                break;
            }

            warn!(path = %target.display(), "Checksums mismatch for reassembled file");
            remove_if_exists(target).await?;
            integrity_failures += 1;
            if integrity_failures > context.options.limits.max_integrity_retries {
                self.state.advance(WorkerState::IntegrityExhausted);
                return Ok(ItemOutcome::IntegrityExhausted);
            }
        }

        self.state.advance(WorkerState::PostProcessing);
        if item.is_executable() {
            make_executable(target, context.platform).await?;
        }
        if let Some(app_copy) = &paths.app_copy {
            copy_to_app_tree(target, app_copy).await;
        }

        self.state.advance(WorkerState::Completed);
        info!(
            path = %target.display(),
            state = %self.state.current(),
            "Downloaded and verified"
        );
        Ok(ItemOutcome::Downloaded)
    }
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => tokio::fs::create_dir_all(parent).await,
        None => Ok(()),
    }
}
