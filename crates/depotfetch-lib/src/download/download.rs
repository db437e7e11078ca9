use super::types::DownloadSummary;
use crate::item::ItemDescriptor;
use crate::worker::{DownloadWorker, WorkerContext};
use eyre::{Result, WrapErr};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs one worker per item, at most `item_parallelism` at a time. Worker
/// failures are counted, not propagated, so one bad item never stops the rest.
pub async fn download_all(
    items: Vec<ItemDescriptor>,
    context: Arc<WorkerContext>,
    item_parallelism: usize,
) -> Result<DownloadSummary> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(item_parallelism));

    let mut futs = FuturesUnordered::new();
    for item in items {
        let context = context.clone();
        let semaphore = semaphore.clone();
        futs.push(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .wrap_err("Item semaphore closed")?;
            let path = item.path().to_string();
            tracing::trace!(path = %path, "Starting worker");
            let result = DownloadWorker::new(item, context).run().await;
            Ok::<_, eyre::Report>((path, result))
        });
    }

    info!("Waiting for {} items to finish...", futs.len());

    let mut summary = DownloadSummary::default();
    while let Some(res) = futs.next().await {
        let (path, result) = res?;
        match result {
            Ok(outcome) => {
                if !outcome.is_completed() {
                    warn!(path = %path, ?outcome, "Item did not complete");
                }
                summary.record(outcome);
            }
            Err(err) => {
                warn!(path = %path, "Item failed: {:#}", err);
                summary.failed += 1;
            }
        }
    }

    info!(
        downloaded = summary.downloaded,
        already_complete = summary.already_complete,
        created = summary.created,
        incomplete = summary.incomplete(),
        "Finished downloading"
    );
    Ok(summary)
}
