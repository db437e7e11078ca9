use crate::auth::{AuthorizationProvider, FileLinkProvider, build_http_client};
use crate::cli::{DownloadParams, VerifyParams};
use crate::download::{download_all, verify_all};
use crate::error::DepotFetchError;
use crate::progress::{ProgressCounters, spawn_progress_reporter};
use crate::worker::{LinkSource, WorkerContext};
use std::sync::Arc;
use std::time::Duration;
use tracing;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run_download(params: DownloadParams) -> Result<(), DepotFetchError> {
    let DownloadParams {
        app_config,
        job,
        install_path,
        options,
    } = params;

    tracing::info!("Loading secure links from {}", app_config.links_file.display());
    let client = build_http_client(options.timeout())?;
    let provider: Arc<dyn AuthorizationProvider> =
        Arc::new(FileLinkProvider::load(&app_config.links_file, client).await?);

    let progress = Arc::new(ProgressCounters::default());
    let reporter = spawn_progress_reporter(progress.clone(), PROGRESS_INTERVAL);

    let context = WorkerContext {
        install_path: install_path.clone(),
        game_id: app_config.game_id.clone(),
        build_id: app_config.build_id.clone(),
        platform: app_config.platform,
        link_source: LinkSource::Product,
        options: options.worker_options(),
        provider,
        progress: progress.clone(),
    };

    tracing::info!(
        "Downloading {} items into {}...",
        job.items.len(),
        install_path.display()
    );
    let dependency_context = WorkerContext {
        link_source: LinkSource::Dependency,
        ..context.clone()
    };
    let mut summary = download_all(job.items, Arc::new(context), options.item_parallelism).await?;

    if !job.dependencies.is_empty() {
        tracing::info!("Downloading {} dependency items...", job.dependencies.len());
        let dependencies = download_all(
            job.dependencies,
            Arc::new(dependency_context),
            options.item_parallelism,
        )
        .await?;
        summary.merge(&dependencies);
    }

    reporter.abort();
    let totals = progress.snapshot();
    tracing::info!(
        downloaded_bytes = totals.bytes_downloaded,
        written_bytes = totals.bytes_written,
        already_complete_bytes = totals.already_complete,
        "Download finished"
    );

    if summary.incomplete() > 0 {
        return Err(DepotFetchError::Unexpected(eyre::eyre!(
            "{} items did not complete: {} abandoned, {} corrupt, {} unauthorized, {} failed",
            summary.incomplete(),
            summary.abandoned,
            summary.integrity_exhausted,
            summary.authorization_exhausted,
            summary.failed
        )));
    }

    tracing::info!("Download completed successfully");
    Ok(())
}

pub async fn run_verify(params: VerifyParams) -> Result<(), DepotFetchError> {
    let VerifyParams {
        app_config,
        job,
        install_path,
        checking_parallelism,
    } = params;

    let progress = ProgressCounters::default();
    let items: Vec<_> = job.items.into_iter().chain(job.dependencies).collect();
    tracing::info!("Verifying {} items in {}...", items.len(), install_path.display());

    let summary = verify_all(
        &items,
        &install_path,
        &app_config.game_id,
        &progress,
        checking_parallelism,
    )
    .await?;

    tracing::info!(
        valid = summary.valid,
        missing = summary.missing,
        mismatched = summary.mismatched,
        unverifiable = summary.unverifiable,
        read_bytes = progress.snapshot().bytes_read,
        "Verification finished"
    );

    if summary.needs_repair() > 0 {
        return Err(DepotFetchError::Unexpected(eyre::eyre!(
            "{} items need to be downloaded again",
            summary.needs_repair()
        )));
    }
    Ok(())
}
