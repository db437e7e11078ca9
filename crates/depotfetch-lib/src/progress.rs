use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Receives byte counts from download workers. Implementations are shared by
/// every worker of a run and must accept concurrent updates.
pub trait ProgressSink: Send + Sync {
    /// Bytes read back from disk, e.g. while hashing.
    fn update_bytes_read(&self, bytes: u64);
    /// Bytes written to disk.
    fn update_bytes_written(&self, bytes: u64);
    /// Bytes received from the network.
    fn update_download_speed(&self, bytes: u64);
    /// Bytes produced by chunk decompression.
    fn update_decompressed_speed(&self, bytes: u64);
    /// Size of items found already complete on disk.
    fn update_downloaded_size(&self, bytes: u64);
}

#[derive(Debug, Default)]
pub struct ProgressCounters {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    bytes_downloaded: AtomicU64,
    bytes_decompressed: AtomicU64,
    already_complete: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub bytes_downloaded: u64,
    pub bytes_decompressed: u64,
    pub already_complete: u64,
}

impl ProgressCounters {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            bytes_decompressed: self.bytes_decompressed.load(Ordering::Relaxed),
            already_complete: self.already_complete.load(Ordering::Relaxed),
        }
    }
}

impl ProgressSink for ProgressCounters {
    fn update_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    fn update_bytes_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    fn update_download_speed(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    fn update_decompressed_speed(&self, bytes: u64) {
        self.bytes_decompressed.fetch_add(bytes, Ordering::Relaxed);
    }

    fn update_downloaded_size(&self, bytes: u64) {
        self.already_complete.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// Logs throughput every `interval` until the returned handle is aborted.
pub fn spawn_progress_reporter(
    counters: Arc<ProgressCounters>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let mut previous = counters.snapshot();
        let seconds = interval.as_secs_f64().max(f64::EPSILON);

        loop {
            ticker.tick().await;
            let current = counters.snapshot();
            let download_rate =
                (current.bytes_downloaded - previous.bytes_downloaded) as f64 / seconds;
            let decompress_rate =
                (current.bytes_decompressed - previous.bytes_decompressed) as f64 / seconds;
            tracing::info!(
                downloaded = current.bytes_downloaded,
                written = current.bytes_written,
                already_complete = current.already_complete,
                "Download {:.2} MiB/s, decompress {:.2} MiB/s",
                download_rate / MIB,
                decompress_rate / MIB,
            );
            previous = current;
        }
    })
}

const MIB: f64 = 1024.0 * 1024.0;
