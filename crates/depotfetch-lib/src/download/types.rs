use crate::fetch::FetchLimits;
use crate::worker::{ItemOutcome, WorkerOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadOptions {
    pub item_parallelism: usize,
    pub chunk_parallelism: usize,
    pub max_retries: u32,
    pub max_integrity_retries: u32,
    pub max_auth_refreshes: u32,
    pub timeout_secs: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            item_parallelism: 8,
            chunk_parallelism: 1,
            max_retries: 3,
            max_integrity_retries: 3,
            max_auth_refreshes: 10,
            timeout_secs: 600,
        }
    }
}

impl DownloadOptions {
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            max_retries: self.max_retries,
            chunk_parallelism: self.chunk_parallelism,
            limits: FetchLimits {
                max_integrity_retries: self.max_integrity_retries,
                max_auth_refreshes: self.max_auth_refreshes,
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub created: usize,
    pub already_complete: usize,
    pub downloaded: usize,
    pub abandoned: usize,
    pub integrity_exhausted: usize,
    /// Items given up on because refreshed links were still refused.
    pub authorization_exhausted: usize,
    /// Items whose worker hit a hard error.
    pub failed: usize,
}

impl DownloadSummary {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Created => self.created += 1,
            ItemOutcome::AlreadyComplete => self.already_complete += 1,
            ItemOutcome::Downloaded => self.downloaded += 1,
            ItemOutcome::Abandoned => self.abandoned += 1,
            ItemOutcome::IntegrityExhausted => self.integrity_exhausted += 1,
            ItemOutcome::AuthorizationExhausted => self.authorization_exhausted += 1,
        }
    }

    pub fn incomplete(&self) -> usize {
        self.abandoned + self.integrity_exhausted + self.authorization_exhausted + self.failed
    }

    pub fn merge(&mut self, other: &DownloadSummary) {
        self.created += other.created;
        self.already_complete += other.already_complete;
        self.downloaded += other.downloaded;
        self.abandoned += other.abandoned;
        self.integrity_exhausted += other.integrity_exhausted;
        self.authorization_exhausted += other.authorization_exhausted;
        self.failed += other.failed;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub valid: usize,
    pub missing: usize,
    pub mismatched: usize,
    /// Files present on disk that carry no digest to check against.
    pub unverifiable: usize,
}

impl VerifySummary {
    pub fn needs_repair(&self) -> usize {
        self.missing + self.mismatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_incomplete_items() {
        let mut summary = DownloadSummary::default();
        summary.record(ItemOutcome::Downloaded);
        summary.record(ItemOutcome::Abandoned);

        let mut dependencies = DownloadSummary::default();
        dependencies.record(ItemOutcome::IntegrityExhausted);
        dependencies.record(ItemOutcome::AlreadyComplete);
        dependencies.record(ItemOutcome::AuthorizationExhausted);
        dependencies.failed += 1;

        summary.merge(&dependencies);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.already_complete, 1);
        assert_eq!(summary.authorization_exhausted, 1);
        assert_eq!(summary.incomplete(), 4);
    }

    #[test]
    fn test_download_options_read_partial_yaml_section() {
        let options: DownloadOptions =
            serde_json::from_str(r#"{ "item_parallelism": 2, "max_auth_refreshes": 4 }"#).unwrap();
        assert_eq!(options.item_parallelism, 2);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.worker_options().limits.max_auth_refreshes, 4);
    }
}
