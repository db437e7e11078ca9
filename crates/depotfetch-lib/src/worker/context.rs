use crate::auth::AuthorizationProvider;
use crate::fetch::FetchLimits;
use crate::progress::ProgressSink;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Platform the content is installed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    Windows,
    Osx,
    Linux,
}

impl TargetPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            TargetPlatform::Windows
        } else if cfg!(target_os = "macos") {
            TargetPlatform::Osx
        } else {
            TargetPlatform::Linux
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetPlatform::Windows => "windows",
            TargetPlatform::Osx => "osx",
            TargetPlatform::Linux => "linux",
        }
    }

    /// Whether files installed for this platform carry an execute permission.
    pub fn has_execute_bit(self) -> bool {
        self != TargetPlatform::Windows
    }
}

impl Default for TargetPlatform {
    fn default() -> Self {
        Self::current()
    }
}

/// Where chunk links come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkSource {
    /// The game's own product secure links.
    #[default]
    Product,
    /// The shared dependency pool (redistributables).
    Dependency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Retries for transient failures, shared by every fetch of one item.
    pub max_retries: u32,
    /// Chunks of one item fetched at the same time.
    pub chunk_parallelism: usize,
    pub limits: FetchLimits,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            chunk_parallelism: 1,
            limits: FetchLimits::default(),
        }
    }
}

/// Everything a worker needs besides its item. Shared by all workers of a run.
#[derive(Clone)]
pub struct WorkerContext {
    pub install_path: PathBuf,
    pub game_id: String,
    pub build_id: Option<String>,
    pub platform: TargetPlatform,
    pub link_source: LinkSource,
    pub options: WorkerOptions,
    pub provider: Arc<dyn AuthorizationProvider>,
    pub progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("install_path", &self.install_path)
            .field("game_id", &self.game_id)
            .field("build_id", &self.build_id)
            .field("platform", &self.platform)
            .field("link_source", &self.link_source)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
