mod context;
mod download_worker;
mod fetchable;
mod post_process;
mod state;

pub use context::{LinkSource, TargetPlatform, WorkerContext, WorkerOptions};
pub use download_worker::{DownloadWorker, ItemOutcome};
pub use fetchable::{ChunkedFetch, Fetchable, RangedFetch};
pub use post_process::{copy_to_app_tree, make_executable};
pub use state::WorkerState;
