#[allow(clippy::module_inception)]
mod download;
mod types;
mod verify;

pub use download::download_all;
pub use types::{DownloadOptions, DownloadSummary, VerifySummary};
pub use verify::verify_all;
