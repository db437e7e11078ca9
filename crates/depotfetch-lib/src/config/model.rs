use crate::download::DownloadOptions;
use crate::worker::TargetPlatform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base directory the game is installed into.
    #[serde(default)]
    pub install_path: Option<PathBuf>,
    pub game_id: String,
    /// Build whose V1 links are requested on refresh.
    #[serde(default)]
    pub build_id: Option<String>,
    #[serde(default)]
    pub platform: TargetPlatform,
    /// JSON file with the secure links downloads are authorized with.
    pub links_file: PathBuf,
    #[serde(default)]
    pub download: DownloadOptions,
}
