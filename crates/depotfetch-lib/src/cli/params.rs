use crate::config::Config;
use crate::download::DownloadOptions;
use crate::job::JobFile;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DownloadParams {
    pub app_config: Config,
    pub job: JobFile,
    pub install_path: PathBuf,
    pub options: DownloadOptions,
}

#[derive(Debug, Clone)]
pub struct VerifyParams {
    pub app_config: Config,
    pub job: JobFile,
    pub install_path: PathBuf,
    pub checking_parallelism: usize,
}
