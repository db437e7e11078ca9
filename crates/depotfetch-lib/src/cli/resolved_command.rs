use crate::cli::args::Command;
use crate::cli::params::{DownloadParams, VerifyParams};
use crate::config::{Config, load_config};
use crate::error::DepotFetchError;
use crate::job::JobFile;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum ResolvedCommand {
    Download(DownloadParams),
    Verify(VerifyParams),
}

pub fn resolve_command(command: Command) -> Result<ResolvedCommand, DepotFetchError> {
    match command {
        Command::Download {
            config_path,
            job_path,
            install_path,
            item_parallelism,
            chunk_parallelism,
            max_retries,
        } => {
            let app_config = load_config(&config_path)?;

            let mut options = app_config.download;
            if let Some(item_parallelism) = item_parallelism {
                options.item_parallelism = item_parallelism;
            }
            if let Some(chunk_parallelism) = chunk_parallelism {
                options.chunk_parallelism = chunk_parallelism;
            }
            if let Some(max_retries) = max_retries {
                options.max_retries = max_retries;
            }

            for (name, value) in [
                ("item-parallelism", options.item_parallelism as u64),
                ("chunk-parallelism", options.chunk_parallelism as u64),
                ("timeout-secs", options.timeout_secs),
            ] {
                if value == 0 {
                    return Err(DepotFetchError::CliArgumentValidation {
                        details: format!("{name} must be greater than 0."),
                    });
                }
            }

            let job = JobFile::load_from_file(Path::new(&job_path))?;
            let install_path = resolve_install_path(install_path, &app_config)?;

            Ok(ResolvedCommand::Download(DownloadParams {
                app_config,
                job,
                install_path,
                options,
            }))
        }
        Command::Verify {
            config_path,
            job_path,
            install_path,
            checking_parallelism,
        } => {
            if checking_parallelism == 0 {
                return Err(DepotFetchError::CliArgumentValidation {
                    details: "checking-parallelism must be greater than 0.".to_string(),
                });
            }

            let app_config = load_config(&config_path)?;
            let job = JobFile::load_from_file(Path::new(&job_path))?;
            let install_path = resolve_install_path(install_path, &app_config)?;

            Ok(ResolvedCommand::Verify(VerifyParams {
                app_config,
                job,
                install_path,
                checking_parallelism,
            }))
        }
    }
}

fn resolve_install_path(
    install_path: Option<String>,
    app_config: &Config,
) -> Result<PathBuf, DepotFetchError> {
    install_path
        .map(PathBuf::from)
        .or_else(|| app_config.install_path.clone())
        .ok_or_else(|| DepotFetchError::CliArgumentValidation {
            details: "No install path provided. Configure install_path or pass --install-path."
                .to_string(),
        })
}
