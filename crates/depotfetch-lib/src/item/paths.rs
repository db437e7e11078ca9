use crate::error::DepotFetchError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Name of the directory under the install path that holds support files.
pub const SUPPORT_DIR: &str = "support";

/// Top-level manifest directory whose files belong to the installed application.
const APP_TREE_ROOT: &str = "app";

/// Where an item lives on disk, derived from its manifest path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemPaths {
    /// The path the worker writes to.
    pub target: PathBuf,
    /// For support items staged under `support/<game id>/app/...`, the location
    /// inside the install tree the staged file is copied to.
    pub app_copy: Option<PathBuf>,
}

impl ItemPaths {
    pub fn resolve(
        install_path: &Path,
        game_id: &str,
        manifest_path: &str,
        support: bool,
    ) -> Result<Self, DepotFetchError> {
        let relative = normalize_manifest_path(manifest_path)?;

        if !support {
            return Ok(Self {
                target: install_path.join(&relative),
                app_copy: None,
            });
        }

        let target = install_path.join(SUPPORT_DIR).join(game_id).join(&relative);
        let app_copy = relative
            .strip_prefix(APP_TREE_ROOT)
            .ok()
            .filter(|rest| !rest.as_os_str().is_empty())
            .map(|rest| install_path.join(rest));

        Ok(Self { target, app_copy })
    }
}

/// Turns a manifest path using either separator into a relative path with the
/// host's separators. Leading separators are dropped; `..` is rejected.
pub fn normalize_manifest_path(manifest_path: &str) -> Result<PathBuf, DepotFetchError> {
    let mut normalized = PathBuf::new();
    for component in manifest_path.split(['/', '\\']) {
        match component {
            "" | "." => continue,
            ".." => {
                return Err(DepotFetchError::InvalidDescriptor {
                    path: manifest_path.to_string(),
                    details: "path escapes the install directory".to_string(),
                });
            }
            part => normalized.push(part),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(DepotFetchError::InvalidDescriptor {
            path: manifest_path.to_string(),
            details: "path is empty".to_string(),
        });
    }
    Ok(normalized)
}

/// `<target>.tmp<index>`, the staging file for one downloaded chunk.
pub fn chunk_temp_path(target: &Path, index: u32) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(format!(".tmp{index}"));
    PathBuf::from(name)
}

/// Storage path of a content-addressed object: `ab/cd/abcd...`.
pub fn galaxy_path(hex_digest: &str) -> String {
    match (hex_digest.get(0..2), hex_digest.get(2..4)) {
        (Some(first), Some(second)) => format!("{first}/{second}/{hex_digest}"),
        _ => hex_digest.to_string(),
    }
}

/// The HTTP `Range` header value covering `size` bytes starting at `offset`.
/// The end is clamped to `u64::MAX`; descriptors whose range overflows are
/// rejected before a request is built.
pub fn range_header(offset: u64, size: u64) -> String {
    let last = offset.saturating_add(size.saturating_sub(1));
    format!("bytes={offset}-{last}")
}
