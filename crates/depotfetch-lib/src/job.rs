use crate::error::DepotFetchError;
use crate::item::ItemDescriptor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The items of one install or update, as produced from a depot manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    /// Version of the job file format
    pub version: u32,
    /// Items of the game's own depots
    #[serde(default)]
    pub items: Vec<ItemDescriptor>,
    /// Items served from the shared dependency pool
    #[serde(default)]
    pub dependencies: Vec<ItemDescriptor>,
}

impl JobFile {
    pub const VERSION: u32 = 1;

    pub fn new(items: Vec<ItemDescriptor>, dependencies: Vec<ItemDescriptor>) -> Self {
        Self {
            version: Self::VERSION,
            items,
            dependencies,
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), DepotFetchError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| DepotFetchError::JobSave {
            path: path.to_path_buf(),
            reason: format!("JSON serialization failed: {}", e),
        })?;
        std::fs::write(path, json).map_err(|e| DepotFetchError::JobSave {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, DepotFetchError> {
        let content = std::fs::read_to_string(path).map_err(|e| DepotFetchError::JobLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let job: JobFile =
            serde_json::from_str(&content).map_err(|e| DepotFetchError::JobLoad {
                path: path.to_path_buf(),
                reason: format!("JSON parsing failed: {}", e),
            })?;

        if job.version != Self::VERSION {
            return Err(DepotFetchError::JobLoad {
                path: path.to_path_buf(),
                reason: format!(
                    "Job file version {} is not supported. Expected version {}",
                    job.version,
                    Self::VERSION
                ),
            });
        }

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_file_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        let job = JobFile::new(
            vec![ItemDescriptor::Directory {
                path: "bin".to_string(),
            }],
            vec![],
        );

        job.save_to_file(&path).unwrap();
        assert_eq!(JobFile::load_from_file(&path).unwrap(), job);
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"{ "version": 7, "items": [] }"#).unwrap();

        let err = JobFile::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("version 7"));
    }
}
