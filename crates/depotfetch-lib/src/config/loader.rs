use super::Config;
use crate::error::DepotFetchError;
use config::Config as ConfigBuilder;

pub fn load_config(config_path: &str) -> Result<Config, DepotFetchError> {
    let config_builder = ConfigBuilder::builder()
        .add_source(config::File::with_name(config_path))
        .build()?;

    config_builder.try_deserialize().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::TargetPlatform;

    #[test]
    fn test_load_yaml_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depotfetch.yaml");
        std::fs::write(
            &path,
            "game_id: \"1207658924\"\n\
             platform: windows\n\
             links_file: links.json\n\
             download:\n  max_retries: 5\n",
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();

        assert_eq!(config.game_id, "1207658924");
        assert_eq!(config.platform, TargetPlatform::Windows);
        assert_eq!(config.install_path, None);
        assert_eq!(config.download.max_retries, 5);
        assert_eq!(config.download.item_parallelism, 8);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depotfetch.yaml");
        std::fs::write(&path, "game_id: \"1\"\nlinks_file: l.json\nthreads: 4\n").unwrap();

        assert!(load_config(path.to_str().unwrap()).is_err());
    }
}
