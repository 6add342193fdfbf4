//! Initialize the configuration directory and the storage directories.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Default config written by `init`: every key the gateway reads, with credentials left for the environment.
const DEFAULT_CONFIG: &str = r#"{
  "gateway": { "bind": "0.0.0.0", "port": 5000 },
  "twilio": { "fromNumber": "whatsapp:+14155238886" },
  "tryon": { "space": "HumanAIGC/OutfitAnyone", "apiName": "/tryon" },
  "storage": { "staticDir": "static", "mediaDir": "media", "resultRetentionSecs": 86400 },
  "sessions": { "store": "memory" }
}
"#;

/// Create the config directory and a default `config.json` if missing.
/// Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, leaving it", config_path.display());
    }
    Ok(config_dir.to_path_buf())
}

/// Create the static (results) and media (downloads) directories named in config.
pub fn init_storage(config: &Config) -> Result<()> {
    for dir in [&config.storage.static_dir, &config.storage.media_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
            log::info!("created directory {}", dir.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config: Config = serde_json::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.gateway.port, 5000);
        assert_eq!(config.tryon.api_name, "/tryon");
    }

    #[test]
    fn init_writes_config_once_and_creates_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.json");
        let created = init_config_dir(&path).unwrap();
        assert_eq!(created, dir.path().join("conf"));
        assert!(path.exists());

        std::fs::write(&path, "{\"gateway\":{\"port\":1}}").unwrap();
        init_config_dir(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"gateway\":{\"port\":1}}");

        let mut config = Config::default();
        config.storage.static_dir = dir.path().join("static");
        config.storage.media_dir = dir.path().join("media");
        init_storage(&config).unwrap();
        assert!(config.storage.static_dir.is_dir());
        assert!(config.storage.media_dir.is_dir());
    }
}
