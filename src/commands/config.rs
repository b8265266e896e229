use crate::models::config::AppConfig;
use crate::services::config::ConfigManager;
use serde::Serialize;
use std::path::PathBuf;

/// Effective configuration and where it came from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReport {
    pub path: PathBuf,
    pub exists: bool,
    pub config: AppConfig,
}

pub fn show_config(manager: &ConfigManager) -> anyhow::Result<ConfigReport> {
    Ok(ConfigReport {
        path: manager.config_file_path().to_path_buf(),
        exists: manager.config_exists(),
        config: manager.load()?,
    })
}

/// Write the default configuration unless a file is already present
pub fn init_config(manager: &ConfigManager, force: bool) -> anyhow::Result<ConfigReport> {
    if manager.config_exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            manager.config_file_path().display()
        );
    }

    let config = AppConfig::default();
    manager.save(&config)?;

    Ok(ConfigReport {
        path: manager.config_file_path().to_path_buf(),
        exists: true,
        config,
    })
}
