use anyhow::Result;
use directories::ProjectDirs;
use ropecore::{OverflowPolicy, RebalanceStrategy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::try_exists;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub files: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    pub tab_size: usize,
    pub use_spaces: bool,
    #[serde(default)]
    pub rebalance: RebalanceStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub backup_on_save: bool,
    pub large_file_warning_bytes: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            tab_size: 4,
            use_spaces: true,
            rebalance: RebalanceStrategy::Bisect,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            overflow: OverflowPolicy::DiscardOldest,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            backup_on_save: true,
            large_file_warning_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub async fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if try_exists(&config_path).await? {
                match tokio::fs::read_to_string(&config_path).await {
                    Ok(content) => {
                        if content.trim().is_empty() {
                            log::warn!("Config file is empty, creating new one");
                            let default_config = Self::default();
                            let _ = default_config.save().await;
                            return Ok(default_config);
                        }

                        match serde_json::from_str::<Self>(&content) {
                            Ok(mut config) => {
                                config.validate()?;
                                log::info!(
                                    "Successfully loaded config from: {}",
                                    config_path.display()
                                );
                                return Ok(config);
                            }
                            Err(json_err) => {
                                log::error!("Failed to parse config file: {}", json_err);

                                // Keep the broken file around for the user
                                let backup_path = config_path.with_extension("bak");
                                if let Err(e) = tokio::fs::copy(&config_path, &backup_path).await {
                                    log::warn!("Failed to backup broken config: {}", e);
                                } else {
                                    log::info!(
                                        "Backed up broken config to: {}",
                                        backup_path.display()
                                    );
                                }

                                let default_config = Self::default();
                                let _ = default_config.save().await;
                                return Ok(default_config);
                            }
                        }
                    }
                    Err(io_err) => {
                        log::error!("Failed to read config file: {}", io_err);
                    }
                }
            } else {
                log::info!("Config file does not exist, creating default");
            }
        }

        let default_config = Self::default();
        let _ = default_config.save().await;
        Ok(default_config)
    }

    pub async fn save(&self) -> Result<()> {
        let Some(config_path) = Self::config_path() else {
            return Ok(());
        };
        let mut config_to_save = self.clone();
        config_to_save.validate()?;

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create config directory: {} - {}",
                    parent.display(),
                    e
                )
            })?;
            log::debug!("Config directory exists or was created: {}", parent.display());
        }

        let content = serde_json::to_string_pretty(&config_to_save)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
        tokio::fs::write(&config_path, content).await.map_err(|e| {
            anyhow::anyhow!(
                "Failed to write config file: {} - {}",
                config_path.display(),
                e
            )
        })?;
        log::info!("Successfully saved config to: {}", config_path.display());
        Ok(())
    }

    /// Validate configuration values and fix invalid ones
    pub fn validate(&mut self) -> Result<()> {
        let mut has_issues = false;

        if self.editor.tab_size == 0 || self.editor.tab_size > 16 {
            log::warn!("Invalid tab size: {}, using default", self.editor.tab_size);
            self.editor.tab_size = 4;
            has_issues = true;
        }

        if self.history.capacity == 0 || self.history.capacity > 10_000 {
            log::warn!(
                "Invalid history capacity: {}, using default",
                self.history.capacity
            );
            self.history.capacity = 100;
            has_issues = true;
        }

        if self.files.large_file_warning_bytes == 0 {
            log::warn!("Large file warning threshold is zero, using default");
            self.files.large_file_warning_bytes = FileConfig::default().large_file_warning_bytes;
            has_issues = true;
        }

        if has_issues {
            log::info!("Configuration validation completed with corrections");
        }

        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ROPEDIT_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("ROPEDIT_CONFIG_DIR") {
            return Some(PathBuf::from(dir).join("config.json"));
        }

        ProjectDirs::from("com", "ropedit", "ropedit")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn config_test_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_config_dir(path: &std::path::Path) -> (Option<String>, Option<String>) {
        let previous_dir = std::env::var("ROPEDIT_CONFIG_DIR").ok();
        let previous_path = std::env::var("ROPEDIT_CONFIG_PATH").ok();
        std::env::set_var("ROPEDIT_CONFIG_DIR", path);
        std::env::remove_var("ROPEDIT_CONFIG_PATH");
        (previous_dir, previous_path)
    }

    fn restore_config_env(previous: (Option<String>, Option<String>)) {
        match previous.0 {
            Some(value) => std::env::set_var("ROPEDIT_CONFIG_DIR", value),
            None => std::env::remove_var("ROPEDIT_CONFIG_DIR"),
        }

        match previous.1 {
            Some(value) => std::env::set_var("ROPEDIT_CONFIG_PATH", value),
            None => std::env::remove_var("ROPEDIT_CONFIG_PATH"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.editor.tab_size, 4);
        assert!(config.editor.use_spaces);
        assert_eq!(config.editor.rebalance, RebalanceStrategy::Bisect);
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.history.overflow, OverflowPolicy::DiscardOldest);
        assert!(config.files.backup_on_save);
        assert_eq!(config.files.large_file_warning_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"editor\""));
        assert!(json.contains("\"history\""));
        assert!(json.contains("\"files\""));
        assert!(json.contains("\"discard_oldest\""));
        assert!(json.contains("\"bisect\""));

        let config_from_json: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.editor.tab_size, config_from_json.editor.tab_size);
        assert_eq!(config.history.capacity, config_from_json.history.capacity);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let json = r#"{ "history": { "capacity": 5, "overflow": "drop_newest" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.history.capacity, 5);
        assert_eq!(config.history.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.editor.tab_size, 4);
        assert!(config.files.backup_on_save);
    }

    #[test]
    fn test_validate_fixes_invalid_values() {
        let mut config = Config::default();
        config.editor.tab_size = 0;
        config.history.capacity = 0;
        config.files.large_file_warning_bytes = 0;
        config.validate().unwrap();
        assert_eq!(config.editor.tab_size, 4);
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.files.large_file_warning_bytes, 10 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_config_load_default() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = config_test_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous_env = set_config_dir(temp_dir.path());

        let config = Config::load().await.unwrap();
        assert_eq!(config.history.capacity, 100);
        assert!(temp_dir.path().join("config.json").exists());

        restore_config_env(previous_env);
    }

    #[tokio::test]
    async fn test_broken_config_is_backed_up() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json").unwrap();
        let _guard = config_test_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous_env = set_config_dir(temp_dir.path());

        let config = Config::load().await.unwrap();
        assert_eq!(config.editor.tab_size, 4);
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("config.bak")).unwrap(),
            "{ not json"
        );

        restore_config_env(previous_env);
    }
}
