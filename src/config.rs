use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Workspace;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Which persistence adapter backs the managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Local,
}

/// What a manager does with its local state when an update or delete fails
/// to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the optimistic change and log the error
    #[default]
    KeepLocal,
    /// Refetch the collection from the store
    Reconcile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Contract receiving `logTasks` and `setPasswordHash`
    #[serde(default = "default_task_journal_address")]
    pub task_journal_address: String,
    /// Contract receiving `anchorDocument`
    #[serde(default = "default_journal_address")]
    pub journal_address: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            task_journal_address: default_task_journal_address(),
            journal_address: default_journal_address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default = "default_local_store_path")]
    pub local_store_path: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default = "default_workspaces")]
    pub workspaces: Vec<Workspace>,
    #[serde(default = "default_active_workspace")]
    pub active_workspace: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_pomodoro_minutes")]
    pub pomodoro_minutes: u32,
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            storage: StorageBackend::default(),
            local_store_path: default_local_store_path(),
            wallet_address: None,
            workspaces: default_workspaces(),
            active_workspace: default_active_workspace(),
            failure_policy: FailurePolicy::default(),
            pomodoro_minutes: default_pomodoro_minutes(),
            log_filter: None,
            chain: ChainConfig::default(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("arcos.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/arcos/arcos.db".to_string()
    }
}

fn default_local_store_path() -> String {
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("local-storage.json").to_string_lossy().to_string()
    } else {
        "~/.local/share/arcos/local-storage.json".to_string()
    }
}

fn default_workspaces() -> Vec<Workspace> {
    vec![Workspace::default()]
}

fn default_active_workspace() -> String {
    Workspace::default().id
}

fn default_pomodoro_minutes() -> u32 {
    25
}

fn default_chain_id() -> u64 {
    5042002
}

fn default_task_journal_address() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}

fn default_journal_address() -> String {
    "0xeB282dF68897C6245526e9BFD88e82eF5BcbD5c2".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),
    #[error("Workspace name cannot be empty")]
    EmptyWorkspaceName,
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        let mut config = Self::load_or_create(&config_path, || {
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            config.local_store_path = Self::default_local_store_path_for_profile(profile);
            config
        })?;

        // Hand-edited configs may drop the paths entirely
        if config.database_path.trim().is_empty() {
            config.database_path = Self::default_database_path_for_profile(profile);
        }
        if config.local_store_path.trim().is_empty() {
            config.local_store_path = Self::default_local_store_path_for_profile(profile);
        }
        Ok(config)
    }

    /// Load configuration from an explicit path (`--config`)
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::load_or_create(path, Config::default)
    }

    fn load_or_create(path: &Path, default: impl FnOnce() -> Config) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;
            config.normalize_workspaces();
            Ok(config)
        } else {
            // Create default config and save it
            let mut config = default();
            if let Err(e) = config.save_to_path(path) {
                tracing::error!(path = %path.display(), "Failed to save config file: {}", e);
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        Self::data_file_for_profile(profile, "arcos.db")
    }

    fn default_local_store_path_for_profile(profile: utils::Profile) -> String {
        Self::data_file_for_profile(profile, "local-storage.json")
    }

    fn data_file_for_profile(profile: utils::Profile, file: &str) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join(file).to_string_lossy().to_string()
        } else {
            // Fallback paths - platform-specific
            #[cfg(target_os = "macos")]
            {
                format!("~/Library/Application Support/{}/{}", profile.app_name(), file)
            }
            #[cfg(not(target_os = "macos"))]
            {
                format!("~/.local/share/{}/{}", profile.app_name(), file)
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn get_local_store_path(&self) -> PathBuf {
        utils::expand_path(&self.local_store_path)
    }

    /// Keep at least one workspace and an active id that points at one
    fn normalize_workspaces(&mut self) {
        if self.workspaces.is_empty() {
            self.workspaces = default_workspaces();
        }
        if !self.workspaces.iter().any(|w| w.id == self.active_workspace) {
            tracing::warn!(
                active = %self.active_workspace,
                "active workspace missing from config, falling back to the first one"
            );
            self.active_workspace = self.workspaces[0].id.clone();
        }
    }
}
