//! Workspace registry, kept in the config file. Switching workspaces only
//! changes which scope the managers query.

use crate::config::{Config, ConfigError};
use crate::models::Workspace;

impl Config {
    pub fn current_workspace(&self) -> Workspace {
        self.workspaces
            .iter()
            .find(|w| w.id == self.active_workspace)
            .cloned()
            .unwrap_or_default()
    }

    /// Register a new workspace. It does not become active.
    pub fn create_workspace(&mut self, name: &str) -> Result<Workspace, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyWorkspaceName);
        }
        let mut workspace = Workspace::new(name.to_string());
        while self.workspaces.iter().any(|w| w.id == workspace.id) {
            workspace.id = crate::utils::short_id();
        }
        self.workspaces.push(workspace.clone());
        Ok(workspace)
    }

    /// Activate a workspace by id, or by name when no id matches
    pub fn switch_workspace(&mut self, id_or_name: &str) -> Result<Workspace, ConfigError> {
        let key = id_or_name.trim();
        let workspace = self
            .workspaces
            .iter()
            .find(|w| w.id == key)
            .or_else(|| self.workspaces.iter().find(|w| w.name.eq_ignore_ascii_case(key)))
            .cloned()
            .ok_or_else(|| ConfigError::WorkspaceNotFound(key.to_string()))?;
        self.active_workspace = workspace.id.clone();
        Ok(workspace)
    }
}
