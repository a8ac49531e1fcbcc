//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::AppConfig;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the configuration file in the user config directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the project-level configuration file in the working directory.
pub const PROJECT_CONFIG_FILE_NAME: &str = "term-settings.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Compiled-in defaults (lowest priority)
    Defaults = 0,
    /// User-level config (~/.config/term-settings/config.yaml)
    User = 1,
    /// Project-level config ($CWD/term-settings.yaml)
    Project = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Files consulted for each tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// User-level config file
    pub user_file: Option<PathBuf>,
    /// Project-level config file
    pub project_file: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: TERM_SETTINGS_CONFIG_DIR or ~/.config/term-settings
        let user_file = std::env::var("TERM_SETTINGS_CONFIG_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config").join("term-settings")))
            .map(|dir| dir.join(CONFIG_FILE_NAME));

        Self {
            user_file,
            project_file: Some(PathBuf::from(PROJECT_CONFIG_FILE_NAME)),
        }
    }

    /// Create paths with explicit files.
    pub fn with_files(user_file: Option<PathBuf>, project_file: Option<PathBuf>) -> Self {
        Self {
            user_file,
            project_file,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    config: AppConfig,
    /// Files that contributed, lowest tier first
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        // An explicit file replaces the user and project tiers.
        if let Ok(explicit_path) = std::env::var("TERM_SETTINGS_CONFIG_PATH") {
            return Self::load_explicit(paths, PathBuf::from(explicit_path));
        }

        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults
        configs.push(serde_json::to_value(AppConfig::default())?);

        // Tier 2: User config, then Tier 3: Project config
        let tiers = [
            (ConfigTier::User, paths.user_file.as_deref()),
            (ConfigTier::Project, paths.project_file.as_deref()),
        ];
        for (tier, file) in tiers {
            let Some(file) = file else { continue };
            if let Some(value) = read_yaml(file) {
                debug!(tier = %tier, path = %file.display(), "loaded config tier");
                configs.push(value);
                sources.push((tier, file.to_path_buf()));
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: AppConfig = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Load defaults merged with one explicit file, then environment overrides.
    pub fn load_explicit(paths: ConfigPaths, path: PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let overlay: Value = serde_yaml::from_str(&content)?;
        let merged = deep_merge_all([serde_json::to_value(AppConfig::default())?, overlay]);
        let mut config: AppConfig = serde_json::from_value(merged)?;
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            sources: vec![(ConfigTier::Project, path)],
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut AppConfig) {
        if let Ok(dir) = std::env::var("TERM_SETTINGS_DIR") {
            config.paths.settings_dir = PathBuf::from(dir);
        }

        if let Ok(state_file) = std::env::var("TERM_SETTINGS_STATE_FILE") {
            config.paths.state_file = Some(PathBuf::from(state_file));
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// Config files that contributed, lowest tier first.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

/// A YAML file as a JSON value; missing or malformed files yield nothing.
fn read_yaml(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}
