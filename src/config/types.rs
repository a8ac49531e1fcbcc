//! Application configuration types.
//!
//! These describe where the engine finds its inputs, not terminal settings
//! themselves; those live in the JSON settings document.

use crate::paths::expand_environment;
use crate::pipeline::layering::FirstRunPolicy;
use crate::model::guid::parse_guid;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the user settings document inside the settings directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Name of the generated-profile state file inside the settings directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Where the settings document and its state file live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `settings.json` and `state.json`.
    #[serde(default = "default_settings_dir")]
    pub settings_dir: PathBuf,
    /// Explicit settings document, overriding `settings_dir`.
    #[serde(default)]
    pub settings_file: Option<PathBuf>,
    /// Explicit state file, overriding `settings_dir`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_dir: default_settings_dir(),
            settings_file: None,
            state_file: None,
        }
    }
}

fn default_settings_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("term-settings"))
        .unwrap_or_else(|| PathBuf::from(".term-settings"))
}

/// Fragment discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Roots scanned as `<root>/<namespace>/*.json`.
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

impl Default for FragmentsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            roots: Vec::new(),
        }
    }
}

/// The shell-list generator reads one shell path per line, as in `/etc/shells`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellsGeneratorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_shells_path")]
    pub path: PathBuf,
    /// Profile name to make the default on first run.
    #[serde(default)]
    pub preferred: Option<String>,
}

impl Default for ShellsGeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_shells_path(),
            preferred: None,
        }
    }
}

fn default_shells_path() -> PathBuf {
    PathBuf::from("/etc/shells")
}

/// The SSH generator turns `Host` entries of an ssh config into profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshGeneratorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to `~/.ssh/config`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for SshGeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorsConfig {
    #[serde(default)]
    pub shells: ShellsGeneratorConfig,
    #[serde(default)]
    pub ssh: SshGeneratorConfig,
}

/// Choices applied when no settings document exists yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirstRunConfig {
    /// Braced profile key used when no generator offers a preferred profile.
    #[serde(default)]
    pub fallback_default_profile: Option<String>,
    /// Display names for well-known profiles, keyed by braced profile key.
    #[serde(default)]
    pub display_names: BTreeMap<String, String>,
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub fragments: FragmentsConfig,
    #[serde(default)]
    pub generators: GeneratorsConfig,
    #[serde(default)]
    pub first_run: FirstRunConfig,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a single YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// The settings document path.
    pub fn settings_path(&self) -> PathBuf {
        match &self.paths.settings_file {
            Some(file) => expand(file),
            None => expand(&self.paths.settings_dir).join(SETTINGS_FILE_NAME),
        }
    }

    /// The generated-profile state file path.
    pub fn state_path(&self) -> PathBuf {
        match &self.paths.state_file {
            Some(file) => expand(file),
            None => expand(&self.paths.settings_dir).join(STATE_FILE_NAME),
        }
    }

    /// The ssh config the SSH generator reads, if one can be located.
    pub fn ssh_config_path(&self) -> Option<PathBuf> {
        match &self.generators.ssh.path {
            Some(path) => Some(expand(path)),
            None => dirs::home_dir().map(|home| home.join(".ssh").join("config")),
        }
    }

    /// Fragment roots with `~` and variables expanded.
    ///
    /// Without configured roots, `<settings_dir>/Fragments` is used.
    pub fn fragment_roots(&self) -> Vec<PathBuf> {
        if self.fragments.roots.is_empty() {
            return vec![expand(&self.paths.settings_dir).join("Fragments")];
        }
        self.fragments.roots.iter().map(|root| expand(root)).collect()
    }

    /// First-run choices with profile keys parsed. Unparseable keys are
    /// skipped with a warning.
    pub fn first_run_policy(&self) -> FirstRunPolicy {
        let fallback_default_profile =
            self.first_run
                .fallback_default_profile
                .as_deref()
                .and_then(|reference| match parse_guid(reference) {
                    Some(guid) => Some(guid),
                    None => {
                        warn!(reference, "ignoring malformed fallback default profile");
                        None
                    }
                });

        let display_names = self
            .first_run
            .display_names
            .iter()
            .filter_map(|(key, name)| match parse_guid(key) {
                Some(guid) => Some((guid, name.clone())),
                None => {
                    warn!(key = %key, "ignoring display name with malformed profile key");
                    None
                }
            })
            .collect();

        FirstRunPolicy {
            fallback_default_profile,
            display_names,
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(expand_environment(&path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = AppConfig {
            paths: PathsConfig {
                settings_dir: PathBuf::from("/tmp/term"),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/term/settings.json"));
        assert_eq!(config.state_path(), PathBuf::from("/tmp/term/state.json"));
        assert_eq!(config.fragment_roots(), vec![PathBuf::from("/tmp/term/Fragments")]);
    }

    #[test]
    fn test_explicit_files_win() {
        let mut config = AppConfig::default();
        config.paths.settings_file = Some(PathBuf::from("/work/settings.json"));
        config.paths.state_file = Some(PathBuf::from("/work/other-state.json"));
        assert_eq!(config.settings_path(), PathBuf::from("/work/settings.json"));
        assert_eq!(config.state_path(), PathBuf::from("/work/other-state.json"));
    }

    #[test]
    fn test_yaml_partial_document() {
        let yaml = r#"
generators:
  shells:
    preferred: bash
  ssh:
    enabled: false
first_run:
  fallback_default_profile: "{61c54bbd-c2c6-5271-96e7-009a87ff44bf}"
  display_names:
    "{61c54bbd-c2c6-5271-96e7-009a87ff44bf}": Command Shell
    "not-a-key": Ignored
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.generators.shells.enabled);
        assert_eq!(config.generators.shells.preferred.as_deref(), Some("bash"));
        assert!(!config.generators.ssh.enabled);
        assert!(config.fragments.enabled);

        let policy = config.first_run_policy();
        let key = parse_guid("{61c54bbd-c2c6-5271-96e7-009a87ff44bf}").unwrap();
        assert_eq!(policy.fallback_default_profile, Some(key));
        assert_eq!(policy.display_names.len(), 1);
        assert_eq!(policy.display_names[&key], "Command Shell");
    }
}
