//! Dynamic profile generators.
//!
//! A generator inspects the machine and emits one profile per thing it finds
//! (installed shells, configured ssh hosts, ...). Output is keyed by the
//! generator's namespace, so the same shell always gets the same key.

use crate::model::guid::generated_profile_guid;
use crate::model::profile::{Origin, ProfileRecord};
use crate::model::settings::ProfileSettings;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SHELLS_NAMESPACE: &str = "Terminal.App.Shells";
pub const SSH_NAMESPACE: &str = "Terminal.App.Ssh";

pub trait ProfileGenerator: Send + Sync {
    /// Stable namespace label, also written as the `source` of each profile.
    fn namespace(&self) -> &str;

    /// Append generated profiles to `profiles`.
    fn generate(&self, profiles: &mut Vec<ProfileRecord>) -> Result<()>;

    /// Name of the profile this generator would like as the default on first run.
    fn preferred_profile_name(&self) -> Option<String> {
        None
    }
}

/// Build a generated record with the deterministic key for `name`.
pub fn generated_profile(namespace: &str, name: &str, settings: ProfileSettings) -> ProfileRecord {
    let mut settings = settings;
    settings.name = Some(name.to_string());
    settings.source = Some(namespace.to_string());
    ProfileRecord::new(Origin::Generated)
        .with_guid(generated_profile_guid(namespace, name))
        .with_settings(settings)
}

/// The profiles one generator produced in a run.
#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub namespace: String,
    pub profiles: Vec<ProfileRecord>,
}

#[derive(Default)]
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn ProfileGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, generator: impl ProfileGenerator + 'static) {
        self.generators.push(Box::new(generator));
    }

    pub fn with(mut self, generator: impl ProfileGenerator + 'static) -> Self {
        self.register(generator);
        self
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Run every enabled generator in registration order.
    ///
    /// A failing generator is logged and contributes nothing; the others
    /// still run. Disabled namespaces are skipped and absent from the result.
    pub fn run(&self, disabled: &HashSet<String>) -> Vec<GeneratorOutput> {
        let mut outputs = Vec::new();
        for generator in &self.generators {
            let namespace = generator.namespace();
            if disabled.contains(namespace) {
                debug!(namespace, "generator disabled");
                continue;
            }

            let mut profiles = Vec::new();
            match generator.generate(&mut profiles) {
                Ok(()) => {
                    debug!(namespace, count = profiles.len(), "generator finished");
                    outputs.push(GeneratorOutput {
                        namespace: namespace.to_string(),
                        profiles,
                    });
                }
                Err(e) => {
                    warn!(namespace, error = %e, "profile generator failed");
                }
            }
        }
        outputs
    }

    /// The first preferred profile name reported by an enabled generator.
    pub fn preferred_profile_name(&self, disabled: &HashSet<String>) -> Option<String> {
        self.generators
            .iter()
            .filter(|g| !disabled.contains(g.namespace()))
            .find_map(|g| g.preferred_profile_name())
    }
}

/// One profile per existing shell listed in a shells file (`/etc/shells`).
pub struct ShellListGenerator {
    path: PathBuf,
    preferred: Option<String>,
}

impl ShellListGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            preferred: None,
        }
    }

    /// Prefer the shell called `name` (e.g. `bash`) as the first-run default.
    pub fn with_preferred(mut self, name: impl Into<String>) -> Self {
        self.preferred = Some(name.into());
        self
    }
}

impl ProfileGenerator for ShellListGenerator {
    fn namespace(&self) -> &str {
        SHELLS_NAMESPACE
    }

    fn generate(&self, profiles: &mut Vec<ProfileRecord>) -> Result<()> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading shell list {}", self.path.display()))?;

        let mut seen = HashSet::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let shell = Path::new(line);
            if !shell.is_file() {
                continue;
            }
            let Some(name) = shell.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !seen.insert(name.to_string()) {
                continue;
            }
            let settings = ProfileSettings {
                commandline: Some(line.to_string()),
                ..Default::default()
            };
            profiles.push(generated_profile(SHELLS_NAMESPACE, name, settings));
        }
        Ok(())
    }

    fn preferred_profile_name(&self) -> Option<String> {
        self.preferred.clone()
    }
}

/// One profile per concrete `Host` alias in an ssh client config.
pub struct SshHostGenerator {
    path: PathBuf,
}

impl SshHostGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileGenerator for SshHostGenerator {
    fn namespace(&self) -> &str {
        SSH_NAMESPACE
    }

    fn generate(&self, profiles: &mut Vec<ProfileRecord>) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading ssh config {}", self.path.display()))?;

        let mut seen = HashSet::new();
        for alias in ssh_host_aliases(&content) {
            if !seen.insert(alias.clone()) {
                continue;
            }
            let settings = ProfileSettings {
                commandline: Some(format!("ssh {alias}")),
                ..Default::default()
            };
            profiles.push(generated_profile(SSH_NAMESPACE, &alias, settings));
        }
        Ok(())
    }
}

fn ssh_host_aliases(content: &str) -> Vec<String> {
    let mut aliases = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        let Some((keyword, rest)) = line.split_once(|c: char| c.is_whitespace() || c == '=') else {
            continue;
        };
        if !keyword.eq_ignore_ascii_case("host") {
            continue;
        }
        aliases.extend(
            rest.trim_start_matches(|c: char| c.is_whitespace() || c == '=')
                .split_whitespace()
                .filter(|alias| !alias.contains(['*', '?', '!']))
                .map(str::to_string),
        );
    }
    aliases
}

/// A generator backed by a closure.
pub struct FnGenerator<F> {
    namespace: String,
    preferred: Option<String>,
    generate: F,
}

impl<F> FnGenerator<F>
where
    F: Fn(&mut Vec<ProfileRecord>) -> Result<()> + Send + Sync,
{
    pub fn new(namespace: impl Into<String>, generate: F) -> Self {
        Self {
            namespace: namespace.into(),
            preferred: None,
            generate,
        }
    }

    pub fn with_preferred(mut self, name: impl Into<String>) -> Self {
        self.preferred = Some(name.into());
        self
    }
}

impl<F> ProfileGenerator for FnGenerator<F>
where
    F: Fn(&mut Vec<ProfileRecord>) -> Result<()> + Send + Sync,
{
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn generate(&self, profiles: &mut Vec<ProfileRecord>) -> Result<()> {
        (self.generate)(profiles)
    }

    fn preferred_profile_name(&self) -> Option<String> {
        self.preferred.clone()
    }
}
