//! The load pipeline: defaults, user document, generators, fragments.

use crate::config::AppConfig;
use crate::document::parse;
use crate::error::{SettingsError, SettingsResult, SettingsWarning};
use crate::model::guid::parse_guid;
use crate::model::profile::{Origin, ProfileArena};
use crate::model::Bundle;
use crate::pipeline::fragments::{DirectoryFragmentSource, FragmentSource};
use crate::pipeline::generators::{GeneratorRegistry, ProfileGenerator, ShellListGenerator, SshHostGenerator};
use crate::pipeline::layering::{FirstRunPolicy, GeneratedRun, apply_first_run, layer_profiles, prune_generated};
use crate::pipeline::state::{GeneratedProfileStore, JsonStateStore, MemoryStateStore};
use crate::snapshot::{Snapshot, SnapshotParts};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Built-in settings shipped with the binary.
pub const DEFAULTS_JSON: &str = include_str!("../../config/defaults.json");

/// Written as the user document when none exists yet.
pub const USER_DEFAULTS_JSON: &str = include_str!("../../config/user-defaults.json");

/// Builds snapshots from the built-in defaults, a user document, generator
/// output and fragment documents.
pub struct SettingsLoader {
    defaults_json: Cow<'static, str>,
    user_template: Cow<'static, str>,
    generators: GeneratorRegistry,
    fragment_sources: Vec<Box<dyn FragmentSource>>,
    state: Box<dyn GeneratedProfileStore>,
    first_run: FirstRunPolicy,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// A loader with the embedded defaults, no generators, no fragments and
    /// an in-memory state store.
    pub fn new() -> Self {
        Self {
            defaults_json: Cow::Borrowed(DEFAULTS_JSON),
            user_template: Cow::Borrowed(USER_DEFAULTS_JSON),
            generators: GeneratorRegistry::new(),
            fragment_sources: Vec::new(),
            state: Box::new(MemoryStateStore::new()),
            first_run: FirstRunPolicy::default(),
        }
    }

    /// A loader wired up from application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut loader = Self::new().with_state_store(JsonStateStore::new(config.state_path()));

        if config.generators.shells.enabled {
            let mut shells = ShellListGenerator::new(&config.generators.shells.path);
            if let Some(preferred) = &config.generators.shells.preferred {
                shells = shells.with_preferred(preferred.clone());
            }
            loader = loader.with_generator(shells);
        }
        if config.generators.ssh.enabled
            && let Some(path) = config.ssh_config_path()
        {
            loader = loader.with_generator(SshHostGenerator::new(path));
        }
        if config.fragments.enabled {
            loader = loader.with_fragment_source(DirectoryFragmentSource::new(config.fragment_roots()));
        }

        loader.with_first_run(config.first_run_policy())
    }

    pub fn with_defaults_json(mut self, json: impl Into<Cow<'static, str>>) -> Self {
        self.defaults_json = json.into();
        self
    }

    pub fn with_user_template(mut self, json: impl Into<Cow<'static, str>>) -> Self {
        self.user_template = json.into();
        self
    }

    pub fn with_generator(mut self, generator: impl ProfileGenerator + 'static) -> Self {
        self.generators.register(generator);
        self
    }

    pub fn with_generators(mut self, generators: GeneratorRegistry) -> Self {
        self.generators = generators;
        self
    }

    pub fn with_fragment_source(mut self, source: impl FragmentSource + 'static) -> Self {
        self.fragment_sources.push(Box::new(source));
        self
    }

    pub fn with_state_store(mut self, store: impl GeneratedProfileStore + 'static) -> Self {
        self.state = Box::new(store);
        self
    }

    pub fn with_first_run(mut self, policy: FirstRunPolicy) -> Self {
        self.first_run = policy;
        self
    }

    /// A snapshot of the built-in defaults alone.
    pub fn load_defaults(&self) -> SettingsResult<Snapshot> {
        let mut arena = ProfileArena::new();
        let bundle = parse(&mut arena, Origin::InBox, &self.defaults_json)?;
        let (mut globals, profile_defaults, profiles, warnings) = bundle.into_parts();

        for &id in &profiles {
            arena.append_parent(id, profile_defaults)?;
        }
        globals.finalize();
        let mut ids = profiles.clone();
        ids.push(profile_defaults);
        arena.finalize(&ids);

        let parts = SnapshotParts {
            arena,
            globals,
            profile_defaults,
            profiles,
            warnings,
        };
        Ok(Snapshot::assemble(parts, false)?)
    }

    /// Run the pipeline over `user_json`.
    ///
    /// `None` means no user document exists: the user template is used and
    /// the first-run choices are applied. Fatal conditions are returned as
    /// errors; see [`SettingsLoader::load_file`] for the degrading variant.
    pub fn load_from_str(&self, user_json: Option<&str>) -> SettingsResult<Snapshot> {
        let first_run = user_json.is_none_or(|s| s.trim().is_empty());
        let user_json = match user_json {
            Some(json) if !first_run => json,
            _ => self.user_template.as_ref(),
        };

        let mut arena = ProfileArena::new();
        let inbox = parse(&mut arena, Origin::InBox, &self.defaults_json)?;
        let mut user = parse(&mut arena, Origin::User, user_json)?;

        let disabled: HashSet<String> = user.globals.disabled_profile_sources().into_iter().collect();

        layer_profiles(&mut arena, &mut user, inbox.profiles(), None)?;

        let mut run = GeneratedRun::default();
        for output in self.generators.run(&disabled) {
            let ids: Vec<_> = output.profiles.into_iter().map(|p| arena.push(p)).collect();
            run.emitted.extend(ids.iter().map(|&id| arena.get(id).guid()));
            run.namespaces.insert(output.namespace);
            run.appended.extend(layer_profiles(&mut arena, &mut user, &ids, None)?);
        }

        if first_run {
            let preferred = self.generators.preferred_profile_name(&disabled);
            apply_first_run(&mut arena, &mut user, &run.appended, preferred.as_deref(), &self.first_run);
        }

        self.layer_fragments(&mut arena, &mut user, &disabled)?;

        for &id in user.profiles() {
            arena.append_parent(id, user.profile_defaults)?;
        }

        prune_generated(&mut arena, &user, &run, self.state.as_ref());

        let (inbox_globals, inbox_defaults, _, _) = inbox.into_parts();
        let (mut globals, profile_defaults, profiles, warnings) = user.into_parts();
        globals.prepend_parent(inbox_globals);
        globals.finalize();
        arena.append_parent(profile_defaults, inbox_defaults)?;

        let mut ids = profiles.clone();
        ids.push(profile_defaults);
        arena.finalize(&ids);

        info!(
            profiles = profiles.len(),
            generated = run.appended.len(),
            first_run,
            "settings resolved"
        );

        let parts = SnapshotParts {
            arena,
            globals,
            profile_defaults,
            profiles,
            warnings,
        };
        Ok(Snapshot::assemble(parts, true)?)
    }

    fn layer_fragments(&self, arena: &mut ProfileArena, user: &mut Bundle, disabled: &HashSet<String>) -> SettingsResult<()> {
        for source in &self.fragment_sources {
            let documents = match source.fragments(disabled) {
                Ok(documents) => documents,
                Err(e) => {
                    warn!(error = %e, "failed to enumerate fragments");
                    continue;
                }
            };
            for document in documents {
                if disabled.contains(&document.namespace) {
                    continue;
                }
                let location = document
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| document.namespace.clone());
                let fragment = match parse(arena, Origin::Fragment, &document.content) {
                    Ok(fragment) => fragment,
                    Err(e) => {
                        warn!(fragment = %location, error = %e, "skipping malformed fragment");
                        continue;
                    }
                };
                debug!(fragment = %location, profiles = fragment.profiles().len(), "layering fragment");
                user.warnings.extend(fragment.warnings.iter().copied());
                layer_profiles(arena, user, fragment.profiles(), Some(&document.namespace))?;
            }
        }
        Ok(())
    }

    /// Load the document at `path`, degrading instead of failing.
    ///
    /// - A missing or empty document triggers a first run; the result is
    ///   written back to `path` (a failed write becomes a warning).
    /// - A malformed document yields the built-in snapshot with the error
    ///   message attached.
    /// - A fatal load error yields the built-in snapshot with the code attached.
    pub fn load_file(&self, path: &Path) -> Snapshot {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read settings");
                return self.fallback().with_deserialization_message(e.to_string());
            }
        };
        let first_run = content.as_deref().is_none_or(|s| s.trim().is_empty());

        match self.load_from_str(content.as_deref()) {
            Ok(mut snapshot) => {
                if first_run {
                    if let Err(e) = snapshot.write_to(path) {
                        warn!(path = %path.display(), error = %e, "failed to write initial settings");
                        snapshot.push_warning(SettingsWarning::FailedToWriteToSettings);
                    } else {
                        info!(path = %path.display(), "wrote initial settings");
                    }
                }
                snapshot
            }
            Err(SettingsError::Load(code)) => {
                warn!(error = %code, "settings unusable, falling back to defaults");
                self.fallback().with_load_error(code)
            }
            Err(e) => {
                warn!(error = %e, "settings could not be parsed, falling back to defaults");
                self.fallback().with_deserialization_message(e.to_string())
            }
        }
    }

    fn fallback(&self) -> Snapshot {
        match self.load_defaults() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "built-in defaults are unusable");
                Snapshot::empty()
            }
        }
    }
}

/// Parse a `defaultProfile`-style reference as a key, if it looks like one.
pub(crate) fn reference_as_guid(reference: &str) -> Option<uuid::Uuid> {
    let reference = reference.trim();
    if reference.len() == 38 && reference.starts_with('{') && reference.ends_with('}') {
        parse_guid(reference)
    } else {
        None
    }
}
