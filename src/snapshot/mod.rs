//! Resolved, validated settings.
//!
//! A [`Snapshot`] owns every record of one load. Cloning it is a deep copy,
//! which is what [`SettingsHandle::edit`] relies on.

pub mod edit;
pub mod handle;
pub mod serialize;
pub mod validate;

pub use edit::SnapshotChange;
pub use handle::SettingsHandle;

use crate::error::{LoadError, SettingsWarning};
use crate::model::actions::ActionMap;
use crate::model::globals::{ColorScheme, GlobalsRecord};
use crate::model::profile::{NodeId, Origin, ProfileArena, ProfileRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Called by edit operations after they change a snapshot.
pub type ChangeListener = Arc<dyn Fn(&SnapshotChange) + Send + Sync>;

/// The pieces the pipeline hands over once resolution is done.
pub struct SnapshotParts {
    pub arena: ProfileArena,
    pub globals: GlobalsRecord,
    pub profile_defaults: NodeId,
    pub profiles: Vec<NodeId>,
    pub warnings: Vec<SettingsWarning>,
}

#[derive(Clone)]
pub struct Snapshot {
    pub(crate) arena: ProfileArena,
    pub(crate) globals: GlobalsRecord,
    pub(crate) profile_defaults: Option<NodeId>,
    pub(crate) all_profiles: Vec<NodeId>,
    pub(crate) active_profiles: Vec<NodeId>,
    pub(crate) default_profile: Option<Uuid>,
    pub(crate) warnings: Vec<SettingsWarning>,
    pub(crate) load_error: Option<LoadError>,
    pub(crate) deserialization_message: Option<String>,
    pub(crate) listener: Option<ChangeListener>,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("profiles", &self.all_profiles.len())
            .field("active", &self.active_profiles.len())
            .field("default_profile", &self.default_profile)
            .field("warnings", &self.warnings)
            .field("load_error", &self.load_error)
            .field("deserialization_message", &self.deserialization_message)
            .finish()
    }
}

impl Snapshot {
    /// Build a snapshot from resolved parts.
    ///
    /// With `validate` the full validator runs and records warnings;
    /// otherwise only the fatal checks and default-profile resolution run.
    pub fn assemble(parts: SnapshotParts, validate: bool) -> Result<Self, LoadError> {
        let mut snapshot = Self {
            arena: parts.arena,
            globals: parts.globals,
            profile_defaults: Some(parts.profile_defaults),
            all_profiles: parts.profiles,
            active_profiles: Vec::new(),
            default_profile: None,
            warnings: parts.warnings,
            load_error: None,
            deserialization_message: None,
            listener: None,
        };
        snapshot.refresh_active();

        if validate {
            validate::validate(&mut snapshot)?;
        } else {
            validate::check_profiles(&snapshot)?;
            validate::resolve_default_profile(&mut snapshot);
        }
        Ok(snapshot)
    }

    /// A snapshot with no profiles at all.
    pub fn empty() -> Self {
        let mut globals = GlobalsRecord::new(Origin::InBox);
        globals.finalize();
        Self {
            arena: ProfileArena::new(),
            globals,
            profile_defaults: None,
            all_profiles: Vec::new(),
            active_profiles: Vec::new(),
            default_profile: None,
            warnings: Vec::new(),
            load_error: Some(LoadError::NoProfiles),
            deserialization_message: None,
            listener: None,
        }
    }

    /// Attach a fatal code; used for the built-in fallback snapshot.
    pub fn with_load_error(mut self, code: LoadError) -> Self {
        self.load_error = Some(code);
        self
    }

    /// Attach the rendered parse error of the user document.
    pub fn with_deserialization_message(mut self, message: impl Into<String>) -> Self {
        self.deserialization_message = Some(message.into());
        self
    }

    pub fn set_change_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    pub(crate) fn notify(&self, change: SnapshotChange) {
        if let Some(listener) = &self.listener {
            listener(&change);
        }
    }

    pub(crate) fn refresh_active(&mut self) {
        self.active_profiles = self
            .all_profiles
            .iter()
            .copied()
            .filter(|&id| !self.arena.get(id).hidden())
            .collect();
    }

    pub fn push_warning(&mut self, warning: SettingsWarning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[SettingsWarning] {
        &self.warnings
    }

    pub fn load_error(&self) -> Option<LoadError> {
        self.load_error
    }

    pub fn deserialization_message(&self) -> Option<&str> {
        self.deserialization_message.as_deref()
    }

    pub fn globals(&self) -> &GlobalsRecord {
        &self.globals
    }

    pub fn color_schemes(&self) -> &BTreeMap<String, ColorScheme> {
        self.globals.color_schemes()
    }

    pub fn action_map(&self) -> &ActionMap {
        self.globals.action_map()
    }

    /// Every profile, including hidden ones.
    pub fn all_profiles(&self) -> Vec<&ProfileRecord> {
        self.all_profiles.iter().map(|&id| self.arena.get(id)).collect()
    }

    /// Profiles that are not hidden.
    pub fn active_profiles(&self) -> Vec<&ProfileRecord> {
        self.active_profiles.iter().map(|&id| self.arena.get(id)).collect()
    }

    /// The `profiles.defaults` record.
    pub fn profile_defaults(&self) -> Option<&ProfileRecord> {
        self.profile_defaults.map(|id| self.arena.get(id))
    }

    pub fn default_profile_id(&self) -> Option<Uuid> {
        self.default_profile
    }

    pub fn default_profile(&self) -> Option<&ProfileRecord> {
        self.default_profile.and_then(|guid| self.find_profile(&guid))
    }

    /// Look up any profile by key.
    pub fn find_profile(&self, guid: &Uuid) -> Option<&ProfileRecord> {
        self.node_for(guid).map(|id| self.arena.get(id))
    }

    pub(crate) fn node_for(&self, guid: &Uuid) -> Option<NodeId> {
        self.all_profiles
            .iter()
            .copied()
            .find(|&id| self.arena.get(id).guid() == *guid)
    }

    /// The record that contributed `node`, e.g. from [`ProfileRecord::source_of`].
    pub fn record(&self, node: NodeId) -> &ProfileRecord {
        self.arena.get(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_reports_no_profiles() {
        let snapshot = Snapshot::empty();
        assert_eq!(snapshot.load_error(), Some(LoadError::NoProfiles));
        assert!(snapshot.all_profiles().is_empty());
        assert!(snapshot.default_profile().is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = crate::pipeline::SettingsLoader::new().load_defaults().unwrap();
        let mut copy = original.clone();
        let guid = copy.all_profiles()[0].guid();
        copy.rename_profile(&guid, "Renamed").unwrap();
        assert_ne!(original.find_profile(&guid).unwrap().name(), "Renamed");
        assert_eq!(copy.find_profile(&guid).unwrap().name(), "Renamed");
    }
}
