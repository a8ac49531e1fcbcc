//! The records parsed from one document.

use crate::error::SettingsWarning;
use crate::model::globals::GlobalsRecord;
use crate::model::profile::{NodeId, ProfileArena};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Globals, profile defaults and the ordered profile list of one document.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub globals: GlobalsRecord,
    pub profile_defaults: NodeId,
    profiles: Vec<NodeId>,
    by_guid: HashMap<Uuid, NodeId>,
    by_update_target: HashMap<Uuid, NodeId>,
    pub warnings: Vec<SettingsWarning>,
}

impl Bundle {
    pub fn new(globals: GlobalsRecord, profile_defaults: NodeId) -> Self {
        Self {
            globals,
            profile_defaults,
            profiles: Vec::new(),
            by_guid: HashMap::new(),
            by_update_target: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn profiles(&self) -> &[NodeId] {
        &self.profiles
    }

    /// Append `id` unless its key is already present, in which case a
    /// duplicate warning is recorded and `false` returned. Records without
    /// a key are always appended.
    pub fn append(&mut self, arena: &ProfileArena, id: NodeId) -> bool {
        let record = arena.get(id);
        if record.has_guid() {
            let guid = record.guid();
            if self.by_guid.contains_key(&guid) {
                warn!(guid = %guid.braced(), "dropping profile with duplicate guid");
                self.warnings.push(SettingsWarning::DuplicateProfile);
                return false;
            }
            self.by_guid.insert(guid, id);
        }
        if let Some(target) = record.updates() {
            self.by_update_target.entry(target).or_insert(id);
        }
        self.profiles.push(id);
        true
    }

    /// The record with key `guid`.
    pub fn find(&self, guid: &Uuid) -> Option<NodeId> {
        self.by_guid.get(guid).copied()
    }

    /// The record an external record with key `guid` should layer onto:
    /// the record with that key, or the record declaring it as its update
    /// target.
    pub fn find_target(&self, guid: &Uuid) -> Option<NodeId> {
        self.find(guid)
            .or_else(|| self.by_update_target.get(guid).copied())
    }

    /// Split into globals, profile defaults, profile list and warnings.
    pub fn into_parts(self) -> (GlobalsRecord, NodeId, Vec<NodeId>, Vec<SettingsWarning>) {
        (self.globals, self.profile_defaults, self.profiles, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::guid::profile_guid_from_name;
    use crate::model::profile::{Origin, ProfileRecord};

    fn bundle(arena: &mut ProfileArena) -> Bundle {
        let defaults = arena.push(ProfileRecord::new(Origin::ProfilesDefaults));
        Bundle::new(GlobalsRecord::new(Origin::User), defaults)
    }

    #[test]
    fn test_duplicate_key_rejected_with_warning() {
        let mut arena = ProfileArena::new();
        let mut bundle = bundle(&mut arena);
        let guid = profile_guid_from_name("bash");
        let first = arena.push(ProfileRecord::new(Origin::User).with_guid(guid));
        let second = arena.push(ProfileRecord::new(Origin::User).with_guid(guid));

        assert!(bundle.append(&arena, first));
        assert!(!bundle.append(&arena, second));
        assert_eq!(bundle.profiles(), &[first]);
        assert_eq!(bundle.warnings, vec![SettingsWarning::DuplicateProfile]);
    }

    #[test]
    fn test_find_target_follows_update_target() {
        let mut arena = ProfileArena::new();
        let mut bundle = bundle(&mut arena);
        let generated = profile_guid_from_name("generated");
        let mut record = ProfileRecord::new(Origin::User).with_guid(profile_guid_from_name("Custom"));
        record.set_updates(Some(generated));
        let id = arena.push(record);
        bundle.append(&arena, id);

        assert_eq!(bundle.find(&generated), None);
        assert_eq!(bundle.find_target(&generated), Some(id));
    }
}
