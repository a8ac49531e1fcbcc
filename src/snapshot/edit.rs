//! Editing operations on a snapshot.
//!
//! Edits change own values, re-resolve the affected records and notify the
//! change listener. The load pipeline itself never notifies.

use crate::error::{SettingsError, SettingsResult};
use crate::model::globals::ColorScheme;
use crate::model::guid::format_guid;
use crate::model::profile::{NodeId, Origin, ProfileRecord};
use crate::snapshot::Snapshot;
use crate::snapshot::validate::{find_by_reference, sanitize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// What an edit changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotChange {
    ProfileAdded(Uuid),
    ProfileRenamed { guid: Uuid, name: String },
    DefaultProfileChanged(Uuid),
    ColorSchemeRenamed { old: String, new: String },
}

impl Snapshot {
    fn profile_names(&self) -> HashSet<String> {
        self.all_profiles()
            .into_iter()
            .map(|record| record.name().to_string())
            .collect()
    }

    fn add_profile(&mut self, record: ProfileRecord) -> SettingsResult<Uuid> {
        let guid = record.guid();
        let id = self.arena.push(record);
        if let Some(defaults) = self.profile_defaults {
            self.arena.append_parent(id, defaults)?;
        }
        self.arena.finalize(&[id]);
        self.all_profiles.push(id);
        self.active_profiles.push(id);
        sanitize(self);
        self.notify(SnapshotChange::ProfileAdded(guid));
        Ok(guid)
    }

    /// Add a new profile with a fresh random key.
    ///
    /// Without a name, the first free `Profile N` is used, counting from the
    /// number of profiles plus one. A taken name gets a numeric suffix.
    pub fn create_profile(&mut self, name: Option<&str>) -> SettingsResult<Uuid> {
        let names = self.profile_names();
        let name = match name {
            Some(base) if !names.contains(base) => base.to_string(),
            Some(base) => (2..)
                .map(|n| format!("{base} {n}"))
                .find(|candidate| !names.contains(candidate))
                .unwrap_or_else(|| base.to_string()),
            None => (self.all_profiles.len() + 1..)
                .map(|n| format!("Profile {n}"))
                .find(|candidate| !names.contains(candidate))
                .unwrap_or_else(|| "Profile".to_string()),
        };

        let mut record = ProfileRecord::new(Origin::User).with_guid(Uuid::new_v4());
        record.settings.name = Some(name);
        self.add_profile(record)
    }

    /// Add a copy of the profile with key `source`.
    ///
    /// Every field whose effective value does not come from the
    /// `profiles.defaults` layer is copied, except `hidden`. The unfocused
    /// appearance is copied as a whole and `connectionType` only when the
    /// source itself sets it. The name is `<name> (copy)`, then
    /// `<name> (copy 2)` and so on.
    pub fn duplicate_profile(&mut self, source: &Uuid) -> SettingsResult<Uuid> {
        let source_id = self.node_for(source).ok_or(SettingsError::UnknownProfile(*source))?;
        let source_record = self.arena.get(source_id);

        let names = self.profile_names();
        let base = source_record.name().to_string();
        let name = std::iter::once(format!("{base} (copy)"))
            .chain((2..).map(|n| format!("{base} (copy {n})")))
            .find(|candidate| !names.contains(candidate))
            .unwrap_or_else(|| format!("{base} (copy)"));

        let mut record = ProfileRecord::new(Origin::User).with_guid(Uuid::new_v4());
        let effective = source_record.effective().clone();
        let from_defaults = |node: Option<NodeId>| {
            node.is_some_and(|n| self.arena.get(n).origin() == Origin::ProfilesDefaults)
        };

        record.settings.copy_where(&effective, |key| match key {
            "name" | "hidden" | "guid" | "source" => false,
            "connectionType" => source_record.source_of(key) == Some(source_id),
            _ => !from_defaults(source_record.source_of(key)),
        });
        record.settings.name = Some(name);

        debug!(source = %format_guid(source), "duplicating profile");
        self.add_profile(record)
    }

    /// Rename the profile with key `guid`.
    pub fn rename_profile(&mut self, guid: &Uuid, name: &str) -> SettingsResult<()> {
        let id = self.node_for(guid).ok_or(SettingsError::UnknownProfile(*guid))?;
        self.arena.get_mut(id).rename(name);
        self.notify(SnapshotChange::ProfileRenamed {
            guid: *guid,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Make the profile with key `guid` the default.
    pub fn set_default_profile(&mut self, guid: &Uuid) -> SettingsResult<()> {
        if self.node_for(guid).is_none() {
            return Err(SettingsError::UnknownProfile(*guid));
        }
        let reference = format_guid(guid);
        self.globals.settings.default_profile = Some(reference.clone());
        if let Some(effective) = self.globals.effective_mut() {
            effective.default_profile = Some(reference);
        }
        self.default_profile = Some(*guid);
        self.notify(SnapshotChange::DefaultProfileChanged(*guid));
        Ok(())
    }

    /// Point every own color scheme reference to `old` at `new`.
    ///
    /// Covers `profiles.defaults` and every profile, both appearances.
    pub fn update_color_scheme_references(&mut self, old: &str, new: &str) {
        let mut ids: Vec<NodeId> = self.all_profiles.clone();
        ids.extend(self.profile_defaults);

        for &id in &ids {
            let settings = &mut self.arena.get_mut(id).settings;
            if settings.color_scheme.as_deref() == Some(old) {
                settings.color_scheme = Some(new.to_string());
            }
            if let Some(unfocused) = settings.unfocused_appearance.as_mut()
                && unfocused.color_scheme.as_deref() == Some(old)
            {
                unfocused.color_scheme = Some(new.to_string());
            }
        }

        self.arena.finalize(&ids);
        sanitize(self);
        self.notify(SnapshotChange::ColorSchemeRenamed {
            old: old.to_string(),
            new: new.to_string(),
        });
    }

    /// The profile a "new tab" request should open.
    ///
    /// `profile` may be a braced key or a name; otherwise `index` selects
    /// among active profiles. With neither, the default profile.
    pub fn profile_for_args(&self, profile: Option<&str>, index: Option<i32>) -> Option<&ProfileRecord> {
        if let Some(reference) = profile {
            return find_by_reference(self, reference).and_then(|guid| self.find_profile(&guid));
        }
        if let Some(index) = index {
            return usize::try_from(index)
                .ok()
                .and_then(|i| self.active_profiles.get(i))
                .map(|&id| self.arena.get(id));
        }
        self.default_profile()
    }

    /// The resolved color scheme of `profile`.
    pub fn color_scheme_for_profile(&self, profile: &ProfileRecord) -> Option<&ColorScheme> {
        self.globals.color_scheme(profile.color_scheme_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SettingsLoader;
    use std::sync::{Arc, Mutex};

    const USER: &str = r#"{
        "profiles": {
            "defaults": {"fontSize": 13, "colorScheme": "One Half Dark"},
            "list": [
                {
                    "guid": "{8f6d4b1a-4e59-4b4c-8a3e-7f1d2c3b4a5e}",
                    "name": "Work",
                    "hidden": false,
                    "commandline": "/bin/zsh",
                    "connectionType": "{11111111-2222-3333-4444-555555555555}",
                    "unfocusedAppearance": {"cursorShape": "emptyBox"}
                }
            ]
        }
    }"#;

    fn work_guid() -> Uuid {
        Uuid::parse_str("{8f6d4b1a-4e59-4b4c-8a3e-7f1d2c3b4a5e}").unwrap()
    }

    fn load() -> Snapshot {
        SettingsLoader::new().load_from_str(Some(USER)).unwrap()
    }

    #[test]
    fn test_create_profile_names() {
        let mut snapshot = load();
        let count = snapshot.all_profiles().len();
        let guid = snapshot.create_profile(None).unwrap();
        let created = snapshot.find_profile(&guid).unwrap();
        assert_eq!(created.name(), format!("Profile {}", count + 1));
        assert_eq!(created.effective().font_size, Some(13.0));
        assert!(snapshot.active_profiles().iter().any(|p| p.guid() == guid));

        let again = snapshot.create_profile(Some("Work")).unwrap();
        assert_eq!(snapshot.find_profile(&again).unwrap().name(), "Work 2");
    }

    #[test]
    fn test_duplicate_copies_own_values_only() {
        let mut snapshot = load();
        let copy = snapshot.duplicate_profile(&work_guid()).unwrap();
        let copy = snapshot.find_profile(&copy).unwrap();

        assert_eq!(copy.name(), "Work (copy)");
        assert_eq!(copy.settings.commandline.as_deref(), Some("/bin/zsh"));
        assert!(copy.settings.hidden.is_none());
        assert!(copy.settings.font_size.is_none());
        assert!(copy.settings.color_scheme.is_none());
        assert_eq!(copy.effective().font_size, Some(13.0));
        assert!(copy.settings.connection_type.is_some());
        assert!(copy.settings.unfocused_appearance.is_some());

        let second = snapshot.duplicate_profile(&work_guid()).unwrap();
        assert_eq!(snapshot.find_profile(&second).unwrap().name(), "Work (copy 2)");
    }

    #[test]
    fn test_duplicate_unknown_profile() {
        let mut snapshot = load();
        let err = snapshot.duplicate_profile(&Uuid::nil()).unwrap_err();
        assert!(matches!(err, SettingsError::UnknownProfile(_)));
    }

    #[test]
    fn test_listener_sees_edits() {
        let mut snapshot = load();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        snapshot.set_change_listener(Arc::new(move |change: &SnapshotChange| {
            sink.lock().unwrap().push(change.clone());
        }));

        snapshot.rename_profile(&work_guid(), "Office").unwrap();
        snapshot.set_default_profile(&work_guid()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                SnapshotChange::ProfileRenamed {
                    guid: work_guid(),
                    name: "Office".into()
                },
                SnapshotChange::DefaultProfileChanged(work_guid()),
            ]
        );
        assert_eq!(snapshot.default_profile().unwrap().name(), "Office");
    }

    #[test]
    fn test_update_color_scheme_references() {
        let mut snapshot = load();
        snapshot.update_color_scheme_references("One Half Dark", "Campbell");
        assert_eq!(
            snapshot.profile_defaults().unwrap().settings.color_scheme.as_deref(),
            Some("Campbell")
        );
        let work = snapshot.find_profile(&work_guid()).unwrap();
        assert_eq!(work.color_scheme_name(), "Campbell");
    }

    #[test]
    fn test_profile_for_args() {
        let snapshot = load();
        assert_eq!(snapshot.profile_for_args(Some("Work"), None).unwrap().guid(), work_guid());
        assert_eq!(
            snapshot
                .profile_for_args(Some("{8f6d4b1a-4e59-4b4c-8a3e-7f1d2c3b4a5e}"), None)
                .unwrap()
                .name(),
            "Work"
        );
        assert_eq!(snapshot.profile_for_args(None, Some(0)).unwrap().guid(), work_guid());
        assert!(snapshot.profile_for_args(None, Some(99)).is_none());
        assert!(snapshot.profile_for_args(Some("nobody"), None).is_none());
        assert_eq!(
            snapshot.profile_for_args(None, None).map(|p| p.guid()),
            snapshot.default_profile_id()
        );
    }

    #[test]
    fn test_color_scheme_for_profile() {
        let snapshot = load();
        let work = snapshot.find_profile(&work_guid()).unwrap();
        assert_eq!(
            snapshot.color_scheme_for_profile(work).unwrap().name,
            "One Half Dark"
        );
    }
}
