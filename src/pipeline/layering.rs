//! Identity-based merging of external profiles onto the user's bundle.

use crate::error::SettingsResult;
use crate::model::guid::format_guid;
use crate::model::profile::{NodeId, ProfileArena};
use crate::model::Bundle;
use crate::pipeline::state::GeneratedProfileStore;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Layer `incoming` records (in-box, generated or fragment profiles) onto `dest`.
///
/// A record that names an update target, or whose own key matches a record
/// already in `dest`, becomes that record's highest-precedence parent. Any
/// other record is reproduced into `dest`. An update target missing from
/// `dest` drops the record. With `fragment_namespace` set, each incoming
/// record's `source` is set to it first.
///
/// Returns the ids of the records appended to `dest`.
pub fn layer_profiles(
    arena: &mut ProfileArena,
    dest: &mut Bundle,
    incoming: &[NodeId],
    fragment_namespace: Option<&str>,
) -> SettingsResult<Vec<NodeId>> {
    let mut appended = Vec::new();

    for &id in incoming {
        if let Some(namespace) = fragment_namespace {
            arena.get_mut(id).settings.source = Some(namespace.to_string());
        }

        let record = arena.get(id);
        let guid = record.guid();

        if let Some(target) = record.updates() {
            match dest.find_target(&target) {
                Some(existing) => {
                    debug!(target = %format_guid(&target), "layering profile update");
                    arena.prepend_parent(existing, id)?;
                }
                None => {
                    debug!(target = %format_guid(&target), "dropping update for unknown profile");
                }
            }
            continue;
        }

        if let Some(existing) = dest.find_target(&guid) {
            debug!(guid = %format_guid(&guid), "layering onto existing profile");
            arena.prepend_parent(existing, id)?;
            continue;
        }

        let copy = arena.reproduce(id);
        if dest.append(arena, copy) {
            appended.push(copy);
        }
    }

    Ok(appended)
}

/// Choices applied only when no user document existed yet.
#[derive(Debug, Clone, Default)]
pub struct FirstRunPolicy {
    /// Default profile when no generator's preferred profile was found.
    pub fallback_default_profile: Option<Uuid>,
    /// Display names for well-known profiles, by key.
    pub display_names: HashMap<Uuid, String>,
}

/// Pick the default profile and apply display names for a fresh document.
pub fn apply_first_run(
    arena: &mut ProfileArena,
    dest: &mut Bundle,
    appended_generated: &[NodeId],
    preferred_name: Option<&str>,
    policy: &FirstRunPolicy,
) {
    let preferred = preferred_name.and_then(|name| {
        appended_generated
            .iter()
            .map(|&id| arena.get(id))
            .find(|record| record.settings.name.as_deref() == Some(name))
            .map(|record| record.guid())
    });

    if let Some(guid) = preferred.or(policy.fallback_default_profile) {
        info!(default_profile = %format_guid(&guid), "choosing first-run default profile");
        dest.globals.settings.default_profile = Some(format_guid(&guid));
    }

    for &id in dest.profiles() {
        let record = arena.get_mut(id);
        if let Some(name) = policy.display_names.get(&record.guid()) {
            record.settings.name = Some(name.clone());
        }
    }
}

/// What the generators produced in one load.
#[derive(Debug, Clone, Default)]
pub struct GeneratedRun {
    /// Generated records appended to the user bundle (not already in it).
    pub appended: Vec<NodeId>,
    /// Keys of every record the generators emitted.
    pub emitted: HashSet<Uuid>,
    /// Namespaces of generators that ran successfully.
    pub namespaces: HashSet<String>,
}

/// Hide generated profiles the user removed, and profiles whose generator
/// no longer produces them, then persist the seen-key set if it grew.
///
/// - An appended record whose key was seen on an earlier run was deleted
///   from the document by the user: it becomes `hidden` and `deleted`.
/// - A document record with a previously seen key, sourced from a generator
///   that ran but did not emit it, is stale: it becomes `hidden` and
///   `deleted` as well.
///
/// Store failures are logged; they never fail the load. A store that cannot
/// be read is not written either.
pub fn prune_generated(
    arena: &mut ProfileArena,
    dest: &Bundle,
    run: &GeneratedRun,
    store: &dyn GeneratedProfileStore,
) {
    let (seen, loaded) = match store.load_generated_ids() {
        Ok(ids) => (ids, true),
        Err(e) => {
            warn!(error = %e, "failed to load generated profile state");
            (BTreeSet::new(), false)
        }
    };

    for &id in &run.appended {
        let record = arena.get_mut(id);
        if seen.contains(&record.guid()) {
            debug!(guid = %format_guid(&record.guid()), "hiding generated profile removed by the user");
            record.settings.hidden = Some(true);
            record.set_deleted(true);
        }
    }

    let appended: HashSet<NodeId> = run.appended.iter().copied().collect();
    for &id in dest.profiles() {
        if appended.contains(&id) {
            continue;
        }
        let record = arena.get(id);
        let guid = record.guid();
        let still_emitted =
            run.emitted.contains(&guid) || record.updates().is_some_and(|u| run.emitted.contains(&u));
        let from_ran_generator = record
            .settings
            .source
            .as_deref()
            .is_some_and(|source| run.namespaces.contains(source));
        if seen.contains(&guid) && !still_emitted && from_ran_generator {
            debug!(guid = %format_guid(&guid), "hiding stale generated profile");
            let record = arena.get_mut(id);
            record.settings.hidden = Some(true);
            record.set_deleted(true);
        }
    }

    // An unreadable store is left as is; saving would drop its keys.
    if !loaded {
        return;
    }
    let mut next = seen.clone();
    next.extend(run.emitted.iter().copied());
    if next.len() > seen.len()
        && let Err(e) = store.save_generated_ids(&next)
    {
        warn!(error = %e, "failed to save generated profile state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::globals::GlobalsRecord;
    use crate::model::guid::{generated_profile_guid, profile_guid_from_name};
    use crate::model::profile::{Origin, ProfileRecord};
    use crate::pipeline::generators::generated_profile;
    use crate::pipeline::state::{JsonStateStore, MemoryStateStore};
    use crate::model::settings::ProfileSettings;

    fn user_bundle(arena: &mut ProfileArena) -> Bundle {
        let defaults = arena.push(ProfileRecord::new(Origin::ProfilesDefaults));
        Bundle::new(GlobalsRecord::new(Origin::User), defaults)
    }

    fn user_profile(arena: &mut ProfileArena, bundle: &mut Bundle, name: &str, guid: Uuid) -> NodeId {
        let mut record = ProfileRecord::new(Origin::User).with_guid(guid);
        record.settings.name = Some(name.to_string());
        let id = arena.push(record);
        bundle.append(arena, id);
        id
    }

    fn generated(arena: &mut ProfileArena, name: &str) -> NodeId {
        let settings = ProfileSettings {
            font_size: Some(11.0),
            ..Default::default()
        };
        arena.push(generated_profile("Gen", name, settings))
    }

    #[test]
    fn test_matching_key_becomes_first_parent() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let guid = generated_profile_guid("Gen", "bash");
        let user = user_profile(&mut arena, &mut dest, "My bash", guid);
        let external = generated(&mut arena, "bash");

        let appended = layer_profiles(&mut arena, &mut dest, &[external], None).unwrap();
        assert!(appended.is_empty());
        assert_eq!(arena.get(user).parents(), &[external]);
    }

    #[test]
    fn test_unknown_key_is_reproduced() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let external = generated(&mut arena, "zsh");

        let appended = layer_profiles(&mut arena, &mut dest, &[external], None).unwrap();
        assert_eq!(appended.len(), 1);
        let copy = arena.get(appended[0]);
        assert_eq!(copy.origin(), Origin::Generated);
        assert_eq!(copy.parents(), &[external]);
        assert!(copy.settings.font_size.is_none());
        assert_eq!(dest.profiles(), &[appended[0]]);
    }

    #[test]
    fn test_update_target_layers_or_drops() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let target = profile_guid_from_name("target");
        let user = user_profile(&mut arena, &mut dest, "target", target);

        let mut update = ProfileRecord::new(Origin::Fragment).with_guid(profile_guid_from_name("u1"));
        update.set_updates(Some(target));
        let update = arena.push(update);
        let mut orphan = ProfileRecord::new(Origin::Fragment).with_guid(profile_guid_from_name("u2"));
        orphan.set_updates(Some(profile_guid_from_name("missing")));
        let orphan = arena.push(orphan);

        let appended = layer_profiles(&mut arena, &mut dest, &[update, orphan], Some("Vendor")).unwrap();
        assert!(appended.is_empty());
        assert_eq!(arena.get(user).parents(), &[update]);
        assert_eq!(arena.get(update).settings.source.as_deref(), Some("Vendor"));
        assert_eq!(dest.profiles().len(), 1);
    }

    #[test]
    fn test_user_update_target_attracts_generated_profile() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let mut record = ProfileRecord::new(Origin::User).with_guid(profile_guid_from_name("Custom"));
        record.settings.name = Some("Custom".into());
        record.set_updates(Some(generated_profile_guid("Gen", "bash")));
        let user = arena.push(record);
        dest.append(&arena, user);

        let external = generated(&mut arena, "bash");
        let appended = layer_profiles(&mut arena, &mut dest, &[external], None).unwrap();
        assert!(appended.is_empty());
        assert_eq!(arena.get(user).parents(), &[external]);
    }

    #[test]
    fn test_first_run_prefers_named_generated_profile() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let a = generated(&mut arena, "sh");
        let b = generated(&mut arena, "bash");
        let appended = layer_profiles(&mut arena, &mut dest, &[a, b], None).unwrap();

        let renamed = generated_profile_guid("Gen", "sh");
        let policy = FirstRunPolicy {
            fallback_default_profile: None,
            display_names: [(renamed, "Bourne shell".to_string())].into(),
        };
        apply_first_run(&mut arena, &mut dest, &appended, Some("bash"), &policy);

        assert_eq!(
            dest.globals.settings.default_profile,
            Some(format_guid(&generated_profile_guid("Gen", "bash")))
        );
        assert_eq!(arena.get(appended[0]).settings.name.as_deref(), Some("Bourne shell"));
    }

    #[test]
    fn test_first_run_fallback() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let fallback = profile_guid_from_name("fallback");
        let policy = FirstRunPolicy {
            fallback_default_profile: Some(fallback),
            ..Default::default()
        };
        apply_first_run(&mut arena, &mut dest, &[], Some("bash"), &policy);
        assert_eq!(dest.globals.settings.default_profile, Some(format_guid(&fallback)));
    }

    fn run_for(arena: &ProfileArena, appended: Vec<NodeId>, emitted: &[NodeId]) -> GeneratedRun {
        GeneratedRun {
            appended,
            emitted: emitted.iter().map(|&id| arena.get(id).guid()).collect(),
            namespaces: ["Gen".to_string()].into(),
        }
    }

    #[test]
    fn test_prune_new_keys_stay_visible_and_are_saved() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let external = generated(&mut arena, "bash");
        let appended = layer_profiles(&mut arena, &mut dest, &[external], None).unwrap();
        let store = MemoryStateStore::new();

        let run = run_for(&arena, appended.clone(), &[external]);
        prune_generated(&mut arena, &dest, &run, &store);

        assert!(!arena.get(appended[0]).deleted());
        assert_eq!(store.ids().len(), 1);
        assert_eq!(store.save_count(), 1);

        // Same keys again: nothing new to save.
        prune_generated(&mut arena, &dest, &run, &store);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_prune_seen_key_appended_again_is_deleted() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let external = generated(&mut arena, "bash");
        let appended = layer_profiles(&mut arena, &mut dest, &[external], None).unwrap();
        let store = MemoryStateStore::with_ids([generated_profile_guid("Gen", "bash")]);

        let run = run_for(&arena, appended.clone(), &[external]);
        prune_generated(&mut arena, &dest, &run, &store);

        let record = arena.get(appended[0]);
        assert!(record.deleted());
        assert_eq!(record.settings.hidden, Some(true));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_prune_stale_document_profile() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let gone = generated_profile_guid("Gen", "csh");
        let stale = user_profile(&mut arena, &mut dest, "csh", gone);
        arena.get_mut(stale).settings.source = Some("Gen".into());
        let mine = user_profile(&mut arena, &mut dest, "mine", profile_guid_from_name("mine"));
        let store = MemoryStateStore::with_ids([gone, profile_guid_from_name("mine")]);

        let run = run_for(&arena, Vec::new(), &[]);
        prune_generated(&mut arena, &dest, &run, &store);

        assert!(arena.get(stale).deleted());
        assert_eq!(arena.get(stale).settings.hidden, Some(true));
        assert!(!arena.get(mine).deleted());
    }

    #[test]
    fn test_prune_leaves_profiles_of_generators_that_did_not_run() {
        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let gone = generated_profile_guid("Gen", "csh");
        let kept = user_profile(&mut arena, &mut dest, "csh", gone);
        arena.get_mut(kept).settings.source = Some("Gen".into());
        let store = MemoryStateStore::with_ids([gone]);

        let run = GeneratedRun::default();
        prune_generated(&mut arena, &dest, &run, &store);
        assert!(!arena.get(kept).deleted());
    }

    #[test]
    fn test_prune_does_not_save_over_unreadable_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ nope").unwrap();
        let store = JsonStateStore::new(&path);

        let mut arena = ProfileArena::new();
        let mut dest = user_bundle(&mut arena);
        let external = generated(&mut arena, "bash");
        let appended = layer_profiles(&mut arena, &mut dest, &[external], None).unwrap();

        let run = run_for(&arena, appended.clone(), &[external]);
        prune_generated(&mut arena, &dest, &run, &store);

        assert!(!arena.get(appended[0]).deleted());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ nope");
    }
}
