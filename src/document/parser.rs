//! Turns a settings document into a [`Bundle`].

use crate::document::json::{JsonObject, parse_document};
use crate::error::SettingsResult;
use crate::model::actions::parse_actions;
use crate::model::globals::{ColorScheme, GlobalsRecord};
use crate::model::guid::profile_guid_from_name;
use crate::model::profile::{Origin, ProfileArena, ProfileRecord};
use crate::model::settings::{GlobalSettings, ProfileSettings};
use crate::model::Bundle;
use serde_json::value::RawValue;
use tracing::debug;
use uuid::Uuid;

const PROFILES_KEY: &str = "profiles";
const DEFAULTS_KEY: &str = "defaults";
const LIST_KEY: &str = "list";
const SCHEMES_KEY: &str = "schemes";
const ACTIONS_KEY: &str = "actions";
const LEGACY_KEYBINDINGS_KEY: &str = "keybindings";

/// Parse `content` into a bundle whose profile records are pushed into `arena`.
///
/// Malformed JSON and known keys holding the wrong kind of value are errors.
/// Profile entries that are not objects with a non-null `guid`, `name` or
/// `updates` target are skipped.
pub fn parse(arena: &mut ProfileArena, origin: Origin, content: &str) -> SettingsResult<Bundle> {
    let root = parse_document(content)?;

    let globals = parse_globals(&root, origin)?;

    let profiles_raw = root.raw(PROFILES_KEY);
    let profiles_obj = root.object(PROFILES_KEY)?;

    let defaults = match &profiles_obj {
        Some(profiles) => profiles.object(DEFAULTS_KEY)?,
        None => None,
    };
    let mut defaults_record = match defaults {
        Some(obj) => parse_profile(&obj, Origin::ProfilesDefaults)?,
        None => ProfileRecord::new(Origin::ProfilesDefaults),
    };
    defaults_record.set_guid(None);
    defaults_record.set_updates(None);
    let defaults_id = arena.push(defaults_record);

    let mut bundle = Bundle::new(globals, defaults_id);

    let entries: Vec<&RawValue> = if root.is_array(PROFILES_KEY) {
        root.array(PROFILES_KEY)?.unwrap_or_default()
    } else if let Some(profiles) = &profiles_obj {
        profiles.array(LIST_KEY)?.unwrap_or_default()
    } else {
        match profiles_raw {
            Some(raw) if root.has_value(PROFILES_KEY) => {
                return Err(root.mismatch(raw, PROFILES_KEY, "array or object"));
            }
            _ => Vec::new(),
        }
    };

    for raw in entries {
        let Some(obj) = JsonObject::from_raw(content, raw, PROFILES_KEY)? else {
            continue;
        };
        if !obj.has_value("guid") && !obj.has_value("name") && !obj.has_value("updates") {
            debug!("skipping profile entry with no guid, name or updates target");
            continue;
        }
        let record = parse_profile(&obj, origin)?;
        let id = arena.push(record);
        bundle.append(arena, id);
    }

    Ok(bundle)
}

/// Build a profile record from one profile object.
///
/// A record without a `guid` gets the key derived from its name, unless it
/// only names an `updates` target.
pub fn parse_profile(obj: &JsonObject<'_>, origin: Origin) -> SettingsResult<ProfileRecord> {
    let settings = ProfileSettings::read(obj)?;
    let guid: Option<Uuid> = obj.get("guid")?;
    let updates: Option<Uuid> = obj.get("updates")?;

    // A pure update entry has no identity of its own.
    let guid = match (guid, settings.name.as_deref(), updates) {
        (Some(guid), _, _) => Some(guid),
        (None, Some(name), _) => Some(profile_guid_from_name(name)),
        (None, None, Some(_)) => None,
        (None, None, None) => Some(profile_guid_from_name("")),
    };

    let mut record = ProfileRecord::new(origin).with_settings(settings);
    record.set_guid(guid);
    record.set_updates(updates);
    Ok(record)
}

fn parse_globals(root: &JsonObject<'_>, origin: Origin) -> SettingsResult<GlobalsRecord> {
    let mut globals = GlobalsRecord::new(origin);
    globals.settings = GlobalSettings::read(root)?;

    for raw in root.array(SCHEMES_KEY)?.unwrap_or_default() {
        let Some(obj) = JsonObject::from_raw(root.source(), raw, SCHEMES_KEY)? else {
            continue;
        };
        if obj.get::<String>("name").ok().flatten().is_none() {
            debug!("skipping color scheme without a name");
            continue;
        }
        match serde_json::from_str::<ColorScheme>(raw.get()) {
            Ok(scheme) => globals.add_color_scheme(scheme),
            Err(e) => debug!(error = %e, "skipping malformed color scheme"),
        }
    }

    let actions_key = if root.contains(ACTIONS_KEY) {
        ACTIONS_KEY
    } else {
        LEGACY_KEYBINDINGS_KEY
    };
    if let Some(raw) = root.raw(actions_key)
        && root.is_array(actions_key)
    {
        let authored: serde_json::Value = serde_json::from_str(raw.get())?;
        let entries = authored.as_array().cloned().unwrap_or_default();
        let (commands, warnings) = parse_actions(&entries);
        globals.set_actions(authored, commands, warnings);
    }

    Ok(globals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SettingsError, SettingsWarning};
    use crate::model::guid::format_guid;

    const GUID_A: &str = "{61c54bbd-c2c6-5271-96e7-009a87ff44bf}";

    #[test]
    fn test_parse_profiles_object_form() {
        let mut arena = ProfileArena::new();
        let doc = format!(
            r#"{{
                "defaultProfile": "{GUID_A}",
                "profiles": {{
                    "defaults": {{ "fontSize": 10, "guid": "{GUID_A}" }},
                    "list": [
                        {{ "guid": "{GUID_A}", "name": "Windows PowerShell" }},
                        {{ "name": "Named only" }},
                        {{ "commandline": "skipped.exe" }},
                        42
                    ]
                }}
            }}"#
        );
        let bundle = parse(&mut arena, Origin::User, &doc).unwrap();

        assert_eq!(bundle.globals.settings.default_profile.as_deref(), Some(GUID_A));
        assert_eq!(bundle.profiles().len(), 2);

        let defaults = arena.get(bundle.profile_defaults);
        assert!(!defaults.has_guid());
        assert_eq!(defaults.origin(), Origin::ProfilesDefaults);
        assert_eq!(defaults.settings.font_size, Some(10.0));

        let named = arena.get(bundle.profiles()[1]);
        assert_eq!(named.guid(), profile_guid_from_name("Named only"));
        assert_eq!(named.origin(), Origin::User);
    }

    #[test]
    fn test_parse_legacy_array_form() {
        let mut arena = ProfileArena::new();
        let bundle = parse(&mut arena, Origin::User, r#"{"profiles": [{"name": "a"}, {"name": "b"}]}"#).unwrap();
        assert_eq!(bundle.profiles().len(), 2);
        assert!(arena.get(bundle.profile_defaults).settings.is_empty());
    }

    #[test]
    fn test_duplicate_guid_in_document() {
        let mut arena = ProfileArena::new();
        let doc = format!(
            r#"{{"profiles": {{"list": [{{"guid": "{GUID_A}", "name": "one"}}, {{"guid": "{GUID_A}", "name": "two"}}]}}}}"#
        );
        let bundle = parse(&mut arena, Origin::User, &doc).unwrap();
        assert_eq!(bundle.profiles().len(), 1);
        assert_eq!(arena.get(bundle.profiles()[0]).name(), "one");
        assert_eq!(bundle.warnings, vec![SettingsWarning::DuplicateProfile]);
    }

    #[test]
    fn test_plain_and_braced_guids_match() {
        let mut arena = ProfileArena::new();
        let plain = GUID_A.trim_matches(|c| c == '{' || c == '}');
        let doc = format!(r#"{{"profiles": [{{"guid": "{plain}", "name": "x"}}]}}"#);
        let bundle = parse(&mut arena, Origin::User, &doc).unwrap();
        assert_eq!(format_guid(&arena.get(bundle.profiles()[0]).guid()), GUID_A);
    }

    #[test]
    fn test_schemes_require_name() {
        let mut arena = ProfileArena::new();
        let bundle = parse(
            &mut arena,
            Origin::User,
            r##"{"schemes": [{"name": "Mine", "background": "#101010"}, {"background": "#000000"}, "x"]}"##,
        )
        .unwrap();
        assert_eq!(bundle.globals.own_color_schemes().len(), 1);
        assert!(bundle.globals.own_color_schemes().contains_key("Mine"));
    }

    #[test]
    fn test_legacy_keybindings_key() {
        let mut arena = ProfileArena::new();
        let bundle = parse(
            &mut arena,
            Origin::User,
            r#"{"keybindings": [{"command": "copy", "keys": "ctrl+c"}]}"#,
        )
        .unwrap();
        assert!(bundle.globals.authored_actions().is_some());
    }

    #[test]
    fn test_wrong_shape_in_profile_is_error() {
        let mut arena = ProfileArena::new();
        let err = parse(
            &mut arena,
            Origin::User,
            "{\n  \"profiles\": [\n    { \"name\": \"x\", \"hidden\": \"yes\" }\n  ]\n}",
        )
        .unwrap_err();
        match err {
            SettingsError::TypedMismatch { key, line, have, expected, .. } => {
                assert_eq!(key, "hidden");
                assert_eq!(line, 3);
                assert_eq!(have, "\"yes\"");
                assert_eq!(expected, "true | false");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_profiles_of_wrong_shape_is_error() {
        let mut arena = ProfileArena::new();
        let err = parse(&mut arena, Origin::User, r#"{"profiles": "x"}"#).unwrap_err();
        match err {
            SettingsError::TypedMismatch { key, have, expected, .. } => {
                assert_eq!(key, "profiles");
                assert_eq!(have, "\"x\"");
                assert_eq!(expected, "array or object");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let bundle = parse(&mut arena, Origin::User, r#"{"profiles": null}"#).unwrap();
        assert!(bundle.profiles().is_empty());
    }

    #[test]
    fn test_null_identity_fields_are_absent() {
        let mut arena = ProfileArena::new();
        let bundle = parse(
            &mut arena,
            Origin::User,
            r#"{"profiles": [{"name": null}, {"name": null, "guid": null}, {"name": "kept"}]}"#,
        )
        .unwrap();
        assert_eq!(bundle.profiles().len(), 1);
        assert_eq!(arena.get(bundle.profiles()[0]).name(), "kept");
        assert!(bundle.warnings.is_empty());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let mut arena = ProfileArena::new();
        let err = parse(&mut arena, Origin::User, "{ \"profiles\": [ }").unwrap_err();
        assert!(matches!(err, SettingsError::Syntax { .. }));
    }
}
