//! Post-resolution checks.
//!
//! Checks run in a fixed order. The first two are fatal; the rest degrade
//! the snapshot by clearing effective values and recording one warning per
//! kind. Own values are never touched, so saving keeps what the user wrote.

use crate::error::{LoadError, SettingsWarning};
use crate::paths::{DESKTOP_WALLPAPER, is_valid_locator};
use crate::pipeline::loader::reference_as_guid;
use crate::snapshot::Snapshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Run every check, appending warnings to the snapshot.
pub fn validate(snapshot: &mut Snapshot) -> Result<(), LoadError> {
    check_profiles(snapshot)?;

    let mut warnings = Vec::new();
    warnings.extend(resolve_default_profile(snapshot));
    warnings.extend(validate_color_schemes(snapshot));
    warnings.extend(validate_media_resources(snapshot));
    warnings.extend(validate_keybindings(snapshot));
    warnings.extend(validate_color_scheme_commands(snapshot));

    for warning in &warnings {
        warn!(warning = ?warning, "{}", warning);
    }
    snapshot.warnings.extend(warnings);
    Ok(())
}

/// There must be at least one profile, and at least one visible one.
pub fn check_profiles(snapshot: &Snapshot) -> Result<(), LoadError> {
    if snapshot.all_profiles.is_empty() {
        return Err(LoadError::NoProfiles);
    }
    if snapshot.active_profiles.is_empty() {
        return Err(LoadError::AllProfilesHidden);
    }
    Ok(())
}

/// Resolve `defaultProfile` (a braced key or a profile name) to an active
/// profile, falling back to the first active profile.
pub fn resolve_default_profile(snapshot: &mut Snapshot) -> Option<SettingsWarning> {
    let reference = snapshot.globals.effective().default_profile.clone();
    let resolved = reference.as_deref().and_then(|r| find_by_reference(snapshot, r));

    let is_active = |guid: &Uuid| {
        snapshot
            .active_profiles
            .iter()
            .any(|&id| snapshot.arena.get(id).guid() == *guid)
    };

    match resolved {
        Some(guid) if is_active(&guid) => {
            snapshot.default_profile = Some(guid);
            None
        }
        _ => {
            let first = snapshot
                .active_profiles
                .first()
                .map(|&id| snapshot.arena.get(id).guid());
            debug!(reference = ?reference, "default profile is not an active profile");
            snapshot.default_profile = first;
            Some(SettingsWarning::MissingDefaultProfile)
        }
    }
}

/// A braced key of any profile, else the first profile with that name.
pub(crate) fn find_by_reference(snapshot: &Snapshot, reference: &str) -> Option<Uuid> {
    if let Some(guid) = reference_as_guid(reference) {
        if snapshot.node_for(&guid).is_some() {
            return Some(guid);
        }
    }
    snapshot
        .all_profiles
        .iter()
        .map(|&id| snapshot.arena.get(id))
        .find(|record| record.name() == reference)
        .map(|record| record.guid())
}

/// Clear effective color scheme references that name no known scheme.
pub fn validate_color_schemes(snapshot: &mut Snapshot) -> Option<SettingsWarning> {
    let schemes = snapshot.globals.color_schemes().clone();
    let mut found_invalid = false;

    for &id in &snapshot.all_profiles {
        let Some(resolved) = snapshot.arena.get_mut(id).resolved_mut() else {
            continue;
        };
        let effective = &mut resolved.effective;

        if let Some(name) = &effective.color_scheme
            && !schemes.contains_key(name)
        {
            debug!(scheme = %name, "unknown color scheme");
            effective.color_scheme = None;
            found_invalid = true;
        }

        if let Some(unfocused) = effective.unfocused_appearance.as_mut()
            && let Some(name) = &unfocused.color_scheme
            && !schemes.contains_key(name)
        {
            debug!(scheme = %name, "unknown unfocused color scheme");
            unfocused.color_scheme = None;
            found_invalid = true;
        }
    }

    found_invalid.then_some(SettingsWarning::UnknownColorScheme)
}

/// Clear background images and icons that are not usable locators.
pub fn validate_media_resources(snapshot: &mut Snapshot) -> Vec<SettingsWarning> {
    let image_is_valid = |path: &str| path == DESKTOP_WALLPAPER || is_valid_locator(path);
    // Short icons are glyphs, not paths.
    let icon_is_valid = |icon: &str| icon.chars().count() <= 2 || is_valid_locator(icon);

    let mut invalid_background = false;
    let mut invalid_icon = false;

    for &id in &snapshot.all_profiles {
        let Some(resolved) = snapshot.arena.get_mut(id).resolved_mut() else {
            continue;
        };
        let effective = &mut resolved.effective;

        if effective.background_image.as_deref().is_some_and(|p| !image_is_valid(p)) {
            effective.background_image = None;
            invalid_background = true;
        }
        if let Some(unfocused) = effective.unfocused_appearance.as_mut()
            && unfocused.background_image.as_deref().is_some_and(|p| !image_is_valid(p))
        {
            unfocused.background_image = None;
            invalid_background = true;
        }
        if effective.icon.as_deref().is_some_and(|icon| !icon_is_valid(icon)) {
            effective.icon = None;
            invalid_icon = true;
        }
    }

    let mut warnings = Vec::new();
    if invalid_background {
        warnings.push(SettingsWarning::InvalidBackgroundImage);
    }
    if invalid_icon {
        warnings.push(SettingsWarning::InvalidIcon);
    }
    warnings
}

/// Surface key-binding parse warnings, led by a summary warning.
pub fn validate_keybindings(snapshot: &Snapshot) -> Vec<SettingsWarning> {
    let parse_warnings = snapshot.globals.keybinding_warnings();
    if parse_warnings.is_empty() {
        return Vec::new();
    }
    let mut warnings = vec![SettingsWarning::AtLeastOneKeybindingWarning];
    warnings.extend(parse_warnings);
    warnings
}

/// `setColorScheme` commands must name a known scheme.
pub fn validate_color_scheme_commands(snapshot: &Snapshot) -> Option<SettingsWarning> {
    let schemes = snapshot.globals.color_schemes();
    snapshot
        .globals
        .action_map()
        .referenced_schemes()
        .into_iter()
        .any(|name| !schemes.contains_key(name))
        .then_some(SettingsWarning::InvalidColorSchemeInCmd)
}

/// Re-apply the value-clearing checks after an edit, discarding warnings.
pub(crate) fn sanitize(snapshot: &mut Snapshot) {
    let _ = validate_color_schemes(snapshot);
    let _ = validate_media_resources(snapshot);
}

#[cfg(test)]
mod tests {
    use crate::error::{LoadError, SettingsError, SettingsWarning};
    use crate::pipeline::SettingsLoader;

    fn load(user: &str) -> Result<crate::snapshot::Snapshot, SettingsError> {
        SettingsLoader::new()
            .with_defaults_json(DEFAULTS)
            .load_from_str(Some(user))
    }

    const DEFAULTS: &str = r##"{
        "defaultProfile": "{00000000-0000-0000-0000-000000000001}",
        "schemes": [{"name": "Campbell", "background": "#0C0C0C"}],
        "profiles": {"list": [
            {"guid": "{00000000-0000-0000-0000-000000000001}", "name": "Inbox"}
        ]}
    }"##;

    #[test]
    fn test_all_hidden_is_fatal() {
        let err = load(r#"{"profiles": [{"guid": "{00000000-0000-0000-0000-000000000001}", "hidden": true}]}"#)
            .unwrap_err();
        assert!(matches!(err, SettingsError::Load(LoadError::AllProfilesHidden)));
    }

    #[test]
    fn test_default_profile_fallback() {
        let snapshot = load(
            r#"{
                "defaultProfile": "{99999999-0000-0000-0000-000000000000}",
                "profiles": [{"name": "Mine"}]
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.warnings(), &[SettingsWarning::MissingDefaultProfile]);
        let first_active = snapshot.active_profiles()[0].guid();
        assert_eq!(snapshot.default_profile_id(), Some(first_active));
        assert_eq!(
            snapshot.globals().settings.default_profile.as_deref(),
            Some("{99999999-0000-0000-0000-000000000000}")
        );
    }

    #[test]
    fn test_default_profile_by_name() {
        let snapshot = load(r#"{"defaultProfile": "Mine", "profiles": [{"name": "Mine"}]}"#).unwrap();
        assert!(snapshot.warnings().is_empty());
        assert_eq!(snapshot.default_profile().unwrap().name(), "Mine");
    }

    #[test]
    fn test_unknown_scheme_cleared_but_kept_in_document() {
        let snapshot = load(r#"{"profiles": [{"name": "Mine", "colorScheme": "Nope"}]}"#).unwrap();
        assert_eq!(snapshot.warnings(), &[SettingsWarning::UnknownColorScheme]);
        let mine = snapshot.all_profiles().into_iter().find(|p| p.name() == "Mine").unwrap();
        assert_eq!(mine.color_scheme_name(), "Campbell");
        assert_eq!(mine.settings.color_scheme.as_deref(), Some("Nope"));
    }

    #[test]
    fn test_media_warnings() {
        let snapshot = load(
            r#"{"profiles": [
                {"name": "A", "backgroundImage": "relative.png", "icon": "also/relative.png"},
                {"name": "B", "backgroundImage": "desktopWallpaper", "icon": "⚡"},
                {"name": "C", "unfocusedAppearance": {"backgroundImage": "bad.png"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            snapshot.warnings(),
            &[SettingsWarning::InvalidBackgroundImage, SettingsWarning::InvalidIcon]
        );
        let b = snapshot.all_profiles().into_iter().find(|p| p.name() == "B").unwrap();
        assert_eq!(b.effective().icon.as_deref(), Some("⚡"));
    }

    #[test]
    fn test_keybinding_and_command_warnings_order() {
        let snapshot = load(
            r#"{"actions": [
                {"command": "paste", "keys": ["ctrl+v", "shift+insert"]},
                {"command": {"action": "setColorScheme", "colorScheme": "Missing"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            snapshot.warnings(),
            &[
                SettingsWarning::AtLeastOneKeybindingWarning,
                SettingsWarning::TooManyKeysForChord,
                SettingsWarning::InvalidColorSchemeInCmd,
            ]
        );
    }
}
