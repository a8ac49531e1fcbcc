//! Output formatting for the command line: markdown and JSON.

use crate::error::SettingsWarning;
use crate::model::guid::format_guid;
use crate::model::profile::{Origin, ProfileRecord};
use crate::snapshot::Snapshot;
use serde_json::{Value, json};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::InBox => "in-box",
        Origin::User => "user",
        Origin::Generated => "generated",
        Origin::Fragment => "fragment",
        Origin::ProfilesDefaults => "defaults",
    }
}

/// Format one profile line for lists.
fn format_profile_short(profile: &ProfileRecord, is_default: bool) -> String {
    let marker = if is_default { "* " } else { "" };
    let hidden = if profile.hidden() { " _(hidden)_" } else { "" };
    let source = profile
        .source()
        .map(|s| format!(" [{}]", s))
        .unwrap_or_default();

    format!(
        "- {}{} `{}`{}{}\n",
        marker,
        profile.name(),
        format_guid(&profile.guid()),
        source,
        hidden,
    )
}

/// Format warnings as a markdown section; empty when there are none.
pub fn format_warnings_markdown(warnings: &[SettingsWarning]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let mut md = format!("## Warnings ({})\n\n", warnings.len());
    for warning in warnings {
        md.push_str(&format!("- {}\n", warning));
    }
    md.push('\n');
    md
}

/// Format a snapshot overview as markdown.
pub fn format_snapshot_markdown(snapshot: &Snapshot) -> String {
    let mut md = String::new();

    if let Some(code) = snapshot.load_error() {
        md.push_str(&format!("> **load error**: {}\n\n", code));
    }
    if let Some(message) = snapshot.deserialization_message() {
        md.push_str("> **settings could not be parsed**\n");
        for line in message.lines() {
            md.push_str(&format!("> {}\n", line));
        }
        md.push('\n');
    }

    let profiles = snapshot.all_profiles();
    let default = snapshot.default_profile_id();
    md.push_str(&format!("# Profiles ({})\n\n", profiles.len()));
    for profile in &profiles {
        md.push_str(&format_profile_short(profile, Some(profile.guid()) == default));
    }
    md.push('\n');

    let schemes = snapshot.color_schemes();
    md.push_str(&format!("# Color schemes ({})\n\n", schemes.len()));
    for name in schemes.keys() {
        md.push_str(&format!("- {}\n", name));
    }
    md.push('\n');

    let bindings = snapshot.action_map().key_bindings();
    if !bindings.is_empty() {
        md.push_str(&format!("# Key bindings ({})\n\n", bindings.len()));
        for (chord, command) in &bindings {
            let action = command.action.as_ref().map_or("", |a| a.action.name());
            md.push_str(&format!("- `{}` {}\n", chord.as_str(), action));
        }
        md.push('\n');
    }

    md.push_str(&format_warnings_markdown(snapshot.warnings()));
    md
}

/// Format one profile in detail, with where each value came from.
pub fn format_profile_markdown(snapshot: &Snapshot, profile: &ProfileRecord) -> String {
    let mut md = format!("## Profile: {}\n", profile.name());
    md.push_str(&format!("- **guid**: `{}`\n", format_guid(&profile.guid())));
    md.push_str(&format!("- **origin**: {}\n", origin_label(profile.origin())));

    if let Value::Object(values) = serde_json::to_value(profile.effective()).unwrap_or(Value::Null) {
        for (key, value) in values {
            let from = profile
                .source_of(&key)
                .map(|node| origin_label(snapshot.record(node).origin()))
                .unwrap_or("?");
            md.push_str(&format!("- **{}**: {} _({})_\n", key, value, from));
        }
    }
    md
}

/// A snapshot overview as JSON.
pub fn snapshot_to_json(snapshot: &Snapshot) -> Value {
    let profiles: Vec<Value> = snapshot
        .all_profiles()
        .into_iter()
        .map(|profile| {
            json!({
                "guid": format_guid(&profile.guid()),
                "name": profile.name(),
                "origin": profile.origin(),
                "hidden": profile.hidden(),
                "source": profile.source(),
                "effective": profile.effective(),
            })
        })
        .collect();

    json!({
        "defaultProfile": snapshot.default_profile_id().map(|guid| format_guid(&guid)),
        "profiles": profiles,
        "schemes": snapshot.color_schemes().keys().collect::<Vec<_>>(),
        "warnings": snapshot.warnings(),
        "loadError": snapshot.load_error(),
        "deserializationMessage": snapshot.deserialization_message(),
    })
}

/// Render a snapshot overview in `format`.
pub fn render_snapshot(snapshot: &Snapshot, format: OutputFormat) -> String {
    match format {
        OutputFormat::Markdown => format_snapshot_markdown(snapshot),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&snapshot_to_json(snapshot)).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SettingsLoader;

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }

    #[test]
    fn test_markdown_marks_default_and_hidden() {
        let snapshot = SettingsLoader::new()
            .load_from_str(Some(
                r#"{"defaultProfile": "Shown", "profiles": [{"name": "Shown"}, {"name": "Quiet", "hidden": true}]}"#,
            ))
            .unwrap();
        let md = format_snapshot_markdown(&snapshot);
        assert!(md.contains("- * Shown `{"));
        assert!(md.contains("Quiet `{"));
        assert!(md.contains("_(hidden)_"));
        assert!(md.contains("- Campbell\n"));
    }

    #[test]
    fn test_warnings_section() {
        assert_eq!(format_warnings_markdown(&[]), "");
        let md = format_warnings_markdown(&[SettingsWarning::InvalidIcon]);
        assert!(md.starts_with("## Warnings (1)"));
    }

    #[test]
    fn test_json_overview() {
        let snapshot = SettingsLoader::new()
            .load_from_str(Some(r#"{"profiles": [{"name": "Mine", "colorScheme": "Nope"}]}"#))
            .unwrap();
        let json = snapshot_to_json(&snapshot);
        assert!(json["profiles"].as_array().unwrap().iter().any(|p| p["name"] == "Mine"));
        assert_eq!(json["warnings"][0], "UNKNOWN_COLOR_SCHEME");
    }

    #[test]
    fn test_profile_detail_shows_provenance() {
        let snapshot = SettingsLoader::new()
            .load_from_str(Some(
                r#"{"profiles": {"defaults": {"fontSize": 11}, "list": [{"name": "Mine"}]}}"#,
            ))
            .unwrap();
        let mine = snapshot.all_profiles().into_iter().find(|p| p.name() == "Mine").unwrap();
        let md = format_profile_markdown(&snapshot, mine);
        assert!(md.contains("- **fontSize**: 11.0 _(defaults)_"));
        assert!(md.contains("- **name**: \"Mine\" _(user)_"));
    }
}
