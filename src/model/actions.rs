//! Commands and key bindings.
//!
//! Parsing is lenient: a malformed entry is dropped and a
//! [`SettingsWarning`] is recorded instead of failing the document.

use crate::error::SettingsWarning;
use regex_lite::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShortcutAction {
    Unbound,
    NewTab,
    SplitPane,
    ClosePane,
    CloseTab,
    CloseWindow,
    CopyText,
    PasteText,
    Find,
    NextTab,
    PrevTab,
    SwitchToTab,
    DuplicateTab,
    SetColorScheme,
    SendInput,
    OpenSettings,
    ToggleFullscreen,
    ScrollUp,
    ScrollDown,
    Quit,
}

impl ShortcutAction {
    pub fn from_name(name: &str) -> Option<Self> {
        let action = match name {
            "unbound" => ShortcutAction::Unbound,
            "newTab" => ShortcutAction::NewTab,
            "splitPane" => ShortcutAction::SplitPane,
            "closePane" => ShortcutAction::ClosePane,
            "closeTab" => ShortcutAction::CloseTab,
            "closeWindow" => ShortcutAction::CloseWindow,
            "copy" => ShortcutAction::CopyText,
            "paste" => ShortcutAction::PasteText,
            "find" => ShortcutAction::Find,
            "nextTab" => ShortcutAction::NextTab,
            "prevTab" => ShortcutAction::PrevTab,
            "switchToTab" => ShortcutAction::SwitchToTab,
            "duplicateTab" => ShortcutAction::DuplicateTab,
            "setColorScheme" => ShortcutAction::SetColorScheme,
            "sendInput" => ShortcutAction::SendInput,
            "openSettings" => ShortcutAction::OpenSettings,
            "toggleFullscreen" => ShortcutAction::ToggleFullscreen,
            "scrollUp" => ShortcutAction::ScrollUp,
            "scrollDown" => ShortcutAction::ScrollDown,
            "quit" => ShortcutAction::Quit,
            _ => return None,
        };
        Some(action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShortcutAction::Unbound => "unbound",
            ShortcutAction::NewTab => "newTab",
            ShortcutAction::SplitPane => "splitPane",
            ShortcutAction::ClosePane => "closePane",
            ShortcutAction::CloseTab => "closeTab",
            ShortcutAction::CloseWindow => "closeWindow",
            ShortcutAction::CopyText => "copy",
            ShortcutAction::PasteText => "paste",
            ShortcutAction::Find => "find",
            ShortcutAction::NextTab => "nextTab",
            ShortcutAction::PrevTab => "prevTab",
            ShortcutAction::SwitchToTab => "switchToTab",
            ShortcutAction::DuplicateTab => "duplicateTab",
            ShortcutAction::SetColorScheme => "setColorScheme",
            ShortcutAction::SendInput => "sendInput",
            ShortcutAction::OpenSettings => "openSettings",
            ShortcutAction::ToggleFullscreen => "toggleFullscreen",
            ShortcutAction::ScrollUp => "scrollUp",
            ShortcutAction::ScrollDown => "scrollDown",
            ShortcutAction::Quit => "quit",
        }
    }
}

/// Terminal launch arguments shared by `newTab` and `splitPane`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTerminalArgs {
    pub profile: Option<String>,
    pub profile_index: Option<i32>,
    pub commandline: Option<String>,
    pub starting_directory: Option<String>,
    pub tab_title: Option<String>,
}

impl NewTerminalArgs {
    fn from_json(obj: &serde_json::Map<String, Value>) -> Self {
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            profile: text("profile"),
            profile_index: obj
                .get("index")
                .and_then(Value::as_i64)
                .and_then(|i| i32::try_from(i).ok()),
            commandline: text("commandline"),
            starting_directory: text("startingDirectory"),
            tab_title: text("tabTitle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    Auto,
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionArgs {
    None,
    NewTab(NewTerminalArgs),
    SplitPane {
        split: SplitDirection,
        size: f64,
        terminal: NewTerminalArgs,
    },
    SwitchToTab { index: u32 },
    SetColorScheme { scheme_name: String },
    SendInput { input: String },
    CopyText { single_line: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionAndArgs {
    pub action: ShortcutAction,
    pub args: ActionArgs,
}

impl ActionAndArgs {
    /// Parse the value of a `command` key: either an action name or an
    /// object with an `action` member and its arguments.
    pub fn from_json(value: &Value, warnings: &mut Vec<SettingsWarning>) -> Option<Self> {
        let empty = serde_json::Map::new();
        let (name, obj) = match value {
            Value::String(name) => (name.as_str(), &empty),
            Value::Object(obj) => (obj.get("action").and_then(Value::as_str)?, obj),
            _ => return None,
        };

        let Some(action) = ShortcutAction::from_name(name) else {
            debug!(action = name, "ignoring unknown action");
            return None;
        };

        let args = match action {
            ShortcutAction::NewTab => ActionArgs::NewTab(NewTerminalArgs::from_json(obj)),
            ShortcutAction::SplitPane => {
                let split = match obj.get("split").and_then(Value::as_str) {
                    Some("vertical") | Some("right") | Some("left") => SplitDirection::Vertical,
                    Some("horizontal") | Some("up") | Some("down") => SplitDirection::Horizontal,
                    _ => SplitDirection::Auto,
                };
                let size = obj.get("size").and_then(Value::as_f64).unwrap_or(0.5);
                if size <= 0.0 || size >= 1.0 {
                    warnings.push(SettingsWarning::InvalidSplitSize);
                    return None;
                }
                ActionArgs::SplitPane {
                    split,
                    size,
                    terminal: NewTerminalArgs::from_json(obj),
                }
            }
            ShortcutAction::SwitchToTab => {
                let Some(index) = obj
                    .get("index")
                    .and_then(Value::as_u64)
                    .and_then(|i| u32::try_from(i).ok())
                else {
                    warnings.push(SettingsWarning::MissingRequiredParameter);
                    return None;
                };
                ActionArgs::SwitchToTab { index }
            }
            ShortcutAction::SetColorScheme => {
                let Some(scheme_name) = obj.get("colorScheme").and_then(Value::as_str) else {
                    warnings.push(SettingsWarning::MissingRequiredParameter);
                    return None;
                };
                ActionArgs::SetColorScheme {
                    scheme_name: scheme_name.to_string(),
                }
            }
            ShortcutAction::SendInput => {
                let Some(input) = obj.get("input").and_then(Value::as_str) else {
                    warnings.push(SettingsWarning::MissingRequiredParameter);
                    return None;
                };
                ActionArgs::SendInput {
                    input: input.to_string(),
                }
            }
            ShortcutAction::CopyText => ActionArgs::CopyText {
                single_line: obj.get("singleLine").and_then(Value::as_bool).unwrap_or(false),
            },
            _ => ActionArgs::None,
        };

        Some(Self { action, args })
    }
}

fn key_chord_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^((?:(?:ctrl|alt|shift|win)\+)*)(f(?:[1-9]|1[0-9]|2[0-4])|numpad_?[0-9]|enter|tab|space|backspace|delete|insert|home|end|pageup|pagedown|up|down|left|right|esc|escape|plus|minus|app|menu|[^\s+]|\+)$",
            )
            .ok()
        })
        .as_ref()
}

/// A normalized key chord such as `ctrl+shift+t`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyChord(String);

impl KeyChord {
    /// Parse and normalize (lowercase, modifiers in ctrl/alt/shift/win order).
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_ascii_lowercase();
        let captures = key_chord_pattern()?.captures(&lowered)?;
        let modifiers = captures.get(1).map_or("", |m| m.as_str());
        let key = captures.get(2)?.as_str();

        let mut normalized = String::new();
        for modifier in ["ctrl", "alt", "shift", "win"] {
            if modifiers.split('+').any(|m| m == modifier) {
                normalized.push_str(modifier);
                normalized.push('+');
            }
        }
        normalized.push_str(key);
        Some(KeyChord(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterateOn {
    None,
    Profiles,
    Schemes,
}

/// A command: an action with optional name and keys, or a named group of
/// nested commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: Option<String>,
    pub keys: Option<KeyChord>,
    pub action: Option<ActionAndArgs>,
    pub iterate_on: IterateOn,
    pub nested: Vec<Command>,
}

impl Command {
    /// Parse one entry of an `actions` array.
    pub fn from_json(value: &Value, warnings: &mut Vec<SettingsWarning>) -> Option<Self> {
        let Value::Object(obj) = value else {
            warnings.push(SettingsWarning::FailedToParseCommandJson);
            return None;
        };

        let name = obj.get("name").and_then(Value::as_str).map(str::to_string);
        let iterate_on = match obj.get("iterateOn").and_then(Value::as_str) {
            Some("profiles") => IterateOn::Profiles,
            Some("schemes") => IterateOn::Schemes,
            _ => IterateOn::None,
        };

        if let Some(nested) = obj.get("commands") {
            let (Value::Array(entries), Some(_)) = (nested, name.as_ref()) else {
                warnings.push(SettingsWarning::FailedToParseCommandJson);
                return None;
            };
            let nested = entries
                .iter()
                .filter_map(|entry| Command::from_json(entry, warnings))
                .collect();
            return Some(Command {
                name,
                keys: None,
                action: None,
                iterate_on,
                nested,
            });
        }

        let keys = match obj.get("keys") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => parse_keys(text, warnings),
            Some(Value::Array(items)) => match items.as_slice() {
                [Value::String(text)] => parse_keys(text, warnings),
                [] => None,
                _ => {
                    warnings.push(SettingsWarning::TooManyKeysForChord);
                    None
                }
            },
            Some(_) => {
                warnings.push(SettingsWarning::FailedToParseCommandJson);
                None
            }
        };

        let action = ActionAndArgs::from_json(obj.get("command")?, warnings)?;

        Some(Command {
            name,
            keys,
            action: Some(action),
            iterate_on,
            nested: Vec::new(),
        })
    }

    /// This command and every nested command, depth first.
    pub fn flatten(&self) -> Vec<&Command> {
        let mut out = vec![self];
        for child in &self.nested {
            out.extend(child.flatten());
        }
        out
    }
}

fn parse_keys(text: &str, warnings: &mut Vec<SettingsWarning>) -> Option<KeyChord> {
    let chord = KeyChord::parse(text);
    if chord.is_none() {
        warnings.push(SettingsWarning::FailedToParseCommandJson);
    }
    chord
}

/// Parse an `actions` array, collecting parse warnings.
pub fn parse_actions(values: &[Value]) -> (Vec<Command>, Vec<SettingsWarning>) {
    let mut warnings = Vec::new();
    let commands = values
        .iter()
        .filter_map(|value| Command::from_json(value, &mut warnings))
        .collect();
    (commands, warnings)
}

/// Commands from every layer, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct ActionMap {
    commands: Vec<Command>,
}

impl ActionMap {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Key bindings in effect. Later definitions win; `unbound` removes.
    pub fn key_bindings(&self) -> BTreeMap<KeyChord, &Command> {
        let mut map = BTreeMap::new();
        for command in &self.commands {
            let (Some(keys), Some(action)) = (&command.keys, &command.action) else {
                continue;
            };
            if action.action == ShortcutAction::Unbound {
                map.remove(keys);
            } else {
                map.insert(keys.clone(), command);
            }
        }
        map
    }

    /// Named commands in effect. Later definitions with the same name win.
    pub fn name_map(&self) -> BTreeMap<&str, &Command> {
        let mut map = BTreeMap::new();
        for command in &self.commands {
            if let Some(name) = command.name.as_deref() {
                map.insert(name, command);
            }
        }
        map
    }

    /// Every `setColorScheme` scheme name that must exist, skipping commands
    /// that iterate on schemes.
    pub fn referenced_schemes(&self) -> Vec<&str> {
        fn visit<'a>(command: &'a Command, out: &mut Vec<&'a str>) {
            if command.iterate_on == IterateOn::Schemes {
                return;
            }
            if let Some(ActionAndArgs {
                args: ActionArgs::SetColorScheme { scheme_name },
                ..
            }) = &command.action
            {
                out.push(scheme_name);
            }
            for child in &command.nested {
                visit(child, out);
            }
        }

        let mut out = Vec::new();
        for command in &self.commands {
            visit(command, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> (Option<Command>, Vec<SettingsWarning>) {
        let mut warnings = Vec::new();
        let command = Command::from_json(&value, &mut warnings);
        (command, warnings)
    }

    #[test]
    fn test_key_chord_normalization() {
        assert_eq!(KeyChord::parse("Shift+Ctrl+T").unwrap().as_str(), "ctrl+shift+t");
        assert_eq!(KeyChord::parse("alt+f4").unwrap().as_str(), "alt+f4");
        assert_eq!(KeyChord::parse("ctrl++").unwrap().as_str(), "ctrl++");
        assert!(KeyChord::parse("ctrl+notakey").is_none());
        assert!(KeyChord::parse("").is_none());
    }

    #[test]
    fn test_simple_binding() {
        let (command, warnings) = parse(json!({"command": "copy", "keys": "ctrl+c"}));
        let command = command.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(command.keys.unwrap().as_str(), "ctrl+c");
        assert_eq!(
            command.action.unwrap().args,
            ActionArgs::CopyText { single_line: false }
        );
    }

    #[test]
    fn test_too_many_keys() {
        let (command, warnings) = parse(json!({"command": "paste", "keys": ["ctrl+v", "shift+insert"]}));
        assert!(command.unwrap().keys.is_none());
        assert_eq!(warnings, vec![SettingsWarning::TooManyKeysForChord]);
    }

    #[test]
    fn test_missing_required_parameter() {
        let (command, warnings) = parse(json!({"command": {"action": "switchToTab"}, "keys": "ctrl+1"}));
        assert!(command.is_none());
        assert_eq!(warnings, vec![SettingsWarning::MissingRequiredParameter]);
    }

    #[test]
    fn test_invalid_split_size() {
        let (command, warnings) = parse(json!({"command": {"action": "splitPane", "size": 1.5}}));
        assert!(command.is_none());
        assert_eq!(warnings, vec![SettingsWarning::InvalidSplitSize]);
    }

    #[test]
    fn test_nested_commands_require_name() {
        let (command, warnings) = parse(json!({"commands": [{"command": "copy"}]}));
        assert!(command.is_none());
        assert_eq!(warnings, vec![SettingsWarning::FailedToParseCommandJson]);

        let (command, _) = parse(json!({
            "name": "Schemes",
            "commands": [{"command": {"action": "setColorScheme", "colorScheme": "Campbell"}}]
        }));
        assert_eq!(command.unwrap().flatten().len(), 2);
    }

    #[test]
    fn test_unbound_removes_binding() {
        let (commands, warnings) = parse_actions(&[
            json!({"command": "copy", "keys": "ctrl+c"}),
            json!({"command": "find", "keys": "ctrl+f"}),
            json!({"command": "unbound", "keys": "ctrl+c"}),
        ]);
        assert!(warnings.is_empty());
        let map = ActionMap::new(commands);
        let bindings = map.key_bindings();
        assert_eq!(bindings.len(), 1);
        assert!(bindings.contains_key(&KeyChord::parse("ctrl+f").unwrap()));
    }

    #[test]
    fn test_referenced_schemes_skip_scheme_iteration() {
        let (commands, _) = parse_actions(&[
            json!({"command": {"action": "setColorScheme", "colorScheme": "Missing"}}),
            json!({
                "name": "${scheme.name}",
                "iterateOn": "schemes",
                "command": {"action": "setColorScheme", "colorScheme": "${scheme.name}"}
            }),
        ]);
        let map = ActionMap::new(commands);
        assert_eq!(map.referenced_schemes(), vec!["Missing"]);
    }
}
