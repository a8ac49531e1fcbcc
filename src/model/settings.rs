//! Inheritable setting groups.
//!
//! Every field is an `Option`: `None` means "not set here, ask the parents".
//! The [`inheritable_settings!`] macro generates the struct together with the
//! operations the resolver needs (reading from a document, filling unset
//! fields from a parent and reporting which keys are set).

use crate::document::{JsonObject, SettingValue};
use crate::error::SettingsResult;
use crate::model::guid::Guid;
use serde::{Deserialize, Serialize};

/// Color scheme used when a profile names none, or names one that is missing.
pub const DEFAULT_COLOR_SCHEME: &str = "Campbell";

macro_rules! inheritable_settings {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident: $ty:ty => $key:literal,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(rename = $key, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            /// Document keys of every field, in declaration order.
            pub const KEYS: &'static [&'static str] = &[$($key),*];

            /// Read every known key from `obj`.
            pub fn read(obj: &JsonObject<'_>) -> SettingsResult<Self> {
                Ok(Self {
                    $($field: obj.get::<$ty>($key)?,)*
                })
            }

            /// True when no field is set.
            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())*
            }

            /// Keys of the fields set on this value.
            pub fn set_keys(&self) -> Vec<&'static str> {
                let mut keys = Vec::new();
                $(if self.$field.is_some() {
                    keys.push($key);
                })*
                keys
            }

            /// Fill every unset field from `parent`, calling `filled` with the
            /// key of each field taken over.
            pub fn fill_from(&mut self, parent: &Self, mut filled: impl FnMut(&'static str)) {
                $(if self.$field.is_none() && parent.$field.is_some() {
                    self.$field = parent.$field.clone();
                    filled($key);
                })*
            }

            /// Copy each set field of `source` for which `keep` returns true.
            pub fn copy_where(&mut self, source: &Self, mut keep: impl FnMut(&'static str) -> bool) {
                $(if source.$field.is_some() && keep($key) {
                    self.$field = source.$field.clone();
                })*
            }

            /// Unset the field stored under `key`. Returns whether the key is known.
            pub fn clear(&mut self, key: &str) -> bool {
                match key {
                    $($key => {
                        self.$field = None;
                        true
                    })*
                    _ => false,
                }
            }
        }
    };
}

/// What happens to a pane when its process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseOnExit {
    Graceful,
    Always,
    Never,
}

impl SettingValue for CloseOnExit {
    const EXPECTED: &'static str = "graceful | always | never";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CursorShape {
    Bar,
    Vintage,
    Underscore,
    DoubleUnderscore,
    FilledBox,
    EmptyBox,
}

impl SettingValue for CursorShape {
    const EXPECTED: &'static str = "bar | vintage | underscore | doubleUnderscore | filledBox | emptyBox";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollbarState {
    Visible,
    Hidden,
    Always,
}

impl SettingValue for ScrollbarState {
    const EXPECTED: &'static str = "visible | hidden | always";
}

inheritable_settings! {
    /// Appearance fields that can differ while a pane is unfocused.
    pub struct Appearance {
        color_scheme: String => "colorScheme",
        foreground: String => "foreground",
        background: String => "background",
        selection_background: String => "selectionBackground",
        cursor_color: String => "cursorColor",
        cursor_shape: CursorShape => "cursorShape",
        background_image: String => "backgroundImage",
        background_image_opacity: f64 => "backgroundImageOpacity",
    }
}

impl SettingValue for Appearance {
    const EXPECTED: &'static str = "object";
}

impl Appearance {
    /// The effective color scheme name.
    pub fn color_scheme_name(&self) -> &str {
        self.color_scheme.as_deref().unwrap_or(DEFAULT_COLOR_SCHEME)
    }
}

inheritable_settings! {
    /// Settings a profile record can carry.
    pub struct ProfileSettings {
        name: String => "name",
        source: String => "source",
        hidden: bool => "hidden",
        commandline: String => "commandline",
        starting_directory: String => "startingDirectory",
        icon: String => "icon",
        tab_title: String => "tabTitle",
        tab_color: String => "tabColor",
        suppress_application_title: bool => "suppressApplicationTitle",
        history_size: i32 => "historySize",
        snap_on_input: bool => "snapOnInput",
        close_on_exit: CloseOnExit => "closeOnExit",
        padding: String => "padding",
        use_acrylic: bool => "useAcrylic",
        acrylic_opacity: f64 => "acrylicOpacity",
        scrollbar_state: ScrollbarState => "scrollbarState",
        font_face: String => "fontFace",
        font_size: f64 => "fontSize",
        font_weight: String => "fontWeight",
        color_scheme: String => "colorScheme",
        foreground: String => "foreground",
        background: String => "background",
        selection_background: String => "selectionBackground",
        cursor_color: String => "cursorColor",
        cursor_shape: CursorShape => "cursorShape",
        background_image: String => "backgroundImage",
        background_image_opacity: f64 => "backgroundImageOpacity",
        /// Identifies the connection backend; only meaningful on the record
        /// that declares it.
        connection_type: Guid => "connectionType",
        unfocused_appearance: Appearance => "unfocusedAppearance",
    }
}

impl ProfileSettings {
    /// The focused appearance fields of this profile.
    pub fn default_appearance(&self) -> Appearance {
        Appearance {
            color_scheme: self.color_scheme.clone(),
            foreground: self.foreground.clone(),
            background: self.background.clone(),
            selection_background: self.selection_background.clone(),
            cursor_color: self.cursor_color.clone(),
            cursor_shape: self.cursor_shape,
            background_image: self.background_image.clone(),
            background_image_opacity: self.background_image_opacity,
        }
    }

    /// The unfocused appearance with unset fields taken from the focused one.
    pub fn resolved_unfocused_appearance(&self) -> Option<Appearance> {
        let mut unfocused = self.unfocused_appearance.clone()?;
        unfocused.fill_from(&self.default_appearance(), |_| {});
        Some(unfocused)
    }

    pub fn color_scheme_name(&self) -> &str {
        self.color_scheme.as_deref().unwrap_or(DEFAULT_COLOR_SCHEME)
    }
}

inheritable_settings! {
    /// Top-level application settings.
    pub struct GlobalSettings {
        /// A braced key or a profile name.
        default_profile: String => "defaultProfile",
        disabled_profile_sources: Vec<String> => "disabledProfileSources",
        initial_cols: i32 => "initialCols",
        initial_rows: i32 => "initialRows",
        launch_mode: String => "launchMode",
        theme: String => "theme",
        copy_on_select: bool => "copyOnSelect",
        copy_formatting: bool => "copyFormatting",
        word_delimiters: String => "wordDelimiters",
        always_show_tabs: bool => "alwaysShowTabs",
        show_tabs_in_titlebar: bool => "showTabsInTitlebar",
        confirm_close_all_tabs: bool => "confirmCloseAllTabs",
        tab_width_mode: String => "tabWidthMode",
        always_on_top: bool => "alwaysOnTop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    #[test]
    fn test_read_known_keys() {
        let doc = parse_document(
            r#"{"name": "bash", "fontSize": 11, "closeOnExit": "never", "unknown": 1}"#,
        )
        .unwrap();
        let settings = ProfileSettings::read(&doc).unwrap();
        assert_eq!(settings.name.as_deref(), Some("bash"));
        assert_eq!(settings.font_size, Some(11.0));
        assert_eq!(settings.close_on_exit, Some(CloseOnExit::Never));
        assert_eq!(settings.set_keys(), vec!["name", "closeOnExit", "fontSize"]);
    }

    #[test]
    fn test_bad_enum_value_is_a_mismatch() {
        let doc = parse_document(r#"{"closeOnExit": "sometimes"}"#).unwrap();
        let err = ProfileSettings::read(&doc).unwrap_err();
        assert!(err.to_string().contains("(closeOnExit)"));
        assert!(err.to_string().contains("graceful | always | never"));
    }

    #[test]
    fn test_fill_from_keeps_own_values() {
        let mut own = ProfileSettings {
            name: Some("mine".into()),
            ..Default::default()
        };
        let parent = ProfileSettings {
            name: Some("parent".into()),
            font_size: Some(14.0),
            ..Default::default()
        };
        let mut filled = Vec::new();
        own.fill_from(&parent, |key| filled.push(key));
        assert_eq!(own.name.as_deref(), Some("mine"));
        assert_eq!(own.font_size, Some(14.0));
        assert_eq!(filled, vec!["fontSize"]);
    }

    #[test]
    fn test_unfocused_appearance_falls_back_to_focused() {
        let settings = ProfileSettings {
            color_scheme: Some("One Half Dark".into()),
            cursor_shape: Some(CursorShape::Bar),
            unfocused_appearance: Some(Appearance {
                cursor_shape: Some(CursorShape::EmptyBox),
                ..Default::default()
            }),
            ..Default::default()
        };
        let unfocused = settings.resolved_unfocused_appearance().unwrap();
        assert_eq!(unfocused.cursor_shape, Some(CursorShape::EmptyBox));
        assert_eq!(unfocused.color_scheme_name(), "One Half Dark");
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let settings = ProfileSettings {
            name: Some("Custom".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            serde_json::json!({"name": "Custom"})
        );
    }

    #[test]
    fn test_clear_by_key() {
        let mut settings = ProfileSettings {
            icon: Some("x.png".into()),
            ..Default::default()
        };
        assert!(settings.clear("icon"));
        assert!(settings.icon.is_none());
        assert!(!settings.clear("nope"));
    }
}
