//! Error, fatal-code and warning types for settings loading.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Fatal conditions that abort snapshot construction.
///
/// When one of these is raised the loader falls back to a snapshot built from
/// the in-box defaults only, carrying the code so the caller can surface it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadError {
    NoProfiles,
    AllProfilesHidden,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NoProfiles => write!(f, "no profiles are defined"),
            LoadError::AllProfilesHidden => write!(f, "every profile is hidden"),
        }
    }
}

/// Non-fatal diagnostics accumulated on a snapshot.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingsWarning {
    // Profiles
    DuplicateProfile,
    MissingDefaultProfile,

    // Appearance
    UnknownColorScheme,
    InvalidBackgroundImage,
    InvalidIcon,

    // Key bindings and commands
    AtLeastOneKeybindingWarning,
    TooManyKeysForChord,
    MissingRequiredParameter,
    FailedToParseCommandJson,
    InvalidSplitSize,
    InvalidColorSchemeInCmd,

    // Persistence
    FailedToWriteToSettings,
}

impl SettingsWarning {
    /// Short human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            SettingsWarning::DuplicateProfile => {
                "Found multiple profiles with the same GUID; only the first one is used"
            }
            SettingsWarning::MissingDefaultProfile => {
                "The defaultProfile does not name an active profile; using the first profile"
            }
            SettingsWarning::UnknownColorScheme => {
                "A profile references a color scheme that does not exist"
            }
            SettingsWarning::InvalidBackgroundImage => {
                "A profile has an invalid backgroundImage; it was ignored"
            }
            SettingsWarning::InvalidIcon => "A profile has an invalid icon; it was ignored",
            SettingsWarning::AtLeastOneKeybindingWarning => {
                "Some key bindings could not be parsed"
            }
            SettingsWarning::TooManyKeysForChord => {
                "A key binding lists more than one key chord"
            }
            SettingsWarning::MissingRequiredParameter => {
                "A key binding is missing a required parameter for its action"
            }
            SettingsWarning::FailedToParseCommandJson => "A command could not be parsed",
            SettingsWarning::InvalidSplitSize => {
                "A split pane size must be between 0 and 1 (exclusive)"
            }
            SettingsWarning::InvalidColorSchemeInCmd => {
                "A setColorScheme command references a color scheme that does not exist"
            }
            SettingsWarning::FailedToWriteToSettings => "Failed to write the settings file",
        }
    }

    /// Whether this warning describes a key binding problem.
    pub fn is_keybinding_warning(&self) -> bool {
        matches!(
            self,
            SettingsWarning::TooManyKeysForChord
                | SettingsWarning::MissingRequiredParameter
                | SettingsWarning::FailedToParseCommandJson
                | SettingsWarning::InvalidSplitSize
        )
    }
}

impl fmt::Display for SettingsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors raised while parsing, merging or editing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The document is not well-formed JSON.
    #[error("* Line {line}, Column {column}\n  {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// A known key holds a value of the wrong shape.
    #[error("* Line {line}, Column {column} ({key})\n  Have: {have}\n  Expected: {expected}")]
    TypedMismatch {
        key: String,
        offset: usize,
        line: usize,
        column: usize,
        have: String,
        expected: String,
    },

    #[error("settings could not be loaded: {0}")]
    Load(LoadError),

    #[error("making {parent} a parent of {child} would create an inheritance cycle")]
    InheritanceCycle { child: String, parent: String },

    #[error("profile not found: {0}")]
    UnknownProfile(Uuid),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SettingsError {
    /// True for errors describing a malformed document.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            SettingsError::Syntax { .. } | SettingsError::TypedMismatch { .. }
        )
    }
}

impl From<LoadError> for SettingsError {
    fn from(err: LoadError) -> Self {
        SettingsError::Load(err)
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;
