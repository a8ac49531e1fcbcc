//! Settings data model: records, the arena, and resolution.

pub mod actions;
pub mod bundle;
pub mod globals;
pub mod guid;
pub mod profile;
pub mod settings;

pub use actions::{ActionMap, Command, KeyChord, ShortcutAction};
pub use bundle::Bundle;
pub use globals::{ColorScheme, GlobalsRecord};
pub use guid::{Guid, format_guid, generated_profile_guid, parse_guid, profile_guid_from_name};
pub use profile::{NodeId, Origin, ProfileArena, ProfileRecord};
pub use settings::{Appearance, DEFAULT_COLOR_SCHEME, GlobalSettings, ProfileSettings};
