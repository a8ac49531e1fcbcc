//! Application configuration.
//!
//! Tells the engine where its inputs live. Consolidated from four tiers with
//! field-by-field YAML merging:
//! 1. **Defaults** - compiled in
//! 2. **User** - `~/.config/term-settings/config.yaml`
//! 3. **Project** - `$CWD/term-settings.yaml`
//! 4. **Environment** - variables below
//!
//! ## Environment Variables
//! - `TERM_SETTINGS_CONFIG_PATH` - Explicit config file (replaces user and project tiers)
//! - `TERM_SETTINGS_CONFIG_DIR` - User config dir (default: `~/.config/term-settings`)
//! - `TERM_SETTINGS_DIR` - Directory holding `settings.json` and `state.json`
//! - `TERM_SETTINGS_STATE_FILE` - Generated-profile state file

mod loader;
mod merge;
mod types;
pub mod watcher;

pub use loader::{CONFIG_FILE_NAME, ConfigLoader, ConfigPaths, ConfigTier, PROJECT_CONFIG_FILE_NAME};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
