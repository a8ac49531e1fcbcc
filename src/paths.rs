//! Path and locator helpers.
//!
//! - Expands `~`, `$VAR`, `${VAR}` and `%VAR%` in user-supplied paths
//! - Classifies media locators (absolute paths, drive paths, URLs)
//! - Writes files atomically via a temp file in the target directory
//! - Is free of settings semantics; callers decide what a failure means

use chrono::Local;
use regex_lite::Regex;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// Special background image value that means "use the desktop wallpaper".
pub const DESKTOP_WALLPAPER: &str = "desktopWallpaper";

fn env_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)|%([A-Za-z_][A-Za-z0-9_()]*)%").ok())
        .as_ref()
}

fn drive_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z]:[\\/]").ok())
        .as_ref()
}

/// Expand a leading `~` and environment variable references.
///
/// Unknown variables are left as written.
pub fn expand_environment(text: &str) -> String {
    let text = match (text.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            format!("{}{}", home.display(), rest)
        }
        _ => text.to_string(),
    };

    let Some(pattern) = env_pattern() else {
        return text;
    };
    pattern
        .replace_all(&text, |caps: &regex_lite::Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_else(|_| whole.to_string())
        })
        .into_owned()
}

/// Whether `locator` names a usable image after environment expansion:
/// an absolute path, a Windows drive or UNC path, or a URL with a scheme.
pub fn is_valid_locator(locator: &str) -> bool {
    let expanded = expand_environment(locator);
    let expanded = expanded.trim();
    if expanded.is_empty() {
        return false;
    }
    if expanded.starts_with('/') || expanded.starts_with("\\\\") {
        return true;
    }
    if drive_pattern().is_some_and(|p| p.is_match(expanded)) {
        return true;
    }
    url::Url::parse(expanded).is_ok()
}

/// Resolve a configured path: expand `~` and variables, then make it
/// absolute relative to `base` and normalize `.` and `..`.
pub fn resolve_path(value: &str, base: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand_environment(value));
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    normalize_path_components(&absolute)
}

/// Normalize path components without requiring the file to exist.
fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else {
                    components.push(Component::ParentDir);
                }
            }
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Sibling backup path for `path`, stamped with the current local time.
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%dT%H-%M-%S");
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{stamp}.backup"));
    PathBuf::from(name)
}

/// Replace `path` with `contents` atomically.
///
/// The data is written to a temp file in the same directory and then renamed
/// over the target, so readers see either the old or the new file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut file = tempfile::NamedTempFile::new_in(&dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
