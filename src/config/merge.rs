//! Field-by-field merging of configuration tiers.
//!
//! Objects merge recursively, everything else is replaced. Arrays are
//! replaced, never concatenated, so a project tier can narrow the fragment
//! roots a user tier lists.

use serde_json::Value;

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// A null overlay keeps the base value: YAML `~` means "not specified".
///
/// # Example
/// ```
/// use serde_json::json;
/// use term_settings::config::deep_merge;
///
/// let user = json!({
///     "generators": { "shells": { "path": "/etc/shells", "preferred": "bash" } },
///     "fragments": { "roots": ["/usr/share/term/fragments", "~/.term/fragments"] }
/// });
/// let project = json!({
///     "generators": { "shells": { "preferred": "zsh" } },
///     "fragments": { "roots": ["./fragments"] }
/// });
/// let merged = deep_merge(user, project);
/// assert_eq!(merged["generators"]["shells"]["path"], "/etc/shells");
/// assert_eq!(merged["generators"]["shells"]["preferred"], "zsh");
/// assert_eq!(merged["fragments"]["roots"], json!(["./fragments"]));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge tiers lowest first; later tiers win.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
