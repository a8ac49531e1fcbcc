//! Writing a snapshot back out as a user document.

use crate::error::SettingsResult;
use crate::paths::{backup_path, write_atomic};
use crate::snapshot::Snapshot;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::{debug, warn};

impl Snapshot {
    /// The user document for this snapshot.
    ///
    /// Only values set in the user's own layers are written, so inherited
    /// and generated values stay out of the file. Deleted profiles are left
    /// out; color schemes are written in full.
    pub fn to_json(&self) -> Value {
        let mut root = match self.globals.to_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let defaults = self
            .profile_defaults()
            .map(|record| record.to_json())
            .unwrap_or_else(|| json!({}));

        let list: Vec<Value> = self
            .all_profiles()
            .into_iter()
            .filter(|record| !record.deleted())
            .map(|record| record.to_json())
            .collect();

        root.insert(
            "profiles".to_string(),
            json!({
                "defaults": defaults,
                "list": list,
            }),
        );

        let schemes: Vec<Value> = self
            .color_schemes()
            .values()
            .filter_map(|scheme| serde_json::to_value(scheme).ok())
            .collect();
        root.insert("schemes".to_string(), Value::Array(schemes));

        Value::Object(root)
    }

    /// [`Snapshot::to_json`] rendered with four-space indentation.
    pub fn to_json_string(&self) -> SettingsResult<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.to_json().serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Write the user document to `path`.
    ///
    /// An existing document is first copied to a timestamped backup next to
    /// it; an existing backup of the same name is never overwritten and a
    /// failed backup is only logged. The document itself is replaced
    /// atomically.
    pub fn write_to(&self, path: &Path) -> SettingsResult<()> {
        let content = self.to_json_string()?;

        if path.exists() {
            let backup = backup_path(path);
            if backup.exists() {
                debug!(backup = %backup.display(), "backup already exists");
            } else if let Err(e) = std::fs::copy(path, &backup) {
                warn!(backup = %backup.display(), error = %e, "failed to back up settings");
            }
        }

        write_atomic(path, content.as_bytes())?;
        Ok(())
    }
}
