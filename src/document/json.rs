//! Offset-aware access to raw JSON settings documents.
//!
//! Objects are deserialized into maps of borrowed [`RawValue`]s so that every
//! value still points into the original text. That gives us the byte offset of
//! an offending value for free, which is turned into a 1-based line/column
//! when a known key holds a value of the wrong shape.

use crate::error::{SettingsError, SettingsResult};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use std::collections::HashMap;
use uuid::Uuid;

/// A value that can be read from a settings key.
///
/// `EXPECTED` is shown to the user when the document holds something else.
pub trait SettingValue: DeserializeOwned + Clone {
    const EXPECTED: &'static str;
}

macro_rules! setting_value {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(impl SettingValue for $ty {
            const EXPECTED: &'static str = $expected;
        })*
    };
}

setting_value! {
    String => "string",
    bool => "true | false",
    i32 => "integer",
    u32 => "unsigned integer",
    f64 => "number",
    Vec<String> => "array of strings",
    serde_json::Value => "any value",
}

impl SettingValue for Uuid {
    const EXPECTED: &'static str = "guid string";
}

/// Compute the 1-based line and column of a byte offset.
///
/// The column counts bytes from the last newline at or before `offset`.
pub fn line_and_column(source: &str, offset: usize) -> (usize, usize) {
    let bytes = source.as_bytes();
    let mut line = 1;
    let mut line_start = 0;

    for (pos, byte) in bytes.iter().enumerate().take(offset.min(bytes.len())) {
        if *byte == b'\n' {
            line += 1;
            line_start = pos + 1;
        }
    }

    (line, offset - line_start + 1)
}

/// Describe a raw value the way mismatch messages show it.
fn describe_raw(raw: &RawValue) -> String {
    let text = raw.get().trim();
    if text.starts_with('{') || text.starts_with('[') {
        "array or object".to_string()
    } else {
        text.to_string()
    }
}

/// Parse a whole document, returning its root object.
pub fn parse_document(source: &str) -> SettingsResult<JsonObject<'_>> {
    let root: &RawValue = serde_json::from_str(source).map_err(|e| SettingsError::Syntax {
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })?;

    JsonObject::from_raw(source, root, "(root)")?.ok_or_else(|| {
        mismatch(source, root, "(root)", "object")
    })
}

fn mismatch(source: &str, raw: &RawValue, key: &str, expected: &str) -> SettingsError {
    let offset = offset_of(source, raw);
    let (line, column) = line_and_column(source, offset);
    SettingsError::TypedMismatch {
        key: key.to_string(),
        offset,
        line,
        column,
        have: describe_raw(raw),
        expected: expected.to_string(),
    }
}

/// Byte offset of `raw` within `source`.
fn offset_of(source: &str, raw: &RawValue) -> usize {
    let start = source.as_ptr() as usize;
    let value = raw.get().as_ptr() as usize;
    value.saturating_sub(start).min(source.len())
}

fn is_null(raw: &RawValue) -> bool {
    raw.get().trim() == "null"
}

/// A JSON object whose members still borrow the source text.
#[derive(Debug, Clone)]
pub struct JsonObject<'a> {
    source: &'a str,
    fields: HashMap<String, &'a RawValue>,
}

impl<'a> JsonObject<'a> {
    /// Interpret `raw` as an object. Returns `None` if it is not one.
    pub fn from_raw(source: &'a str, raw: &'a RawValue, key: &str) -> SettingsResult<Option<Self>> {
        if !raw.get().trim_start().starts_with('{') {
            return Ok(None);
        }
        let fields: HashMap<String, &'a RawValue> =
            serde_json::from_str(raw.get()).map_err(|_| mismatch(source, raw, key, "object"))?;
        Ok(Some(Self { source, fields }))
    }

    /// An empty object bound to `source`.
    pub fn empty(source: &'a str) -> Self {
        Self {
            source,
            fields: HashMap::new(),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Whether `key` is present (even if `null`).
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Whether `key` holds something other than `null`.
    pub fn has_value(&self, key: &str) -> bool {
        self.raw(key).is_some_and(|raw| !is_null(raw))
    }

    /// The raw value stored under `key`, if any.
    pub fn raw(&self, key: &str) -> Option<&'a RawValue> {
        self.fields.get(key).copied()
    }

    /// Read a typed value. Missing keys and `null` both mean "not set".
    pub fn get<T: SettingValue>(&self, key: &str) -> SettingsResult<Option<T>> {
        self.get_as(key, T::EXPECTED)
    }

    /// Read any deserializable value, describing the expected shape explicitly.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str, expected: &str) -> SettingsResult<Option<T>> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        if is_null(raw) {
            return Ok(None);
        }
        serde_json::from_str(raw.get())
            .map(Some)
            .map_err(|_| mismatch(self.source, raw, key, expected))
    }

    /// Nested object under `key`, if the value is an object.
    pub fn object(&self, key: &str) -> SettingsResult<Option<JsonObject<'a>>> {
        match self.raw(key) {
            Some(raw) => Self::from_raw(self.source, raw, key),
            None => Ok(None),
        }
    }

    /// Elements of the array under `key`, if the value is an array.
    pub fn array(&self, key: &str) -> SettingsResult<Option<Vec<&'a RawValue>>> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        if !raw.get().trim_start().starts_with('[') {
            return Ok(None);
        }
        serde_json::from_str(raw.get())
            .map(Some)
            .map_err(|_| mismatch(self.source, raw, key, "array"))
    }

    /// Whether the value under `key` is an array.
    pub fn is_array(&self, key: &str) -> bool {
        self.raw(key)
            .is_some_and(|raw| raw.get().trim_start().starts_with('['))
    }

    /// Report `raw` (a member of this document) as holding the wrong shape.
    pub fn mismatch(&self, raw: &RawValue, key: &str, expected: &str) -> SettingsError {
        mismatch(self.source, raw, key, expected)
    }

    /// Convert the whole object into an owned JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .filter_map(|(k, raw)| {
                serde_json::from_str(raw.get())
                    .ok()
                    .map(|v: serde_json::Value| (k.clone(), v))
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column_first_line() {
        assert_eq!(line_and_column("{\"a\": 1}", 6), (1, 7));
    }

    #[test]
    fn test_line_and_column_after_newlines() {
        let text = "{\n  \"a\": 1,\n  \"b\": true\n}";
        let offset = text.find("true").unwrap();
        assert_eq!(line_and_column(text, offset), (3, 8));
    }

    #[test]
    fn test_get_reads_typed_values() {
        let doc = parse_document(r#"{"name": "bash", "historySize": 100, "hidden": null}"#).unwrap();
        assert_eq!(doc.get::<String>("name").unwrap().as_deref(), Some("bash"));
        assert_eq!(doc.get::<i32>("historySize").unwrap(), Some(100));
        assert_eq!(doc.get::<bool>("hidden").unwrap(), None);
        assert_eq!(doc.get::<bool>("missing").unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_reports_location() {
        let text = "{\n    \"historySize\": \"lots\"\n}";
        let doc = parse_document(text).unwrap();
        let err = doc.get::<i32>("historySize").unwrap_err();
        match err {
            SettingsError::TypedMismatch {
                key,
                offset,
                line,
                column,
                have,
                expected,
            } => {
                assert_eq!(key, "historySize");
                assert_eq!(offset, text.find("\"lots\"").unwrap());
                assert_eq!((line, column), (2, 20));
                assert_eq!(have, "\"lots\"");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_composite_values_described_generically() {
        let doc = parse_document(r#"{"name": ["a", "b"]}"#).unwrap();
        match doc.get::<String>("name").unwrap_err() {
            SettingsError::TypedMismatch { have, .. } => assert_eq!(have, "array or object"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_document("{\"name\": }").unwrap_err();
        assert!(matches!(err, SettingsError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_root_must_be_object() {
        let err = parse_document("[1, 2]").unwrap_err();
        assert!(matches!(err, SettingsError::TypedMismatch { ref key, .. } if key == "(root)"));
    }

    #[test]
    fn test_nested_object_and_array_access() {
        let doc = parse_document(r#"{"profiles": {"defaults": {"fontSize": 12}, "list": [{}, {}]}}"#)
            .unwrap();
        let profiles = doc.object("profiles").unwrap().unwrap();
        let defaults = profiles.object("defaults").unwrap().unwrap();
        assert_eq!(defaults.get::<f64>("fontSize").unwrap(), Some(12.0));
        assert_eq!(profiles.array("list").unwrap().unwrap().len(), 2);
        assert!(profiles.array("defaults").unwrap().is_none());
    }
}
