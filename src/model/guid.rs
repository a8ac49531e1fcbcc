//! Profile identity keys.
//!
//! Documents spell keys braced (`{2bde4a90-d05f-401c-9492-e40884ead1d8}`);
//! both braced and plain forms are accepted on input.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Namespace for every deterministic profile key.
pub const TERMINAL_PROFILE_NAMESPACE: Uuid = Uuid::from_u128(0x2bde4a90_d05f_401c_9492_e40884ead1d8);

/// Key for a document profile that only carries a name.
pub fn profile_guid_from_name(name: &str) -> Uuid {
    Uuid::new_v5(&TERMINAL_PROFILE_NAMESPACE, name.as_bytes())
}

/// Key for a profile emitted by the generator registered under `namespace`.
pub fn generated_profile_guid(namespace: &str, name: &str) -> Uuid {
    let generator_ns = Uuid::new_v5(&TERMINAL_PROFILE_NAMESPACE, namespace.as_bytes());
    Uuid::new_v5(&generator_ns, name.as_bytes())
}

/// Render a key the way documents store it.
pub fn format_guid(guid: &Uuid) -> String {
    guid.braced().to_string()
}

/// Parse a braced or plain key.
pub fn parse_guid(text: &str) -> Option<Uuid> {
    Uuid::parse_str(text.trim()).ok()
}

/// A key that serializes in braced form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(pub Uuid);

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced())
    }
}

impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        Guid(value)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_guid(&self.0))
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_guid(&text)
            .map(Guid)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid guid: {text}")))
    }
}

impl crate::document::SettingValue for Guid {
    const EXPECTED: &'static str = "guid string";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_key_is_deterministic() {
        assert_eq!(profile_guid_from_name("bash"), profile_guid_from_name("bash"));
        assert_ne!(profile_guid_from_name("bash"), profile_guid_from_name("zsh"));
    }

    #[test]
    fn test_generated_key_depends_on_namespace() {
        let a = generated_profile_guid("Terminal.App.Shells", "bash");
        let b = generated_profile_guid("Terminal.App.Ssh", "bash");
        assert_ne!(a, b);
        assert_ne!(a, profile_guid_from_name("bash"));
    }

    #[test]
    fn test_braced_round_trip() {
        let guid = profile_guid_from_name("pwsh");
        let text = format_guid(&guid);
        assert!(text.starts_with('{') && text.ends_with('}'));
        assert_eq!(text.len(), 38);
        assert_eq!(parse_guid(&text), Some(guid));
        assert_eq!(parse_guid(&guid.to_string()), Some(guid));
        assert_eq!(parse_guid("not-a-guid"), None);
    }

    #[test]
    fn test_guid_serde_is_braced() {
        let guid = Guid(profile_guid_from_name("pwsh"));
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, format!("\"{}\"", format_guid(&guid.0)));
        let back: Guid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, guid);
    }
}
