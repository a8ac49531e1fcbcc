//! Reading settings documents.
//!
//! [`json`] wraps `serde_json` with byte-offset aware accessors and
//! [`parser`] turns a whole document into a [`Bundle`](crate::model::Bundle).

pub mod json;
pub mod parser;

pub use json::{JsonObject, SettingValue, line_and_column, parse_document};
pub use parser::{parse, parse_profile};
