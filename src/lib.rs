//! Layered terminal settings.
//!
//! Resolves built-in defaults, a user JSON document, generated profiles and
//! third-party fragments into one validated [`snapshot::Snapshot`].

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod snapshot;
