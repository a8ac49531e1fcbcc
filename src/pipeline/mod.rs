//! The settings load pipeline.
//!
//! [`loader::SettingsLoader`] drives the stages: parsing, identity merging of
//! in-box, generated and fragment profiles, pruning, and resolution.

pub mod fragments;
pub mod generators;
pub mod layering;
pub mod loader;
pub mod state;

pub use fragments::{
    CatalogExtension, CatalogFragmentSource, DirectoryFragmentSource, FragmentCatalog, FragmentDocument,
    FragmentSource, block_on_worker,
};
pub use generators::{FnGenerator, GeneratorRegistry, ProfileGenerator, ShellListGenerator, SshHostGenerator};
pub use layering::FirstRunPolicy;
pub use loader::SettingsLoader;
pub use state::{GeneratedProfileStore, JsonStateStore, MemoryStateStore};
