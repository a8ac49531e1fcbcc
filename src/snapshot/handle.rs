//! Shared access to the current snapshot.

use crate::snapshot::Snapshot;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Publishes snapshots to concurrent readers.
///
/// Readers get an `Arc<Snapshot>` that never changes under them. Edits work
/// on a deep copy that replaces the published snapshot when done.
#[derive(Debug)]
pub struct SettingsHandle {
    current: ArcSwap<Snapshot>,
}

impl SettingsHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// The currently published snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replace the published snapshot, e.g. after a reload.
    pub fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Apply `edit` to a copy of the current snapshot and publish the copy.
    ///
    /// If `edit` fails nothing is published.
    pub fn edit<T, E>(&self, edit: impl FnOnce(&mut Snapshot) -> Result<T, E>) -> Result<T, E> {
        let mut copy = Snapshot::clone(&self.current.load());
        let value = edit(&mut copy)?;
        self.current.store(Arc::new(copy));
        Ok(value)
    }
}
