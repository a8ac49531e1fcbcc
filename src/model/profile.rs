//! Profile records and the arena that owns them.
//!
//! Records reference their parents by [`NodeId`]. A parent list is ordered by
//! precedence: index 0 wins. Resolution walks the graph depth-first, so a
//! record's own values beat everything, then the first parent's effective
//! values, then the second parent's, and so on.

use crate::error::{SettingsError, SettingsResult};
use crate::model::guid::format_guid;
use crate::model::settings::{Appearance, ProfileSettings};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    InBox,
    User,
    Generated,
    Fragment,
    ProfilesDefaults,
}

/// Index of a record in a [`ProfileArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Effective values of a record plus the node each value came from.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub effective: ProfileSettings,
    pub provenance: HashMap<&'static str, NodeId>,
}

/// One profile layer.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    id: Option<NodeId>,
    origin: Origin,
    guid: Option<Uuid>,
    updates: Option<Uuid>,
    deleted: bool,
    parents: Vec<NodeId>,
    /// Values set on this record itself.
    pub settings: ProfileSettings,
    resolved: Option<Resolved>,
}

impl ProfileRecord {
    pub fn new(origin: Origin) -> Self {
        Self {
            id: None,
            origin,
            guid: None,
            updates: None,
            deleted: false,
            parents: Vec::new(),
            settings: ProfileSettings::default(),
            resolved: None,
        }
    }

    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = Some(guid);
        self
    }

    pub fn with_settings(mut self, settings: ProfileSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Arena index, once the record has been pushed.
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    /// Identity key. The profile-defaults record has none and reports nil.
    pub fn guid(&self) -> Uuid {
        self.guid.unwrap_or_else(Uuid::nil)
    }

    pub fn has_guid(&self) -> bool {
        self.guid.is_some()
    }

    pub fn set_guid(&mut self, guid: Option<Uuid>) {
        self.guid = guid;
    }

    /// Key of the record this one explicitly layers onto.
    pub fn updates(&self) -> Option<Uuid> {
        self.updates
    }

    pub fn set_updates(&mut self, updates: Option<Uuid>) {
        self.updates = updates;
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Whether resolution has run for this record.
    pub fn is_finalized(&self) -> bool {
        self.resolved.is_some()
    }

    /// Effective values. Before finalization only the record's own values.
    pub fn effective(&self) -> &ProfileSettings {
        match &self.resolved {
            Some(resolved) => &resolved.effective,
            None => &self.settings,
        }
    }

    pub(crate) fn resolved_mut(&mut self) -> Option<&mut Resolved> {
        self.resolved.as_mut()
    }

    /// The node that contributed the effective value of `key`.
    pub fn source_of(&self, key: &str) -> Option<NodeId> {
        self.resolved
            .as_ref()
            .and_then(|r| r.provenance.get(key).copied())
    }

    pub fn name(&self) -> &str {
        self.effective().name.as_deref().unwrap_or("")
    }

    pub fn hidden(&self) -> bool {
        self.effective().hidden.unwrap_or(false)
    }

    pub fn source(&self) -> Option<&str> {
        self.effective().source.as_deref()
    }

    pub fn color_scheme_name(&self) -> &str {
        self.effective().color_scheme_name()
    }

    pub fn unfocused_appearance(&self) -> Option<Appearance> {
        self.effective().resolved_unfocused_appearance()
    }

    /// Set the name on the record and on its effective values.
    pub fn rename(&mut self, name: &str) {
        self.settings.name = Some(name.to_string());
        let id = self.id;
        if let Some(resolved) = self.resolved.as_mut() {
            resolved.effective.name = Some(name.to_string());
            if let Some(id) = id {
                resolved.provenance.insert("name", id);
            }
        }
    }

    /// Own values as a document object, with `guid` and `updates` braced.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.settings).unwrap_or_default();
        if let serde_json::Value::Object(map) = &mut value {
            if let Some(guid) = &self.guid {
                map.insert("guid".into(), format_guid(guid).into());
            }
            if let Some(updates) = &self.updates {
                map.insert("updates".into(), format_guid(updates).into());
            }
        }
        value
    }
}

/// Owner of every profile record created during one load.
#[derive(Debug, Clone, Default)]
pub struct ProfileArena {
    records: Vec<ProfileRecord>,
}

impl ProfileArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, mut record: ProfileRecord) -> NodeId {
        let id = NodeId(self.records.len());
        record.id = Some(id);
        self.records.push(record);
        id
    }

    pub fn get(&self, id: NodeId) -> &ProfileRecord {
        &self.records[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut ProfileRecord {
        &mut self.records[id.0]
    }

    /// Make `parent` the highest-precedence parent of `child`.
    pub fn prepend_parent(&mut self, child: NodeId, parent: NodeId) -> SettingsResult<()> {
        self.insert_parent(child, 0, parent)
    }

    /// Make `parent` the lowest-precedence parent of `child`.
    pub fn append_parent(&mut self, child: NodeId, parent: NodeId) -> SettingsResult<()> {
        let index = self.get(child).parents.len();
        self.insert_parent(child, index, parent)
    }

    /// Insert `parent` at `index` of `child`'s parent list.
    ///
    /// Fails if `child` is reachable from `parent`, since the edge would close
    /// a cycle.
    pub fn insert_parent(&mut self, child: NodeId, index: usize, parent: NodeId) -> SettingsResult<()> {
        if self.reaches(parent, child) {
            return Err(SettingsError::InheritanceCycle {
                child: self.describe(child),
                parent: self.describe(parent),
            });
        }
        let parents = &mut self.records[child.0].parents;
        let index = index.min(parents.len());
        parents.insert(index, parent);
        Ok(())
    }

    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.records.len()];
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if std::mem::replace(&mut seen[node.0], true) {
                continue;
            }
            stack.extend(self.records[node.0].parents.iter().copied());
        }
        false
    }

    fn describe(&self, id: NodeId) -> String {
        let record = self.get(id);
        match record.guid {
            Some(guid) => format_guid(&guid),
            None => format!("{:?} record #{}", record.origin, id.0),
        }
    }

    /// Create a record that layers over `external` in another bundle.
    ///
    /// The new record keeps the external record's origin, a copy of its own
    /// `name`, `hidden` and `source`, and has it as its single parent.
    pub fn reproduce(&mut self, external: NodeId) -> NodeId {
        let source = self.get(external);
        let mut record = ProfileRecord::new(source.origin);
        record.guid = source.guid;
        record.settings.name = source.settings.name.clone();
        record.settings.hidden = source.settings.hidden;
        record.settings.source = source.settings.source.clone();
        record.parents.push(external);
        self.push(record)
    }

    /// Resolve effective values for `ids` and everything they inherit from.
    ///
    /// Each reachable record is resolved once per call; calling again
    /// recomputes from own values and yields the same result.
    pub fn finalize(&mut self, ids: &[NodeId]) {
        let mut memo: HashMap<NodeId, Resolved> = HashMap::new();
        for &id in ids {
            self.resolve(id, &mut memo);
        }
        for (id, resolved) in memo {
            self.records[id.0].resolved = Some(resolved);
        }
    }

    fn resolve(&self, id: NodeId, memo: &mut HashMap<NodeId, Resolved>) {
        if memo.contains_key(&id) {
            return;
        }
        let record = &self.records[id.0];
        let mut effective = record.settings.clone();
        let mut provenance: HashMap<&'static str, NodeId> = effective
            .set_keys()
            .into_iter()
            .map(|key| (key, id))
            .collect();

        for &parent in &record.parents {
            self.resolve(parent, memo);
            if let Some(parent_resolved) = memo.get(&parent) {
                effective.fill_from(&parent_resolved.effective, |key| {
                    if let Some(node) = parent_resolved.provenance.get(key) {
                        provenance.insert(key, *node);
                    }
                });
            }
        }

        memo.insert(
            id,
            Resolved {
                effective,
                provenance,
            },
        );
    }
}
