//! Global settings, color schemes and actions.

use crate::error::SettingsWarning;
use crate::model::actions::{ActionMap, Command};
use crate::model::profile::Origin;
use crate::model::settings::GlobalSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A named palette. Colors are kept as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,
    #[serde(flatten)]
    pub colors: BTreeMap<String, Value>,
}

impl ColorScheme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ResolvedGlobals {
    effective: GlobalSettings,
    color_schemes: BTreeMap<String, ColorScheme>,
    actions: ActionMap,
}

/// The top-level settings of one document plus the layers below it.
#[derive(Debug, Clone)]
pub struct GlobalsRecord {
    origin: Origin,
    /// Values set in this document.
    pub settings: GlobalSettings,
    color_schemes: BTreeMap<String, ColorScheme>,
    actions: Vec<Command>,
    actions_json: Option<Value>,
    keybinding_warnings: Vec<SettingsWarning>,
    parents: Vec<GlobalsRecord>,
    resolved: Option<ResolvedGlobals>,
}

impl GlobalsRecord {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            settings: GlobalSettings::default(),
            color_schemes: BTreeMap::new(),
            actions: Vec::new(),
            actions_json: None,
            keybinding_warnings: Vec::new(),
            parents: Vec::new(),
            resolved: None,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Add or replace a scheme owned by this layer.
    pub fn add_color_scheme(&mut self, scheme: ColorScheme) {
        self.color_schemes.insert(scheme.name.clone(), scheme);
    }

    /// Store this layer's actions, both parsed and as authored.
    pub fn set_actions(&mut self, authored: Value, commands: Vec<Command>, warnings: Vec<SettingsWarning>) {
        self.actions_json = Some(authored);
        self.actions = commands;
        self.keybinding_warnings = warnings;
    }

    /// The `actions` array exactly as this layer's document wrote it.
    pub fn authored_actions(&self) -> Option<&Value> {
        self.actions_json.as_ref()
    }

    /// Key-binding parse warnings of this layer and every parent.
    pub fn keybinding_warnings(&self) -> Vec<SettingsWarning> {
        let mut warnings: Vec<SettingsWarning> = self
            .parents
            .iter()
            .rev()
            .flat_map(|p| p.keybinding_warnings())
            .collect();
        warnings.extend(self.keybinding_warnings.iter().copied());
        warnings
    }

    /// Make `parent` the highest-precedence parent.
    pub fn prepend_parent(&mut self, parent: GlobalsRecord) {
        self.parents.insert(0, parent);
    }

    /// Resolve effective values, schemes and the action map.
    pub fn finalize(&mut self) {
        for parent in &mut self.parents {
            parent.finalize();
        }

        let mut effective = self.settings.clone();
        let mut color_schemes = BTreeMap::new();
        let mut commands = Vec::new();

        for parent in &self.parents {
            effective.fill_from(parent.effective(), |_| {});
        }
        for parent in self.parents.iter().rev() {
            color_schemes.extend(parent.color_schemes().clone());
            commands.extend(parent.action_map().commands().iter().cloned());
        }
        color_schemes.extend(self.color_schemes.clone());
        commands.extend(self.actions.iter().cloned());

        self.resolved = Some(ResolvedGlobals {
            effective,
            color_schemes,
            actions: ActionMap::new(commands),
        });
    }

    /// Effective values. Before finalization only this layer's own values.
    pub fn effective(&self) -> &GlobalSettings {
        match &self.resolved {
            Some(resolved) => &resolved.effective,
            None => &self.settings,
        }
    }

    pub(crate) fn effective_mut(&mut self) -> Option<&mut GlobalSettings> {
        self.resolved.as_mut().map(|r| &mut r.effective)
    }

    /// Every scheme visible from this layer, by name.
    pub fn color_schemes(&self) -> &BTreeMap<String, ColorScheme> {
        match &self.resolved {
            Some(resolved) => &resolved.color_schemes,
            None => &self.color_schemes,
        }
    }

    pub fn color_scheme(&self, name: &str) -> Option<&ColorScheme> {
        self.color_schemes().get(name)
    }

    /// Schemes declared by this layer only.
    pub fn own_color_schemes(&self) -> &BTreeMap<String, ColorScheme> {
        &self.color_schemes
    }

    pub fn action_map(&self) -> &ActionMap {
        static EMPTY: std::sync::OnceLock<ActionMap> = std::sync::OnceLock::new();
        match &self.resolved {
            Some(resolved) => &resolved.actions,
            None => EMPTY.get_or_init(ActionMap::default),
        }
    }

    pub fn disabled_profile_sources(&self) -> Vec<String> {
        self.effective()
            .disabled_profile_sources
            .clone()
            .unwrap_or_default()
    }

    /// Own values as a document object, with `actions` as authored.
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::to_value(&self.settings).unwrap_or_default();
        if let (Value::Object(map), Some(actions)) = (&mut value, &self.actions_json) {
            map.insert("actions".into(), actions.clone());
        }
        value
    }
}
