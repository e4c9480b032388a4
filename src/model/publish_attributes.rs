use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{CreateError, CreateResult};
use crate::model::{
    AttributeChanges, AttributeValues, DataMap, PublishAttributeValues, ValueChange,
};
use crate::plugin::PublishPluginRef;

/// Change of one publish plugin entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginChanges {
    /// Values of the plugin changed
    Values(AttributeChanges),
    /// Plugin entry was removed entirely
    Removed(ValueChange),
}

pub type PublishAttributeChanges = IndexMap<String, PluginChanges>;

/// Changes of context data that are not related to any instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextChanges {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub publish_attributes: PublishAttributeChanges,
}

impl ContextChanges {
    pub fn is_empty(&self) -> bool {
        self.publish_attributes.is_empty()
    }
}

/// Attribute values of multiple publish plugins, keyed by plugin name.
///
/// Stored values of plugins that are not available anymore are kept as
/// "missing" entries until they are explicitly popped.
#[derive(Clone)]
pub struct PublishAttributes {
    origin_data: DataMap,
    data: IndexMap<String, PublishAttributeValues>,
    plugin_names_order: Vec<String>,
    missing_plugins: Vec<String>,
    attr_plugins: Vec<PublishPluginRef>,
}

fn object_or_empty(value: Option<&Value>) -> DataMap {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => DataMap::new(),
    }
}

impl PublishAttributes {
    pub fn new(origin_data: DataMap, attr_plugins: &[PublishPluginRef]) -> Self {
        let mut output = Self {
            origin_data: origin_data.clone(),
            data: IndexMap::new(),
            plugin_names_order: Vec::new(),
            missing_plugins: Vec::new(),
            attr_plugins: Vec::new(),
        };
        output.rebuild(origin_data, attr_plugins);
        output
    }

    pub fn empty() -> Self {
        Self::new(DataMap::new(), &[])
    }

    /// Re-derive plugin entries for a new set of publish plugins.
    pub fn set_publish_plugins(&mut self, attr_plugins: &[PublishPluginRef]) {
        let current: DataMap = self
            .data
            .iter()
            .map(|(key, values)| (key.clone(), Value::Object(values.raw_data())))
            .collect();
        self.rebuild(current, attr_plugins);
    }

    fn rebuild(&mut self, mut data: DataMap, attr_plugins: &[PublishPluginRef]) {
        self.plugin_names_order.clear();
        self.missing_plugins.clear();
        self.attr_plugins = attr_plugins.to_vec();
        self.data.clear();

        let mut added_keys = HashSet::new();
        for plugin in attr_plugins {
            plugin.convert_attribute_values(&mut data);
            let attr_defs = plugin.get_attribute_defs();
            if attr_defs.is_empty() {
                continue;
            }

            let key = plugin.name().to_string();
            added_keys.insert(key.clone());
            self.plugin_names_order.push(key.clone());

            let value = object_or_empty(data.get(&key));
            let origin_value = object_or_empty(self.origin_data.get(&key));
            self.data.insert(
                key.clone(),
                PublishAttributeValues::new(
                    key,
                    AttributeValues::new(attr_defs, value, Some(origin_value)),
                ),
            );
        }

        for (key, value) in &data {
            if added_keys.contains(key) {
                continue;
            }
            self.missing_plugins.push(key.clone());
            let origin_value = object_or_empty(self.origin_data.get(key));
            self.data.insert(
                key.clone(),
                PublishAttributeValues::new(
                    key.clone(),
                    AttributeValues::new(Vec::new(), object_or_empty(Some(value)), Some(origin_value)),
                ),
            );
        }
    }

    pub fn get(&self, key: &str) -> Option<&PublishAttributeValues> {
        self.data.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PublishAttributeValues> {
        self.data.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &PublishAttributeValues> {
        self.data.values()
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &PublishAttributeValues)> {
        self.data.iter().map(|(key, values)| (key.as_str(), values))
    }

    /// Plugin names in the order plugins were passed.
    pub fn plugin_names_order(&self) -> &[String] {
        &self.plugin_names_order
    }

    pub fn missing_plugins(&self) -> &[String] {
        &self.missing_plugins
    }

    pub fn attr_plugins(&self) -> &[PublishPluginRef] {
        &self.attr_plugins
    }

    /// Reset values of an available plugin, or drop data of a missing one.
    ///
    /// Returns the values the plugin had before.
    pub fn pop(&mut self, key: &str) -> Option<DataMap> {
        if !self.data.contains_key(key) {
            return None;
        }

        if let Some(position) = self.missing_plugins.iter().position(|name| name == key) {
            self.missing_plugins.remove(position);
            return self
                .data
                .shift_remove(key)
                .map(|values| values.data_to_store());
        }

        let values = self.data.get_mut(key)?;
        let output = values.data_to_store();
        values.reset_values();
        Some(output)
    }

    pub fn mark_as_stored(&mut self) {
        let mut origin_data = DataMap::new();
        for (key, values) in self.data.iter_mut() {
            values.mark_as_stored();
            origin_data.insert(key.clone(), Value::Object(values.raw_data()));
        }
        self.origin_data = origin_data;
    }

    pub fn data_to_store(&self) -> DataMap {
        self.data
            .iter()
            .map(|(key, values)| (key.clone(), Value::Object(values.data_to_store())))
            .collect()
    }

    pub fn changes(&self) -> PublishAttributeChanges {
        let mut changes = PublishAttributeChanges::new();
        for (key, values) in &self.data {
            let attr_changes = values.changes();
            if !attr_changes.is_empty() {
                changes.insert(key.clone(), PluginChanges::Values(attr_changes));
            }
        }

        for (key, value) in &self.origin_data {
            if !self.data.contains_key(key) {
                changes.insert(
                    key.clone(),
                    PluginChanges::Removed(ValueChange::new(Some(value.clone()), None)),
                );
            }
        }
        changes
    }

    pub fn apply_changes(&mut self, changes: &PublishAttributeChanges) -> CreateResult<()> {
        for (key, item) in changes {
            match item {
                PluginChanges::Values(attr_changes) => {
                    let values = self.data.get_mut(key).ok_or_else(|| {
                        CreateError::UnexpectedChange {
                            key: key.clone(),
                            reason: "publish plugin is not available".to_string(),
                        }
                    })?;
                    values.apply_changes(attr_changes)?;
                }
                PluginChanges::Removed(change) => {
                    if let Some(new_value) = &change.new {
                        return Err(CreateError::UnexpectedChange {
                            key: key.clone(),
                            reason: format!("expected removal, got {}", new_value),
                        });
                    }
                    self.pop(key);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PublishAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishAttributes")
            .field("data", &self.data)
            .field("plugin_names_order", &self.plugin_names_order)
            .field("missing_plugins", &self.missing_plugins)
            .finish()
    }
}

impl Default for PublishAttributes {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttrDef;
    use crate::plugin::PublishPlugin;
    use serde_json::json;
    use std::sync::Arc;

    struct StubPlugin {
        name: &'static str,
        defs: Vec<AttrDef>,
    }

    impl PublishPlugin for StubPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn get_attribute_defs(&self) -> Vec<AttrDef> {
            self.defs.clone()
        }
    }

    fn plugin(name: &'static str, defs: Vec<AttrDef>) -> PublishPluginRef {
        Arc::new(StubPlugin { name, defs })
    }

    fn map(value: Value) -> DataMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_missing_plugin_data_preserved() {
        let stored = map(json!({"PluginX": {"foo": 1}}));
        let mut attributes = PublishAttributes::new(stored, &[]);
        assert_eq!(attributes.missing_plugins(), ["PluginX".to_string()]);
        assert!(attributes.changes().is_empty());

        let other = plugin("ValidateOther", vec![AttrDef::boolean("active", true)]);
        attributes.set_publish_plugins(&[other.clone()]);
        assert_eq!(attributes.missing_plugins(), ["PluginX".to_string()]);
        assert_eq!(attributes.plugin_names_order(), ["ValidateOther".to_string()]);

        attributes.set_publish_plugins(&[other]);
        assert_eq!(attributes.missing_plugins(), ["PluginX".to_string()]);

        let popped = attributes.pop("PluginX").unwrap();
        assert_eq!(popped, map(json!({"foo": 1})));
        assert!(!attributes.contains("PluginX"));
        assert!(attributes.missing_plugins().is_empty());

        let changes = attributes.changes();
        assert_eq!(
            changes["PluginX"],
            PluginChanges::Removed(ValueChange::new(Some(json!({"foo": 1})), None))
        );
    }

    #[test]
    fn test_pop_resets_available_plugin() {
        let validate = plugin("ValidateFrames", vec![AttrDef::boolean("active", true)]);
        let stored = map(json!({"ValidateFrames": {"active": false}}));
        let mut attributes = PublishAttributes::new(stored, &[validate]);
        assert!(attributes.missing_plugins().is_empty());

        let popped = attributes.pop("ValidateFrames").unwrap();
        assert_eq!(popped, map(json!({"active": false})));
        assert!(attributes.contains("ValidateFrames"));
        assert_eq!(
            attributes.get("ValidateFrames").unwrap().get("active"),
            Some(&json!(true))
        );
        assert!(matches!(
            attributes.changes()["ValidateFrames"],
            PluginChanges::Values(_)
        ));
    }

    #[test]
    fn test_plugins_without_defs_are_skipped() {
        let empty = plugin("CollectStuff", Vec::new());
        let attributes = PublishAttributes::new(DataMap::new(), &[empty]);
        assert!(attributes.plugin_names_order().is_empty());
        assert!(attributes.data_to_store().is_empty());
    }

    #[test]
    fn test_changes_apply_and_store() {
        let validate = plugin("ValidateFrames", vec![AttrDef::boolean("active", true)]);
        let stored = map(json!({"ValidateFrames": {"active": true}, "Gone": {"x": 1}}));
        let mut local = PublishAttributes::new(stored.clone(), &[validate.clone()]);
        let mut remote = PublishAttributes::new(stored, &[validate]);

        remote
            .get_mut("ValidateFrames")
            .unwrap()
            .set("active", json!(false))
            .unwrap();
        remote.pop("Gone");

        local.apply_changes(&remote.changes()).unwrap();
        assert_eq!(local.data_to_store(), remote.data_to_store());

        local.mark_as_stored();
        assert!(local.changes().is_empty());
    }

    #[test]
    fn test_apply_changes_rejects_unknown_plugin() {
        let mut attributes = PublishAttributes::empty();
        let mut changes = PublishAttributeChanges::new();
        changes.insert(
            "Nope".to_string(),
            PluginChanges::Values(AttributeChanges::new()),
        );
        assert!(matches!(
            attributes.apply_changes(&changes),
            Err(CreateError::UnexpectedChange { .. })
        ));
    }
}
