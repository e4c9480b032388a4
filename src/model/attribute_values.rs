use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::error::AttributeKeyError;
use crate::model::{non_null, AttrDef, DataMap, Id, ValueChange};

/// Per-key changes of one attribute container.
pub type AttributeChanges = IndexMap<String, ValueChange>;

/// Values of attribute definitions with change tracking.
///
/// Values loaded from a host are never dropped: keys that no definition
/// describes get an `Unknown` definition carrying the loaded value.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValues {
    attr_defs: Vec<AttrDef>,
    /// Key -> position in `attr_defs` for value definitions only
    index: HashMap<String, usize>,
    data: IndexMap<String, Value>,
    origin_data: DataMap,
}

impl AttributeValues {
    pub fn new(attr_defs: Vec<AttrDef>, values: DataMap, origin_data: Option<DataMap>) -> Self {
        let origin_data = origin_data.unwrap_or_else(|| values.clone());
        let mut attr_defs = attr_defs;

        let mut index = HashMap::new();
        for (position, attr_def) in attr_defs.iter().enumerate() {
            if attr_def.is_value_def() {
                index.entry(attr_def.key.clone()).or_insert(position);
            }
        }
        for (key, value) in &values {
            if !index.contains_key(key) {
                index.insert(key.clone(), attr_defs.len());
                attr_defs.push(AttrDef::unknown(key.clone(), value.clone()));
            }
        }

        let mut data = IndexMap::new();
        for attr_def in attr_defs.iter().filter(|d| d.is_value_def()) {
            if let Some(value) = non_null(values.get(&attr_def.key)) {
                data.entry(attr_def.key.clone()).or_insert_with(|| value.clone());
            }
        }

        Self {
            attr_defs,
            index,
            data,
            origin_data,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), DataMap::new(), None)
    }

    /// Pointer to attribute definitions.
    pub fn attr_defs(&self) -> &[AttrDef] {
        &self.attr_defs
    }

    fn attr_def(&self, key: &str) -> Option<&AttrDef> {
        self.index.get(key).map(|position| &self.attr_defs[*position])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Stored value or the definition default.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let attr_def = self.attr_def(key)?;
        self.data.get(key).or(Some(&attr_def.default))
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), AttributeKeyError> {
        if !self.contains(key) {
            return Err(AttributeKeyError {
                key: key.to_string(),
            });
        }
        if self.data.get(key) == Some(&value) {
            return Ok(());
        }
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    /// Set multiple values. Stops on first unknown key.
    pub fn update<I, K>(&mut self, values: I) -> Result<(), AttributeKeyError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (key, value) in values {
            self.set(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Remove stored value so the key falls back to its default.
    pub fn pop(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    /// Keys of value definitions in definition order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attr_defs
            .iter()
            .enumerate()
            .filter(move |(position, d)| self.index.get(&d.key) == Some(position))
            .map(|(_, d)| d.key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = Option<&Value>> {
        self.keys().map(move |key| self.data.get(key))
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.keys().map(move |key| (key, self.data.get(key)))
    }

    pub fn reset_values(&mut self) {
        self.data.clear();
    }

    /// Current values become the origin so there are no changes.
    pub fn mark_as_stored(&mut self) {
        self.origin_data = self.raw_data();
    }

    /// Explicitly set values, without defaults.
    pub fn raw_data(&self) -> DataMap {
        self.data
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn origin_data(&self) -> &DataMap {
        &self.origin_data
    }

    /// All values including defaults for every definition.
    pub fn data_to_store(&self) -> DataMap {
        let mut output = self.raw_data();
        for key in self.keys() {
            if !output.contains_key(key) {
                let default = self
                    .attr_def(key)
                    .map(|d| d.default.clone())
                    .unwrap_or(Value::Null);
                output.insert(key.to_string(), default);
            }
        }
        output
    }

    /// Changes between two value maps, keyed by every differing key.
    pub fn calculate_changes(new_data: &DataMap, old_data: &DataMap) -> AttributeChanges {
        let mut changes = AttributeChanges::new();
        for (key, new_value) in new_data {
            if let Some(change) = ValueChange::between(old_data.get(key), Some(new_value)) {
                changes.insert(key.clone(), change);
            }
        }
        for (key, old_value) in old_data {
            if new_data.contains_key(key) {
                continue;
            }
            if let Some(change) = ValueChange::between(Some(old_value), None) {
                changes.insert(key.clone(), change);
            }
        }
        changes
    }

    pub fn changes(&self) -> AttributeChanges {
        Self::calculate_changes(&self.raw_data(), &self.origin_data)
    }

    /// Replay changes computed by [`AttributeValues::changes`].
    pub fn apply_changes(&mut self, changes: &AttributeChanges) -> Result<(), AttributeKeyError> {
        for (key, change) in changes {
            match non_null(change.new.as_ref()) {
                None => {
                    if self.contains(key) {
                        self.pop(key);
                    }
                }
                Some(new_value) => {
                    if self.get(key) != Some(new_value) {
                        self.set(key, new_value.clone())?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for AttributeValues {
    fn default() -> Self {
        Self::empty()
    }
}

/// Creator specific attribute values of an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatorAttributeValues {
    pub instance_id: Id,
    values: AttributeValues,
}

impl CreatorAttributeValues {
    pub fn new(instance_id: Id, values: AttributeValues) -> Self {
        Self {
            instance_id,
            values,
        }
    }
}

impl Deref for CreatorAttributeValues {
    type Target = AttributeValues;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl DerefMut for CreatorAttributeValues {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

/// Attribute values of a single publish plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishAttributeValues {
    pub plugin_name: String,
    values: AttributeValues,
}

impl PublishAttributeValues {
    pub fn new(plugin_name: impl Into<String>, values: AttributeValues) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            values,
        }
    }
}

impl Deref for PublishAttributeValues {
    type Target = AttributeValues;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl DerefMut for PublishAttributeValues {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> DataMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn defs() -> Vec<AttrDef> {
        vec![
            AttrDef::boolean("review", true),
            AttrDef::label_def("info", "Just a label"),
            AttrDef::text("comment", ""),
        ]
    }

    #[test]
    fn test_unknown_key_preserved() {
        let values = AttributeValues::new(Vec::new(), map(json!({"mystery": 42})), None);
        assert!(values.contains("mystery"));
        assert_eq!(values.get("mystery"), Some(&json!(42)));
        assert_eq!(values.data_to_store(), map(json!({"mystery": 42})));
        assert_eq!(values.attr_defs().len(), 1);
    }

    #[test]
    fn test_get_falls_back_to_default() {
        let values = AttributeValues::new(defs(), DataMap::new(), None);
        assert_eq!(values.get("review"), Some(&json!(true)));
        assert_eq!(values.get("info"), None);
        assert_eq!(values.get("missing"), None);
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["review", "comment"]);
    }

    #[test]
    fn test_set_unknown_key_fails() {
        let mut values = AttributeValues::new(defs(), DataMap::new(), None);
        let err = values.set("missing", json!(1)).unwrap_err();
        assert_eq!(err.key, "missing");
        assert!(values.changes().is_empty());
    }

    #[test]
    fn test_changes_and_mark_as_stored() {
        let mut values = AttributeValues::new(defs(), map(json!({"review": true})), None);
        values.set("review", json!(true)).unwrap();
        assert!(values.changes().is_empty());

        values.set("review", json!(false)).unwrap();
        values.set("comment", json!("hi")).unwrap();
        let changes = values.changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["review"], ValueChange::new(Some(json!(true)), Some(json!(false))));
        assert_eq!(changes["comment"], ValueChange::new(None, Some(json!("hi"))));

        values.mark_as_stored();
        assert!(values.changes().is_empty());

        values.pop("comment");
        assert_eq!(
            values.changes()["comment"],
            ValueChange::new(Some(json!("hi")), None)
        );
    }

    #[test]
    fn test_diff_apply_inverse() {
        let origin = map(json!({"review": true, "comment": "a", "extra": 1}));
        let mut current = AttributeValues::new(defs(), origin.clone(), None);
        current.set("review", json!(false)).unwrap();
        current.pop("comment");
        current.set("extra", json!(2)).unwrap();

        let mut mirror = AttributeValues::new(defs(), origin, None);
        mirror.apply_changes(&current.changes()).unwrap();
        assert_eq!(mirror.data_to_store(), current.data_to_store());
    }

    #[test]
    fn test_update_accepts_pairs() {
        let mut values = AttributeValues::new(defs(), DataMap::new(), None);
        values
            .update(map(json!({"review": false, "comment": "x"})))
            .unwrap();
        assert_eq!(values.get("review"), Some(&json!(false)));
        assert_eq!(values.get("comment"), Some(&json!("x")));

        let err = values.update(vec![("nope", json!(1))]).unwrap_err();
        assert_eq!(err.key, "nope");
    }

    #[test]
    fn test_data_to_store_includes_defaults() {
        let values = AttributeValues::new(defs(), map(json!({"comment": "c"})), None);
        let stored = values.data_to_store();
        assert_eq!(stored, map(json!({"comment": "c", "review": true})));
        assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["comment", "review"]);
    }
}
