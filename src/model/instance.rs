use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;

use crate::error::{CreateError, CreateResult, ImmutableKeyError};
use crate::model::{
    generate_id, AttrDef, AttributeChanges, AttributeValues, CreatorAttributeValues, CreatorItem,
    DataMap, Id, PublishAttributeChanges, PublishAttributes, ValueChange, INSTANCE_ID_MARKER,
};
use crate::plugin::{CreatorInfo, PublishPluginRef};

pub const CREATOR_ATTRIBUTES_KEY: &str = "creator_attributes";
pub const PUBLISH_ATTRIBUTES_KEY: &str = "publish_attributes";

/// Keys that can't be changed or removed once the instance exists.
///
/// The attribute containers can change their children but not themselves.
pub const IMMUTABLE_KEYS: [&str; 6] = [
    "id",
    "instance_id",
    "family",
    "creator_identifier",
    CREATOR_ATTRIBUTES_KEY,
    PUBLISH_ATTRIBUTES_KEY,
];

pub fn is_immutable_key(key: &str) -> bool {
    IMMUTABLE_KEYS.contains(&key)
}

/// Changes of one instance since it was last stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceChanges {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, ValueChange>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub creator_attributes: AttributeChanges,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub publish_attributes: PublishAttributeChanges,
}

impl InstanceChanges {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.creator_attributes.is_empty()
            && self.publish_attributes.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        match key {
            CREATOR_ATTRIBUTES_KEY => !self.creator_attributes.is_empty(),
            PUBLISH_ATTRIBUTES_KEY => !self.publish_attributes.is_empty(),
            _ => self.fields.contains_key(key),
        }
    }

    /// Top level keys that changed, nested containers included.
    pub fn changed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        if !self.creator_attributes.is_empty() {
            keys.push(CREATOR_ATTRIBUTES_KEY);
        }
        if !self.publish_attributes.is_empty() {
            keys.push(PUBLISH_ATTRIBUTES_KEY);
        }
        keys
    }
}

/// Payload to rebuild an instance in another process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInstanceData {
    pub data: DataMap,
    pub orig_data: DataMap,
}

/// Changes made on a remote mirror, sent back to the owning process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChanges {
    pub changes: InstanceChanges,
    pub asset_is_valid: bool,
    pub task_is_valid: bool,
}

/// Data kept for the lifetime of an instance object. Never stored.
#[derive(Default)]
pub struct TransientData {
    items: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl TransientData {
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.items.insert(key.into(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.items.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.items
            .get_mut(key)
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.items.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for TransientData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.items.keys()).finish()
    }
}

/// Instance entity with data that will be stored to the workfile.
#[derive(Debug)]
pub struct CreatedInstance {
    creator: CreatorItem,
    data: DataMap,
    orig_data: DataMap,
    creator_attributes: CreatorAttributeValues,
    publish_attributes: PublishAttributes,
    transient_data: TransientData,
    asset_is_valid: bool,
    task_is_valid: bool,
}

impl CreatedInstance {
    pub fn new<C: CreatorInfo + ?Sized>(
        family: &str,
        subset_name: &str,
        data: DataMap,
        creator: &C,
    ) -> Self {
        Self::build(
            family,
            Value::String(subset_name.to_string()),
            data,
            CreatorItem::from_info(creator),
        )
    }

    fn build(family: &str, subset_name: Value, mut data: DataMap, creator: CreatorItem) -> Self {
        let mut orig_data = data.clone();
        orig_data.shift_remove(CREATOR_ATTRIBUTES_KEY);
        orig_data.shift_remove(PUBLISH_ATTRIBUTES_KEY);

        data.shift_remove("family");
        data.shift_remove("subset");
        let orig_creator_attributes = take_object(&mut data, CREATOR_ATTRIBUTES_KEY);
        let orig_publish_attributes = take_object(&mut data, PUBLISH_ATTRIBUTES_KEY);

        let mut own = DataMap::new();
        own.insert("id".into(), Value::String(INSTANCE_ID_MARKER.to_string()));
        own.insert("family".into(), Value::String(family.to_string()));
        own.insert("subset".into(), subset_name);
        own.insert(
            "active".into(),
            data.get("active").cloned().unwrap_or(Value::Bool(true)),
        );
        own.insert(
            "creator_identifier".into(),
            Value::String(creator.identifier.clone()),
        );

        // Values of already set keys are not overridden by passed data
        for (key, value) in data {
            if !own.contains_key(&key) {
                own.insert(key, value);
            }
        }

        let has_instance_id = own
            .get("instance_id")
            .map(|value| match value {
                Value::String(text) => !text.is_empty(),
                other => !other.is_null(),
            })
            .unwrap_or(false);
        if !has_instance_id {
            own.insert("instance_id".into(), Value::String(generate_id()));
        }

        // Ids loaded from hosts may be numbers, context keys are strings
        let instance_id = own
            .get("instance_id")
            .map(value_to_id)
            .unwrap_or_default();
        own.insert("instance_id".into(), Value::String(instance_id.clone()));
        let creator_attributes = CreatorAttributeValues::new(
            instance_id,
            AttributeValues::new(
                creator.get_instance_attr_defs(),
                orig_creator_attributes.clone(),
                Some(orig_creator_attributes),
            ),
        );
        let publish_attributes = PublishAttributes::new(orig_publish_attributes, &[]);

        let asset_is_valid = own.contains_key("asset");
        let task_is_valid = own.contains_key("task");

        Self {
            creator,
            data: own,
            orig_data,
            creator_attributes,
            publish_attributes,
            transient_data: TransientData::default(),
            asset_is_valid,
            task_is_valid,
        }
    }

    /// Convert instance data loaded from a workfile.
    pub fn from_existing<C: CreatorInfo + ?Sized>(instance_data: &DataMap, creator: &C) -> Self {
        let family = instance_data
            .get("family")
            .and_then(Value::as_str)
            .unwrap_or_else(|| creator.family())
            .to_string();
        let subset_name = instance_data.get("subset").cloned().unwrap_or(Value::Null);
        Self::build(
            &family,
            subset_name,
            instance_data.clone(),
            CreatorItem::from_info(creator),
        )
    }

    // --- Map like access ---

    /// Value of a plain field. Attribute containers have their own accessors.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Value of any key, attribute containers rendered as stored data.
    pub fn value(&self, key: &str) -> Option<Value> {
        match key {
            CREATOR_ATTRIBUTES_KEY => {
                Some(Value::Object(self.creator_attributes.data_to_store()))
            }
            PUBLISH_ATTRIBUTES_KEY => {
                Some(Value::Object(self.publish_attributes.data_to_store()))
            }
            _ => self.data.get(key).cloned(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        key == CREATOR_ATTRIBUTES_KEY || key == PUBLISH_ATTRIBUTES_KEY || self.data.contains_key(key)
    }

    /// Set a field. Immutable keys only accept their current value.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ImmutableKeyError> {
        if !is_immutable_key(key) {
            self.data.insert(key.to_string(), value);
            return Ok(());
        }
        if self.value(key).as_ref() != Some(&value) {
            return Err(ImmutableKeyError::new(key));
        }
        Ok(())
    }

    pub fn pop(&mut self, key: &str) -> Result<Option<Value>, ImmutableKeyError> {
        if is_immutable_key(key) {
            return Err(ImmutableKeyError::new(key));
        }
        Ok(self.data.shift_remove(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data
            .keys()
            .map(String::as_str)
            .chain([CREATOR_ATTRIBUTES_KEY, PUBLISH_ATTRIBUTES_KEY])
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(key, value)| (key.as_str(), value))
    }

    // --- Properties ---

    pub fn id(&self) -> &str {
        self.data
            .get("instance_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn family(&self) -> &str {
        self.data
            .get("family")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn subset_name(&self) -> Option<&str> {
        self.data.get("subset").and_then(Value::as_str)
    }

    pub fn creator_identifier(&self) -> &str {
        &self.creator.identifier
    }

    pub fn creator(&self) -> &CreatorItem {
        &self.creator
    }

    pub fn label(&self) -> String {
        match self.data.get("label").and_then(Value::as_str) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => self.subset_name().unwrap_or_default().to_string(),
        }
    }

    pub fn group_label(&self) -> String {
        match self.data.get("group").and_then(Value::as_str) {
            Some(group) if !group.is_empty() => group.to_string(),
            _ => self.creator.get_group_label(),
        }
    }

    pub fn creator_label(&self) -> &str {
        self.creator
            .label
            .as_deref()
            .unwrap_or(&self.creator.identifier)
    }

    pub fn is_active(&self) -> bool {
        self.data
            .get("active")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn asset_name(&self) -> Option<&str> {
        self.data.get("asset").and_then(Value::as_str)
    }

    pub fn task_name(&self) -> Option<&str> {
        self.data.get("task").and_then(Value::as_str)
    }

    pub fn has_set_asset(&self) -> bool {
        self.data.contains_key("asset")
    }

    pub fn has_set_task(&self) -> bool {
        self.data.contains_key("task")
    }

    pub fn has_valid_asset(&self) -> bool {
        self.has_set_asset() && self.asset_is_valid
    }

    pub fn has_valid_task(&self) -> bool {
        self.has_set_task() && self.task_is_valid
    }

    /// Context data are valid for publishing.
    pub fn has_valid_context(&self) -> bool {
        self.has_valid_asset() && self.has_valid_task()
    }

    pub fn set_asset_invalid(&mut self, invalid: bool) {
        self.asset_is_valid = !invalid;
    }

    pub fn set_task_invalid(&mut self, invalid: bool) {
        self.task_is_valid = !invalid;
    }

    pub fn transient_data(&self) -> &TransientData {
        &self.transient_data
    }

    pub fn transient_data_mut(&mut self) -> &mut TransientData {
        &mut self.transient_data
    }

    pub fn creator_attributes(&self) -> &CreatorAttributeValues {
        &self.creator_attributes
    }

    pub fn creator_attributes_mut(&mut self) -> &mut CreatorAttributeValues {
        &mut self.creator_attributes
    }

    pub fn creator_attribute_defs(&self) -> &[AttrDef] {
        self.creator_attributes.attr_defs()
    }

    pub fn publish_attributes(&self) -> &PublishAttributes {
        &self.publish_attributes
    }

    pub fn publish_attributes_mut(&mut self) -> &mut PublishAttributes {
        &mut self.publish_attributes
    }

    pub fn set_publish_plugins(&mut self, attr_plugins: &[PublishPluginRef]) {
        self.publish_attributes.set_publish_plugins(attr_plugins);
    }

    // --- Change tracking ---

    pub fn changes(&self) -> InstanceChanges {
        let mut fields = IndexMap::new();
        for (key, new_value) in &self.data {
            if let Some(change) = ValueChange::between(self.orig_data.get(key), Some(new_value)) {
                fields.insert(key.clone(), change);
            }
        }
        for (key, old_value) in &self.orig_data {
            if self.data.contains_key(key) {
                continue;
            }
            if let Some(change) = ValueChange::between(Some(old_value), None) {
                fields.insert(key.clone(), change);
            }
        }

        InstanceChanges {
            fields,
            creator_attributes: self.creator_attributes.changes(),
            publish_attributes: self.publish_attributes.changes(),
        }
    }

    /// Origin data are replaced by current data so changes are cleared.
    pub fn mark_as_stored(&mut self) {
        self.orig_data = self.data.clone();
        self.creator_attributes.mark_as_stored();
        self.publish_attributes.mark_as_stored();
    }

    /// Data that can be stored by the host and used to recreate the instance.
    pub fn data_to_store(&self) -> DataMap {
        let mut output = self.data.clone();
        output.insert(
            CREATOR_ATTRIBUTES_KEY.into(),
            Value::Object(self.creator_attributes.data_to_store()),
        );
        output.insert(
            PUBLISH_ATTRIBUTES_KEY.into(),
            Value::Object(self.publish_attributes.data_to_store()),
        );
        output
    }

    /// Apply changes created by [`CreatedInstance::changes`].
    pub fn apply_changes(&mut self, changes: &InstanceChanges) -> CreateResult<()> {
        for (key, change) in &changes.fields {
            match &change.new {
                None => {
                    if self.data.contains_key(key) {
                        self.pop(key)?;
                    }
                }
                Some(new_value) => {
                    if self.get(key) != Some(new_value) {
                        self.set(key, new_value.clone())?;
                    }
                }
            }
        }

        if !changes.creator_attributes.is_empty() {
            self.creator_attributes
                .apply_changes(&changes.creator_attributes)?;
        }
        if !changes.publish_attributes.is_empty() {
            self.publish_attributes
                .apply_changes(&changes.publish_attributes)?;
        }
        Ok(())
    }

    // --- Remote mirror ---

    pub fn serialize_for_remote(&self) -> RemoteInstanceData {
        RemoteInstanceData {
            data: self.data_to_store(),
            orig_data: self.orig_data.clone(),
        }
    }

    /// Rebuild an instance in a process that has only creator items.
    pub fn deserialize_on_remote(
        serialized: &RemoteInstanceData,
        creator_items: &HashMap<String, CreatorItem>,
    ) -> CreateResult<Self> {
        let creator_identifier = serialized
            .data
            .get("creator_identifier")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let creator_item = creator_items
            .get(creator_identifier)
            .ok_or_else(|| CreateError::UnknownCreator(creator_identifier.to_string()))?;

        let family = serialized
            .data
            .get("family")
            .and_then(Value::as_str)
            .unwrap_or(&creator_item.family)
            .to_string();
        let subset_name = serialized.data.get("subset").cloned().unwrap_or(Value::Null);

        let mut instance = Self::build(
            &family,
            subset_name,
            serialized.data.clone(),
            creator_item.clone(),
        );
        instance.orig_data = serialized.orig_data.clone();
        instance.orig_data.shift_remove(CREATOR_ATTRIBUTES_KEY);
        instance.orig_data.shift_remove(PUBLISH_ATTRIBUTES_KEY);
        Ok(instance)
    }

    pub fn remote_changes(&self) -> RemoteChanges {
        RemoteChanges {
            changes: self.changes(),
            asset_is_valid: self.asset_is_valid,
            task_is_valid: self.task_is_valid,
        }
    }

    pub fn update_from_remote(&mut self, remote_changes: &RemoteChanges) -> CreateResult<()> {
        self.asset_is_valid = remote_changes.asset_is_valid;
        self.task_is_valid = remote_changes.task_is_valid;
        self.apply_changes(&remote_changes.changes)
    }
}

fn take_object(data: &mut DataMap, key: &str) -> DataMap {
    match data.shift_remove(key) {
        Some(Value::Object(map)) => map,
        _ => DataMap::new(),
    }
}

fn value_to_id(value: &Value) -> Id {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
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

    fn creator() -> CreatorItem {
        CreatorItem {
            creator_type: crate::model::CreatorType::Creator,
            identifier: "io.test.model".to_string(),
            family: "model".to_string(),
            label: Some("Model".to_string()),
            group_label: "Models".to_string(),
            icon: None,
            instance_attr_defs: vec![AttrDef::boolean("review", true)],
            description: None,
            detailed_description: None,
            default_variants: Vec::new(),
            default_variant: None,
            create_allow_context_change: true,
            pre_create_attr_defs: Vec::new(),
        }
    }

    #[test]
    fn test_new_instance_fields() {
        let instance = CreatedInstance::new(
            "model",
            "modelMain",
            map(json!({"asset": "sh010", "variant": "Main"})),
            &creator(),
        );
        let keys: Vec<&str> = instance.keys().collect();
        assert_eq!(
            &keys[..5],
            &["id", "family", "subset", "active", "creator_identifier"]
        );
        assert!(keys.contains(&"instance_id"));
        assert_eq!(instance.get("id"), Some(&json!(INSTANCE_ID_MARKER)));
        assert_eq!(instance.family(), "model");
        assert_eq!(instance.subset_name(), Some("modelMain"));
        assert!(instance.is_active());
        assert!(!instance.id().is_empty());
        assert!(instance.has_set_asset());
        assert!(instance.has_valid_asset());
        assert!(!instance.has_valid_task());
        assert_eq!(instance.label(), "modelMain");
        assert_eq!(instance.group_label(), "Models");
        assert_eq!(instance.creator_label(), "Model");
    }

    #[test]
    fn test_immutable_keys() {
        let mut instance = CreatedInstance::new("model", "modelMain", DataMap::new(), &creator());
        for key in IMMUTABLE_KEYS {
            let current = instance.value(key).unwrap();
            instance.set(key, current).unwrap();

            let err = instance.set(key, json!("other")).unwrap_err();
            assert_eq!(err.key, key);
            assert!(instance.pop(key).is_err());
        }

        instance.set("subset", json!("modelOther")).unwrap();
        assert_eq!(instance.subset_name(), Some("modelOther"));
    }

    #[test]
    fn test_changes_and_mark_as_stored() {
        let mut instance = CreatedInstance::new("model", "modelMain", DataMap::new(), &creator());
        assert!(instance.changes().contains("family"));

        instance.mark_as_stored();
        assert!(instance.changes().is_empty());

        instance.set("newkey", json!("v1")).unwrap();
        let changes = instance.changes();
        assert_eq!(changes.fields.len(), 1);
        assert_eq!(
            changes.fields["newkey"],
            ValueChange::new(None, Some(json!("v1")))
        );

        instance
            .creator_attributes_mut()
            .set("review", json!(false))
            .unwrap();
        assert_eq!(
            instance.changes().changed_keys(),
            vec!["newkey", CREATOR_ATTRIBUTES_KEY]
        );

        instance.mark_as_stored();
        assert!(instance.changes().is_empty());

        instance.pop("newkey").unwrap();
        assert_eq!(
            instance.changes().fields["newkey"],
            ValueChange::new(Some(json!("v1")), None)
        );
    }

    #[test]
    fn test_from_existing_round_trip() {
        let stored = map(json!({
            "id": INSTANCE_ID_MARKER,
            "family": "model",
            "subset": "modelMain",
            "active": false,
            "creator_identifier": "io.test.model",
            "instance_id": "8f1b0c9e-1111-4222-8333-444455556666",
            "asset": "sh010",
            "task": "modeling",
            "custom": {"nested": [1, 2]},
            "creator_attributes": {"mystery": 42},
            "publish_attributes": {"PluginX": {"foo": 1}}
        }));
        let instance = CreatedInstance::from_existing(&stored, &creator());
        assert_eq!(instance.id(), "8f1b0c9e-1111-4222-8333-444455556666");
        assert!(!instance.is_active());
        assert!(instance.changes().is_empty());

        let output = instance.data_to_store();
        for (key, value) in &stored {
            if key == CREATOR_ATTRIBUTES_KEY {
                continue;
            }
            assert_eq!(output.get(key), Some(value), "key {}", key);
        }
        assert_eq!(
            output[CREATOR_ATTRIBUTES_KEY],
            json!({"mystery": 42, "review": true})
        );
    }

    #[test]
    fn test_from_existing_uses_creator_family() {
        let instance = CreatedInstance::from_existing(&map(json!({"subset": "x"})), &creator());
        assert_eq!(instance.family(), "model");
    }

    #[test]
    fn test_numeric_instance_id_kept_as_string() {
        let first = CreatedInstance::from_existing(&map(json!({"instance_id": 17})), &creator());
        let second = CreatedInstance::from_existing(&map(json!({"instance_id": 18})), &creator());
        assert_eq!(first.id(), "17");
        assert_eq!(second.id(), "18");
        assert_eq!(first.get("instance_id"), Some(&json!("17")));
        // Stored data differ from the host so the string form is saved
        assert_eq!(
            first.changes().fields["instance_id"],
            ValueChange::new(Some(json!(17)), Some(json!("17")))
        );
    }

    #[test]
    fn test_remote_mirror_changes() {
        let mut local = CreatedInstance::new(
            "model",
            "modelMain",
            map(json!({"asset": "sh010", "task": "modeling"})),
            &creator(),
        );
        local.mark_as_stored();

        let mut items = HashMap::new();
        items.insert("io.test.model".to_string(), creator());
        let serialized = local.serialize_for_remote();
        let mut remote = CreatedInstance::deserialize_on_remote(&serialized, &items).unwrap();
        assert_eq!(remote.id(), local.id());
        assert!(remote.changes().is_empty());

        remote.set("comment", json!("from ui")).unwrap();
        remote.pop("task").unwrap();
        remote
            .creator_attributes_mut()
            .set("review", json!(false))
            .unwrap();
        remote.set_asset_invalid(true);

        let message = serde_json::to_string(&remote.remote_changes()).unwrap();
        let remote_changes: RemoteChanges = serde_json::from_str(&message).unwrap();
        local.update_from_remote(&remote_changes).unwrap();

        assert_eq!(local.get("comment"), Some(&json!("from ui")));
        assert!(!local.has_set_task());
        assert!(!local.has_valid_asset());
        assert_eq!(local.data_to_store(), remote.data_to_store());
    }

    #[test]
    fn test_deserialize_on_remote_unknown_creator() {
        let local = CreatedInstance::new("model", "modelMain", DataMap::new(), &creator());
        let result = CreatedInstance::deserialize_on_remote(&local.serialize_for_remote(), &HashMap::new());
        assert!(matches!(result, Err(CreateError::UnknownCreator(_))));
    }

    #[test]
    fn test_transient_data() {
        let mut instance = CreatedInstance::new("model", "modelMain", DataMap::new(), &creator());
        instance.transient_data_mut().insert("node", 42_u32);
        assert_eq!(instance.transient_data().get::<u32>("node"), Some(&42));
        assert_eq!(instance.transient_data().get::<String>("node"), None);
        assert!(!instance.data_to_store().contains_key("node"));
    }
}
