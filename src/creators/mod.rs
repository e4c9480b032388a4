pub mod settings_creator;
pub mod workfile;

pub use settings_creator::*;
pub use workfile::*;

use anyhow::Context;
use serde_json::Value;

use crate::logic::CreateContext;
use crate::model::DataMap;
use crate::store::{Host, InstanceStorage};

/// Key in collection shared data holding host instances grouped by creator.
pub const SHARED_DATA_KEY: &str = "openpype.create.instances";

pub(crate) fn instance_storage(host: &dyn Host) -> anyhow::Result<&dyn InstanceStorage> {
    host.instance_storage()
        .with_context(|| format!("Host \"{}\" does not store instances", host.name()))
}

/// Stored instances of a creator.
///
/// Host instances are listed once per reset and cached in collection shared
/// data grouped by "creator_identifier". Legacy instances without the key
/// are not returned to any creator.
pub fn cache_and_get_instances(
    ctx: &mut CreateContext,
    creator_identifier: &str,
) -> anyhow::Result<Vec<DataMap>> {
    let host = ctx.host().clone();
    let shared_data = ctx.collection_shared_data()?;

    if !shared_data.contains_key(SHARED_DATA_KEY) {
        let storage = instance_storage(host.as_ref())?;

        let mut by_identifier = DataMap::new();
        for instance_data in storage.list_instances()? {
            let Some(identifier) = instance_data
                .get("creator_identifier")
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                continue;
            };
            let entry = by_identifier
                .entry(identifier)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                items.push(Value::Object(instance_data));
            }
        }
        shared_data.insert(SHARED_DATA_KEY.to_string(), Value::Object(by_identifier));
    }

    let instances = match shared_data
        .get(SHARED_DATA_KEY)
        .and_then(|cached| cached.get(creator_identifier))
    {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    };
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::CreateError;
    use crate::plugin::PluginRegistry;
    use crate::store::{InMemoryHost, InMemoryProjectStore};
    use serde_json::json;
    use std::sync::Arc;

    fn data(value: Value) -> DataMap {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_instances_grouped_and_listed_once() {
        let host = Arc::new(InMemoryHost::new("test").with_instances(vec![
            data(json!({"instance_id": "a", "creator_identifier": "model"})),
            data(json!({"instance_id": "b", "creator_identifier": "render"})),
            data(json!({"instance_id": "c", "creator_identifier": "model"})),
            data(json!({"instance_id": "legacy", "family": "model"})),
        ]));
        let mut ctx = CreateContext::new(
            host.clone(),
            Arc::new(InMemoryProjectStore::default()),
            Arc::new(PluginRegistry::new()),
            PipelineConfig::default(),
        );
        ctx.reset_preparation();

        let models = cache_and_get_instances(&mut ctx, "model").unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[1]["instance_id"], json!("c"));

        // Cache is used for the rest of the collection phase
        host.remove_instances(&["b".to_string()]).unwrap();
        assert_eq!(cache_and_get_instances(&mut ctx, "render").unwrap().len(), 1);
        assert!(cache_and_get_instances(&mut ctx, "unknown").unwrap().is_empty());

        ctx.reset_finalization();
        let err = cache_and_get_instances(&mut ctx, "model").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CreateError>(),
            Some(CreateError::UnavailableSharedData)
        ));
    }
}
