use itertools::Itertools;
use std::collections::HashMap;

use crate::model::{AssetDoc, CreatedInstance};
use crate::store::ProjectStore;

/// Recompute asset and task validity of passed instances.
///
/// Asset documents are queried once for all distinct asset names.
pub fn validate_instances_context(
    project_store: &dyn ProjectStore,
    project_name: &str,
    mut instances: Vec<&mut CreatedInstance>,
) -> anyhow::Result<()> {
    if instances.is_empty() {
        return Ok(());
    }

    let asset_names: Vec<String> = instances
        .iter()
        .filter_map(|instance| instance.asset_name())
        .filter(|name| !name.is_empty())
        .unique()
        .map(str::to_string)
        .collect();

    let asset_docs: HashMap<String, AssetDoc> = if asset_names.is_empty() {
        HashMap::new()
    } else {
        project_store
            .get_assets(project_name, &asset_names)?
            .into_iter()
            .map(|asset_doc| (asset_doc.name.clone(), asset_doc))
            .collect()
    };

    for instance in instances.iter_mut() {
        let asset_doc = instance
            .asset_name()
            .and_then(|asset_name| asset_docs.get(asset_name));
        let task_is_valid = match instance.task_name().filter(|name| !name.is_empty()) {
            Some(task_name) => asset_doc.map_or(false, |asset_doc| asset_doc.has_task(task_name)),
            None => true,
        };
        let asset_is_valid = asset_doc.is_some();

        instance.set_asset_invalid(!asset_is_valid);
        instance.set_task_invalid(!task_is_valid);
    }
    Ok(())
}
