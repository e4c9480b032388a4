use anyhow::{Context, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::{AssetDoc, ContextChanges, DataMap, HostContext, Id};
use crate::store::{Host, InstanceStorage, ProjectStore, PublishHost};

/// Content of a JSON workfile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkfileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HostContext>,
    #[serde(default)]
    pub context_data: DataMap,
    #[serde(default)]
    pub instances: Vec<DataMap>,
}

/// Host keeping instance metadata in memory, optionally backed by a JSON file.
#[derive(Debug)]
pub struct InMemoryHost {
    name: String,
    path: Option<PathBuf>,
    context: RwLock<Option<HostContext>>,
    context_data: RwLock<DataMap>,
    /// Instance data keyed by instance id, in creation order
    instances: RwLock<IndexMap<Id, DataMap>>,
}

fn instance_id_of(data: &DataMap) -> Option<Id> {
    match data.get("instance_id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}

impl InMemoryHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            context: RwLock::new(None),
            context_data: RwLock::new(DataMap::new()),
            instances: RwLock::new(IndexMap::new()),
        }
    }

    pub fn with_context(self, context: HostContext) -> Self {
        *self.context.write() = Some(context);
        self
    }

    pub fn with_instances(self, instances: Vec<DataMap>) -> Self {
        {
            let mut stored = self.instances.write();
            for data in instances {
                let id = instance_id_of(&data).unwrap_or_else(crate::model::generate_id);
                stored.insert(id, data);
            }
        }
        self
    }

    /// Open a workfile. A missing file gives an empty host.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let workfile = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read workfile {}", path.display()))?;
            serde_json::from_str::<WorkfileData>(&content)
                .with_context(|| format!("Invalid workfile {}", path.display()))?
        } else {
            WorkfileData::default()
        };

        let mut host = Self::new(name).with_instances(workfile.instances);
        *host.context.write() = workfile.context;
        *host.context_data.write() = workfile.context_data;
        host.path = Some(path);
        Ok(host)
    }

    pub fn to_workfile(&self) -> WorkfileData {
        WorkfileData {
            context: self.context.read().clone(),
            context_data: self.context_data.read().clone(),
            instances: self.instances.read().values().cloned().collect(),
        }
    }

    /// Write the workfile back to the path it was opened from.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            anyhow::bail!("Host \"{}\" was not opened from a workfile", self.name);
        };
        let content = serde_json::to_string_pretty(&self.to_workfile())?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write workfile {}", path.display()))?;
        Ok(())
    }

    pub fn set_context(&self, context: HostContext) {
        *self.context.write() = Some(context);
    }

    pub fn context_data(&self) -> DataMap {
        self.context_data.read().clone()
    }

    pub fn instance_data(&self, instance_id: &str) -> Option<DataMap> {
        self.instances.read().get(instance_id).cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }
}

impl Host for InMemoryHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_current_context(&self) -> Option<HostContext> {
        self.context.read().clone()
    }

    fn publish_host(&self) -> Option<&dyn PublishHost> {
        Some(self)
    }

    fn instance_storage(&self) -> Option<&dyn InstanceStorage> {
        Some(self)
    }
}

impl PublishHost for InMemoryHost {
    fn get_context_data(&self) -> Result<DataMap> {
        Ok(self.context_data.read().clone())
    }

    fn update_context_data(&self, data: DataMap, _changes: &ContextChanges) -> Result<()> {
        *self.context_data.write() = data;
        Ok(())
    }
}

impl InstanceStorage for InMemoryHost {
    fn list_instances(&self) -> Result<Vec<DataMap>> {
        Ok(self.instances.read().values().cloned().collect())
    }

    fn add_instance(&self, data: DataMap) -> Result<()> {
        let id = instance_id_of(&data).context("Instance data without \"instance_id\"")?;
        self.instances.write().insert(id, data);
        Ok(())
    }

    fn update_instances(&self, instances: Vec<DataMap>) -> Result<()> {
        let mut stored = self.instances.write();
        for data in instances {
            let id = instance_id_of(&data).context("Instance data without \"instance_id\"")?;
            stored.insert(id, data);
        }
        Ok(())
    }

    fn remove_instances(&self, instance_ids: &[Id]) -> Result<()> {
        let mut stored = self.instances.write();
        for instance_id in instance_ids {
            stored.shift_remove(instance_id);
        }
        Ok(())
    }
}

/// Project documents held in memory. Counts `get_assets` queries.
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    assets: RwLock<IndexMap<String, AssetDoc>>,
    queries: AtomicUsize,
}

impl InMemoryProjectStore {
    pub fn new(assets: Vec<AssetDoc>) -> Self {
        Self {
            assets: RwLock::new(
                assets
                    .into_iter()
                    .map(|asset| (asset.name.clone(), asset))
                    .collect(),
            ),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn add_asset(&self, asset: AssetDoc) {
        self.assets.write().insert(asset.name.clone(), asset);
    }

    /// Number of `get_assets` calls so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl ProjectStore for InMemoryProjectStore {
    fn get_assets(&self, _project_name: &str, asset_names: &[String]) -> Result<Vec<AssetDoc>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let assets = self.assets.read();
        Ok(asset_names
            .iter()
            .filter_map(|name| assets.get(name).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(id: &str) -> DataMap {
        match json!({"instance_id": id, "family": "model"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_instance_storage() {
        let host = InMemoryHost::new("test");
        host.add_instance(instance("a")).unwrap();
        host.add_instance(instance("b")).unwrap();
        assert_eq!(host.list_instances().unwrap().len(), 2);

        let mut updated = instance("a");
        updated.insert("subset".into(), json!("modelMain"));
        host.update_instances(vec![updated]).unwrap();
        assert_eq!(host.instance_data("a").unwrap()["subset"], json!("modelMain"));

        host.remove_instances(&["a".to_string()]).unwrap();
        let ids: Vec<_> = host
            .list_instances()
            .unwrap()
            .iter()
            .filter_map(instance_id_of)
            .collect();
        assert_eq!(ids, vec!["b".to_string()]);

        assert!(host.add_instance(DataMap::new()).is_err());
    }

    #[test]
    fn test_workfile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.json");

        let host = InMemoryHost::open("test", &path).unwrap();
        assert_eq!(host.instance_count(), 0);
        host.set_context(HostContext {
            project_name: Some("demo".into()),
            asset_name: Some("sh010".into()),
            task_name: None,
        });
        host.add_instance(instance("a")).unwrap();
        host.save().unwrap();

        let reopened = InMemoryHost::open("test", &path).unwrap();
        assert_eq!(reopened.instance_count(), 1);
        assert_eq!(
            reopened.get_current_context().unwrap().asset_name.as_deref(),
            Some("sh010")
        );
    }

    #[test]
    fn test_save_without_path_fails() {
        assert!(InMemoryHost::new("test").save().is_err());
    }

    #[test]
    fn test_project_store_counts_queries() {
        let store = InMemoryProjectStore::new(vec![AssetDoc::new("sh010").with_task("comp", "Compositing")]);
        let found = store
            .get_assets("demo", &["sh010".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(store.get_asset_by_name("demo", "missing").unwrap().is_none());
        assert_eq!(store.query_count(), 2);
    }
}
