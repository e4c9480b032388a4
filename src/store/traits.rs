use crate::model::{AssetDoc, ContextChanges, DataMap, HostContext, Id};
use anyhow::Result;

/// Host integration (DCC application) the create context works with.
///
/// Optional capabilities are exposed through accessor methods returning
/// `None` when the host does not implement them.
pub trait Host: Send + Sync {
    fn name(&self) -> &str;

    /// Context the host currently works in, if the host can tell.
    fn get_current_context(&self) -> Option<HostContext> {
        None
    }

    /// Context data storage required to save changes
    fn publish_host(&self) -> Option<&dyn PublishHost> {
        None
    }

    /// Instance metadata storage used by creators
    fn instance_storage(&self) -> Option<&dyn InstanceStorage> {
        None
    }
}

/// Methods a host must implement to store publish context data.
pub trait PublishHost: Send + Sync {
    fn get_context_data(&self) -> Result<DataMap>;
    fn update_context_data(&self, data: DataMap, changes: &ContextChanges) -> Result<()>;
}

/// Names of methods required by [`PublishHost`].
pub const PUBLISH_HOST_METHODS: [&str; 2] = ["get_context_data", "update_context_data"];

/// Instance metadata stored in the workfile.
pub trait InstanceStorage: Send + Sync {
    fn list_instances(&self) -> Result<Vec<DataMap>>;
    fn add_instance(&self, data: DataMap) -> Result<()>;
    /// Replace stored data of instances matched by "instance_id"
    fn update_instances(&self, instances: Vec<DataMap>) -> Result<()>;
    fn remove_instances(&self, instance_ids: &[Id]) -> Result<()>;
}

/// Access to project documents.
pub trait ProjectStore: Send + Sync {
    /// Asset documents by names. Unknown names are skipped.
    fn get_assets(&self, project_name: &str, asset_names: &[String]) -> Result<Vec<AssetDoc>>;

    fn get_asset_by_name(&self, project_name: &str, asset_name: &str) -> Result<Option<AssetDoc>> {
        let assets = self.get_assets(project_name, &[asset_name.to_string()])?;
        Ok(assets.into_iter().find(|asset| asset.name == asset_name))
    }
}

/// Methods of required host interfaces the host does not implement.
pub fn get_host_missing_methods(host: &dyn Host) -> Vec<String> {
    if host.publish_host().is_some() {
        return Vec::new();
    }
    PUBLISH_HOST_METHODS
        .iter()
        .map(|name| name.to_string())
        .collect()
}
