use log::debug;
use serde_json::Value;

use crate::creators::{cache_and_get_instances, instance_storage};
use crate::error::CreatorError;
use crate::logic::CreateContext;
use crate::model::{CreatedInstance, DataMap};
use crate::plugin::{AutoCreator, BaseCreator, CreatorInfo, UpdateData};

pub const WORKFILE_FAMILY: &str = "workfile";

/// Keeps a single "workfile" instance matching the current asset and task.
#[derive(Debug, Clone)]
pub struct WorkfileCreator {
    default_variant: String,
}

impl WorkfileCreator {
    pub fn new() -> Self {
        Self {
            default_variant: "Main".to_string(),
        }
    }

    fn subset_name(
        &self,
        ctx: &CreateContext,
        asset_name: Option<&str>,
        task_name: Option<&str>,
    ) -> anyhow::Result<String> {
        let project_name = ctx.project_name().unwrap_or_default().to_string();
        let host_name = ctx.host_name();
        let asset_doc = match asset_name {
            Some(asset_name) => ctx
                .project_store()
                .get_asset_by_name(&project_name, asset_name)?,
            None => None,
        };
        let subset_name = self
            .get_subset_name(
                &ctx.config().subset_name,
                &self.default_variant,
                task_name,
                asset_doc.as_ref(),
                Some(&project_name),
                Some(&host_name),
            )
            .map_err(|err| CreatorError::new(err.to_string()))?;
        Ok(subset_name)
    }
}

impl Default for WorkfileCreator {
    fn default() -> Self {
        Self::new()
    }
}

fn optional_string(value: Option<&str>) -> Value {
    value
        .map(|text| Value::String(text.to_string()))
        .unwrap_or(Value::Null)
}

impl CreatorInfo for WorkfileCreator {
    fn identifier(&self) -> &str {
        WORKFILE_FAMILY
    }

    fn family(&self) -> &str {
        WORKFILE_FAMILY
    }

    fn label(&self) -> Option<&str> {
        Some("Workfile")
    }

    fn icon(&self) -> Option<&str> {
        Some("fa5.file")
    }
}

impl BaseCreator for WorkfileCreator {
    fn collect_instances(&self, ctx: &mut CreateContext) -> anyhow::Result<()> {
        for instance_data in cache_and_get_instances(ctx, self.identifier())? {
            let instance = CreatedInstance::from_existing(&instance_data, self);
            ctx.creator_adds_instance(instance);
        }
        Ok(())
    }

    fn update_instances(&self, ctx: &CreateContext, updates: &[UpdateData<'_>]) -> anyhow::Result<()> {
        let host = ctx.host().clone();
        let data = updates
            .iter()
            .map(|update| update.instance.data_to_store())
            .collect();
        instance_storage(host.as_ref())?.update_instances(data)
    }
}

impl AutoCreator for WorkfileCreator {
    fn create(&self, ctx: &mut CreateContext) -> anyhow::Result<()> {
        let asset_name = ctx.asset_name().map(str::to_string);
        let task_name = ctx.task_name().map(str::to_string);

        let existing_id = ctx
            .instances()
            .find(|instance| instance.creator_identifier() == self.identifier())
            .map(|instance| instance.id().to_string());

        let Some(instance_id) = existing_id else {
            let subset_name = self.subset_name(ctx, asset_name.as_deref(), task_name.as_deref())?;
            let mut data = DataMap::new();
            data.insert("asset".into(), optional_string(asset_name.as_deref()));
            data.insert("task".into(), optional_string(task_name.as_deref()));
            data.insert("variant".into(), Value::String(self.default_variant.clone()));

            debug!("Creating workfile instance \"{}\"", subset_name);
            let instance = CreatedInstance::new(WORKFILE_FAMILY, &subset_name, data, self);
            ctx.creator_adds_instance(instance);
            return Ok(());
        };

        let context_changed = ctx.get_instance(&instance_id).is_some_and(|instance| {
            instance.asset_name() != asset_name.as_deref()
                || instance.task_name() != task_name.as_deref()
        });
        if !context_changed {
            return Ok(());
        }

        let subset_name = self.subset_name(ctx, asset_name.as_deref(), task_name.as_deref())?;
        if let Some(instance) = ctx.get_instance_mut(&instance_id) {
            instance.set("asset", optional_string(asset_name.as_deref()))?;
            instance.set("task", optional_string(task_name.as_deref()))?;
            instance.set("subset", Value::String(subset_name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::model::HostContext;
    use crate::plugin::{CreatorPlugin, PluginRegistry};
    use crate::store::{InMemoryHost, InMemoryProjectStore};
    use serde_json::json;
    use std::sync::Arc;

    fn context(asset: &str, task: &str) -> HostContext {
        HostContext {
            project_name: Some("demo".to_string()),
            asset_name: Some(asset.to_string()),
            task_name: Some(task.to_string()),
        }
    }

    #[test]
    fn test_single_instance_follows_context() {
        let host = Arc::new(InMemoryHost::new("test").with_context(context("sh010", "comp")));
        let mut registry = PluginRegistry::new();
        registry.register_creator(CreatorPlugin::auto(WorkfileCreator::new()));
        let mut ctx = CreateContext::new(
            host.clone(),
            Arc::new(InMemoryProjectStore::default()),
            Arc::new(registry),
            PipelineConfig::default(),
        );

        ctx.reset(false).unwrap();
        assert_eq!(ctx.instances().count(), 1);
        let instance = ctx.instances().next().unwrap();
        assert_eq!(instance.subset_name(), Some("workfileMain"));
        assert_eq!(instance.asset_name(), Some("sh010"));
        // Stored on save, not on create
        assert_eq!(host.instance_count(), 0);

        ctx.save_changes().unwrap();
        assert_eq!(host.instance_count(), 1);

        host.set_context(context("sh020", "anim"));
        ctx.reset(false).unwrap();
        assert_eq!(ctx.instances().count(), 1);
        let instance = ctx.instances().next().unwrap();
        assert_eq!(instance.asset_name(), Some("sh020"));
        assert_eq!(instance.get("task"), Some(&json!("anim")));
        assert!(instance.changes().contains("asset"));

        // Auto created instances can't be removed
        let instance_id = instance.id().to_string();
        ctx.remove_instances(&[instance_id]).unwrap();
        assert_eq!(ctx.instances().count(), 1);
    }
}
