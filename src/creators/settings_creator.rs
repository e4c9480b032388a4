use serde_json::Value;

use crate::config::SimpleCreatorConfig;
use crate::creators::{cache_and_get_instances, instance_storage};
use crate::logic::CreateContext;
use crate::model::{AttrDef, CreatedInstance, DataMap, Id, CREATOR_ATTRIBUTES_KEY};
use crate::plugin::{BaseCreator, Creator, CreatorInfo, UpdateData};

const REVIEW_EXTENSIONS: [&str; 12] = [
    ".exr", ".jpg", ".jpeg", ".png", ".tif", ".tiff", ".dpx", ".mov", ".mp4", ".mxf", ".avi",
    ".webm",
];

/// Creator of file based families configured in pipeline settings.
#[derive(Debug, Clone)]
pub struct SettingsCreator {
    identifier: String,
    family: String,
    label: Option<String>,
    icon: Option<String>,
    description: Option<String>,
    detailed_description: Option<String>,
    default_variants: Vec<String>,
    extensions: Vec<String>,
    allow_sequences: bool,
    allow_multiple_items: bool,
    host_name: Option<String>,
    enabled: bool,
}

impl SettingsCreator {
    pub fn from_settings(settings: &SimpleCreatorConfig) -> Self {
        let identifier = settings
            .identifier
            .clone()
            .filter(|identifier| !identifier.is_empty())
            .unwrap_or_else(|| format!("settings_{}", settings.family));
        Self {
            identifier,
            family: settings.family.clone(),
            label: settings
                .label
                .as_deref()
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string),
            icon: settings.icon.clone(),
            description: settings.description.clone(),
            detailed_description: settings.detailed_description.clone(),
            default_variants: settings.default_variants.clone(),
            extensions: settings.extensions.clone(),
            allow_sequences: settings.allow_sequences,
            allow_multiple_items: settings.allow_multiple_items,
            host_name: settings.host_name.clone(),
            enabled: settings.enabled,
        }
    }
}

impl CreatorInfo for SettingsCreator {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    fn get_instance_attr_defs(&self) -> Vec<AttrDef> {
        vec![
            AttrDef::file("representation_files", self.extensions.clone())
                .with_file_options(self.allow_sequences, !self.allow_multiple_items)
                .with_label("Representations"),
            AttrDef::file(
                "reviewable",
                REVIEW_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            )
            .with_file_options(true, true)
            .with_label("Reviewable representations"),
        ]
    }
}

impl BaseCreator for SettingsCreator {
    fn host_name(&self) -> Option<&str> {
        self.host_name.as_deref()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn collect_instances(&self, ctx: &mut CreateContext) -> anyhow::Result<()> {
        for instance_data in cache_and_get_instances(ctx, &self.identifier)? {
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

impl Creator for SettingsCreator {
    fn create(
        &self,
        ctx: &mut CreateContext,
        subset_name: &str,
        mut instance_data: DataMap,
        pre_create_data: DataMap,
    ) -> anyhow::Result<()> {
        let host = ctx.host().clone();
        let storage = instance_storage(host.as_ref())?;

        // Pre create values are used as creator attributes
        instance_data.insert(CREATOR_ATTRIBUTES_KEY.to_string(), Value::Object(pre_create_data));
        instance_data.insert("settings_creator".to_string(), Value::Bool(true));
        let mut instance = CreatedInstance::new(&self.family, subset_name, instance_data, self);

        storage.add_instance(instance.data_to_store())?;
        instance.mark_as_stored();
        ctx.creator_adds_instance(instance);
        Ok(())
    }

    fn remove_instances(&self, ctx: &mut CreateContext, instance_ids: &[Id]) -> anyhow::Result<()> {
        let host = ctx.host().clone();
        instance_storage(host.as_ref())?.remove_instances(instance_ids)?;
        for instance_id in instance_ids {
            ctx.creator_removed_instance(instance_id);
        }
        Ok(())
    }

    fn get_description(&self) -> Option<String> {
        self.description.clone()
    }

    fn get_detail_description(&self) -> Option<String> {
        self.detailed_description.clone()
    }

    fn get_default_variants(&self) -> Vec<String> {
        self.default_variants.clone()
    }

    fn get_pre_create_attr_defs(&self) -> Vec<AttrDef> {
        self.get_instance_attr_defs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::model::AttrKind;
    use crate::plugin::{CreatorPlugin, PluginRegistry};
    use crate::store::{InMemoryHost, InMemoryProjectStore};
    use serde_json::json;
    use std::sync::Arc;

    fn settings() -> SimpleCreatorConfig {
        SimpleCreatorConfig {
            identifier: None,
            family: "render".to_string(),
            label: Some("  Render  ".to_string()),
            icon: None,
            description: None,
            detailed_description: None,
            default_variants: vec!["Main".to_string()],
            extensions: vec![".exr".to_string()],
            allow_sequences: true,
            allow_multiple_items: false,
            host_name: None,
            enabled: true,
        }
    }

    #[test]
    fn test_from_settings() {
        let creator = SettingsCreator::from_settings(&settings());
        assert_eq!(creator.identifier(), "settings_render");
        assert_eq!(creator.label(), Some("Render"));
        assert_eq!(creator.get_default_variants(), vec!["Main".to_string()]);

        let defs = creator.get_instance_attr_defs();
        assert_eq!(defs[0].key, "representation_files");
        assert!(matches!(
            defs[0].kind,
            AttrKind::File {
                allow_sequences: true,
                single_item: true,
                ..
            }
        ));
        assert_eq!(creator.get_pre_create_attr_defs().len(), defs.len());
    }

    #[test]
    fn test_create_stores_instance_in_host() {
        let host = Arc::new(InMemoryHost::new("traypublisher"));
        let mut registry = PluginRegistry::new();
        registry.register_creator(CreatorPlugin::manual(SettingsCreator::from_settings(&settings())));
        let mut ctx = CreateContext::new(
            host.clone(),
            Arc::new(InMemoryProjectStore::default()),
            Arc::new(registry),
            PipelineConfig::default(),
        );
        ctx.reset(false).unwrap();

        let mut instance_data = DataMap::new();
        instance_data.insert("asset".into(), json!("sh010"));
        ctx.create("settings_render", "Main", instance_data, DataMap::new())
            .unwrap();

        let instance = ctx.instances().next().unwrap();
        assert_eq!(instance.subset_name(), Some("renderMain"));
        assert!(instance.changes().is_empty());
        let stored = host.instance_data(instance.id()).unwrap();
        assert_eq!(stored["settings_creator"], json!(true));

        // Instances are collected back after reset
        ctx.reset(false).unwrap();
        assert_eq!(ctx.instances().count(), 1);

        let instance_id = ctx.instances().next().unwrap().id().to_string();
        ctx.remove_instances(&[instance_id]).unwrap();
        assert_eq!(ctx.instances().count(), 0);
        assert_eq!(host.instance_count(), 0);
    }
}
