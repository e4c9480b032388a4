use std::sync::Arc;

use crate::config::SubsetNameConfig;
use crate::error::SubsetNameError;
use crate::logic::CreateContext;
use crate::model::{AssetDoc, AttrDef, CreatedInstance, DataMap, Id, InstanceChanges};
use crate::plugin::subset_name::get_subset_name_with_asset_doc;

/// Metadata every creator, real or a serialized stand-in, provides.
pub trait CreatorInfo {
    /// Identifier of creator (must be unique)
    fn identifier(&self) -> &str;

    /// Family that plugin represents
    fn family(&self) -> &str;

    fn label(&self) -> Option<&str> {
        None
    }

    /// Path to image file or awesome icon name
    fn icon(&self) -> Option<&str> {
        None
    }

    /// Label used to group instances of this creator in UI.
    fn get_group_label(&self) -> String {
        self.label().unwrap_or_else(|| self.identifier()).to_string()
    }

    /// Definitions of creator specific values stored on instances
    fn get_instance_attr_defs(&self) -> Vec<AttrDef> {
        Vec::new()
    }
}

/// One instance with the changes that should be written to the host.
#[derive(Debug)]
pub struct UpdateData<'a> {
    pub instance: &'a CreatedInstance,
    pub changes: InstanceChanges,
}

/// Plugin that creates and updates instance data before publishing.
///
/// A single creator object handles all of its instances, so no per-instance
/// state should live on the creator itself.
pub trait BaseCreator: CreatorInfo + Send + Sync {
    /// Creator is used only in host with this name
    fn host_name(&self) -> Option<&str> {
        None
    }

    fn enabled(&self) -> bool {
        true
    }

    /// Find existing instances in the host and add them to the context.
    fn collect_instances(&self, ctx: &mut CreateContext) -> anyhow::Result<()>;

    /// Store changes of passed instances in the host.
    fn update_instances(&self, ctx: &CreateContext, updates: &[UpdateData<'_>])
        -> anyhow::Result<()>;

    /// Dynamic data for subset name filling.
    fn get_dynamic_data(
        &self,
        _variant: &str,
        _task_name: Option<&str>,
        _asset_doc: Option<&AssetDoc>,
        _project_name: Option<&str>,
        _host_name: Option<&str>,
    ) -> DataMap {
        DataMap::new()
    }

    /// Subset name for passed context.
    fn get_subset_name(
        &self,
        templates: &SubsetNameConfig,
        variant: &str,
        task_name: Option<&str>,
        asset_doc: Option<&AssetDoc>,
        project_name: Option<&str>,
        host_name: Option<&str>,
    ) -> Result<String, SubsetNameError> {
        let dynamic_data =
            self.get_dynamic_data(variant, task_name, asset_doc, project_name, host_name);
        get_subset_name_with_asset_doc(
            templates,
            self.family(),
            variant,
            task_name,
            asset_doc,
            project_name,
            host_name,
            Some(&dynamic_data),
        )
    }
}

/// Creator triggered by artist with prepared subset name and instance data.
pub trait Creator: BaseCreator {
    /// Create new instance and store it in the host.
    fn create(
        &self,
        ctx: &mut CreateContext,
        subset_name: &str,
        instance_data: DataMap,
        pre_create_data: DataMap,
    ) -> anyhow::Result<()>;

    /// Remove instance metadata from the host.
    ///
    /// Instances should be dropped from the context with
    /// [`CreateContext::creator_removed_instance`].
    fn remove_instances(&self, ctx: &mut CreateContext, instance_ids: &[Id]) -> anyhow::Result<()>;

    fn get_description(&self) -> Option<String> {
        None
    }

    /// Detailed description, may contain markdown.
    fn get_detail_description(&self) -> Option<String> {
        None
    }

    /// Variants offered to the artist
    fn get_default_variants(&self) -> Vec<String> {
        Vec::new()
    }

    /// Prefilled variant; first of default variants is used when `None`
    fn get_default_variant(&self) -> Option<String> {
        None
    }

    fn create_allow_context_change(&self) -> bool {
        true
    }

    /// Definitions of values passed to [`Creator::create`] as pre create data
    fn get_pre_create_attr_defs(&self) -> Vec<AttrDef> {
        Vec::new()
    }
}

/// Creator which is triggered automatically on each reset, e.g. for workfile.
pub trait AutoCreator: BaseCreator {
    fn create(&self, ctx: &mut CreateContext) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub enum CreatorPlugin {
    Manual(Arc<dyn Creator>),
    Auto(Arc<dyn AutoCreator>),
}

macro_rules! with_base {
    ($plugin:expr, $creator:ident => $body:expr) => {
        match $plugin {
            CreatorPlugin::Manual($creator) => $body,
            CreatorPlugin::Auto($creator) => $body,
        }
    };
}

impl CreatorPlugin {
    pub fn manual<C: Creator + 'static>(creator: C) -> Self {
        CreatorPlugin::Manual(Arc::new(creator))
    }

    pub fn auto<C: AutoCreator + 'static>(creator: C) -> Self {
        CreatorPlugin::Auto(Arc::new(creator))
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, CreatorPlugin::Auto(_))
    }

    pub fn as_manual(&self) -> Option<&Arc<dyn Creator>> {
        match self {
            CreatorPlugin::Manual(creator) => Some(creator),
            CreatorPlugin::Auto(_) => None,
        }
    }

    pub fn host_name(&self) -> Option<&str> {
        with_base!(self, creator => creator.host_name())
    }

    pub fn enabled(&self) -> bool {
        with_base!(self, creator => creator.enabled())
    }

    pub fn collect_instances(&self, ctx: &mut CreateContext) -> anyhow::Result<()> {
        with_base!(self, creator => creator.collect_instances(ctx))
    }

    pub fn update_instances(
        &self,
        ctx: &CreateContext,
        updates: &[UpdateData<'_>],
    ) -> anyhow::Result<()> {
        with_base!(self, creator => creator.update_instances(ctx, updates))
    }

    /// Auto creators don't allow removing of their instances.
    pub fn remove_instances(&self, ctx: &mut CreateContext, instance_ids: &[Id]) -> anyhow::Result<()> {
        match self {
            CreatorPlugin::Manual(creator) => creator.remove_instances(ctx, instance_ids),
            CreatorPlugin::Auto(_) => Ok(()),
        }
    }

    pub fn get_subset_name(
        &self,
        templates: &SubsetNameConfig,
        variant: &str,
        task_name: Option<&str>,
        asset_doc: Option<&AssetDoc>,
        project_name: Option<&str>,
        host_name: Option<&str>,
    ) -> Result<String, SubsetNameError> {
        with_base!(self, creator => creator.get_subset_name(
            templates,
            variant,
            task_name,
            asset_doc,
            project_name,
            host_name,
        ))
    }
}

impl CreatorInfo for CreatorPlugin {
    fn identifier(&self) -> &str {
        with_base!(self, creator => creator.identifier())
    }

    fn family(&self) -> &str {
        with_base!(self, creator => creator.family())
    }

    fn label(&self) -> Option<&str> {
        with_base!(self, creator => creator.label())
    }

    fn icon(&self) -> Option<&str> {
        with_base!(self, creator => creator.icon())
    }

    fn get_group_label(&self) -> String {
        with_base!(self, creator => creator.get_group_label())
    }

    fn get_instance_attr_defs(&self) -> Vec<AttrDef> {
        with_base!(self, creator => creator.get_instance_attr_defs())
    }
}

impl std::fmt::Debug for CreatorPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_auto() { "Auto" } else { "Manual" };
        f.debug_struct("CreatorPlugin")
            .field("kind", &kind)
            .field("identifier", &self.identifier())
            .finish()
    }
}
