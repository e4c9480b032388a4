use indexmap::IndexMap;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{
    CreateError, CreateResult, CreatorError, FailedInfo, OperationFailed, SubsetNameError,
};
use crate::logic::failures::{catch_plugin_error, FailedInfoCollector};
use crate::logic::validate;
use crate::model::{
    ContextChanges, ConvertorItem, CreatedInstance, CreatorItem, DataMap, Id, PublishAttributes,
    RemoteChanges, PUBLISH_ATTRIBUTES_KEY,
};
use crate::plugin::{
    is_valid_subset_name, plugins_by_families, plugins_by_targets, AutoCreator, ConvertorRef,
    Creator, CreatorInfo, CreatorPlugin, PluginRegistry, PublishPluginRef, UpdateData,
};
use crate::store::{get_host_missing_methods, Host, ProjectStore};

/// Context of instance creation.
///
/// Owns all instances of the current workfile and calls creator plugins,
/// isolating failures of each plugin from the others. Context data not
/// related to any instance (context publish attributes) live here as well.
pub struct CreateContext {
    host: Arc<dyn Host>,
    project_store: Arc<dyn ProjectStore>,
    registry: Arc<PluginRegistry>,
    config: PipelineConfig,
    host_is_valid: bool,

    project_name: Option<String>,
    asset_name: Option<String>,
    task_name: Option<String>,

    publish_attributes: PublishAttributes,
    original_context_data: DataMap,

    instances_by_id: IndexMap<Id, CreatedInstance>,
    creators: IndexMap<String, CreatorPlugin>,
    convertors_plugins: IndexMap<String, ConvertorRef>,
    /// Convertor items by convertor identifier
    convertor_items_by_id: IndexMap<String, ConvertorItem>,

    publish_plugins: Vec<PublishPluginRef>,
    publish_plugins_mismatch_targets: Vec<PublishPluginRef>,
    plugins_with_defs: Vec<PublishPluginRef>,
    attr_plugins_by_family: HashMap<String, Vec<PublishPluginRef>>,

    bulk_counter: usize,
    bulk_instances_to_process: Vec<Id>,
    collection_shared_data: Option<DataMap>,
}

impl CreateContext {
    /// Create context without reset. Call [`CreateContext::reset`] to load
    /// plugins and instances.
    pub fn new(
        host: Arc<dyn Host>,
        project_store: Arc<dyn ProjectStore>,
        registry: Arc<PluginRegistry>,
        config: PipelineConfig,
    ) -> Self {
        let missing_methods = get_host_missing_methods(host.as_ref());
        let host_is_valid = missing_methods.is_empty();
        if !host_is_valid {
            warn!(
                "Host miss required methods to be able use creation. Missing methods: {}",
                missing_methods.join(", ")
            );
        }

        Self {
            host,
            project_store,
            registry,
            config,
            host_is_valid,
            project_name: None,
            asset_name: None,
            task_name: None,
            publish_attributes: PublishAttributes::empty(),
            original_context_data: DataMap::new(),
            instances_by_id: IndexMap::new(),
            creators: IndexMap::new(),
            convertors_plugins: IndexMap::new(),
            convertor_items_by_id: IndexMap::new(),
            publish_plugins: Vec::new(),
            publish_plugins_mismatch_targets: Vec::new(),
            plugins_with_defs: Vec::new(),
            attr_plugins_by_family: HashMap::new(),
            bulk_counter: 0,
            bulk_instances_to_process: Vec::new(),
            collection_shared_data: None,
        }
    }

    // --- Accessors ---

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn project_store(&self) -> &Arc<dyn ProjectStore> {
        &self.project_store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn host_is_valid(&self) -> bool {
        self.host_is_valid
    }

    pub fn host_name(&self) -> String {
        let name = self.host.name();
        if name.is_empty() {
            self.config.session.app_name().unwrap_or_default()
        } else {
            name.to_string()
        }
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    /// Asset of the current context
    pub fn asset_name(&self) -> Option<&str> {
        self.asset_name.as_deref()
    }

    /// Task of the current context
    pub fn task_name(&self) -> Option<&str> {
        self.task_name.as_deref()
    }

    pub fn instances(&self) -> impl Iterator<Item = &CreatedInstance> {
        self.instances_by_id.values()
    }

    pub fn instances_by_id(&self) -> &IndexMap<Id, CreatedInstance> {
        &self.instances_by_id
    }

    pub fn get_instance(&self, instance_id: &str) -> Option<&CreatedInstance> {
        self.instances_by_id.get(instance_id)
    }

    pub fn get_instance_mut(&mut self, instance_id: &str) -> Option<&mut CreatedInstance> {
        self.instances_by_id.get_mut(instance_id)
    }

    pub fn creators(&self) -> &IndexMap<String, CreatorPlugin> {
        &self.creators
    }

    pub fn get_creator(&self, identifier: &str) -> Option<&CreatorPlugin> {
        self.creators.get(identifier)
    }

    pub fn manual_creators(&self) -> impl Iterator<Item = (&str, &Arc<dyn Creator>)> {
        self.creators
            .iter()
            .filter_map(|(identifier, plugin)| match plugin {
                CreatorPlugin::Manual(creator) => Some((identifier.as_str(), creator)),
                CreatorPlugin::Auto(_) => None,
            })
    }

    pub fn autocreators(&self) -> impl Iterator<Item = (&str, &Arc<dyn AutoCreator>)> {
        self.creators
            .iter()
            .filter_map(|(identifier, plugin)| match plugin {
                CreatorPlugin::Auto(creator) => Some((identifier.as_str(), creator)),
                CreatorPlugin::Manual(_) => None,
            })
    }

    /// Serializable creator items for remote instance mirrors.
    pub fn creator_items(&self) -> HashMap<String, CreatorItem> {
        self.creators
            .iter()
            .map(|(identifier, plugin)| (identifier.clone(), CreatorItem::from_plugin(plugin)))
            .collect()
    }

    pub fn convertors_plugins(&self) -> &IndexMap<String, ConvertorRef> {
        &self.convertors_plugins
    }

    pub fn convertor_items_by_id(&self) -> &IndexMap<String, ConvertorItem> {
        &self.convertor_items_by_id
    }

    /// Access to global publish attributes.
    pub fn publish_attributes(&self) -> &PublishAttributes {
        &self.publish_attributes
    }

    pub fn publish_attributes_mut(&mut self) -> &mut PublishAttributes {
        &mut self.publish_attributes
    }

    pub fn original_context_data(&self) -> &DataMap {
        &self.original_context_data
    }

    /// Publish plugins matching registered targets
    pub fn publish_plugins(&self) -> &[PublishPluginRef] {
        &self.publish_plugins
    }

    pub fn publish_plugins_mismatch_targets(&self) -> &[PublishPluginRef] {
        &self.publish_plugins_mismatch_targets
    }

    pub fn plugins_with_defs(&self) -> &[PublishPluginRef] {
        &self.plugins_with_defs
    }

    /// Shared data that creators can use during collection phase.
    pub fn collection_shared_data(&mut self) -> CreateResult<&mut DataMap> {
        self.collection_shared_data
            .as_mut()
            .ok_or(CreateError::UnavailableSharedData)
    }

    // --- Reset ---

    /// Reset context with all plugins and instances.
    ///
    /// Unsaved changes are lost. Every phase runs even if a previous one
    /// failed; failures of all phases are returned together.
    pub fn reset(&mut self, discover_publish_plugins: bool) -> CreateResult<()> {
        self.reset_preparation();

        self.reset_avalon_context();
        self.reset_plugins(discover_publish_plugins);
        if let Err(err) = self.reset_context_data() {
            self.reset_finalization();
            return Err(err);
        }

        let failures = self.bulk_instances_collection(|ctx| {
            [
                ctx.reset_instances(),
                ctx.find_convertor_items(),
                ctx.execute_autocreators(),
            ]
            .into_iter()
            .filter_map(Result::err)
            .collect::<Vec<_>>()
        });

        self.reset_finalization();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CreateError::ResetFailed(failures))
        }
    }

    /// Prepare attributes that must be prepared/cleaned before reset.
    pub fn reset_preparation(&mut self) {
        self.collection_shared_data = Some(DataMap::new());
    }

    /// Cleanup of attributes after reset.
    pub fn reset_finalization(&mut self) {
        self.collection_shared_data = None;
    }

    /// Resolve current project, asset and task from the host or the session.
    pub fn reset_avalon_context(&mut self) {
        let host_context = self.host.get_current_context().unwrap_or_default();
        let session = &self.config.session;

        self.project_name = host_context
            .project_name
            .filter(|name| !name.is_empty())
            .or_else(|| session.project_name());
        self.asset_name = host_context
            .asset_name
            .filter(|name| !name.is_empty())
            .or_else(|| session.asset_name());
        self.task_name = host_context
            .task_name
            .filter(|name| !name.is_empty())
            .or_else(|| session.task_name());
        debug!(
            "Context reset to project {:?}, asset {:?}, task {:?}",
            self.project_name, self.asset_name, self.task_name
        );
    }

    /// Reload publish plugins (optional), creators and convertors.
    pub fn reset_plugins(&mut self, discover_publish_plugins: bool) {
        self.reset_publish_plugins(discover_publish_plugins);
        self.reset_creator_plugins();
        self.reset_convertor_plugins();
    }

    fn reset_publish_plugins(&mut self, discover_publish_plugins: bool) {
        self.attr_plugins_by_family.clear();

        let mut publish_plugins = Vec::new();
        let mut plugins_with_defs = Vec::new();
        let mut plugins_mismatch_targets = Vec::new();
        if discover_publish_plugins && self.config.publish.discover_plugins {
            let discovered = self.registry.discover_publish_plugins(&self.config);
            let targets = self.config.publish.registered_targets();
            publish_plugins = plugins_by_targets(&discovered, &targets);

            plugins_mismatch_targets = discovered
                .iter()
                .filter(|plugin| !publish_plugins.iter().any(|item| Arc::ptr_eq(item, plugin)))
                .cloned()
                .collect();
            plugins_with_defs = discovered
                .into_iter()
                .filter(|plugin| !plugin.get_attribute_defs().is_empty())
                .collect();
        }

        self.publish_plugins = publish_plugins;
        self.publish_plugins_mismatch_targets = plugins_mismatch_targets;
        self.plugins_with_defs = plugins_with_defs;
    }

    fn reset_creator_plugins(&mut self) {
        let host_name = self.host_name();
        let mut creators = IndexMap::new();
        for creator in self.registry.discover_creators(&self.config) {
            let identifier = creator.identifier().to_string();
            if creators.contains_key(&identifier) {
                warn!(
                    "Duplicated Creator identifier \"{}\". Using first and skipping following",
                    identifier
                );
                continue;
            }

            if let Some(creator_host) = creator.host_name() {
                if creator_host != host_name {
                    info!(
                        "Creator's host name \"{}\" is not supported for current host \"{}\"",
                        creator_host, host_name
                    );
                    continue;
                }
            }

            if !creator.enabled() {
                info!("Skipping disabled Creator \"{}\"", identifier);
                continue;
            }

            creators.insert(identifier, creator);
        }
        self.creators = creators;
    }

    fn reset_convertor_plugins(&mut self) {
        let mut convertors_plugins = IndexMap::new();
        for convertor in self.registry.discover_convertors(&self.config) {
            let identifier = convertor.identifier().to_string();
            if convertors_plugins.contains_key(&identifier) {
                warn!(
                    "Duplicated Converter identifier \"{}\". Using first and skipping following",
                    identifier
                );
                continue;
            }
            convertors_plugins.insert(identifier, convertor);
        }
        self.convertors_plugins = convertors_plugins;
    }

    /// Reload context data using host implementation.
    pub fn reset_context_data(&mut self) -> CreateResult<()> {
        let host = self.host.clone();
        let publish_host = match host.publish_host() {
            Some(publish_host) if self.host_is_valid => publish_host,
            _ => {
                self.original_context_data = DataMap::new();
                self.publish_attributes = PublishAttributes::empty();
                return Ok(());
            }
        };

        let original_data = publish_host.get_context_data().map_err(CreateError::Host)?;
        let publish_attributes = match original_data.get(PUBLISH_ATTRIBUTES_KEY) {
            Some(Value::Object(map)) => map.clone(),
            _ => DataMap::new(),
        };
        self.original_context_data = original_data;

        let attr_plugins = self.get_publish_plugins_with_attr_for_context();
        self.publish_attributes = PublishAttributes::new(publish_attributes, &attr_plugins);
        Ok(())
    }

    /// Data that should be stored by host function.
    pub fn context_data_to_store(&self) -> DataMap {
        let mut output = DataMap::new();
        output.insert(
            PUBLISH_ATTRIBUTES_KEY.to_string(),
            Value::Object(self.publish_attributes.data_to_store()),
        );
        output
    }

    pub fn context_data_changes(&self) -> ContextChanges {
        ContextChanges {
            publish_attributes: self.publish_attributes.changes(),
        }
    }

    // --- Instances ---

    /// Creator adds new instance to context.
    ///
    /// Publish attributes are prepared for the instance family and context
    /// of the instance is validated when the outermost bulk scope ends.
    pub fn creator_adds_instance(&mut self, mut instance: CreatedInstance) {
        let instance_id = instance.id().to_string();
        if self.instances_by_id.contains_key(&instance_id) {
            warn!(
                "Instance with id {} is already added to context.",
                instance_id
            );
            return;
        }

        let family = instance.family().to_string();
        let attr_plugins = self.get_publish_plugins_with_attr_for_family(&family);
        instance.set_publish_plugins(&attr_plugins);
        self.instances_by_id.insert(instance_id.clone(), instance);

        self.bulk_instances_collection(|ctx| ctx.bulk_instances_to_process.push(instance_id));
    }

    /// Creator acknowledges the instance was removed from the host.
    pub fn creator_removed_instance(&mut self, instance_id: &str) -> Option<CreatedInstance> {
        self.instances_by_id.shift_remove(instance_id)
    }

    /// Apply changes made on a remote mirror of an instance.
    pub fn update_instance_from_remote(
        &mut self,
        instance_id: &str,
        remote_changes: &RemoteChanges,
    ) -> CreateResult<()> {
        let instance = self
            .instances_by_id
            .get_mut(instance_id)
            .ok_or_else(|| CreateError::UnknownInstance(instance_id.to_string()))?;
        instance.update_from_remote(remote_changes)
    }

    pub fn add_convertor_item(&mut self, convertor_identifier: &str, label: &str) {
        self.convertor_items_by_id.insert(
            convertor_identifier.to_string(),
            ConvertorItem::new(convertor_identifier, label),
        );
    }

    pub fn remove_convertor_item(&mut self, convertor_identifier: &str) {
        self.convertor_items_by_id.shift_remove(convertor_identifier);
    }

    /// Validate context of instances added inside `operation` in bulk.
    ///
    /// Scopes can be nested; validation runs once when the outermost ends.
    /// A panic inside `operation` still closes the scope before unwinding.
    pub fn bulk_instances_collection<T>(&mut self, operation: impl FnOnce(&mut Self) -> T) -> T {
        self.bulk_counter += 1;
        let result = panic::catch_unwind(AssertUnwindSafe(|| operation(&mut *self)));
        self.bulk_counter -= 1;
        let output = match result {
            Ok(output) => output,
            Err(payload) => panic::resume_unwind(payload),
        };

        if self.bulk_counter == 0 {
            let instance_ids = std::mem::take(&mut self.bulk_instances_to_process);
            if !instance_ids.is_empty() {
                if let Err(err) = self.validate_instances_context(Some(&instance_ids)) {
                    error!("Failed to validate context of instances: {:?}", err);
                }
            }
        }
        output
    }

    /// Validate "asset" and "task" of passed or all instances.
    pub fn validate_instances_context(&mut self, instance_ids: Option<&[Id]>) -> anyhow::Result<()> {
        let project_name = self.project_name.clone().unwrap_or_default();
        let instances: Vec<&mut CreatedInstance> = match instance_ids {
            None => self.instances_by_id.values_mut().collect(),
            Some(instance_ids) => self
                .instances_by_id
                .iter_mut()
                .filter(|(instance_id, _)| instance_ids.contains(*instance_id))
                .map(|(_, instance)| instance)
                .collect(),
        };
        validate::validate_instances_context(self.project_store.as_ref(), &project_name, instances)
    }

    /// Reload instances of all creators.
    pub fn reset_instances(&mut self) -> Result<(), OperationFailed> {
        self.instances_by_id.clear();

        let mut collector = FailedInfoCollector::new();
        let creators: Vec<CreatorPlugin> = self.creators.values().cloned().collect();
        for creator in creators {
            let identifier = creator.identifier().to_string();
            if let Err(failure) = catch_plugin_error(|| creator.collect_instances(self)) {
                warn!(
                    "Collection of instances for creator {} failed. {}",
                    identifier, failure.message
                );
                collector.push_creator(&identifier, creator.label(), failure);
            }
        }
        collector.finish(|failed_info| OperationFailed::CreatorsCollectionFailed { failed_info })
    }

    /// Go through convertor plugins to look for items to convert.
    pub fn find_convertor_items(&mut self) -> Result<(), OperationFailed> {
        self.convertor_items_by_id.clear();

        let mut collector = FailedInfoCollector::new();
        let convertors: Vec<ConvertorRef> = self.convertors_plugins.values().cloned().collect();
        for convertor in convertors {
            if let Err(failure) = catch_plugin_error(|| convertor.find_instances(self)) {
                warn!(
                    "Failed to find instances of convertor \"{}\". {}",
                    convertor.identifier(),
                    failure.message
                );
                collector.push_convertor(convertor.identifier(), failure);
            }
        }
        collector.finish(|failed_info| OperationFailed::ConvertorsFindFailed { failed_info })
    }

    /// Execute discovered auto creators.
    pub fn execute_autocreators(&mut self) -> Result<(), OperationFailed> {
        let mut collector = FailedInfoCollector::new();
        let autocreators: Vec<(String, Arc<dyn AutoCreator>)> = self
            .autocreators()
            .map(|(identifier, creator)| (identifier.to_string(), creator.clone()))
            .collect();
        for (identifier, creator) in autocreators {
            if let Err(failure) = catch_plugin_error(|| creator.create(self)) {
                warn!(
                    "Failed to run AutoCreator with identifier \"{}\". {}",
                    identifier, failure.message
                );
                collector.push_creator(&identifier, creator.label(), failure);
            }
        }
        collector.finish(|failed_info| OperationFailed::CreatorsCreateFailed { failed_info })
    }

    /// Trigger create of a creator.
    ///
    /// For manual creators the subset name is computed from `variant` and
    /// the asset/task found in `instance_data` or in the current context.
    /// Auto creators ignore all arguments.
    pub fn create(
        &mut self,
        identifier: &str,
        variant: &str,
        instance_data: DataMap,
        pre_create_data: DataMap,
    ) -> CreateResult<()> {
        let Some(creator) = self.creators.get(identifier).cloned() else {
            warn!("Failed to run Creator with identifier \"{}\". Creator was not found", identifier);
            return Err(OperationFailed::CreatorsCreateFailed {
                failed_info: vec![FailedInfo {
                    identifier: identifier.to_string(),
                    label: None,
                    message: format!("Creator \"{}\" was not found", identifier),
                    traceback: None,
                }],
            }
            .into());
        };

        let result = catch_plugin_error(|| match &creator {
            CreatorPlugin::Manual(manual) => {
                let (subset_name, instance_data) =
                    self.prepare_create_data(&creator, variant, instance_data)?;
                manual.create(self, &subset_name, instance_data, pre_create_data)
            }
            CreatorPlugin::Auto(auto) => auto.create(self),
        });

        if let Err(failure) = result {
            warn!(
                "Failed to run Creator with identifier \"{}\". {}",
                identifier, failure.message
            );
            let mut collector = FailedInfoCollector::new();
            collector.push_creator(identifier, creator.label(), failure);
            collector.finish(|failed_info| OperationFailed::CreatorsCreateFailed { failed_info })?;
        }
        Ok(())
    }

    fn prepare_create_data(
        &self,
        creator: &CreatorPlugin,
        variant: &str,
        mut instance_data: DataMap,
    ) -> anyhow::Result<(String, DataMap)> {
        let asset_name = instance_data
            .get("asset")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.asset_name.clone());
        let task_name = instance_data
            .get("task")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.task_name.clone());
        let project_name = self.project_name.clone().unwrap_or_default();

        let asset_doc = match &asset_name {
            Some(asset_name) => self
                .project_store
                .get_asset_by_name(&project_name, asset_name)?,
            None => None,
        };

        let host_name = self.host_name();
        let subset_name = creator
            .get_subset_name(
                &self.config.subset_name,
                variant,
                task_name.as_deref(),
                asset_doc.as_ref(),
                Some(&project_name),
                Some(&host_name),
            )
            .map_err(|err| CreatorError::new(err.to_string()))?;
        if !is_valid_subset_name(&subset_name) {
            let err = SubsetNameError::InvalidCharacters { name: subset_name };
            return Err(CreatorError::new(err.to_string()).into());
        }

        if let Some(asset_name) = asset_name {
            instance_data.insert("asset".into(), Value::String(asset_name));
        }
        instance_data.insert(
            "task".into(),
            task_name.map(Value::String).unwrap_or(Value::Null),
        );
        instance_data.insert("variant".into(), Value::String(variant.to_string()));
        Ok((subset_name, instance_data))
    }

    // --- Save / remove ---

    /// Save context and instance changes.
    pub fn save_changes(&mut self) -> CreateResult<()> {
        if !self.host_is_valid {
            return Err(CreateError::HostMissRequiredMethod {
                host: self.host_name(),
                missing_methods: get_host_missing_methods(self.host.as_ref()),
            });
        }

        self.save_context_changes()?;
        self.save_instance_changes()?;
        Ok(())
    }

    fn save_context_changes(&mut self) -> CreateResult<()> {
        let changes = self.context_data_changes();
        if changes.is_empty() {
            return Ok(());
        }

        let host = self.host.clone();
        let publish_host = host.publish_host().ok_or_else(|| CreateError::HostMissRequiredMethod {
            host: self.host_name(),
            missing_methods: get_host_missing_methods(host.as_ref()),
        })?;
        publish_host
            .update_context_data(self.context_data_to_store(), &changes)
            .map_err(CreateError::Host)?;
        self.publish_attributes.mark_as_stored();
        Ok(())
    }

    /// Call `update_instances` once per creator with all its changed instances.
    fn save_instance_changes(&mut self) -> Result<(), OperationFailed> {
        let mut ids_by_identifier: IndexMap<String, Vec<Id>> = IndexMap::new();
        for (instance_id, instance) in &self.instances_by_id {
            ids_by_identifier
                .entry(instance.creator_identifier().to_string())
                .or_default()
                .push(instance_id.clone());
        }

        let mut collector = FailedInfoCollector::new();
        let mut stored_ids: Vec<Id> = Vec::new();
        for (identifier, instance_ids) in ids_by_identifier {
            let Some(creator) = self.creators.get(&identifier).cloned() else {
                warn!(
                    "Creator \"{}\" is not available, skipping update of its instances",
                    identifier
                );
                continue;
            };

            let updates: Vec<UpdateData<'_>> = instance_ids
                .iter()
                .filter_map(|instance_id| self.instances_by_id.get(instance_id))
                .filter_map(|instance| {
                    let changes = instance.changes();
                    (!changes.is_empty()).then_some(UpdateData { instance, changes })
                })
                .collect();
            if updates.is_empty() {
                continue;
            }

            let ctx: &Self = self;
            match catch_plugin_error(|| creator.update_instances(ctx, &updates)) {
                Ok(()) => stored_ids.extend(
                    updates
                        .iter()
                        .map(|update| update.instance.id().to_string()),
                ),
                Err(failure) => {
                    warn!(
                        "Instances update of creator \"{}\" failed. {}",
                        identifier, failure.message
                    );
                    collector.push_creator(&identifier, creator.label(), failure);
                }
            }
        }

        for instance_id in stored_ids {
            if let Some(instance) = self.instances_by_id.get_mut(&instance_id) {
                instance.mark_as_stored();
            }
        }
        collector.finish(|failed_info| OperationFailed::CreatorsSaveFailed { failed_info })
    }

    /// Remove instances through their creators.
    pub fn remove_instances(&mut self, instance_ids: &[Id]) -> CreateResult<()> {
        let mut ids_by_identifier: IndexMap<String, Vec<Id>> = IndexMap::new();
        for instance_id in instance_ids {
            match self.instances_by_id.get(instance_id) {
                Some(instance) => ids_by_identifier
                    .entry(instance.creator_identifier().to_string())
                    .or_default()
                    .push(instance_id.clone()),
                None => warn!("Instance {} is not in context, skipping removal", instance_id),
            }
        }

        let mut collector = FailedInfoCollector::new();
        for (identifier, creator_instance_ids) in ids_by_identifier {
            let Some(creator) = self.creators.get(&identifier).cloned() else {
                collector.push(FailedInfo {
                    identifier: identifier.clone(),
                    label: None,
                    message: format!("Creator \"{}\" was not found", identifier),
                    traceback: None,
                });
                continue;
            };

            match catch_plugin_error(|| creator.remove_instances(self, &creator_instance_ids)) {
                Ok(()) => {
                    if !creator.is_auto() {
                        for instance_id in &creator_instance_ids {
                            self.instances_by_id.shift_remove(instance_id);
                        }
                    }
                }
                Err(failure) => {
                    warn!(
                        "Instances removement of creator \"{}\" failed. {}",
                        identifier, failure.message
                    );
                    collector.push_creator(&identifier, creator.label(), failure);
                }
            }
        }
        collector.finish(|failed_info| OperationFailed::CreatorsRemoveFailed { failed_info })?;
        Ok(())
    }

    // --- Publish plugins ---

    /// Instance publish plugins with attributes for a family. Cached per family.
    pub fn get_publish_plugins_with_attr_for_family(&mut self, family: &str) -> Vec<PublishPluginRef> {
        if let Some(plugins) = self.attr_plugins_by_family.get(family) {
            return plugins.clone();
        }

        let plugins: Vec<PublishPluginRef> = plugins_by_families(&self.plugins_with_defs, &[family])
            .into_iter()
            .filter(|plugin| plugin.instance_enabled())
            .collect();
        self.attr_plugins_by_family
            .insert(family.to_string(), plugins.clone());
        plugins
    }

    /// Context publish plugins with attributes.
    pub fn get_publish_plugins_with_attr_for_context(&self) -> Vec<PublishPluginRef> {
        self.plugins_with_defs
            .iter()
            .filter(|plugin| !plugin.instance_enabled())
            .cloned()
            .collect()
    }

    // --- Convertors ---

    /// Run convertor by its identifier. Unknown convertors are skipped.
    pub fn run_convertor(&mut self, convertor_identifier: &str) -> anyhow::Result<()> {
        match self.convertors_plugins.get(convertor_identifier).cloned() {
            Some(convertor) => convertor.convert(self),
            None => Ok(()),
        }
    }

    /// Run convertors. A reset is recommended afterwards to reload instances.
    pub fn run_convertors<S: AsRef<str>>(&mut self, convertor_identifiers: &[S]) -> CreateResult<()> {
        let mut collector = FailedInfoCollector::new();
        for convertor_identifier in convertor_identifiers {
            let convertor_identifier = convertor_identifier.as_ref();
            if let Err(failure) = catch_plugin_error(|| self.run_convertor(convertor_identifier)) {
                warn!(
                    "Failed to convert instances of convertor \"{}\". {}",
                    convertor_identifier, failure.message
                );
                collector.push_convertor(convertor_identifier, failure);
            }
        }
        collector
            .finish(|failed_info| OperationFailed::ConvertorsConversionFailed { failed_info })?;
        Ok(())
    }
}

impl std::fmt::Debug for CreateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateContext")
            .field("host", &self.host.name())
            .field("project_name", &self.project_name)
            .field("asset_name", &self.asset_name)
            .field("task_name", &self.task_name)
            .field("creators", &self.creators.keys().collect::<Vec<_>>())
            .field("instances", &self.instances_by_id.len())
            .finish()
    }
}
