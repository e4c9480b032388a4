use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::creators::{SettingsCreator, WorkfileCreator};
use crate::plugin::{ConvertorRef, CreatorPlugin, OptionalPublishPlugin, PublishPluginRef};

pub type CreatorFactory = Box<dyn Fn(&PipelineConfig) -> Vec<CreatorPlugin> + Send + Sync>;
pub type ConvertorFactory = Box<dyn Fn(&PipelineConfig) -> Vec<ConvertorRef> + Send + Sync>;
pub type PublishFactory = Box<dyn Fn(&PipelineConfig) -> Vec<PublishPluginRef> + Send + Sync>;

/// Registered plugins. Factories receive the pipeline configuration on each
/// discovery so configured plugins follow configuration changes.
#[derive(Default)]
pub struct PluginRegistry {
    creator_factories: Vec<CreatorFactory>,
    convertor_factories: Vec<ConvertorFactory>,
    publish_factories: Vec<PublishFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with creators and publish plugins described by configuration.
    pub fn with_builtin_plugins() -> Self {
        let mut registry = Self::new();
        registry
            .register_creator_factory(|config| {
                config
                    .simple_creators
                    .iter()
                    .filter(|settings| settings.enabled)
                    .map(|settings| CreatorPlugin::manual(SettingsCreator::from_settings(settings)))
                    .collect()
            })
            .register_creator_factory(|_| vec![CreatorPlugin::auto(WorkfileCreator::new())])
            .register_publish_factory(|config| {
                config
                    .optional_plugins
                    .iter()
                    .map(|settings| {
                        Arc::new(OptionalPublishPlugin::from_config(settings)) as PublishPluginRef
                    })
                    .collect()
            });
        registry
    }

    pub fn register_creator(&mut self, creator: CreatorPlugin) -> &mut Self {
        self.register_creator_factory(move |_| vec![creator.clone()])
    }

    pub fn register_creator_factory<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&PipelineConfig) -> Vec<CreatorPlugin> + Send + Sync + 'static,
    {
        self.creator_factories.push(Box::new(factory));
        self
    }

    pub fn register_convertor(&mut self, convertor: ConvertorRef) -> &mut Self {
        self.register_convertor_factory(move |_| vec![convertor.clone()])
    }

    pub fn register_convertor_factory<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&PipelineConfig) -> Vec<ConvertorRef> + Send + Sync + 'static,
    {
        self.convertor_factories.push(Box::new(factory));
        self
    }

    pub fn register_publish_plugin(&mut self, plugin: PublishPluginRef) -> &mut Self {
        self.register_publish_factory(move |_| vec![plugin.clone()])
    }

    pub fn register_publish_factory<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&PipelineConfig) -> Vec<PublishPluginRef> + Send + Sync + 'static,
    {
        self.publish_factories.push(Box::new(factory));
        self
    }

    /// Creators in registration order.
    pub fn discover_creators(&self, config: &PipelineConfig) -> Vec<CreatorPlugin> {
        self.creator_factories
            .iter()
            .flat_map(|factory| factory(config))
            .collect()
    }

    pub fn discover_convertors(&self, config: &PipelineConfig) -> Vec<ConvertorRef> {
        self.convertor_factories
            .iter()
            .flat_map(|factory| factory(config))
            .collect()
    }

    pub fn discover_publish_plugins(&self, config: &PipelineConfig) -> Vec<PublishPluginRef> {
        self.publish_factories
            .iter()
            .flat_map(|factory| factory(config))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OptionalPluginConfig, SimpleCreatorConfig};
    use crate::plugin::CreatorInfo;

    #[test]
    fn test_builtin_plugins_follow_config() {
        let registry = PluginRegistry::with_builtin_plugins();
        let mut config = PipelineConfig::default();
        assert_eq!(registry.discover_creators(&config).len(), 1);

        config.simple_creators.push(SimpleCreatorConfig {
            identifier: None,
            family: "render".to_string(),
            label: Some("Render".to_string()),
            icon: None,
            description: None,
            detailed_description: None,
            default_variants: vec!["Main".to_string()],
            extensions: vec![".exr".to_string()],
            allow_sequences: true,
            allow_multiple_items: false,
            host_name: None,
            enabled: true,
        });
        config.optional_plugins.push(OptionalPluginConfig {
            name: "ValidateFrameRange".to_string(),
            label: None,
            families: vec!["render".to_string()],
            active: true,
            context_plugin: false,
        });

        let creators = registry.discover_creators(&config);
        let identifiers: Vec<&str> = creators.iter().map(|c| c.identifier()).collect();
        assert_eq!(identifiers, vec!["settings_render", "workfile"]);
        assert!(creators[1].is_auto());

        let plugins = registry.discover_publish_plugins(&config);
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name(), "ValidateFrameRange");
    }
}
