use serde_json::Value;
use std::sync::Arc;

use crate::config::OptionalPluginConfig;
use crate::model::{AttrDef, DataMap};

/// Publish plugin as seen by the create context.
///
/// Only the parts needed to build publish attributes are described here,
/// processing of instances happens elsewhere.
pub trait PublishPlugin: Send + Sync {
    /// Unique name, used as key in publish attributes
    fn name(&self) -> &str;

    fn label(&self) -> Option<&str> {
        None
    }

    /// Families the plugin processes, "*" matches every family
    fn families(&self) -> Vec<String> {
        vec!["*".to_string()]
    }

    fn targets(&self) -> Vec<String> {
        vec!["default".to_string()]
    }

    /// Instance plugin when true, context plugin otherwise
    fn instance_enabled(&self) -> bool {
        true
    }

    fn get_attribute_defs(&self) -> Vec<AttrDef> {
        Vec::new()
    }

    /// Migrate stored values before they are wrapped into attribute values.
    ///
    /// `attribute_values` holds values of all plugins keyed by plugin name.
    fn convert_attribute_values(&self, attribute_values: &mut DataMap) {
        let Some(Value::Object(plugin_values)) = attribute_values.get_mut(self.name()) else {
            return;
        };
        for attr_def in self.get_attribute_defs() {
            if let Some(value) = plugin_values.get_mut(&attr_def.key) {
                *value = attr_def.convert_value(value);
            }
        }
    }
}

pub type PublishPluginRef = Arc<dyn PublishPlugin>;

pub fn plugin_matches_family(plugin: &dyn PublishPlugin, family: &str) -> bool {
    plugin
        .families()
        .iter()
        .any(|item| item == "*" || item == family)
}

pub fn plugins_by_families(plugins: &[PublishPluginRef], families: &[&str]) -> Vec<PublishPluginRef> {
    plugins
        .iter()
        .filter(|plugin| {
            families
                .iter()
                .any(|family| plugin_matches_family(plugin.as_ref(), family))
        })
        .cloned()
        .collect()
}

pub fn plugins_by_targets(plugins: &[PublishPluginRef], targets: &[String]) -> Vec<PublishPluginRef> {
    plugins
        .iter()
        .filter(|plugin| plugin.targets().iter().any(|target| targets.contains(target)))
        .cloned()
        .collect()
}

/// Plugin that can be turned off per instance (or for the context).
#[derive(Debug, Clone)]
pub struct OptionalPublishPlugin {
    name: String,
    label: Option<String>,
    families: Vec<String>,
    active: bool,
    context_plugin: bool,
}

impl OptionalPublishPlugin {
    pub fn new(name: impl Into<String>, families: Vec<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            families,
            active: true,
            context_plugin: false,
        }
    }

    pub fn from_config(config: &OptionalPluginConfig) -> Self {
        Self {
            name: config.name.clone(),
            label: config.label.clone(),
            families: config.families.clone(),
            active: config.active,
            context_plugin: config.context_plugin,
        }
    }
}

impl PublishPlugin for OptionalPublishPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn families(&self) -> Vec<String> {
        if self.families.is_empty() {
            vec!["*".to_string()]
        } else {
            self.families.clone()
        }
    }

    fn instance_enabled(&self) -> bool {
        !self.context_plugin
    }

    fn get_attribute_defs(&self) -> Vec<AttrDef> {
        vec![AttrDef::boolean("active", self.active)
            .with_label(self.label.clone().unwrap_or_else(|| self.name.clone()))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_family_and_target_filters() {
        let all: PublishPluginRef = Arc::new(OptionalPublishPlugin::new("ValidateAll", Vec::new()));
        let render: PublishPluginRef = Arc::new(OptionalPublishPlugin::new(
            "ValidateRender",
            vec!["render".to_string()],
        ));
        let plugins = vec![all, render];

        let for_model = plugins_by_families(&plugins, &["model"]);
        assert_eq!(for_model.len(), 1);
        assert_eq!(for_model[0].name(), "ValidateAll");
        assert_eq!(plugins_by_families(&plugins, &["render"]).len(), 2);

        assert_eq!(plugins_by_targets(&plugins, &["default".to_string()]).len(), 2);
        assert!(plugins_by_targets(&plugins, &["farm".to_string()]).is_empty());
    }

    #[test]
    fn test_default_conversion_coerces_values() {
        let plugin = OptionalPublishPlugin::new("ValidateAll", Vec::new());
        let mut values = match json!({"ValidateAll": {"active": "false", "other": 1}, "Else": {"active": 1}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        plugin.convert_attribute_values(&mut values);
        assert_eq!(values["ValidateAll"], json!({"active": false, "other": 1}));
        assert_eq!(values["Else"], json!({"active": 1}));
    }
}
