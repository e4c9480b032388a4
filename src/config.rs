use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SUBSET_TEMPLATE: &str = "{family}{Variant}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub subset_name: SubsetNameConfig,
    #[serde(default)]
    pub simple_creators: Vec<SimpleCreatorConfig>,
    #[serde(default)]
    pub optional_plugins: Vec<OptionalPluginConfig>,
    #[serde(default)]
    pub workfile: WorkfileConfig,
}

/// Session context used when the host can't tell its current context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub project: Option<String>,
    pub asset: Option<String>,
    pub task: Option<String>,
    pub app: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_true")]
    pub discover_plugins: bool,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetNameConfig {
    #[serde(default = "default_subset_template")]
    pub default_template: String,
    #[serde(default)]
    pub profiles: Vec<SubsetNameProfile>,
}

/// Template used for families/hosts/tasks it matches. Empty filter matches all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubsetNameProfile {
    #[serde(default)]
    pub families: Vec<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub task_names: Vec<String>,
    #[serde(default)]
    pub task_types: Vec<String>,
    pub template: String,
}

/// Settings of one creator built without writing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleCreatorConfig {
    #[serde(default)]
    pub identifier: Option<String>,
    pub family: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detailed_description: Option<String>,
    #[serde(default)]
    pub default_variants: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub allow_sequences: bool,
    #[serde(default)]
    pub allow_multiple_items: bool,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Publish plugin that only exposes an "active" toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionalPluginConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub families: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub context_plugin: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkfileConfig {
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_subset_template() -> String {
    DEFAULT_SUBSET_TEMPLATE.to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            discover_plugins: true,
            targets: Vec::new(),
        }
    }
}

impl Default for SubsetNameConfig {
    fn default() -> Self {
        Self {
            default_template: default_subset_template(),
            profiles: Vec::new(),
        }
    }
}

fn env_fallback(value: &Option<String>, name: &str) -> Option<String> {
    value
        .clone()
        .filter(|value| !value.is_empty())
        .or_else(|| std::env::var(name).ok().filter(|value| !value.is_empty()))
}

impl SessionConfig {
    pub fn project_name(&self) -> Option<String> {
        env_fallback(&self.project, "AVALON_PROJECT")
    }

    pub fn asset_name(&self) -> Option<String> {
        env_fallback(&self.asset, "AVALON_ASSET")
    }

    pub fn task_name(&self) -> Option<String> {
        env_fallback(&self.task, "AVALON_TASK")
    }

    pub fn app_name(&self) -> Option<String> {
        env_fallback(&self.app, "AVALON_APP")
    }
}

impl PublishConfig {
    /// Registered targets, "default" is always present.
    pub fn registered_targets(&self) -> Vec<String> {
        let mut targets = self.targets.clone();
        if !targets.iter().any(|target| target == "default") {
            targets.push("default".to_string());
        }
        targets
    }
}

impl PipelineConfig {
    /// Load configuration from defaults, optional config file and environment
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&PipelineConfig::default())?);

        config = config.add_source(config::File::with_name("openpype").required(false));

        // OPENPYPE_SESSION__PROJECT=... maps to session.project
        config = config.add_source(
            config::Environment::with_prefix("OPENPYPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("publish.targets"),
        );

        let config = config.build()?;
        let pipeline_config: PipelineConfig = config.try_deserialize()?;

        Ok(pipeline_config)
    }

    /// Workfile used by the JSON backed host
    pub fn workfile_path(&self) -> PathBuf {
        if let Some(path) = &self.workfile.path {
            return path.clone();
        }

        if let Ok(path) = std::env::var("OPENPYPE_WORKFILE") {
            return PathBuf::from(path);
        }

        PathBuf::from("workfile.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.publish.discover_plugins);
        assert_eq!(config.subset_name.default_template, "{family}{Variant}");
        assert_eq!(config.publish.registered_targets(), vec!["default".to_string()]);
    }

    #[test]
    fn test_session_prefers_configured_values() {
        let session = SessionConfig {
            project: Some("demo".to_string()),
            asset: Some(String::new()),
            task: None,
            app: None,
        };
        assert_eq!(session.project_name(), Some("demo".to_string()));
    }

    #[test]
    fn test_deserialize_simple_creators() {
        let json = r#"{
            "simple_creators": [
                {"family": "render", "default_variants": ["Main"], "extensions": [".exr"]}
            ],
            "optional_plugins": [{"name": "ValidateFrameRange", "families": ["render"]}]
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        let creator = &config.simple_creators[0];
        assert_eq!(creator.family, "render");
        assert!(creator.enabled);
        assert!(config.optional_plugins[0].active);
        assert!(!config.optional_plugins[0].context_plugin);
        assert_eq!(config.subset_name.default_template, DEFAULT_SUBSET_TEMPLATE);
    }

    #[test]
    fn test_load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{"subset_name": {"default_template": "{family}_{variant}"}}"#,
        )
        .unwrap();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&PipelineConfig::default()).unwrap())
            .add_source(config::File::from(path.as_path()))
            .build()
            .unwrap();
        let loaded: PipelineConfig = config.try_deserialize().unwrap();
        assert_eq!(loaded.subset_name.default_template, "{family}_{variant}");
        assert!(loaded.publish.discover_plugins);
    }
}
