use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::{SubsetNameConfig, SubsetNameProfile, DEFAULT_SUBSET_TEMPLATE};
use crate::error::SubsetNameError;
use crate::model::{AssetDoc, DataMap};

/// Characters allowed in subset names, in regex character class syntax.
pub const SUBSET_NAME_ALLOWED_SYMBOLS: &str = "a-zA-Z0-9_.";

fn template_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("valid template key regex"))
}

fn subset_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("^[{}]+$", SUBSET_NAME_ALLOWED_SYMBOLS))
            .expect("valid subset name regex")
    })
}

pub fn is_valid_subset_name(name: &str) -> bool {
    subset_name_regex().is_match(name)
}

fn filter_matches(filter: &[String], value: Option<&str>) -> Option<bool> {
    if filter.is_empty() {
        return Some(false);
    }
    let value = value?;
    if filter.iter().any(|item| item.eq_ignore_ascii_case(value)) {
        Some(true)
    } else {
        None
    }
}

/// Points of a matching profile, `None` when the profile does not match.
fn profile_score(
    profile: &SubsetNameProfile,
    family: &str,
    host_name: Option<&str>,
    task_name: Option<&str>,
    task_type: Option<&str>,
) -> Option<usize> {
    let checks = [
        filter_matches(&profile.families, Some(family))?,
        filter_matches(&profile.hosts, host_name)?,
        filter_matches(&profile.task_names, task_name)?,
        filter_matches(&profile.task_types, task_type)?,
    ];
    Some(checks.iter().filter(|matched| **matched).count())
}

/// Pick the template of the most specific matching profile.
pub fn get_subset_name_template(
    config: &SubsetNameConfig,
    family: &str,
    task_name: Option<&str>,
    task_type: Option<&str>,
    host_name: Option<&str>,
) -> String {
    let mut best: Option<(usize, &SubsetNameProfile)> = None;
    for profile in &config.profiles {
        let Some(score) = profile_score(profile, family, host_name, task_name, task_type) else {
            continue;
        };
        if best.map_or(true, |(best_score, _)| score > best_score) {
            best = Some((score, profile));
        }
    }

    let template = match best {
        Some((_, profile)) => profile.template.clone(),
        None => config.default_template.clone(),
    };
    if template.is_empty() {
        DEFAULT_SUBSET_TEMPLATE.to_string()
    } else {
        template
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn fill_value(fill_data: &HashMap<String, String>, key: &str) -> Option<String> {
    if let Some(value) = fill_data.get(key) {
        return Some(value.clone());
    }
    let lower = key.to_lowercase();
    let value = fill_data.get(&lower)?;
    if key == key.to_uppercase() {
        Some(value.to_uppercase())
    } else if key == capitalize(&lower) {
        Some(capitalize(value))
    } else {
        None
    }
}

/// Fill `{key}` placeholders. `{Key}` capitalizes the value, `{KEY}` upper-cases it.
pub fn format_template(
    template: &str,
    fill_data: &HashMap<String, String>,
) -> Result<String, SubsetNameError> {
    let mut output = String::with_capacity(template.len());
    let mut last_end = 0;
    for captures in template_key_regex().captures_iter(template) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = fill_value(fill_data, key.as_str()).ok_or_else(|| SubsetNameError::MissingKey {
            template: template.to_string(),
            key: key.as_str().to_string(),
        })?;
        output.push_str(&template[last_end..whole.start()]);
        output.push_str(&value);
        last_end = whole.end();
    }
    output.push_str(&template[last_end..]);
    Ok(output)
}

fn value_to_fill(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Calculate subset name based on the passed context and subset name profiles.
#[allow(clippy::too_many_arguments)]
pub fn get_subset_name(
    config: &SubsetNameConfig,
    family: &str,
    variant: &str,
    task_name: Option<&str>,
    task_type: Option<&str>,
    asset_name: Option<&str>,
    project_name: Option<&str>,
    host_name: Option<&str>,
    dynamic_data: Option<&DataMap>,
) -> Result<String, SubsetNameError> {
    if family.is_empty() {
        return Ok(String::new());
    }

    let task_name = task_name.filter(|name| !name.is_empty());
    let template = get_subset_name_template(config, family, task_name, task_type, host_name);
    if task_name.is_none() && template.to_lowercase().contains("{task") {
        return Err(SubsetNameError::TaskNotSet { template });
    }

    let mut fill_data = HashMap::new();
    fill_data.insert("variant".to_string(), variant.to_string());
    fill_data.insert("family".to_string(), family.to_string());
    fill_data.insert("task".to_string(), task_name.unwrap_or_default().to_string());
    if let Some(asset_name) = asset_name {
        fill_data.insert("asset".to_string(), asset_name.to_string());
    }
    if let Some(project_name) = project_name {
        fill_data.insert("project".to_string(), project_name.to_string());
    }
    if let Some(host_name) = host_name {
        fill_data.insert("host".to_string(), host_name.to_string());
    }
    if let Some(dynamic_data) = dynamic_data {
        for (key, value) in dynamic_data {
            fill_data.insert(key.clone(), value_to_fill(value));
        }
    }

    format_template(&template, &fill_data)
}

/// Same as [`get_subset_name`] with asset name and task type taken from the asset document.
#[allow(clippy::too_many_arguments)]
pub fn get_subset_name_with_asset_doc(
    config: &SubsetNameConfig,
    family: &str,
    variant: &str,
    task_name: Option<&str>,
    asset_doc: Option<&AssetDoc>,
    project_name: Option<&str>,
    host_name: Option<&str>,
    dynamic_data: Option<&DataMap>,
) -> Result<String, SubsetNameError> {
    let task_type = match (asset_doc, task_name) {
        (Some(asset_doc), Some(task_name)) => asset_doc.task_type(task_name),
        _ => None,
    };
    get_subset_name(
        config,
        family,
        variant,
        task_name,
        task_type,
        asset_doc.map(|asset_doc| asset_doc.name.as_str()),
        project_name,
        host_name,
        dynamic_data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(families: &[&str], task_types: &[&str], template: &str) -> SubsetNameProfile {
        SubsetNameProfile {
            families: families.iter().map(|s| s.to_string()).collect(),
            task_types: task_types.iter().map(|s| s.to_string()).collect(),
            template: template.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_template() {
        let config = SubsetNameConfig::default();
        let name = get_subset_name(&config, "model", "Main", None, None, None, None, Some("test"), None)
            .unwrap();
        assert_eq!(name, "modelMain");

        let name = get_subset_name(&config, "model", "main", None, None, None, None, None, None).unwrap();
        assert_eq!(name, "modelMain");
    }

    #[test]
    fn test_most_specific_profile_wins() {
        let config = SubsetNameConfig {
            default_template: DEFAULT_SUBSET_TEMPLATE.to_string(),
            profiles: vec![
                profile(&["render"], &[], "{family}{Variant}"),
                profile(&["render"], &["Lighting"], "{family}{Task}{Variant}"),
                profile(&[], &[], "{family}_{variant}"),
            ],
        };
        let asset = AssetDoc::new("sh010").with_task("lighting", "Lighting");

        let name = get_subset_name_with_asset_doc(
            &config, "render", "Main", Some("lighting"), Some(&asset), None, None, None,
        )
        .unwrap();
        assert_eq!(name, "renderLightingMain");

        let name = get_subset_name(&config, "model", "Main", None, None, None, None, None, None).unwrap();
        assert_eq!(name, "model_Main");
    }

    #[test]
    fn test_task_required() {
        let config = SubsetNameConfig {
            default_template: "{family}{Task}".to_string(),
            profiles: Vec::new(),
        };
        let err = get_subset_name(&config, "model", "Main", None, None, None, None, None, None).unwrap_err();
        assert!(matches!(err, SubsetNameError::TaskNotSet { .. }));
    }

    #[test]
    fn test_dynamic_data_and_case() {
        let config = SubsetNameConfig {
            default_template: "{family}{LAYER}{Variant}".to_string(),
            profiles: Vec::new(),
        };
        let dynamic = match json!({"layer": "beauty"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let name =
            get_subset_name(&config, "render", "Main", None, None, None, None, None, Some(&dynamic)).unwrap();
        assert_eq!(name, "renderBEAUTYMain");

        let err = get_subset_name(&config, "render", "Main", None, None, None, None, None, None).unwrap_err();
        assert_eq!(
            err,
            SubsetNameError::MissingKey {
                template: "{family}{LAYER}{Variant}".to_string(),
                key: "LAYER".to_string(),
            }
        );
    }

    #[test]
    fn test_asset_name_from_asset_doc() {
        let config = SubsetNameConfig {
            default_template: "{family}{Asset}{Variant}".to_string(),
            profiles: Vec::new(),
        };
        let asset = AssetDoc::new("sh010");
        let name = get_subset_name_with_asset_doc(
            &config, "model", "Main", None, Some(&asset), None, None, None,
        )
        .unwrap();
        assert_eq!(name, "modelSh010Main");

        let err = get_subset_name_with_asset_doc(&config, "model", "Main", None, None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, SubsetNameError::MissingKey { ref key, .. } if key == "Asset"));
    }

    #[test]
    fn test_subset_name_validation() {
        assert!(is_valid_subset_name("modelMain_v1.0"));
        assert!(!is_valid_subset_name("model Main"));
        assert!(!is_valid_subset_name(""));
    }
}
