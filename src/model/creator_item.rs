use serde::{Deserialize, Serialize};

use crate::model::AttrDef;
use crate::plugin::{CreatorInfo, CreatorPlugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorType {
    Creator,
    AutoCreator,
}

/// Serializable snapshot of a creator.
///
/// Stands in for the real creator wherever only its metadata is needed,
/// e.g. on instances living in a UI process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorItem {
    pub creator_type: CreatorType,
    pub identifier: String,
    pub family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub group_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub instance_attr_defs: Vec<AttrDef>,

    // Manual creators only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
    #[serde(default)]
    pub default_variants: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_variant: Option<String>,
    #[serde(default)]
    pub create_allow_context_change: bool,
    #[serde(default)]
    pub pre_create_attr_defs: Vec<AttrDef>,
}

impl CreatorItem {
    /// Snapshot only the metadata shared by every creator type.
    pub fn from_info<C: CreatorInfo + ?Sized>(creator: &C) -> Self {
        Self {
            creator_type: CreatorType::Creator,
            identifier: creator.identifier().to_string(),
            family: creator.family().to_string(),
            label: creator.label().map(str::to_string),
            group_label: creator.get_group_label(),
            icon: creator.icon().map(str::to_string),
            instance_attr_defs: creator.get_instance_attr_defs(),
            description: None,
            detailed_description: None,
            default_variants: Vec::new(),
            default_variant: None,
            create_allow_context_change: false,
            pre_create_attr_defs: Vec::new(),
        }
    }

    pub fn from_plugin(plugin: &CreatorPlugin) -> Self {
        match plugin {
            CreatorPlugin::Manual(creator) => {
                let mut item = Self::from_info(creator.as_ref());
                item.description = creator.get_description();
                item.detailed_description = creator.get_detail_description();
                item.default_variants = creator.get_default_variants();
                item.default_variant = creator.get_default_variant();
                item.create_allow_context_change = creator.create_allow_context_change();
                item.pre_create_attr_defs = creator.get_pre_create_attr_defs();
                item
            }
            CreatorPlugin::Auto(creator) => {
                let mut item = Self::from_info(creator.as_ref());
                item.creator_type = CreatorType::AutoCreator;
                item
            }
        }
    }
}

impl CreatorInfo for CreatorItem {
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

    fn get_group_label(&self) -> String {
        self.group_label.clone()
    }

    fn get_instance_attr_defs(&self) -> Vec<AttrDef> {
        self.instance_attr_defs.clone()
    }
}
