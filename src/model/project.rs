use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
}

/// Asset document with only the fields the create context reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetDoc {
    pub name: String,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskInfo>,
}

impl AssetDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: IndexMap::new(),
        }
    }

    pub fn with_task(mut self, name: impl Into<String>, task_type: impl Into<String>) -> Self {
        self.tasks.insert(
            name.into(),
            TaskInfo {
                task_type: Some(task_type.into()),
            },
        );
        self
    }

    pub fn has_task(&self, task_name: &str) -> bool {
        self.tasks.contains_key(task_name)
    }

    pub fn task_type(&self, task_name: &str) -> Option<&str> {
        self.tasks
            .get(task_name)
            .and_then(|task| task.task_type.as_deref())
    }
}

/// Project, asset and task the host currently works in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
}
