use serde::{Deserialize, Serialize};

/// Raised by creator logic for known, user-facing problems.
/// The message is shown to the artist as-is, without a traceback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct CreatorError(pub String);

impl CreatorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Attempt to change or remove a protected instance key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Key \"{key}\" is immutable and does not allow changes.")]
pub struct ImmutableKeyError {
    pub key: String,
}

impl ImmutableKeyError {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Attribute key is not defined in the attribute definitions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Key \"{key}\" was not found.")]
pub struct AttributeKeyError {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubsetNameError {
    #[error("Subset name template \"{template}\" requires task name but task is not set.")]
    TaskNotSet { template: String },

    #[error("Subset name template \"{template}\" has no value for key \"{key}\".")]
    MissingKey { template: String, key: String },

    #[error("Subset name \"{name}\" contains invalid characters.")]
    InvalidCharacters { name: String },
}

/// Failure record of a single plugin during a bulk operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedInfo {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

/// Aggregated failure of an operation that ran over multiple plugins.
///
/// Raised only after every plugin was processed, so `failed_info` holds one
/// record for each plugin that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperationFailed {
    #[error("Failed to collect instances")]
    CreatorsCollectionFailed { failed_info: Vec<FailedInfo> },

    #[error("Failed to create instances")]
    CreatorsCreateFailed { failed_info: Vec<FailedInfo> },

    #[error("Failed to update instance changes")]
    CreatorsSaveFailed { failed_info: Vec<FailedInfo> },

    #[error("Failed to remove instances")]
    CreatorsRemoveFailed { failed_info: Vec<FailedInfo> },

    #[error("Failed to find incompatible subsets")]
    ConvertorsFindFailed { failed_info: Vec<FailedInfo> },

    #[error("Failed to convert incompatible subsets")]
    ConvertorsConversionFailed { failed_info: Vec<FailedInfo> },
}

impl OperationFailed {
    pub fn failed_info(&self) -> &[FailedInfo] {
        match self {
            OperationFailed::CreatorsCollectionFailed { failed_info }
            | OperationFailed::CreatorsCreateFailed { failed_info }
            | OperationFailed::CreatorsSaveFailed { failed_info }
            | OperationFailed::CreatorsRemoveFailed { failed_info }
            | OperationFailed::ConvertorsFindFailed { failed_info }
            | OperationFailed::ConvertorsConversionFailed { failed_info } => failed_info,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    ImmutableKey(#[from] ImmutableKeyError),

    #[error(transparent)]
    AttributeKey(#[from] AttributeKeyError),

    #[error(transparent)]
    Operation(#[from] OperationFailed),

    #[error("Host \"{host}\" does not have implemented method/s {}", format_methods(.missing_methods))]
    HostMissRequiredMethod {
        host: String,
        missing_methods: Vec<String>,
    },

    #[error("Accessed Collection shared data out of collection phase")]
    UnavailableSharedData,

    #[error("Creator \"{0}\" was not found")]
    UnknownCreator(String),

    #[error("Instance \"{0}\" was not found")]
    UnknownInstance(String),

    #[error("Unexpected change of \"{key}\": {reason}")]
    UnexpectedChange { key: String, reason: String },

    #[error("Reset finished with {} failed operation(s)", .0.len())]
    ResetFailed(Vec<OperationFailed>),

    #[error("Host operation failed: {0}")]
    Host(#[source] anyhow::Error),
}

fn format_methods(methods: &[String]) -> String {
    use itertools::Itertools;
    methods.iter().map(|name| format!("\"{}\"", name)).join(", ")
}

pub type CreateResult<T> = std::result::Result<T, CreateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_miss_required_method_message() {
        let err = CreateError::HostMissRequiredMethod {
            host: "nuke".to_string(),
            missing_methods: vec![
                "get_context_data".to_string(),
                "update_context_data".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Host \"nuke\" does not have implemented method/s \"get_context_data\", \"update_context_data\""
        );
    }

    #[test]
    fn test_failed_info_accessor_and_serialization() {
        let failed = OperationFailed::CreatorsSaveFailed {
            failed_info: vec![FailedInfo {
                identifier: "io.test.model".to_string(),
                label: None,
                message: "boom".to_string(),
                traceback: None,
            }],
        };
        assert_eq!(failed.failed_info().len(), 1);
        assert_eq!(failed.to_string(), "Failed to update instance changes");

        let json = serde_json::to_value(&failed.failed_info()[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"identifier": "io.test.model", "message": "boom"})
        );
    }
}
