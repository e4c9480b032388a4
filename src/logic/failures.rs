use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{CreatorError, FailedInfo, OperationFailed};

/// Error raised by plugin code, already rendered for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginFailure {
    pub message: String,
    /// Raised on purpose as [`CreatorError`]
    pub expected: bool,
    pub traceback: String,
}

impl PluginFailure {
    fn from_error(err: anyhow::Error) -> Self {
        match err.downcast_ref::<CreatorError>() {
            Some(creator_error) => Self {
                message: creator_error.to_string(),
                expected: true,
                traceback: format!("{:?}", err),
            },
            None => Self {
                message: err.to_string(),
                expected: false,
                traceback: format!("{:?}", err),
            },
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            text.to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic".to_string()
        };
        Self {
            traceback: format!("plugin panicked: {}", message),
            message,
            expected: false,
        }
    }
}

/// Run plugin code, turning errors and panics into a [`PluginFailure`].
pub fn catch_plugin_error<T>(
    operation: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, PluginFailure> {
    match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(PluginFailure::from_error(err)),
        Err(payload) => Err(PluginFailure::from_panic(payload)),
    }
}

/// Collects failure records of one bulk operation.
#[derive(Debug, Default)]
pub struct FailedInfoCollector {
    failed_info: Vec<FailedInfo>,
}

impl FailedInfoCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creator failures carry a traceback only when unexpected.
    pub fn push_creator(&mut self, identifier: &str, label: Option<&str>, failure: PluginFailure) {
        let traceback = (!failure.expected).then_some(failure.traceback);
        self.failed_info.push(FailedInfo {
            identifier: identifier.to_string(),
            label: label.map(str::to_string),
            message: failure.message,
            traceback,
        });
    }

    /// Convertor failures always carry a traceback.
    pub fn push_convertor(&mut self, identifier: &str, failure: PluginFailure) {
        self.failed_info.push(FailedInfo {
            identifier: identifier.to_string(),
            label: None,
            message: failure.message,
            traceback: Some(failure.traceback),
        });
    }

    pub fn push(&mut self, info: FailedInfo) {
        self.failed_info.push(info);
    }

    pub fn is_empty(&self) -> bool {
        self.failed_info.is_empty()
    }

    pub fn finish(
        self,
        into_error: impl FnOnce(Vec<FailedInfo>) -> OperationFailed,
    ) -> Result<(), OperationFailed> {
        if self.failed_info.is_empty() {
            Ok(())
        } else {
            Err(into_error(self.failed_info))
        }
    }
}
