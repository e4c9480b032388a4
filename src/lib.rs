pub mod config;
pub mod creators;
pub mod error;
pub mod logic;
pub mod model;
pub mod plugin;
pub mod store;

pub use config::PipelineConfig;
pub use error::{CreateError, CreateResult, CreatorError, FailedInfo, OperationFailed};
pub use logic::CreateContext;

// Export all model types
pub use model::*;

pub use plugin::{
    AutoCreator, BaseCreator, Creator, CreatorInfo, CreatorPlugin, PluginRegistry, PublishPlugin,
    SubsetConvertor, UpdateData,
};

// Export store types
pub use store::{Host, InMemoryHost, InMemoryProjectStore, InstanceStorage, ProjectStore, PublishHost};
