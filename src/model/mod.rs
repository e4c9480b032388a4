pub mod attribute_def;
pub mod attribute_values;
pub mod common;
pub mod convertor;
pub mod creator_item;
pub mod instance;
pub mod project;
pub mod publish_attributes;

pub use attribute_def::*;
pub use attribute_values::*;
pub use common::*;
pub use convertor::*;
pub use creator_item::*;
pub use instance::*;
pub use project::*;
pub use publish_attributes::*;
