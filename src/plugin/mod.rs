pub mod convertor;
pub mod creator;
pub mod publish;
pub mod registry;
pub mod subset_name;

pub use convertor::*;
pub use creator::*;
pub use publish::*;
pub use registry::*;
pub use subset_name::*;
