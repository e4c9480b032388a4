pub mod create_context;
pub mod failures;
pub mod validate;

pub use create_context::*;
pub use failures::*;
pub use validate::*;
