//! Commonly used types and traits

pub use crate::chain::{Chain, Middleware};
pub use crate::context::ContextSource;
pub use crate::define_step;
pub use crate::error::ChainError;
pub use crate::node::Directives;
pub use crate::step::{Step, StepFn, StepName};
