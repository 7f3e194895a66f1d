//! Default implementations for the pluggable engine traits.
//!
//! These let the engine run with zero external configuration. Each can be
//! replaced via the engine builder.

pub mod catalog;
pub mod evaluators;
pub mod in_memory_store;
pub use catalog::load_request_types;
pub use evaluators::{ExpressionConditionEvaluator, FirstConditionEvaluator};
pub use in_memory_store::InMemoryStore;
