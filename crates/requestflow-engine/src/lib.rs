//! Request workflow engine: runs user-authored approval flows.
//!
//! A flow is a graph of start, form, decision, approval and end nodes drawn
//! in a visual designer. Each request is one running instance of a flow,
//! with a single pointer (`current_step`) into the graph. The engine
//! advances that pointer in response to external actions (form
//! submissions, approvals, rejections), hands out approval tasks, and keeps
//! an audit trail of every action.
//!
//! The engine is designed to be embedded. Persistence sits behind the
//! [`WorkflowStore`] trait; web routing, authentication and rendering are
//! the host's concern.
#[cfg(feature = "schemars")]
pub mod schema;

pub mod audit;
pub mod defaults;
pub mod engine;
pub mod errors;
pub mod expression;
pub mod form_data;
pub mod processors;
pub mod tasks;
pub mod traits;
pub mod types;
pub mod validate;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export public types at the crate level.

// defaults
pub use defaults::{
    load_request_types, ExpressionConditionEvaluator, FirstConditionEvaluator, InMemoryStore,
};

// engine
pub use engine::{EngineBuilder, EngineConfig, EngineError, RequestLocks, WorkflowEngine};

// errors
pub use errors::{EvaluationError, StoreError};

// expression
pub use expression::{Expression, ExpressionError};

// processors
pub use processors::{ApprovalDecision, FormSubmission, StepProcessor};

// tasks / audit
pub use audit::AuditLogger;
pub use tasks::{ApprovalTally, TaskManager};

// traits
pub use traits::{ConditionEvaluator, WorkflowStore};

// types
pub use types::*;

// validate
pub use validate::{validate_flow, ValidationReport};
