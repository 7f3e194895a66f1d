//! Error types for pluggable store and evaluator implementations.

use thiserror::Error;

/// Errors from [`WorkflowStore`](super::traits::WorkflowStore).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("store conflict: {message}")]
    Conflict { message: String },
    #[error("store error: {message}")]
    Store { message: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

/// Errors from [`ConditionEvaluator`](super::traits::ConditionEvaluator).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error("condition {index} ({expression:?}): {message}")]
    Condition {
        index: usize,
        expression: String,
        message: String,
    },
}
