//! Engine error types.

use thiserror::Error;

use crate::errors::StoreError;
use crate::types::FlowDecodeError;

/// Errors from [`WorkflowEngine`](super::WorkflowEngine) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// No request type with this id, so no flow to run.
    #[error("flow not found for request type: {request_type_id}")]
    FlowNotFound { request_type_id: String },
    /// The flow document is unusable: no start or end node where one is
    /// required, a malformed document, or a node config of the wrong shape.
    #[error("invalid flow: {message}")]
    InvalidFlow { message: String },
    #[error("request not found: {request_id}")]
    RequestNotFound { request_id: String },
    /// The request's current step does not resolve to a node of its flow.
    #[error("request {request_id} is at unknown step: {current_step}")]
    InvalidState {
        request_id: String,
        current_step: String,
    },
    #[error("node {node_id} has unknown type: {node_type}")]
    UnknownNodeType { node_id: String, node_type: String },
    /// The acting user has no pending approval task on the request.
    #[error("no pending task for user {user_id} on request {request_id}")]
    NoPendingTask { request_id: String, user_id: String },
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },
    #[error("task {task_id} is not assigned to user {user_id}")]
    NotAssignee { task_id: String, user_id: String },
    /// The step payload does not have the shape the current node expects.
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn invalid_flow(message: impl Into<String>) -> Self {
        Self::InvalidFlow {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Status code an HTTP layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::FlowNotFound { .. } | Self::RequestNotFound { .. } | Self::TaskNotFound { .. } => {
                404
            }
            Self::InvalidState { .. } | Self::NoPendingTask { .. } => 409,
            Self::InvalidFlow { .. } | Self::InvalidPayload { .. } => 400,
            Self::NotAssignee { .. } => 403,
            Self::Store(StoreError::NotFound { .. }) => 404,
            Self::Store(StoreError::Conflict { .. }) => 409,
            Self::UnknownNodeType { .. } | Self::Store(_) => 500,
        }
    }
}

impl From<FlowDecodeError> for EngineError {
    fn from(err: FlowDecodeError) -> Self {
        match err {
            FlowDecodeError::UnknownNodeType { node_id, node_type } => {
                Self::UnknownNodeType { node_id, node_type }
            }
            other => Self::invalid_flow(other.to_string()),
        }
    }
}
