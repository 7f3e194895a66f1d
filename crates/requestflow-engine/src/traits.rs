//! Plugin trait interfaces for the workflow engine.
//!
//! The engine owns no persistence. Hosts plug in a [`WorkflowStore`]
//! (a relational store behind an ORM, typically) and may swap the decision
//! strategy through [`ConditionEvaluator`]. Defaults live in
//! [`defaults`](crate::defaults).

use async_trait::async_trait;
use serde_json::Value;

use super::errors::*;
use super::types::*;

// ---------------------------------------------------------------------------
// WorkflowStore
// ---------------------------------------------------------------------------

/// Backing store for requests, their field rows, tasks and audit entries,
/// plus the request types and users the engine reads.
///
/// Implementations mint ids and timestamps on create. The engine serializes
/// work per request, so implementations need no request-level locking of
/// their own; they must tolerate concurrent calls for different requests.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_request(&self, id: &str) -> Result<Option<Request>, StoreError>;

    async fn create_request(&self, request: NewRequest) -> Result<Request, StoreError>;

    /// Apply `patch` and bump `updated_at`. Fails with
    /// [`StoreError::NotFound`] for an unknown id.
    async fn update_request(&self, id: &str, patch: RequestPatch) -> Result<Request, StoreError>;

    /// Newest first, paginated per `filter`.
    async fn list_requests(&self, filter: &RequestFilter) -> Result<RequestPage, StoreError>;

    async fn create_request_data(&self, row: NewRequestData) -> Result<RequestData, StoreError>;

    /// All field rows of a request in insertion order.
    async fn list_request_data(&self, request_id: &str) -> Result<Vec<RequestData>, StoreError>;

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError>;

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError>;

    /// Tasks of a request matching `filter`, in creation order.
    async fn list_tasks(&self, request_id: &str, filter: &TaskFilter)
        -> Result<Vec<Task>, StoreError>;

    /// Tasks assigned to a user across all requests, in creation order.
    async fn list_tasks_for_user(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError>;

    async fn create_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog, StoreError>;

    /// Audit entries of a request in insertion order.
    async fn list_audit_logs(&self, request_id: &str) -> Result<Vec<AuditLog>, StoreError>;

    async fn get_request_type(&self, id: &str) -> Result<Option<RequestType>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

// ---------------------------------------------------------------------------
// ConditionEvaluator
// ---------------------------------------------------------------------------

/// Decision strategy: picks a target among a decision node's conditions.
///
/// `context` is the request's aggregated form data overlaid with the step
/// payload. Returning `Ok(None)` lets the decision step fall back to the
/// node's `defaultTarget`, then to its outgoing edge.
pub trait ConditionEvaluator: Send + Sync {
    fn select(
        &self,
        conditions: &[DecisionCondition],
        context: &Value,
    ) -> Result<Option<String>, EvaluationError>;

    /// Name for diagnostics.
    fn name(&self) -> &str;
}
