//! Persisted records: requests, submitted field rows, tasks, audit entries,
//! and the request types / users the engine reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Draft,
    Pending,
    InProgress,
    Approved,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A running instance of a flow. `current_step` is its only pointer into
/// the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub request_type_id: String,
    pub title: String,
    pub current_step: String,
    pub status: RequestStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub request_type_id: String,
    pub title: String,
    pub current_step: String,
    pub status: RequestStatus,
    pub created_by: String,
}

/// Partial update of a request. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPatch {
    pub current_step: Option<String>,
    pub status: Option<RequestStatus>,
}

impl RequestPatch {
    pub fn is_empty(&self) -> bool {
        self.current_step.is_none() && self.status.is_none()
    }
}

/// Filter for listing requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub created_by: Option<String>,
    /// 1-based page number.
    pub page: usize,
    pub limit: usize,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self {
            status: None,
            created_by: None,
            page: 1,
            limit: 10,
        }
    }
}

/// One page of requests, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPage {
    pub requests: Vec<Request>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl RequestPage {
    pub fn pages(&self) -> usize {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit)
    }
}

// ---------------------------------------------------------------------------
// Request data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Header,
    Detail,
}

/// One submitted field. Rows are append-only; a later row for the same
/// field supersedes earlier ones when read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    pub id: String,
    pub request_id: String,
    pub data_type: DataType,
    pub field_name: String,
    /// JSON-serialized field value.
    pub field_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRequestData {
    pub request_id: String,
    pub data_type: DataType,
    pub field_name: String,
    pub field_value: String,
    pub row_index: Option<usize>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TaskType {
    Approval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

/// An approval unit of work assigned to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub request_id: String,
    /// The approval node that created this task.
    pub node_id: String,
    pub assigned_to: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub request_id: String,
    pub node_id: String,
    pub assigned_to: String,
    pub task_type: TaskType,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Narrows [`list_tasks`](crate::traits::WorkflowStore::list_tasks). Every
/// set field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub node_id: Option<String>,
    pub assigned_to: Option<String>,
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.node_id.as_ref().is_none_or(|n| *n == task.node_id)
            && self.assigned_to.as_ref().is_none_or(|a| *a == task.assigned_to)
            && self.task_type.is_none_or(|t| t == task.task_type)
            && self.status.is_none_or(|s| s == task.status)
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

/// Append-only record of one action taken against a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub request_id: String,
    /// Acting user id, or the configured system id.
    pub user_id: String,
    pub action: String,
    pub description: String,
    /// JSON-serialized payload of the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLog {
    pub request_id: String,
    pub user_id: String,
    pub action: String,
    pub description: String,
    pub metadata: Option<String>,
}

// ---------------------------------------------------------------------------
// Request types and users
// ---------------------------------------------------------------------------

/// A request template: the flow document its requests run on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Serialized [`FlowDefinition`](super::FlowDefinition); decoded on every
    /// load.
    pub flow_definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Serialize a submitted value the way field rows store it.
pub fn encode_field_value(value: &Value) -> String {
    value.to_string()
}
