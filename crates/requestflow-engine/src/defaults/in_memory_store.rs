//! In-memory workflow store for tests, demos and embedded use.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::traits::WorkflowStore;
use crate::types::*;

#[derive(Default)]
struct Tables {
    requests: BTreeMap<String, Request>,
    // Append-only tables keep insertion order in a Vec.
    request_data: Vec<RequestData>,
    tasks: Vec<Task>,
    audit_logs: Vec<AuditLog>,
    request_types: BTreeMap<String, RequestType>,
    // Keyed by email.
    users: BTreeMap<String, User>,
    // Creation sequence per request id, for newest-first listing.
    request_seq: BTreeMap<String, u64>,
    next_seq: u64,
}

/// In-memory implementation of [`WorkflowStore`].
///
/// One `RwLock` over all tables; `BTreeMap` keeps iteration deterministic.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Register (or replace) a request type.
    pub async fn insert_request_type(&self, request_type: RequestType) {
        let mut tables = self.tables.write().await;
        tables
            .request_types
            .insert(request_type.id.clone(), request_type);
    }

    /// Register (or replace) a user, keyed by email.
    pub async fn insert_user(&self, user: User) {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.email.clone(), user);
    }

    pub async fn request_type_count(&self) -> usize {
        self.tables.read().await.request_types.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn get_request(&self, id: &str) -> Result<Option<Request>, StoreError> {
        Ok(self.tables.read().await.requests.get(id).cloned())
    }

    async fn create_request(&self, request: NewRequest) -> Result<Request, StoreError> {
        let now = Utc::now();
        let record = Request {
            id: new_id(),
            request_type_id: request.request_type_id,
            title: request.title,
            current_step: request.current_step,
            status: request.status,
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.write().await;
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.request_seq.insert(record.id.clone(), seq);
        tables.requests.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_request(&self, id: &str, patch: RequestPatch) -> Result<Request, StoreError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .requests
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("request", id))?;
        if let Some(step) = patch.current_step {
            record.current_step = step;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<RequestPage, StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Request> = tables
            .requests
            .values()
            .filter(|r| filter.status.is_none_or(|s| s == r.status))
            .filter(|r| filter.created_by.as_ref().is_none_or(|c| *c == r.created_by))
            .collect();
        matching.sort_by_key(|r| std::cmp::Reverse(tables.request_seq.get(&r.id).copied()));

        let total = matching.len();
        let page = filter.page.max(1);
        let requests = matching
            .into_iter()
            .skip((page - 1).saturating_mul(filter.limit))
            .take(filter.limit)
            .cloned()
            .collect();

        Ok(RequestPage {
            requests,
            total,
            page,
            limit: filter.limit,
        })
    }

    async fn create_request_data(&self, row: NewRequestData) -> Result<RequestData, StoreError> {
        let record = RequestData {
            id: new_id(),
            request_id: row.request_id,
            data_type: row.data_type,
            field_name: row.field_name,
            field_value: row.field_value,
            row_index: row.row_index,
            created_at: Utc::now(),
        };
        self.tables.write().await.request_data.push(record.clone());
        Ok(record)
    }

    async fn list_request_data(&self, request_id: &str) -> Result<Vec<RequestData>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .request_data
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let record = Task {
            id: new_id(),
            request_id: task.request_id,
            node_id: task.node_id,
            assigned_to: task.assigned_to,
            task_type: task.task_type,
            status: TaskStatus::Pending,
            title: task.title,
            description: task.description,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.tables.write().await.tasks.push(record.clone());
        Ok(record)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::not_found("task", id))?;
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(at) = patch.completed_at {
            task.completed_at = Some(at);
        }
        Ok(task.clone())
    }

    async fn list_tasks(
        &self,
        request_id: &str,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .tasks
            .iter()
            .filter(|t| t.request_id == request_id && filter.matches(t))
            .cloned()
            .collect())
    }

    async fn list_tasks_for_user(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .tasks
            .iter()
            .filter(|t| t.assigned_to == user_id && status.is_none_or(|s| s == t.status))
            .cloned()
            .collect())
    }

    async fn create_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog, StoreError> {
        let record = AuditLog {
            id: new_id(),
            request_id: entry.request_id,
            user_id: entry.user_id,
            action: entry.action,
            description: entry.description,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.tables.write().await.audit_logs.push(record.clone());
        Ok(record)
    }

    async fn list_audit_logs(&self, request_id: &str) -> Result<Vec<AuditLog>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .audit_logs
            .iter()
            .filter(|a| a.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn get_request_type(&self, id: &str) -> Result<Option<RequestType>, StoreError> {
        Ok(self.tables.read().await.request_types.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(email).cloned())
    }
}
