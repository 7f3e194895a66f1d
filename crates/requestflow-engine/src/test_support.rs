//! Fixture flows and a seeded store for tests.
//!
//! Available under `cfg(test)` and the `test-support` feature, so hosts can
//! drive the engine against the same fixtures in their own tests.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::defaults::InMemoryStore;
use crate::errors::StoreError;
use crate::traits::WorkflowStore;
use crate::types::*;

pub const REQUESTER: &str = "u-requester";
pub const ANN: &str = "u-ann";
pub const BOB: &str = "u-bob";
pub const CAT: &str = "u-cat";

/// Users seeded by [`seeded_store`]: `(id, email)`.
pub const USERS: [(&str, &str); 4] = [
    (REQUESTER, "requester@example.com"),
    (ANN, "ann@example.com"),
    (BOB, "bob@example.com"),
    (CAT, "cat@example.com"),
];

/// start → details (form) → manager (approval, 2 of ann/bob/cat) → done.
pub fn purchase_flow() -> Value {
    json!({
        "nodes": [
            {"id": "start", "type": "start", "position": {"x": 0, "y": 0}, "data": {"label": "Start"}},
            {"id": "details", "type": "form", "data": {"label": "Details", "config": {
                "fields": [{"id": "f1", "name": "amount", "label": "Amount", "type": "number", "required": true}]
            }}},
            {"id": "manager", "type": "approval", "data": {"label": "Manager approval", "config": {
                "assignees": ["ann@example.com", "bob@example.com", "cat@example.com"],
                "requiredApprovals": 2,
                "title": "Approve purchase"
            }}},
            {"id": "done", "type": "end", "data": {"label": "Done"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "details"},
            {"id": "e2", "source": "details", "target": "manager"},
            {"id": "e3", "source": "manager", "target": "done"}
        ]
    })
}

/// start → details (form) → route (decision) → director (approval,
/// creator) | done.
///
/// `route` sends amounts above 1000 to `director`, everything else to
/// `done`.
pub fn routing_flow() -> Value {
    json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {"label": "Start"}},
            {"id": "details", "type": "form", "data": {"label": "Details"}},
            {"id": "route", "type": "decision", "data": {"label": "Route", "config": {
                "conditions": [
                    {"expression": "amount > 1000", "target": "director"},
                    {"expression": "", "target": "done"}
                ]
            }}},
            {"id": "director", "type": "approval", "data": {"label": "Director"}},
            {"id": "done", "type": "end", "data": {"label": "Done"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "details"},
            {"id": "e2", "source": "details", "target": "route"},
            {"id": "e3", "source": "route", "target": "done"},
            {"id": "e4", "source": "director", "target": "done"}
        ]
    })
}

/// start → first (approval, creator) → second (approval, creator) → done.
pub fn two_stage_flow() -> Value {
    json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {"label": "Start"}},
            {"id": "first", "type": "approval", "data": {"label": "First"}},
            {"id": "second", "type": "approval", "data": {"label": "Second", "config": {"requiredApprovals": 1}}},
            {"id": "done", "type": "end", "data": {"label": "Done"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "first"},
            {"id": "e2", "source": "first", "target": "second"},
            {"id": "e3", "source": "second", "target": "done"}
        ]
    })
}

/// start → manager (approval, 2 of ann/bob/cat) → fulfil (form) → done.
pub fn fulfilment_flow() -> Value {
    json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {"label": "Start"}},
            {"id": "manager", "type": "approval", "data": {"label": "Manager approval", "config": {
                "assignees": ["ann@example.com", "bob@example.com", "cat@example.com"],
                "requiredApprovals": 2
            }}},
            {"id": "fulfil", "type": "form", "data": {"label": "Fulfilment"}},
            {"id": "done", "type": "end", "data": {"label": "Done"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "manager"},
            {"id": "e2", "source": "manager", "target": "fulfil"},
            {"id": "e3", "source": "fulfil", "target": "done"}
        ]
    })
}

pub fn request_type(id: &str, flow: &Value) -> RequestType {
    RequestType {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        category: "Test".to_string(),
        flow_definition: flow.to_string(),
    }
}

/// Store with [`USERS`] and the request types `purchase`, `routing`,
/// `two-stage` and `fulfilment`.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    for (id, email) in USERS {
        store
            .insert_user(User {
                id: id.to_string(),
                email: email.to_string(),
                name: id.trim_start_matches("u-").to_string(),
            })
            .await;
    }
    for (id, flow) in [
        ("purchase", purchase_flow()),
        ("routing", routing_flow()),
        ("two-stage", two_stage_flow()),
        ("fulfilment", fulfilment_flow()),
    ] {
        store.insert_request_type(request_type(id, &flow)).await;
    }
    store
}

/// A store whose audit table rejects every write. Everything else goes to
/// an inner [`InMemoryStore`].
#[derive(Default)]
pub struct FailingAuditStore {
    pub inner: InMemoryStore,
}

#[async_trait]
impl WorkflowStore for FailingAuditStore {
    async fn get_request(&self, id: &str) -> Result<Option<Request>, StoreError> {
        self.inner.get_request(id).await
    }

    async fn create_request(&self, request: NewRequest) -> Result<Request, StoreError> {
        self.inner.create_request(request).await
    }

    async fn update_request(&self, id: &str, patch: RequestPatch) -> Result<Request, StoreError> {
        self.inner.update_request(id, patch).await
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<RequestPage, StoreError> {
        self.inner.list_requests(filter).await
    }

    async fn create_request_data(&self, row: NewRequestData) -> Result<RequestData, StoreError> {
        self.inner.create_request_data(row).await
    }

    async fn list_request_data(&self, request_id: &str) -> Result<Vec<RequestData>, StoreError> {
        self.inner.list_request_data(request_id).await
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        self.inner.create_task(task).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        self.inner.get_task(id).await
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        self.inner.update_task(id, patch).await
    }

    async fn list_tasks(
        &self,
        request_id: &str,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, StoreError> {
        self.inner.list_tasks(request_id, filter).await
    }

    async fn list_tasks_for_user(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        self.inner.list_tasks_for_user(user_id, status).await
    }

    async fn create_audit_log(&self, _entry: NewAuditLog) -> Result<AuditLog, StoreError> {
        Err(StoreError::store("audit table unavailable"))
    }

    async fn list_audit_logs(&self, request_id: &str) -> Result<Vec<AuditLog>, StoreError> {
        self.inner.list_audit_logs(request_id).await
    }

    async fn get_request_type(&self, id: &str) -> Result<Option<RequestType>, StoreError> {
        self.inner.get_request_type(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_email(email).await
    }
}
