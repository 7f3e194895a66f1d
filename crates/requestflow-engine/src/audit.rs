//! Audit logger: one append-only entry per action taken against a request.
//!
//! Writes are best-effort. A failed append is logged and swallowed so a
//! flaky audit table never blocks a business transition.

use std::sync::Arc;

use serde_json::Value;

use crate::errors::StoreError;
use crate::traits::WorkflowStore;
use crate::types::{AuditLog, NewAuditLog};

pub struct AuditLogger {
    store: Arc<dyn WorkflowStore>,
    system_user_id: String,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn WorkflowStore>, system_user_id: impl Into<String>) -> Self {
        Self {
            store,
            system_user_id: system_user_id.into(),
        }
    }

    /// Append an entry for `action`. An empty `user_id` is recorded as the
    /// system user; a `null` payload leaves `metadata` unset.
    pub async fn record(&self, request_id: &str, user_id: &str, action: &str, payload: &Value) {
        let user_id = if user_id.is_empty() {
            self.system_user_id.clone()
        } else {
            user_id.to_string()
        };
        let entry = NewAuditLog {
            request_id: request_id.to_string(),
            user_id,
            action: action.to_string(),
            description: format!("Action: {action}"),
            metadata: (!payload.is_null()).then(|| payload.to_string()),
        };

        if let Err(e) = self.store.create_audit_log(entry).await {
            tracing::warn!(
                request_id = %request_id,
                action = %action,
                error = %e,
                "failed to write audit entry"
            );
        }
    }

    /// Audit entries of a request, newest first.
    pub async fn history(&self, request_id: &str) -> Result<Vec<AuditLog>, StoreError> {
        let mut entries = self.store.list_audit_logs(request_id).await?;
        // Store order is insertion order; timestamps can tie.
        entries.reverse();
        Ok(entries)
    }
}
