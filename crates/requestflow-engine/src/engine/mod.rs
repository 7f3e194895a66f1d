//! Workflow engine: the single entry point for running request flows.
//!
//! The [`WorkflowEngine`] loads a request and its flow, audits the incoming
//! action, and hands it to the processor of the request's current node.
//! Construct via [`WorkflowEngine::builder()`].
//!
//! ```rust,ignore
//! let engine = WorkflowEngine::builder()
//!     .store(my_store)
//!     .evaluator(ExpressionConditionEvaluator)
//!     .build();
//!
//! let request = engine.start_flow("purchase", "New laptop", &user_id).await?;
//! engine
//!     .execute_flow_step(&request.id, "form_submitted", &json!({"headerData": {...}}), &user_id)
//!     .await?;
//! ```

mod builder;
pub mod config;
pub mod error;
pub mod locks;

pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use error::EngineError;
pub use locks::RequestLocks;

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::audit::AuditLogger;
use crate::form_data;
use crate::processors::{processor_for, ApprovalDecision, FormSubmission, StepContext};
use crate::tasks::TaskManager;
use crate::traits::{ConditionEvaluator, WorkflowStore};
use crate::types::*;
use crate::validate::validate_flow;

/// The assembled workflow engine.
///
/// Holds no per-request state beyond the lock registry; everything else
/// lives in the [`WorkflowStore`]. Share it behind an `Arc`.
pub struct WorkflowEngine {
    pub(super) store: Arc<dyn WorkflowStore>,
    pub(super) evaluator: Arc<dyn ConditionEvaluator>,
    pub(super) config: EngineConfig,
    pub(super) audit: AuditLogger,
    pub(super) tasks: TaskManager,
    pub(super) locks: RequestLocks,
}

impl WorkflowEngine {
    /// Create a new [`EngineBuilder`].
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    /// Create a request of `request_type_id` at its flow's start node, in
    /// `draft`.
    pub async fn start_flow(
        &self,
        request_type_id: &str,
        title: &str,
        user_id: &str,
    ) -> Result<Request, EngineError> {
        let flow = self.load_flow(request_type_id).await?;

        if self.config.validate_on_start {
            let report = validate_flow(&flow);
            for warning in &report.warnings {
                tracing::warn!(request_type_id = %request_type_id, warning = %warning, "flow warning");
            }
            if !report.is_valid() {
                return Err(EngineError::invalid_flow(report.errors.join("; ")));
            }
        }

        let start = flow
            .start_node()
            .ok_or_else(|| EngineError::invalid_flow("flow must have exactly one start node"))?;

        let request = self
            .store
            .create_request(NewRequest {
                request_type_id: request_type_id.to_string(),
                title: title.to_string(),
                current_step: start.id.clone(),
                status: RequestStatus::Draft,
                created_by: user_id.to_string(),
            })
            .await?;

        self.audit
            .record(&request.id, user_id, "created", &json!({ "title": title }))
            .await;
        tracing::info!(
            request_id = %request.id,
            request_type_id = %request_type_id,
            user_id = %user_id,
            "request created"
        );
        Ok(request)
    }

    /// Deliver `action` to the request's current node.
    ///
    /// `action` names the action for the audit trail only; the current
    /// node's kind decides what happens. Returns the request as it stands
    /// afterwards.
    pub async fn execute_flow_step(
        &self,
        request_id: &str,
        action: &str,
        payload: &Value,
        user_id: &str,
    ) -> Result<Request, EngineError> {
        let _guard = self.locks.lock(request_id).await;
        self.execute_locked(request_id, action, payload, user_id).await
    }

    /// Approve or reject one task by id.
    ///
    /// When the task belongs to the request's current step this runs the
    /// approval step. A task left over on a node the request already moved
    /// past only records the decision.
    pub async fn complete_task(
        &self,
        task_id: &str,
        payload: &Value,
        user_id: &str,
    ) -> Result<Task, EngineError> {
        let task_not_found = || EngineError::TaskNotFound {
            task_id: task_id.to_string(),
        };
        let request_id = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(task_not_found)?
            .request_id;

        let _guard = self.locks.lock(&request_id).await;
        let task = self.store.get_task(task_id).await?.ok_or_else(task_not_found)?;

        if task.assigned_to != user_id {
            return Err(EngineError::NotAssignee {
                task_id: task.id,
                user_id: user_id.to_string(),
            });
        }
        if !task.is_pending() {
            return Err(EngineError::NoPendingTask {
                request_id,
                user_id: user_id.to_string(),
            });
        }
        let decision = ApprovalDecision::from_payload(payload)?;
        let request = self.require_request(&request_id).await?;

        if request.current_step == task.node_id {
            let mut step_payload = match payload {
                Value::Object(fields) => fields.clone(),
                _ => Map::new(),
            };
            let action = match decision {
                ApprovalDecision::Approve => "approve",
                ApprovalDecision::Reject => "reject",
            };
            step_payload.insert("action".into(), json!(action));
            self.execute_locked(
                &request_id,
                decision.action(),
                &Value::Object(step_payload),
                user_id,
            )
            .await?;
        } else {
            self.settle_late_task(&request, &task, decision, decision.action(), payload, user_id)
                .await?;
        }

        self.store.get_task(task_id).await?.ok_or_else(task_not_found)
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub async fn get_request(&self, request_id: &str) -> Result<Request, EngineError> {
        self.require_request(request_id).await
    }

    pub async fn list_requests(&self, filter: &RequestFilter) -> Result<RequestPage, EngineError> {
        Ok(self.store.list_requests(filter).await?)
    }

    /// Audit trail of a request, newest first.
    pub async fn history(&self, request_id: &str) -> Result<Vec<AuditLog>, EngineError> {
        Ok(self.audit.history(request_id).await?)
    }

    /// Submitted form data of a request, folded into one object.
    pub async fn form_data(&self, request_id: &str) -> Result<Value, EngineError> {
        Ok(form_data::load(self.store.as_ref(), request_id).await?)
    }

    pub async fn tasks_for_user(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, EngineError> {
        Ok(self.store.list_tasks_for_user(user_id, status).await?)
    }

    pub async fn tasks_for_request(&self, request_id: &str) -> Result<Vec<Task>, EngineError> {
        Ok(self
            .store
            .list_tasks(request_id, &TaskFilter::default())
            .await?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn load_flow(&self, request_type_id: &str) -> Result<FlowDefinition, EngineError> {
        let request_type = self
            .store
            .get_request_type(request_type_id)
            .await?
            .ok_or_else(|| EngineError::FlowNotFound {
                request_type_id: request_type_id.to_string(),
            })?;
        Ok(FlowDefinition::from_json(&request_type.flow_definition)?)
    }

    async fn require_request(&self, request_id: &str) -> Result<Request, EngineError> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| EngineError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    /// Body of [`execute_flow_step`](Self::execute_flow_step). Caller holds
    /// the request's lock.
    async fn execute_locked(
        &self,
        request_id: &str,
        action: &str,
        payload: &Value,
        user_id: &str,
    ) -> Result<Request, EngineError> {
        let request = self.require_request(request_id).await?;
        let flow = self.load_flow(&request.request_type_id).await?;
        let node = flow
            .find_node(&request.current_step)
            .ok_or_else(|| EngineError::InvalidState {
                request_id: request.id.clone(),
                current_step: request.current_step.clone(),
            })?;

        // An approval arriving after its node was left settles the caller's
        // task and never reaches the current node's processor.
        if node.kind != NodeKind::Approval && payload.get("action").is_some_and(|a| !a.is_null()) {
            if let Some(task) = self
                .tasks
                .left_behind_task_for(&request.id, &node.id, user_id)
                .await?
            {
                let decision = ApprovalDecision::from_payload(payload)?;
                self.settle_late_task(&request, &task, decision, action, payload, user_id)
                    .await?;
                return Ok(request);
            }
        }

        self.audit.record(request_id, user_id, action, payload).await;

        let mut updated = self.run_step(&request, node, &flow, payload, user_id).await?;

        // A draft's first submission goes straight into the first form.
        if node.kind == NodeKind::Start && updated.current_step != node.id {
            if let Some(form) = flow
                .find_node(&updated.current_step)
                .filter(|n| n.kind == NodeKind::Form)
            {
                if !FormSubmission::parse(payload)?.is_empty() {
                    updated = self.run_step(&updated, form, &flow, payload, user_id).await?;
                }
            }
        }

        if updated.current_step != request.current_step || updated.status != request.status {
            tracing::info!(
                request_id = %request.id,
                from = %request.current_step,
                to = %updated.current_step,
                status = %updated.status,
                action = %action,
                "request advanced"
            );
        }
        Ok(updated)
    }

    /// Record a decision on a task whose node the request already left.
    /// The request itself is not touched.
    async fn settle_late_task(
        &self,
        request: &Request,
        task: &Task,
        decision: ApprovalDecision,
        action: &str,
        payload: &Value,
        user_id: &str,
    ) -> Result<(), EngineError> {
        self.tasks.decide(&task.id, decision.task_status()).await?;
        self.audit.record(&request.id, user_id, action, payload).await;
        tracing::info!(
            request_id = %request.id,
            task_id = %task.id,
            node_id = %task.node_id,
            current_step = %request.current_step,
            decision = decision.action(),
            "task decided after request moved on"
        );
        Ok(())
    }

    async fn run_step(
        &self,
        request: &Request,
        node: &FlowNode,
        flow: &FlowDefinition,
        payload: &Value,
        user_id: &str,
    ) -> Result<Request, EngineError> {
        let processor = processor_for(node.kind);
        tracing::debug!(
            request_id = %request.id,
            node_id = %node.id,
            kind = %processor.kind(),
            user_id = %user_id,
            "dispatching step"
        );
        let step = StepContext {
            request,
            node,
            flow,
            payload,
            user_id,
            store: self.store.as_ref(),
            tasks: &self.tasks,
            evaluator: self.evaluator.as_ref(),
            config: &self.config,
        };
        processor.process(&step).await
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("evaluator", &self.evaluator.name())
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish()
    }
}

#[cfg(test)]
mod tests;
