//! Step processors: one handler per node kind.
//!
//! A processor consumes the action delivered to the request's current node
//! and moves the request on. Every processor reads and validates first and
//! writes last, so a structural error leaves no partial state behind.
//! Entering an approval node always hands out its tasks, whichever
//! processor made the move.

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::{EngineConfig, EngineError};
use crate::tasks::TaskManager;
use crate::traits::{ConditionEvaluator, WorkflowStore};
use crate::types::*;

pub mod approval;
pub mod decision;
pub mod end;
pub mod form;
pub mod start;

pub use approval::{ApprovalDecision, ApprovalStep};
pub use decision::DecisionStep;
pub use end::EndStep;
pub use form::{FormStep, FormSubmission};
pub use start::StartStep;

/// Everything a processor sees for one step.
pub struct StepContext<'a> {
    pub request: &'a Request,
    pub node: &'a FlowNode,
    pub flow: &'a FlowDefinition,
    pub payload: &'a Value,
    pub user_id: &'a str,
    pub store: &'a dyn WorkflowStore,
    pub tasks: &'a TaskManager,
    pub evaluator: &'a dyn ConditionEvaluator,
    pub config: &'a EngineConfig,
}

/// Handler for one node kind.
#[async_trait]
pub trait StepProcessor: Send + Sync {
    fn kind(&self) -> NodeKind;

    /// Run the step and return the request as it stands afterwards.
    async fn process(&self, step: &StepContext<'_>) -> Result<Request, EngineError>;
}

/// The processor for `kind`.
pub fn processor_for(kind: NodeKind) -> &'static dyn StepProcessor {
    match kind {
        NodeKind::Start => &StartStep,
        NodeKind::Form => &FormStep,
        NodeKind::Decision => &DecisionStep,
        NodeKind::Approval => &ApprovalStep,
        NodeKind::End => &EndStep,
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// A planned move of the request: new current step, new status, and the
/// tasks handed out on entering an approval node. Planning only reads;
/// [`apply`](Transition::apply) does the writes.
#[derive(Debug, Default)]
pub struct Transition {
    target: Option<String>,
    status: Option<RequestStatus>,
    tasks: Vec<NewTask>,
}

impl Transition {
    /// Leave the request where it is.
    pub fn stay() -> Self {
        Self::default()
    }

    /// Change the status only.
    pub fn status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Move to `target`, optionally setting `status`.
    pub async fn to(
        step: &StepContext<'_>,
        target: &FlowNode,
        status: Option<RequestStatus>,
    ) -> Result<Self, EngineError> {
        let tasks = if target.kind == NodeKind::Approval {
            step.tasks.plan_approval_tasks(step.request, target).await?
        } else {
            Vec::new()
        };
        Ok(Self {
            target: Some(target.id.clone()),
            status,
            tasks,
        })
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn is_stay(&self) -> bool {
        self.target.is_none() && self.status.is_none()
    }

    pub async fn apply(self, step: &StepContext<'_>) -> Result<Request, EngineError> {
        if self.is_stay() {
            return Ok(step.request.clone());
        }
        let patch = RequestPatch {
            current_step: self.target,
            status: self.status,
        };
        let updated = step.store.update_request(&step.request.id, patch).await?;
        if !self.tasks.is_empty() {
            let created = step.tasks.create_tasks(self.tasks).await?;
            tracing::debug!(
                request_id = %updated.id,
                node_id = %updated.current_step,
                tasks = created.len(),
                "approval tasks created"
            );
        }
        Ok(updated)
    }
}
