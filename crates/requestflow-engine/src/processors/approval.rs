use async_trait::async_trait;
use serde_json::Value;

use super::{StepContext, StepProcessor, Transition};
use crate::engine::EngineError;
use crate::types::*;

/// The `action` of an approval payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    /// Read `payload.action`; absent means approve.
    pub fn from_payload(payload: &Value) -> Result<Self, EngineError> {
        match payload.get("action") {
            None | Some(Value::Null) => Ok(Self::Approve),
            Some(Value::String(action)) if action == "approve" => Ok(Self::Approve),
            Some(Value::String(action)) if action == "reject" => Ok(Self::Reject),
            Some(other) => Err(EngineError::invalid_payload(format!(
                "approval action must be \"approve\" or \"reject\", got {other}"
            ))),
        }
    }

    pub fn task_status(self) -> TaskStatus {
        match self {
            Self::Approve => TaskStatus::Approved,
            Self::Reject => TaskStatus::Rejected,
        }
    }

    /// Audit action name for the decision.
    pub fn action(self) -> &'static str {
        match self {
            Self::Approve => "approved",
            Self::Reject => "rejected",
        }
    }
}

/// Records the acting user's decision on their pending task, then settles
/// the node.
///
/// Any rejection sends the request to the end node as rejected. Otherwise
/// the request advances once the node's approvals reach
/// `requiredApprovals`, finishing as approved when the next node is an
/// end. Below the threshold only the task changes.
///
/// Both the pending-task lookup and the tally only see tasks of the
/// current node, not every approval task of the request. In a flow with
/// several approval nodes, approvals given at an earlier node never count
/// toward a later one.
pub struct ApprovalStep;

#[async_trait]
impl StepProcessor for ApprovalStep {
    fn kind(&self) -> NodeKind {
        NodeKind::Approval
    }

    async fn process(&self, step: &StepContext<'_>) -> Result<Request, EngineError> {
        let request = step.request;
        let node = step.node;
        let decision = ApprovalDecision::from_payload(step.payload)?;
        let required = node
            .approval_config()?
            .required_approvals(step.config.default_required_approvals);

        let task = step
            .tasks
            .pending_task_for(&request.id, &node.id, step.user_id)
            .await?
            .ok_or_else(|| EngineError::NoPendingTask {
                request_id: request.id.clone(),
                user_id: step.user_id.to_string(),
            })?;

        // Settle against the tally as it will stand after this decision, so
        // the whole move is planned before anything is written.
        let tally = step
            .tasks
            .tally(&request.id, &node.id)
            .await?
            .with_decision(decision.task_status());

        let transition = if tally.rejected > 0 {
            let end = step.flow.end_node().ok_or_else(|| {
                EngineError::invalid_flow("flow has no end node to reject to")
            })?;
            Transition::to(step, end, Some(RequestStatus::Rejected)).await?
        } else if tally.approved >= required as usize {
            match step.flow.next_node(&node.id) {
                Some(next) => {
                    let status = (next.kind == NodeKind::End).then_some(RequestStatus::Approved);
                    Transition::to(step, next, status).await?
                }
                None => Transition::stay(),
            }
        } else {
            Transition::stay()
        };

        step.tasks.decide(&task.id, decision.task_status()).await?;
        tracing::debug!(
            request_id = %request.id,
            node_id = %node.id,
            user_id = %step.user_id,
            task_id = %task.id,
            decision = decision.action(),
            approved = tally.approved,
            rejected = tally.rejected,
            required,
            "approval recorded"
        );

        transition.apply(step).await
    }
}
