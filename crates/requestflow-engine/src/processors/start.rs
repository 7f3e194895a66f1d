use async_trait::async_trait;

use super::{FormSubmission, StepContext, StepProcessor, Transition};
use crate::engine::EngineError;
use crate::types::{NodeKind, Request, RequestStatus};

/// Moves a draft off its start node onto the first real step.
///
/// The engine follows up with the form processor when the successor is a
/// form and the payload carries form data, so the first submission of a
/// draft fills the first form.
pub struct StartStep;

#[async_trait]
impl StepProcessor for StartStep {
    fn kind(&self) -> NodeKind {
        NodeKind::Start
    }

    async fn process(&self, step: &StepContext<'_>) -> Result<Request, EngineError> {
        let Some(next) = step.flow.next_node(&step.node.id) else {
            return Ok(step.request.clone());
        };
        if next.kind == NodeKind::Form {
            // Reject a bad submission before the request moves.
            FormSubmission::parse(step.payload)?;
        }
        Transition::to(step, next, Some(RequestStatus::InProgress))
            .await?
            .apply(step)
            .await
    }
}
