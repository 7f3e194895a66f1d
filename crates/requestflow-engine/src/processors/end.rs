use async_trait::async_trait;

use super::{StepContext, StepProcessor, Transition};
use crate::engine::EngineError;
use crate::types::{NodeKind, Request, RequestStatus};

/// Completes the request. A request that already ended as approved or
/// rejected keeps its outcome.
pub struct EndStep;

#[async_trait]
impl StepProcessor for EndStep {
    fn kind(&self) -> NodeKind {
        NodeKind::End
    }

    async fn process(&self, step: &StepContext<'_>) -> Result<Request, EngineError> {
        if step.request.status.is_terminal() {
            return Ok(step.request.clone());
        }
        Transition::status(RequestStatus::Completed).apply(step).await
    }
}
