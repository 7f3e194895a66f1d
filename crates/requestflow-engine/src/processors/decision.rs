use async_trait::async_trait;

use super::{StepContext, StepProcessor, Transition};
use crate::engine::EngineError;
use crate::form_data;
use crate::types::*;

/// Routes the request to one of several targets.
///
/// Without `conditions` the decision follows its outgoing edge. With
/// conditions, the configured [`ConditionEvaluator`](crate::traits::ConditionEvaluator)
/// picks the target; when it picks none, `defaultTarget` applies, then the
/// outgoing edge. Status is left alone.
pub struct DecisionStep;

#[async_trait]
impl StepProcessor for DecisionStep {
    fn kind(&self) -> NodeKind {
        NodeKind::Decision
    }

    async fn process(&self, step: &StepContext<'_>) -> Result<Request, EngineError> {
        let config = step.node.decision_config()?;

        let target_id = match &config.conditions {
            None => step.flow.next_node(&step.node.id).map(|n| n.id.clone()),
            Some(conditions) => {
                let selected = if conditions.is_empty() {
                    None
                } else {
                    let rows = step.store.list_request_data(&step.request.id).await?;
                    let context = form_data::overlay(form_data::aggregate(&rows), step.payload);
                    step.evaluator
                        .select(conditions, &context)
                        .map_err(|e| EngineError::invalid_flow(format!("decision {}: {e}", step.node.id)))?
                };
                selected
                    .or_else(|| config.default_target().map(str::to_string))
                    .or_else(|| step.flow.next_node(&step.node.id).map(|n| n.id.clone()))
            }
        };

        let Some(target) = target_id.as_deref().and_then(|id| step.flow.find_node(id)) else {
            tracing::debug!(
                request_id = %step.request.id,
                node_id = %step.node.id,
                target = ?target_id,
                "decision resolved to no node, request stays"
            );
            return Ok(step.request.clone());
        };

        tracing::debug!(
            request_id = %step.request.id,
            node_id = %step.node.id,
            target = %target.id,
            evaluator = step.evaluator.name(),
            "decision resolved"
        );
        Transition::to(step, target, None).await?.apply(step).await
    }
}
