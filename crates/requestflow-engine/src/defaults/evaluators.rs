//! Decision strategies.

use serde_json::Value;

use crate::errors::EvaluationError;
use crate::expression::Expression;
use crate::traits::ConditionEvaluator;
use crate::types::DecisionCondition;

/// Picks the first condition's target without looking at its expression.
///
/// This is the engine default. Expressions authored in the designer are
/// carried but not interpreted; use [`ExpressionConditionEvaluator`] to
/// branch on request data.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstConditionEvaluator;

impl ConditionEvaluator for FirstConditionEvaluator {
    fn select(
        &self,
        conditions: &[DecisionCondition],
        _context: &Value,
    ) -> Result<Option<String>, EvaluationError> {
        Ok(conditions.first().map(|c| c.target.clone()))
    }

    fn name(&self) -> &str {
        "first_condition"
    }
}

/// Picks the target of the first condition whose expression holds against
/// the evaluation context.
///
/// An empty expression always holds, so a trailing `{"target": ...}` acts as
/// an explicit else branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionConditionEvaluator;

impl ConditionEvaluator for ExpressionConditionEvaluator {
    fn select(
        &self,
        conditions: &[DecisionCondition],
        context: &Value,
    ) -> Result<Option<String>, EvaluationError> {
        for (index, condition) in conditions.iter().enumerate() {
            if condition.expression.trim().is_empty() {
                return Ok(Some(condition.target.clone()));
            }
            let expr = Expression::parse(&condition.expression).map_err(|e| {
                EvaluationError::Condition {
                    index,
                    expression: condition.expression.clone(),
                    message: e.to_string(),
                }
            })?;
            if expr.evaluate(context) {
                return Ok(Some(condition.target.clone()));
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "expression"
    }
}
