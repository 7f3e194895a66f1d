use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{StepContext, StepProcessor, Transition};
use crate::engine::EngineError;
use crate::types::*;

/// A form payload: `{headerData?: object, detailData?: array<object>}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSubmission {
    pub header: Map<String, Value>,
    pub detail: Vec<Map<String, Value>>,
}

impl FormSubmission {
    /// Read a submission out of a step payload. `null` payloads and absent
    /// sections read as empty; sections of the wrong shape are rejected.
    pub fn parse(payload: &Value) -> Result<Self, EngineError> {
        let fields = match payload {
            Value::Null => return Ok(Self::default()),
            Value::Object(fields) => fields,
            _ => return Err(EngineError::invalid_payload("form payload must be an object")),
        };

        let header = match fields.get("headerData") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(header)) => header.clone(),
            Some(_) => return Err(EngineError::invalid_payload("headerData must be an object")),
        };

        let detail = match fields.get("detailData") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(rows)) => rows
                .iter()
                .enumerate()
                .map(|(i, row)| match row {
                    Value::Object(row) => Ok(row.clone()),
                    _ => Err(EngineError::invalid_payload(format!(
                        "detailData[{i}] must be an object"
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(EngineError::invalid_payload("detailData must be an array")),
        };

        Ok(Self { header, detail })
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.detail.is_empty()
    }

    /// Field rows for `request_id`: header fields first, then detail rows
    /// tagged with their line index.
    pub fn rows(&self, request_id: &str) -> Vec<NewRequestData> {
        let header = self.header.iter().map(|(name, value)| NewRequestData {
            request_id: request_id.to_string(),
            data_type: DataType::Header,
            field_name: name.clone(),
            field_value: encode_field_value(value),
            row_index: None,
        });
        let detail = self.detail.iter().enumerate().flat_map(|(index, row)| {
            row.iter().map(move |(name, value)| NewRequestData {
                request_id: request_id.to_string(),
                data_type: DataType::Detail,
                field_name: name.clone(),
                field_value: encode_field_value(value),
                row_index: Some(index),
            })
        });
        header.chain(detail).collect()
    }
}

/// Stores the submitted fields and advances along the form's outgoing edge.
pub struct FormStep;

#[async_trait]
impl StepProcessor for FormStep {
    fn kind(&self) -> NodeKind {
        NodeKind::Form
    }

    async fn process(&self, step: &StepContext<'_>) -> Result<Request, EngineError> {
        let submission = FormSubmission::parse(step.payload)?;
        let transition = match step.flow.next_node(&step.node.id) {
            Some(next) => Transition::to(step, next, Some(RequestStatus::InProgress)).await?,
            None => Transition::stay(),
        };

        let rows = submission.rows(&step.request.id);
        let count = rows.len();
        for row in rows {
            step.store.create_request_data(row).await?;
        }
        tracing::debug!(
            request_id = %step.request.id,
            node_id = %step.node.id,
            rows = count,
            "form data stored"
        );

        transition.apply(step).await
    }
}
