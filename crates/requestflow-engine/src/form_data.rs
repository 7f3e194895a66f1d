//! Read-side view of submitted form data.
//!
//! Rows are append-only, so the same field can appear several times. Rows
//! are folded in insertion order and the last write wins. Header fields
//! are keyed by name, detail fields by `{field}_{rowIndex}`.

use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::traits::WorkflowStore;
use crate::types::{DataType, RequestData};

/// Key a row is exposed under in the aggregated object.
pub fn field_key(row: &RequestData) -> String {
    match (row.data_type, row.row_index) {
        (DataType::Detail, Some(index)) => format!("{}_{index}", row.field_name),
        _ => row.field_name.clone(),
    }
}

/// Fold rows into one JSON object. Values that do not parse as JSON are
/// kept as plain strings.
pub fn aggregate(rows: &[RequestData]) -> Map<String, Value> {
    let mut data = Map::new();
    for row in rows {
        let value = serde_json::from_str(&row.field_value)
            .unwrap_or_else(|_| Value::String(row.field_value.clone()));
        data.insert(field_key(row), value);
    }
    data
}

/// Aggregated form data of a request.
pub async fn load(store: &dyn WorkflowStore, request_id: &str) -> Result<Value, StoreError> {
    let rows = store.list_request_data(request_id).await?;
    Ok(Value::Object(aggregate(&rows)))
}

/// Evaluation context for decisions: form data with the step payload's
/// top-level keys laid over it.
pub fn overlay(mut form_data: Map<String, Value>, payload: &Value) -> Value {
    if let Value::Object(extra) = payload {
        for (key, value) in extra {
            form_data.insert(key.clone(), value.clone());
        }
    }
    Value::Object(form_data)
}
