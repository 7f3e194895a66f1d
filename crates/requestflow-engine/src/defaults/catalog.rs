//! File-system request-type catalog.
//!
//! Layout:
//! ```text
//! {dir}/{anything}.json holds one RequestType
//! ```
//!
//! `flowDefinition` may be the serialized flow document (as the store keeps
//! it) or an inline JSON object, which is re-serialized on load.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::StoreError;
use crate::types::{FlowDefinition, RequestType};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestTypeFile {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    flow_definition: Value,
}

/// Read every `*.json` file in `dir` as a [`RequestType`], sorted by id.
///
/// Flow documents are decoded once here so a broken catalog entry fails at
/// load time instead of on the first request.
pub fn load_request_types(dir: &Path) -> Result<Vec<RequestType>, StoreError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        StoreError::store(format!("failed to read catalog {}: {e}", dir.display()))
    })?;

    let mut types = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::store(format!("failed to read entry: {e}")))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        types.push(load_file(&path)?);
    }
    types.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(types)
}

fn load_file(path: &Path) -> Result<RequestType, StoreError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| StoreError::store(format!("failed to read {}: {e}", path.display())))?;
    let file: RequestTypeFile = serde_json::from_str(&data)
        .map_err(|e| StoreError::store(format!("failed to parse {}: {e}", path.display())))?;

    let flow_definition = match file.flow_definition {
        Value::String(s) => s,
        other => other.to_string(),
    };
    FlowDefinition::from_json(&flow_definition).map_err(|e| {
        StoreError::store(format!("invalid flow in {}: {e}", path.display()))
    })?;

    Ok(RequestType {
        id: file.id,
        name: file.name,
        description: file.description,
        category: file.category,
        flow_definition,
    })
}
