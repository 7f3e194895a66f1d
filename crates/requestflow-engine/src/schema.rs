//! JSON Schema for the flow document and its node configs.
//!
//! This module is only available when the `schemars` feature is enabled.

use schemars::{schema_for, JsonSchema};
use serde_json::Value;
use std::collections::BTreeMap;

/// Generate JSON Schema for a single type.
pub fn schema_of<T: JsonSchema>() -> Result<Value, serde_json::Error> {
    serde_json::to_value(schema_for!(T))
}

/// Schema of a whole flow document, as the designer saves it.
pub fn flow_definition_schema() -> Result<Value, serde_json::Error> {
    schema_of::<crate::FlowDefinition>()
}

/// Flow and node-config schemas, keyed by type name.
pub fn all_schemas() -> Result<BTreeMap<String, Value>, serde_json::Error> {
    let mut schemas = BTreeMap::new();

    // graph.rs
    schemas.insert("FlowDefinition".into(), schema_of::<crate::FlowDefinition>()?);
    schemas.insert("FlowNode".into(), schema_of::<crate::FlowNode>()?);
    schemas.insert("FlowEdge".into(), schema_of::<crate::FlowEdge>()?);
    schemas.insert("NodeKind".into(), schema_of::<crate::NodeKind>()?);

    // config.rs
    schemas.insert("FormConfig".into(), schema_of::<crate::FormConfig>()?);
    schemas.insert("DecisionConfig".into(), schema_of::<crate::DecisionConfig>()?);
    schemas.insert("ApprovalConfig".into(), schema_of::<crate::ApprovalConfig>()?);

    Ok(schemas)
}
