//! Type-specific node configs, read from `FlowNode.data.config`.

use serde::{Deserialize, Serialize};

/// Field layout of a form node. The designer uses it to render the form;
/// the engine stores whatever the submission carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub header_fields: Vec<String>,
    #[serde(default)]
    pub detail_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

fn default_field_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Branching config of a decision node.
///
/// `conditions: None` and `conditions: Some(vec![])` mean different things:
/// the first follows the outgoing edge, the second falls back to
/// `default_target`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct DecisionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<DecisionCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,
}

impl DecisionConfig {
    /// `default_target`, treating an empty string as unset.
    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct DecisionCondition {
    #[serde(default)]
    pub expression: String,
    pub target: String,
}

/// Approval node config: who approves and how many approvals advance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ApprovalConfig {
    /// Assignee identities (emails). Absent or empty: the request creator
    /// approves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_approvals: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApprovalConfig {
    /// Configured assignees, `None` when the list is absent or empty.
    pub fn assignees(&self) -> Option<&[String]> {
        self.assignees.as_deref().filter(|a| !a.is_empty())
    }

    /// Approvals needed to advance. Zero or unset falls back to `default`.
    pub fn required_approvals(&self, default: u32) -> u32 {
        self.required_approvals.filter(|n| *n > 0).unwrap_or(default)
    }

    pub fn title<'a>(&'a self, default: &'a str) -> &'a str {
        self.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(default)
    }
}
