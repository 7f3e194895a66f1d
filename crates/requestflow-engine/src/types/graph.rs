//! Flow graph schema: the contract between the flow designer and the engine.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::config::{ApprovalConfig, DecisionConfig, FormConfig};

/// Errors raised while reading a flow definition or one of its node configs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowDecodeError {
    /// The document is not valid JSON or does not have the flow shape.
    #[error("malformed flow definition: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A node carries a `type` outside the closed node set.
    #[error("node {node_id} has unknown type: {node_type}")]
    UnknownNodeType { node_id: String, node_type: String },
    /// A node's `data.config` does not match the shape its type expects.
    #[error("invalid {kind} config on node {node_id}: {source}")]
    Config {
        node_id: String,
        kind: NodeKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable description of a workflow template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct FlowDefinition {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    /// Ordered: [`next_node`](Self::next_node) picks the first edge that
    /// leaves a node.
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

/// A typed step in a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Canvas position. Carried through untouched; the engine ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub data: NodeData,
}

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    Form,
    Decision,
    Approval,
    End,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Form => "form",
            Self::Decision => "decision",
            Self::Approval => "approval",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "form" => Ok(Self::Form),
            "decision" => Ok(Self::Decision),
            "approval" => Ok(Self::Approval),
            "end" => Ok(Self::End),
            other => Err(other.to_string()),
        }
    }
}

/// Display label plus the type-specific config blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A directed transition between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Free-form guard authored in the designer. Informational only;
    /// branching is driven by the decision node config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

// Wire shape used by `from_json`: node types stay raw strings so an
// unknown type can be reported with the node that carries it.
#[derive(Deserialize)]
struct RawFlow {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<FlowEdge>,
}

#[derive(Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    data: NodeData,
}

impl FlowDefinition {
    /// Decode a flow document, checking every node type against the
    /// closed node set.
    pub fn from_json(json: &str) -> Result<Self, FlowDecodeError> {
        let raw: RawFlow = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Same as [`from_json`](Self::from_json) for an already-parsed value.
    pub fn from_value(value: Value) -> Result<Self, FlowDecodeError> {
        let raw: RawFlow = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawFlow) -> Result<Self, FlowDecodeError> {
        let nodes = raw
            .nodes
            .into_iter()
            .map(|n| {
                let kind = n.kind.parse::<NodeKind>().map_err(|node_type| {
                    FlowDecodeError::UnknownNodeType {
                        node_id: n.id.clone(),
                        node_type,
                    }
                })?;
                Ok(FlowNode {
                    id: n.id,
                    kind,
                    position: n.position,
                    data: n.data,
                })
            })
            .collect::<Result<Vec<_>, FlowDecodeError>>()?;
        Ok(Self {
            nodes,
            edges: raw.edges,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn find_node(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Follow the first edge leaving `node_id`. `None` marks a dead end,
    /// either because no edge leaves the node or because the edge points at
    /// a node that does not exist.
    pub fn next_node(&self, node_id: &str) -> Option<&FlowNode> {
        let edge = self.edges.iter().find(|e| e.source == node_id)?;
        self.find_node(&edge.target)
    }

    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a FlowEdge> {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// The start node, if exactly one exists.
    pub fn start_node(&self) -> Option<&FlowNode> {
        let mut starts = self.nodes_of_kind(NodeKind::Start);
        let first = starts.next()?;
        match starts.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// The first end node in node order.
    pub fn end_node(&self) -> Option<&FlowNode> {
        self.nodes_of_kind(NodeKind::End).next()
    }
}

impl FlowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            position: None,
            data: NodeData::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = label.into();
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.data.config = Some(config);
        self
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    pub fn form_config(&self) -> Result<FormConfig, FlowDecodeError> {
        self.typed_config()
    }

    pub fn decision_config(&self) -> Result<DecisionConfig, FlowDecodeError> {
        self.typed_config()
    }

    pub fn approval_config(&self) -> Result<ApprovalConfig, FlowDecodeError> {
        self.typed_config()
    }

    /// A missing or `null` config reads as the config's default.
    fn typed_config<T: DeserializeOwned + Default>(&self) -> Result<T, FlowDecodeError> {
        match &self.data.config {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => T::deserialize(value).map_err(|source| FlowDecodeError::Config {
                node_id: self.id.clone(),
                kind: self.kind,
                source,
            }),
        }
    }
}

impl FlowEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            condition: None,
        }
    }
}
