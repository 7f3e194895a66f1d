use crate::types::{FlowDefinition, NodeKind};
use std::collections::HashSet;

/// Outcome of [`validate_flow`]. Errors make a flow unusable; warnings
/// flag designer mistakes the engine tolerates at run time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a `FlowDefinition` for structural correctness.
pub fn validate_flow(flow: &FlowDefinition) -> ValidationReport {
    let mut report = ValidationReport::default();
    let errors = &mut report.errors;

    if flow.nodes.is_empty() {
        errors.push("Flow has no nodes".to_string());
        return report;
    }

    // 1. No duplicate node IDs.
    let mut seen_ids = HashSet::new();
    for node in &flow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            errors.push(format!("Duplicate node ID: {}", node.id));
        }
    }

    // 2. No duplicate edge IDs.
    let mut seen_edge_ids = HashSet::new();
    for edge in &flow.edges {
        if !seen_edge_ids.insert(edge.id.as_str()) {
            errors.push(format!("Duplicate edge ID: {}", edge.id));
        }
    }

    // 3. All edge endpoints reference existing nodes.
    for edge in &flow.edges {
        if !seen_ids.contains(edge.source.as_str()) {
            errors.push(format!(
                "Edge {} references unknown source node: {}",
                edge.id, edge.source
            ));
        }
        if !seen_ids.contains(edge.target.as_str()) {
            errors.push(format!(
                "Edge {} references unknown target node: {}",
                edge.id, edge.target
            ));
        }
    }

    // 4. Exactly one start node, and nothing flows into it.
    let with_incoming: HashSet<&str> = flow.edges.iter().map(|e| e.target.as_str()).collect();
    let starts: Vec<_> = flow.nodes_of_kind(NodeKind::Start).collect();
    match starts.len() {
        0 => errors.push("Flow has no start node".to_string()),
        1 => {}
        n => errors.push(format!("Flow has {n} start nodes, expected exactly one")),
    }
    for start in &starts {
        if with_incoming.contains(start.id.as_str()) {
            errors.push(format!("Start node {} has an incoming edge", start.id));
        }
    }

    // 5. At least one end node.
    if flow.end_node().is_none() {
        errors.push("Flow has no end node".to_string());
    }

    for node in &flow.nodes {
        if node.kind != NodeKind::Start && !with_incoming.contains(node.id.as_str()) {
            report
                .warnings
                .push(format!("Node {} is disconnected (no incoming edge)", node.id));
        }

        match node.kind {
            NodeKind::Form => {
                if let Err(e) = node.form_config() {
                    report.errors.push(e.to_string());
                }
            }
            NodeKind::Decision => match node.decision_config() {
                Ok(config) => {
                    let targets = config
                        .conditions
                        .iter()
                        .flatten()
                        .map(|c| c.target.as_str())
                        .chain(config.default_target());
                    for target in targets {
                        if flow.find_node(target).is_none() {
                            report.warnings.push(format!(
                                "Decision node {} targets unknown node: {}",
                                node.id, target
                            ));
                        }
                    }
                }
                Err(e) => report.errors.push(e.to_string()),
            },
            NodeKind::Approval => match node.approval_config() {
                Ok(config) => {
                    if let (Some(assignees), Some(required)) =
                        (config.assignees(), config.required_approvals)
                    {
                        if required as usize > assignees.len() {
                            report.warnings.push(format!(
                                "Approval node {} requires {} approvals but has {} assignees",
                                node.id,
                                required,
                                assignees.len()
                            ));
                        }
                    }
                }
                Err(e) => report.errors.push(e.to_string()),
            },
            NodeKind::Start | NodeKind::End => {}
        }
    }

    report
}
