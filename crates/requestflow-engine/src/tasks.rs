//! Task manager: approval tasks for requests entering an approval node,
//! task decisions, and the per-node approval tally.

use std::sync::Arc;

use chrono::Utc;

use crate::engine::EngineError;
use crate::errors::StoreError;
use crate::traits::WorkflowStore;
use crate::types::*;

/// Counts of a node's approval tasks by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalTally {
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl ApprovalTally {
    /// Tally as it will stand once `decision` lands on a pending task.
    pub fn with_decision(mut self, decision: TaskStatus) -> Self {
        self.pending = self.pending.saturating_sub(1);
        match decision {
            TaskStatus::Approved => self.approved += 1,
            TaskStatus::Rejected => self.rejected += 1,
            TaskStatus::Pending | TaskStatus::Completed => {}
        }
        self
    }
}

pub struct TaskManager {
    store: Arc<dyn WorkflowStore>,
    default_title: String,
}

impl TaskManager {
    pub fn new(store: Arc<dyn WorkflowStore>, default_title: impl Into<String>) -> Self {
        Self {
            store,
            default_title: default_title.into(),
        }
    }

    /// Work out the tasks `node` hands out to `request`, without writing.
    ///
    /// No assignees: one task for the request creator. Otherwise one task
    /// per assignee that resolves to a user; the rest are skipped with a
    /// warning. A config of the wrong shape fails with `InvalidFlow`.
    pub async fn plan_approval_tasks(
        &self,
        request: &Request,
        node: &FlowNode,
    ) -> Result<Vec<NewTask>, EngineError> {
        let config = node.approval_config()?;
        let title = config.title(&self.default_title).to_string();
        let task_for = |assigned_to: String| NewTask {
            request_id: request.id.clone(),
            node_id: node.id.clone(),
            assigned_to,
            task_type: TaskType::Approval,
            title: title.clone(),
            description: config.description.clone(),
        };

        let Some(assignees) = config.assignees() else {
            return Ok(vec![task_for(request.created_by.clone())]);
        };

        let mut tasks = Vec::with_capacity(assignees.len());
        for email in assignees {
            match self.store.find_user_by_email(email).await {
                Ok(Some(user)) => tasks.push(task_for(user.id)),
                Ok(None) => {
                    tracing::warn!(
                        request_id = %request.id,
                        node_id = %node.id,
                        assignee = %email,
                        "assignee does not resolve to a user, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %request.id,
                        node_id = %node.id,
                        assignee = %email,
                        error = %e,
                        "assignee lookup failed, skipping"
                    );
                }
            }
        }
        if tasks.is_empty() {
            tracing::warn!(
                request_id = %request.id,
                node_id = %node.id,
                "no assignee resolved, approval node has no tasks"
            );
        }
        Ok(tasks)
    }

    pub async fn create_tasks(&self, tasks: Vec<NewTask>) -> Result<Vec<Task>, StoreError> {
        let mut created = Vec::with_capacity(tasks.len());
        for task in tasks {
            created.push(self.store.create_task(task).await?);
        }
        Ok(created)
    }

    /// The user's pending approval task on `node_id`, first created first.
    pub async fn pending_task_for(
        &self,
        request_id: &str,
        node_id: &str,
        user_id: &str,
    ) -> Result<Option<Task>, StoreError> {
        let filter = TaskFilter {
            node_id: Some(node_id.to_string()),
            assigned_to: Some(user_id.to_string()),
            task_type: Some(TaskType::Approval),
            status: Some(TaskStatus::Pending),
        };
        Ok(self
            .store
            .list_tasks(request_id, &filter)
            .await?
            .into_iter()
            .next())
    }

    /// The user's pending approval task on any node other than
    /// `current_step`: one the request moved past before it was decided.
    pub async fn left_behind_task_for(
        &self,
        request_id: &str,
        current_step: &str,
        user_id: &str,
    ) -> Result<Option<Task>, StoreError> {
        let filter = TaskFilter {
            assigned_to: Some(user_id.to_string()),
            task_type: Some(TaskType::Approval),
            status: Some(TaskStatus::Pending),
            ..Default::default()
        };
        Ok(self
            .store
            .list_tasks(request_id, &filter)
            .await?
            .into_iter()
            .find(|t| t.node_id != current_step))
    }

    /// Close a task with `decision`, stamping `completed_at`.
    pub async fn decide(&self, task_id: &str, decision: TaskStatus) -> Result<Task, StoreError> {
        self.store
            .update_task(
                task_id,
                TaskPatch {
                    status: Some(decision),
                    completed_at: Some(Utc::now()),
                },
            )
            .await
    }

    /// Approval tasks of one node, counted by status.
    pub async fn tally(&self, request_id: &str, node_id: &str) -> Result<ApprovalTally, StoreError> {
        let filter = TaskFilter {
            node_id: Some(node_id.to_string()),
            task_type: Some(TaskType::Approval),
            ..Default::default()
        };
        let tasks = self.store.list_tasks(request_id, &filter).await?;
        let mut tally = ApprovalTally::default();
        for task in &tasks {
            match task.status {
                TaskStatus::Approved => tally.approved += 1,
                TaskStatus::Rejected => tally.rejected += 1,
                TaskStatus::Pending => tally.pending += 1,
                TaskStatus::Completed => {}
            }
        }
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::InMemoryStore;
    use serde_json::json;

    async fn seeded() -> (Arc<InMemoryStore>, TaskManager) {
        let store = Arc::new(InMemoryStore::new());
        for (id, email) in [("u-ann", "ann@example.com"), ("u-bob", "bob@example.com")] {
            store
                .insert_user(User {
                    id: id.into(),
                    email: email.into(),
                    name: id.into(),
                })
                .await;
        }
        let tasks = TaskManager::new(store.clone(), "Approval Required");
        (store, tasks)
    }

    fn request() -> Request {
        Request {
            id: "r1".into(),
            request_type_id: "rt".into(),
            title: "Laptop".into(),
            current_step: "approve".into(),
            status: RequestStatus::InProgress,
            created_by: "u-creator".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn no_assignees_goes_to_creator() {
        let (_, tasks) = seeded().await;
        for config in [json!({}), json!({"assignees": []})] {
            let node = FlowNode::new("approve", NodeKind::Approval).with_config(config);
            let planned = tasks.plan_approval_tasks(&request(), &node).await.unwrap();
            assert_eq!(planned.len(), 1);
            assert_eq!(planned[0].assigned_to, "u-creator");
            assert_eq!(planned[0].title, "Approval Required");
            assert_eq!(planned[0].node_id, "approve");
        }
    }

    #[tokio::test]
    async fn unresolved_assignees_are_skipped() {
        let (_, tasks) = seeded().await;
        let node = FlowNode::new("approve", NodeKind::Approval).with_config(json!({
            "assignees": ["ann@example.com", "ghost@example.com", "bob@example.com"],
            "title": "Manager sign-off",
            "description": "Check the budget"
        }));
        let planned = tasks.plan_approval_tasks(&request(), &node).await.unwrap();
        let assigned: Vec<_> = planned.iter().map(|t| t.assigned_to.as_str()).collect();
        assert_eq!(assigned, vec!["u-ann", "u-bob"]);
        assert_eq!(planned[0].title, "Manager sign-off");
        assert_eq!(planned[0].description.as_deref(), Some("Check the budget"));
    }

    #[tokio::test]
    async fn malformed_config_is_invalid_flow() {
        let (_, tasks) = seeded().await;
        let node =
            FlowNode::new("approve", NodeKind::Approval).with_config(json!({"assignees": "ann"}));
        let err = tasks.plan_approval_tasks(&request(), &node).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidFlow { .. }));
    }

    #[tokio::test]
    async fn tally_counts_only_the_node() {
        let (_, tasks) = seeded().await;
        let mk = |node: &str, user: &str| NewTask {
            request_id: "r1".into(),
            node_id: node.into(),
            assigned_to: user.into(),
            task_type: TaskType::Approval,
            title: "t".into(),
            description: None,
        };
        let created = tasks
            .create_tasks(vec![
                mk("first", "u-ann"),
                mk("second", "u-ann"),
                mk("second", "u-bob"),
            ])
            .await
            .unwrap();
        tasks.decide(&created[0].id, TaskStatus::Rejected).await.unwrap();
        tasks.decide(&created[1].id, TaskStatus::Approved).await.unwrap();

        let tally = tasks.tally("r1", "second").await.unwrap();
        assert_eq!(
            tally,
            ApprovalTally {
                approved: 1,
                rejected: 0,
                pending: 1
            }
        );
        assert_eq!(
            tally.with_decision(TaskStatus::Approved),
            ApprovalTally {
                approved: 2,
                rejected: 0,
                pending: 0
            }
        );

        let pending = tasks
            .pending_task_for("r1", "second", "u-bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.id, created[2].id);
        assert!(tasks
            .pending_task_for("r1", "first", "u-ann")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn left_behind_task_skips_the_current_step() {
        let (_, tasks) = seeded().await;
        let mk = |node: &str| NewTask {
            request_id: "r1".into(),
            node_id: node.into(),
            assigned_to: "u-ann".into(),
            task_type: TaskType::Approval,
            title: "t".into(),
            description: None,
        };
        let created = tasks
            .create_tasks(vec![mk("manager"), mk("director")])
            .await
            .unwrap();

        let found = tasks
            .left_behind_task_for("r1", "director", "u-ann")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created[0].id);
        assert!(tasks
            .left_behind_task_for("r1", "director", "u-bob")
            .await
            .unwrap()
            .is_none());

        tasks.decide(&created[0].id, TaskStatus::Approved).await.unwrap();
        assert!(tasks
            .left_behind_task_for("r1", "director", "u-ann")
            .await
            .unwrap()
            .is_none());
    }
}
