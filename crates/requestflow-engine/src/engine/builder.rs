//! Engine builder: assembles the store, decision strategy and config.

use std::sync::Arc;

use super::config::EngineConfig;
use super::locks::RequestLocks;
use super::WorkflowEngine;
use crate::audit::AuditLogger;
use crate::defaults::{FirstConditionEvaluator, InMemoryStore};
use crate::tasks::TaskManager;
use crate::traits::{ConditionEvaluator, WorkflowStore};

/// Builder for assembling the [`WorkflowEngine`].
///
/// Every field is optional; [`build()`](EngineBuilder::build) fills the gaps
/// with an [`InMemoryStore`], the [`FirstConditionEvaluator`] and
/// [`EngineConfig::default()`].
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn WorkflowStore>>,
    evaluator: Option<Arc<dyn ConditionEvaluator>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Set the backing store. Default: [`InMemoryStore`].
    pub fn store(mut self, store: impl WorkflowStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Share an existing store with the engine.
    pub fn shared_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the decision strategy. Default: [`FirstConditionEvaluator`].
    pub fn evaluator(mut self, evaluator: impl ConditionEvaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> WorkflowEngine {
        let store: Arc<dyn WorkflowStore> = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let evaluator: Arc<dyn ConditionEvaluator> = self
            .evaluator
            .unwrap_or_else(|| Arc::new(FirstConditionEvaluator));

        tracing::debug!(evaluator = evaluator.name(), "workflow engine assembled");

        WorkflowEngine {
            audit: AuditLogger::new(Arc::clone(&store), self.config.system_user_id.clone()),
            tasks: TaskManager::new(Arc::clone(&store), self.config.default_task_title.clone()),
            locks: RequestLocks::new(),
            store,
            evaluator,
            config: self.config,
        }
    }
}
