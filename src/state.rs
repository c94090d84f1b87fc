use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::engine::WorkflowEngine;
use crate::execution::SqliteExecutor;
use crate::generation::LlmGenerator;
use crate::storage::{self, ThreadStore};

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ThreadStore>,
    pub engine: Arc<WorkflowEngine>,
}

impl AppState {
    pub fn build(config: Config) -> Result<Self> {
        let store = storage::build_store(&config.storage)?;
        let generator = Arc::new(LlmGenerator::new(&config.llm)?);
        let executor = Arc::new(SqliteExecutor::new(&config.databases));
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            generator,
            executor,
            config.workflow.max_rounds,
        ));
        Ok(Self {
            config: Arc::new(config),
            store,
            engine,
        })
    }
}
