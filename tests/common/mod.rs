#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use guardian_server::engine::WorkflowEngine;
use guardian_server::execution::{DatabaseResource, SqlExecutor};
use guardian_server::generation::{GenerationStep, QueryGenerator};
use guardian_server::schemas::HistoryEntry;
use guardian_server::storage::memory::MemoryThreadStore;

/// Generator double that replays a fixed script of steps.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<GenerationStep, String>>>,
}

impl ScriptedGenerator {
    pub fn new(steps: Vec<Result<GenerationStep, String>>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
        }
    }
}

#[async_trait]
impl QueryGenerator for ScriptedGenerator {
    async fn generate_step(&self, _history: &[HistoryEntry]) -> Result<GenerationStep> {
        match self.script.lock().pop_front() {
            Some(Ok(step)) => Ok(step),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("generator script exhausted")),
        }
    }
}

/// Executor double that records every call and replays scripted
/// results. An unscripted call fails loudly so gating bugs surface.
pub struct RecordingExecutor {
    pub calls: Mutex<Vec<(DatabaseResource, String)>>,
    responses: Mutex<VecDeque<Result<Value, String>>>,
}

impl RecordingExecutor {
    pub fn new(responses: Vec<Result<Value, String>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, sql)| sql.clone()).collect()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, resource: DatabaseResource, sql: &str) -> Result<Value> {
        self.calls.lock().push((resource, sql.to_string()));
        match self.responses.lock().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("unscripted execution: {sql}")),
        }
    }
}

pub fn tool_step(tool_name: &str, sql: &str) -> Result<GenerationStep, String> {
    Ok(GenerationStep::ToolCall {
        resource: DatabaseResource::from_tool_name(tool_name).unwrap(),
        tool_name: tool_name.to_string(),
        sql_statement: sql.to_string(),
        rationale: None,
    })
}

pub fn final_step(answer: &str) -> Result<GenerationStep, String> {
    Ok(GenerationStep::FinalAnswer {
        answer: answer.to_string(),
    })
}

pub fn build_engine(
    generator: ScriptedGenerator,
    executor: Arc<RecordingExecutor>,
    max_rounds: u32,
) -> WorkflowEngine {
    WorkflowEngine::new(
        Arc::new(MemoryThreadStore::new()),
        Arc::new(generator),
        executor,
        max_rounds,
    )
}
