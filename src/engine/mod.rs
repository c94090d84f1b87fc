use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::classify;
use crate::execution::SqlExecutor;
use crate::generation::{GenerationStep, QueryGenerator};
use crate::schemas::{DecisionKind, HistoryEntry, PendingMutation, ThreadRecord, ThreadStatus};
use crate::storage::{unix_now, ThreadStore};

mod error;

pub use error::EngineError;

pub const MUTATION_WARNING: &str =
    "This operation will modify the database. Please review carefully.";
const DECISION_INSTRUCTIONS: &str =
    "Reply with approve to run the statement as-is, reject to cancel it, \
     or edit with a replacement SQL statement.";

// Tool results are truncated before entering generator context.
const MAX_TOOL_CONTENT: usize = 4000;

/// How one drive of the ReAct loop ended.
enum DriveEnd {
    Final { answer: String, last_tool: Option<Value> },
    Suspended,
    Failed(EngineError),
}

/// Outcome of a reviewer decision.
#[derive(Debug)]
pub struct DecisionOutcome {
    pub record: ThreadRecord,
    pub status: String,
}

/// Orchestrates generate / classify / execute rounds for each thread
/// and owns every status transition.
pub struct WorkflowEngine {
    store: Arc<dyn ThreadStore>,
    generator: Arc<dyn QueryGenerator>,
    executor: Arc<dyn SqlExecutor>,
    max_rounds: u32,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        generator: Arc<dyn QueryGenerator>,
        executor: Arc<dyn SqlExecutor>,
        max_rounds: u32,
    ) -> Self {
        Self {
            store,
            generator,
            executor,
            max_rounds: max_rounds.max(1),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Start a new thread for a natural-language query and run it until
    /// it completes, suspends, or fails.
    pub async fn run_query(&self, query: &str) -> Result<ThreadRecord, EngineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::validation("text must not be empty"));
        }
        let thread_id = Uuid::new_v4().to_string();
        let mut record = ThreadRecord::new(thread_id.clone(), query.to_string(), unix_now());
        record.history.push(HistoryEntry::new("user", query));
        self.store.create(&record).map_err(store_error)?;
        info!(thread_id = %thread_id, "query accepted");

        let lock = self.lock_for(&thread_id);
        let _guard = lock.lock().await;
        let end = self.drive(&mut record, None).await;
        self.finish(&mut record, end)?;
        Ok(record)
    }

    /// Apply a reviewer decision to a suspended thread and, for approve
    /// and edit, resume the loop.
    pub async fn apply_decision(
        &self,
        thread_id: &str,
        decision: DecisionKind,
        modified_sql: Option<&str>,
    ) -> Result<DecisionOutcome, EngineError> {
        let modified_sql = modified_sql.map(str::trim);
        if decision == DecisionKind::Edit && modified_sql.unwrap_or("").is_empty() {
            return Err(EngineError::validation(
                "edit decision requires a non-empty modified_sql",
            ));
        }

        // Check existence before taking a lock so unknown ids never
        // leave an entry behind.
        if self.store.get(thread_id).map_err(store_error)?.is_none() {
            return Err(EngineError::not_found(format!("unknown thread: {thread_id}")));
        }

        let lock = self.lock_for(thread_id);
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .get(thread_id)
            .map_err(store_error)?
            .ok_or_else(|| EngineError::not_found(format!("unknown thread: {thread_id}")))?;
        if record.status != ThreadStatus::ApprovalRequired {
            return Err(EngineError::invalid_state(format!(
                "thread {thread_id} is {}, not awaiting approval",
                record.status.as_str()
            )));
        }
        let pending = record.pending.take().ok_or_else(|| {
            EngineError::internal(format!("thread {thread_id} suspended without pending mutation"))
        })?;

        if decision == DecisionKind::Reject {
            info!(thread_id = %thread_id, sql = %pending.sql_query, "mutation rejected");
            record
                .history
                .push(HistoryEntry::new("user", "Mutation rejected by the reviewer."));
            record.status = ThreadStatus::Rejected;
            record.summary = Some("The proposed mutation was rejected and not executed.".to_string());
            self.store.save(&record).map_err(store_error)?;
            return Ok(DecisionOutcome {
                record,
                status: "rejected".to_string(),
            });
        }

        // Approve runs the reviewed statement verbatim; edit swaps in the
        // reviewer's replacement without another classification pass.
        let sql = match decision {
            DecisionKind::Edit => modified_sql.unwrap_or(""),
            _ => pending.sql_query.as_str(),
        };
        // The target database was resolved when the tool call was
        // generated and rides on the pending action unchanged.
        let resource = pending.resource;
        if decision == DecisionKind::Edit {
            record.history.push(HistoryEntry::new(
                "user",
                format!("Reviewer replaced the statement with: {sql}"),
            ));
        }
        info!(
            thread_id = %thread_id,
            decision = decision.as_str(),
            sql = %sql,
            "mutation released for execution"
        );

        record.status = ThreadStatus::Running;
        let end = match self.executor.execute(resource, sql).await {
            Ok(value) => {
                record.history.push(tool_entry(&value));
                self.drive(&mut record, Some(value)).await
            }
            Err(err) => DriveEnd::Failed(EngineError::execution(err.to_string())),
        };
        self.finish(&mut record, end)?;

        let status = match record.status {
            ThreadStatus::ApprovalRequired => "approval_required".to_string(),
            ThreadStatus::Error => "error".to_string(),
            _ => match decision {
                DecisionKind::Edit => "edited_and_executed".to_string(),
                _ => "approved_and_executed".to_string(),
            },
        };
        Ok(DecisionOutcome { record, status })
    }

    pub fn get_thread(&self, thread_id: &str) -> Result<ThreadRecord, EngineError> {
        self.store
            .get(thread_id)
            .map_err(store_error)?
            .ok_or_else(|| EngineError::not_found(format!("unknown thread: {thread_id}")))
    }

    /// Run generate/execute rounds until a final answer, a suspension,
    /// a failure, or the round cap.
    async fn drive(&self, record: &mut ThreadRecord, mut last_tool: Option<Value>) -> DriveEnd {
        while record.rounds_used < self.max_rounds {
            let step = match self.generator.generate_step(&record.history).await {
                Ok(step) => step,
                Err(err) => {
                    warn!(thread_id = %record.thread_id, error = %err, "generation failed");
                    return DriveEnd::Failed(EngineError::generation(err.to_string()));
                }
            };
            match step {
                GenerationStep::FinalAnswer { answer } => {
                    record.history.push(HistoryEntry::new("assistant", answer.clone()));
                    return DriveEnd::Final { answer, last_tool };
                }
                GenerationStep::ToolCall {
                    resource,
                    tool_name,
                    sql_statement,
                    rationale,
                } => {
                    record.rounds_used += 1;
                    record.history.push(HistoryEntry::new(
                        "assistant",
                        json!({
                            "tool_name": tool_name,
                            "sql": sql_statement,
                            "rationale": rationale,
                        })
                        .to_string(),
                    ));
                    let classification = classify(&sql_statement);
                    if classification.is_write_or_ddl {
                        info!(
                            thread_id = %record.thread_id,
                            operation = %classification.operation_type,
                            rule = classification.matched_rule.as_deref().unwrap_or(""),
                            "statement gated for approval"
                        );
                        record.pending = Some(PendingMutation {
                            operation_type: classification.operation_type,
                            resource,
                            tool_name,
                            sql_query: sql_statement,
                            warning: MUTATION_WARNING.to_string(),
                            options: vec![
                                "approve".to_string(),
                                "reject".to_string(),
                                "edit".to_string(),
                            ],
                            instructions: DECISION_INSTRUCTIONS.to_string(),
                        });
                        record.status = ThreadStatus::ApprovalRequired;
                        return DriveEnd::Suspended;
                    }
                    match self.executor.execute(resource, &sql_statement).await {
                        Ok(value) => {
                            record.history.push(tool_entry(&value));
                            last_tool = Some(value);
                        }
                        Err(err) => {
                            warn!(thread_id = %record.thread_id, error = %err, "execution failed");
                            return DriveEnd::Failed(EngineError::execution(err.to_string()));
                        }
                    }
                }
            }
        }
        DriveEnd::Failed(EngineError::generation(format!(
            "no final answer after {} rounds",
            self.max_rounds
        )))
    }

    /// Fold a drive result into the record and persist it.
    fn finish(&self, record: &mut ThreadRecord, end: DriveEnd) -> Result<(), EngineError> {
        match end {
            DriveEnd::Final { answer, last_tool } => {
                record.status = ThreadStatus::Completed;
                // The reply surfaces the freshest tool result when one
                // exists; the narrative answer rides along as summary.
                record.result = Some(last_tool.unwrap_or_else(|| Value::String(answer.clone())));
                record.summary = Some(answer);
                record.pending = None;
            }
            DriveEnd::Suspended => {
                // drive() already staged status and pending mutation.
            }
            DriveEnd::Failed(err) => {
                record.status = ThreadStatus::Error;
                record.error_detail = Some(err.to_payload());
                record.pending = None;
            }
        }
        self.store.save(record).map_err(store_error)?;
        if record.status.is_terminal() {
            // Terminal threads take no further steps; drop their lock
            // entry so the map stays bounded by live threads.
            self.locks.remove(&record.thread_id);
        }
        Ok(())
    }
}

fn store_error(err: anyhow::Error) -> EngineError {
    EngineError::internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    use crate::execution::DatabaseResource;
    use crate::generation::{GenerationStep, QueryGenerator};
    use crate::storage::memory::MemoryThreadStore;

    struct Scripted(parking_lot::Mutex<VecDeque<GenerationStep>>);

    #[async_trait]
    impl QueryGenerator for Scripted {
        async fn generate_step(&self, _history: &[HistoryEntry]) -> anyhow::Result<GenerationStep> {
            self.0
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }
    }

    struct FixedExecutor;

    #[async_trait]
    impl SqlExecutor for FixedExecutor {
        async fn execute(&self, _resource: DatabaseResource, _sql: &str) -> anyhow::Result<Value> {
            Ok(json!({ "rows_affected": 1 }))
        }
    }

    fn engine(steps: Vec<GenerationStep>) -> WorkflowEngine {
        WorkflowEngine::new(
            Arc::new(MemoryThreadStore::new()),
            Arc::new(Scripted(parking_lot::Mutex::new(steps.into_iter().collect()))),
            Arc::new(FixedExecutor),
            4,
        )
    }

    fn gated_delete() -> GenerationStep {
        GenerationStep::ToolCall {
            resource: DatabaseResource::Hr,
            tool_name: "query_hr_database".to_string(),
            sql_statement: "DELETE FROM employees WHERE id = 7".to_string(),
            rationale: None,
        }
    }

    #[tokio::test]
    async fn decision_on_unknown_thread_leaves_no_lock_entry() {
        let engine = engine(vec![]);
        let err = engine
            .apply_decision("ghost", DecisionKind::Approve, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(engine.locks.is_empty());
    }

    #[tokio::test]
    async fn completed_thread_releases_its_lock() {
        let engine = engine(vec![GenerationStep::FinalAnswer {
            answer: "done".to_string(),
        }]);
        let record = engine.run_query("hello").await.unwrap();
        assert_eq!(record.status, ThreadStatus::Completed);
        assert!(engine.locks.is_empty());
    }

    #[tokio::test]
    async fn suspended_thread_keeps_its_lock_until_terminal() {
        let engine = engine(vec![gated_delete()]);
        let record = engine.run_query("remove employee 7").await.unwrap();
        assert_eq!(record.status, ThreadStatus::ApprovalRequired);
        assert_eq!(engine.locks.len(), 1);

        let outcome = engine
            .apply_decision(&record.thread_id, DecisionKind::Reject, None)
            .await
            .unwrap();
        assert_eq!(outcome.status, "rejected");
        assert!(engine.locks.is_empty());
    }
}

fn tool_entry(value: &Value) -> HistoryEntry {
    let mut content = value.to_string();
    if content.len() > MAX_TOOL_CONTENT {
        let cut = content
            .char_indices()
            .take_while(|(index, _)| *index < MAX_TOOL_CONTENT)
            .last()
            .map(|(index, ch)| index + ch.len_utf8())
            .unwrap_or(0);
        content.truncate(cut);
        content.push_str(" …[truncated]");
    }
    HistoryEntry::new("tool", content)
}
