use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::DatabaseResource;

/// Lifecycle of a workflow thread. `ApprovalRequired` is the only
/// resumable status; the last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Running,
    ApprovalRequired,
    Completed,
    Rejected,
    Error,
}

impl ThreadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ThreadStatus::Completed | ThreadStatus::Rejected | ThreadStatus::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreadStatus::Running => "running",
            ThreadStatus::ApprovalRequired => "approval_required",
            ThreadStatus::Completed => "completed",
            ThreadStatus::Rejected => "rejected",
            ThreadStatus::Error => "error",
        }
    }
}

/// One entry of a thread's conversation history, in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Payload surfaced to the reviewer when a gated statement suspends a
/// thread, and persisted with it until a decision arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMutation {
    pub operation_type: String,
    pub resource: DatabaseResource,
    pub tool_name: String,
    pub sql_query: String,
    pub warning: String,
    pub options: Vec<String>,
    pub instructions: String,
}

/// Full persisted state of one workflow thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: String,
    pub status: ThreadStatus,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub pending: Option<PendingMutation>,
    #[serde(default)]
    pub rounds_used: u32,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub error_detail: Option<Value>,
    #[serde(default)]
    pub created_time: f64,
    #[serde(default)]
    pub updated_time: f64,
}

impl ThreadRecord {
    pub fn new(thread_id: String, query: String, now: f64) -> Self {
        Self {
            thread_id,
            status: ThreadStatus::Running,
            query,
            history: Vec::new(),
            pending: None,
            rounds_used: 0,
            result: None,
            summary: None,
            error_detail: None,
            created_time: now,
            updated_time: now,
        }
    }
}

/// Reviewer decision on a suspended mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Approve,
    Reject,
    Edit,
}

impl DecisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionKind::Approve => "approve",
            DecisionKind::Reject => "reject",
            DecisionKind::Edit => "edit",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub thread_id: String,
    pub status: ThreadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// One-element array while the thread is suspended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupt_data: Option<Vec<PendingMutation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub thread_id: String,
    pub decision: DecisionKind,
    #[serde(default)]
    pub modified_sql: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub thread_id: String,
    /// `approved_and_executed`, `rejected`, `edited_and_executed`,
    /// `approval_required` (resumed run suspended again) or `error`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// One-element array when the resumed run suspended again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupt_data: Option<Vec<PendingMutation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ThreadStateResponse {
    pub thread_id: String,
    pub status: ThreadStatus,
    pub query: String,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<PendingMutation>,
    pub rounds_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<Value>,
    pub created_time: f64,
    pub updated_time: f64,
}

impl From<ThreadRecord> for ThreadStateResponse {
    fn from(record: ThreadRecord) -> Self {
        Self {
            thread_id: record.thread_id,
            status: record.status,
            query: record.query,
            history: record.history,
            pending_action: record.pending,
            rounds_used: record.rounds_used,
            result: record.result,
            summary: record.summary,
            error_detail: record.error_detail,
            created_time: record.created_time,
            updated_time: record.updated_time,
        }
    }
}
