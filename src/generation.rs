use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::execution::DatabaseResource;
use crate::schemas::HistoryEntry;

const SYSTEM_PROMPT: &str = "You are a database assistant for an HR database and a Sales database.\n\
Respond with exactly one JSON object and nothing else.\n\
To run SQL: {\"action\": \"tool\", \"tool_name\": \"query_hr_database\" | \"query_sales_database\", \"sql\": \"<one SQL statement>\", \"rationale\": \"<short reason>\"}\n\
To answer the user: {\"action\": \"final\", \"answer\": \"<natural language answer>\"}\n\
Issue one statement at a time and base answers on tool results already in the conversation.";

/// One step of the ReAct loop as decided by the generator.
#[derive(Debug, Clone)]
pub enum GenerationStep {
    FinalAnswer {
        answer: String,
    },
    ToolCall {
        resource: DatabaseResource,
        tool_name: String,
        sql_statement: String,
        rationale: Option<String>,
    },
}

/// Planning seam of the workflow. Implementations decide, per round,
/// whether to call a database tool or answer.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate_step(&self, history: &[HistoryEntry]) -> Result<GenerationStep>;
}

/// OpenAI-compatible chat-completions client.
pub struct LlmGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl LlmGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .context("build llm http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn build_messages(&self, history: &[HistoryEntry]) -> Vec<Value> {
        let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];
        for entry in history {
            // Tool results ride as user turns so any chat backend accepts them.
            let role = match entry.role.as_str() {
                "assistant" => "assistant",
                _ => "user",
            };
            messages.push(json!({ "role": role, "content": entry.content }));
        }
        messages
    }
}

#[async_trait]
impl QueryGenerator for LlmGenerator {
    async fn generate_step(&self, history: &[HistoryEntry]) -> Result<GenerationStep> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": self.build_messages(history),
        });
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await.context("llm request failed")?;
        let status = response.status();
        let payload: Value = response.json().await.context("llm response not json")?;
        if !status.is_success() {
            return Err(anyhow!("llm backend returned {status}: {payload}"));
        }
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("llm response missing message content"))?;
        parse_step(content)
    }
}

/// Parse a model reply into a step. Tolerates markdown fences and prose
/// around the JSON object.
pub fn parse_step(content: &str) -> Result<GenerationStep> {
    let raw = extract_json(content)
        .ok_or_else(|| anyhow!("no JSON object in model reply: {content:?}"))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("malformed step JSON: {raw}"))?;
    match value["action"].as_str() {
        Some("final") => {
            let answer = value["answer"]
                .as_str()
                .ok_or_else(|| anyhow!("final step missing answer"))?;
            Ok(GenerationStep::FinalAnswer {
                answer: answer.to_string(),
            })
        }
        Some("tool") => {
            let tool_name = value["tool_name"]
                .as_str()
                .ok_or_else(|| anyhow!("tool step missing tool_name"))?
                .to_string();
            let sql_statement = value["sql"]
                .as_str()
                .ok_or_else(|| anyhow!("tool step missing sql"))?
                .trim()
                .to_string();
            if sql_statement.is_empty() {
                return Err(anyhow!("tool step has empty sql"));
            }
            let resource = DatabaseResource::from_tool_name(&tool_name)
                .ok_or_else(|| anyhow!("unknown tool: {tool_name}"))?;
            let rationale = value["rationale"].as_str().map(|text| text.to_string());
            Ok(GenerationStep::ToolCall {
                resource,
                tool_name,
                sql_statement,
                rationale,
            })
        }
        other => Err(anyhow!("unknown step action: {other:?}")),
    }
}

fn extract_json(content: &str) -> Option<String> {
    let fence = Regex::new(r"```(?:json)?\s*([\s\S]*?)```").ok()?;
    if let Some(captures) = fence.captures(content) {
        let inner = captures[1].trim();
        if inner.starts_with('{') {
            return Some(inner.to_string());
        }
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end > start {
        Some(content[start..=end].to_string())
    } else {
        None
    }
}
