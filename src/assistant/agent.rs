//! Library agent: the explicit tool dispatch loop.
//!
//! Each call to [`Agent::send`] runs the loop below until the model answers without
//! requesting a tool, or the iteration cap is hit:
//!
//! ```text
//! user message → model → {"tool_call": ...}? → ToolRegistry::execute_tool → model → ...
//! ```
//!
//! The agent keeps its own transcript for the model, including tool exchanges. The
//! [`ChatSession`] it owns only records what the user sees.

use std::error::Error;
use std::sync::Arc;

use crate::client_wrapper::{ClientWrapper, Message, TokenUsage};
use crate::prompt::agent_system_prompt;
use crate::session::ChatSession;
use crate::tool_protocol::ToolRegistry;

pub const MAX_ITERATIONS_WARNING: &str = "[Warning: Maximum tool iterations reached]";

/// A tool call extracted from a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub parameters: serde_json::Value,
}

/// Final answer of one agent turn.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub content: String,
    /// Usage summed over every model round-trip of the turn.
    pub tokens_used: Option<TokenUsage>,
    pub tool_calls_made: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model call failed: {0}")]
    Llm(#[source] Box<dyn Error + Send + Sync>),
}

pub struct Agent {
    client: Arc<dyn ClientWrapper>,
    registry: ToolRegistry,
    session: ChatSession,
    system_prompt: String,
    transcript: Vec<Message>,
    max_tool_iterations: usize,
}

impl Agent {
    pub fn new(
        client: Arc<dyn ClientWrapper>,
        registry: ToolRegistry,
        session: ChatSession,
        max_tool_iterations: usize,
    ) -> Self {
        let system_prompt = agent_system_prompt(session.project(), &registry.list_tools());
        Self {
            client,
            registry,
            session,
            system_prompt,
            transcript: Vec::new(),
            max_tool_iterations,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Switch project. The system prompt is rebuilt; the conversation is kept.
    pub fn set_project(&mut self, project: impl Into<String>) {
        self.session.set_project(project);
        self.system_prompt = agent_system_prompt(self.session.project(), &self.registry.list_tools());
    }

    /// Forget the conversation, the model transcript and the loaded documents.
    pub async fn reset(&mut self) {
        self.transcript.clear();
        self.session.reset().await;
    }

    /// Run one user turn through the dispatch loop.
    ///
    /// Tool failures are fed back to the model as text. Only a failed model call
    /// ends the turn with an error, in which case the transcript is rolled back to
    /// where the turn started.
    pub async fn send(&mut self, user_message: &str) -> Result<AgentResponse, AgentError> {
        self.session.history_mut().push_user(user_message);
        let turn_start = self.transcript.len();
        self.transcript.push(Message::user(user_message));

        let mut tokens_used: Option<TokenUsage> = None;
        let mut tool_iteration = 0;

        let mut current_response = match self.call_model(&mut tokens_used).await {
            Ok(reply) => reply,
            Err(err) => {
                self.transcript.truncate(turn_start);
                return Err(err);
            }
        };

        while let Some(tool_call) = parse_tool_call(&current_response) {
            if tool_iteration >= self.max_tool_iterations {
                log::warn!(
                    "stopping after {} tool calls; last request was '{}'",
                    tool_iteration,
                    tool_call.name
                );
                current_response = format!("{}\n\n{}", current_response, MAX_ITERATIONS_WARNING);
                break;
            }
            tool_iteration += 1;

            log::info!("tool call {}: {} {}", tool_iteration, tool_call.name, tool_call.parameters);
            let feedback = self.run_tool(tool_call).await;

            self.transcript.push(Message::assistant(current_response));
            self.transcript.push(Message::user(feedback));

            current_response = match self.call_model(&mut tokens_used).await {
                Ok(reply) => reply,
                Err(err) => {
                    self.transcript.truncate(turn_start);
                    return Err(err);
                }
            };
        }

        self.transcript.push(Message::assistant(current_response.clone()));
        self.session.history_mut().push_assistant(current_response.clone());

        Ok(AgentResponse {
            content: current_response,
            tokens_used,
            tool_calls_made: tool_iteration,
        })
    }

    async fn call_model(&self, tokens_used: &mut Option<TokenUsage>) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(self.transcript.iter().cloned());

        log::debug!(
            "sending {} messages to {}",
            messages.len(),
            self.client.model_name()
        );
        let reply = self
            .client
            .send_message(&messages)
            .await
            .map_err(AgentError::Llm)?;

        if let Some(usage) = self.client.get_last_usage().await {
            tokens_used.get_or_insert_with(TokenUsage::default).accumulate(&usage);
        }
        Ok(reply.content)
    }

    async fn run_tool(&self, tool_call: ToolCall) -> String {
        match self
            .registry
            .execute_tool(&tool_call.name, tool_call.parameters)
            .await
        {
            Ok(result) if result.success => {
                format!("Tool '{}' result:\n{}", tool_call.name, result.output_text())
            }
            Ok(result) => {
                let err = result.error.unwrap_or_else(|| "Unknown error".to_string());
                format!("Tool '{}' failed. Error: {}", tool_call.name, err)
            }
            Err(err) => {
                log::warn!("tool '{}' could not run: {}", tool_call.name, err);
                format!("Tool execution error: {}", err)
            }
        }
    }
}

/// Find the first `{"tool_call": {"name": ..., "parameters": {...}}}` object in a reply.
///
/// The object may be surrounded by prose or a code fence. Braces inside JSON strings
/// are ignored while matching. A missing `parameters` field is read as `{}`.
pub fn parse_tool_call(response: &str) -> Option<ToolCall> {
    let mut search_from = 0;
    while let Some(offset) = response[search_from..].find("\"tool_call\"") {
        let key_idx = search_from + offset;
        search_from = key_idx + 1;

        let open_idx = match response[..key_idx].trim_end().strip_suffix('{') {
            Some(before) => before.len(),
            None => continue,
        };
        let end_idx = match matching_brace(&response[open_idx..]) {
            Some(len) => open_idx + len,
            None => continue,
        };

        let parsed: serde_json::Value = match serde_json::from_str(&response[open_idx..end_idx]) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let call = match parsed.get("tool_call") {
            Some(call) => call,
            None => continue,
        };
        if let Some(name) = call.get("name").and_then(|v| v.as_str()) {
            let parameters = call
                .get("parameters")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            return Some(ToolCall {
                name: name.to_string(),
                parameters,
            });
        }
    }
    None
}

/// Byte length of the balanced `{...}` object at the start of `text`.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
