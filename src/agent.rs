use std::sync::Arc;

use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::PromptConfig;
use crate::error::{AgentError, Result};
use crate::llm::{LanguageModel, ModelCompletion};
use crate::message::{Message, ToolCall, ToolResult};
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::tool::{ToolRegistry, ToolSpec};

/// How a single user turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model answered directly.
    Answered { text: String },
    /// The model called `tool` and answered from its output.
    AnsweredWithTool { tool: String, text: String },
    /// The turn could not be completed; `text` is what the user sees.
    Failed { kind: &'static str, text: String },
}

impl TurnOutcome {
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Answered { text }
            | TurnOutcome::AnsweredWithTool { text, .. }
            | TurnOutcome::Failed { text, .. } => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TurnOutcome::Failed { .. })
    }
}

enum TurnState {
    AwaitingModel,
    AwaitingTool(ToolCall),
    Done(TurnOutcome),
}

/// Runs one model decision, at most one tool call, and one final answer per
/// user message.
pub struct Agent<M: LanguageModel> {
    model: Arc<M>,
    tools: ToolRegistry,
    prompts: PromptConfig,
    retry: RetryPolicy,
}

impl<M: LanguageModel> Agent<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            tools: ToolRegistry::new(),
            prompts: PromptConfig::default(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptConfig) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handles one user message and records the exchange in `session`.
    /// Per-turn failures become a bot-visible error turn instead of an `Err`.
    pub async fn respond(
        &self,
        session: &mut Session,
        user_input: impl Into<String>,
    ) -> TurnOutcome {
        let user_input = user_input.into();
        let span = tracing::info_span!("turn", session = %session.id());

        let outcome = match self.run_turn(&user_input).instrument(span).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(kind = err.kind(), error = %err, "turn failed");
                TurnOutcome::Failed {
                    kind: err.kind(),
                    text: format!("Sorry, something went wrong ({}): {err}", err.kind()),
                }
            }
        };
        session.record_exchange(user_input, outcome.text());
        outcome
    }

    async fn run_turn(&self, user_input: &str) -> Result<TurnOutcome> {
        let mut state = TurnState::AwaitingModel;
        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    let messages = [
                        Message::system(&self.prompts.tool_selection),
                        Message::user(user_input),
                    ];
                    let completion = self.call_model(&messages, &self.tools.describe()).await?;
                    let mut calls = completion.tool_calls.into_iter();
                    match calls.next() {
                        Some(call) => {
                            let ignored: Vec<String> = calls.map(|c| c.name).collect();
                            if !ignored.is_empty() {
                                tracing::warn!(
                                    ?ignored,
                                    "model requested several tools; only the first is run"
                                );
                            }
                            TurnState::AwaitingTool(call)
                        }
                        None => {
                            let text = non_empty(completion.content).ok_or_else(|| {
                                AgentError::MalformedResponse(
                                    "model returned neither text nor a tool call".into(),
                                )
                            })?;
                            TurnState::Done(TurnOutcome::Answered { text })
                        }
                    }
                }
                TurnState::AwaitingTool(mut call) => {
                    if call.id.is_none() {
                        call.id = Some(format!("call_{}", Uuid::new_v4().simple()));
                    }
                    let result = self.invoke_tool(&call).await?;
                    let text = self.answer_with_tool(user_input, call, result.clone()).await?;
                    TurnState::Done(TurnOutcome::AnsweredWithTool {
                        tool: result.name,
                        text,
                    })
                }
                TurnState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    /// Runs the requested tool. Only an unknown name aborts the turn; adapter
    /// failures are handed to the model as an `{"error": ..}` payload.
    async fn invoke_tool(&self, call: &ToolCall) -> Result<ToolResult> {
        tracing::info!(tool = %call.name, arguments = %call.arguments, "invoking tool");
        let output = match self.tools.call(&call.name, call.arguments.clone()).await {
            Ok(value) => value,
            Err(err @ AgentError::UnknownTool(_)) => return Err(err),
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "tool failed");
                json!({ "error": err.to_string() })
            }
        };
        Ok(ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            output,
        })
    }

    async fn answer_with_tool(
        &self,
        user_input: &str,
        call: ToolCall,
        result: ToolResult,
    ) -> Result<String> {
        let messages = [
            Message::system(&self.prompts.answer),
            Message::user(user_input),
            Message::tool_call(call),
            Message::tool(result),
        ];
        let completion = self.call_model(&messages, &[]).await?;
        non_empty(completion.content)
            .ok_or_else(|| AgentError::MalformedResponse("model returned an empty answer".into()))
    }

    async fn call_model(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelCompletion> {
        self.retry
            .retry("model", |attempt| {
                tracing::debug!(attempt, tools = tools.len(), "calling model");
                self.model.complete_chat(messages, tools)
            })
            .await
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}
