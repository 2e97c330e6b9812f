//! Language model abstraction, the OpenAI-compatible client and a scripted
//! stub for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolSpec;

/// Result of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Minimal abstraction around a chat completion provider. An empty `tools`
/// slice means the model must answer in text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelCompletion>;
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    AgentError::LanguageModel(format!("{provider} request failed with {status}: {body}"))
}

/// Decodes the JSON-encoded argument string of a provider tool call.
fn decode_tool_arguments(name: &str, raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        AgentError::MalformedResponse(format!("arguments for `{name}` are not JSON: {err}"))
    })?;
    if !value.is_object() {
        return Err(AgentError::MalformedResponse(format!(
            "arguments for `{name}` must be a JSON object, got `{raw}`"
        )));
    }
    Ok(value)
}

/// Only the first call is ever run, so only its arguments must decode.
/// Later calls with undecodable arguments are dropped with a warning.
fn decode_tool_calls(calls: Vec<OpenAiToolCall>) -> Result<Vec<ToolCall>> {
    let mut calls = calls.into_iter();
    let Some(first) = calls.next() else {
        return Ok(Vec::new());
    };
    let mut decoded = vec![ToolCall {
        arguments: decode_tool_arguments(&first.function.name, &first.function.arguments)?,
        id: first.id,
        name: first.function.name,
    }];
    decoded.extend(calls.filter_map(|call| {
        match decode_tool_arguments(&call.function.name, &call.function.arguments) {
            Ok(arguments) => Some(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            }),
            Err(err) => {
                tracing::warn!(tool = %call.function.name, error = %err, "dropping extra tool call");
                None
            }
        }
    }));
    Ok(decoded)
}

#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
    organization: Option<String>,
}

impl OpenAIClient {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AgentError::Configuration("missing OpenAI API key".into()))?;
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .map_err(|err| AgentError::LanguageModel(format!("http client error: {err}")))?,
            model: cfg.model.clone(),
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            organization: cfg.organization.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_messages(&self, messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                }
                .to_string();

                let tool_calls = message.tool_call.as_ref().map(|call| {
                    vec![OpenAiToolCall {
                        id: call.id.clone(),
                        r#type: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    }]
                });

                let content = match (&message.tool_result, &tool_calls) {
                    (Some(result), _) => Some(result.as_text()),
                    (None, Some(_)) if message.content.is_empty() => None,
                    _ => Some(message.content.clone()),
                };

                OpenAiMessage {
                    role,
                    content,
                    tool_call_id: message
                        .tool_result
                        .as_ref()
                        .and_then(|result| result.tool_call_id.clone()),
                    tool_calls,
                }
            })
            .collect()
    }

    fn to_openai_tools(&self, tools: &[ToolSpec]) -> Option<Vec<OpenAiTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| OpenAiTool {
                    r#type: "function".to_string(),
                    function: OpenAiFunction {
                        name: tool.name.clone(),
                        description: Some(tool.description.clone()),
                        parameters: Some(tool.json_schema()),
                    },
                })
                .collect(),
        )
    }

    fn build_payload(&self, messages: &[Message], tools: &[ToolSpec]) -> Value {
        let mut payload = json!({
            "model": self.model,
            "messages": self.to_openai_messages(messages),
        });
        if let Some(tools) = self.to_openai_tools(tools) {
            payload["tools"] = json!(tools);
            payload["tool_choice"] = json!("auto");
        }
        payload
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelCompletion> {
        let payload = self.build_payload(messages, tools);

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            );
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        let resp = builder
            .json(&payload)
            .send()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("OpenAI request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "openai"));
        }

        let body: OpenAiResponse = resp.json().await.map_err(|err| {
            AgentError::MalformedResponse(format!("OpenAI response parse error: {err}"))
        })?;

        let first = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::MalformedResponse("OpenAI returned no choices".into()))?;

        Ok(ModelCompletion {
            content: first.message.content,
            tool_calls: decode_tool_calls(first.message.tool_calls.unwrap_or_default())?,
        })
    }
}

/// One request observed by [`StubModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Scripted model. Each call pops the next directive:
/// `{"action":"respond","content":..}`, `{"action":"call_tool","name":..,"arguments":..}`
/// or `{"action":"call_tools","calls":[{"name":..,"arguments":..}]}`.
/// Anything that is not a directive is returned as plain text.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct StubCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum StubDirective {
    Respond { content: String },
    CallTool { name: String, arguments: Value },
    CallTools { calls: Vec<StubCall> },
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelCompletion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                messages: messages.to_vec(),
                tools: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        let raw = self
            .responses
            .lock()
            .map_err(|_| AgentError::LanguageModel("stub model poisoned".into()))?
            .pop_front()
            .ok_or_else(|| {
                AgentError::LanguageModel("StubModel ran out of scripted responses".into())
            })?;

        let calls = match serde_json::from_str::<StubDirective>(&raw) {
            Ok(StubDirective::Respond { content }) => {
                return Ok(ModelCompletion {
                    content: Some(content),
                    tool_calls: Vec::new(),
                })
            }
            Ok(StubDirective::CallTool { name, arguments }) => vec![StubCall { name, arguments }],
            Ok(StubDirective::CallTools { calls }) => calls,
            Err(_) => {
                return Ok(ModelCompletion {
                    content: Some(raw),
                    tool_calls: Vec::new(),
                })
            }
        };

        Ok(ModelCompletion {
            content: None,
            tool_calls: calls
                .into_iter()
                .enumerate()
                .map(|(idx, call)| ToolCall {
                    id: Some(format!("call_{idx}")),
                    name: call.name,
                    arguments: call.arguments,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    r#type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}
