//! A small tool-calling chat agent.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) with an OpenAI-compatible client.
//! - A tool interface (`Tool`, `ToolSpec`) and a name-keyed `ToolRegistry`.
//! - Adapters for stock prices, weather, library books, Wikipedia and web search.
//! - An `Agent` that asks the model once, runs at most one tool, and asks the
//!   model again to turn the tool output into the final answer.
//! - An append-only `Session` transcript.

mod agent;
mod config;
mod error;
mod llm;
mod message;
mod retry;
mod session;
mod tool;
pub mod tools;

pub use agent::{Agent, TurnOutcome};
pub use config::{AppConfig, ModelConfig, PromptConfig, ToolsConfig};
pub use error::{AgentError, Result, UpstreamStatus};
pub use llm::{LanguageModel, ModelCompletion, OpenAIClient, RecordedRequest, StubModel};
pub use message::{Message, Role, ToolCall, ToolResult};
pub use retry::RetryPolicy;
pub use session::{ConversationTurn, Session, Speaker};
pub use tool::{ParameterKind, ParameterSpec, Tool, ToolRegistry, ToolSpec};
pub use tools::default_registry;
