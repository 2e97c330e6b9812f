use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Wraps any error raised while talking to a tool's upstream.
    pub fn tool(
        name: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AgentError::ToolInvocation {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Short label used when the failure is shown to the user.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Configuration(_) => "ConfigurationError",
            AgentError::UnknownTool(_) => "UnknownTool",
            AgentError::DuplicateTool(_) => "DuplicateTool",
            AgentError::ToolInvocation { .. } => "ToolInvocationError",
            AgentError::LanguageModel(_) | AgentError::MalformedResponse(_) => "ModelCallError",
            AgentError::Protocol(_) => "ProtocolError",
            AgentError::Serde(_) => "SerializationError",
            AgentError::Io(_) => "IoError",
        }
    }
}

#[derive(Debug, Error)]
#[error("upstream returned HTTP {status}: {body}")]
pub struct UpstreamStatus {
    pub status: u16,
    pub body: String,
}
