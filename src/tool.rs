use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Number,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
}

/// What the model is told about a tool: its name, when to use it, and the
/// arguments it takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn required(
        self,
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        self.with_parameter(name, kind, description, true)
    }

    pub fn optional(
        self,
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        self.with_parameter(name, kind, description, false)
    }

    fn with_parameter(
        mut self,
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            kind,
            description: description.into(),
            required,
        });
        self
    }

    /// JSON-Schema object describing the arguments.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({"type": param.kind, "description": param.description}),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn call(&self, input: Value) -> Result<Value>;

    fn name(&self) -> &str {
        &self.spec().name
    }
}

/// Name-keyed set of tools. Built once at startup and read-only afterwards.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs of every registered tool, ordered by name.
    pub fn describe(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec().clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub async fn call(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        tool.call(input).await.map_err(|err| match err {
            err @ AgentError::ToolInvocation { .. } => err,
            other => AgentError::ToolInvocation {
                name: name.to_string(),
                source: Box::new(other),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        spec: ToolSpec,
    }

    impl EchoTool {
        fn new(name: &str) -> Self {
            Self {
                spec: ToolSpec::new(name, "Echoes the payload back").required(
                    "text",
                    ParameterKind::String,
                    "Text to echo",
                ),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn call(&self, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    struct FailingTool {
        spec: ToolSpec,
    }

    #[async_trait]
    impl Tool for FailingTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn call(&self, _input: Value) -> Result<Value> {
            Err(AgentError::Protocol("missing `keyword`".into()))
        }
    }

    #[test]
    fn schema_lists_properties_and_required_names() {
        let spec = ToolSpec::new("search", "Searches")
            .required("query", ParameterKind::String, "What to look for")
            .optional("max_results", ParameterKind::Integer, "Result cap");

        let schema = spec.json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["properties"]["max_results"]["type"], "integer");
        assert_eq!(schema["required"], json!(["query"]));
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("echo")).unwrap();
        let err = registry.register(EchoTool::new("echo")).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn describe_is_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("zeta")).unwrap();
        registry.register(EchoTool::new("alpha")).unwrap();
        let names: Vec<String> = registry.describe().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_typed_error() {
        let registry = ToolRegistry::new();
        let err = registry.call("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "nope"));
    }

    #[tokio::test]
    async fn handler_errors_are_wrapped_with_the_tool_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register(FailingTool {
                spec: ToolSpec::new("books", "Fails"),
            })
            .unwrap();
        let err = registry.call("books", json!({})).await.unwrap_err();
        match err {
            AgentError::ToolInvocation { name, source } => {
                assert_eq!(name, "books");
                assert!(source.to_string().contains("keyword"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
