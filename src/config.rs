use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: default_base_url(),
            organization: None,
            timeout_secs: default_model_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini-2024-07-18".into()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_stooq_url")]
    pub stooq_url: String,
    #[serde(default = "default_open_meteo_url")]
    pub open_meteo_url: String,
    #[serde(default = "default_cinii_url")]
    pub cinii_url: String,
    #[serde(default = "default_wikipedia_lang")]
    pub wikipedia_lang: String,
    /// Overrides the `https://{lang}.wikipedia.org` host when set.
    #[serde(default)]
    pub wikipedia_url: Option<String>,
    #[serde(default = "default_duckduckgo_url")]
    pub duckduckgo_url: String,
    #[serde(default = "default_max_results")]
    pub max_search_results: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            stooq_url: default_stooq_url(),
            open_meteo_url: default_open_meteo_url(),
            cinii_url: default_cinii_url(),
            wikipedia_lang: default_wikipedia_lang(),
            wikipedia_url: None,
            duckduckgo_url: default_duckduckgo_url(),
            max_search_results: default_max_results(),
        }
    }
}

impl ToolsConfig {
    pub fn wikipedia_base(&self) -> String {
        self.wikipedia_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.wikipedia.org", self.wikipedia_lang))
    }
}

fn default_tool_timeout() -> u64 {
    10
}

fn default_stooq_url() -> String {
    "https://stooq.com".into()
}

fn default_open_meteo_url() -> String {
    "https://api.open-meteo.com".into()
}

fn default_cinii_url() -> String {
    "https://ci.nii.ac.jp".into()
}

fn default_wikipedia_lang() -> String {
    "ja".into()
}

fn default_duckduckgo_url() -> String {
    "https://html.duckduckgo.com".into()
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptConfig {
    /// Sent with the first call, when the model may still pick a tool.
    #[serde(default = "default_tool_prompt")]
    pub tool_selection: String,
    /// Sent with the second call that turns tool output into an answer.
    #[serde(default = "default_answer_prompt")]
    pub answer: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            tool_selection: default_tool_prompt(),
            answer: default_answer_prompt(),
        }
    }
}

fn default_tool_prompt() -> String {
    "You are a helpful assistant. Use the supplied tools to assist the user if needed.".into()
}

fn default_answer_prompt() -> String {
    "You are a helpful assistant.".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| {
            AgentError::Configuration(format!("failed to parse configuration: {err}"))
        })
    }

    /// Loads `path` when given (or defaults otherwise) and applies
    /// environment overrides on top.
    pub fn from_env_or_file(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("AGENT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.model.api_key = Some(key);
        }
        if let Some(model) = lookup("AGENT_MODEL") {
            self.model.model = model;
        }
        if let Some(url) = lookup("AGENT_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(org) = lookup("OPENAI_ORG_ID") {
            self.model.organization = Some(org);
        }
        if let Some(parsed) = lookup("AGENT_MODEL_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.model.timeout_secs = parsed;
        }
        if let Some(parsed) = lookup("AGENT_MODEL_RETRIES").and_then(|v| v.parse().ok()) {
            self.model.max_retries = parsed;
        }
        if let Some(parsed) = lookup("AGENT_TOOL_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.tools.timeout_secs = parsed;
        }
        if let Some(lang) = lookup("AGENT_WIKIPEDIA_LANG") {
            self.tools.wikipedia_lang = lang;
        }
    }

    /// The LLM credential. Its absence is the only startup failure.
    pub fn require_api_key(&self) -> Result<&str> {
        self.model
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AgentError::Configuration(
                    "no API key configured; set OPENAI_API_KEY or model.api_key".into(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_file_and_applies_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[model]\nmodel='gpt-4o'\ntimeout_secs=30\n[tools]\nwikipedia_lang='en'"
        )
        .unwrap();

        let mut cfg = AppConfig::from_file(file.path()).unwrap();
        let env: HashMap<&str, &str> =
            HashMap::from([("OPENAI_API_KEY", "sk-test"), ("AGENT_MODEL_RETRIES", "0")]);
        cfg.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.model.model, "gpt-4o");
        assert_eq!(cfg.model.timeout_secs, 30);
        assert_eq!(cfg.model.max_retries, 0);
        assert_eq!(cfg.model.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.tools.wikipedia_base(), "https://en.wikipedia.org");
        assert_eq!(cfg.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn agent_key_wins_over_openai_key() {
        let mut cfg = AppConfig::default();
        let env: HashMap<&str, &str> =
            HashMap::from([("OPENAI_API_KEY", "sk-openai"), ("AGENT_API_KEY", "sk-agent")]);
        cfg.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(cfg.require_api_key().unwrap(), "sk-agent");
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let mut cfg = AppConfig::default();
        cfg.model.api_key = Some("   ".into());
        let err = cfg.require_api_key().unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn unparsable_overrides_are_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|key| (key == "AGENT_TOOL_TIMEOUT").then(|| "soon".to_string()));
        assert_eq!(cfg.tools.timeout_secs, 10);
    }

    #[test]
    fn rejects_invalid_toml() {
        let err = AppConfig::from_toml("[model\nmodel=").unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }
}
