//! Tool adapters - one per external data source.
//!
//! - Stock prices: daily closes from Stooq
//! - Weather: current conditions from Open-Meteo
//! - Books: CiNii Books catalog search
//! - Wikipedia: article introductions
//! - DuckDuckGo: web search

pub mod books;
pub mod duckduckgo;
pub mod stock;
pub mod weather;
pub mod wikipedia;

use std::time::Duration;

use serde_json::Value;

use crate::config::ToolsConfig;
use crate::error::{AgentError, Result, UpstreamStatus};
use crate::tool::ToolRegistry;

pub use books::BooksTool;
pub use duckduckgo::{DuckDuckGoSearchTool, SearchResult};
pub use stock::StockPriceTool;
pub use weather::WeatherTool;
pub use wikipedia::WikipediaTool;

const USER_AGENT: &str = "tool-agent/0.1 (+https://github.com/tool-agent/tool-agent)";

/// Registry with every production tool, wired to `cfg`.
pub fn default_registry(cfg: &ToolsConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(StockPriceTool::new(&cfg.stooq_url, cfg.timeout_secs)?)?;
    registry.register(WeatherTool::new(&cfg.open_meteo_url, cfg.timeout_secs)?)?;
    registry.register(BooksTool::new(&cfg.cinii_url, cfg.timeout_secs)?)?;
    registry.register(WikipediaTool::new(cfg.wikipedia_base(), cfg.timeout_secs)?)?;
    registry.register(DuckDuckGoSearchTool::new(
        &cfg.duckduckgo_url,
        cfg.timeout_secs,
        cfg.max_search_results,
    )?)?;
    Ok(registry)
}

pub(crate) fn http_client(tool: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AgentError::tool(tool, e))
}

/// GETs `url` and returns the body, treating any non-2xx status as a failure.
pub(crate) async fn fetch_text(client: &reqwest::Client, tool: &str, url: &str) -> Result<String> {
    tracing::debug!(%tool, %url, "fetching");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AgentError::tool(tool, e))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| AgentError::tool(tool, e))?;
    if !status.is_success() {
        return Err(AgentError::tool(
            tool,
            UpstreamStatus {
                status: status.as_u16(),
                body,
            },
        ));
    }
    Ok(body)
}

pub(crate) async fn fetch_json(client: &reqwest::Client, tool: &str, url: &str) -> Result<Value> {
    let body = fetch_text(client, tool, url).await?;
    serde_json::from_str(&body).map_err(|e| AgentError::tool(tool, e))
}

/// Reads a required argument as text. Numbers are accepted and printed as-is
/// since models often send coordinates or codes unquoted.
pub(crate) fn required_text(input: &Value, key: &str, tool: &str) -> Result<String> {
    optional_text(input, key)
        .ok_or_else(|| AgentError::Protocol(format!("missing `{key}` for {tool}")))
}

pub(crate) fn optional_text(input: &Value, key: &str) -> Option<String> {
    match input.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}
