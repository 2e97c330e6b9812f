//! Wikipedia toolkit.
//!
//! Looks up the plain-text introduction of the article whose title matches
//! the keyword, using the MediaWiki `extracts` query.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::tool::{ParameterKind, Tool, ToolSpec};

use super::{fetch_json, http_client, optional_text, trim_base};

const NAME: &str = "wikipedia_search";

pub const NOT_FOUND: &str = "Wikipedia page not found for the keyword.";

pub struct WikipediaTool {
    spec: ToolSpec,
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaTool {
    /// `base_url` is the wiki host, e.g. `https://ja.wikipedia.org`.
    pub fn new(base_url: impl AsRef<str>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::new(
                NAME,
                "Useful for when you need to search Wikipedia. Returns the introduction of \
                 the article with the given title.",
            )
            .required("keyword", ParameterKind::String, "Article title to look up"),
            client: http_client(NAME, timeout_secs)?,
            base_url: trim_base(base_url.as_ref()),
        })
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, input: Value) -> Result<Value> {
        // a bare string is accepted as the keyword
        let keyword = match &input {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => optional_text(&input, "keyword").or_else(|| optional_text(&input, "query")),
        }
        .ok_or_else(|| AgentError::Protocol(format!("missing `keyword` for {NAME}")))?;

        let url = format!(
            "{}/w/api.php?action=query&format=json&prop=extracts&exintro=1&explaintext=1&redirects=1&titles={}",
            self.base_url,
            urlencoding::encode(&keyword)
        );
        let body = fetch_json(&self.client, NAME, &url).await?;
        extract_intro(&body)
    }
}

fn extract_intro(body: &Value) -> Result<Value> {
    let pages = body["query"]["pages"]
        .as_object()
        .ok_or_else(|| AgentError::Protocol("unexpected Wikipedia response shape".into()))?;

    let Some((page_id, page)) = pages.iter().next() else {
        return Ok(Value::String(NOT_FOUND.into()));
    };
    if page_id.starts_with('-') || page.get("missing").is_some() {
        return Ok(Value::String(NOT_FOUND.into()));
    }

    Ok(json!({
        "title": page["title"].as_str().unwrap_or_default(),
        "extract": page["extract"].as_str().unwrap_or("No summary available"),
    }))
}
