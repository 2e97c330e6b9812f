//! DuckDuckGo web search.
//!
//! Scrapes the HTML endpoint; results are `<a class="result__a">` links with
//! an optional `result__snippet` body.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::tool::{ParameterKind, Tool, ToolSpec};

use super::{fetch_text, http_client, required_text, trim_base};

const NAME: &str = "duckduckgo_search";

/// DuckDuckGo search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub href: String,
    pub body: String,
}

pub struct DuckDuckGoSearchTool {
    spec: ToolSpec,
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    patterns: ResultPatterns,
}

impl DuckDuckGoSearchTool {
    pub fn new(base_url: &str, timeout_secs: u64, max_results: usize) -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::new(
                NAME,
                "Use this tool to search for general information on the web via DuckDuckGo.",
            )
            .required("query", ParameterKind::String, "Search query")
            .optional(
                "max_results",
                ParameterKind::Integer,
                "Maximum number of results to return",
            ),
            client: http_client(NAME, timeout_secs)?,
            base_url: trim_base(base_url),
            max_results,
            patterns: ResultPatterns::new()?,
        })
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let query = required_text(&input, "query", NAME)?;
        let max_results = input
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.max_results);

        let url = format!("{}/html/?q={}", self.base_url, urlencoding::encode(&query));
        let html = fetch_text(&self.client, NAME, &url).await?;
        let results = self.patterns.parse(&html, max_results);
        Ok(json!({ "query": query, "results": results }))
    }
}

/// Compiled once per tool and reused for every search.
struct ResultPatterns {
    link: Regex,
    snippet: Regex,
}

impl ResultPatterns {
    fn new() -> Result<Self> {
        Ok(Self {
            link: Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
                .map_err(|e| AgentError::Protocol(format!("result pattern: {e}")))?,
            snippet: Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#)
                .map_err(|e| AgentError::Protocol(format!("snippet pattern: {e}")))?,
        })
    }

    fn parse(&self, html: &str, max_results: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();
        // each result block starts at its title link
        let starts: Vec<usize> = self.link.find_iter(html).map(|m| m.start()).collect();
        for (idx, &start) in starts.iter().enumerate() {
            if results.len() >= max_results {
                break;
            }
            let end = starts.get(idx + 1).copied().unwrap_or(html.len());
            let block = &html[start..end];
            let Some(caps) = self.link.captures(block) else {
                continue;
            };
            let href = resolve_href(&caps[1]);
            let title = clean_text(&caps[2]);
            if !href.starts_with("http") || title.is_empty() {
                continue;
            }
            let body = self
                .snippet
                .captures(block)
                .map(|c| clean_text(&c[1]))
                .unwrap_or_default();
            results.push(SearchResult { title, href, body });
        }
        results
    }
}

/// Unwraps `//duckduckgo.com/l/?uddg=<encoded>` redirect links.
fn resolve_href(raw: &str) -> String {
    let raw = html_decode(raw);
    if let Some((_, rest)) = raw.split_once("uddg=") {
        let encoded = rest.split('&').next().unwrap_or(rest);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    raw
}

fn clean_text(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    html_decode(text.split_whitespace().collect::<Vec<_>>().join(" ").as_str())
}

/// Simple HTML entity decoding
fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust <b>Programming</b> Language</a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">A language empowering everyone to build <b>reliable</b> &amp; efficient software.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://doc.rust-lang.org/book/">The Rust Book</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="/relative">Skipped</a>
</div>
"#;

    #[test]
    fn extracts_titles_links_and_snippets() {
        let results = ResultPatterns::new().unwrap().parse(PAGE, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            SearchResult {
                title: "Rust Programming Language".into(),
                href: "https://www.rust-lang.org/".into(),
                body: "A language empowering everyone to build reliable & efficient software."
                    .into(),
            }
        );
        assert_eq!(results[1].href, "https://doc.rust-lang.org/book/");
        assert_eq!(results[1].body, "");
    }

    #[test]
    fn honours_max_results() {
        let patterns = ResultPatterns::new().unwrap();
        assert_eq!(patterns.parse(PAGE, 1).len(), 1);
        assert_eq!(patterns.parse(PAGE, 5), patterns.parse(PAGE, 10));
    }
}
