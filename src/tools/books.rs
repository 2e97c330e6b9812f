//! CiNii Books catalog search.
//!
//! The OpenSearch endpoint answers with an Atom feed; each `<entry>` becomes
//! `{title, link, author}` where `author` is the entry's `dc:publisher`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::tool::{ParameterKind, Tool, ToolSpec};

use super::{fetch_text, http_client, required_text, trim_base};

const NAME: &str = "get_books_by_keyword";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub link: String,
    pub author: String,
}

pub struct BooksTool {
    spec: ToolSpec,
    client: reqwest::Client,
    base_url: String,
}

impl BooksTool {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::new(
                NAME,
                "Searches the library catalog by keyword and returns matching books.",
            )
            .required(
                "keyword",
                ParameterKind::String,
                "Search keyword for finding books",
            ),
            client: http_client(NAME, timeout_secs)?,
            base_url: trim_base(base_url),
        })
    }
}

#[async_trait]
impl Tool for BooksTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let keyword = required_text(&input, "keyword", NAME)?;
        let url = format!(
            "{}/books/opensearch/search?q={}",
            self.base_url,
            urlencoding::encode(&keyword)
        );
        let xml = fetch_text(&self.client, NAME, &url).await?;
        let books = parse_feed(&xml)?;
        Ok(serde_json::to_value(books)?)
    }
}

fn parse_feed(xml: &str) -> Result<Vec<Book>> {
    if !xml.contains("<feed") {
        return Err(AgentError::Protocol(
            "catalog response is not an Atom feed".into(),
        ));
    }

    let mut books = Vec::new();
    for chunk in xml.split("<entry").skip(1) {
        // `<entry>` or `<entry attr=..>`, not `<entryFoo>`
        let Some(body) = chunk.strip_prefix('>').or_else(|| {
            chunk
                .starts_with(char::is_whitespace)
                .then(|| chunk.split_once('>').map(|(_, rest)| rest))
                .flatten()
        }) else {
            continue;
        };
        let entry = body.split("</entry>").next().unwrap_or(body);

        let Some(title) = extract_xml_content(entry, "title") else {
            continue;
        };
        books.push(Book {
            title,
            link: extract_attribute(entry, "link", "href").unwrap_or_default(),
            author: extract_xml_content(entry, "dc:publisher")
                .unwrap_or_else(|| "Unknown".to_string()),
        });
    }
    Ok(books)
}

/// Text of the first `<tag ...>text</tag>` in `xml`, entity-decoded.
fn extract_xml_content(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // skip longer names sharing the prefix, e.g. `<titleAlt>`
        if after.starts_with('>') || after.starts_with(char::is_whitespace) {
            let content_start = after.find('>')? + 1;
            if after[..content_start].ends_with("/>") {
                return None;
            }
            let content = &after[content_start..];
            let end = content.find(&close)?;
            let text = xml_decode(content[..end].trim());
            return Some(text);
        }
        rest = after;
    }
    None
}

/// Value of `attr` on the first `<tag ...>` element.
fn extract_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let open = format!("<{tag} ");
    let start = xml.find(&open)? + open.len();
    let element = &xml[start..start + xml[start..].find('>')?];
    let needle = format!("{attr}=\"");
    let value_start = element.find(&needle)? + needle.len();
    let value_len = element[value_start..].find('"')?;
    Some(xml_decode(&element[value_start..value_start + value_len]))
}

fn xml_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <title>CiNii Books OpenSearch - Rust</title>
  <entry>
    <title>プログラミングRust</title>
    <link href="https://ci.nii.ac.jp/ncid/BB12345678"/>
    <dc:publisher>オライリー・ジャパン</dc:publisher>
  </entry>
  <entry>
    <title>Rust &amp; WebAssembly</title>
    <link rel="alternate" href="https://ci.nii.ac.jp/ncid/BB87654321"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_and_defaults_author() {
        let books = parse_feed(FEED).unwrap();
        assert_eq!(
            books,
            vec![
                Book {
                    title: "プログラミングRust".into(),
                    link: "https://ci.nii.ac.jp/ncid/BB12345678".into(),
                    author: "オライリー・ジャパン".into(),
                },
                Book {
                    title: "Rust & WebAssembly".into(),
                    link: "https://ci.nii.ac.jp/ncid/BB87654321".into(),
                    author: "Unknown".into(),
                },
            ]
        );
    }

    #[test]
    fn feed_without_entries_is_empty() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>none</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_feed_bodies() {
        assert!(parse_feed("<html>maintenance</html>").is_err());
    }
}
