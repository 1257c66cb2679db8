//! HTTP fetcher implementation
//!
//! This module provides the concrete tiers used by the command-line driver:
//! - Building HTTP clients with the harvester's user agent string
//! - A shallow GET that records status, content type, final URL and title
//! - A full GET that also extracts description, Open Graph properties,
//!   the first heading and the amount of visible text
//! - Error classification into transient and permanent failures

use crate::acquire::fetch::{FetchError, Fetcher, Fields};
use crate::config::UserAgentConfig;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// The user agent follows `Name/Version (+ContactURL; ContactEmail)`.
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::UserAgentConfig;
/// use sumi_harvest::acquire::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// How much of a page to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDepth {
    /// Status, content type, final URL, `<title>`
    Shallow,
    /// Shallow fields plus description, `og:*`, first `<h1>`, text length
    Full,
}

/// `Fetcher` over a plain HTTP GET
pub struct HttpFetcher {
    client: Client,
    depth: FetchDepth,
}

impl HttpFetcher {
    pub fn new(client: Client, depth: FetchDepth) -> Self {
        Self { client, depth }
    }

    pub fn shallow(client: Client) -> Self {
        Self::new(client, FetchDepth::Shallow)
    }

    pub fn full(client: Client) -> Self {
        Self::new(client, FetchDepth::Full)
    }

    pub fn depth(&self) -> FetchDepth {
        self.depth
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// # Error Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Unparseable URL | Permanent |
    /// | HTTP 2xx | Fields |
    /// | HTTP 429, 408, 5xx | Transient |
    /// | Other HTTP 4xx | Permanent |
    /// | Timeout, connection failure | Transient |
    async fn fetch(&self, target: &str) -> Result<Fields, FetchError> {
        let url = Url::parse(target)
            .map_err(|e| FetchError::permanent(target, format!("Invalid URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(target, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(target, status));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(target, &e))?;

        let mut fields = Fields::new();
        fields.insert("status".to_string(), json!(status.as_u16()));
        fields.insert("content_type".to_string(), json!(content_type));
        fields.insert("final_url".to_string(), json!(final_url));

        if content_type.contains("text/html") {
            extract_page_fields(&body, self.depth, &mut fields);
        }

        fields.insert("fetched_at".to_string(), json!(Utc::now().to_rfc3339()));
        Ok(fields)
    }

    fn name(&self) -> &str {
        match self.depth {
            FetchDepth::Shallow => "http-shallow",
            FetchDepth::Full => "http-full",
        }
    }
}

/// Extracts HTML-derived fields; missing elements leave no key behind
fn extract_page_fields(html: &str, depth: FetchDepth, fields: &mut Fields) {
    let document = Html::parse_document(html);

    if let Some(title) = first_text(&document, "title") {
        fields.insert("title".to_string(), json!(title));
    }

    if depth == FetchDepth::Shallow {
        return;
    }

    if let Some(description) = meta_content(&document, "meta[name='description'][content]") {
        fields.insert("description".to_string(), json!(description));
    }

    let og = extract_open_graph(&document);
    if !og.is_empty() {
        fields.insert("og".to_string(), Value::Object(og));
    }

    if let Some(heading) = first_text(&document, "h1") {
        fields.insert("h1".to_string(), json!(heading));
    }

    fields.insert("text_length".to_string(), json!(visible_text_length(&document)));
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

/// Collects `<meta property="og:*">` tags, keyed without the `og:` prefix
fn extract_open_graph(document: &Html) -> Map<String, Value> {
    let mut og = Map::new();

    if let Ok(selector) = Selector::parse("meta[property][content]") {
        for element in document.select(&selector) {
            let Some(property) = element.value().attr("property") else {
                continue;
            };
            let Some(name) = property.strip_prefix("og:") else {
                continue;
            };
            let content = element.value().attr("content").unwrap_or("").trim();
            if !name.is_empty() && !content.is_empty() && !og.contains_key(name) {
                og.insert(name.to_string(), json!(content));
            }
        }
    }

    og
}

/// Characters of body text outside `<script>`, `<style>` and `<noscript>`,
/// after collapsing whitespace
fn visible_text_length(document: &Html) -> usize {
    let Ok(selector) = Selector::parse("body") else {
        return 0;
    };
    let Some(body) = document.select(&selector).next() else {
        return 0;
    };

    let mut text = String::new();
    for node in body.descendants() {
        let Some(chunk) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|element| matches!(element.name(), "script" | "style" | "noscript"));
        if !hidden {
            text.push_str(chunk);
            text.push(' ');
        }
    }

    collapse_whitespace(&text).chars().count()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
