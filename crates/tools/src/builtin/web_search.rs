use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use switchyard_core::{CapabilityHandler, Error, Result};
use tracing::{debug, warn};

use super::required_str;

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct WebSearchCapability {
    client: Client,
    max_results: u32,
}

impl WebSearchCapability {
    pub fn new(max_results: u32) -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(15))
            .user_agent(BROWSER_UA)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build search client, using default");
                Client::new()
            });
        Self {
            client,
            max_results: max_results.clamp(1, 10),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query)])
            .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| Error::Capability(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Capability(format!("search returned status {}", response.status())));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::Capability(format!("failed to read search response: {}", e)))?;

        let hits = parse_results(&html, limit);
        debug!(query, count = hits.len(), "Search results parsed");
        Ok(hits)
    }
}

/// Extract organic results from a DuckDuckGo HTML results page.
///
/// `scraper::Html` is not `Send`, so parsing stays in this synchronous
/// function.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    use scraper::{Html, Selector};

    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result, div.web-result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    let mut seen = HashSet::new();
    for el in document.select(&result_sel) {
        if hits.len() >= limit {
            break;
        }
        if el.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(title_el) = el.select(&title_sel).next() else {
            continue;
        };
        let title = collapse_ws(&title_el.text().collect::<String>());
        let url = title_el
            .value()
            .attr("href")
            .map(resolve_href)
            .unwrap_or_default();
        if title.is_empty() || !url.starts_with("http") || !seen.insert(url.clone()) {
            continue;
        }
        let snippet = el
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_ws(&s.text().collect::<String>()))
            .unwrap_or_default();
        hits.push(SearchHit { title, url, snippet });
    }
    hits
}

/// DuckDuckGo wraps outbound links as `//duckduckgo.com/l/?uddg=<url>&...`.
fn resolve_href(href: &str) -> String {
    if let Some(pos) = href.find("uddg=") {
        let encoded = href[pos + 5..].split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    href.to_string()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Numbered plain-text rendering, one block per hit.
pub fn format_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}\n   {}\n   URL: {}", i + 1, hit.title, hit.snippet, hit.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl CapabilityHandler for WebSearchCapability {
    async fn execute(&self, params: Map<String, Value>) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let limit = match params.get("max_results") {
            None | Some(Value::Null) => self.max_results,
            Some(v) => v
                .as_u64()
                .filter(|n| (1..=10).contains(n))
                .map(|n| n as u32)
                .ok_or_else(|| Error::Validation("max_results must be an integer between 1 and 10".to_string()))?,
        };

        let hits = self.search(&query, limit as usize).await?;
        let formatted = if hits.is_empty() {
            format!("No results found for '{}'.", query)
        } else {
            format_results(&hits)
        };
        Ok(json!({
            "query": query,
            "results": hits,
            "formatted": formatted,
        }))
    }
}
