//! GraphQL wiki source
//!
//! Fetches every page together with its table of contents. The `toc` field is
//! served by some wikis as a JSON-encoded string and by others as a plain
//! array; both are accepted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{debug, info};
use wikiqa_core::{
    config_error, network_error, retry_async, with_timeout, RetryConfig, WikiqaResult,
};

/// Query for all pages with their table of contents
pub const PAGES_TOC_QUERY: &str = "query { pages { listToC { id, title, path, toc } } }";

/// A page as listed by the wiki
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiPage {
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    pub path: String,
    #[serde(default, deserialize_with = "toc_entries")]
    pub toc: Vec<TocEntry>,
}

/// One heading of a page's table of contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub anchor: String,
    #[serde(default)]
    pub children: Vec<TocEntry>,
}

fn toc_entries<'de, D>(deserializer: D) -> Result<Vec<TocEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawToc {
        Entries(Vec<TocEntry>),
        Encoded(String),
    }

    match Option::<RawToc>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(RawToc::Entries(entries)) => Ok(entries),
        Some(RawToc::Encoded(text)) if text.trim().is_empty() => Ok(Vec::new()),
        Some(RawToc::Encoded(text)) => {
            serde_json::from_str(&text).map_err(serde::de::Error::custom)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<PagesData>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct PagesData {
    pages: PagesField,
}

#[derive(Debug, Deserialize)]
struct PagesField {
    #[serde(rename = "listToC")]
    list_to_c: Vec<WikiPage>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// HTTP client for the wiki's GraphQL endpoint
#[derive(Debug, Clone)]
pub struct GraphqlWikiClient {
    client: reqwest::Client,
    endpoint: String,
    timeout_ms: u64,
    retry: RetryConfig,
}

impl GraphqlWikiClient {
    /// `max_retries` counts repeats after the first attempt
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64, max_retries: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout_ms: timeout_secs.saturating_mul(1000),
            retry: RetryConfig::default().with_max_attempts(max_retries.saturating_add(1)),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// All pages with their table of contents
    pub async fn fetch_pages(&self) -> WikiqaResult<Vec<WikiPage>> {
        let pages = retry_async(
            || with_timeout(self.fetch_once(), self.timeout_ms, "graphql_fetch_pages"),
            self.retry.clone(),
            "graphql_fetch_pages",
        )
        .await?;
        info!(endpoint = %self.endpoint, pages = pages.len(), "Fetched wiki pages");
        Ok(pages)
    }

    async fn fetch_once(&self) -> WikiqaResult<Vec<WikiPage>> {
        debug!(endpoint = %self.endpoint, "Querying wiki pages");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": PAGES_TOC_QUERY }))
            .send()
            .await
            .map_err(|e| network_error!(format!("GraphQL request failed: {}", e), "graphql", e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(network_error!(
                format!("GraphQL endpoint answered {}", status),
                "graphql"
            ));
        }
        if !status.is_success() {
            return Err(config_error!(
                format!("GraphQL endpoint rejected the request with {}", status),
                "graphql"
            ));
        }

        let body = response.text().await.map_err(|e| {
            network_error!(format!("Failed to read GraphQL response: {}", e), "graphql", e)
        })?;
        let parsed: GraphqlResponse = serde_json::from_str(&body)?;

        if let Some(errors) = parsed.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(network_error!(
                format!("GraphQL errors: {}", messages.join("; ")),
                "graphql"
            ));
        }

        parsed
            .data
            .map(|data| data.pages.list_to_c)
            .ok_or_else(|| network_error!("GraphQL response carried no data", "graphql"))
    }
}
