use async_trait::async_trait;
use serde::Deserialize;

/// Errors produced by a search lookup.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must be a non-empty string")]
    EmptyQuery,
    #[error("result count must be a positive integer")]
    InvalidCount,
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("search provider returned status {0}")]
    Status(reqwest::StatusCode),
}

/// A provider that resolves a query string to an ordered list of result URLs.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns up to `count` result URLs for `query`, best match first.
    ///
    /// Fails with an invalid-argument error for an empty query or a zero
    /// count, and with a provider error for transport or search failures.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<String>, SearchError>;
}

/// A `SearchProvider` backed by the Brave Search REST API.
pub struct BraveSearchClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl BraveSearchClient {
    const DEFAULT_ENDPOINT: &'static str = "https://api.search.brave.com/res/v1/web/search";

    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint, e.g. to point at a local stub.
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl SearchProvider for BraveSearchClient {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<String>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if count == 0 {
            return Err(SearchError::InvalidCount);
        }

        let count_param = count.to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count_param.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status));
        }

        let body: WebSearchResponse = response.json().await?;
        Ok(collect_urls(body, count))
    }
}

#[derive(Debug, Deserialize)]
struct WebSearchResponse {
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    url: String,
}

/// Flattens a search response into at most `count` result URLs, in rank order.
fn collect_urls(body: WebSearchResponse, count: usize) -> Vec<String> {
    body.web
        .map(|w| w.results)
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.url)
        .take(count)
        .collect()
}
