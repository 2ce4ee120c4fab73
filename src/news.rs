//! News-feed client: the day's top headlines.

use crate::{MessejError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One news item. Fetched fresh each run, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub url: String,
}

// ── API response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: ArticleSource,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Client for a NewsAPI-style top-headlines endpoint.
#[derive(Debug, Clone)]
pub struct NewsClient {
    client: Client,
    api_key: String,
    base_url: String,
    country: String,
    page_size: usize,
}

impl NewsClient {
    pub fn new(api_key: String, country: String, page_size: usize) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("messej/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: "https://newsapi.org/v2".to_string(),
            country,
            page_size,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch today's top headlines, capped at the configured page size.
    ///
    /// The pipeline maps an `Err` to an empty sequence: a digest still goes
    /// out with the News section omitted.
    pub async fn top_headlines(&self) -> Result<Vec<Headline>> {
        let url = format!("{}/top-headlines", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[
                ("country", self.country.as_str()),
                ("pageSize", &self.page_size.to_string()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MessejError::News(format!("error sending request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessejError::News(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: HeadlinesResponse = response
            .json()
            .await
            .map_err(|e| MessejError::News(e.to_string()))?;

        let headlines = Self::collect(parsed, self.page_size);
        debug!("Fetched {} headlines", headlines.len());
        Ok(headlines)
    }

    fn collect(response: HeadlinesResponse, cap: usize) -> Vec<Headline> {
        response
            .articles
            .into_iter()
            .filter_map(|article| {
                let title = article.title.filter(|t| !t.trim().is_empty())?;
                Some(Headline {
                    title,
                    source: article.source.name.unwrap_or_else(|| "unknown".to_string()),
                    url: article.url.unwrap_or_default(),
                })
            })
            .take(cap)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_and_caps_articles() {
        let json = r#"{
            "status": "ok",
            "articles": [
                {"title": "A", "url": "https://a", "source": {"name": "Alpha"}},
                {"title": "B", "url": "https://b", "source": {"name": "Beta"}},
                {"title": "", "url": "https://c", "source": {"name": "Gamma"}},
                {"title": "D", "url": "https://d", "source": {"name": "Delta"}}
            ]
        }"#;
        let parsed: HeadlinesResponse = serde_json::from_str(json).unwrap();
        let headlines = NewsClient::collect(parsed, 2);

        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].title, "A");
        assert_eq!(headlines[1].source, "Beta");
    }

    #[test]
    fn tolerates_missing_fields() {
        let json = r#"{"articles": [{"title": "Only title"}]}"#;
        let parsed: HeadlinesResponse = serde_json::from_str(json).unwrap();
        let headlines = NewsClient::collect(parsed, 5);

        assert_eq!(headlines.len(), 1);
        assert_eq!(headlines[0].source, "unknown");
        assert_eq!(headlines[0].url, "");
    }

    #[test]
    fn empty_response_is_empty() {
        let parsed: HeadlinesResponse = serde_json::from_str("{}").unwrap();
        assert!(NewsClient::collect(parsed, 5).is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_error() {
        let client = NewsClient::new("key".into(), "us".into(), 5)
            .with_base_url("http://127.0.0.1:1/v2".into());
        assert!(client.top_headlines().await.is_err());
    }
}
