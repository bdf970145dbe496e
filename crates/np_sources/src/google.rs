use async_trait::async_trait;
use np_core::{Article, Error, NewsSource, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::extract::{looks_bot_blocked, page_text, parse_search_results};

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub max_articles: usize,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_articles: 5,
            user_agent: "Mozilla/5.0".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Fetches candidate articles from the Google News search tab and keeps the
/// ones whose pages are actually reachable.
pub struct GoogleNewsSource {
    client: Client,
    config: SourceConfig,
}

impl GoogleNewsSource {
    const SEARCH_URL: &'static str = "https://www.google.com/search";

    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn search_url(&self, query: &str) -> Result<Url> {
        Url::parse_with_params(
            Self::SEARCH_URL,
            &[
                ("q", format!("{} news", query).as_str()),
                ("hl", "en"),
                ("tbm", "nws"),
                ("num", "100"),
            ],
        )
        .map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// HEAD probe: the candidate must answer 200 before we bother fetching.
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "Candidate unreachable");
                false
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "Page fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "Page returned non-success status");
            return None;
        }
        match response.text().await {
            Ok(html) => Some(html),
            Err(e) => {
                debug!(url, error = %e, "Page body read failed");
                None
            }
        }
    }
}

#[async_trait]
impl NewsSource for GoogleNewsSource {
    async fn fetch_articles(&self, query: &str) -> Result<Vec<Article>> {
        let search_url = self.search_url(query)?;
        let response = self
            .client
            .get(search_url)
            .send()
            .await
            .map_err(|e| Error::Scraping(format!("news search failed: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "News search returned non-success status");
            return Ok(Vec::new());
        }

        let html = response.text().await?;
        let hits = parse_search_results(&html);
        debug!(candidates = hits.len(), "Parsed search results");

        let mut articles = Vec::new();
        for hit in hits {
            if articles.len() >= self.config.max_articles {
                break;
            }
            if !self.is_reachable(&hit.url).await {
                continue;
            }
            let Some(page) = self.fetch_page(&hit.url).await else {
                continue;
            };
            let content = page_text(&page);
            if looks_bot_blocked(&content) {
                debug!(url = %hit.url, "Skipping bot-blocked page");
                continue;
            }
            articles.push(Article::new(hit.title, hit.url, content));
        }

        info!(query, count = articles.len(), "📰 Collected articles");
        Ok(articles)
    }
}
