use crate::types::Article;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch recent articles matching the query, in result order.
    ///
    /// Individual unreachable or bot-blocked candidates are skipped rather
    /// than failing the whole fetch; an empty vec is a valid outcome.
    async fn fetch_articles(&self, query: &str) -> Result<Vec<Article>>;
}
