use crate::types::{Article, ArticleDigest, CoverageReport};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait InferenceModel: Send + Sync {
    /// Summarize one article's content and label its key topics.
    async fn summarize(&self, content: &str) -> Result<ArticleDigest>;

    /// Compare coverage across the enriched articles: differences in
    /// emphasis and the topics they share.
    async fn compare_coverage(&self, articles: &[Article]) -> Result<CoverageReport>;

    /// Produce the final narrative sentiment assessment over all articles.
    async fn final_assessment(&self, articles: &[Article]) -> Result<String>;
}
