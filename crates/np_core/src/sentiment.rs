use crate::types::Sentiment;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Classify a short text as Positive, Negative, or Neutral.
    async fn score(&self, text: &str) -> Result<Sentiment>;
}
