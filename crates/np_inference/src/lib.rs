pub mod models;
pub mod sentiment;

use std::time::Duration;

pub use models::ChatModel;
pub use sentiment::LexiconScorer;

/// Explicit configuration for the generative collaborator, built once by
/// the binary and passed in at construction time.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub mod prelude {
    pub use super::models::ChatModel;
    pub use super::sentiment::LexiconScorer;
    pub use super::InferenceConfig;
    pub use np_core::{Article, ArticleDigest, Error, InferenceModel, Result, SentimentScorer};
}
