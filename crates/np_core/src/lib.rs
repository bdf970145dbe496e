pub mod error;
pub mod models;
pub mod sentiment;
pub mod sources;
pub mod speech;
pub mod types;

pub use error::Error;
pub use models::InferenceModel;
pub use sentiment::SentimentScorer;
pub use sources::NewsSource;
pub use speech::SpeechRenderer;
pub use types::{
    Analysis, Article, ArticleDigest, ComparativeReport, CoverageDifference, CoverageReport,
    Sentiment, SentimentDistribution,
};

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use super::{
        Analysis, Article, ArticleDigest, ComparativeReport, CoverageDifference, CoverageReport,
        Error, InferenceModel, NewsSource, Result, Sentiment, SentimentDistribution,
        SentimentScorer, SpeechRenderer,
    };
}
