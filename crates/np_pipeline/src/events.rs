use np_core::{Article, ComparativeReport};
use serde_json::{json, Value};

pub const PHASE_FETCHING: &str = "fetching_news";
pub const PHASE_PROCESSING: &str = "processing_articles";
pub const PHASE_ANALYSIS: &str = "running_analysis";
pub const PHASE_AUDIO: &str = "generating_audio";

pub const NO_ARTICLES: &str = "No valid articles found.";

/// One progress or result notification from a pipeline run. Emission order
/// is fixed; a terminal `Error` replaces whatever would have followed it.
#[derive(Debug, Clone)]
pub enum Event {
    Status(&'static str),
    Articles(Vec<Article>),
    ComparativeScore(ComparativeReport),
    FinalAnalysis(String),
    Audio(String),
    Error(String),
}

impl Event {
    pub fn to_value(&self) -> Value {
        match self {
            Event::Status(phase) => json!({ "status": phase }),
            Event::Articles(articles) => json!({ "articles": articles }),
            Event::ComparativeScore(report) => json!({ "comparative_sentiment_score": report }),
            Event::FinalAnalysis(summary) => json!({ "final_sentiment_analysis": summary }),
            Event::Audio(reference) => json!({ "audio": reference }),
            Event::Error(message) => json!({ "error": message }),
        }
    }

    /// Compact single-line JSON, the unit of the response stream.
    pub fn to_json_line(&self) -> String {
        self.to_value().to_string()
    }

    pub fn is_terminal_error(&self) -> bool {
        matches!(self, Event::Error(_))
    }
}
