use async_trait::async_trait;
use np_core::{Result, Sentiment, SentimentScorer};

const POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "growth", "surge", "surged", "record", "profit", "profits", "beat",
    "beats", "strong", "stronger", "rally", "rallied", "up", "rise", "rises", "rose",
    "boost", "boosted", "success", "successful", "positive", "optimistic", "upgrade",
    "upgraded", "win", "wins", "won", "soar", "soared", "expand", "expands", "expansion",
    "improve", "improved", "improving", "breakthrough", "milestone", "bullish",
];

const NEGATIVE_WORDS: &[&str] = &[
    "loss", "losses", "drop", "dropped", "drops", "fall", "falls", "fell", "decline",
    "declined", "declines", "weak", "weaker", "down", "miss", "missed", "misses",
    "lawsuit", "lawsuits", "probe", "investigation", "fine", "fined", "penalty", "recall",
    "recalls", "layoff", "layoffs", "cut", "cuts", "negative", "pessimistic", "downgrade",
    "downgraded", "fraud", "scandal", "crash", "crashed", "plunge", "plunged", "bearish",
    "concern", "concerns", "risk", "risks", "warning", "warn", "warns",
];

/// Word-lexicon polarity scorer: positive hits minus negative hits, with
/// ties landing on Neutral.
#[derive(Debug, Default, Clone)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    fn polarity(text: &str) -> i32 {
        let mut score = 0;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if POSITIVE_WORDS.contains(&word.as_str()) {
                score += 1;
            } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                score -= 1;
            }
        }
        score
    }
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    async fn score(&self, text: &str) -> Result<Sentiment> {
        let polarity = Self::polarity(text);
        Ok(if polarity > 0 {
            Sentiment::Positive
        } else if polarity < 0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        })
    }
}
