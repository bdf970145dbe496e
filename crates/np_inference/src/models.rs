use async_trait::async_trait;
use np_core::{Article, ArticleDigest, CoverageReport, Error, InferenceModel, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::InferenceConfig;

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

#[derive(Deserialize)]
struct FinalPayload {
    final_sentiment_analysis: String,
}

/// OpenAI-compatible chat-completion client backing the generative
/// operations. The assistant is instructed to answer in JSON and the reply
/// is parsed strictly; anything that does not deserialize is rejected as a
/// malformed generation.
pub struct ChatModel {
    client: Client,
    config: InferenceConfig,
}

impl fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatModel")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .field("api_key", &self.config.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChatModel {
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    async fn chat(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        debug!(model = %self.config.model, "Sending chat request");
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(&request);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "chat completion failed ({}): {}",
                status, body
            )));
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Inference("chat completion returned no choices".to_string()))
    }
}

/// Strict parse of a generated reply into the expected payload shape.
///
/// Tolerates a fenced ```json block around the object, nothing else — a
/// reply that does not deserialize is a MalformedGeneration, not something
/// to scavenge with regexes.
pub fn parse_payload<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let trimmed = strip_code_fence(reply.trim());
    serde_json::from_str(trimmed)
        .map_err(|e| Error::MalformedGeneration(format!("expected JSON payload: {}", e)))
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(reply)
}

/// One digest line per article, the form the aggregate prompts consume.
fn combined_digests(articles: &[Article], with_topics: bool) -> String {
    articles
        .iter()
        .enumerate()
        .map(|(i, article)| {
            let summary = article
                .analysis
                .as_ref()
                .map(|a| a.summary.as_str())
                .unwrap_or(&article.content);
            if with_topics {
                let topics = article
                    .analysis
                    .as_ref()
                    .map(|a| a.topics.join(", "))
                    .unwrap_or_default();
                format!("Article {}: {}\nKey Topics: {}", i + 1, summary, topics)
            } else {
                format!("Article {}: {}", i + 1, summary)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

const JSON_ONLY: &str = "Ensure the response is valid JSON with no extra text before or after.";

#[async_trait]
impl InferenceModel for ChatModel {
    async fn summarize(&self, content: &str) -> Result<ArticleDigest> {
        let prompt = format!(
            "Extract the key topics and generate a concise summary. Respond in JSON format, example:\n\
             {{\n  \"content\": \"Summarized text here\",\n  \"topics\": [\"topic1\", \"topic2\", \"topic3\"]\n}}\n\
             Article: {}\n\n{}",
            content, JSON_ONLY
        );
        let reply = self.chat(prompt).await?;
        parse_payload(&reply)
    }

    async fn compare_coverage(&self, articles: &[Article]) -> Result<CoverageReport> {
        let prompt = format!(
            "Compare the sentiment and key themes across multiple articles. Respond in JSON format, example:\n\
             {{\n  \"coverage_differences\": [\n    {{\n      \"comparison\": \"Article 1 emphasizes market growth, while Article 2 discusses legal challenges.\",\n      \"impact\": \"Investors may react positively to the growth, but legal issues raise concerns.\"\n    }}\n  ],\n  \"topic_overlap\": [\"topic1\", \"topic2\"]\n}}\n\n\
             Articles: {}\n\n{}",
            combined_digests(articles, true),
            JSON_ONLY
        );
        let reply = self.chat(prompt).await?;
        parse_payload(&reply)
    }

    async fn final_assessment(&self, articles: &[Article]) -> Result<String> {
        let prompt = format!(
            "Provide a final analysis of the sentiment and coverage of these articles. Respond in JSON format, example:\n\
             {{\n  \"final_sentiment_analysis\": \"The latest news coverage is mostly positive. Potential stock growth expected.\"\n}}\n\n\
             Articles: {}\n\n{}",
            combined_digests(articles, false),
            JSON_ONLY
        );
        let reply = self.chat(prompt).await?;
        let payload: FinalPayload = parse_payload(&reply)?;
        Ok(payload.final_sentiment_analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use np_core::{Analysis, Sentiment};

    #[test]
    fn parses_a_plain_digest_payload() {
        let digest: ArticleDigest =
            parse_payload(r#"{"content": "A short summary.", "topics": ["ai", "chips"]}"#).unwrap();
        assert_eq!(digest.summary, "A short summary.");
        assert_eq!(digest.topics, vec!["ai", "chips"]);
    }

    #[test]
    fn parses_a_fenced_payload() {
        let reply = "```json\n{\"content\": \"Fenced.\", \"topics\": []}\n```";
        let digest: ArticleDigest = parse_payload(reply).unwrap();
        assert_eq!(digest.summary, "Fenced.");
    }

    #[test]
    fn rejects_free_text() {
        let result: Result<ArticleDigest> =
            parse_payload("Sure! Here is the summary you asked for.");
        assert!(matches!(result, Err(Error::MalformedGeneration(_))));
    }

    #[test]
    fn rejects_missing_fields() {
        let result: Result<ArticleDigest> = parse_payload(r#"{"topics": ["only-topics"]}"#);
        assert!(matches!(result, Err(Error::MalformedGeneration(_))));
    }

    #[test]
    fn rejects_trailing_commentary() {
        let result: Result<ArticleDigest> =
            parse_payload(r#"{"content": "ok", "topics": []} hope that helps!"#);
        assert!(matches!(result, Err(Error::MalformedGeneration(_))));
    }

    #[test]
    fn digest_lines_number_articles_in_order() {
        let mut first = Article::new("A", "http://a", "raw a");
        first.analysis = Some(Analysis {
            topics: vec!["growth".to_string()],
            summary: "Summary A".to_string(),
            sentiment: Sentiment::Positive,
        });
        let mut second = Article::new("B", "http://b", "raw b");
        second.analysis = Some(Analysis {
            topics: vec!["lawsuit".to_string(), "risk".to_string()],
            summary: "Summary B".to_string(),
            sentiment: Sentiment::Negative,
        });

        let digests = combined_digests(&[first, second], true);
        assert!(digests.starts_with("Article 1: Summary A\nKey Topics: growth"));
        assert!(digests.contains("Article 2: Summary B\nKey Topics: lawsuit, risk"));

        let bare = combined_digests(&[Article::new("C", "http://c", "raw c")], false);
        assert_eq!(bare, "Article 1: raw c");
    }
}
