//! Content generation
//!
//! Summaries, sentiment, tweets, reports and translations used by the mock
//! paid services, plus free-form completion used by the AI planner.
//!
//! Generation never fails: the live model falls back to the deterministic
//! mock on any error and marks the output with `is_real = false`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Generated output plus whether a live model produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generated<T> {
    pub output: T,
    pub is_real: bool,
}

impl<T> Generated<T> {
    pub fn real(output: T) -> Self {
        Self {
            output,
            is_real: true,
        }
    }

    pub fn mock(output: T) -> Self {
        Self {
            output,
            is_real: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn summarize(&self, text: &str) -> Generated<String>;

    async fn analyze_sentiment(&self, text: &str) -> Generated<Sentiment>;

    async fn generate_tweet(&self, topic: &str, context: Option<&str>) -> Generated<String>;

    async fn generate_report(&self, topic: &str, context: Option<&str>) -> Generated<Report>;

    async fn translate(&self, text: &str, language: &str) -> Generated<String>;

    /// Free-form completion; `None` when no live model answered
    async fn complete(&self, prompt: &str) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model returned status {0}")]
    Status(u16),

    #[error("model returned no content")]
    Empty,

    #[error("model request timed out")]
    Timeout,
}

const TWEET_LIMIT: usize = 280;

const POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "up", "rally", "surge", "bull", "bullish", "growth", "record", "strong",
    "positive", "win", "soar", "rise", "rises", "good", "great",
];

const NEGATIVE_WORDS: &[&str] = &[
    "loss", "losses", "down", "drop", "crash", "bear", "bearish", "decline", "weak", "negative",
    "fall", "falls", "hack", "fear", "bad", "risk",
];

/// Deterministic generator used when no model is configured
#[derive(Debug, Clone, Default)]
pub struct MockContentGenerator;

impl MockContentGenerator {
    pub fn new() -> Self {
        Self
    }

    fn summary_text(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return "Nothing to summarize.".to_string();
        }
        let sentences: Vec<&str> = text
            .split_inclusive(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(2)
            .collect();
        truncate(&format!("Summary: {}", sentences.join(" ")), TWEET_LIMIT)
    }

    fn sentiment(&self, text: &str) -> Sentiment {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(w)).count() as f64;
        let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(w)).count() as f64;
        let total = positive + negative;
        if total == 0.0 {
            return Sentiment {
                label: "neutral".to_string(),
                score: 0.0,
            };
        }
        let score = (positive - negative) / total;
        let label = if score > 0.2 {
            "positive"
        } else if score < -0.2 {
            "negative"
        } else {
            "neutral"
        };
        Sentiment {
            label: label.to_string(),
            score,
        }
    }

    fn tweet(&self, topic: &str, context: Option<&str>) -> String {
        let body = match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(context) => format!("{}: {}", topic.trim(), context),
            None => format!("Thoughts on {}", topic.trim()),
        };
        truncate(&format!("{} #web3", body), TWEET_LIMIT)
    }

    fn report(&self, topic: &str, context: Option<&str>) -> Report {
        let mut body = format!("# {}\n\n## Overview\n\n", topic.trim());
        match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(context) => body.push_str(context),
            None => body.push_str("No source data was provided."),
        }
        body.push_str("\n\n## Conclusion\n\nGenerated without a live model.\n");
        Report {
            title: format!("Report: {}", topic.trim()),
            body,
        }
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn summarize(&self, text: &str) -> Generated<String> {
        Generated::mock(self.summary_text(text))
    }

    async fn analyze_sentiment(&self, text: &str) -> Generated<Sentiment> {
        Generated::mock(self.sentiment(text))
    }

    async fn generate_tweet(&self, topic: &str, context: Option<&str>) -> Generated<String> {
        Generated::mock(self.tweet(topic, context))
    }

    async fn generate_report(&self, topic: &str, context: Option<&str>) -> Generated<Report> {
        Generated::mock(self.report(topic, context))
    }

    async fn translate(&self, text: &str, language: &str) -> Generated<String> {
        Generated::mock(format!("[{}] {}", language, text.trim()))
    }

    async fn complete(&self, _prompt: &str) -> Option<String> {
        None
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible chat completions endpoint
pub struct LlmContentGenerator {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
    fallback: MockContentGenerator,
}

impl LlmContentGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            timeout,
            fallback: MockContentGenerator::new(),
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, ContentError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.3,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ContentError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ContentError::Empty)
    }
}

#[async_trait]
impl ContentGenerator for LlmContentGenerator {
    async fn summarize(&self, text: &str) -> Generated<String> {
        match self
            .chat("Summarize the user's text in at most three sentences.", text)
            .await
        {
            Ok(summary) => Generated::real(summary),
            Err(e) => {
                warn!("Summarize fell back to mock output: {}", e);
                self.fallback.summarize(text).await
            }
        }
    }

    async fn analyze_sentiment(&self, text: &str) -> Generated<Sentiment> {
        let system = "Classify the sentiment of the user's text. Reply with JSON only: \
                      {\"label\": \"positive\"|\"neutral\"|\"negative\", \"score\": -1.0..1.0}";
        let reply = match self.chat(system, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Sentiment fell back to mock output: {}", e);
                return self.fallback.analyze_sentiment(text).await;
            }
        };

        match extract_json_object(&reply).and_then(|j| serde_json::from_str::<Sentiment>(j).ok()) {
            Some(sentiment) => Generated::real(sentiment),
            None => {
                warn!("Sentiment reply was not valid JSON, using mock output");
                self.fallback.analyze_sentiment(text).await
            }
        }
    }

    async fn generate_tweet(&self, topic: &str, context: Option<&str>) -> Generated<String> {
        let user = match context {
            Some(context) => format!("Topic: {}\n\nSource material:\n{}", topic, context),
            None => format!("Topic: {}", topic),
        };
        match self
            .chat(
                "Write one engaging tweet under 280 characters. Reply with the tweet only.",
                &user,
            )
            .await
        {
            Ok(tweet) => Generated::real(truncate(&tweet, TWEET_LIMIT)),
            Err(e) => {
                warn!("Tweet generation fell back to mock output: {}", e);
                self.fallback.generate_tweet(topic, context).await
            }
        }
    }

    async fn generate_report(&self, topic: &str, context: Option<&str>) -> Generated<Report> {
        let user = match context {
            Some(context) => format!("Topic: {}\n\nSource material:\n{}", topic, context),
            None => format!("Topic: {}", topic),
        };
        match self
            .chat(
                "Write a concise markdown report with an overview and a conclusion.",
                &user,
            )
            .await
        {
            Ok(body) => Generated::real(Report {
                title: format!("Report: {}", topic.trim()),
                body,
            }),
            Err(e) => {
                warn!("Report generation fell back to mock output: {}", e);
                self.fallback.generate_report(topic, context).await
            }
        }
    }

    async fn translate(&self, text: &str, language: &str) -> Generated<String> {
        let system = format!(
            "Translate the user's text to {}. Reply with the translation only.",
            language
        );
        match self.chat(&system, text).await {
            Ok(translation) => Generated::real(translation),
            Err(e) => {
                warn!("Translation fell back to mock output: {}", e);
                self.fallback.translate(text, language).await
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Option<String> {
        match self
            .chat("You are a precise assistant. Follow the format requested.", prompt)
            .await
        {
            Ok(reply) => Some(reply),
            Err(e) => {
                debug!("Completion unavailable: {}", e);
                None
            }
        }
    }
}

/// Slice from the first `{` to the last `}`, tolerating fences and prose
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_summarize_keeps_first_sentences() {
        let generator = MockContentGenerator::new();
        let result = generator
            .summarize("Bitcoin rose 5%. ETF inflows hit a record. Miners are selling.")
            .await;

        assert!(!result.is_real);
        assert_eq!(
            result.output,
            "Summary: Bitcoin rose 5%. ETF inflows hit a record."
        );
    }

    #[tokio::test]
    async fn test_mock_sentiment_labels() {
        let generator = MockContentGenerator::new();

        let positive = generator
            .analyze_sentiment("Strong rally, record gains")
            .await;
        assert_eq!(positive.output.label, "positive");

        let negative = generator
            .analyze_sentiment("Exchange hack causes crash")
            .await;
        assert_eq!(negative.output.label, "negative");

        let neutral = generator.analyze_sentiment("The meeting is at noon").await;
        assert_eq!(neutral.output.label, "neutral");
        assert_eq!(neutral.output.score, 0.0);
    }

    #[tokio::test]
    async fn test_mock_tweet_respects_limit() {
        let generator = MockContentGenerator::new();
        let long_context = "a".repeat(1_000);
        let tweet = generator
            .generate_tweet("news", Some(&long_context))
            .await
            .output;
        assert_eq!(tweet.chars().count(), TWEET_LIMIT);
        assert!(tweet.ends_with("..."));
    }

    #[tokio::test]
    async fn test_mock_has_no_completion() {
        let generator = MockContentGenerator::new();
        assert!(generator.complete("plan this").await.is_none());
    }

    #[tokio::test]
    async fn test_llm_unreachable_falls_back() {
        let generator = LlmContentGenerator::new(
            "http://127.0.0.1:9",
            "key",
            "model",
            Duration::from_millis(500),
        );

        let result = generator.translate("hello", "es").await;
        assert!(!result.is_real);
        assert_eq!(result.output, "[es] hello");
        assert!(generator.complete("anything").await.is_none());
    }

    #[test]
    fn test_extract_json_object() {
        let reply = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_object("no json"), None);
        assert_eq!(extract_json_object("} {"), None);
    }
}
