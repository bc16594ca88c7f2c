//! Article generation abstraction
//!
//! Provides a unified interface over text-generation providers:
//! - OpenAI-compatible chat completion APIs
//! - A scripted mock for tests and offline runs
//!
//! Every call resolves to a [`GeneratedArticle`] or a classified
//! [`GenerationError`], so callers can tell a revoked key apart from a
//! transient failure without inspecting message text.

mod openai;
pub mod text;

pub use openai::OpenAiGenerationClient;

use crate::config::AppConfig;
use crate::errors::{AppError, GenerationError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Style and provider settings applied to every article in a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterPreferences {
    pub tone: String,
    pub min_words: u32,
    pub include_faq: bool,
    pub system_prompt: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl WriterPreferences {
    pub fn from_config(config: &AppConfig) -> Self {
        let generation = &config.generation;
        Self {
            tone: generation.tone.clone(),
            min_words: generation.min_words,
            include_faq: generation.include_faq,
            system_prompt: generation.system_prompt.clone(),
            api_key: config.generation_api_key().map(str::to_string),
            base_url: generation.base_url.clone(),
            model: generation.model.clone(),
        }
    }

    /// A non-blank API key is present
    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

/// One article to write
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Working title, the batch keyword
    pub title: String,
    /// Display name of the target category
    pub category: String,
    pub preferences: WriterPreferences,
}

/// Cleaned generation output ready to be stored
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub content: String,
    pub excerpt: String,
    pub optimized_title: String,
    pub word_count: usize,
}

impl GeneratedArticle {
    /// Build an article from raw model output.
    ///
    /// Fails with `NoContent` when nothing is left after cleanup.
    pub fn from_raw(
        keyword: &str,
        raw_title: &str,
        raw_content: &str,
    ) -> std::result::Result<Self, GenerationError> {
        let optimized_title = text::clean_title(raw_title, keyword);
        let content = text::clean_content(raw_content, &optimized_title);

        if text::strip_tags(&content).is_empty() {
            return Err(GenerationError::NoContent);
        }

        Ok(Self {
            excerpt: text::excerpt(&content),
            word_count: text::word_count(&content),
            optimized_title,
            content,
        })
    }
}

/// Trait for article generation
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate one article for the request's working title
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GeneratedArticle, GenerationError>;

    /// Whether requests with these preferences can be authenticated
    fn has_credential(&self, preferences: &WriterPreferences) -> bool {
        preferences.has_credential()
    }

    /// Get the provider name
    fn provider(&self) -> &str;
}

/// Mock generation client for testing.
///
/// Scripted outcomes are consumed in order; once they run out every call
/// succeeds with a small article built from the working title.
pub struct MockGenerationClient {
    outcomes: Mutex<VecDeque<std::result::Result<GeneratedArticle, GenerationError>>>,
    fallback: Option<GenerationError>,
    latency: Duration,
    calls: Mutex<Vec<String>>,
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            fallback: None,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with the same error
    pub fn failing(error: GenerationError) -> Self {
        Self {
            fallback: Some(error),
            ..Self::new()
        }
    }

    /// Consume these outcomes before falling back to the default behaviour
    pub fn with_outcomes(
        outcomes: Vec<std::result::Result<GeneratedArticle, GenerationError>>,
    ) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            ..Self::new()
        }
    }

    /// Simulated provider latency per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Working titles received so far, in call order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    fn default_article(keyword: &str) -> std::result::Result<GeneratedArticle, GenerationError> {
        let title = format!("{}: A Practical Guide", keyword);
        let body = format!(
            "<h1>{title}</h1><p>This guide explains {keyword} in plain terms.</p>\
             <h2>Key points</h2><p>Compare options before you commit.</p>"
        );
        GeneratedArticle::from_raw(keyword, &title, &body)
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GeneratedArticle, GenerationError> {
        self.calls.lock().await.push(request.title.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(outcome) = self.outcomes.lock().await.pop_front() {
            return outcome;
        }

        match &self.fallback {
            Some(error) => Err(error.clone()),
            None => Self::default_article(&request.title),
        }
    }

    fn has_credential(&self, _preferences: &WriterPreferences) -> bool {
        true
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

/// Create a generation client based on configuration
pub fn create_generation_client(config: &AppConfig) -> Result<Arc<dyn GenerationClient>> {
    let generation = &config.generation;
    match generation.provider.as_str() {
        "openai" => {
            let timeout = Duration::from_secs(generation.timeout_secs);
            Ok(Arc::new(OpenAiGenerationClient::new(timeout)?))
        }
        "mock" => {
            tracing::warn!("Using mock generation client, articles will be placeholders");
            Ok(Arc::new(MockGenerationClient::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown generation provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str) -> GenerationRequest {
        GenerationRequest {
            title: title.to_string(),
            category: "Loans".to_string(),
            preferences: WriterPreferences::from_config(&AppConfig::default()),
        }
    }

    #[test]
    fn test_preferences_credential() {
        let mut config = AppConfig::default();
        assert!(!WriterPreferences::from_config(&config).has_credential());

        config.generation.api_key = Some("   ".into());
        assert!(!WriterPreferences::from_config(&config).has_credential());

        config.generation.api_key = Some("sk-test".into());
        let prefs = WriterPreferences::from_config(&config);
        assert!(prefs.has_credential());
        assert_eq!(prefs.min_words, 800);
    }

    #[test]
    fn test_from_raw_cleans_output() {
        let article = GeneratedArticle::from_raw(
            "mortgage calculator",
            "\"Mortgage Calculator Guide\"",
            "<html><body><h1>Mortgage Calculator Guide</h1><p>Plan your **payments**.</p></body></html>",
        )
        .unwrap();

        assert_eq!(article.optimized_title, "Mortgage Calculator Guide");
        assert_eq!(article.content, "<p>Plan your <strong>payments</strong>.</p>");
        assert_eq!(article.excerpt, "Plan your payments.");
        assert_eq!(article.word_count, 4);
    }

    #[test]
    fn test_from_raw_without_text_is_no_content() {
        let err = GeneratedArticle::from_raw("x", "Title", "<html><body></body></html>").unwrap_err();
        assert_eq!(err, GenerationError::NoContent);
    }

    #[tokio::test]
    async fn test_mock_default_article() {
        let client = MockGenerationClient::new();
        let article = client.generate(&request("best personal loan rates")).await.unwrap();

        assert_eq!(article.optimized_title, "best personal loan rates: A Practical Guide");
        assert!(article.content.starts_with("<p>"));
        assert!(article.word_count > 0);
        assert_eq!(client.calls().await, vec!["best personal loan rates"]);
    }

    #[tokio::test]
    async fn test_mock_scripted_then_failing() {
        let client = MockGenerationClient::with_outcomes(vec![Err(GenerationError::RateLimited)]);
        assert_eq!(
            client.generate(&request("a")).await.unwrap_err(),
            GenerationError::RateLimited
        );
        assert!(client.generate(&request("b")).await.is_ok());

        let failing = MockGenerationClient::failing(GenerationError::InvalidCredential);
        assert!(failing.generate(&request("c")).await.unwrap_err().is_credential_failure());
    }

    #[test]
    fn test_factory() {
        let mut config = AppConfig::default();
        config.generation.provider = "mock".into();
        assert_eq!(create_generation_client(&config).unwrap().provider(), "mock");

        config.generation.provider = "openai".into();
        assert_eq!(create_generation_client(&config).unwrap().provider(), "openai");

        config.generation.provider = "carrier-pigeon".into();
        assert!(create_generation_client(&config).is_err());
    }
}
