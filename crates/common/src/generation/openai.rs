//! OpenAI-compatible chat completion client

use super::{GeneratedArticle, GenerationClient, GenerationRequest, WriterPreferences};
use crate::errors::{GenerationError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TITLE_MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.7;
const TITLE_SYSTEM_PROMPT: &str =
    "You are an SEO copywriter for a personal finance site. Write clear, compelling article titles.";

/// Generation client for OpenAI-style `/chat/completions` endpoints.
///
/// Credentials, base URL, and model travel with each request so operators
/// can rotate keys without rebuilding the client.
pub struct OpenAiGenerationClient {
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl OpenAiGenerationClient {
    /// Create a client whose calls give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn chat(
        &self,
        preferences: &WriterPreferences,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, GenerationError> {
        let api_key = preferences
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GenerationError::InvalidCredential)?;

        let url = format!("{}/chat/completions", preferences.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &preferences.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body, &preferences.model));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::Unknown {
                    status: Some(status.as_u16()),
                    message: format!("failed to parse response: {}", e),
                }
            }
        })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default())
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GeneratedArticle, GenerationError> {
        let preferences = &request.preferences;
        let start = Instant::now();

        let raw_title = self
            .chat(
                preferences,
                TITLE_SYSTEM_PROMPT,
                &title_prompt(request),
                TITLE_MAX_TOKENS,
            )
            .await?;

        let title = super::text::clean_title(&raw_title, &request.title);
        let raw_content = self
            .chat(
                preferences,
                &preferences.system_prompt,
                &content_prompt(request, &title),
                preferences.min_words.saturating_mul(2),
            )
            .await?;

        if raw_content.is_empty() {
            return Err(GenerationError::NoContent);
        }

        let article = GeneratedArticle::from_raw(&request.title, &title, &raw_content)?;
        crate::metrics::record_generation_latency(start.elapsed().as_secs_f64());

        debug!(
            keyword = %request.title,
            title = %article.optimized_title,
            word_count = article.word_count,
            "Article generated"
        );

        if (article.word_count as u32) < preferences.min_words {
            warn!(
                keyword = %request.title,
                word_count = article.word_count,
                min_words = preferences.min_words,
                "Generated article is shorter than requested"
            );
        }

        Ok(article)
    }

    fn provider(&self) -> &str {
        "openai"
    }
}

fn title_prompt(request: &GenerationRequest) -> String {
    format!(
        "Write one SEO-optimized title for an article about \"{}\" in the {} category. \
         Keep it under 60 characters, include the main keyword, and reply with the title only.",
        request.title, request.category
    )
}

fn content_prompt(request: &GenerationRequest, title: &str) -> String {
    let preferences = &request.preferences;
    let mut prompt = format!(
        "Write an article titled \"{title}\" for the {category} section of a US personal finance site.\n\
         Tone: {tone}. Length: at least {min_words} words.\n\
         Use HTML only: <h2> and <h3> for sections, <p> for paragraphs, <ul>/<ol> for lists, \
         <strong> for emphasis. Do not include <html>, <head>, <body>, or an <h1>.\n\
         Open with a short introduction paragraph that summarizes the article.",
        title = title,
        category = request.category,
        tone = preferences.tone,
        min_words = preferences.min_words,
    );

    if preferences.include_faq {
        prompt.push_str("\nEnd with a Frequently Asked Questions section of 3 to 5 questions.");
    }

    prompt
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Unknown {
            status: err.status().map(|s| s.as_u16()),
            message: format!("request failed: {}", err),
        }
    }
}

/// Map a non-success response onto the generation error taxonomy
fn classify_failure(status: StatusCode, body: &str, model: &str) -> GenerationError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "Unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED => GenerationError::InvalidCredential,
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited,
        StatusCode::FORBIDDEN => GenerationError::Forbidden,
        StatusCode::NOT_FOUND => GenerationError::ModelUnavailable {
            model: model.to_string(),
        },
        _ if message.contains("does not exist") => GenerationError::ModelUnavailable {
            model: model.to_string(),
        },
        _ => GenerationError::Unknown {
            status: Some(status.as_u16()),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn request(include_faq: bool) -> GenerationRequest {
        let mut preferences = WriterPreferences::from_config(&AppConfig::default());
        preferences.include_faq = include_faq;
        GenerationRequest {
            title: "best credit cards".into(),
            category: "Credit Cards".into(),
            preferences,
        }
    }

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(
            classify_failure(StatusCode::UNAUTHORIZED, "", "gpt-4"),
            GenerationError::InvalidCredential
        );
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "", "gpt-4"),
            GenerationError::RateLimited
        );
        assert_eq!(
            classify_failure(StatusCode::FORBIDDEN, "", "gpt-4"),
            GenerationError::Forbidden
        );
        assert_eq!(
            classify_failure(StatusCode::NOT_FOUND, "", "gpt-4"),
            GenerationError::ModelUnavailable { model: "gpt-4".into() }
        );
    }

    #[test]
    fn test_classify_uses_error_message() {
        let body = r#"{"error":{"message":"The model `gpt-5` does not exist"}}"#;
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, body, "gpt-5"),
            GenerationError::ModelUnavailable { model: "gpt-5".into() }
        );

        let body = r#"{"error":{"message":"server overloaded"}}"#;
        assert_eq!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, body, "gpt-4"),
            GenerationError::Unknown {
                status: Some(503),
                message: "server overloaded".into()
            }
        );

        assert_eq!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "<html>", "gpt-4"),
            GenerationError::Unknown {
                status: Some(500),
                message: "Unknown error".into()
            }
        );
    }

    #[test]
    fn test_prompts_follow_preferences() {
        let with_faq = content_prompt(&request(true), "Best Credit Cards of the Year");
        assert!(with_faq.contains("Best Credit Cards of the Year"));
        assert!(with_faq.contains("at least 800 words"));
        assert!(with_faq.contains("Frequently Asked Questions"));

        let without_faq = content_prompt(&request(false), "Title");
        assert!(!without_faq.contains("Frequently Asked Questions"));

        assert!(title_prompt(&request(true)).contains("\"best credit cards\""));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let client = OpenAiGenerationClient::new(Duration::from_secs(1)).unwrap();
        let err = client.generate(&request(false)).await.unwrap_err();
        assert_eq!(err, GenerationError::InvalidCredential);
    }
}
