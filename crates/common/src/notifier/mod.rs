//! Search index notification
//!
//! Newly published article URLs are pushed to IndexNow-compatible endpoints.
//! Submission is best-effort: the outcome is reported as a
//! [`SubmissionResult`] and never as an error.

use crate::config::IndexingConfig;
use crate::errors::Result;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Outcome of one submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmissionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Trait for search index notification
#[async_trait]
pub trait IndexNotifier: Send + Sync {
    /// Submit URLs for indexing
    async fn submit(&self, urls: &[String], api_key: &str) -> SubmissionResult;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexNowPayload<'a> {
    host: String,
    key: &'a str,
    key_location: String,
    url_list: &'a [String],
}

/// IndexNow client trying each endpoint in order until one accepts
pub struct IndexNowNotifier {
    client: reqwest::Client,
    endpoints: Vec<String>,
    key_location: Option<String>,
}

impl IndexNowNotifier {
    pub fn new(config: &IndexingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
            key_location: config
                .key_location
                .clone()
                .filter(|l| !l.trim().is_empty()),
        })
    }

    fn payload<'a>(
        &self,
        urls: &'a [String],
        api_key: &'a str,
    ) -> std::result::Result<IndexNowPayload<'a>, String> {
        let first = urls.first().ok_or("no URLs to submit")?;
        let host = Url::parse(first)
            .map_err(|e| format!("invalid URL {}: {}", first, e))?
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| format!("URL has no host: {}", first))?;

        let key_location = self
            .key_location
            .clone()
            .unwrap_or_else(|| format!("https://{}/{}.txt", host, api_key));

        Ok(IndexNowPayload {
            host,
            key: api_key,
            key_location,
            url_list: urls,
        })
    }
}

#[async_trait]
impl IndexNotifier for IndexNowNotifier {
    async fn submit(&self, urls: &[String], api_key: &str) -> SubmissionResult {
        if api_key.trim().is_empty() || urls.is_empty() {
            return SubmissionResult::failed("API key and URLs are required");
        }

        let payload = match self.payload(urls, api_key) {
            Ok(payload) => payload,
            Err(message) => return SubmissionResult::failed(message),
        };

        for endpoint in &self.endpoints {
            match self.client.post(endpoint).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(endpoint = %endpoint, count = urls.len(), "IndexNow submission accepted");
                    return SubmissionResult::ok(format!("Successfully submitted to {}", endpoint));
                }
                Ok(response) => {
                    warn!(endpoint = %endpoint, status = %response.status(), "IndexNow endpoint rejected submission");
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "IndexNow submission failed");
                }
            }
        }

        SubmissionResult::failed("All IndexNow endpoints failed")
    }
}

/// Random IndexNow key, 32 lowercase hex characters
pub fn generate_index_key() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Notifier that records submissions instead of sending them
pub struct RecordingNotifier {
    submissions: Mutex<Vec<Vec<String>>>,
    succeed: bool,
    latency: Duration,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            succeed: true,
            latency: Duration::ZERO,
        }
    }

    /// Record submissions but report every one as failed
    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::new()
        }
    }

    /// Delay each submission before it is recorded
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn submissions(&self) -> Vec<Vec<String>> {
        self.submissions.lock().await.clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexNotifier for RecordingNotifier {
    async fn submit(&self, urls: &[String], _api_key: &str) -> SubmissionResult {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.submissions.lock().await.push(urls.to_vec());
        if self.succeed {
            SubmissionResult::ok("recorded")
        } else {
            SubmissionResult::failed("recording notifier configured to fail")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use std::sync::Arc;

    fn config(endpoints: Vec<String>) -> IndexingConfig {
        IndexingConfig {
            endpoints,
            timeout_secs: 2,
            ..IndexingConfig::default()
        }
    }

    #[test]
    fn test_generate_index_key() {
        let key = generate_index_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_index_key());
    }

    #[test]
    fn test_payload_shape() {
        let notifier = IndexNowNotifier::new(&config(vec![])).unwrap();
        let urls = vec!["https://financeadd.com/article/best-loans".to_string()];
        let payload = notifier.payload(&urls, "abc123").unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["host"], "financeadd.com");
        assert_eq!(json["key"], "abc123");
        assert_eq!(json["keyLocation"], "https://financeadd.com/abc123.txt");
        assert_eq!(json["urlList"][0], "https://financeadd.com/article/best-loans");
    }

    #[tokio::test]
    async fn test_requires_key_and_urls() {
        let notifier = IndexNowNotifier::new(&config(vec!["http://127.0.0.1:1/indexnow".into()])).unwrap();

        let result = notifier.submit(&[], "key").await;
        assert!(!result.success);

        let result = notifier
            .submit(&["https://financeadd.com/article/x".to_string()], "  ")
            .await;
        assert!(!result.success);

        let result = notifier.submit(&["not a url".to_string()], "key").await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_endpoint() {
        let received: Arc<tokio::sync::Mutex<Vec<Value>>> = Arc::default();
        let sink = received.clone();

        let app = Router::new()
            .route("/down", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route(
                "/indexnow",
                post(move |Json(body): Json<Value>| {
                    let sink = sink.clone();
                    async move {
                        sink.lock().await.push(body);
                        StatusCode::ACCEPTED
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let notifier = IndexNowNotifier::new(&config(vec![
            format!("http://{}/down", addr),
            format!("http://{}/indexnow", addr),
        ]))
        .unwrap();

        let urls = vec!["https://financeadd.com/article/mortgage-guide".to_string()];
        let result = notifier.submit(&urls, "abc123").await;

        assert!(result.success);
        assert!(result.message.unwrap().ends_with("/indexnow"));
        let bodies = received.lock().await;
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["urlList"][0], "https://financeadd.com/article/mortgage-guide");
    }

    #[tokio::test]
    async fn test_all_endpoints_failing() {
        let notifier = IndexNowNotifier::new(&config(vec!["http://127.0.0.1:1/indexnow".into()])).unwrap();
        let result = notifier
            .submit(&["https://financeadd.com/article/x".to_string()], "key")
            .await;
        assert_eq!(result, SubmissionResult::failed("All IndexNow endpoints failed"));
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::failing();
        let result = notifier.submit(&["https://a.test/x".to_string()], "k").await;
        assert!(!result.success);
        assert_eq!(notifier.submissions().await.len(), 1);
    }
}
