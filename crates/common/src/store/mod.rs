//! Article store clients
//!
//! Articles and categories live in an external REST CRUD API. This module
//! provides:
//! - The [`ArticleStore`] contract used by the automation service
//! - An HTTP client with exponential-backoff retries for transient failures.
//!   Reads retry on timeouts and 5xx responses; writes only retry when the
//!   request never reached the server, so an article is never posted twice.
//! - An in-memory store for tests and offline runs

use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{Article, ArticleStatus, Category, NewArticle};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default page size for category listings
pub const DEFAULT_CATEGORY_LIMIT: usize = 20;

/// Persistence contract for generated articles
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Persist a new article and return the stored record
    async fn create(&self, article: NewArticle) -> Result<Article>;

    /// Published articles of a category, newest first
    async fn get_by_category(&self, category_id: &str, limit: usize) -> Result<Vec<Article>>;

    /// Look up a category, `None` when it does not exist
    async fn get_category(&self, id: &str) -> Result<Option<Category>>;
}

/// Failures a request may be retried on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetryOn {
    /// Connect failures, timeouts and 5xx responses
    Transient,
    /// Connect failures only
    ConnectOnly,
}

/// Client for the REST CRUD API
pub struct RestArticleStore {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl RestArticleStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(500),
        })
    }

    /// Override the first retry delay
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}/", self.base_url, resource)
    }

    /// Send a request, retrying the failures `retry_on` allows
    async fn send_with_retry<F>(&self, operation: &str, retry_on: RetryOn, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let policy = ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let max_attempts = self.max_retries + 1;
        let mut attempt = 0u32;

        retry(policy, || {
            attempt += 1;
            let current = attempt;
            let request = build();

            async move {
                let error = match request.send().await {
                    Ok(response)
                        if response.status().is_server_error() && retry_on == RetryOn::Transient =>
                    {
                        AppError::Store {
                            message: format!("{} returned {}", operation, response.status()),
                        }
                    }
                    Ok(response) => return Ok(response),
                    Err(e) if e.is_connect() => AppError::HttpClient(e),
                    Err(e) if e.is_timeout() && retry_on == RetryOn::Transient => AppError::HttpClient(e),
                    Err(e) => return Err(backoff::Error::permanent(AppError::HttpClient(e))),
                };

                if current >= max_attempts {
                    return Err(backoff::Error::permanent(error));
                }

                warn!(
                    operation,
                    attempt = current,
                    max_attempts,
                    error = %error,
                    "Article store request failed, retrying"
                );
                Err(backoff::Error::transient(error))
            }
        })
        .await
    }
}

#[async_trait]
impl ArticleStore for RestArticleStore {
    async fn create(&self, article: NewArticle) -> Result<Article> {
        let url = self.url("articles");
        let response = self
            .send_with_retry("create article", RetryOn::ConnectOnly, || {
                self.client.post(&url).json(&article)
            })
            .await?;

        let response = ensure_success(response, "create article").await?;
        let created: Article = response.json().await.map_err(|e| AppError::Store {
            message: format!("invalid create response: {}", e),
        })?;

        debug!(article_id = %created.id, slug = %created.slug, "Article stored");
        Ok(created)
    }

    async fn get_by_category(&self, category_id: &str, limit: usize) -> Result<Vec<Article>> {
        let url = self.url("articles");
        let limit = limit.to_string();
        let response = self
            .send_with_retry("list articles", RetryOn::Transient, || {
                self.client
                    .get(&url)
                    .query(&[("category_id", category_id), ("limit", limit.as_str())])
            })
            .await?;

        let response = ensure_success(response, "list articles").await?;
        let articles: Vec<Article> = response.json().await.map_err(|e| AppError::Store {
            message: format!("invalid article list: {}", e),
        })?;

        Ok(articles
            .into_iter()
            .filter(|a| a.status == ArticleStatus::Published)
            .collect())
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>> {
        let url = self.url("categories");
        let response = self
            .send_with_retry("get category", RetryOn::Transient, || {
                self.client.get(&url).query(&[("id", id)])
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "get category").await?;
        let category = response.json().await.map_err(|e| AppError::Store {
            message: format!("invalid category: {}", e),
        })?;

        Ok(Some(category))
    }
}

async fn ensure_success(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);

    Err(AppError::Store {
        message: format!("{} failed ({}): {}", operation, status, message),
    })
}

/// In-memory article store
pub struct InMemoryArticleStore {
    articles: RwLock<Vec<Article>>,
    categories: RwLock<HashMap<String, Category>>,
    next_id: AtomicU64,
    reject_writes: AtomicBool,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self {
            articles: RwLock::new(Vec::new()),
            categories: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Store seeded with categories
    pub fn with_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut store = Self::new();
        let map = categories
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect::<HashMap<_, _>>();
        store.categories = RwLock::new(map);
        store
    }

    pub async fn add_category(&self, category: Category) {
        self.categories.write().await.insert(category.id.clone(), category);
    }

    /// Make every subsequent `create` fail
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub async fn article_count(&self) -> usize {
        self.articles.read().await.len()
    }
}

impl Default for InMemoryArticleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn create(&self, article: NewArticle) -> Result<Article> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store {
                message: "store is rejecting writes".to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Article::from_new(id.to_string(), article);
        self.articles.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn get_by_category(&self, category_id: &str, limit: usize) -> Result<Vec<Article>> {
        Ok(self
            .articles
            .read()
            .await
            .iter()
            .rev()
            .filter(|a| a.category_id == category_id && a.status == ArticleStatus::Published)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>> {
        Ok(self.categories.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Query, State},
        http::StatusCode as HttpStatus,
        routing::{get, post},
        Json, Router,
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.into(),
            name: name.into(),
            slug: crate::models::slugify(name),
        }
    }

    fn new_article(category_id: &str, title: &str) -> NewArticle {
        NewArticle {
            title: title.into(),
            slug: crate::models::slugify(title),
            excerpt: "Excerpt".into(),
            hero_image: String::new(),
            content: "<p>Body</p>".into(),
            author: crate::DEFAULT_AUTHOR.into(),
            publish_date: Utc::now(),
            category_id: category_id.into(),
            status: ArticleStatus::Published,
            word_count: 1,
            disable_ads: false,
        }
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryArticleStore::with_categories([category("cat-1", "Loans")]);

        let first = store.create(new_article("cat-1", "First Loan Guide")).await.unwrap();
        store.create(new_article("cat-2", "Card Guide")).await.unwrap();
        store.create(new_article("cat-1", "Second Loan Guide")).await.unwrap();
        store
            .create(NewArticle {
                status: ArticleStatus::Draft,
                ..new_article("cat-1", "Unfinished Loan Guide")
            })
            .await
            .unwrap();
        assert_eq!(first.id, "1");

        let listed = store.get_by_category("cat-1", 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].slug, "second-loan-guide");

        assert_eq!(store.get_by_category("cat-1", 1).await.unwrap().len(), 1);
        assert!(store.get_category("cat-1").await.unwrap().is_some());
        assert!(store.get_category("missing").await.unwrap().is_none());

        store.reject_writes(true);
        assert!(store.create(new_article("cat-1", "Third")).await.is_err());
        assert_eq!(store.article_count().await, 4);
    }

    #[derive(Clone, Default)]
    struct Fake {
        category_calls: Arc<AtomicUsize>,
        inserts: Arc<AtomicUsize>,
    }

    async fn create_article(Json(mut body): Json<Value>) -> (HttpStatus, Json<Value>) {
        body["id"] = json!("42");
        (HttpStatus::OK, Json(body))
    }

    /// Commits the row, then answers the first insert too late
    async fn slow_create_article(
        State(fake): State<Fake>,
        Json(mut body): Json<Value>,
    ) -> (HttpStatus, Json<Value>) {
        let insert = fake.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if insert == 1 {
            tokio::time::sleep(Duration::from_millis(1500)).await;
        }
        body["id"] = json!(insert.to_string());
        (HttpStatus::OK, Json(body))
    }

    async fn broken_create_article(State(fake): State<Fake>) -> (HttpStatus, Json<Value>) {
        fake.inserts.fetch_add(1, Ordering::SeqCst);
        (
            HttpStatus::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Duplicate entry for key 'slug'"})),
        )
    }

    async fn get_category_route(
        State(fake): State<Fake>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (HttpStatus, Json<Value>) {
        // First call fails so the retry path is exercised
        if fake.category_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return (HttpStatus::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})));
        }

        match params.get("id").map(String::as_str) {
            Some("3") => (
                HttpStatus::OK,
                Json(json!({"id": 3, "name": "Personal Loans", "slug": "personal-loans", "is_high_cpc": true})),
            ),
            _ => (HttpStatus::NOT_FOUND, Json(json!({"error": "Category not found"}))),
        }
    }

    async fn list_articles(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        assert_eq!(params.get("limit").map(String::as_str), Some("5"));
        let category_id = params.get("category_id").cloned().unwrap_or_default();
        Json(json!([
            {
                "id": "7",
                "title": "Old Article",
                "slug": "old-article",
                "category_id": category_id,
                "status": "published",
                "word_count": 900,
                "disable_ads": false
            },
            {
                "id": 8,
                "title": "Draft Article",
                "slug": "draft-article",
                "category_id": category_id,
                "status": "draft"
            }
        ]))
    }

    async fn serve(fake: Fake) -> String {
        let app = Router::new()
            .route("/api/articles/", post(create_article).get(list_articles))
            .route("/api/categories/", get(get_category_route))
            .route("/slow/articles/", post(slow_create_article))
            .route("/broken/articles/", post(broken_create_article))
            .with_state(fake);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn rest_store(base_url: String) -> RestArticleStore {
        rest_store_with_timeout(base_url, 5)
    }

    fn rest_store_with_timeout(base_url: String, timeout_secs: u64) -> RestArticleStore {
        let config = StoreConfig {
            base_url,
            timeout_secs,
            max_retries: 3,
        };
        RestArticleStore::new(&config)
            .unwrap()
            .with_initial_backoff(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_rest_store_round_trip() {
        let fake = Fake::default();
        let store = rest_store(format!("{}/api", serve(fake.clone()).await));

        let created = store.create(new_article("3", "Loan Rates Today")).await.unwrap();
        assert_eq!(created.id, "42");
        assert_eq!(created.slug, "loan-rates-today");
        assert_eq!(created.status, ArticleStatus::Published);

        let category = store.get_category("3").await.unwrap().unwrap();
        assert_eq!(category.id, "3");
        assert_eq!(category.name, "Personal Loans");
        assert_eq!(fake.category_calls.load(Ordering::SeqCst), 2);

        assert!(store.get_category("99").await.unwrap().is_none());

        let listed = store.get_by_category("3", 5).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].category_id, "3");
        assert_eq!(listed[0].slug, "old-article");
    }

    #[tokio::test]
    async fn test_create_is_not_resent_after_timeout() {
        let fake = Fake::default();
        let store = rest_store_with_timeout(format!("{}/slow", serve(fake.clone()).await), 1);

        let err = store.create(new_article("3", "Loan Rates Today")).await.unwrap_err();
        assert!(matches!(err, AppError::HttpClient(ref e) if e.is_timeout()));

        // Give a resent request time to land
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(fake.inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_is_not_resent_after_server_error() {
        let fake = Fake::default();
        let store = rest_store(format!("{}/broken", serve(fake.clone()).await));

        let err = store.create(new_article("3", "Loan Rates Today")).await.unwrap_err();
        assert!(err.to_string().contains("Duplicate entry"));
        assert_eq!(fake.inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_retries_connect_failures() {
        let store = rest_store("http://127.0.0.1:1/api".into());
        let err = store.create(new_article("3", "Loan Rates Today")).await.unwrap_err();
        assert!(matches!(err, AppError::HttpClient(ref e) if e.is_connect()));
    }

    #[tokio::test]
    async fn test_rest_store_gives_up_after_retries() {
        let store = rest_store("http://127.0.0.1:1/api".into());
        let err = store.get_category("3").await.unwrap_err();
        assert!(matches!(err, AppError::HttpClient(_)));
    }
}
