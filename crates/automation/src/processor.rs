//! Keyword processor
//!
//! Turns one keyword into one published article: generate, store, and
//! optionally notify the search index.

use chrono::Utc;
use contentforge_common::{
    config::AppConfig,
    errors::{GenerationError, Result},
    generation::{GenerationClient, GenerationRequest, WriterPreferences},
    metrics,
    models::{slugify, Article, ArticleStatus, AutomationConfig, Category, NewArticle},
    notifier::IndexNotifier,
    store::ArticleStore,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

/// Site-level settings applied to every stored article
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub canonical_base_url: String,
    pub author: String,
    /// IndexNow key, notifications are skipped without one
    pub indexing_api_key: Option<String>,
}

impl PublishSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            canonical_base_url: config.site.canonical_base_url.trim_end_matches('/').to_string(),
            author: config.site.author.clone(),
            indexing_api_key: config.indexing_api_key().map(str::to_string),
        }
    }

    /// Public URL of an article
    pub fn article_url(&self, slug: &str) -> String {
        format!("{}/article/{}", self.canonical_base_url, slug)
    }
}

/// The batch a keyword belongs to
pub struct BatchContext<'a> {
    pub batch_id: &'a str,
    pub category: &'a Category,
    pub config: &'a AutomationConfig,
}

/// Result of processing a single keyword
#[derive(Debug)]
pub enum KeywordOutcome {
    Published { article: Article, url: String },
    /// The keyword failed but the run can continue
    Skipped { error: String },
    /// Every following keyword would fail the same way
    Halt { error: GenerationError },
}

/// Keyword processor
pub struct KeywordProcessor {
    generation: Arc<dyn GenerationClient>,
    store: Arc<dyn ArticleStore>,
    notifier: Arc<dyn IndexNotifier>,
    preferences: WriterPreferences,
    publish: PublishSettings,
    notifications: TaskTracker,
}

impl KeywordProcessor {
    pub fn new(
        generation: Arc<dyn GenerationClient>,
        store: Arc<dyn ArticleStore>,
        notifier: Arc<dyn IndexNotifier>,
        preferences: WriterPreferences,
        publish: PublishSettings,
    ) -> Self {
        Self {
            generation,
            store,
            notifier,
            preferences,
            publish,
            notifications: TaskTracker::new(),
        }
    }

    /// Whether the generation provider can authenticate
    pub fn has_credential(&self) -> bool {
        self.generation.has_credential(&self.preferences)
    }

    pub async fn category(&self, id: &str) -> Result<Option<Category>> {
        self.store.get_category(id).await
    }

    /// Process one keyword
    #[instrument(skip(self, ctx), fields(batch_id = %ctx.batch_id, category = %ctx.category.name))]
    pub async fn process(&self, ctx: &BatchContext<'_>, keyword: &str) -> KeywordOutcome {
        let start = Instant::now();
        let request = GenerationRequest {
            title: keyword.to_string(),
            category: ctx.category.name.clone(),
            preferences: self.preferences.clone(),
        };

        let generated = match self.generation.generate(&request).await {
            Ok(generated) => generated,
            Err(error) => {
                metrics::record_generation_error(error.kind());

                if error.is_credential_failure() {
                    return KeywordOutcome::Halt { error };
                }

                warn!(error = %error, kind = error.kind(), "Generation failed, skipping keyword");
                return KeywordOutcome::Skipped {
                    error: error.to_string(),
                };
            }
        };

        let slug = slugify(&generated.optimized_title);
        let article = NewArticle {
            title: generated.optimized_title,
            slug,
            excerpt: generated.excerpt,
            hero_image: String::new(),
            content: generated.content,
            author: self.publish.author.clone(),
            publish_date: Utc::now(),
            category_id: ctx.category.id.clone(),
            status: ArticleStatus::Published,
            word_count: generated.word_count,
            disable_ads: false,
        };

        let article = match self.store.create(article).await {
            Ok(article) => article,
            Err(e) => {
                warn!(error = %e, "Failed to store generated article, skipping keyword");
                return KeywordOutcome::Skipped {
                    error: e.to_string(),
                };
            }
        };

        metrics::record_article_generated(&ctx.category.id);
        let url = self.publish.article_url(&article.slug);

        info!(
            article_id = %article.id,
            slug = %article.slug,
            word_count = article.word_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Article published"
        );

        if ctx.config.auto_index_notify {
            self.notify(url.clone());
        }

        KeywordOutcome::Published { article, url }
    }

    /// Submit the URL in the background; the outcome is only logged
    fn notify(&self, url: String) {
        let Some(api_key) = self.publish.indexing_api_key.clone() else {
            debug!("Index notification requested but no IndexNow key is configured");
            return;
        };

        let notifier = self.notifier.clone();
        self.notifications.spawn(async move {
            let result = notifier.submit(std::slice::from_ref(&url), &api_key).await;
            metrics::record_index_submission(result.success);

            if result.success {
                debug!(url = %url, "Index notification accepted");
            } else {
                warn!(
                    url = %url,
                    message = result.message.as_deref().unwrap_or(""),
                    "Index notification failed"
                );
            }
        });
    }

    /// Wait for every index notification still in flight
    pub async fn drain_notifications(&self) {
        self.notifications.close();
        self.notifications.wait().await;
        self.notifications.reopen();
    }
}
