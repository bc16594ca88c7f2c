//! Domain models
//!
//! Plain data types shared by the batch queue, the collaborator clients,
//! and the automation scheduler.

mod article;
mod automation;
mod batch;

pub use article::{slugify, Article, ArticleStatus, Category, NewArticle};
pub use automation::AutomationConfig;
pub use batch::{normalize_keywords, BatchStatus, KeywordBatch};
