//! ContentForge Common Library
//!
//! Shared code for the ContentForge automation service including:
//! - Domain models (keyword batches, articles, categories)
//! - The durable keyword batch queue
//! - Generation, article store, and index notifier clients
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod generation;
pub mod metrics;
pub mod models;
pub mod notifier;
pub mod queue;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, GenerationError, Result};
pub use generation::GenerationClient;
pub use notifier::IndexNotifier;
pub use queue::BatchQueue;
pub use store::ArticleStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of keywords accepted in a single batch
pub const MAX_KEYWORDS_PER_BATCH: usize = 100;

/// Default author label for generated articles
pub const DEFAULT_AUTHOR: &str = "AI Content Generator";
