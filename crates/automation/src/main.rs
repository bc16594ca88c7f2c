//! ContentForge Automation Service
//!
//! Runs the keyword batch scheduler and exposes its control API:
//! - Keyword batch management
//! - Automation start/stop/status
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod processor;
mod scheduler;

use anyhow::Context;
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use contentforge_common::{
    config::{AppConfig, ObservabilityConfig},
    generation::{create_generation_client, WriterPreferences},
    metrics::{self, GENERATION_BUCKETS, LATENCY_BUCKETS},
    notifier::{IndexNotifier, IndexNowNotifier},
    queue::{BatchQueue, BatchRepository, JsonFileBatchRepository, MemoryBatchRepository},
    store::{ArticleStore, RestArticleStore},
    VERSION,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::{create_rate_limiter, rate_limit_middleware};
use crate::processor::{KeywordProcessor, PublishSettings};
use crate::scheduler::{AutomationScheduler, SchedulerSettings};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub queue: Arc<BatchQueue>,
    pub store: Arc<dyn ArticleStore>,
    pub scheduler: AutomationScheduler,
    pub metrics: Option<PrometheusHandle>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.observability);

    info!("Starting ContentForge automation service v{}", VERSION);
    let config = Arc::new(config);

    // Initialize metrics
    let metrics_handle = install_metrics_exporter()?;
    metrics::register_metrics();

    // Batch queue
    let repository: Arc<dyn BatchRepository> = match &config.automation.queue_path {
        Some(path) => {
            info!(path = %path.display(), "Using JSON file batch queue");
            Arc::new(JsonFileBatchRepository::new(path.clone()))
        }
        None => {
            warn!("No queue_path configured, batches will not survive a restart");
            Arc::new(MemoryBatchRepository::new())
        }
    };
    let queue = Arc::new(BatchQueue::open(repository).await?);
    metrics::set_batches_pending(queue.active_count().await);

    // Collaborators
    let generation = create_generation_client(&config)?;
    let store: Arc<dyn ArticleStore> = Arc::new(RestArticleStore::new(&config.store)?);
    let notifier: Arc<dyn IndexNotifier> = Arc::new(IndexNowNotifier::new(&config.indexing)?);

    info!(
        provider = generation.provider(),
        model = %config.generation.model,
        store = %config.store.base_url,
        index_notifications = config.indexing_api_key().is_some(),
        "Collaborators initialized"
    );

    let processor = KeywordProcessor::new(
        generation,
        store.clone(),
        notifier,
        WriterPreferences::from_config(&config),
        PublishSettings::from_config(&config),
    );
    let scheduler = AutomationScheduler::new(
        queue.clone(),
        processor,
        SchedulerSettings::from_config(&config.automation),
    );

    let state = AppState {
        config: config.clone(),
        queue,
        store,
        scheduler: scheduler.clone(),
        metrics: Some(metrics_handle),
    };

    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if tokio::time::timeout(config.shutdown_timeout(), scheduler.dispose())
        .await
        .is_err()
    {
        warn!("Timed out waiting for automation to stop");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("generation_duration_seconds".to_string()),
            GENERATION_BUCKETS,
        )?
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    Ok(handle)
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))

        // Batch endpoints
        .route(
            "/batches",
            get(handlers::batches::list_batches).post(handlers::batches::create_batch),
        )
        .route(
            "/batches/{id}",
            get(handlers::batches::get_batch).delete(handlers::batches::delete_batch),
        )
        .route(
            "/categories/{id}/articles",
            get(handlers::batches::list_category_articles),
        )

        // Automation control
        .route("/automation/start", post(handlers::automation::start))
        .route("/automation/stop", post(handlers::automation::stop))
        .route("/automation/status", get(handlers::automation::status))
        .route("/indexing/key", post(handlers::automation::new_index_key))
        .route_layer(from_fn(middleware::request_metrics::track_requests));

    let mut app = Router::new()
        .nest("/v1", api_routes)
        .route("/metrics", get(handlers::health::metrics));

    if state.config.rate_limit.enabled {
        let limiter = create_rate_limiter(&state.config.rate_limit);
        let limit = state.config.rate_limit.requests_per_second;
        app = app.layer(from_fn(move |request, next| {
            rate_limit_middleware(request, next, limiter.clone(), limit)
        }));
    }

    // Compose the app
    app.layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
