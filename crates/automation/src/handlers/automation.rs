//! Automation control handlers

use axum::{extract::State, http::StatusCode, Json};
use contentforge_common::{
    errors::{AppError, Result},
    models::AutomationConfig,
    notifier::generate_index_key,
};
use serde::Serialize;
use tracing::info;

use crate::scheduler::SchedulerStatus;
use crate::AppState;

/// Start automation in the background.
///
/// Configuration problems are reported synchronously. The run is claimed
/// before responding, so a following stop request always reaches it; the
/// work itself is spawned and observed through the status endpoint.
pub async fn start(
    State(state): State<AppState>,
    Json(config): Json<AutomationConfig>,
) -> Result<StatusCode> {
    info!(
        hourly_limit = config.hourly_limit,
        daily_limit = config.daily_limit,
        auto_index_notify = config.auto_index_notify,
        "Automation start requested"
    );

    if let Some(run) = state.scheduler.begin(config).await? {
        tokio::spawn(run.execute());
    }

    Ok(StatusCode::ACCEPTED)
}

/// Stop automation, waiting for an in-flight keyword to finish
pub async fn stop(State(state): State<AppState>) -> Result<StatusCode> {
    // Outlives the request if the client disconnects
    let scheduler = state.scheduler.clone();
    tokio::spawn(async move { scheduler.stop().await })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("stop task failed: {}", e),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

#[derive(Debug, Serialize)]
pub struct IndexKeyResponse {
    pub key: String,
}

/// Fresh IndexNow key for the operator to host and configure
pub async fn new_index_key() -> Json<IndexKeyResponse> {
    Json(IndexKeyResponse {
        key: generate_index_key(),
    })
}
