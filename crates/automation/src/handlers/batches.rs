//! Keyword batch handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use contentforge_common::{
    errors::{AppError, Result},
    metrics,
    models::{Article, KeywordBatch},
    store::DEFAULT_CATEGORY_LIMIT,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;

/// Request to queue a keyword batch
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    /// One keyword per entry; blank entries are dropped, the first 100 kept
    #[validate(length(min = 1, message = "at least one keyword is required"))]
    pub keywords: Vec<String>,

    #[validate(length(min = 1, max = 64, message = "categoryId is required"))]
    pub category_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchResponse {
    pub id: String,
    pub total_count: usize,
}

/// Batch with derived progress, as shown to operators
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: KeywordBatch,
    pub progress_percent: f64,
}

impl From<KeywordBatch> for BatchView {
    fn from(batch: KeywordBatch) -> Self {
        Self {
            progress_percent: (batch.progress_percent() * 10.0).round() / 10.0,
            batch,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    pub limit: Option<usize>,
}

pub async fn list_batches(State(state): State<AppState>) -> Json<Vec<BatchView>> {
    let batches = state.queue.list_batches().await;
    Json(batches.into_iter().map(BatchView::from).collect())
}

pub async fn create_batch(
    State(state): State<AppState>,
    Json(request): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<CreateBatchResponse>)> {
    request
        .validate()
        .map_err(|e| AppError::invalid_input(e.to_string()))?;

    let id = state
        .queue
        .add_batch(&request.keywords, &request.category_id)
        .await?;
    let batch = state.queue.get_batch(&id).await?;
    metrics::set_batches_pending(state.queue.active_count().await);

    Ok((
        StatusCode::CREATED,
        Json(CreateBatchResponse {
            id,
            total_count: batch.total_count,
        }),
    ))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchView>> {
    let batch = state.queue.get_batch(&id).await?;
    Ok(Json(batch.into()))
}

pub async fn delete_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.queue.delete_batch(&id).await?;
    metrics::set_batches_pending(state.queue.active_count().await);
    Ok(StatusCode::NO_CONTENT)
}

/// Recently published articles of a category
pub async fn list_category_articles(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<Vec<Article>>> {
    if state.store.get_category(&category_id).await?.is_none() {
        return Err(AppError::CategoryNotFound { id: category_id });
    }

    let limit = query.limit.unwrap_or(DEFAULT_CATEGORY_LIMIT).clamp(1, 100);
    let articles = state.store.get_by_category(&category_id, limit).await?;
    Ok(Json(articles))
}
