use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::detect::{detect, Detection};
use crate::extract::{CheckOutcome, ExtractionRule, Extractor};
use crate::models::{
    AvailabilityStrategy, Check, NewWatcher, UpdateWatcher, Watcher,
};

use super::{ApiResponse, AppError, AppState};

/// How many history rows the detail endpoint returns.
const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct WatcherWithLatest {
    #[serde(flatten)]
    pub watcher: Watcher,
    pub latest_check: Option<Check>,
}

#[derive(Debug, Serialize)]
pub struct WatcherDetail {
    #[serde(flatten)]
    pub watcher: Watcher,
    pub checks: Vec<Check>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DetectRequest {
    #[validate(url)]
    pub url: String,
}

/// Ad-hoc check of an unsaved configuration, used by the creation wizard.
#[derive(Debug, Deserialize, Validate)]
pub struct TestCheckRequest {
    #[validate(url)]
    pub url: String,
    #[validate(length(min = 1))]
    pub price_selector: String,
    pub stock_selector: Option<String>,
    pub availability_strategy: AvailabilityStrategy,
    pub out_of_stock_keywords: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunChecksResponse {
    pub dispatched: usize,
}

// Watcher management handlers

pub async fn list_watchers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<WatcherWithLatest>>>, AppError> {
    let watchers = state.store.list_watchers().await.map_err(AppError::from)?;

    let mut listed = Vec::with_capacity(watchers.len());
    for watcher in watchers {
        let latest_check = state
            .store
            .latest_check(&watcher.id)
            .await
            .map_err(AppError::from)?;
        listed.push(WatcherWithLatest {
            watcher,
            latest_check,
        });
    }

    Ok(Json(ApiResponse::success(listed)))
}

pub async fn get_watcher(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WatcherDetail>>, AppError> {
    let watcher = state
        .store
        .get_watcher(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("Watcher"))?;

    let checks = state
        .store
        .recent_checks(&watcher.id, HISTORY_LIMIT)
        .await
        .map_err(AppError::from)?;

    Ok(Json(ApiResponse::success(WatcherDetail { watcher, checks })))
}

pub async fn create_watcher(
    State(state): State<AppState>,
    Json(request): Json<NewWatcher>,
) -> Result<Json<ApiResponse<Watcher>>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let watcher = Watcher::new(request).map_err(AppError::from)?;
    state
        .store
        .insert_watcher(&watcher)
        .await
        .map_err(AppError::from)?;

    tracing::info!("Created watcher {} ({})", watcher.name, watcher.id);
    Ok(Json(ApiResponse::success(watcher)))
}

pub async fn update_watcher(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateWatcher>,
) -> Result<Json<ApiResponse<Watcher>>, AppError> {
    let mut watcher = state
        .store
        .get_watcher(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("Watcher"))?;

    watcher.update(update).map_err(AppError::from)?;
    state
        .store
        .update_watcher(&watcher)
        .await
        .map_err(AppError::from)?;

    tracing::info!("Updated watcher {} ({})", watcher.name, watcher.id);
    Ok(Json(ApiResponse::success(watcher)))
}

pub async fn delete_watcher(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .store
        .delete_watcher(&id)
        .await
        .map_err(AppError::from)?;

    tracing::info!("Deleted watcher {}", id);
    Ok(Json(ApiResponse::success(())))
}

// Extraction endpoints

pub async fn detect_selector(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<ApiResponse<Option<Detection>>>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let page = state
        .renderer
        .render(&request.url, None)
        .await
        .map_err(|e| AppError::unavailable(e.to_string()))?;

    let detection = detect(&page);
    match &detection {
        Some(found) => tracing::info!(
            "Detected selector for {}: {} via {}",
            request.url,
            found.selector,
            found.strategy
        ),
        None => tracing::info!("No selector detected for {}", request.url),
    }

    Ok(Json(ApiResponse::success(detection)))
}

pub async fn test_check(
    State(state): State<AppState>,
    Json(request): Json<TestCheckRequest>,
) -> Result<Json<ApiResponse<CheckOutcome>>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let rule = ExtractionRule {
        price_selector: request.price_selector.clone(),
        stock_selector: request.stock_selector.clone(),
        strategy: request.availability_strategy,
        out_of_stock_keywords: request.out_of_stock_keywords.clone(),
    };

    let extractor = Extractor::new(state.config.render.block_detection);
    let outcome = match state
        .renderer
        .render(&request.url, Some(&request.price_selector))
        .await
    {
        Ok(page) => extractor.extract(&page, &rule),
        Err(e) => CheckOutcome::failed(e.to_string()),
    };

    Ok(Json(ApiResponse::success(outcome)))
}

// Job control

pub async fn run_checks(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RunChecksResponse>>, AppError> {
    let dispatched = state.scheduler.tick().await.map_err(AppError::from)?;
    tracing::info!("Manual due-check pass dispatched {} checks", dispatched);
    Ok(Json(ApiResponse::success(RunChecksResponse { dispatched })))
}
