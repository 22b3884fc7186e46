use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use eventfeed_core::heatmap::{build_timeline, HeatmapPoint, DEFAULT_BUCKET_COUNT};
use eventfeed_core::{Event, EventUpdate, NewEvent, Post};
use eventfeed_db::PostFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, not_found, parse_id, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct EventPostsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HeatmapQuery {
    pub buckets: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct HeatmapBucketItem {
    index: usize,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    point_count: usize,
    geojson: Value,
}

#[derive(Debug, Serialize)]
pub(super) struct HeatmapResponse {
    event_id: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    point_count: usize,
    buckets: Vec<HeatmapBucketItem>,
}

pub(super) async fn list_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Event>>>, ApiError> {
    let events = state
        .store
        .list_events()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, events))
}

pub(super) async fn create_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewEvent>,
) -> Result<(StatusCode, Json<ApiResponse<Event>>), ApiError> {
    let event = state
        .store
        .create_event(body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(event_id = %event.id, name = %event.name, "event created");
    Ok((StatusCode::CREATED, ApiResponse::new(req_id.0, event)))
}

pub(super) async fn get_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let event = state
        .store
        .get_event(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| not_found(&req_id.0, &format!("event {id}")))?;

    Ok(ApiResponse::new(req_id.0, event))
}

pub(super) async fn update_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<EventUpdate>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let event = state
        .store
        .update_event(id, body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, event))
}

pub(super) async fn delete_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let deleted = state
        .store
        .delete_event(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if deleted {
        tracing::info!(event_id = %id, "event deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&req_id.0, &format!("event {id}")))
    }
}

pub(super) async fn list_event_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Query(query): Query<EventPostsQuery>,
) -> Result<Json<ApiResponse<Vec<Post>>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    ensure_event_exists(&state, &req_id.0, id).await?;

    let filter = PostFilter {
        limit: Some(normalize_limit(query.limit)),
        ..PostFilter::for_event(id)
    };
    let posts = state
        .store
        .list_posts(&filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, posts))
}

pub(super) async fn event_heatmap(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<ApiResponse<HeatmapResponse>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    ensure_event_exists(&state, &req_id.0, id).await?;

    let posts = state
        .store
        .list_posts(&PostFilter::for_event(id))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let timeline = build_timeline(
        HeatmapPoint::from_posts(&posts),
        query.buckets.unwrap_or(DEFAULT_BUCKET_COUNT),
    );
    let data = HeatmapResponse {
        event_id: id.to_string(),
        start: timeline.start,
        end: timeline.end,
        point_count: timeline.point_count(),
        buckets: timeline
            .buckets
            .iter()
            .map(|bucket| HeatmapBucketItem {
                index: bucket.index,
                start: bucket.start,
                end: bucket.end,
                point_count: bucket.points.len(),
                geojson: bucket.to_geojson(),
            })
            .collect(),
    };

    Ok(ApiResponse::new(req_id.0, data))
}

pub(super) async fn record_view(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let event = state
        .store
        .record_event_view(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, event))
}

async fn ensure_event_exists(
    state: &AppState,
    request_id: &str,
    id: uuid::Uuid,
) -> Result<(), ApiError> {
    match state.store.get_event(id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(not_found(request_id, &format!("event {id}"))),
        Err(e) => Err(map_db_error(request_id.to_string(), &e)),
    }
}
