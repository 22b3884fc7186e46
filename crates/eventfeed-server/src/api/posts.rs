use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use eventfeed_core::{NewComment, NewPost, Post, PostUpdate};
use eventfeed_db::PostFilter;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, not_found, parse_id, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct PostQuery {
    pub event_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LikeRequest {
    pub user_id: String,
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PostQuery>,
) -> Result<Json<ApiResponse<Vec<Post>>>, ApiError> {
    let event_id = query
        .event_id
        .as_deref()
        .map(|raw| parse_id(&req_id.0, raw))
        .transpose()?;
    let filter = PostFilter {
        event_id,
        user_id: query.user_id.filter(|u| !u.trim().is_empty()),
        limit: Some(normalize_limit(query.limit)),
    };

    let posts = state
        .store
        .list_posts(&filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, posts))
}

pub(super) async fn create_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewPost>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>), ApiError> {
    let post = state
        .store
        .create_post(body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(post_id = %post.id, event_id = ?post.event_id, "post created");
    Ok((StatusCode::CREATED, ApiResponse::new(req_id.0, post)))
}

pub(super) async fn get_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let post = state
        .store
        .get_post(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| not_found(&req_id.0, &format!("post {id}")))?;

    Ok(ApiResponse::new(req_id.0, post))
}

pub(super) async fn update_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<PostUpdate>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let post = state
        .store
        .update_post(id, body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, post))
}

pub(super) async fn delete_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let deleted = state
        .store
        .delete_post(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if deleted {
        tracing::info!(post_id = %id, "post deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&req_id.0, &format!("post {id}")))
    }
}

pub(super) async fn like_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<LikeRequest>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let post = state
        .store
        .like_post(id, &body.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, post))
}

pub(super) async fn unlike_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<LikeRequest>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let post = state
        .store
        .unlike_post(id, &body.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, post))
}

pub(super) async fn add_comment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<NewComment>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>), ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let post = state
        .store
        .add_comment(id, body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((StatusCode::CREATED, ApiResponse::new(req_id.0, post)))
}

pub(super) async fn record_view(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let post = state
        .store
        .record_post_view(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, post))
}
