use axum::{
    extract::{Path, State},
    Extension, Json,
};
use eventfeed_core::{ProfileUpdate, UserProfile};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

pub(super) async fn get_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let profile = state
        .store
        .get_or_create_profile(&user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, profile))
}

pub(super) async fn update_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<String>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let profile = state
        .store
        .update_profile(&user_id, body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, profile))
}
