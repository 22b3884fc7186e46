use axum::{
    extract::{Query, State},
    Extension, Json,
};
use eventfeed_core::home::{build_home_feed, HomeFeed};
use eventfeed_core::trending::{score_breakdown_with_policy, DEFAULT_TRENDING_THRESHOLD};
use eventfeed_core::{
    is_trending_with_policy, rank_trending_with_policy, ContentItem, Engagement, FeedOptions,
    Post, TrendingLevel,
};
use eventfeed_db::PostFilter;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

/// Upper bound on `max_items` accepted from a query string.
const MAX_TRENDING_ITEMS: usize = 100;

#[derive(Debug, Deserialize)]
pub(super) struct TrendingQuery {
    pub max_items: Option<usize>,
    pub min_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendingPostItem {
    post: Post,
    score: f64,
    level: TrendingLevel,
    label: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendingResponse {
    items: Vec<TrendingPostItem>,
    skipped: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScoreRequest {
    pub items: Vec<ContentItem>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ScoredItem {
    id: String,
    score: Option<f64>,
    level: Option<TrendingLevel>,
    is_trending: bool,
    error: Option<String>,
}

pub(super) async fn home_feed(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<HomeFeed>>, ApiError> {
    let posts = state
        .store
        .list_posts(&PostFilter::default())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let events = state
        .store
        .list_events()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let feed = build_home_feed(posts, events, state.clock.now());
    Ok(ApiResponse::new(req_id.0, feed))
}

pub(super) async fn trending_feed(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<ApiResponse<TrendingResponse>>, ApiError> {
    let options = feed_options(&req_id.0, state.feed, &query)?;
    let posts = state
        .store
        .list_posts(&PostFilter::default())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let ranked = rank_trending_with_policy(&posts, state.clock.now(), options, &state.policy);
    let data = TrendingResponse {
        items: ranked
            .items
            .into_iter()
            .map(|r| TrendingPostItem {
                post: r.item.clone(),
                score: r.score,
                level: r.level,
                label: r.level.label(),
            })
            .collect(),
        skipped: ranked.skipped,
    };

    Ok(ApiResponse::new(req_id.0, data))
}

/// Scores client-supplied content documents without touching the store.
pub(super) async fn score_items(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ScoreRequest>,
) -> Result<Json<ApiResponse<Vec<ScoredItem>>>, ApiError> {
    let threshold = body.threshold.unwrap_or(DEFAULT_TRENDING_THRESHOLD);
    if !threshold.is_finite() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "threshold must be a finite number",
        ));
    }

    let now = state.clock.now();
    let data = body
        .items
        .iter()
        .map(|item| {
            let scored = score_breakdown_with_policy(item, now, &state.policy).and_then(|b| {
                is_trending_with_policy(item, now, threshold, &state.policy).map(|t| (b, t))
            });
            match scored {
                Ok((breakdown, is_trending)) => ScoredItem {
                    id: item.content_id(),
                    score: Some(breakdown.score),
                    level: Some(state.policy.level_for_score(breakdown.score)),
                    is_trending,
                    error: None,
                },
                Err(e) => ScoredItem {
                    id: item.content_id(),
                    score: None,
                    level: None,
                    is_trending: false,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect();

    Ok(ApiResponse::new(req_id.0, data))
}

fn feed_options(
    request_id: &str,
    defaults: FeedOptions,
    query: &TrendingQuery,
) -> Result<FeedOptions, ApiError> {
    let min_score = query.min_score.unwrap_or(defaults.min_score);
    if !min_score.is_finite() {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            "min_score must be a finite number",
        ));
    }
    Ok(FeedOptions {
        max_items: query
            .max_items
            .unwrap_or(defaults.max_items)
            .min(MAX_TRENDING_ITEMS),
        min_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_options_fall_back_to_configured_defaults() {
        let defaults = FeedOptions {
            max_items: 7,
            min_score: 2.5,
        };
        let query = TrendingQuery {
            max_items: None,
            min_score: None,
        };
        let options = feed_options("req", defaults, &query).expect("options");
        assert_eq!(options, defaults);
    }

    #[test]
    fn feed_options_cap_max_items() {
        let query = TrendingQuery {
            max_items: Some(10_000),
            min_score: Some(0.0),
        };
        let options = feed_options("req", FeedOptions::default(), &query).expect("options");
        assert_eq!(options.max_items, MAX_TRENDING_ITEMS);
        assert!(options.min_score.abs() < f64::EPSILON);
    }

    #[test]
    fn feed_options_reject_non_finite_min_score() {
        let query = TrendingQuery {
            max_items: None,
            min_score: Some(f64::NAN),
        };
        let err = feed_options("req", FeedOptions::default(), &query).expect_err("nan");
        assert_eq!(err.error.code, "validation_error");
    }
}
