//! Trending feed ranking: score, filter, order, truncate.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trending::{
    score_breakdown_with_policy, Engagement, TrendingLevel, TrendingPolicy,
    DEFAULT_TRENDING_THRESHOLD,
};

/// Number of items the trending strip shows by default.
pub const DEFAULT_MAX_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedOptions {
    pub max_items: usize,
    pub min_score: f64,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            min_score: DEFAULT_TRENDING_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedItem<'a, T> {
    pub item: &'a T,
    pub score: f64,
    pub level: TrendingLevel,
    #[serde(skip)]
    created_at: DateTime<Utc>,
    #[serde(skip)]
    content_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingFeed<'a, T> {
    pub items: Vec<RankedItem<'a, T>>,
    /// Ids of items left out because their timestamp did not parse or their
    /// score was not a finite number.
    pub skipped: Vec<String>,
}

/// Rank `items` by trending score under the default policy.
#[must_use]
pub fn rank_trending<T: Engagement>(
    items: &[T],
    now: DateTime<Utc>,
    options: FeedOptions,
) -> TrendingFeed<'_, T> {
    rank_trending_with_policy(items, now, options, &TrendingPolicy::default())
}

/// Rank `items` by trending score.
///
/// Items scoring below `options.min_score` are dropped. Order is score
/// descending, then newer `created_at` first, then `content_id` ascending.
/// Items with an unparseable timestamp are skipped and reported rather than
/// failing the whole feed.
#[must_use]
pub fn rank_trending_with_policy<'a, T: Engagement>(
    items: &'a [T],
    now: DateTime<Utc>,
    options: FeedOptions,
    policy: &TrendingPolicy,
) -> TrendingFeed<'a, T> {
    let mut ranked = Vec::new();
    let mut skipped = Vec::new();

    for item in items {
        let breakdown = match score_breakdown_with_policy(item, now, policy) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "excluding item from trending feed");
                skipped.push(item.content_id());
                continue;
            }
        };
        if !breakdown.score.is_finite() {
            tracing::warn!(
                id = %item.content_id(),
                score = breakdown.score,
                "excluding item with non-finite trending score"
            );
            skipped.push(item.content_id());
            continue;
        }
        if breakdown.score < options.min_score {
            continue;
        }
        ranked.push(RankedItem {
            item,
            score: breakdown.score,
            level: policy.level_for_score(breakdown.score),
            created_at: breakdown.created_at,
            content_id: item.content_id(),
        });
    }

    ranked.sort_by(compare_ranked);
    ranked.truncate(options.max_items);

    TrendingFeed {
        items: ranked,
        skipped,
    }
}

fn compare_ranked<T>(a: &RankedItem<'_, T>, b: &RankedItem<'_, T>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.content_id.cmp(&b.content_id))
}
