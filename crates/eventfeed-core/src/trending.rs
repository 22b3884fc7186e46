//! Trending score engine.
//!
//! A content item's score is its weighted engagement (likes, comments, views)
//! multiplied by an exponential time decay with a fixed half-life:
//!
//! ```text
//! score = (likes * 1.0 + comments * 2.0 + views * 0.1) * 0.5 ^ (age_hours / 24)
//! ```
//!
//! The score is discretized into a [`TrendingLevel`] for badge treatment.
//! Everything here is pure: the reference instant `now` is always passed in.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Event, Post};

pub const LIKE_WEIGHT: f64 = 1.0;
pub const COMMENT_WEIGHT: f64 = 2.0;
pub const VIEW_WEIGHT: f64 = 0.1;
pub const HALF_LIFE_HOURS: f64 = 24.0;

/// Default cutoff for [`is_trending_default`].
pub const DEFAULT_TRENDING_THRESHOLD: f64 = 5.0;

/// Lowest score that earns [`TrendingLevel::Trending`].
pub const TRENDING_BREAKPOINT: f64 = 5.0;
/// Lowest score that earns [`TrendingLevel::Popular`].
pub const POPULAR_BREAKPOINT: f64 = 10.0;
/// Lowest score that earns [`TrendingLevel::Hot`].
pub const HOT_BREAKPOINT: f64 = 20.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrendingError {
    #[error("item '{id}' has an unparseable created_at timestamp: {value:?}")]
    InvalidTimestamp { id: String, value: String },

    #[error("invalid trending policy: {0}")]
    InvalidPolicy(String),
}

/// Read-only view of the engagement counters the engine needs.
pub trait Engagement {
    /// Stable identifier, used for logging and as the final ranking tie-break.
    fn content_id(&self) -> String;
    fn like_count(&self) -> usize;
    fn comment_count(&self) -> usize;
    fn view_count(&self) -> u64;
    /// Creation instant.
    ///
    /// # Errors
    ///
    /// Returns [`TrendingError::InvalidTimestamp`] if the stored value does not parse.
    fn created_at(&self) -> Result<DateTime<Utc>, TrendingError>;
}

/// Tunable scoring constants. `Default` is the production policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendingPolicy {
    pub like_weight: f64,
    pub comment_weight: f64,
    pub view_weight: f64,
    pub half_life_hours: f64,
    pub trending_breakpoint: f64,
    pub popular_breakpoint: f64,
    pub hot_breakpoint: f64,
}

impl Default for TrendingPolicy {
    fn default() -> Self {
        Self {
            like_weight: LIKE_WEIGHT,
            comment_weight: COMMENT_WEIGHT,
            view_weight: VIEW_WEIGHT,
            half_life_hours: HALF_LIFE_HOURS,
            trending_breakpoint: TRENDING_BREAKPOINT,
            popular_breakpoint: POPULAR_BREAKPOINT,
            hot_breakpoint: HOT_BREAKPOINT,
        }
    }
}

impl TrendingPolicy {
    /// Check that the policy yields finite, non-negative scores and ordered levels.
    ///
    /// # Errors
    ///
    /// Returns [`TrendingError::InvalidPolicy`] if a weight is negative or not
    /// finite, the half-life is not a positive finite number, or the
    /// breakpoints are not finite and non-decreasing.
    pub fn validate(&self) -> Result<(), TrendingError> {
        for (name, weight) in [
            ("like_weight", self.like_weight),
            ("comment_weight", self.comment_weight),
            ("view_weight", self.view_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(TrendingError::InvalidPolicy(format!(
                    "{name} must be a finite non-negative number, got {weight}"
                )));
            }
        }
        if !self.half_life_hours.is_finite() || self.half_life_hours <= 0.0 {
            return Err(TrendingError::InvalidPolicy(format!(
                "half_life_hours must be greater than zero, got {}",
                self.half_life_hours
            )));
        }
        let breakpoints = [
            self.trending_breakpoint,
            self.popular_breakpoint,
            self.hot_breakpoint,
        ];
        if breakpoints.iter().any(|b| !b.is_finite())
            || breakpoints.windows(2).any(|pair| pair[0] > pair[1])
        {
            return Err(TrendingError::InvalidPolicy(format!(
                "breakpoints must be finite and ascending, got {breakpoints:?}"
            )));
        }
        Ok(())
    }

    /// Decay multiplier for an item of the given (already clamped) age.
    ///
    /// `f64` underflows to exactly `0.0` after roughly 1075 half-lives (about
    /// three years at the default 24 h), so very old items score zero even
    /// with engagement.
    #[must_use]
    pub fn time_decay_factor(&self, age_hours: f64) -> f64 {
        0.5_f64.powf(age_hours / self.half_life_hours)
    }

    #[must_use]
    pub fn level_for_score(&self, score: f64) -> TrendingLevel {
        if score < self.trending_breakpoint {
            TrendingLevel::None
        } else if score < self.popular_breakpoint {
            TrendingLevel::Trending
        } else if score < self.hot_breakpoint {
            TrendingLevel::Popular
        } else {
            TrendingLevel::Hot
        }
    }
}

/// Four-tier discretization of a trending score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingLevel {
    None,
    Trending,
    Popular,
    Hot,
}

impl TrendingLevel {
    /// Badge text; empty for [`TrendingLevel::None`].
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TrendingLevel::None => "",
            TrendingLevel::Trending => "Trending",
            TrendingLevel::Popular => "Popular",
            TrendingLevel::Hot => "Hot",
        }
    }
}

impl From<TrendingLevel> for u8 {
    fn from(level: TrendingLevel) -> Self {
        match level {
            TrendingLevel::None => 0,
            TrendingLevel::Trending => 1,
            TrendingLevel::Popular => 2,
            TrendingLevel::Hot => 3,
        }
    }
}

impl std::fmt::Display for TrendingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Every intermediate of the score computation, for reporting and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub created_at: DateTime<Utc>,
    pub age_hours: f64,
    pub likes_score: f64,
    pub comments_score: f64,
    pub views_score: f64,
    pub engagement_score: f64,
    pub time_decay_factor: f64,
    pub score: f64,
}

/// Compute the full score breakdown under `policy`.
///
/// A `created_at` later than `now` is treated as age zero.
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
#[allow(clippy::cast_precision_loss)] // counters far below 2^52 in practice
pub fn score_breakdown_with_policy<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
    policy: &TrendingPolicy,
) -> Result<ScoreBreakdown, TrendingError> {
    let created_at = item.created_at()?;
    let age_millis = now.signed_duration_since(created_at).num_milliseconds();
    let age_hours = (age_millis as f64 / MILLIS_PER_HOUR).max(0.0);

    let likes_score = item.like_count() as f64 * policy.like_weight;
    let comments_score = item.comment_count() as f64 * policy.comment_weight;
    let views_score = item.view_count() as f64 * policy.view_weight;
    let engagement_score = likes_score + comments_score + views_score;

    let time_decay_factor = policy.time_decay_factor(age_hours);

    Ok(ScoreBreakdown {
        created_at,
        age_hours,
        likes_score,
        comments_score,
        views_score,
        engagement_score,
        time_decay_factor,
        score: engagement_score * time_decay_factor,
    })
}

/// Trending score under `policy`.
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
pub fn compute_trending_score_with_policy<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
    policy: &TrendingPolicy,
) -> Result<f64, TrendingError> {
    score_breakdown_with_policy(item, now, policy).map(|b| b.score)
}

/// Trending score under the default policy.
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
pub fn compute_trending_score<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
) -> Result<f64, TrendingError> {
    compute_trending_score_with_policy(item, now, &TrendingPolicy::default())
}

/// `true` when the item's score reaches `threshold`.
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
pub fn is_trending<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
    threshold: f64,
) -> Result<bool, TrendingError> {
    is_trending_with_policy(item, now, threshold, &TrendingPolicy::default())
}

/// `true` when the item's score under `policy` reaches `threshold`.
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
pub fn is_trending_with_policy<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
    threshold: f64,
    policy: &TrendingPolicy,
) -> Result<bool, TrendingError> {
    Ok(compute_trending_score_with_policy(item, now, policy)? >= threshold)
}

/// [`is_trending`] with [`DEFAULT_TRENDING_THRESHOLD`].
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
pub fn is_trending_default<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
) -> Result<bool, TrendingError> {
    is_trending(item, now, DEFAULT_TRENDING_THRESHOLD)
}

/// Trending level under `policy`.
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
pub fn trending_level_with_policy<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
    policy: &TrendingPolicy,
) -> Result<TrendingLevel, TrendingError> {
    let score = compute_trending_score_with_policy(item, now, policy)?;
    Ok(policy.level_for_score(score))
}

/// Trending level under the default policy.
///
/// # Errors
///
/// Returns [`TrendingError::InvalidTimestamp`] if the item's timestamp does not parse.
pub fn trending_level<T: Engagement + ?Sized>(
    item: &T,
    now: DateTime<Utc>,
) -> Result<TrendingLevel, TrendingError> {
    trending_level_with_policy(item, now, &TrendingPolicy::default())
}

/// A content document as it arrives from an export or client: timestamp as a
/// string, likes as a plain list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<serde_json::Value>,
    pub created_at: String,
    pub views: Option<u64>,
}

impl Engagement for ContentItem {
    fn content_id(&self) -> String {
        self.id.clone()
    }

    /// Counts distinct user ids; upstream lists may contain duplicates.
    fn like_count(&self) -> usize {
        self.likes.iter().map(String::as_str).collect::<HashSet<_>>().len()
    }

    fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn view_count(&self) -> u64 {
        self.views.unwrap_or(0)
    }

    /// Accepts RFC 3339 date-times and bare `YYYY-MM-DD` dates (read as UTC
    /// midnight). Date-times without an offset, week dates and ordinal dates
    /// are rejected.
    fn created_at(&self) -> Result<DateTime<Utc>, TrendingError> {
        let raw = self.created_at.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| TrendingError::InvalidTimestamp {
                id: self.id.clone(),
                value: self.created_at.clone(),
            })
    }
}

impl Engagement for Post {
    fn content_id(&self) -> String {
        self.id.to_string()
    }

    fn like_count(&self) -> usize {
        self.likes.len()
    }

    fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn view_count(&self) -> u64 {
        self.views
    }

    fn created_at(&self) -> Result<DateTime<Utc>, TrendingError> {
        Ok(self.created_at)
    }
}

/// Events count distinct participants as likes and attached posts as
/// comments.
impl Engagement for Event {
    fn content_id(&self) -> String {
        self.id.to_string()
    }

    fn like_count(&self) -> usize {
        self.participants
            .iter()
            .map(|p| p.id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    fn comment_count(&self) -> usize {
        usize::try_from(self.post_count).unwrap_or(usize::MAX)
    }

    fn view_count(&self) -> u64 {
        self.views
    }

    fn created_at(&self) -> Result<DateTime<Utc>, TrendingError> {
        Ok(self.created_at)
    }
}

#[cfg(test)]
#[path = "trending_test.rs"]
mod tests;
