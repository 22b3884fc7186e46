//! Time-bucketed heatmap timeline for an event's geotagged posts.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::Post;

pub const DEFAULT_BUCKET_COUNT: usize = 20;
pub const MAX_BUCKET_COUNT: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapPoint {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl HeatmapPoint {
    /// Points for every post that carries a location. Posts without one are ignored.
    #[must_use]
    pub fn from_posts(posts: &[Post]) -> Vec<Self> {
        posts
            .iter()
            .filter_map(|post| {
                post.location.map(|loc| HeatmapPoint {
                    id: post.id.to_string(),
                    latitude: loc.latitude,
                    longitude: loc.longitude,
                    timestamp: post.timeline_timestamp(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapBucket {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub points: Vec<HeatmapPoint>,
}

impl HeatmapBucket {
    /// GeoJSON `FeatureCollection` of the bucket's points, ready for a map source.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .points
            .iter()
            .map(|p| {
                json!({
                    "type": "Feature",
                    "properties": { "id": p.id, "timestamp": p.timestamp },
                    "geometry": {
                        "type": "Point",
                        "coordinates": [p.longitude, p.latitude],
                    },
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapTimeline {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub buckets: Vec<HeatmapBucket>,
}

impl HeatmapTimeline {
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.buckets.iter().map(|b| b.points.len()).sum()
    }
}

/// Split `points` into `bucket_count` equal-width time buckets spanning the
/// first to the last timestamp.
///
/// A point's bucket is `floor((t - start) / width)`, capped at the last bucket
/// so the final point lands inside. When every point shares one timestamp
/// they all go to bucket 0. No points means no buckets. `bucket_count` is
/// clamped to `1..=MAX_BUCKET_COUNT`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn build_timeline(mut points: Vec<HeatmapPoint>, bucket_count: usize) -> HeatmapTimeline {
    let (Some(first), Some(last)) = (
        points.iter().map(|p| p.timestamp).min(),
        points.iter().map(|p| p.timestamp).max(),
    ) else {
        return HeatmapTimeline {
            start: None,
            end: None,
            buckets: Vec::new(),
        };
    };

    let count = bucket_count.clamp(1, MAX_BUCKET_COUNT);
    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let span_ms = (last - first).num_milliseconds() as f64;
    let width_ms = span_ms / count as f64;

    let mut buckets: Vec<HeatmapBucket> = (0..count)
        .map(|index| {
            let start = first + Duration::milliseconds((width_ms * index as f64) as i64);
            let end = if index + 1 == count {
                last
            } else {
                first + Duration::milliseconds((width_ms * (index + 1) as f64) as i64)
            };
            HeatmapBucket {
                index,
                start,
                end,
                points: Vec::new(),
            }
        })
        .collect();

    for point in points {
        let index = if width_ms > 0.0 {
            let offset = (point.timestamp - first).num_milliseconds() as f64;
            ((offset / width_ms).floor() as usize).min(count - 1)
        } else {
            0
        };
        buckets[index].points.push(point);
    }

    HeatmapTimeline {
        start: Some(first),
        end: Some(last),
        buckets,
    }
}
