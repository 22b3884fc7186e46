use chrono::{Duration, TimeZone};

use super::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn item(likes: usize, comments: usize, views: Option<u64>, created_at: DateTime<Utc>) -> ContentItem {
    ContentItem {
        id: "post-1".to_string(),
        likes: (0..likes).map(|i| format!("user-{i}")).collect(),
        comments: (0..comments).map(|i| serde_json::json!({ "id": i })).collect(),
        created_at: created_at.to_rfc3339(),
        views,
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn ten_likes_created_now_is_popular() {
    let post = item(10, 0, None, now());
    let score = compute_trending_score(&post, now()).unwrap();
    assert!(approx_eq(score, 10.0), "score {score}");
    assert_eq!(trending_level(&post, now()).unwrap(), TrendingLevel::Popular);
}

#[test]
fn ten_likes_one_half_life_ago_lands_on_trending_edge() {
    let post = item(10, 0, Some(0), now() - Duration::hours(24));
    let score = compute_trending_score(&post, now()).unwrap();
    assert!(approx_eq(score, 5.0), "score {score}");
    assert_eq!(trending_level(&post, now()).unwrap(), TrendingLevel::Trending);
}

#[test]
fn five_comments_created_now_is_popular() {
    let post = item(0, 5, None, now());
    let score = compute_trending_score(&post, now()).unwrap();
    assert!(approx_eq(score, 10.0), "score {score}");
    assert_eq!(u8::from(trending_level(&post, now()).unwrap()), 2);
}

#[test]
fn month_old_post_decays_to_nothing() {
    let post = item(100, 0, None, now() - Duration::days(30));
    let score = compute_trending_score(&post, now()).unwrap();
    let expected = 100.0 * 0.5_f64.powi(30);
    assert!(approx_eq(score, expected), "score {score}, expected {expected}");
    assert!(score < 1e-7);
    assert_eq!(trending_level(&post, now()).unwrap(), TrendingLevel::None);
}

#[test]
fn future_timestamp_is_clamped_to_zero_age() {
    let post = item(3, 1, Some(10), now() + Duration::hours(1));
    let breakdown = score_breakdown_with_policy(&post, now(), &TrendingPolicy::default()).unwrap();
    assert_eq!(breakdown.age_hours, 0.0);
    assert_eq!(breakdown.time_decay_factor, 1.0);
    assert!(approx_eq(breakdown.score, 3.0 + 2.0 + 1.0));
}

#[test]
fn views_are_weighted_lightly() {
    let post = item(0, 0, Some(50), now());
    assert!(approx_eq(compute_trending_score(&post, now()).unwrap(), 5.0));
}

#[test]
fn unparseable_timestamp_fails_fast() {
    let mut post = item(10, 0, None, now());
    post.created_at = "yesterday-ish".to_string();
    let err = compute_trending_score(&post, now()).unwrap_err();
    assert_eq!(
        err,
        TrendingError::InvalidTimestamp {
            id: "post-1".to_string(),
            value: "yesterday-ish".to_string(),
        }
    );
    assert!(trending_level(&post, now()).is_err());
    assert!(is_trending_default(&post, now()).is_err());
}

#[test]
fn timestamp_with_offset_is_normalized_to_utc() {
    let mut post = item(4, 0, None, now());
    post.created_at = "2024-06-01T14:00:00+02:00".to_string();
    let breakdown = score_breakdown_with_policy(&post, now(), &TrendingPolicy::default()).unwrap();
    assert_eq!(breakdown.age_hours, 0.0);
}

#[test]
fn duplicate_likes_count_once() {
    let mut post = item(0, 0, None, now());
    post.likes = vec!["a".to_string(), "b".to_string(), "a".to_string()];
    assert_eq!(post.like_count(), 2);
    assert!(approx_eq(compute_trending_score(&post, now()).unwrap(), 2.0));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn score_strictly_decreases_with_age() {
    let mut previous = f64::INFINITY;
    for hours in [0, 1, 6, 12, 24, 48, 96, 240] {
        let post = item(7, 3, Some(20), now() - Duration::hours(hours));
        let score = compute_trending_score(&post, now()).unwrap();
        assert!(score < previous, "score at {hours}h ({score}) not below {previous}");
        previous = score;
    }
}

#[test]
fn score_halves_every_half_life() {
    for (likes, comments, views) in [(1, 0, None), (10, 4, Some(33)), (250, 90, Some(10_000))] {
        let fresh = compute_trending_score(&item(likes, comments, views, now()), now()).unwrap();
        let day_old =
            compute_trending_score(&item(likes, comments, views, now() - Duration::hours(24)), now())
                .unwrap();
        let relative_error = ((day_old - fresh * 0.5) / (fresh * 0.5)).abs();
        assert!(relative_error < 1e-9, "relative error {relative_error}");
    }
}

#[test]
fn zero_engagement_scores_zero_at_any_age() {
    for hours in [0, 5, 24, 1_000] {
        let created = now() - Duration::hours(hours);
        assert_eq!(compute_trending_score(&item(0, 0, None, created), now()).unwrap(), 0.0);
        assert_eq!(compute_trending_score(&item(0, 0, Some(0), created), now()).unwrap(), 0.0);
    }
}

#[test]
fn score_is_never_negative() {
    for hours in [-48, -1, 0, 1, 24, 10_000] {
        let post = item(2, 1, Some(3), now() - Duration::hours(hours));
        assert!(compute_trending_score(&post, now()).unwrap() >= 0.0);
    }
}

#[test]
fn extra_comment_and_like_add_exact_decayed_weight() {
    let created = now() - Duration::hours(30);
    let policy = TrendingPolicy::default();
    let base = score_breakdown_with_policy(&item(4, 2, Some(7), created), now(), &policy).unwrap();
    let with_comment =
        compute_trending_score(&item(4, 3, Some(7), created), now()).unwrap();
    let with_like = compute_trending_score(&item(5, 2, Some(7), created), now()).unwrap();

    assert!(approx_eq(with_comment - base.score, 2.0 * base.time_decay_factor));
    assert!(approx_eq(with_like - base.score, 1.0 * base.time_decay_factor));
}

#[test]
fn level_boundaries_are_inclusive_lower_bounds() {
    let policy = TrendingPolicy::default();
    assert_eq!(policy.level_for_score(0.0), TrendingLevel::None);
    assert_eq!(policy.level_for_score(4.999_999), TrendingLevel::None);
    assert_eq!(policy.level_for_score(5.0), TrendingLevel::Trending);
    assert_eq!(policy.level_for_score(9.999_999), TrendingLevel::Trending);
    assert_eq!(policy.level_for_score(10.0), TrendingLevel::Popular);
    assert_eq!(policy.level_for_score(19.999_999), TrendingLevel::Popular);
    assert_eq!(policy.level_for_score(20.0), TrendingLevel::Hot);
    assert_eq!(policy.level_for_score(1e9), TrendingLevel::Hot);
}

#[test]
fn default_threshold_matches_score_comparison() {
    for (likes, hours) in [(4, 0), (5, 0), (6, 0), (10, 24), (10, 25), (40, 72)] {
        let post = item(likes, 0, None, now() - Duration::hours(hours));
        let score = compute_trending_score(&post, now()).unwrap();
        assert_eq!(is_trending_default(&post, now()).unwrap(), score >= 5.0);
    }
}

#[test]
fn custom_threshold_is_respected() {
    let post = item(8, 0, None, now());
    assert!(is_trending(&post, now(), 8.0).unwrap());
    assert!(!is_trending(&post, now(), 8.5).unwrap());
}

#[test]
fn level_labels_and_numbers() {
    let cases = [
        (TrendingLevel::None, 0, ""),
        (TrendingLevel::Trending, 1, "Trending"),
        (TrendingLevel::Popular, 2, "Popular"),
        (TrendingLevel::Hot, 3, "Hot"),
    ];
    for (level, number, label) in cases {
        assert_eq!(u8::from(level), number);
        assert_eq!(level.label(), label);
    }
}

#[test]
fn custom_half_life_changes_decay() {
    let policy = TrendingPolicy {
        half_life_hours: 12.0,
        ..TrendingPolicy::default()
    };
    let post = item(8, 0, None, now() - Duration::hours(12));
    let score = compute_trending_score_with_policy(&post, now(), &policy).unwrap();
    assert!(approx_eq(score, 4.0));
}

#[test]
fn event_engagement_counts_participants_and_posts() {
    use crate::{EventVenue, Participant, TimeRange};
    use uuid::Uuid;

    let event = Event {
        id: Uuid::new_v4(),
        name: "Tech Conference".to_string(),
        description: String::new(),
        location: EventVenue {
            venue: "Convention Center".to_string(),
            address: "123 Tech Blvd".to_string(),
        },
        time_range: TimeRange {
            start: now(),
            end: now() + Duration::days(1),
        },
        cover_image: None,
        participants: vec![
            Participant {
                id: "a".to_string(),
                name: "A".to_string(),
                photo_url: None,
            },
            Participant {
                id: "a".to_string(),
                name: "A again".to_string(),
                photo_url: None,
            },
        ],
        post_count: 3,
        created_by: None,
        created_at: now(),
        updated_at: None,
        views: 10,
    };
    // 1 participant + 3 posts * 2 + 10 views * 0.1
    assert!(approx_eq(compute_trending_score(&event, now()).unwrap(), 8.0));
}

#[test]
fn date_only_timestamp_reads_as_utc_midnight() {
    let mut post = item(1, 0, None, now());
    post.created_at = "2024-06-01".to_string();
    let breakdown = score_breakdown_with_policy(&post, now(), &TrendingPolicy::default()).unwrap();
    assert_eq!(
        breakdown.created_at,
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    );
    assert!(approx_eq(breakdown.age_hours, 12.0));
}

#[test]
fn datetime_without_offset_is_rejected() {
    let mut post = item(1, 0, None, now());
    post.created_at = "2024-06-01T10:00:00".to_string();
    assert!(matches!(
        compute_trending_score(&post, now()),
        Err(TrendingError::InvalidTimestamp { .. })
    ));
}

#[test]
fn decay_underflows_to_zero_after_about_three_years() {
    let policy = TrendingPolicy::default();
    assert!(policy.time_decay_factor(24.0 * 1000.0) > 0.0);
    assert_eq!(policy.time_decay_factor(24.0 * 1100.0), 0.0);

    let ancient = item(10, 0, None, now() - Duration::days(1100));
    assert_eq!(compute_trending_score(&ancient, now()).unwrap(), 0.0);
}

#[test]
fn with_policy_threshold_uses_policy_weights() {
    let post = item(3, 0, None, now());
    let doubled = TrendingPolicy {
        like_weight: 2.0,
        ..TrendingPolicy::default()
    };
    assert!(!is_trending(&post, now(), 5.0).unwrap());
    assert!(is_trending_with_policy(&post, now(), 5.0, &doubled).unwrap());
}

#[test]
fn default_policy_is_valid() {
    assert!(TrendingPolicy::default().validate().is_ok());
}

#[test]
fn policy_rejects_non_positive_half_life() {
    for half_life_hours in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let policy = TrendingPolicy {
            half_life_hours,
            ..TrendingPolicy::default()
        };
        assert!(
            matches!(policy.validate(), Err(TrendingError::InvalidPolicy(_))),
            "half-life {half_life_hours} should be rejected"
        );
    }
}

#[test]
fn policy_rejects_negative_or_nan_weights() {
    let negative = TrendingPolicy {
        comment_weight: -2.0,
        ..TrendingPolicy::default()
    };
    let nan = TrendingPolicy {
        view_weight: f64::NAN,
        ..TrendingPolicy::default()
    };
    assert!(matches!(negative.validate(), Err(TrendingError::InvalidPolicy(_))));
    assert!(matches!(nan.validate(), Err(TrendingError::InvalidPolicy(_))));
}

#[test]
fn policy_rejects_descending_breakpoints() {
    let policy = TrendingPolicy {
        popular_breakpoint: 30.0,
        hot_breakpoint: 20.0,
        ..TrendingPolicy::default()
    };
    assert!(matches!(policy.validate(), Err(TrendingError::InvalidPolicy(_))));
}
