use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{Event, EventVenue, Participant, TimeRange};
use crate::posts::{normalize_tags, Comment, GeoLocation, Post};
use crate::ConfigError;

/// Namespace for the deterministic v5 ids derived from seed keys, so that
/// re-seeding upserts the same rows instead of duplicating them.
const SEED_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_0a52_4c3e_4b8e_9a57_2f43_e0c1_b7d4);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEvent {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub venue: String,
    #[serde(default)]
    pub address: String,
    /// Start relative to load time; negative means the event already started.
    pub starts_in_hours: f64,
    pub duration_hours: f64,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedComment {
    pub user_id: String,
    pub user_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPost {
    pub key: String,
    pub user_id: String,
    pub user_name: String,
    pub user_photo_url: Option<String>,
    #[serde(default)]
    pub text: String,
    pub image_url: Option<String>,
    /// Key of a [`SeedEvent`] in the same file.
    pub event: Option<String>,
    pub age_hours: f64,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<SeedComment>,
    #[serde(default)]
    pub views: u64,
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Demo content loaded from YAML. Times are relative so the data stays fresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub events: Vec<SeedEvent>,
    #[serde(default)]
    pub posts: Vec<SeedPost>,
}

impl SeedFile {
    /// Materialize the seed entries as records anchored at `now`.
    ///
    /// Event `post_count` reflects the seeded posts that reference it.
    #[must_use]
    pub fn into_records(self, now: DateTime<Utc>) -> (Vec<Event>, Vec<Post>) {
        let mut events: Vec<Event> = self
            .events
            .into_iter()
            .map(|e| {
                let start = now + hours(e.starts_in_hours);
                Event {
                    id: seed_id("event", &e.key),
                    name: e.name.trim().to_string(),
                    description: e.description,
                    location: EventVenue {
                        venue: e.venue,
                        address: e.address,
                    },
                    time_range: TimeRange {
                        start,
                        end: start + hours(e.duration_hours),
                    },
                    cover_image: e.cover_image,
                    participants: e.participants,
                    post_count: 0,
                    created_by: None,
                    created_at: now,
                    updated_at: None,
                    views: e.views,
                }
            })
            .collect();

        let event_index: HashMap<Uuid, usize> =
            events.iter().enumerate().map(|(i, e)| (e.id, i)).collect();

        let posts = self
            .posts
            .into_iter()
            .map(|p| {
                let created_at = now - hours(p.age_hours);
                let event_id = p.event.as_deref().map(|key| seed_id("event", key));
                let event_name = event_id
                    .and_then(|id| event_index.get(&id))
                    .map(|&i| {
                        events[i].post_count += 1;
                        events[i].name.clone()
                    });
                let comments = p
                    .comments
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| Comment {
                        id: seed_id("comment", &format!("{}#{i}", p.key)),
                        user_id: c.user_id,
                        user_name: c.user_name,
                        text: c.text.trim().to_string(),
                        created_at,
                    })
                    .collect();
                Post {
                    id: seed_id("post", &p.key),
                    user_id: p.user_id,
                    user_name: p.user_name,
                    user_photo_url: p.user_photo_url,
                    text: p.text.trim().to_string(),
                    image_url: p.image_url,
                    likes: p.likes.into_iter().collect::<BTreeSet<_>>(),
                    comments,
                    created_at,
                    updated_at: None,
                    location: p.location,
                    device_orientation: None,
                    event_id,
                    event_name,
                    contextual_tags: normalize_tags(p.tags),
                    capture_timestamp: Some(created_at),
                    views: p.views,
                }
            })
            .collect();

        (events, posts)
    }
}

/// Load and validate demo content from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_seed_file(path: &Path) -> Result<SeedFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let seed: SeedFile = serde_yaml::from_str(&content).map_err(ConfigError::SeedFileParse)?;

    validate_seed(&seed)?;

    Ok(seed)
}

fn validate_seed(seed: &SeedFile) -> Result<(), ConfigError> {
    let mut event_keys = HashSet::new();
    for event in &seed.events {
        if event.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "event key must be non-empty".to_string(),
            ));
        }
        if !event_keys.insert(event.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate event key: '{}'",
                event.key
            )));
        }
        let name_len = event.name.trim().chars().count();
        if name_len == 0 || name_len > 200 {
            return Err(ConfigError::Validation(format!(
                "event '{}' name must be 1-200 characters",
                event.key
            )));
        }
        if !event.starts_in_hours.is_finite()
            || !event.duration_hours.is_finite()
            || event.duration_hours < 0.0
        {
            return Err(ConfigError::Validation(format!(
                "event '{}' has an invalid time range",
                event.key
            )));
        }
    }

    let mut post_keys = HashSet::new();
    for post in &seed.posts {
        if post.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "post key must be non-empty".to_string(),
            ));
        }
        if !post_keys.insert(post.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate post key: '{}'",
                post.key
            )));
        }
        if post.user_id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "post '{}' has an empty user_id",
                post.key
            )));
        }
        let has_image = post
            .image_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        if post.text.trim().is_empty() && !has_image {
            return Err(ConfigError::Validation(format!(
                "post '{}' needs text or an image",
                post.key
            )));
        }
        if !post.age_hours.is_finite() || post.age_hours < 0.0 {
            return Err(ConfigError::Validation(format!(
                "post '{}' age_hours must be a non-negative number",
                post.key
            )));
        }
        if let Some(key) = &post.event {
            if !event_keys.contains(key.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "post '{}' references unknown event '{key}'",
                    post.key
                )));
            }
        }
        if let Some(location) = &post.location {
            location.validate().map_err(|e| {
                ConfigError::Validation(format!("post '{}': {e}", post.key))
            })?;
        }
    }

    Ok(())
}

fn seed_id(kind: &str, key: &str) -> Uuid {
    Uuid::new_v5(&SEED_NAMESPACE, format!("{kind}:{key}").as_bytes())
}

#[allow(clippy::cast_possible_truncation)]
fn hours(h: f64) -> Duration {
    Duration::seconds((h * 3600.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn event(key: &str) -> SeedEvent {
        SeedEvent {
            key: key.to_string(),
            name: format!("Event {key}"),
            description: String::new(),
            venue: "Pier 39".to_string(),
            address: "San Francisco".to_string(),
            starts_in_hours: -1.0,
            duration_hours: 4.0,
            cover_image: None,
            participants: Vec::new(),
            views: 0,
        }
    }

    fn post(key: &str) -> SeedPost {
        SeedPost {
            key: key.to_string(),
            user_id: "u1".to_string(),
            user_name: "Ada".to_string(),
            user_photo_url: None,
            text: "hello".to_string(),
            image_url: None,
            event: None,
            age_hours: 2.0,
            likes: Vec::new(),
            comments: Vec::new(),
            views: 0,
            location: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn validate_rejects_duplicate_post_key() {
        let seed = SeedFile {
            events: Vec::new(),
            posts: vec![post("a"), post("a")],
        };
        let err = validate_seed(&seed).unwrap_err();
        assert!(err.to_string().contains("duplicate post key"));
    }

    #[test]
    fn validate_rejects_unknown_event_reference() {
        let mut p = post("a");
        p.event = Some("missing".to_string());
        let seed = SeedFile {
            events: vec![event("fest")],
            posts: vec![p],
        };
        let err = validate_seed(&seed).unwrap_err();
        assert!(err.to_string().contains("unknown event 'missing'"));
    }

    #[test]
    fn validate_rejects_post_without_text_or_image() {
        let mut p = post("a");
        p.text = "   ".to_string();
        let seed = SeedFile {
            events: Vec::new(),
            posts: vec![p],
        };
        let err = validate_seed(&seed).unwrap_err();
        assert!(err.to_string().contains("needs text or an image"));
    }

    #[test]
    fn validate_accepts_image_only_post() {
        let mut p = post("a");
        p.text = String::new();
        p.image_url = Some("https://img.example/1.jpg".to_string());
        let seed = SeedFile {
            events: Vec::new(),
            posts: vec![p],
        };
        assert!(validate_seed(&seed).is_ok());
    }

    #[test]
    fn validate_rejects_negative_duration() {
        let mut e = event("fest");
        e.duration_hours = -3.0;
        let seed = SeedFile {
            events: vec![e],
            posts: Vec::new(),
        };
        let err = validate_seed(&seed).unwrap_err();
        assert!(err.to_string().contains("invalid time range"));
    }

    #[test]
    fn into_records_links_posts_to_events() {
        let mut p = post("a");
        p.event = Some("fest".to_string());
        p.likes = vec!["u2".to_string(), "u2".to_string(), "u3".to_string()];
        p.comments = vec![SeedComment {
            user_id: "u4".to_string(),
            user_name: "Grace".to_string(),
            text: " nice ".to_string(),
        }];
        let seed = SeedFile {
            events: vec![event("fest")],
            posts: vec![p, post("b")],
        };

        let (events, posts) = seed.into_records(now());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].post_count, 1);
        assert_eq!(events[0].time_range.start, now() - Duration::hours(1));
        assert_eq!(events[0].time_range.end, now() + Duration::hours(3));

        let linked = &posts[0];
        assert_eq!(linked.event_id, Some(events[0].id));
        assert_eq!(linked.event_name.as_deref(), Some("Event fest"));
        assert_eq!(linked.likes.len(), 2);
        assert_eq!(linked.comments[0].text, "nice");
        assert_eq!(linked.created_at, now() - Duration::hours(2));
        assert!(posts[1].event_id.is_none());
    }

    #[test]
    fn into_records_ids_are_stable() {
        let seed = SeedFile {
            events: vec![event("fest")],
            posts: vec![post("a")],
        };
        let (e1, p1) = seed.clone().into_records(now());
        let (e2, p2) = seed.into_records(now() + Duration::days(1));
        assert_eq!(e1[0].id, e2[0].id);
        assert_eq!(p1[0].id, p2[0].id);
        assert_ne!(e1[0].id, p1[0].id);
    }

    #[test]
    fn load_seed_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("seed.yaml");
        assert!(
            path.exists(),
            "seed.yaml missing at {path:?}; required for this test"
        );
        let result = load_seed_file(&path);
        assert!(result.is_ok(), "failed to load seed.yaml: {result:?}");
        let seed = result.unwrap();
        assert!(!seed.events.is_empty());
        assert!(!seed.posts.is_empty());
    }

    #[test]
    fn load_seed_missing_file_is_io_error() {
        let result = load_seed_file(Path::new("/definitely/not/here.yaml"));
        assert!(matches!(result, Err(ConfigError::SeedFileIo { .. })));
    }
}
