//! Home feed assembly: recent posts grouped by event, plus active and upcoming events.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{Event, Post};

/// How far ahead an event may start and still count as upcoming.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;
pub const MAX_UPCOMING_EVENTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct HomeFeed {
    /// All posts, newest first.
    pub posts: Vec<Post>,
    /// Posts attached to an event, newest first within each event.
    pub by_event: BTreeMap<Uuid, Vec<Post>>,
    pub without_event: Vec<Post>,
    pub active_events: Vec<Event>,
    pub upcoming_events: Vec<Event>,
}

#[must_use]
pub fn build_home_feed(mut posts: Vec<Post>, events: Vec<Event>, now: DateTime<Utc>) -> HomeFeed {
    sort_newest_first(&mut posts);

    let mut by_event: BTreeMap<Uuid, Vec<Post>> = BTreeMap::new();
    let mut without_event = Vec::new();
    for post in &posts {
        match post.event_id {
            Some(event_id) => by_event.entry(event_id).or_default().push(post.clone()),
            None => without_event.push(post.clone()),
        }
    }

    let horizon = now + Duration::days(UPCOMING_WINDOW_DAYS);
    let mut active_events = Vec::new();
    let mut upcoming_events = Vec::new();
    for event in events {
        let start = event.time_range.start;
        if event.is_active(now) {
            active_events.push(event);
        } else if start > now && start <= horizon {
            upcoming_events.push(event);
        }
    }
    active_events.sort_by_key(|e| e.time_range.end);
    upcoming_events.sort_by_key(|e| e.time_range.start);
    upcoming_events.truncate(MAX_UPCOMING_EVENTS);

    HomeFeed {
        posts,
        by_event,
        without_event,
        active_events,
        upcoming_events,
    }
}

/// Newest `created_at` first; id breaks ties so the order is stable across calls.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
