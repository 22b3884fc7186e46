//! Process-local [`ContentStore`] backed by hash maps.
//!
//! Used for development, demos and the server's route tests. Every operation
//! takes the single lock for its whole duration, so multi-record updates
//! (post counts, renames) are atomic with respect to other callers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use eventfeed_core::home::sort_newest_first;
use eventfeed_core::{
    Clock, Event, EventUpdate, NewComment, NewEvent, NewPost, Post, PostUpdate, ProfileUpdate,
    UserProfile,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{validate_user_id, ContentStore, PostFilter};
use crate::DbError;

#[derive(Default)]
struct Tables {
    posts: HashMap<Uuid, Post>,
    events: HashMap<Uuid, Event>,
    profiles: HashMap<String, UserProfile>,
}

impl Tables {
    fn post_mut(&mut self, id: Uuid) -> Result<&mut Post, DbError> {
        self.posts
            .get_mut(&id)
            .ok_or_else(|| DbError::post_not_found(id))
    }

    fn event_mut(&mut self, id: Uuid) -> Result<&mut Event, DbError> {
        self.events
            .get_mut(&id)
            .ok_or_else(|| DbError::event_not_found(id))
    }

    /// Reset `post_count` of the given events to the number of attached posts.
    fn recount_posts(&mut self, event_ids: &HashSet<Uuid>) {
        let mut counts: HashMap<Uuid, u64> = HashMap::new();
        for event_id in self.posts.values().filter_map(|p| p.event_id) {
            if event_ids.contains(&event_id) {
                *counts.entry(event_id).or_default() += 1;
            }
        }
        for id in event_ids {
            if let Some(event) = self.events.get_mut(id) {
                event.post_count = counts.get(id).copied().unwrap_or(0);
            }
        }
    }

    fn release_event_slot(&mut self, event_id: Option<Uuid>) {
        if let Some(event) = event_id.and_then(|id| self.events.get_mut(&id)) {
            event.post_count = event.post_count.saturating_sub(1);
        }
    }
}

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: RwLock::new(Tables::default()),
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn create_post(&self, new: NewPost) -> Result<Post, DbError> {
        new.validate()?;
        let now = self.clock.now();
        let mut tables = self.tables.write().await;

        let mut post = Post::from_new(new, Uuid::new_v4(), now);
        if let Some(event_id) = post.event_id {
            let event = tables.event_mut(event_id)?;
            event.post_count += 1;
            if post.event_name.is_none() {
                post.event_name = Some(event.name.clone());
            }
        }
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, DbError> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_newest_first(&mut posts);
        if let Some(limit) = filter.limit {
            posts.truncate(limit);
        }
        Ok(posts)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, DbError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn update_post(&self, id: Uuid, mut update: PostUpdate) -> Result<Post, DbError> {
        update.validate()?;
        let now = self.clock.now();
        let mut tables = self.tables.write().await;

        let old_event = tables.post_mut(id)?.event_id;
        let new_event = update.event_id.unwrap_or(old_event);
        if new_event != old_event {
            if let Some(event_id) = new_event {
                let event = tables.event_mut(event_id)?;
                event.post_count += 1;
                if update.event_name.is_none() {
                    update.event_name = Some(Some(event.name.clone()));
                }
            }
            tables.release_event_slot(old_event);
        }

        let post = tables.post_mut(id)?;
        post.apply_update(update, now);
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tables = self.tables.write().await;
        let Some(post) = tables.posts.remove(&id) else {
            return Ok(false);
        };
        tables.release_event_slot(post.event_id);
        Ok(true)
    }

    async fn like_post(&self, id: Uuid, user_id: &str) -> Result<Post, DbError> {
        validate_user_id(user_id)?;
        let mut tables = self.tables.write().await;
        let post = tables.post_mut(id)?;
        post.likes.insert(user_id.to_string());
        Ok(post.clone())
    }

    async fn unlike_post(&self, id: Uuid, user_id: &str) -> Result<Post, DbError> {
        validate_user_id(user_id)?;
        let mut tables = self.tables.write().await;
        let post = tables.post_mut(id)?;
        post.likes.remove(user_id);
        Ok(post.clone())
    }

    async fn add_comment(&self, id: Uuid, comment: NewComment) -> Result<Post, DbError> {
        comment.validate()?;
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        let post = tables.post_mut(id)?;
        post.comments.push(comment.into_comment(Uuid::new_v4(), now));
        Ok(post.clone())
    }

    async fn record_post_view(&self, id: Uuid) -> Result<Post, DbError> {
        let mut tables = self.tables.write().await;
        let post = tables.post_mut(id)?;
        post.views = post.views.saturating_add(1);
        Ok(post.clone())
    }

    async fn create_event(&self, new: NewEvent) -> Result<Event, DbError> {
        new.validate()?;
        let event = Event::from_new(new, Uuid::new_v4(), self.clock.now());
        self.tables
            .write()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(event)
    }

    async fn list_events(&self) -> Result<Vec<Event>, DbError> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables.events.values().cloned().collect();
        events.sort_by(|a, b| {
            a.time_range
                .start
                .cmp(&b.time_range.start)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, DbError> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> Result<Event, DbError> {
        update.validate()?;
        let now = self.clock.now();
        let mut tables = self.tables.write().await;

        let event = tables.event_mut(id)?;
        let old_name = event.name.clone();
        event.apply_update(update, now);
        let event = event.clone();

        if event.name != old_name {
            for post in tables.posts.values_mut() {
                if post.event_id == Some(id) {
                    post.event_name = Some(event.name.clone());
                }
            }
        }
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tables = self.tables.write().await;
        if tables.events.remove(&id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.event_id == Some(id) {
                post.event_id = None;
                post.event_name = None;
            }
        }
        Ok(true)
    }

    async fn record_event_view(&self, id: Uuid) -> Result<Event, DbError> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        event.views = event.views.saturating_add(1);
        Ok(event.clone())
    }

    async fn get_or_create_profile(&self, user_id: &str) -> Result<UserProfile, DbError> {
        validate_user_id(user_id)?;
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::default_for(user_id, now));
        Ok(profile.clone())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, DbError> {
        validate_user_id(user_id)?;
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::default_for(user_id, now));
        profile.merge(update);
        Ok(profile.clone())
    }

    async fn import_records(
        &self,
        events: Vec<Event>,
        posts: Vec<Post>,
    ) -> Result<usize, DbError> {
        let mut tables = self.tables.write().await;
        let dangling = posts.iter().filter_map(|p| p.event_id).find(|id| {
            !tables.events.contains_key(id) && !events.iter().any(|e| e.id == *id)
        });
        if let Some(event_id) = dangling {
            return Err(DbError::event_not_found(event_id));
        }

        let written = events.len() + posts.len();
        let mut touched: HashSet<Uuid> = events.iter().map(|e| e.id).collect();
        for post in &posts {
            touched.extend(post.event_id);
            touched.extend(tables.posts.get(&post.id).and_then(|old| old.event_id));
        }
        tables.events.extend(events.into_iter().map(|e| (e.id, e)));
        tables.posts.extend(posts.into_iter().map(|p| (p.id, p)));
        tables.recount_posts(&touched);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use eventfeed_core::{EventVenue, FixedClock, TimeRange};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(FixedClock(now())))
    }

    fn new_post(text: &str, event_id: Option<Uuid>) -> NewPost {
        NewPost {
            user_id: "u1".to_string(),
            user_name: "Ada".to_string(),
            text: text.to_string(),
            event_id,
            ..NewPost::default()
        }
    }

    fn new_event(name: &str, starts_in_hours: i64) -> NewEvent {
        let start = now() + Duration::hours(starts_in_hours);
        NewEvent {
            name: name.to_string(),
            description: String::new(),
            location: EventVenue {
                venue: "Pier 39".to_string(),
                address: "San Francisco".to_string(),
            },
            time_range: TimeRange {
                start,
                end: start + Duration::hours(3),
            },
            cover_image: None,
            participants: Vec::new(),
            created_by: None,
        }
    }

    #[tokio::test]
    async fn create_post_stamps_clock_and_starts_empty() {
        let store = store();
        let post = store.create_post(new_post("hello", None)).await.unwrap();
        assert_eq!(post.created_at, now());
        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());
        assert_eq!(post.views, 0);
        assert_eq!(store.get_post(post.id).await.unwrap(), Some(post));
    }

    #[tokio::test]
    async fn create_post_rejects_empty_content() {
        let store = store();
        let err = store.create_post(new_post("  ", None)).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[tokio::test]
    async fn create_post_for_unknown_event_is_not_found() {
        let store = store();
        let err = store
            .create_post(new_post("hello", Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
        assert!(store
            .list_posts(&PostFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn event_post_count_follows_posts() {
        let store = store();
        let fest = store.create_event(new_event("Fest", 0)).await.unwrap();
        let gala = store.create_event(new_event("Gala", 5)).await.unwrap();

        let post = store
            .create_post(new_post("at fest", Some(fest.id)))
            .await
            .unwrap();
        assert_eq!(post.event_name.as_deref(), Some("Fest"));
        assert_eq!(store.get_event(fest.id).await.unwrap().unwrap().post_count, 1);

        let moved = store
            .update_post(
                post.id,
                PostUpdate {
                    event_id: Some(Some(gala.id)),
                    ..PostUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.event_name.as_deref(), Some("Gala"));
        assert_eq!(moved.updated_at, Some(now()));
        assert_eq!(store.get_event(fest.id).await.unwrap().unwrap().post_count, 0);
        assert_eq!(store.get_event(gala.id).await.unwrap().unwrap().post_count, 1);

        assert!(store.delete_post(post.id).await.unwrap());
        assert_eq!(store.get_event(gala.id).await.unwrap().unwrap().post_count, 0);
        assert!(!store.delete_post(post.id).await.unwrap());
    }

    #[tokio::test]
    async fn likes_are_a_set() {
        let store = store();
        let post = store.create_post(new_post("hello", None)).await.unwrap();
        store.like_post(post.id, "u2").await.unwrap();
        let liked = store.like_post(post.id, "u2").await.unwrap();
        assert_eq!(liked.likes.len(), 1);

        let unliked = store.unlike_post(post.id, "u2").await.unwrap();
        assert!(unliked.likes.is_empty());

        let err = store.like_post(post.id, " ").await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[tokio::test]
    async fn comments_append_in_order() {
        let store = store();
        let post = store.create_post(new_post("hello", None)).await.unwrap();
        for text in ["first", "second"] {
            store
                .add_comment(
                    post.id,
                    NewComment {
                        user_id: "u3".to_string(),
                        user_name: "Grace".to_string(),
                        text: text.to_string(),
                    },
                )
                .await
                .unwrap();
        }
        let post = store.get_post(post.id).await.unwrap().unwrap();
        let texts: Vec<_> = post.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn missing_post_operations_are_not_found() {
        let store = store();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.like_post(id, "u1").await,
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            store.record_post_view(id).await,
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            store.update_post(id, PostUpdate::default()).await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_posts_filters_and_limits_newest_first() {
        let store = store();
        let event = store.create_event(new_event("Fest", 0)).await.unwrap();
        let older = Post {
            created_at: now() - Duration::hours(3),
            ..Post::from_new(new_post("older", Some(event.id)), Uuid::new_v4(), now())
        };
        let newer = Post {
            created_at: now() - Duration::hours(1),
            ..Post::from_new(new_post("newer", Some(event.id)), Uuid::new_v4(), now())
        };
        let loose = Post::from_new(new_post("loose", None), Uuid::new_v4(), now());
        store
            .import_records(Vec::new(), vec![older.clone(), newer.clone(), loose])
            .await
            .unwrap();

        let for_event = store
            .list_posts(&PostFilter::for_event(event.id))
            .await
            .unwrap();
        let ids: Vec<_> = for_event.iter().map(|p| p.id).collect();
        assert_eq!(ids, [newer.id, older.id]);

        let limited = store
            .list_posts(&PostFilter {
                limit: Some(1),
                ..PostFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].text, "loose");
    }

    #[tokio::test]
    async fn events_list_by_start_and_rename_propagates() {
        let store = store();
        let later = store.create_event(new_event("Later", 48)).await.unwrap();
        let sooner = store.create_event(new_event("Sooner", 2)).await.unwrap();
        let post = store
            .create_post(new_post("see you", Some(later.id)))
            .await
            .unwrap();

        let names: Vec<_> = store
            .list_events()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Sooner", "Later"]);

        store
            .update_event(
                later.id,
                EventUpdate {
                    name: Some("Much Later".to_string()),
                    ..EventUpdate::default()
                },
            )
            .await
            .unwrap();
        let post = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(post.event_name.as_deref(), Some("Much Later"));
        assert!(store.get_event(sooner.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_event_rejects_inverted_range() {
        let store = store();
        let event = store.create_event(new_event("Fest", 0)).await.unwrap();
        let err = store
            .update_event(
                event.id,
                EventUpdate {
                    time_range: Some(TimeRange {
                        start: now(),
                        end: now() - Duration::hours(1),
                    }),
                    ..EventUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[tokio::test]
    async fn delete_event_detaches_posts() {
        let store = store();
        let event = store.create_event(new_event("Fest", 0)).await.unwrap();
        let post = store
            .create_post(new_post("at fest", Some(event.id)))
            .await
            .unwrap();

        assert!(store.delete_event(event.id).await.unwrap());
        let post = store.get_post(post.id).await.unwrap().unwrap();
        assert!(post.event_id.is_none());
        assert!(post.event_name.is_none());
        assert!(!store.delete_event(event.id).await.unwrap());
    }

    #[tokio::test]
    async fn views_increment() {
        let store = store();
        let event = store.create_event(new_event("Fest", 0)).await.unwrap();
        store.record_event_view(event.id).await.unwrap();
        let event = store.record_event_view(event.id).await.unwrap();
        assert_eq!(event.views, 2);
    }

    #[tokio::test]
    async fn profile_defaults_then_merges() {
        let store = store();
        let profile = store.get_or_create_profile("u1").await.unwrap();
        assert_eq!(profile, UserProfile::default_for("u1", now()));

        let updated = store
            .update_profile(
                "u1",
                ProfileUpdate {
                    bio: Some("hi".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio, "hi");
        assert_eq!(updated.joined_at, now());
        assert_eq!(store.get_or_create_profile("u1").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn import_rejects_dangling_event_reference() {
        let store = store();
        let post = Post::from_new(new_post("x", Some(Uuid::new_v4())), Uuid::new_v4(), now());
        let err = store.import_records(Vec::new(), vec![post]).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn import_recounts_attached_posts() {
        let store = store();
        let event = store.create_event(new_event("Fest", 0)).await.unwrap();
        store
            .create_post(new_post("live post", Some(event.id)))
            .await
            .unwrap();

        let imported = Post::from_new(new_post("imported", Some(event.id)), Uuid::new_v4(), now());
        let stale = Event {
            post_count: 0,
            ..event.clone()
        };
        store
            .import_records(vec![stale], vec![imported.clone()])
            .await
            .unwrap();
        let event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.post_count, 2);

        let moved = Post {
            event_id: None,
            event_name: None,
            ..imported
        };
        store.import_records(Vec::new(), vec![moved]).await.unwrap();
        let event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.post_count, 1);
    }
}
