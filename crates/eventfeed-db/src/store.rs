//! The storage seam shared by the HTTP server and the CLI.

use async_trait::async_trait;
use eventfeed_core::{
    CoreError, Event, EventUpdate, NewComment, NewEvent, NewPost, Post, PostUpdate,
    ProfileUpdate, UserProfile,
};
use uuid::Uuid;

use crate::DbError;

/// Narrows [`ContentStore::list_posts`]. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub event_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

impl PostFilter {
    #[must_use]
    pub fn for_event(event_id: Uuid) -> Self {
        Self {
            event_id: Some(event_id),
            ..Self::default()
        }
    }

    pub(crate) fn matches(&self, post: &Post) -> bool {
        self.event_id.is_none_or(|id| post.event_id == Some(id))
            && self
                .user_id
                .as_deref()
                .is_none_or(|user| post.user_id == user)
    }
}

/// Persistence for posts, events and profiles.
///
/// Every mutating call stamps timestamps from the store's clock. Operations
/// addressing a missing record return [`DbError::NotFound`], except
/// `delete_*` which report absence as `false`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short name of the backend, for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> Result<(), DbError>;

    /// Create a post. When it names an event, that event's `post_count` is
    /// incremented and its name is copied onto the post if none was given.
    async fn create_post(&self, new: NewPost) -> Result<Post, DbError>;

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, DbError>;

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, DbError>;

    /// Apply a partial update. Moving a post between events keeps both
    /// events' `post_count` in step.
    async fn update_post(&self, id: Uuid, update: PostUpdate) -> Result<Post, DbError>;

    async fn delete_post(&self, id: Uuid) -> Result<bool, DbError>;

    /// Add `user_id` to the post's likes. Liking twice is a no-op.
    async fn like_post(&self, id: Uuid, user_id: &str) -> Result<Post, DbError>;

    async fn unlike_post(&self, id: Uuid, user_id: &str) -> Result<Post, DbError>;

    async fn add_comment(&self, id: Uuid, comment: NewComment) -> Result<Post, DbError>;

    async fn record_post_view(&self, id: Uuid) -> Result<Post, DbError>;

    async fn create_event(&self, new: NewEvent) -> Result<Event, DbError>;

    /// All events ordered by start time.
    async fn list_events(&self) -> Result<Vec<Event>, DbError>;

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, DbError>;

    /// Apply a partial update. A rename is propagated to attached posts.
    async fn update_event(&self, id: Uuid, update: EventUpdate) -> Result<Event, DbError>;

    /// Delete an event. Attached posts are kept and detached from it.
    async fn delete_event(&self, id: Uuid) -> Result<bool, DbError>;

    async fn record_event_view(&self, id: Uuid) -> Result<Event, DbError>;

    /// Fetch a profile, inserting the default one on first access.
    async fn get_or_create_profile(&self, user_id: &str) -> Result<UserProfile, DbError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, DbError>;

    /// Insert or replace fully-formed records, keyed by id. Events are written
    /// before posts. Returns the number of records written.
    async fn import_records(
        &self,
        events: Vec<Event>,
        posts: Vec<Post>,
    ) -> Result<usize, DbError>;
}

pub(crate) fn validate_user_id(user_id: &str) -> Result<(), DbError> {
    if user_id.trim().is_empty() {
        return Err(CoreError::Validation("user_id must be non-empty".to_string()).into());
    }
    Ok(())
}
