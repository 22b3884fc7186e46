//! Postgres-backed [`ContentStore`].
//!
//! Nested documents (comments, participants, coordinates) live in JSONB
//! columns; likes and tags are `TEXT[]`. Multi-row changes run in a
//! transaction with the affected post or event locked `FOR UPDATE`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventfeed_core::{
    Clock, Event, EventUpdate, EventVenue, NewComment, NewEvent, NewPost, Post, PostUpdate,
    ProfileUpdate, TimeRange, UserProfile,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::store::{validate_user_id, ContentStore, PostFilter};
use crate::DbError;

const POST_COLUMNS: &str = "id, user_id, user_name, user_photo_url, text, image_url, likes, \
     comments, created_at, updated_at, location, device_orientation, event_id, event_name, \
     contextual_tags, capture_timestamp, views";

const EVENT_COLUMNS: &str = "id, name, description, venue, address, starts_at, ends_at, \
     cover_image, participants, post_count, created_by, created_at, updated_at, views";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub user_photo_url: Option<String>,
    pub text: String,
    pub image_url: Option<String>,
    pub likes: Vec<String>,
    pub comments: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub location: Option<Value>,
    pub device_orientation: Option<Value>,
    pub event_id: Option<Uuid>,
    pub event_name: Option<String>,
    pub contextual_tags: Vec<String>,
    pub capture_timestamp: Option<DateTime<Utc>>,
    pub views: i64,
}

impl TryFrom<PostRow> for Post {
    type Error = serde_json::Error;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            user_photo_url: row.user_photo_url,
            text: row.text,
            image_url: row.image_url,
            likes: row.likes.into_iter().collect(),
            comments: serde_json::from_value(row.comments)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            location: row.location.map(serde_json::from_value).transpose()?,
            device_orientation: row
                .device_orientation
                .map(serde_json::from_value)
                .transpose()?,
            event_id: row.event_id,
            event_name: row.event_name,
            contextual_tags: row.contextual_tags,
            capture_timestamp: row.capture_timestamp,
            views: u64::try_from(row.views).unwrap_or(0),
        })
    }
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub venue: String,
    pub address: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub cover_image: Option<String>,
    pub participants: Value,
    pub post_count: i64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub views: i64,
}

impl TryFrom<EventRow> for Event {
    type Error = serde_json::Error;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            location: EventVenue {
                venue: row.venue,
                address: row.address,
            },
            time_range: TimeRange {
                start: row.starts_at,
                end: row.ends_at,
            },
            cover_image: row.cover_image,
            participants: serde_json::from_value(row.participants)?,
            post_count: u64::try_from(row.post_count).unwrap_or(0),
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            views: u64::try_from(row.views).unwrap_or(0),
        })
    }
}

/// A row from the `user_profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub user_id: String,
    pub cover_photo: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub joined_at: DateTime<Utc>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: row.user_id,
            cover_photo: row.cover_photo,
            bio: row.bio,
            location: row.location,
            website: row.website,
            joined_at: row.joined_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct PgContentStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgContentStore {
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_post(&self, id: Uuid) -> Result<Option<Post>, DbError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Post::try_from).transpose()?)
    }

    /// Run a single-statement post mutation that ends in `RETURNING`.
    async fn mutate_post<'q>(
        &self,
        query: sqlx::query::QueryAs<'q, sqlx::Postgres, PostRow, sqlx::postgres::PgArguments>,
        id: Uuid,
    ) -> Result<Post, DbError> {
        let row = query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::post_not_found(id))?;
        Ok(Post::try_from(row)?)
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), DbError> {
        crate::health_check(&self.pool).await
    }

    async fn create_post(&self, new: NewPost) -> Result<Post, DbError> {
        new.validate()?;
        let mut post = Post::from_new(new, Uuid::new_v4(), self.clock.now());

        let mut tx = self.pool.begin().await?;
        if let Some(event_id) = post.event_id {
            let name = claim_event_slot(&mut tx, event_id).await?;
            if post.event_name.is_none() {
                post.event_name = Some(name);
            }
        }
        write_post(&mut tx, &post).await?;
        tx.commit().await?;

        Ok(post)
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, DbError> {
        let limit = filter.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE ($1::uuid IS NULL OR event_id = $1) \
               AND ($2::text IS NULL OR user_id = $2) \
             ORDER BY created_at DESC, id \
             LIMIT $3"
        ))
        .bind(filter.event_id)
        .bind(filter.user_id.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Post::try_from(row).map_err(DbError::from))
            .collect()
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, DbError> {
        self.fetch_post(id).await
    }

    async fn update_post(&self, id: Uuid, mut update: PostUpdate) -> Result<Post, DbError> {
        update.validate()?;
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::post_not_found(id))?;
        let mut post = Post::try_from(row)?;

        let old_event = post.event_id;
        let new_event = update.event_id.unwrap_or(old_event);
        if new_event != old_event {
            if let Some(event_id) = new_event {
                let name = claim_event_slot(&mut tx, event_id).await?;
                if update.event_name.is_none() {
                    update.event_name = Some(Some(name));
                }
            }
            release_event_slot(&mut tx, old_event).await?;
        }

        post.apply_update(update, now);
        write_post(&mut tx, &post).await?;
        tx.commit().await?;

        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;
        let deleted: Option<Option<Uuid>> =
            sqlx::query_scalar("DELETE FROM posts WHERE id = $1 RETURNING event_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(event_id) = deleted else {
            return Ok(false);
        };
        release_event_slot(&mut tx, event_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn like_post(&self, id: Uuid, user_id: &str) -> Result<Post, DbError> {
        validate_user_id(user_id)?;
        let sql = format!(
            "UPDATE posts \
             SET likes = CASE WHEN $2 = ANY(likes) THEN likes ELSE array_append(likes, $2) END \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        );
        self.mutate_post(sqlx::query_as(&sql).bind(id).bind(user_id), id)
            .await
    }

    async fn unlike_post(&self, id: Uuid, user_id: &str) -> Result<Post, DbError> {
        validate_user_id(user_id)?;
        let sql = format!(
            "UPDATE posts SET likes = array_remove(likes, $2) WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        self.mutate_post(sqlx::query_as(&sql).bind(id).bind(user_id), id)
            .await
    }

    async fn add_comment(&self, id: Uuid, comment: NewComment) -> Result<Post, DbError> {
        comment.validate()?;
        let comment = comment.into_comment(Uuid::new_v4(), self.clock.now());
        let appended = serde_json::to_value([comment])?;
        let sql = format!(
            "UPDATE posts SET comments = comments || $2 WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        self.mutate_post(sqlx::query_as(&sql).bind(id).bind(appended), id)
            .await
    }

    async fn record_post_view(&self, id: Uuid) -> Result<Post, DbError> {
        let sql =
            format!("UPDATE posts SET views = views + 1 WHERE id = $1 RETURNING {POST_COLUMNS}");
        self.mutate_post(sqlx::query_as(&sql).bind(id), id).await
    }

    async fn create_event(&self, new: NewEvent) -> Result<Event, DbError> {
        new.validate()?;
        let event = Event::from_new(new, Uuid::new_v4(), self.clock.now());
        let mut conn = self.pool.acquire().await?;
        write_event(&mut conn, &event).await?;
        Ok(event)
    }

    async fn list_events(&self) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY starts_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Event::try_from(row).map_err(DbError::from))
            .collect()
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, DbError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Event::try_from).transpose()?)
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> Result<Event, DbError> {
        update.validate()?;
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::event_not_found(id))?;
        let mut event = Event::try_from(row)?;

        let old_name = event.name.clone();
        event.apply_update(update, now);
        write_event(&mut tx, &event).await?;

        if event.name != old_name {
            sqlx::query("UPDATE posts SET event_name = $1 WHERE event_id = $2")
                .bind(&event.name)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE posts SET event_id = NULL, event_name = NULL WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_event_view(&self, id: Uuid) -> Result<Event, DbError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "UPDATE events SET views = views + 1 WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::event_not_found(id))?;
        Ok(Event::try_from(row)?)
    }

    async fn get_or_create_profile(&self, user_id: &str) -> Result<UserProfile, DbError> {
        validate_user_id(user_id)?;
        let mut conn = self.pool.acquire().await?;
        let row = ensure_profile(&mut conn, user_id, self.clock.now(), false).await?;
        Ok(row.into())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, DbError> {
        validate_user_id(user_id)?;
        let mut tx = self.pool.begin().await?;
        let mut profile: UserProfile = ensure_profile(&mut tx, user_id, self.clock.now(), true)
            .await?
            .into();
        profile.merge(update);

        sqlx::query(
            "UPDATE user_profiles \
             SET cover_photo = $2, bio = $3, location = $4, website = $5 \
             WHERE user_id = $1",
        )
        .bind(&profile.user_id)
        .bind(&profile.cover_photo)
        .bind(&profile.bio)
        .bind(&profile.location)
        .bind(&profile.website)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(profile)
    }

    async fn import_records(
        &self,
        events: Vec<Event>,
        posts: Vec<Post>,
    ) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;
        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut touched: Vec<Uuid> = sqlx::query_scalar::<_, Uuid>(
            "SELECT event_id FROM posts WHERE id = ANY($1) AND event_id IS NOT NULL",
        )
        .bind(&post_ids)
        .fetch_all(&mut *tx)
        .await?;
        touched.extend(events.iter().map(|e| e.id));
        touched.extend(posts.iter().filter_map(|p| p.event_id));
        touched.sort_unstable();
        touched.dedup();

        for event in &events {
            write_event(&mut tx, event).await?;
        }
        for post in &posts {
            write_post(&mut tx, post).await.map_err(|e| {
                if is_foreign_key_violation(&e) {
                    post.event_id.map_or(e, DbError::event_not_found)
                } else {
                    e
                }
            })?;
        }
        recount_posts(&mut tx, &touched).await?;
        tx.commit().await?;
        Ok(events.len() + posts.len())
    }
}

// ---------------------------------------------------------------------------
// Statement helpers
// ---------------------------------------------------------------------------

fn is_foreign_key_violation(err: &DbError) -> bool {
    matches!(err, DbError::Sqlx(sqlx::Error::Database(db)) if db.is_foreign_key_violation())
}

/// Reset `post_count` of the given events to the number of attached posts.
async fn recount_posts(conn: &mut PgConnection, event_ids: &[Uuid]) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE events SET post_count = \
             (SELECT COUNT(*) FROM posts WHERE posts.event_id = events.id) \
         WHERE id = ANY($1)",
    )
    .bind(event_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Increment an event's `post_count` and return its name.
async fn claim_event_slot(conn: &mut PgConnection, event_id: Uuid) -> Result<String, DbError> {
    sqlx::query_scalar::<_, String>(
        "UPDATE events SET post_count = post_count + 1 WHERE id = $1 RETURNING name",
    )
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::event_not_found(event_id))
}

async fn release_event_slot(
    conn: &mut PgConnection,
    event_id: Option<Uuid>,
) -> Result<(), DbError> {
    let Some(event_id) = event_id else {
        return Ok(());
    };
    sqlx::query("UPDATE events SET post_count = GREATEST(post_count - 1, 0) WHERE id = $1")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert the post, or overwrite every column if the id already exists.
async fn write_post(conn: &mut PgConnection, post: &Post) -> Result<(), DbError> {
    let likes: Vec<String> = post.likes.iter().cloned().collect();
    sqlx::query(
        "INSERT INTO posts (id, user_id, user_name, user_photo_url, text, image_url, likes, \
                            comments, created_at, updated_at, location, device_orientation, \
                            event_id, event_name, contextual_tags, capture_timestamp, views) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
         ON CONFLICT (id) DO UPDATE SET \
             user_id = EXCLUDED.user_id, \
             user_name = EXCLUDED.user_name, \
             user_photo_url = EXCLUDED.user_photo_url, \
             text = EXCLUDED.text, \
             image_url = EXCLUDED.image_url, \
             likes = EXCLUDED.likes, \
             comments = EXCLUDED.comments, \
             created_at = EXCLUDED.created_at, \
             updated_at = EXCLUDED.updated_at, \
             location = EXCLUDED.location, \
             device_orientation = EXCLUDED.device_orientation, \
             event_id = EXCLUDED.event_id, \
             event_name = EXCLUDED.event_name, \
             contextual_tags = EXCLUDED.contextual_tags, \
             capture_timestamp = EXCLUDED.capture_timestamp, \
             views = EXCLUDED.views",
    )
    .bind(post.id)
    .bind(&post.user_id)
    .bind(&post.user_name)
    .bind(&post.user_photo_url)
    .bind(&post.text)
    .bind(&post.image_url)
    .bind(&likes)
    .bind(serde_json::to_value(&post.comments)?)
    .bind(post.created_at)
    .bind(post.updated_at)
    .bind(post.location.map(serde_json::to_value).transpose()?)
    .bind(post.device_orientation.map(serde_json::to_value).transpose()?)
    .bind(post.event_id)
    .bind(&post.event_name)
    .bind(&post.contextual_tags)
    .bind(post.capture_timestamp)
    .bind(i64::try_from(post.views).unwrap_or(i64::MAX))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert the event, or overwrite every column if the id already exists.
async fn write_event(conn: &mut PgConnection, event: &Event) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO events (id, name, description, venue, address, starts_at, ends_at, \
                             cover_image, participants, post_count, created_by, created_at, \
                             updated_at, views) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (id) DO UPDATE SET \
             name = EXCLUDED.name, \
             description = EXCLUDED.description, \
             venue = EXCLUDED.venue, \
             address = EXCLUDED.address, \
             starts_at = EXCLUDED.starts_at, \
             ends_at = EXCLUDED.ends_at, \
             cover_image = EXCLUDED.cover_image, \
             participants = EXCLUDED.participants, \
             post_count = EXCLUDED.post_count, \
             created_by = EXCLUDED.created_by, \
             created_at = EXCLUDED.created_at, \
             updated_at = EXCLUDED.updated_at, \
             views = EXCLUDED.views",
    )
    .bind(event.id)
    .bind(&event.name)
    .bind(&event.description)
    .bind(&event.location.venue)
    .bind(&event.location.address)
    .bind(event.time_range.start)
    .bind(event.time_range.end)
    .bind(&event.cover_image)
    .bind(serde_json::to_value(&event.participants)?)
    .bind(i64::try_from(event.post_count).unwrap_or(i64::MAX))
    .bind(&event.created_by)
    .bind(event.created_at)
    .bind(event.updated_at)
    .bind(i64::try_from(event.views).unwrap_or(i64::MAX))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert the default profile if missing, then read it back (optionally locked).
async fn ensure_profile(
    conn: &mut PgConnection,
    user_id: &str,
    now: DateTime<Utc>,
    lock: bool,
) -> Result<ProfileRow, DbError> {
    sqlx::query(
        "INSERT INTO user_profiles (user_id, joined_at) VALUES ($1, $2) \
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let sql = if lock {
        "SELECT user_id, cover_photo, bio, location, website, joined_at \
         FROM user_profiles WHERE user_id = $1 FOR UPDATE"
    } else {
        "SELECT user_id, cover_photo, bio, location, website, joined_at \
         FROM user_profiles WHERE user_id = $1"
    };
    let row = sqlx::query_as::<_, ProfileRow>(sql)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}
