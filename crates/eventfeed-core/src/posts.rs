use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Maximum accepted length of a post body, in characters.
pub const MAX_POST_TEXT_CHARS: usize = 5_000;

/// Maximum accepted length of a comment body, in characters.
pub const MAX_COMMENT_TEXT_CHARS: usize = 1_000;

/// Where the device was when the post was captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    pub altitude: Option<f64>,
}

impl GeoLocation {
    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CoreError::Validation(format!(
                "latitude must be within [-90, 90], got {}",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CoreError::Validation(format!(
                "longitude must be within [-180, 180], got {}",
                self.longitude
            )));
        }
        if self.accuracy.is_sign_negative() || !self.accuracy.is_finite() {
            return Err(CoreError::Validation(
                "accuracy must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Device orientation angles (degrees) reported by the capturing device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceOrientation {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A user post, optionally attached to an [`Event`](crate::Event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub user_photo_url: Option<String>,
    pub text: String,
    pub image_url: Option<String>,
    /// Ids of users who liked the post. A set, so a user counts once.
    pub likes: BTreeSet<String>,
    /// Append-only.
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub location: Option<GeoLocation>,
    pub device_orientation: Option<DeviceOrientation>,
    pub event_id: Option<Uuid>,
    pub event_name: Option<String>,
    pub contextual_tags: Vec<String>,
    /// When the photo/text was captured on the device, which can predate `created_at`.
    pub capture_timestamp: Option<DateTime<Utc>>,
    pub views: u64,
}

impl Post {
    /// Build a fresh post from a creation request. Engagement starts empty.
    #[must_use]
    pub fn from_new(new: NewPost, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            user_name: new.user_name,
            user_photo_url: new.user_photo_url,
            text: new.text.trim().to_string(),
            image_url: new.image_url.filter(|u| !u.trim().is_empty()),
            likes: BTreeSet::new(),
            comments: Vec::new(),
            created_at: now,
            updated_at: None,
            location: new.location,
            device_orientation: new.device_orientation,
            event_id: new.event_id,
            event_name: new.event_name,
            contextual_tags: normalize_tags(new.contextual_tags),
            capture_timestamp: Some(new.capture_timestamp.unwrap_or(now)),
            views: 0,
        }
    }

    /// Overlay the fields present in `update`, stamping `updated_at`.
    pub fn apply_update(&mut self, update: PostUpdate, now: DateTime<Utc>) {
        if let Some(text) = update.text {
            self.text = text.trim().to_string();
        }
        if let Some(image_url) = update.image_url {
            self.image_url = image_url.filter(|u| !u.trim().is_empty());
        }
        if let Some(tags) = update.contextual_tags {
            self.contextual_tags = normalize_tags(tags);
        }
        if let Some(event_id) = update.event_id {
            self.event_id = event_id;
            if self.event_id.is_none() {
                self.event_name = None;
            }
        }
        if let Some(event_name) = update.event_name {
            self.event_name = event_name;
        }
        self.updated_at = Some(now);
    }

    /// Timestamp used to place the post on an event timeline.
    #[must_use]
    pub fn timeline_timestamp(&self) -> DateTime<Utc> {
        self.capture_timestamp.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id: String,
    pub user_name: String,
    pub user_photo_url: Option<String>,
    #[serde(default)]
    pub text: String,
    pub image_url: Option<String>,
    pub location: Option<GeoLocation>,
    pub device_orientation: Option<DeviceOrientation>,
    pub event_id: Option<Uuid>,
    pub event_name: Option<String>,
    #[serde(default)]
    pub contextual_tags: Vec<String>,
    pub capture_timestamp: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Checks the request before it reaches a store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the author is missing, the post has
    /// neither text nor an image, or a coordinate is out of range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::Validation("user_id must be non-empty".to_string()));
        }
        let has_image = self.image_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        if self.text.trim().is_empty() && !has_image {
            return Err(CoreError::Validation(
                "a post needs text or an image".to_string(),
            ));
        }
        if self.text.chars().count() > MAX_POST_TEXT_CHARS {
            return Err(CoreError::Validation(format!(
                "text must be at most {MAX_POST_TEXT_CHARS} characters"
            )));
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        Ok(())
    }
}

// Option<Option<T>> follows PATCH semantics: outer None = keep, Some(None) = clear.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostUpdate {
    pub text: Option<String>,
    pub image_url: Option<Option<String>>,
    pub contextual_tags: Option<Vec<String>>,
    pub event_id: Option<Option<Uuid>>,
    pub event_name: Option<Option<String>>,
}

impl PostUpdate {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the new text is too long.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(text) = &self.text {
            if text.chars().count() > MAX_POST_TEXT_CHARS {
                return Err(CoreError::Validation(format!(
                    "text must be at most {MAX_POST_TEXT_CHARS} characters"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub user_id: String,
    pub user_name: String,
    pub text: String,
}

impl NewComment {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an empty author or body, or a
    /// body over [`MAX_COMMENT_TEXT_CHARS`].
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::Validation("user_id must be non-empty".to_string()));
        }
        let len = self.text.trim().chars().count();
        if len == 0 || len > MAX_COMMENT_TEXT_CHARS {
            return Err(CoreError::Validation(format!(
                "comment text must be 1-{MAX_COMMENT_TEXT_CHARS} characters"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn into_comment(self, id: Uuid, now: DateTime<Utc>) -> Comment {
        Comment {
            id,
            user_id: self.user_id,
            user_name: self.user_name,
            text: self.text.trim().to_string(),
            created_at: now,
        }
    }
}

/// Trim tags, drop empties and case-insensitive duplicates, keep first-seen order.
#[must_use]
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}
