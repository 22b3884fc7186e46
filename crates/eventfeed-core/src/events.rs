use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventVenue {
    pub venue: String,
    pub address: String,
}

/// Inclusive start/end of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.start > self.end {
            return Err(CoreError::Validation(format!(
                "time range start {} is after end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub photo_url: Option<String>,
}

/// A time-bounded gathering that posts can be attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: EventVenue,
    pub time_range: TimeRange,
    pub cover_image: Option<String>,
    pub participants: Vec<Participant>,
    /// Number of posts attached to this event. Maintained by the store.
    pub post_count: u64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub views: u64,
}

impl Event {
    #[must_use]
    pub fn from_new(new: NewEvent, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name.trim().to_string(),
            description: new.description,
            location: new.location,
            time_range: new.time_range,
            cover_image: new.cover_image.filter(|u| !u.trim().is_empty()),
            participants: new.participants,
            post_count: 0,
            created_by: new.created_by,
            created_at: now,
            updated_at: None,
            views: 0,
        }
    }

    /// Overlay the fields present in `update`, stamping `updated_at`.
    pub fn apply_update(&mut self, update: EventUpdate, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        if let Some(time_range) = update.time_range {
            self.time_range = time_range;
        }
        if let Some(cover_image) = update.cover_image {
            self.cover_image = cover_image.filter(|u| !u.trim().is_empty());
        }
        if let Some(participants) = update.participants {
            self.participants = participants;
        }
        self.updated_at = Some(now);
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.time_range.contains(now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: EventVenue,
    pub time_range: TimeRange,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub created_by: Option<String>,
}

impl NewEvent {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a blank or overlong name, or a
    /// time range that ends before it starts.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_name(&self.name)?;
        self.time_range.validate()
    }
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<EventVenue>,
    pub time_range: Option<TimeRange>,
    pub cover_image: Option<Option<String>>,
    pub participants: Option<Vec<Participant>>,
}

impl EventUpdate {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if a supplied name or time range is invalid.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(time_range) = &self.time_range {
            time_range.validate()?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    let len = name.trim().chars().count();
    if len == 0 || len > 200 {
        return Err(CoreError::Validation(
            "event name must be 1-200 characters".to_string(),
        ));
    }
    Ok(())
}
