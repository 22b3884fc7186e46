use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public profile details shown on a user's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub cover_photo: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub joined_at: DateTime<Utc>,
}

impl UserProfile {
    /// The profile a user gets the first time it is requested.
    #[must_use]
    pub fn default_for(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            cover_photo: String::new(),
            bio: String::new(),
            location: String::new(),
            website: String::new(),
            joined_at: now,
        }
    }

    /// Merge: only fields present in `update` are replaced.
    pub fn merge(&mut self, update: ProfileUpdate) {
        if let Some(v) = update.cover_photo {
            self.cover_photo = v;
        }
        if let Some(v) = update.bio {
            self.bio = v;
        }
        if let Some(v) = update.location {
            self.location = v;
        }
        if let Some(v) = update.website {
            self.website = v;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub cover_photo: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_absent_fields() {
        let mut profile = UserProfile::default_for("user-1", Utc::now());
        profile.bio = "old bio".to_string();
        profile.merge(ProfileUpdate {
            website: Some("https://example.com".to_string()),
            ..ProfileUpdate::default()
        });
        assert_eq!(profile.bio, "old bio");
        assert_eq!(profile.website, "https://example.com");
    }
}
