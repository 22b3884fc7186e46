pub mod app_config;
pub mod clock;
pub mod config;
pub mod events;
pub mod feed;
pub mod heatmap;
pub mod home;
pub mod posts;
pub mod profiles;
pub mod seed;
pub mod trending;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, StoreBackend};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_app_config, load_app_config_from_env};
pub use events::{Event, EventUpdate, EventVenue, NewEvent, Participant, TimeRange};
pub use feed::{rank_trending, rank_trending_with_policy, FeedOptions, RankedItem, TrendingFeed};
pub use posts::{Comment, DeviceOrientation, GeoLocation, NewComment, NewPost, Post, PostUpdate};
pub use profiles::{ProfileUpdate, UserProfile};
pub use seed::{load_seed_file, SeedFile};
pub use trending::{
    compute_trending_score, is_trending, is_trending_default, is_trending_with_policy,
    trending_level, ContentItem, Engagement, TrendingError, TrendingLevel, TrendingPolicy,
};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read seed file {path}: {source}")]
    SeedFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed file: {0}")]
    SeedFileParse(#[from] serde_yaml::Error),

    #[error("seed validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    InvalidPolicy(#[from] TrendingError),
}
