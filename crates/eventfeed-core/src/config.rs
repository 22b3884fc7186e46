use std::str::FromStr;

use crate::app_config::{AppConfig, Environment, StoreBackend};
use crate::feed::FeedOptions;
use crate::trending::{TrendingPolicy, COMMENT_WEIGHT, HALF_LIFE_HOURS, LIKE_WEIGHT, VIEW_WEIGHT};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup, with no `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        parse_value(var, &or_default(var, default))
    };
    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        parse_value(var, &or_default(var, default))
    };
    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        parse_value(var, &or_default(var, default))
    };
    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        parse_value(var, &or_default(var, default))
    };
    let parse_weight = |var: &str, default: f64| -> Result<f64, ConfigError> {
        let value: f64 = parse_value(var, &or_default(var, &default.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("must be a finite non-negative number, got {value}"),
            });
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("EVENTFEED_ENV", "development"))?;
    let store = parse_store_backend(&or_default("EVENTFEED_STORE", "memory"))?;

    let database_url = lookup("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
    if store == StoreBackend::Postgres && database_url.is_none() {
        return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
    }

    let bind_addr = parse("EVENTFEED_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("EVENTFEED_LOG_LEVEL", "info");
    let seed_path = PathBuf::from(or_default("EVENTFEED_SEED_PATH", "./config/seed.yaml"));

    let db_max_connections = parse_u32("EVENTFEED_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("EVENTFEED_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("EVENTFEED_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let feed_defaults = FeedOptions::default();
    let feed = FeedOptions {
        max_items: parse_usize(
            "EVENTFEED_FEED_MAX_ITEMS",
            &feed_defaults.max_items.to_string(),
        )?,
        min_score: parse_weight("EVENTFEED_FEED_MIN_SCORE", feed_defaults.min_score)?,
    };

    let half_life_hours = parse_weight("EVENTFEED_TRENDING_HALF_LIFE_HOURS", HALF_LIFE_HOURS)?;
    if half_life_hours <= 0.0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "EVENTFEED_TRENDING_HALF_LIFE_HOURS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    let trending_policy = TrendingPolicy {
        like_weight: parse_weight("EVENTFEED_TRENDING_LIKE_WEIGHT", LIKE_WEIGHT)?,
        comment_weight: parse_weight("EVENTFEED_TRENDING_COMMENT_WEIGHT", COMMENT_WEIGHT)?,
        view_weight: parse_weight("EVENTFEED_TRENDING_VIEW_WEIGHT", VIEW_WEIGHT)?,
        half_life_hours,
        ..TrendingPolicy::default()
    };
    trending_policy.validate()?;

    Ok(AppConfig {
        env,
        store,
        database_url,
        bind_addr,
        log_level,
        seed_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        feed,
        trending_policy,
    })
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "EVENTFEED_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

fn parse_store_backend(s: &str) -> Result<StoreBackend, ConfigError> {
    match s {
        "memory" => Ok(StoreBackend::Memory),
        "postgres" => Ok(StoreBackend::Postgres),
        other => Err(ConfigError::InvalidEnvVar {
            var: "EVENTFEED_STORE".to_string(),
            reason: format!("expected memory or postgres; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
