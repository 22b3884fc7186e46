//! `feed` subcommands: trending reports over stored posts or exported documents.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use eventfeed_core::trending::{score_breakdown_with_policy, ScoreBreakdown};
use eventfeed_core::{
    rank_trending_with_policy, AppConfig, ContentItem, Engagement, FeedOptions, TrendingFeed,
};
use eventfeed_db::{ContentStore, PostFilter};
use uuid::Uuid;

/// Sub-commands available under `feed`.
#[derive(Debug, Subcommand)]
pub enum FeedCommands {
    /// Rank stored posts by trending score
    Trending {
        /// Maximum number of posts to show (defaults to `FEED_MAX_ITEMS`)
        #[arg(long)]
        max_items: Option<usize>,
        /// Minimum score to include (defaults to `FEED_MIN_SCORE`)
        #[arg(long)]
        min_score: Option<f64>,
    },
    /// Show the score breakdown for one stored post
    Score {
        /// Post id
        post_id: String,
    },
    /// Rank a JSON array of exported content documents
    Rank {
        /// Path to a JSON file holding `[{ id, likes, comments, createdAt, views }]`
        file: PathBuf,
        #[arg(long)]
        max_items: Option<usize>,
        #[arg(long)]
        min_score: Option<f64>,
        /// Reference instant (RFC 3339); defaults to the current time
        #[arg(long)]
        at: Option<String>,
    },
}

pub(crate) async fn run(
    command: FeedCommands,
    store: &dyn ContentStore,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match command {
        FeedCommands::Trending {
            max_items,
            min_score,
        } => {
            let options = feed_options(config.feed, max_items, min_score);
            let posts = store.list_posts(&PostFilter::default()).await?;
            let ranked = rank_trending_with_policy(&posts, now, options, &config.trending_policy);
            if ranked.items.is_empty() {
                println!("no posts reach a score of {:.2}", options.min_score);
                return Ok(());
            }
            for line in format_feed(&ranked) {
                println!("{line}");
            }
        }
        FeedCommands::Score { post_id } => {
            let id = Uuid::parse_str(post_id.trim())
                .with_context(|| format!("'{post_id}' is not a valid post id"))?;
            let post = store
                .get_post(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("post {id} not found"))?;
            let breakdown = score_breakdown_with_policy(&post, now, &config.trending_policy)?;
            let level = config.trending_policy.level_for_score(breakdown.score);
            for line in format_breakdown(&post.content_id(), &breakdown) {
                println!("{line}");
            }
            println!("{:<18}{level:?}", "level");
        }
        FeedCommands::Rank {
            file,
            max_items,
            min_score,
            at,
        } => {
            let at = match at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("--at '{raw}' is not an RFC 3339 timestamp"))?
                    .with_timezone(&Utc),
                None => now,
            };
            let items = read_content_items(&file)?;
            let options = feed_options(config.feed, max_items, min_score);
            let ranked = rank_trending_with_policy(&items, at, options, &config.trending_policy);
            for line in format_feed(&ranked) {
                println!("{line}");
            }
            for id in &ranked.skipped {
                eprintln!("skipped '{id}': unparseable createdAt");
            }
        }
    }
    Ok(())
}

pub(crate) fn feed_options(
    defaults: FeedOptions,
    max_items: Option<usize>,
    min_score: Option<f64>,
) -> FeedOptions {
    FeedOptions {
        max_items: max_items.unwrap_or(defaults.max_items),
        min_score: min_score.unwrap_or(defaults.min_score),
    }
}

pub(crate) fn read_content_items(path: &Path) -> anyhow::Result<Vec<ContentItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub(crate) fn format_feed<T: Engagement>(feed: &TrendingFeed<'_, T>) -> Vec<String> {
    let mut lines = vec![format!("{:<6}{:<38}{:<10}LEVEL", "RANK", "ID", "SCORE")];
    for (i, ranked) in feed.items.iter().enumerate() {
        lines.push(format!(
            "{:<6}{:<38}{:<10.2}{}",
            i + 1,
            ranked.item.content_id(),
            ranked.score,
            ranked.level.label()
        ));
    }
    lines
}

pub(crate) fn format_breakdown(id: &str, b: &ScoreBreakdown) -> Vec<String> {
    vec![
        format!("{:<18}{id}", "id"),
        format!("{:<18}{}", "created_at", b.created_at.to_rfc3339()),
        format!("{:<18}{:.2}", "age_hours", b.age_hours),
        format!("{:<18}{:.2}", "likes_score", b.likes_score),
        format!("{:<18}{:.2}", "comments_score", b.comments_score),
        format!("{:<18}{:.2}", "views_score", b.views_score),
        format!("{:<18}{:.2}", "engagement", b.engagement_score),
        format!("{:<18}{:.4}", "decay", b.time_decay_factor),
        format!("{:<18}{:.2}", "score", b.score),
    ]
}
