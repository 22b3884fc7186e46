use chrono::{DateTime, Utc};
use clap::Subcommand;
use eventfeed_core::Event;
use eventfeed_db::ContentStore;

/// Sub-commands available under `events`.
#[derive(Debug, Subcommand)]
pub enum EventsCommands {
    /// List events by start time with their status relative to now
    List,
}

pub(crate) async fn run(
    command: EventsCommands,
    store: &dyn ContentStore,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match command {
        EventsCommands::List => {
            let events = store.list_events().await?;
            if events.is_empty() {
                println!("no events found; run `db seed` first");
                return Ok(());
            }
            println!("{:<38}{:<10}{:<18}{:<8}NAME", "ID", "STATUS", "STARTS", "POSTS");
            for event in &events {
                println!("{}", format_event_row(event, now));
            }
        }
    }
    Ok(())
}

pub(crate) fn event_status(event: &Event, now: DateTime<Utc>) -> &'static str {
    if event.is_active(now) {
        "active"
    } else if event.time_range.start > now {
        "upcoming"
    } else {
        "ended"
    }
}

pub(crate) fn format_event_row(event: &Event, now: DateTime<Utc>) -> String {
    format!(
        "{:<38}{:<10}{:<18}{:<8}{}",
        event.id,
        event_status(event, now),
        event.time_range.start.format("%Y-%m-%d %H:%M"),
        event.post_count,
        event.name
    )
}
