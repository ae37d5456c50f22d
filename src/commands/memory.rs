//! Memory command handlers.

use super::{Session, to_output};
use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use cortex::services::{
    CreateMemoryInput, GetMemoryOptions, ListMemoriesOptions, UpdateMemoryInput,
};
use cortex::{Error, OperationContext, PruneOptions};
use serde_json::Value;
use std::io::Read;

/// Memory subcommands.
#[derive(Subcommand)]
pub enum MemoryAction {
    /// Store a memory.
    Add {
        /// Slug path, e.g. `project/notes/setup`.
        path: String,

        /// Memory content. Read from stdin when omitted.
        #[arg(long)]
        content: Option<String>,

        /// Tags (comma-separated).
        #[arg(long)]
        tags: Option<String>,

        /// Origin of the memory.
        #[arg(long, default_value = "cli")]
        source: String,

        /// Expiration timestamp (RFC 3339).
        #[arg(long, value_parser = parse_timestamp, conflicts_with = "ttl")]
        expires_at: Option<DateTime<Utc>>,

        /// Time to live, e.g. `30m`, `12h`, `7d`.
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<Duration>,
    },

    /// Show a memory.
    Show {
        /// Slug path.
        path: String,

        /// Show the memory even if it has expired.
        #[arg(long)]
        include_expired: bool,
    },

    /// Update a memory.
    Update {
        /// Slug path.
        path: String,

        /// Replacement content.
        #[arg(long)]
        content: Option<String>,

        /// Replacement tags (comma-separated).
        #[arg(long)]
        tags: Option<String>,

        /// New expiration timestamp (RFC 3339).
        #[arg(long, value_parser = parse_timestamp, conflicts_with = "ttl")]
        expires_at: Option<DateTime<Utc>>,

        /// New time to live, counted from now.
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<Duration>,

        /// Remove the expiration.
        #[arg(long)]
        clear_expiry: bool,
    },

    /// Move a memory to a new path.
    Move {
        /// Current slug path.
        from: String,

        /// New slug path.
        to: String,
    },

    /// Delete a memory.
    Remove {
        /// Slug path.
        path: String,
    },

    /// List a category, or the root categories.
    List {
        /// Category path.
        category: Option<String>,

        /// Include expired memories.
        #[arg(long)]
        include_expired: bool,
    },

    /// Delete expired memories.
    Prune {
        /// Show what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Memory command implementation.
pub fn cmd_memory(action: MemoryAction, session: &Session) -> Result<Value, Error> {
    let ctx = OperationContext::new();
    let service = session.memories();

    match action {
        MemoryAction::Add {
            path,
            content,
            tags,
            source,
            expires_at,
            ttl,
        } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let mut input = CreateMemoryInput::new(content, source).with_tags(parse_tags(tags));
            input.expires_at = expires_at.or_else(|| ttl.map(|ttl| ctx.now() + ttl));
            to_output(&service.create(&ctx, &path, input)?)
        },

        MemoryAction::Show {
            path,
            include_expired,
        } => to_output(&service.get(&ctx, &path, GetMemoryOptions { include_expired })?),

        MemoryAction::Update {
            path,
            content,
            tags,
            expires_at,
            ttl,
            clear_expiry,
        } => {
            let input = UpdateMemoryInput {
                content,
                tags: tags.map(|t| parse_tags(Some(t))),
                expires_at: expires_at.or_else(|| ttl.map(|ttl| ctx.now() + ttl)),
                clear_expiry,
            };
            to_output(&service.update(&ctx, &path, input)?)
        },

        MemoryAction::Move { from, to } => to_output(&service.move_memory(&ctx, &from, &to)?),

        MemoryAction::Remove { path } => to_output(&service.remove(&ctx, &path)?),

        MemoryAction::List {
            category,
            include_expired,
        } => to_output(&service.list(
            &ctx,
            category.as_deref(),
            ListMemoriesOptions { include_expired },
        )?),

        MemoryAction::Prune { dry_run } => {
            let result = service.prune_expired(&ctx, PruneOptions { dry_run })?;
            tracing::info!("{}", result.summary());
            to_output(&result)
        },
    }
}

/// Splits a comma-separated tag list, dropping blanks.
fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn read_stdin() -> Result<String, Error> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(|e| Error::OperationFailed {
            operation: "read_stdin".to_string(),
            cause: e.to_string(),
        })?;
    Ok(content)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{value}': {e}"))
}

/// Parses `<n><unit>` with units `s`, `m`, `h`, `d`, `w`.
fn parse_ttl(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("ttl '{value}' is missing a unit (s, m, h, d, w)"))?;
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("ttl '{value}' must start with a number"))?;

    let duration = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => return Err(format!("ttl '{value}' has unknown unit '{unit}'")),
    };
    duration.ok_or_else(|| format!("ttl '{value}' is out of range"))
}
