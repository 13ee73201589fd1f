//! mailsift - CLI for the local email intelligence store
//!
//! Queries the aggregation store and the derived analytics; also records
//! user actions. Classification lives in the `mailsift-analyze` binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailsift_core::analytics;
use mailsift_core::db::run_legacy_import;
use mailsift_core::{ActionType, Config, Database};

#[derive(Parser)]
#[command(name = "mailsift")]
#[command(about = "Inspect the local email intelligence store")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show aggregate statistics
    Stats,
    /// List classification history, most recent first
    History {
        /// Only entries from this sender
        #[arg(short, long)]
        sender: Option<String>,

        /// Maximum entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// List known senders
    Senders,
    /// List recorded actions, most recent first
    Actions {
        /// Only actions in this category
        #[arg(short, long)]
        category: Option<String>,

        /// Maximum entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Record a user action for a sender
    Record {
        /// One of: replied, archived, deleted, starred, read, ignored
        action: String,

        /// Sender the action applies to
        sender: String,

        /// Category the email belonged to
        #[arg(short, long, default_value = "General")]
        category: String,

        /// Free-form note stored with the action
        #[arg(short, long)]
        note: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        mailsift_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db = Database::open(&Config::database_path()).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    // Pick up a pre-structured flat export once, before the first read
    let imported = run_legacy_import(&db, &Config::legacy_analyses_path())
        .context("failed to import legacy analyses")?;
    if imported > 0 {
        println!("Imported {} legacy analyses.", imported);
    }

    match args.command {
        Command::Stats => show_stats(&db),
        Command::History { sender, limit } => show_history(&db, sender.as_deref(), limit),
        Command::Senders => show_senders(&db),
        Command::Actions { category, limit } => show_actions(&db, category.as_deref(), limit),
        Command::Record {
            action,
            sender,
            category,
            note,
        } => record_action(&db, &action, &sender, &category, note.as_deref()),
    }
}

fn show_stats(db: &Database) -> Result<()> {
    let report = analytics::snapshot(db)?;

    println!("Senders: {}", report.total_senders);
    println!("Interactions: {}", report.total_interactions);
    println!("Actions: {}", report.total_actions);
    println!("Average priority: {}", report.format_average_priority());

    println!("\nPriority distribution:");
    let mut priorities: Vec<_> = report.priority_distribution.iter().collect();
    priorities.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (tier, count) in priorities {
        println!("  {:<10} {}", tier, count);
    }

    if !report.action_distribution.is_empty() {
        println!("\nAction distribution:");
        let mut actions: Vec<_> = report.action_distribution.iter().collect();
        actions.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (action, count) in actions {
            println!("  {:<10} {}", action, count);
        }
    }

    if !report.top_senders.is_empty() {
        println!("\nTop senders:");
        for profile in &report.top_senders {
            println!(
                "  {:<35} {:>4} interaction(s)  [{}]",
                profile.email, profile.interaction_count, profile.importance
            );
        }
    }

    println!("\nLast 7 days: {:?}", report.daily_timeline);

    Ok(())
}

fn show_history(db: &Database, sender: Option<&str>, limit: usize) -> Result<()> {
    let entries = match sender {
        Some(sender) => db.priority_history_by_sender(sender, limit)?,
        None => db.all_priority_history(limit)?,
    };

    if entries.is_empty() {
        println!("No classification history yet.");
        println!("Run 'mailsift-analyze <emails.json>' to classify scraped emails.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {:<8} {:<30} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.predicted_priority,
            entry.sender_email,
            entry.categories.join(", ")
        );
    }

    Ok(())
}

fn show_senders(db: &Database) -> Result<()> {
    let profiles = db.list_sender_profiles()?;

    if profiles.is_empty() {
        println!("No senders known yet.");
        return Ok(());
    }

    for profile in profiles {
        println!(
            "{:<35} {:<8} {:>4} interaction(s), last {} ({})",
            profile.email,
            profile.importance,
            profile.interaction_count,
            profile.last_interaction.format("%Y-%m-%d %H:%M"),
            profile.last_interaction_type,
        );
    }

    Ok(())
}

fn show_actions(db: &Database, category: Option<&str>, limit: usize) -> Result<()> {
    let entries = match category {
        Some(category) => db.action_patterns_by_category(category)?,
        None => db.action_patterns(limit)?,
    };

    if entries.is_empty() {
        println!("No actions recorded yet.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {:<9} {:<30} [{}]",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.action_type,
            entry.sender_email,
            entry.category,
        );
    }

    Ok(())
}

fn record_action(
    db: &Database,
    action: &str,
    sender: &str,
    category: &str,
    note: Option<&str>,
) -> Result<()> {
    let action_type: ActionType = action
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("valid actions: replied, archived, deleted, starred, read, ignored")?;

    let metadata = match note {
        Some(note) => serde_json::json!({ "note": note }),
        None => serde_json::json!({}),
    };

    let entry = db.record_action(action_type, category, sender, metadata)?;
    db.upsert_sender_profile(sender, sender, &entry_importance(db, sender)?, action_type.as_str())?;

    println!("Recorded {} for {}.", entry.action_type, entry.sender_email);
    Ok(())
}

/// Keep the profile's importance when it already exists; new senders seen
/// only through actions start at Medium.
fn entry_importance(db: &Database, sender: &str) -> Result<mailsift_core::Tier> {
    Ok(db
        .get_sender_profile(sender)?
        .map(|p| p.importance)
        .unwrap_or_default())
}
