//! Aggregate report over the four analytics collections.
//!
//! Everything here is a pure function of the collection contents plus an
//! explicit `now` for the calendar buckets: same inputs, same report.

use std::collections::HashMap;

use chrono::{DateTime, Local, Timelike, Utc};

use crate::db::Database;
use crate::error::Result;
use crate::types::{
    ActionPatternEntry, EmailContextEntry, PriorityHistoryEntry, SenderProfile, Tier,
};

/// How many history rows a [`snapshot`] feeds into the report
const SNAPSHOT_HISTORY_LIMIT: usize = 10_000;

/// How many top senders and recent-activity rows the report keeps
const TOP_N: usize = 10;

/// Response-urgency breakdown over the stored analyses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrgencyBreakdown {
    /// High/urgent with action items
    pub immediate: u64,
    /// High/urgent without action items
    pub within_24h: u64,
    /// Medium priority
    pub within_48h: u64,
    /// Everything else
    pub no_rush: u64,
}

/// Derived statistics for the dashboard and CLI views.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Number of known senders
    pub total_senders: usize,
    /// Sum of interaction counts over all profiles
    pub total_interactions: i64,
    /// Number of recorded user actions
    pub total_actions: usize,
    /// Profiles by interaction count descending, ties in insertion order
    pub top_senders: Vec<SenderProfile>,
    /// Count per priority tier; High/Medium/Low always present, unknown
    /// tiers appear under their own key
    pub priority_distribution: HashMap<String, u64>,
    /// Count per observed action type
    pub action_distribution: HashMap<String, u64>,
    /// Weighted average priority (High 3, Medium 2, Low 1), one decimal;
    /// None when no priorities were recorded
    pub average_priority: Option<f64>,
    /// Most recent history entries
    pub recent_activity: Vec<PriorityHistoryEntry>,
    /// Count per category across history entries
    pub category_distribution: HashMap<String, u64>,
    /// Analyses per local calendar day; index 6 = today, 0 = six days ago
    pub daily_timeline: [u64; 7],
    /// Analyses per local hour of day
    pub hourly_histogram: [u64; 24],
    /// Response-urgency buckets over the stored analyses
    pub urgency: UrgencyBreakdown,
}

impl Report {
    /// Build a report from collection contents. Pure: calling it again
    /// with the same slices and `now` yields an identical report.
    pub fn build(
        senders: &[SenderProfile],
        history: &[PriorityHistoryEntry],
        actions: &[ActionPatternEntry],
        contexts: &[EmailContextEntry],
        now: DateTime<Utc>,
    ) -> Self {
        let total_senders = senders.len();
        let total_interactions = senders.iter().map(|s| s.interaction_count).sum();

        // Stable sort keeps insertion order among equal counts
        let mut top_senders = senders.to_vec();
        top_senders.sort_by(|a, b| b.interaction_count.cmp(&a.interaction_count));
        top_senders.truncate(TOP_N);

        let mut priority_distribution: HashMap<String, u64> = HashMap::new();
        for tier in ["High", "Medium", "Low"] {
            priority_distribution.insert(tier.to_string(), 0);
        }
        for entry in history {
            *priority_distribution
                .entry(entry.predicted_priority.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut action_distribution: HashMap<String, u64> = HashMap::new();
        for action in actions {
            *action_distribution
                .entry(action.action_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let average_priority = average_priority(&priority_distribution);

        let mut recent = history.to_vec();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        recent.truncate(TOP_N);

        let mut category_distribution: HashMap<String, u64> = HashMap::new();
        for entry in history {
            for category in &entry.categories {
                *category_distribution.entry(category.clone()).or_insert(0) += 1;
            }
        }

        let today = now.with_timezone(&Local).date_naive();
        let mut daily_timeline = [0u64; 7];
        let mut hourly_histogram = [0u64; 24];
        for entry in history {
            let local = entry.timestamp.with_timezone(&Local);
            let days_ago = (today - local.date_naive()).num_days();
            if (0..7).contains(&days_ago) {
                daily_timeline[(6 - days_ago) as usize] += 1;
            }
            hourly_histogram[local.hour() as usize] += 1;
        }

        let mut urgency = UrgencyBreakdown::default();
        for context in contexts {
            match context.analysis.urgency() {
                crate::types::ResponseUrgency::Immediate => urgency.immediate += 1,
                crate::types::ResponseUrgency::Within24h => urgency.within_24h += 1,
                crate::types::ResponseUrgency::Within48h => urgency.within_48h += 1,
                crate::types::ResponseUrgency::NoRush => urgency.no_rush += 1,
            }
        }

        Report {
            total_senders,
            total_interactions,
            total_actions: actions.len(),
            top_senders,
            priority_distribution,
            action_distribution,
            average_priority,
            recent_activity: recent,
            category_distribution,
            daily_timeline,
            hourly_histogram,
            urgency,
        }
    }

    /// Render the average priority for display; `-` when nothing was
    /// classified yet.
    pub fn format_average_priority(&self) -> String {
        match self.average_priority {
            Some(avg) => format!("{:.1}", avg),
            None => "-".to_string(),
        }
    }
}

/// Weighted average over a priority distribution. Unknown tiers weigh 0
/// but still count toward the denominator.
fn average_priority(distribution: &HashMap<String, u64>) -> Option<f64> {
    let total: u64 = distribution.values().sum();
    if total == 0 {
        return None;
    }

    let weighted: u64 = distribution
        .iter()
        .map(|(tier, count)| Tier::from(tier.as_str()).weight() * count)
        .sum();

    let avg = weighted as f64 / total as f64;
    Some((avg * 10.0).round() / 10.0)
}

/// Load the current collection contents and build a report from them.
pub fn snapshot(db: &Database) -> Result<Report> {
    let senders = db.list_sender_profiles()?;
    let history = db.all_priority_history(SNAPSHOT_HISTORY_LIMIT)?;
    let actions = db.action_patterns(SNAPSHOT_HISTORY_LIMIT)?;
    let contexts = db.list_email_contexts()?;

    Ok(Report::build(
        &senders,
        &history,
        &actions,
        &contexts,
        Utc::now(),
    ))
}
