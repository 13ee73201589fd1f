//! Core domain types for mailsift
//!
//! These types form the canonical data model shared by the aggregation
//! store, the analytics engine, and the classification gateway.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Sender profile** | Aggregate record of interaction history with one email address |
//! | **Tier** | High/Medium/Low urgency or importance as judged by the classifier |
//! | **Priority history** | Append-only log of predicted priorities, one row per analysis |
//! | **Action pattern** | Append-only log of user actions (replied, archived, ...) |
//! | **Email context** | Latest full analysis per email, recalled for sender context |
//! | **Analysis** | Normalized classifier output merged with the scraped email |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================
// Tiers
// ============================================

/// Priority or sender-importance tier.
///
/// The classifier is asked for High/Medium/Low, but responses are free-form
/// text; anything else is preserved as [`Tier::Other`] so distributions can
/// count it without crashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tier {
    High,
    Medium,
    Low,
    Other(String),
}

impl Tier {
    pub fn as_str(&self) -> &str {
        match self {
            Tier::High => "High",
            Tier::Medium => "Medium",
            Tier::Low => "Low",
            Tier::Other(s) => s,
        }
    }

    /// Weight used for the average-priority score. Unknown tiers weigh 0
    /// but still count toward the denominator.
    pub fn weight(&self) -> u64 {
        match self {
            Tier::High => 3,
            Tier::Medium => 2,
            Tier::Low => 1,
            Tier::Other(_) => 0,
        }
    }

    /// Whether this tier counts as high urgency ("High" or "Urgent").
    pub fn is_high(&self) -> bool {
        match self {
            Tier::High => true,
            Tier::Other(s) => s.eq_ignore_ascii_case("urgent"),
            _ => false,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Medium
    }
}

impl From<&str> for Tier {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("high") {
            Tier::High
        } else if s.eq_ignore_ascii_case("medium") {
            Tier::Medium
        } else if s.eq_ignore_ascii_case("low") {
            Tier::Low
        } else {
            Tier::Other(s.to_string())
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Tier::from(s.as_str()))
    }
}

// ============================================
// Actions
// ============================================

/// User actions tracked in the action-pattern log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Replied,
    Archived,
    Deleted,
    Starred,
    Read,
    Ignored,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Replied => "replied",
            ActionType::Archived => "archived",
            ActionType::Deleted => "deleted",
            ActionType::Starred => "starred",
            ActionType::Read => "read",
            ActionType::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replied" => Ok(ActionType::Replied),
            "archived" => Ok(ActionType::Archived),
            "deleted" => Ok(ActionType::Deleted),
            "starred" => Ok(ActionType::Starred),
            "read" => Ok(ActionType::Read),
            "ignored" => Ok(ActionType::Ignored),
            _ => Err(format!("unknown action type: {}", s)),
        }
    }
}

// ============================================
// Sender profiles
// ============================================

/// Aggregate interaction record for one sender, keyed by email address.
///
/// Created on first interaction and mutated on every subsequent one; the
/// store never deletes profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderProfile {
    /// Email address (primary key)
    pub email: String,
    /// Display name as last scraped
    pub name: String,
    /// Importance tier from the most recent analysis
    pub importance: Tier,
    /// Number of interactions recorded through the store's update path
    pub interaction_count: i64,
    /// When the sender was last seen
    pub last_interaction: DateTime<Utc>,
    /// What the last interaction was ("analyzed", an action type, ...)
    pub last_interaction_type: String,
    /// Reserved: tracked in the schema, never computed
    pub avg_response_time: f64,
    /// Categories associated with this sender
    pub categories: Vec<String>,
}

// ============================================
// Priority history
// ============================================

/// One append-only row per classified email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityHistoryEntry {
    /// Store-assigned id, monotonically increasing, never reused
    pub id: i64,
    /// Identifier of the source email
    pub email_id: String,
    /// Sender address (unenforced foreign key into sender profiles)
    pub sender_email: String,
    /// Tier the classifier predicted
    pub predicted_priority: Tier,
    /// User-corrected tier, when one exists
    pub actual_priority: Option<Tier>,
    /// Categories from the analysis
    pub categories: Vec<String>,
    /// When the row was appended
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Action patterns
// ============================================

/// One append-only row per observed user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPatternEntry {
    /// Store-assigned id
    pub id: i64,
    /// What the user did
    pub action_type: ActionType,
    /// Category the email belonged to
    pub category: String,
    /// Sender the action applied to
    pub sender_email: String,
    /// When the action happened
    pub timestamp: DateTime<Utc>,
    /// Free-form extra detail
    pub metadata: serde_json::Value,
}

// ============================================
// Email context
// ============================================

/// Latest-write-wins context per email id, used to recall prior
/// conversations with a sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContextEntry {
    /// Source email identifier (primary key)
    pub email_id: String,
    pub sender_email: String,
    pub subject: String,
    pub summary: String,
    /// Full analysis record
    pub analysis: Analysis,
    /// Original scraped content
    pub full_content: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Scraped email input
// ============================================

fn unknown() -> String {
    "Unknown".to_string()
}

/// Scraped email fields handed over by the external scraping collaborator.
///
/// camelCase serde: this is the wire shape the scraper emits and the legacy
/// flat list stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailData {
    #[serde(default = "unknown")]
    pub sender: String,
    #[serde(default = "unknown")]
    pub sender_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    /// Display date as scraped (free-form)
    #[serde(default)]
    pub date: String,
    /// Capture time, unix milliseconds on the wire
    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Analysis record
// ============================================

/// Normalized classifier output merged with the originating email.
///
/// Same camelCase shape as the provider responses and the legacy flat list,
/// so one struct parses all three.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub priority: Tier,
    #[serde(default)]
    pub priority_reason: String,
    #[serde(default)]
    pub sender_importance: Tier,
    #[serde(default)]
    pub importance_reason: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// The scraped email this analysis is for
    pub email_data: EmailData,
}

impl Analysis {
    /// Whether the classifier suggested concrete follow-up work.
    pub fn requires_action(&self) -> bool {
        !self.action_items.is_empty()
    }

    /// Response-time urgency bucket for this analysis.
    pub fn urgency(&self) -> ResponseUrgency {
        ResponseUrgency::classify(&self.priority, self.requires_action())
    }
}

// ============================================
// Response urgency
// ============================================

/// How quickly an email deserves a response, derived deterministically from
/// its priority tier and whether it carries action items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseUrgency {
    Immediate,
    Within24h,
    Within48h,
    NoRush,
}

impl ResponseUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseUrgency::Immediate => "immediate",
            ResponseUrgency::Within24h => "within24h",
            ResponseUrgency::Within48h => "within48h",
            ResponseUrgency::NoRush => "noRush",
        }
    }

    /// High/urgent with action items is immediate; high/urgent otherwise is
    /// a day; medium is two days; everything else can wait.
    pub fn classify(priority: &Tier, requires_action: bool) -> Self {
        if priority.is_high() {
            if requires_action {
                ResponseUrgency::Immediate
            } else {
                ResponseUrgency::Within24h
            }
        } else if matches!(priority, Tier::Medium) {
            ResponseUrgency::Within48h
        } else {
            ResponseUrgency::NoRush
        }
    }
}

impl std::fmt::Display for ResponseUrgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse_roundtrip() {
        assert_eq!(Tier::from("High"), Tier::High);
        assert_eq!(Tier::from("medium"), Tier::Medium);
        assert_eq!(Tier::from("LOW"), Tier::Low);
        assert_eq!(Tier::from("Urgent"), Tier::Other("Urgent".to_string()));
        assert_eq!(Tier::from("Urgent").as_str(), "Urgent");
    }

    #[test]
    fn test_tier_weights() {
        assert_eq!(Tier::High.weight(), 3);
        assert_eq!(Tier::Medium.weight(), 2);
        assert_eq!(Tier::Low.weight(), 1);
        assert_eq!(Tier::Other("Spam".to_string()).weight(), 0);
    }

    #[test]
    fn test_urgency_classification() {
        assert_eq!(
            ResponseUrgency::classify(&Tier::High, true),
            ResponseUrgency::Immediate
        );
        assert_eq!(
            ResponseUrgency::classify(&Tier::High, false),
            ResponseUrgency::Within24h
        );
        assert_eq!(
            ResponseUrgency::classify(&Tier::Medium, false),
            ResponseUrgency::Within48h
        );
        assert_eq!(
            ResponseUrgency::classify(&Tier::Low, true),
            ResponseUrgency::NoRush
        );
        // "Urgent" counts as high
        assert_eq!(
            ResponseUrgency::classify(&Tier::Other("urgent".to_string()), true),
            ResponseUrgency::Immediate
        );
    }

    #[test]
    fn test_email_data_defaults() {
        let email: EmailData = serde_json::from_str(r#"{"subject": "Hi"}"#).unwrap();
        assert_eq!(email.sender, "Unknown");
        assert_eq!(email.sender_name, "Unknown");
        assert_eq!(email.subject, "Hi");
        assert!(email.body.is_empty());
    }

    #[test]
    fn test_analysis_camel_case_shape() {
        let json = r#"{
            "priority": "High",
            "priorityReason": "deadline tomorrow",
            "senderImportance": "Medium",
            "importanceReason": "known contact",
            "summary": "Project update",
            "actionItems": ["reply"],
            "categories": ["Work"],
            "emailData": {
                "sender": "a@example.com",
                "senderName": "A",
                "subject": "Update",
                "body": "...",
                "date": "Mon",
                "timestamp": 1700000000000
            }
        }"#;
        let analysis: Analysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.priority, Tier::High);
        assert!(analysis.requires_action());
        assert_eq!(analysis.urgency(), ResponseUrgency::Immediate);
        assert_eq!(analysis.email_data.sender, "a@example.com");
    }
}
