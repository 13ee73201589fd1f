//! One-time import of the legacy flat analysis list
//!
//! Earlier versions persisted a single flat list of analysis records
//! (`analyses.json`) instead of the structured collections. When that file
//! exists and both `sender_profiles` and `priority_history` are still
//! empty, the list is deterministically rebuilt into the structured
//! collections: interaction counts incremented per appearance, one history
//! row per analysis. Afterwards the structured read path is authoritative.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::params;

use crate::error::Result;
use crate::types::Analysis;

use super::repo::Database;

impl Database {
    /// Whether the structured collections have never been written
    pub fn structured_collections_empty(&self) -> Result<bool> {
        Ok(self.sender_profile_count()? == 0 && self.priority_history_count()? == 0)
    }

    /// Rebuild sender profiles and priority history from a legacy flat
    /// list of analyses. Returns the number of history rows created, or 0
    /// when the structured collections already hold data.
    ///
    /// Runs in one transaction: either the whole list lands or none of it.
    pub fn import_legacy_analyses(&self, analyses: &[Analysis]) -> Result<usize> {
        if analyses.is_empty() || !self.structured_collections_empty()? {
            return Ok(0);
        }

        // First appearance of each sender fixes name/importance/categories;
        // every appearance increments the count.
        let mut counts: HashMap<&str, i64> = HashMap::new();
        let mut order: Vec<&Analysis> = Vec::new();
        for analysis in analyses {
            let entry = counts.entry(analysis.email_data.sender.as_str()).or_insert(0);
            if *entry == 0 {
                order.push(analysis);
            }
            *entry += 1;
        }

        let now = chrono::Utc::now();
        let mut conn = self.connection();
        let tx = conn.transaction()?;

        for first in &order {
            let sender = first.email_data.sender.as_str();
            tx.execute(
                r#"
                INSERT INTO sender_profiles (email, name, importance, interaction_count,
                                             last_interaction, last_interaction_type,
                                             avg_response_time, categories)
                VALUES (?1, ?2, ?3, ?4, ?5, 'imported', 0, ?6)
                "#,
                params![
                    sender,
                    first.email_data.sender_name,
                    first.sender_importance.as_str(),
                    counts[sender],
                    now.to_rfc3339(),
                    serde_json::to_string(&first.categories)?,
                ],
            )?;
        }

        for analysis in analyses {
            tx.execute(
                r#"
                INSERT INTO priority_history (email_id, sender_email, predicted_priority,
                                              actual_priority, categories, timestamp)
                VALUES (?1, ?2, ?3, NULL, ?4, ?5)
                "#,
                params![
                    uuid::Uuid::new_v4().to_string(),
                    analysis.email_data.sender,
                    analysis.priority.as_str(),
                    serde_json::to_string(&analysis.categories)?,
                    now.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;

        tracing::info!(
            analyses = analyses.len(),
            senders = order.len(),
            "Imported legacy analysis list into structured collections"
        );

        Ok(analyses.len())
    }
}

/// Read a legacy analyses file and import it if the structured collections
/// are empty. Missing file is not an error; a malformed file is.
pub fn run_legacy_import(db: &Database, path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let content = std::fs::read_to_string(path)?;
    let analyses: Vec<Analysis> = serde_json::from_str(&content)?;

    db.import_legacy_analyses(&analyses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmailData, Tier};
    use chrono::Utc;

    fn legacy_analysis(sender: &str, priority: Tier) -> Analysis {
        Analysis {
            priority,
            priority_reason: String::new(),
            sender_importance: Tier::Medium,
            importance_reason: String::new(),
            summary: "imported".to_string(),
            action_items: vec![],
            categories: vec!["Work".to_string()],
            email_data: EmailData {
                sender: sender.to_string(),
                sender_name: sender.to_string(),
                subject: "Old".to_string(),
                body: String::new(),
                date: String::new(),
                timestamp: Utc::now(),
            },
        }
    }

    #[test]
    fn test_import_builds_profiles_and_history() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let analyses = vec![
            legacy_analysis("a@example.com", Tier::High),
            legacy_analysis("a@example.com", Tier::Low),
            legacy_analysis("b@example.com", Tier::Medium),
        ];

        let imported = db.import_legacy_analyses(&analyses).unwrap();
        assert_eq!(imported, 3);

        let a = db.get_sender_profile("a@example.com").unwrap().unwrap();
        assert_eq!(a.interaction_count, 2);
        assert_eq!(a.categories, vec!["Work".to_string()]);

        let b = db.get_sender_profile("b@example.com").unwrap().unwrap();
        assert_eq!(b.interaction_count, 1);

        assert_eq!(db.priority_history_count().unwrap(), 3);
    }

    #[test]
    fn test_import_is_one_time() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let analyses = vec![legacy_analysis("a@example.com", Tier::High)];
        assert_eq!(db.import_legacy_analyses(&analyses).unwrap(), 1);

        // Collections are no longer empty, so a second import is a no-op
        assert_eq!(db.import_legacy_analyses(&analyses).unwrap(), 0);
        let a = db.get_sender_profile("a@example.com").unwrap().unwrap();
        assert_eq!(a.interaction_count, 1);
    }

    #[test]
    fn test_import_skipped_when_structured_data_exists() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        db.upsert_sender_profile("live@example.com", "Live", &Tier::Low, "analyzed")
            .unwrap();

        let analyses = vec![legacy_analysis("a@example.com", Tier::High)];
        assert_eq!(db.import_legacy_analyses(&analyses).unwrap(), 0);
        assert!(db.get_sender_profile("a@example.com").unwrap().is_none());
    }

    #[test]
    fn test_run_legacy_import_missing_file() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyses.json");
        assert_eq!(run_legacy_import(&db, &path).unwrap(), 0);
    }

    #[test]
    fn test_run_legacy_import_from_file() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let analyses = vec![
            legacy_analysis("a@example.com", Tier::High),
            legacy_analysis("b@example.com", Tier::Low),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyses.json");
        std::fs::write(&path, serde_json::to_string(&analyses).unwrap()).unwrap();

        assert_eq!(run_legacy_import(&db, &path).unwrap(), 2);
        assert_eq!(db.sender_profile_count().unwrap(), 2);
    }
}
