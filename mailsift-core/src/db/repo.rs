//! Database repository layer
//!
//! The aggregation store: query and mutation operations for the four
//! analytics collections. Every public operation maps to exactly one
//! commit; storage failures surface as [`Error::Storage`] and are never
//! retried here.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Database handle with a single serialized connection
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrency between readers and the writer
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Sender profile operations
    // ============================================

    /// Record an interaction with a sender and return the updated profile.
    ///
    /// Read-modify-write in a single transaction: the interaction count is
    /// incremented, the last-interaction fields refreshed, name and
    /// importance overwritten with the latest values; categories and the
    /// reserved avg_response_time carry over unchanged. The upsert keeps
    /// the row's rowid, so insertion order stays meaningful.
    pub fn upsert_sender_profile(
        &self,
        email: &str,
        name: &str,
        importance: &Tier,
        interaction_type: &str,
    ) -> Result<SenderProfile> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT interaction_count, avg_response_time, categories
                 FROM sender_profiles WHERE email = ?",
                [email],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let (count, avg_response_time, categories) = match existing {
            Some((count, avg, categories_json)) => (
                count,
                avg,
                serde_json::from_str(&categories_json).unwrap_or_default(),
            ),
            None => (0, 0.0, Vec::new()),
        };

        let profile = SenderProfile {
            email: email.to_string(),
            name: name.to_string(),
            importance: importance.clone(),
            interaction_count: count + 1,
            last_interaction: Utc::now(),
            last_interaction_type: interaction_type.to_string(),
            avg_response_time,
            categories,
        };

        tx.execute(
            r#"
            INSERT INTO sender_profiles (email, name, importance, interaction_count,
                                         last_interaction, last_interaction_type,
                                         avg_response_time, categories)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(email) DO UPDATE SET
                name = excluded.name,
                importance = excluded.importance,
                interaction_count = excluded.interaction_count,
                last_interaction = excluded.last_interaction,
                last_interaction_type = excluded.last_interaction_type
            "#,
            params![
                profile.email,
                profile.name,
                profile.importance.as_str(),
                profile.interaction_count,
                profile.last_interaction.to_rfc3339(),
                profile.last_interaction_type,
                profile.avg_response_time,
                serde_json::to_string(&profile.categories)?,
            ],
        )?;

        tx.commit()?;
        Ok(profile)
    }

    /// Get a sender profile by email
    pub fn get_sender_profile(&self, email: &str) -> Result<Option<SenderProfile>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM sender_profiles WHERE email = ?",
            [email],
            Self::row_to_profile,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List all sender profiles in insertion order
    pub fn list_sender_profiles(&self) -> Result<Vec<SenderProfile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM sender_profiles ORDER BY rowid ASC")?;

        let profiles = stmt
            .query_map([], Self::row_to_profile)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(profiles)
    }

    /// Number of sender profiles
    pub fn sender_profile_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM sender_profiles", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_profile(row: &Row) -> rusqlite::Result<SenderProfile> {
        let importance_str: String = row.get("importance")?;
        let last_interaction_str: String = row.get("last_interaction")?;
        let categories_str: String = row.get("categories")?;

        Ok(SenderProfile {
            email: row.get("email")?,
            name: row.get("name")?,
            importance: Tier::from(importance_str.as_str()),
            interaction_count: row.get("interaction_count")?,
            last_interaction: DateTime::parse_from_rfc3339(&last_interaction_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            last_interaction_type: row.get("last_interaction_type")?,
            avg_response_time: row.get("avg_response_time")?,
            categories: serde_json::from_str(&categories_str).unwrap_or_default(),
        })
    }

    // ============================================
    // Priority history operations
    // ============================================

    /// Append a priority history row. Ids are assigned by the store,
    /// monotonically increasing and never reused.
    pub fn append_priority_history(
        &self,
        email_id: &str,
        sender_email: &str,
        predicted_priority: &Tier,
        actual_priority: Option<&Tier>,
        categories: &[String],
    ) -> Result<PriorityHistoryEntry> {
        let timestamp = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO priority_history (email_id, sender_email, predicted_priority,
                                          actual_priority, categories, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                email_id,
                sender_email,
                predicted_priority.as_str(),
                actual_priority.map(|t| t.as_str().to_string()),
                serde_json::to_string(categories)?,
                timestamp.to_rfc3339(),
            ],
        )?;

        Ok(PriorityHistoryEntry {
            id: conn.last_insert_rowid(),
            email_id: email_id.to_string(),
            sender_email: sender_email.to_string(),
            predicted_priority: predicted_priority.clone(),
            actual_priority: actual_priority.cloned(),
            categories: categories.to_vec(),
            timestamp,
        })
    }

    /// History for one sender, most recent first, truncated to `limit`
    pub fn priority_history_by_sender(
        &self,
        sender_email: &str,
        limit: usize,
    ) -> Result<Vec<PriorityHistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM priority_history WHERE sender_email = ?
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )?;

        let entries = stmt
            .query_map(params![sender_email, limit as i64], Self::row_to_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// All history, most recent first, truncated to `limit`
    pub fn all_priority_history(&self, limit: usize) -> Result<Vec<PriorityHistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM priority_history ORDER BY timestamp DESC, id DESC LIMIT ?")?;

        let entries = stmt
            .query_map([limit as i64], Self::row_to_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Number of priority history rows
    pub fn priority_history_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM priority_history", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_history(row: &Row) -> rusqlite::Result<PriorityHistoryEntry> {
        let predicted_str: String = row.get("predicted_priority")?;
        let actual_str: Option<String> = row.get("actual_priority")?;
        let categories_str: String = row.get("categories")?;
        let timestamp_str: String = row.get("timestamp")?;

        Ok(PriorityHistoryEntry {
            id: row.get("id")?,
            email_id: row.get("email_id")?,
            sender_email: row.get("sender_email")?,
            predicted_priority: Tier::from(predicted_str.as_str()),
            actual_priority: actual_str.map(|s| Tier::from(s.as_str())),
            categories: serde_json::from_str(&categories_str).unwrap_or_default(),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    // ============================================
    // Action pattern operations
    // ============================================

    /// Append an action pattern row
    pub fn record_action(
        &self,
        action_type: ActionType,
        category: &str,
        sender_email: &str,
        metadata: serde_json::Value,
    ) -> Result<ActionPatternEntry> {
        let timestamp = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO action_patterns (action_type, category, sender_email, timestamp, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                action_type.as_str(),
                category,
                sender_email,
                timestamp.to_rfc3339(),
                metadata.to_string(),
            ],
        )?;

        Ok(ActionPatternEntry {
            id: conn.last_insert_rowid(),
            action_type,
            category: category.to_string(),
            sender_email: sender_email.to_string(),
            timestamp,
            metadata,
        })
    }

    /// Recent actions, most recent first, truncated to `limit`
    pub fn action_patterns(&self, limit: usize) -> Result<Vec<ActionPatternEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM action_patterns ORDER BY timestamp DESC, id DESC LIMIT ?")?;

        let entries = stmt
            .query_map([limit as i64], Self::row_to_action)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// All actions in one category, most recent first
    pub fn action_patterns_by_category(&self, category: &str) -> Result<Vec<ActionPatternEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM action_patterns WHERE category = ?
             ORDER BY timestamp DESC, id DESC",
        )?;

        let entries = stmt
            .query_map([category], Self::row_to_action)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn row_to_action(row: &Row) -> rusqlite::Result<ActionPatternEntry> {
        let action_str: String = row.get("action_type")?;
        let timestamp_str: String = row.get("timestamp")?;
        let metadata_str: String = row.get("metadata")?;

        Ok(ActionPatternEntry {
            id: row.get("id")?,
            action_type: action_str.parse().unwrap_or(ActionType::Read),
            category: row.get("category")?,
            sender_email: row.get("sender_email")?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
        })
    }

    // ============================================
    // Email context operations
    // ============================================

    /// Save the full analysis context for an email. Full replace on write,
    /// keyed by email id: the latest analysis wins.
    pub fn upsert_email_context(
        &self,
        email_id: &str,
        sender_email: &str,
        subject: &str,
        summary: &str,
        analysis: &Analysis,
        full_content: &str,
    ) -> Result<EmailContextEntry> {
        let timestamp = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO email_context (email_id, sender_email, subject, summary,
                                       analysis, full_content, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(email_id) DO UPDATE SET
                sender_email = excluded.sender_email,
                subject = excluded.subject,
                summary = excluded.summary,
                analysis = excluded.analysis,
                full_content = excluded.full_content,
                timestamp = excluded.timestamp
            "#,
            params![
                email_id,
                sender_email,
                subject,
                summary,
                serde_json::to_string(analysis)?,
                full_content,
                timestamp.to_rfc3339(),
            ],
        )?;

        Ok(EmailContextEntry {
            email_id: email_id.to_string(),
            sender_email: sender_email.to_string(),
            subject: subject.to_string(),
            summary: summary.to_string(),
            analysis: analysis.clone(),
            full_content: full_content.to_string(),
            timestamp,
        })
    }

    /// Prior context for one sender, most recent first, truncated to `limit`
    pub fn email_context_by_sender(
        &self,
        sender_email: &str,
        limit: usize,
    ) -> Result<Vec<EmailContextEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM email_context WHERE sender_email = ?
             ORDER BY timestamp DESC, email_id ASC LIMIT ?",
        )?;

        let entries = stmt
            .query_map(params![sender_email, limit as i64], Self::row_to_context)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// All stored email contexts
    pub fn list_email_contexts(&self) -> Result<Vec<EmailContextEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM email_context ORDER BY timestamp DESC, email_id ASC")?;

        let entries = stmt
            .query_map([], Self::row_to_context)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn row_to_context(row: &Row) -> rusqlite::Result<EmailContextEntry> {
        let analysis_str: String = row.get("analysis")?;
        let timestamp_str: String = row.get("timestamp")?;

        let analysis: Analysis = serde_json::from_str(&analysis_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(EmailContextEntry {
            email_id: row.get("email_id")?,
            sender_email: row.get("sender_email")?,
            subject: row.get("subject")?,
            summary: row.get("summary")?,
            analysis,
            full_content: row.get("full_content")?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn test_email(sender: &str) -> EmailData {
        EmailData {
            sender: sender.to_string(),
            sender_name: "Test Sender".to_string(),
            subject: "Subject".to_string(),
            body: "Body".to_string(),
            date: "Mon".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn test_analysis(sender: &str) -> Analysis {
        Analysis {
            priority: Tier::High,
            priority_reason: "deadline".to_string(),
            sender_importance: Tier::Medium,
            importance_reason: "colleague".to_string(),
            summary: "Needs a reply".to_string(),
            action_items: vec!["reply".to_string()],
            categories: vec!["Work".to_string()],
            email_data: test_email(sender),
        }
    }

    #[test]
    fn test_upsert_profile_counts_calls() {
        let db = test_db();

        for _ in 0..5 {
            db.upsert_sender_profile("a@example.com", "A", &Tier::High, "analyzed")
                .unwrap();
        }

        let profile = db.get_sender_profile("a@example.com").unwrap().unwrap();
        assert_eq!(profile.interaction_count, 5);
        assert_eq!(profile.last_interaction_type, "analyzed");
    }

    #[test]
    fn test_upsert_profile_carries_categories_and_avg() {
        let db = test_db();

        db.upsert_sender_profile("a@example.com", "A", &Tier::Low, "analyzed")
            .unwrap();

        // Seed categories directly; the update path must not touch them
        {
            let conn = db.connection();
            conn.execute(
                "UPDATE sender_profiles SET categories = ?, avg_response_time = 4.5 WHERE email = ?",
                params![r#"["Work"]"#, "a@example.com"],
            )
            .unwrap();
        }

        let updated = db
            .upsert_sender_profile("a@example.com", "A2", &Tier::High, "replied")
            .unwrap();
        assert_eq!(updated.categories, vec!["Work".to_string()]);
        assert_eq!(updated.avg_response_time, 4.5);
        assert_eq!(updated.name, "A2");
        assert_eq!(updated.importance, Tier::High);
        assert_eq!(updated.interaction_count, 2);
    }

    #[test]
    fn test_history_ids_monotonic() {
        let db = test_db();

        let first = db
            .append_priority_history("e1", "a@example.com", &Tier::High, None, &[])
            .unwrap();
        let second = db
            .append_priority_history("e2", "a@example.com", &Tier::Low, None, &[])
            .unwrap();

        assert!(second.id > first.id);
    }

    #[test]
    fn test_history_ordering_and_limit() {
        let db = test_db();

        for i in 0..10 {
            db.append_priority_history(&format!("e{}", i), "a@example.com", &Tier::Medium, None, &[])
                .unwrap();
        }

        let entries = db.all_priority_history(4).unwrap();
        assert_eq!(entries.len(), 4);
        for pair in entries.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
        // Most recent append comes first
        assert_eq!(entries[0].email_id, "e9");
    }

    #[test]
    fn test_history_by_sender_filters() {
        let db = test_db();

        db.append_priority_history("e1", "a@example.com", &Tier::High, None, &[])
            .unwrap();
        db.append_priority_history("e2", "b@example.com", &Tier::Low, None, &[])
            .unwrap();

        let entries = db.priority_history_by_sender("a@example.com", 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].email_id, "e1");
    }

    #[test]
    fn test_actual_priority_roundtrip() {
        let db = test_db();

        db.append_priority_history("e1", "a@example.com", &Tier::High, Some(&Tier::Low), &[])
            .unwrap();

        let entries = db.all_priority_history(1).unwrap();
        assert_eq!(entries[0].actual_priority, Some(Tier::Low));
    }

    #[test]
    fn test_record_action_and_category_filter() {
        let db = test_db();

        db.record_action(
            ActionType::Replied,
            "Work",
            "a@example.com",
            serde_json::json!({"thread": "t1"}),
        )
        .unwrap();
        db.record_action(
            ActionType::Archived,
            "Newsletters",
            "b@example.com",
            serde_json::json!({}),
        )
        .unwrap();

        let work = db.action_patterns_by_category("Work").unwrap();
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].action_type, ActionType::Replied);
        assert_eq!(work[0].metadata["thread"], "t1");

        let all = db.action_patterns(10).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_email_context_replace_on_write() {
        let db = test_db();

        let analysis = test_analysis("a@example.com");
        db.upsert_email_context("e1", "a@example.com", "First", "s1", &analysis, "body1")
            .unwrap();
        db.upsert_email_context("e1", "a@example.com", "Second", "s2", &analysis, "body2")
            .unwrap();

        let contexts = db.email_context_by_sender("a@example.com", 10).unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].subject, "Second");
        assert_eq!(contexts[0].full_content, "body2");
        assert_eq!(contexts[0].analysis.priority, Tier::High);
    }
}
