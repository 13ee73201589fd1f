//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: the four analytics collections
    r#"
    -- ============================================
    -- Sender profiles (one row per email address)
    -- ============================================

    CREATE TABLE IF NOT EXISTS sender_profiles (
        email                 TEXT PRIMARY KEY,
        name                  TEXT NOT NULL,
        importance            TEXT NOT NULL,
        interaction_count     INTEGER NOT NULL DEFAULT 0,
        last_interaction      DATETIME NOT NULL,
        last_interaction_type TEXT NOT NULL,
        avg_response_time     REAL NOT NULL DEFAULT 0,
        categories            JSON NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_sender_profiles_importance ON sender_profiles(importance);
    CREATE INDEX IF NOT EXISTS idx_sender_profiles_interactions ON sender_profiles(interaction_count);
    CREATE INDEX IF NOT EXISTS idx_sender_profiles_last_interaction ON sender_profiles(last_interaction DESC);

    -- ============================================
    -- Priority history (append-only)
    -- ============================================

    CREATE TABLE IF NOT EXISTS priority_history (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        email_id           TEXT NOT NULL,
        sender_email       TEXT NOT NULL,
        predicted_priority TEXT NOT NULL,
        actual_priority    TEXT,
        categories         JSON NOT NULL,
        timestamp          DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_priority_history_email ON priority_history(email_id);
    CREATE INDEX IF NOT EXISTS idx_priority_history_sender ON priority_history(sender_email);
    CREATE INDEX IF NOT EXISTS idx_priority_history_priority ON priority_history(predicted_priority);
    CREATE INDEX IF NOT EXISTS idx_priority_history_ts ON priority_history(timestamp DESC);

    -- ============================================
    -- Action patterns (append-only)
    -- ============================================

    CREATE TABLE IF NOT EXISTS action_patterns (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        action_type  TEXT NOT NULL,
        category     TEXT NOT NULL,
        sender_email TEXT NOT NULL,
        timestamp    DATETIME NOT NULL,
        metadata     JSON NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_action_patterns_type ON action_patterns(action_type);
    CREATE INDEX IF NOT EXISTS idx_action_patterns_category ON action_patterns(category);
    CREATE INDEX IF NOT EXISTS idx_action_patterns_ts ON action_patterns(timestamp DESC);

    -- ============================================
    -- Email context (latest write wins per email)
    -- ============================================

    CREATE TABLE IF NOT EXISTS email_context (
        email_id     TEXT PRIMARY KEY,
        sender_email TEXT NOT NULL,
        subject      TEXT NOT NULL,
        summary      TEXT NOT NULL,
        analysis     JSON NOT NULL,
        full_content TEXT NOT NULL,
        timestamp    DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_email_context_sender ON email_context(sender_email);
    CREATE INDEX IF NOT EXISTS idx_email_context_ts ON email_context(timestamp DESC);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
