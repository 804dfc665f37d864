//! Embedded SQL migrations and runner.
//!
//! Migrations are `&str` constants executed in order. A `schema_migrations`
//! table tracks which versions have been applied.

use rusqlite::Connection;

use crate::error::StoreError;

/// V1: positions and watch history.
const V1_INITIAL: &str = r#"
CREATE TABLE playback_positions (
    path             TEXT PRIMARY KEY,
    position_seconds REAL NOT NULL CHECK (position_seconds >= 0),
    updated_at       TEXT NOT NULL
);

CREATE TABLE watch_history (
    path         TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    file_type    TEXT NOT NULL,
    view_count   INTEGER NOT NULL DEFAULT 1 CHECK (view_count >= 1),
    last_watched TEXT NOT NULL
);

CREATE INDEX idx_watch_history_last_watched ON watch_history(last_watched DESC, path);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Apply every migration not yet recorded in `schema_migrations`.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| StoreError::Database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
            [version],
            |row| row.get(0),
        )?;

        if already {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| StoreError::Database(format!("Migration V{version} failed: {e}")))?;
        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )?;
        tx.commit()?;

        tracing::info!(version, "applied database migration");
    }

    Ok(())
}
