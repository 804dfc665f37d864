//! SQLite-backed stores via an r2d2 connection pool.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

use super::{
    format_timestamp, migrations, now, parse_timestamp, HistoryEntry, HistoryStore,
    PlaybackPosition, PositionStore,
};
use crate::error::StoreError;
use crate::library::FileType;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const HISTORY_COLS: &str = "path, name, file_type, view_count, last_watched";

pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and run pending
    /// migrations.
    ///
    /// Every connection runs in WAL mode with `synchronous = FULL`, so a
    /// write that returned survives a crash.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = FULL;",
            )
        });

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {e}")))?;

        let store = Self { pool };
        migrations::run_migrations(&*store.conn()?)?;
        tracing::info!(path = %path.display(), "opened playback database");
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// Each call creates a uniquely named shared-cache database. The pool
    /// holds a single connection since shared-cache locks are not retried.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:playback_memdb_{n}?mode=memory&cache=shared");

        let manager = SqliteConnectionManager::file(uri);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory pool: {e}")))?;

        let store = Self { pool };
        migrations::run_migrations(&*store.conn()?)?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection, StoreError> {
        Ok(self.pool.get()?)
    }
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, i64, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn history_entry(
    (path, name, file_type, view_count, last_watched): (String, String, String, i64, String),
) -> Result<HistoryEntry, StoreError> {
    let file_type: FileType = file_type.parse().map_err(StoreError::Corrupt)?;
    Ok(HistoryEntry {
        path,
        name,
        file_type,
        view_count: u64::try_from(view_count)
            .map_err(|_| StoreError::Corrupt(format!("view_count {}", view_count)))?,
        last_watched: parse_timestamp(&last_watched)?,
    })
}

impl PositionStore for SqliteStore {
    fn save_position(&self, path: &str, seconds: f64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO playback_positions (path, position_seconds, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET
                position_seconds = excluded.position_seconds,
                updated_at = excluded.updated_at",
            params![path, seconds, format_timestamp(&now())],
        )?;
        Ok(())
    }

    fn get_position(&self, path: &str) -> Result<Option<PlaybackPosition>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT position_seconds, updated_at FROM playback_positions WHERE path = ?1",
                [path],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((position_seconds, updated_at)) => Ok(Some(PlaybackPosition {
                path: path.to_string(),
                position_seconds,
                updated_at: parse_timestamp(&updated_at)?,
            })),
            None => Ok(None),
        }
    }
}

impl HistoryStore for SqliteStore {
    fn record_view(
        &self,
        path: &str,
        name: &str,
        file_type: FileType,
    ) -> Result<HistoryEntry, StoreError> {
        let conn = self.conn()?;
        // One statement: concurrent views of the same path each add exactly 1.
        let q = format!(
            "INSERT INTO watch_history (path, name, file_type, view_count, last_watched)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(path) DO UPDATE SET
                name = excluded.name,
                file_type = excluded.file_type,
                view_count = view_count + 1,
                last_watched = max(last_watched, excluded.last_watched)
             RETURNING {HISTORY_COLS}"
        );
        let row = conn.query_row(
            &q,
            params![path, name, file_type.as_str(), format_timestamp(&now())],
            history_from_row,
        )?;
        history_entry(row)
    }

    fn list_history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, StoreError> {
        let conn = self.conn()?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let q = format!(
            "SELECT {HISTORY_COLS} FROM watch_history
             ORDER BY last_watched DESC, path ASC LIMIT ?1"
        );
        let mut stmt = conn.prepare(&q)?;
        let rows = stmt
            .query_map([limit], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(history_entry).collect()
    }
}
