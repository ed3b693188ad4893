// SQLite persistence for the reload-guard leaderboard snapshot.
//
// A single-slot store: the last rendered leaderboard is written on every
// render pass and read back once at startup so the view has something to
// show before the first fetch completes. Snapshots older than the TTL are
// ignored; the table never grows beyond one row.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::protocol::LeaderboardEntry;

pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    /// Open (or create) a SQLite database at `path` and ensure the snapshot
    /// table exists. Pass `":memory:"` for an ephemeral in-memory database
    /// (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open snapshot store at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set snapshot store pragmas")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS leaderboard_snapshot (
                id       INTEGER PRIMARY KEY CHECK (id = 1),
                payload  TEXT NOT NULL,
                saved_at TEXT NOT NULL
             );",
        )
        .context("failed to create snapshot schema")?;

        Ok(SnapshotStore {
            conn: Mutex::new(conn),
        })
    }

    /// Persist the latest leaderboard, replacing any previous snapshot.
    pub fn save_leaderboard(&self, entries: &[LeaderboardEntry]) -> Result<()> {
        self.save_leaderboard_at(entries, Utc::now())
    }

    /// Like [`save_leaderboard`](Self::save_leaderboard) with an explicit
    /// timestamp, so tests can plant stale snapshots.
    pub fn save_leaderboard_at(
        &self,
        entries: &[LeaderboardEntry],
        saved_at: DateTime<Utc>,
    ) -> Result<()> {
        let payload =
            serde_json::to_string(entries).context("failed to serialize leaderboard snapshot")?;
        let conn = self.conn.lock().expect("snapshot store mutex poisoned");
        conn.execute(
            "INSERT INTO leaderboard_snapshot (id, payload, saved_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET payload = ?1, saved_at = ?2",
            params![payload, saved_at.to_rfc3339()],
        )
        .context("failed to write leaderboard snapshot")?;
        Ok(())
    }

    /// Load the persisted snapshot if one exists and is younger than `ttl`.
    ///
    /// A snapshot with an unparseable payload or timestamp is treated as
    /// absent rather than an error; it only ever guards a cold start.
    pub fn load_recent(&self, ttl: Duration) -> Result<Option<Vec<LeaderboardEntry>>> {
        let conn = self.conn.lock().expect("snapshot store mutex poisoned");
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, saved_at FROM leaderboard_snapshot WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("failed to read leaderboard snapshot")?;

        let Some((payload, saved_at)) = row else {
            return Ok(None);
        };

        let Ok(saved_at) = DateTime::parse_from_rfc3339(&saved_at) else {
            return Ok(None);
        };
        let age = Utc::now().signed_duration_since(saved_at.with_timezone(&Utc));
        if age.num_seconds() < 0 || age.to_std().map_or(true, |a| a > ttl) {
            return Ok(None);
        }

        Ok(serde_json::from_str(&payload).ok())
    }
}
