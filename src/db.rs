use crate::config::{AppPaths, profile_slug};
use crate::state::AppState;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Local key-value snapshot store, one SQLite file per profile.
pub struct Db {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub key: String,
    pub bytes: usize,
    pub updated_at: DateTime<Utc>,
}

impl Db {
    pub fn open(paths: &AppPaths, profile: &str) -> Result<(Self, PathBuf)> {
        let slug = profile_slug(profile);
        let profile_dir = paths.data_dir.join("profiles").join(slug);
        fs::create_dir_all(&profile_dir)
            .with_context(|| format!("Failed to create profile dir {}", profile_dir.display()))?;

        let db_path = profile_dir.join("divfolio.sqlite3");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open DB {}", db_path.display()))?;

        let db = Self { conn };
        db.migrate()?;
        Ok((db, db_path))
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get_snapshot(&self, key: &str) -> Result<Option<String>> {
        let raw = self
            .conn
            .query_row(
                "SELECT value_json FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(raw)
    }

    pub fn put_snapshot(&self, key: &str, json: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO snapshots (key, value_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at
            "#,
            params![key, json, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, length(value_json), updated_at FROM snapshots ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let bytes: i64 = row.get(1)?;
            let updated_at: String = row.get(2)?;
            Ok((key, bytes, updated_at))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, bytes, updated_at) = row?;
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .context("Invalid updated_at in snapshots table")?
                .with_timezone(&Utc);
            out.push(SnapshotInfo {
                key,
                bytes: bytes.max(0) as usize,
                updated_at,
            });
        }
        Ok(out)
    }
}

/// Restores the state stored under `key`.
///
/// A missing snapshot, or one whose shape no longer parses, starts over with
/// the sample state.
pub fn load_state(db: &Db, key: &str) -> Result<AppState> {
    let Some(raw) = db.get_snapshot(key)? else {
        info!(key, "no snapshot under current key; starting from sample data");
        return Ok(AppState::sample());
    };

    match serde_json::from_str::<AppState>(&raw) {
        Ok(state) => Ok(state),
        Err(err) => {
            warn!(key, error = %err, "snapshot does not match current shape; starting over");
            Ok(AppState::sample())
        }
    }
}

pub fn save_state(db: &Db, key: &str, state: &AppState, at: DateTime<Utc>) -> Result<()> {
    let json = serde_json::to_string(state).context("Failed to serialize state snapshot")?;
    db.put_snapshot(key, &json, at)
        .with_context(|| format!("Failed to write snapshot '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Command, apply};

    fn paths(dir: &tempfile::TempDir) -> AppPaths {
        AppPaths {
            config_dir: dir.path().join("config"),
            data_dir: dir.path().join("data"),
        }
    }

    #[test]
    fn missing_snapshot_starts_from_sample() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (db, path) = Db::open(&paths(&dir), "Personal").expect("open");
        assert!(path.ends_with("profiles/personal/divfolio.sqlite3"));
        let state = load_state(&db, "state-v1").expect("load");
        assert_eq!(state, AppState::sample());
    }

    #[test]
    fn snapshot_round_trips_including_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (db, _) = Db::open(&paths(&dir), "default").expect("open");
        let (state, _) = apply(
            &AppState::empty(),
            Command::UpsertHistory {
                date: "2025-05".into(),
                value: 10.0,
            },
        );
        save_state(&db, "state-v1", &state, Utc::now()).expect("save");
        let restored = load_state(&db, "state-v1").expect("load");
        assert_eq!(restored, state);

        let listed = db.list_snapshots().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "state-v1");
    }

    #[test]
    fn unreadable_snapshot_starts_over() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (db, _) = Db::open(&paths(&dir), "default").expect("open");
        db.put_snapshot("state-v1", r#"{"portfolio": 3}"#, Utc::now())
            .expect("put");
        let state = load_state(&db, "state-v1").expect("load");
        assert_eq!(state, AppState::sample());
    }

    #[test]
    fn a_new_key_does_not_read_old_snapshots() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (db, _) = Db::open(&paths(&dir), "default").expect("open");
        save_state(&db, "state-v1", &AppState::empty(), Utc::now()).expect("save");
        let state = load_state(&db, "state-v2").expect("load");
        assert_eq!(state, AppState::sample());
    }
}
