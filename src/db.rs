use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::app::identity::PlaybackIdentity;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub(crate) identity: PlaybackIdentity,
    pub offset_seconds: f64,
    pub completed: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastPlayed {
    pub url: String,
    pub offset_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS episode_progress (
                user_id TEXT NOT NULL,
                show_id TEXT NOT NULL,
                season_id TEXT NOT NULL,
                episode_id TEXT NOT NULL,
                offset_seconds REAL NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, show_id, season_id, episode_id)
            );
            CREATE INDEX IF NOT EXISTS idx_episode_progress_updated_at ON episode_progress(updated_at DESC);
            CREATE TABLE IF NOT EXISTS last_played (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                url TEXT NOT NULL,
                offset_seconds REAL NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS auth_session (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                user_id TEXT NOT NULL,
                email TEXT,
                access_token TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub(crate) fn get_progress(&self, identity: &PlaybackIdentity) -> Result<Option<f64>> {
        let offset = self
            .conn
            .query_row(
                r#"
                SELECT offset_seconds FROM episode_progress
                WHERE user_id = ?1 AND show_id = ?2 AND season_id = ?3 AND episode_id = ?4
                "#,
                params![
                    identity.user_id,
                    identity.show_id,
                    identity.season_id,
                    identity.episode_id
                ],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(offset)
    }

    pub(crate) fn set_progress(&self, identity: &PlaybackIdentity, offset_seconds: f64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO episode_progress (user_id, show_id, season_id, episode_id, offset_seconds, completed, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            ON CONFLICT(user_id, show_id, season_id, episode_id) DO UPDATE SET
                offset_seconds = excluded.offset_seconds,
                updated_at = excluded.updated_at
            "#,
            params![
                identity.user_id,
                identity.show_id,
                identity.season_id,
                identity.episode_id,
                sanitize_offset(offset_seconds),
                now
            ],
        )?;
        Ok(())
    }

    pub(crate) fn get_completion(&self, identity: &PlaybackIdentity) -> Result<bool> {
        let completed = self
            .conn
            .query_row(
                r#"
                SELECT completed FROM episode_progress
                WHERE user_id = ?1 AND show_id = ?2 AND season_id = ?3 AND episode_id = ?4
                "#,
                params![
                    identity.user_id,
                    identity.show_id,
                    identity.season_id,
                    identity.episode_id
                ],
                |row| row.get::<_, bool>(0),
            )
            .optional()?;
        Ok(completed.unwrap_or(false))
    }

    pub(crate) fn set_completion(&self, identity: &PlaybackIdentity) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO episode_progress (user_id, show_id, season_id, episode_id, offset_seconds, completed, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, 1, ?5)
            ON CONFLICT(user_id, show_id, season_id, episode_id) DO UPDATE SET
                completed = 1,
                updated_at = excluded.updated_at
            "#,
            params![
                identity.user_id,
                identity.show_id,
                identity.season_id,
                identity.episode_id,
                now
            ],
        )?;
        Ok(())
    }

    /// Clears the completed flag. Playback never does this on its own.
    pub(crate) fn reset_completion(&self, identity: &PlaybackIdentity) -> Result<bool> {
        let changed = self.conn.execute(
            r#"
            UPDATE episode_progress SET completed = 0
            WHERE user_id = ?1 AND show_id = ?2 AND season_id = ?3 AND episode_id = ?4 AND completed = 1
            "#,
            params![
                identity.user_id,
                identity.show_id,
                identity.season_id,
                identity.episode_id
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get_last_played(&self) -> Result<Option<LastPlayed>> {
        let last = self
            .conn
            .query_row(
                "SELECT url, offset_seconds FROM last_played WHERE slot = 0",
                [],
                |row| {
                    Ok(LastPlayed {
                        url: row.get(0)?,
                        offset_seconds: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(last)
    }

    /// Returns `false` without writing when the offset is zero or unusable,
    /// so an unstarted session never clobbers the pointer.
    pub fn set_last_played(&self, url: &str, offset_seconds: f64) -> Result<bool> {
        if url.trim().is_empty() || !offset_seconds.is_finite() || offset_seconds <= 0.0 {
            return Ok(false);
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO last_played (slot, url, offset_seconds, updated_at)
            VALUES (0, ?1, ?2, ?3)
            ON CONFLICT(slot) DO UPDATE SET
                url = excluded.url,
                offset_seconds = excluded.offset_seconds,
                updated_at = excluded.updated_at
            "#,
            params![url, offset_seconds, now],
        )?;
        Ok(true)
    }

    /// Wipes progress, completion and the last-played pointer. The cached
    /// login is not part of playback state and survives.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            DELETE FROM episode_progress;
            DELETE FROM last_played;
            "#,
        )?;
        Ok(())
    }

    pub fn list_progress(&self) -> Result<Vec<ProgressRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, show_id, season_id, episode_id, offset_seconds, completed, updated_at
            FROM episode_progress ORDER BY updated_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProgressRecord {
                identity: PlaybackIdentity::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ),
                offset_seconds: row.get(4)?,
                completed: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn save_session(&self, session: &StoredSession) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO auth_session (slot, user_id, email, access_token)
            VALUES (0, ?1, ?2, ?3)
            ON CONFLICT(slot) DO UPDATE SET
                user_id = excluded.user_id,
                email = excluded.email,
                access_token = excluded.access_token
            "#,
            params![session.user_id, session.email, session.access_token],
        )?;
        Ok(())
    }

    pub fn current_session(&self) -> Result<Option<StoredSession>> {
        let session = self
            .conn
            .query_row(
                "SELECT user_id, email, access_token FROM auth_session WHERE slot = 0",
                [],
                |row| {
                    Ok(StoredSession {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        access_token: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn clear_session(&self) -> Result<()> {
        self.conn.execute("DELETE FROM auth_session", [])?;
        Ok(())
    }
}

fn sanitize_offset(offset_seconds: f64) -> f64 {
    if offset_seconds.is_finite() && offset_seconds > 0.0 {
        offset_seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user: &str, show: &str, season: &str, episode: &str) -> PlaybackIdentity {
        PlaybackIdentity::new(user, show, season, episode)
    }

    #[test]
    fn progress_reads_back_what_was_written() {
        let db = Database::open_in_memory().expect("db");
        let id = identity("u1", "10", "2", "5");
        assert_eq!(db.get_progress(&id).expect("read"), None);

        db.set_progress(&id, 42.5).expect("write");
        assert_eq!(db.get_progress(&id).expect("read"), Some(42.5));

        db.set_progress(&id, 61.0).expect("overwrite");
        assert_eq!(db.get_progress(&id).expect("read"), Some(61.0));
    }

    #[test]
    fn identities_that_would_collide_as_joined_strings_stay_separate() {
        let db = Database::open_in_memory().expect("db");
        let left = identity("u1-10", "2", "5", "1");
        let right = identity("u1", "10-2", "5", "1");

        db.set_progress(&left, 12.0).expect("write left");
        db.set_completion(&left).expect("complete left");

        assert_eq!(db.get_progress(&right).expect("read right"), None);
        assert!(!db.get_completion(&right).expect("completion right"));
    }

    #[test]
    fn writes_to_one_episode_do_not_touch_its_neighbours() {
        let db = Database::open_in_memory().expect("db");
        let first = identity("u1", "10", "2", "5");
        let second = identity("u1", "10", "2", "6");
        let other_user = identity("u2", "10", "2", "5");

        db.set_progress(&first, 30.0).expect("write");
        db.set_completion(&first).expect("complete");

        assert_eq!(db.get_progress(&second).expect("read"), None);
        assert_eq!(db.get_progress(&other_user).expect("read"), None);
        assert!(!db.get_completion(&second).expect("completion"));
        assert!(!db.get_completion(&other_user).expect("completion"));
    }

    #[test]
    fn progress_updates_never_clear_completion() {
        let db = Database::open_in_memory().expect("db");
        let id = identity("u1", "10", "2", "5");
        db.set_completion(&id).expect("complete");
        db.set_progress(&id, 3.0).expect("write");

        assert!(db.get_completion(&id).expect("completion"));
        assert_eq!(db.get_progress(&id).expect("read"), Some(3.0));
    }

    #[test]
    fn completion_only_resets_on_request() {
        let db = Database::open_in_memory().expect("db");
        let id = identity("u1", "10", "2", "5");
        assert!(!db.reset_completion(&id).expect("reset on missing row"));

        db.set_completion(&id).expect("complete");
        assert!(db.reset_completion(&id).expect("reset"));
        assert!(!db.get_completion(&id).expect("completion"));
    }

    #[test]
    fn negative_and_nan_offsets_are_stored_as_zero() {
        let db = Database::open_in_memory().expect("db");
        let id = identity("", "", "", "");
        db.set_progress(&id, -4.0).expect("write negative");
        assert_eq!(db.get_progress(&id).expect("read"), Some(0.0));
        db.set_progress(&id, f64::NAN).expect("write nan");
        assert_eq!(db.get_progress(&id).expect("read"), Some(0.0));
    }

    #[test]
    fn zero_offset_keeps_previous_last_played_pointer() {
        let db = Database::open_in_memory().expect("db");
        assert!(db.get_last_played().expect("read").is_none());

        assert!(db.set_last_played("https://cdn.test/a.mp3", 42.5).expect("write"));
        assert!(!db.set_last_played("https://cdn.test/b.mp3", 0.0).expect("zero"));
        assert!(!db.set_last_played("https://cdn.test/b.mp3", f64::NAN).expect("nan"));

        assert_eq!(
            db.get_last_played().expect("read"),
            Some(LastPlayed {
                url: "https://cdn.test/a.mp3".to_string(),
                offset_seconds: 42.5,
            })
        );
    }

    #[test]
    fn last_played_pointer_follows_latest_write() {
        let db = Database::open_in_memory().expect("db");
        db.set_last_played("https://cdn.test/a.mp3", 42.5).expect("write a");
        db.set_last_played("https://cdn.test/b.mp3", 7.0).expect("write b");
        let last = db.get_last_played().expect("read").expect("pointer");
        assert_eq!(last.url, "https://cdn.test/b.mp3");
        assert_eq!(last.offset_seconds, 7.0);
    }

    #[test]
    fn clear_all_wipes_playback_state_but_keeps_login() {
        let db = Database::open_in_memory().expect("db");
        let id = identity("u1", "10", "2", "5");
        db.set_progress(&id, 10.0).expect("write");
        db.set_completion(&id).expect("complete");
        db.set_last_played("https://cdn.test/a.mp3", 10.0).expect("pointer");
        db.save_session(&StoredSession {
            user_id: "u1".to_string(),
            email: Some("u1@example.test".to_string()),
            access_token: "token".to_string(),
        })
        .expect("session");

        db.clear_all().expect("clear");

        assert_eq!(db.get_progress(&id).expect("read"), None);
        assert!(!db.get_completion(&id).expect("completion"));
        assert!(db.get_last_played().expect("pointer").is_none());
        assert!(db.list_progress().expect("list").is_empty());
        assert_eq!(
            db.current_session().expect("session").map(|s| s.user_id),
            Some("u1".to_string())
        );
    }

    #[test]
    fn progress_survives_reopening_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("podtrack.db");
        let id = identity("u1", "10", "2", "5");
        {
            let db = Database::open(&path).expect("open");
            db.migrate().expect("migrate");
            db.set_progress(&id, 42.5).expect("write");
            db.set_last_played("https://cdn.test/a.mp3", 42.5).expect("pointer");
        }

        let db = Database::open(&path).expect("reopen");
        db.migrate().expect("migrate again");
        assert_eq!(db.get_progress(&id).expect("read"), Some(42.5));
        assert_eq!(
            db.get_last_played().expect("pointer").map(|p| p.offset_seconds),
            Some(42.5)
        );
    }

    #[test]
    fn session_round_trips_and_clears() {
        let db = Database::open_in_memory().expect("db");
        let session = StoredSession {
            user_id: "u1".to_string(),
            email: None,
            access_token: "token".to_string(),
        };
        db.save_session(&session).expect("save");
        assert_eq!(db.current_session().expect("read"), Some(session));
        db.clear_session().expect("clear");
        assert_eq!(db.current_session().expect("read"), None);
    }
}
