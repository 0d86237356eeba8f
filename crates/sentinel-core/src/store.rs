//! Scheduling Store: the SQLite table of scheduled posts.
//!
//! # Table design
//!
//! ```text
//! scheduled_posts(content_id, platform, content_type, content,
//!                 scheduled_time INTEGER, status, post_id PRIMARY KEY, language)
//! ```
//!
//! `scheduled_time` is stored as UTC unix milliseconds so the due-time query
//! is a plain integer comparison. The table is rebuilt on every scheduling
//! run via [`ScheduleStore::reset`]; there is no incremental upsert.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Result, SentinelError};
use crate::types::{ContentType, PostStatus};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS scheduled_posts (
    content_id     TEXT NOT NULL,
    platform       TEXT NOT NULL,
    content_type   TEXT NOT NULL,
    content        TEXT NOT NULL,
    scheduled_time INTEGER NOT NULL,
    status         TEXT NOT NULL,
    post_id        TEXT PRIMARY KEY,
    language       TEXT NOT NULL
)";

const COLUMNS: &str =
    "content_id, platform, content_type, content, scheduled_time, status, post_id, language";

// ---------------------------------------------------------------------------
// ScheduledPost
// ---------------------------------------------------------------------------

/// One delivery intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledPost {
    pub content_id: String,
    pub platform: String,
    pub content_type: ContentType,
    /// Text snapshot taken at scheduling time.
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: PostStatus,
    pub post_id: String,
    pub language: String,
}

struct RawPost {
    content_id: String,
    platform: String,
    content_type: String,
    content: String,
    scheduled_time: i64,
    status: String,
    post_id: String,
    language: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawPost> {
    Ok(RawPost {
        content_id: row.get(0)?,
        platform: row.get(1)?,
        content_type: row.get(2)?,
        content: row.get(3)?,
        scheduled_time: row.get(4)?,
        status: row.get(5)?,
        post_id: row.get(6)?,
        language: row.get(7)?,
    })
}

impl RawPost {
    fn into_post(self) -> Result<ScheduledPost> {
        let scheduled_time = DateTime::<Utc>::from_timestamp_millis(self.scheduled_time)
            .ok_or_else(|| {
                SentinelError::Store(format!(
                    "post {} has an out-of-range scheduled_time {}",
                    self.post_id, self.scheduled_time
                ))
            })?;
        Ok(ScheduledPost {
            content_id: self.content_id,
            platform: self.platform,
            content_type: self.content_type.parse()?,
            content: self.content,
            scheduled_time,
            status: self.status.parse()?,
            post_id: self.post_id,
            language: self.language,
        })
    }
}

fn db_err(e: rusqlite::Error) -> SentinelError {
    SentinelError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// ScheduleStore
// ---------------------------------------------------------------------------

/// Persistent store for [`ScheduledPost`] records.
pub struct ScheduleStore {
    conn: Connection,
}

impl ScheduleStore {
    /// Open or create the database at `path`, creating the table if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SentinelError::Configuration(format!(
                    "cannot create scheduling store directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// A private, non-persistent store. Used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        conn.execute(CREATE_TABLE, []).map_err(db_err)?;
        Ok(Self { conn })
    }

    /// Drop and recreate the table in one transaction.
    ///
    /// Called at the start of every scheduling run so records from a previous
    /// run never linger. Concurrent readers see either the old or the new table.
    pub fn reset(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction().map_err(db_err)?;
        tx.execute("DROP TABLE IF EXISTS scheduled_posts", [])
            .map_err(db_err)?;
        tx.execute(CREATE_TABLE, []).map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Insert a new record. A duplicate `post_id` is a store error.
    pub fn insert(&self, post: &ScheduledPost) -> Result<()> {
        self.conn
            .execute(
                &format!("INSERT INTO scheduled_posts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    post.content_id,
                    post.platform,
                    post.content_type.as_str(),
                    post.content,
                    post.scheduled_time.timestamp_millis(),
                    post.status.as_str(),
                    post.post_id,
                    post.language,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// All `pending` records with `scheduled_time <= now`, oldest first,
    /// optionally restricted to one language.
    pub fn fetch_due(&self, language: Option<&str>, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        let now_ms = now.timestamp_millis();
        let pending = PostStatus::Pending.as_str();
        let base = format!(
            "SELECT {COLUMNS} FROM scheduled_posts \
             WHERE status = ?1 AND scheduled_time <= ?2"
        );
        let raw = match language {
            Some(lang) => self.query(
                &format!("{base} AND language = ?3 ORDER BY scheduled_time, post_id"),
                params![pending, now_ms, lang],
            )?,
            None => self.query(
                &format!("{base} ORDER BY scheduled_time, post_id"),
                params![pending, now_ms],
            )?,
        };
        raw.into_iter().map(RawPost::into_post).collect()
    }

    /// Move a pending record to a terminal status.
    ///
    /// Terminal records are never re-processed, so any other transition is
    /// rejected with `InvalidTransition`.
    pub fn set_status(&self, post_id: &str, status: PostStatus) -> Result<()> {
        if status.is_terminal() {
            let changed = self
                .conn
                .execute(
                    "UPDATE scheduled_posts SET status = ?1 WHERE post_id = ?2 AND status = ?3",
                    params![status.as_str(), post_id, PostStatus::Pending.as_str()],
                )
                .map_err(db_err)?;
            if changed == 1 {
                return Ok(());
            }
        }
        match self.get(post_id)? {
            None => Err(SentinelError::Store(format!("post not found: {post_id}"))),
            Some(current) => Err(SentinelError::InvalidTransition {
                post_id: post_id.to_string(),
                from: current.status.to_string(),
                to: status.to_string(),
            }),
        }
    }

    pub fn get(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM scheduled_posts WHERE post_id = ?1"),
                params![post_id],
                read_row,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawPost::into_post).transpose()
    }

    /// Every record, optionally for one language, in scheduling order.
    pub fn list(&self, language: Option<&str>) -> Result<Vec<ScheduledPost>> {
        let raw = match language {
            Some(lang) => self.query(
                &format!(
                    "SELECT {COLUMNS} FROM scheduled_posts WHERE language = ?1 \
                     ORDER BY scheduled_time, post_id"
                ),
                params![lang],
            )?,
            None => self.query(
                &format!("SELECT {COLUMNS} FROM scheduled_posts ORDER BY scheduled_time, post_id"),
                [],
            )?,
        };
        raw.into_iter().map(RawPost::into_post).collect()
    }

    fn query<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<RawPost>> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let rows = stmt.query_map(params, read_row).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as CDur;
    use tempfile::TempDir;

    fn post(id: &str, language: &str, at: DateTime<Utc>) -> ScheduledPost {
        ScheduledPost {
            content_id: id.to_string(),
            platform: "twitter".into(),
            content_type: ContentType::Tweet,
            content: format!("tweet {id}"),
            scheduled_time: at,
            status: PostStatus::Pending,
            post_id: format!("post-{id}-{language}"),
            language: language.to_string(),
        }
    }

    #[test]
    fn open_creates_directory_and_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scheduler_db/scheduled_posts.db");
        let store = ScheduleStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.list(None).unwrap().is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posts.db");
        {
            let store = ScheduleStore::open(&path).unwrap();
            store.insert(&post("1", "en", Utc::now())).unwrap();
        }
        let store = ScheduleStore::open(&path).unwrap();
        assert_eq!(store.list(None).unwrap().len(), 1);
    }

    #[test]
    fn reset_drops_everything() {
        let store = ScheduleStore::open_in_memory().unwrap();
        store.insert(&post("1", "en", Utc::now())).unwrap();
        store.insert(&post("2", "hi", Utc::now())).unwrap();
        store.reset().unwrap();
        assert!(store.list(None).unwrap().is_empty());
        // table is usable after reset
        store.insert(&post("3", "en", Utc::now())).unwrap();
        assert_eq!(store.list(None).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_post_id_is_rejected() {
        let store = ScheduleStore::open_in_memory().unwrap();
        let p = post("1", "en", Utc::now());
        store.insert(&p).unwrap();
        assert!(matches!(store.insert(&p), Err(SentinelError::Store(_))));
    }

    #[test]
    fn fetch_due_excludes_future_and_non_pending() {
        let store = ScheduleStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.insert(&post("past", "en", now - CDur::minutes(60))).unwrap();
        store.insert(&post("exact", "en", now)).unwrap();
        store.insert(&post("future", "en", now + CDur::seconds(30))).unwrap();
        store.insert(&post("done", "en", now - CDur::minutes(5))).unwrap();
        store
            .set_status("post-done-en", PostStatus::Published)
            .unwrap();

        let due = store.fetch_due(None, now).unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.content_id.as_str()).collect();
        assert_eq!(ids, vec!["past", "exact"]);
        assert!(due.iter().all(|p| p.scheduled_time <= now));
    }

    #[test]
    fn fetch_due_filters_by_language() {
        let store = ScheduleStore::open_in_memory().unwrap();
        let earlier = Utc::now() - CDur::minutes(1);
        store.insert(&post("1", "en", earlier)).unwrap();
        store.insert(&post("2", "hi", earlier)).unwrap();

        let hi = store.fetch_due(Some("hi"), Utc::now()).unwrap();
        assert_eq!(hi.len(), 1);
        assert_eq!(hi[0].language, "hi");
        assert_eq!(store.fetch_due(None, Utc::now()).unwrap().len(), 2);
    }

    #[test]
    fn terminal_status_is_final() {
        let store = ScheduleStore::open_in_memory().unwrap();
        store.insert(&post("1", "en", Utc::now())).unwrap();
        store.set_status("post-1-en", PostStatus::Failed).unwrap();

        let err = store
            .set_status("post-1-en", PostStatus::Published)
            .unwrap_err();
        match err {
            SentinelError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "failed");
                assert_eq!(to, "published");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert_eq!(
            store.get("post-1-en").unwrap().unwrap().status,
            PostStatus::Failed
        );
    }

    #[test]
    fn pending_is_not_a_target_status() {
        let store = ScheduleStore::open_in_memory().unwrap();
        store.insert(&post("1", "en", Utc::now())).unwrap();
        assert!(matches!(
            store.set_status("post-1-en", PostStatus::Pending),
            Err(SentinelError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn set_status_unknown_post() {
        let store = ScheduleStore::open_in_memory().unwrap();
        assert!(matches!(
            store.set_status("missing", PostStatus::Failed),
            Err(SentinelError::Store(_))
        ));
    }

    #[test]
    fn scheduled_time_roundtrips_at_millisecond_precision() {
        let store = ScheduleStore::open_in_memory().unwrap();
        let at = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        store.insert(&post("1", "en", at)).unwrap();
        let loaded = store.get("post-1-en").unwrap().unwrap();
        assert_eq!(loaded.scheduled_time, at);
    }
}
