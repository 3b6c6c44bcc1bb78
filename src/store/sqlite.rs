// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use crate::error::StorageError;
use crate::subscription::{Episode, Subscription};

use super::Storage;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    image_url TEXT NOT NULL,
    last_updated TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS episodes (
    subscription_id INTEGER NOT NULL
        REFERENCES subscriptions(id) ON DELETE CASCADE,
    guid TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    media_url TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    pub_date TEXT NOT NULL,
    duration TEXT NOT NULL,
    PRIMARY KEY (subscription_id, guid)
);
CREATE INDEX IF NOT EXISTS idx_episodes_subscription_date
    ON episodes(subscription_id, pub_date DESC);
"#;

const SUBSCRIPTION_COLUMNS: &str = "id, feed_url, title, description, image_url, last_updated";

const EPISODE_COLUMNS: &str =
    "guid, subscription_id, title, description, media_url, mime_type, pub_date, duration";

/// SQLite-backed subscription store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectoryFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// A private in-memory database
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: Some(row.get(0)?),
        feed_url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        image_url: row.get(4)?,
        last_updated: parse_timestamp(&row.get::<_, String>(5)?),
        episodes: Vec::new(),
    })
}

fn episode_from_row(row: &Row<'_>) -> rusqlite::Result<Episode> {
    Ok(Episode {
        guid: row.get(0)?,
        subscription_id: Some(row.get(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        media_url: row.get(4)?,
        mime_type: row.get(5)?,
        pub_date: parse_timestamp(&row.get::<_, String>(6)?),
        duration: row.get(7)?,
    })
}

fn write_episode(conn: &Connection, subscription_id: i64, episode: &Episode) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO episodes
            (guid, subscription_id, title, description, media_url, mime_type, pub_date, duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            episode.guid,
            subscription_id,
            episode.title,
            episode.description,
            episode.media_url,
            episode.mime_type,
            format_timestamp(&episode.pub_date),
            episode.duration,
        ],
    )?;
    Ok(())
}

impl Storage for SqliteStore {
    fn find_subscription_by_url(&self, url: &str) -> Result<Option<Subscription>, StorageError> {
        let conn = self.conn()?;
        let subscription = conn
            .query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE feed_url = ?1"),
                params![url],
                subscription_from_row,
            )
            .optional()?;
        Ok(subscription)
    }

    fn list_subscriptions(&self) -> Result<Vec<Subscription>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY title, feed_url"
        ))?;
        let subscriptions = stmt
            .query_map([], subscription_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subscriptions)
    }

    fn list_episodes(&self, subscription_id: i64) -> Result<Vec<Episode>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes
             WHERE subscription_id = ?1 ORDER BY pub_date DESC, guid"
        ))?;
        let episodes = stmt
            .query_map(params![subscription_id], episode_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(episodes)
    }

    fn insert_subscription(&self, subscription: &Subscription) -> Result<i64, StorageError> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO subscriptions (feed_url, title, description, image_url, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                subscription.feed_url,
                subscription.title,
                subscription.description,
                subscription.image_url,
                format_timestamp(&subscription.last_updated),
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateFeed {
                    feed_url: subscription.feed_url.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn insert_episode(&self, episode: &Episode) -> Result<(), StorageError> {
        let subscription_id =
            episode
                .subscription_id
                .ok_or_else(|| StorageError::EpisodeNotAttached {
                    guid: episode.guid.clone(),
                })?;
        let conn = self.conn()?;
        write_episode(&conn, subscription_id, episode)?;
        Ok(())
    }

    fn insert_episodes(
        &self,
        subscription_id: i64,
        episodes: &[Episode],
    ) -> Result<usize, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for episode in episodes {
            write_episode(&tx, subscription_id, episode)?;
        }
        tx.commit()?;
        Ok(episodes.len())
    }

    fn delete_subscription(&self, subscription: &Subscription) -> Result<(), StorageError> {
        let id = subscription
            .id
            .ok_or_else(|| StorageError::SubscriptionNotPersisted {
                feed_url: subscription.feed_url.clone(),
            })?;
        let conn = self.conn()?;
        conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
        Ok(())
    }
}
