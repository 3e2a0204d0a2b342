//! SQLite-backed gallery store.
//!
//! One `gallery` table keyed by `(account, label)`. An upsert is a single
//! `INSERT OR REPLACE` statement, so the embedding/crop pair commits
//! atomically and a reader sees either the old or the new complete row.

use crate::{embedding_from_blob, embedding_to_blob, validate_label, GalleryStore, StoreError};
use gaze_core::matcher::GalleryEmbedding;
use gaze_core::Embedding;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS gallery (
        id         TEXT NOT NULL,
        account    TEXT NOT NULL,
        label      TEXT NOT NULL,
        embedding  BLOB NOT NULL,
        crop       BLOB,
        created_at TEXT NOT NULL,
        PRIMARY KEY (account, label)
    );
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the gallery database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Ephemeral in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL keeps concurrent readers unblocked during a write; an
        // in-memory database rejects it, which is fine to ignore.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Stored crop bytes for an entry, if any. Enrollment review UIs use this.
    pub fn read_crop(&self, account: &str, label: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn()?;
        let crop: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT crop FROM gallery WHERE account = ?1 AND label = ?2",
                params![account, label],
                |row| row.get(0),
            )
            .optional()?;
        Ok(crop.flatten())
    }
}

impl GalleryStore for SqliteStore {
    fn write(
        &self,
        account: &str,
        label: &str,
        embedding: &Embedding,
        crop: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        validate_label(label)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO gallery (id, account, label, embedding, crop, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                account,
                label,
                embedding_to_blob(embedding),
                crop,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        tracing::debug!(account, label, dim = embedding.dim(), "gallery entry written");
        Ok(())
    }

    fn remove(&self, account: &str, label: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM gallery WHERE account = ?1 AND label = ?2",
            params![account, label],
        )?;
        Ok(changed > 0)
    }

    fn list_labels(&self, account: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT label FROM gallery WHERE account = ?1 ORDER BY label")?;
        let labels = stmt
            .query_map(params![account], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(labels)
    }

    fn read_all(&self, account: &str) -> Result<Vec<GalleryEmbedding>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT label, embedding FROM gallery WHERE account = ?1 ORDER BY label")?;
        let rows = stmt
            .query_map(params![account], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (label, blob) in rows {
            match embedding_from_blob(&blob) {
                Some(embedding) => entries.push(GalleryEmbedding { label, embedding }),
                None => {
                    // Skippable, not fatal: one corrupt record must not take
                    // down recognition for the whole account.
                    tracing::warn!(account, label, bytes = blob.len(), "skipping corrupt embedding record");
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn embedding(values: Vec<f32>) -> Embedding {
        Embedding::from_raw(values, None)
    }

    #[test]
    fn test_write_and_read_all() {
        let s = store();
        s.write("acct-1", "alice_1", &embedding(vec![1.0, 0.0]), None).unwrap();
        let all = s.read_all("acct-1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].label, "alice_1");
        assert!((all[0].embedding.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_overwrite_same_label_keeps_one_entry() {
        let s = store();
        s.write("acct-1", "alice", &embedding(vec![1.0, 0.0]), None).unwrap();
        s.write("acct-1", "alice", &embedding(vec![0.0, 1.0]), None).unwrap();
        let all = s.read_all("acct-1").unwrap();
        assert_eq!(all.len(), 1);
        // Last writer wins, wholesale.
        assert!((all[0].embedding.values[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_accounts_are_isolated() {
        let s = store();
        s.write("acct-1", "alice", &embedding(vec![1.0, 0.0]), None).unwrap();
        s.write("acct-2", "bob", &embedding(vec![0.0, 1.0]), None).unwrap();
        assert_eq!(s.list_labels("acct-1").unwrap(), vec!["alice"]);
        assert_eq!(s.list_labels("acct-2").unwrap(), vec!["bob"]);
    }

    #[test]
    fn test_list_labels_sorted_and_empty_for_unknown_account() {
        let s = store();
        s.write("acct-1", "zoe", &embedding(vec![1.0]), None).unwrap();
        s.write("acct-1", "adam", &embedding(vec![1.0]), None).unwrap();
        assert_eq!(s.list_labels("acct-1").unwrap(), vec!["adam", "zoe"]);
        assert!(s.list_labels("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_remove_reports_existence() {
        let s = store();
        s.write("acct-1", "alice", &embedding(vec![1.0]), None).unwrap();
        assert!(s.remove("acct-1", "alice").unwrap());
        assert!(!s.remove("acct-1", "alice").unwrap());
        assert!(!s.remove("acct-1", "never-there").unwrap());
        assert!(s.list_labels("acct-1").unwrap().is_empty());
    }

    #[test]
    fn test_crop_stored_with_embedding() {
        let s = store();
        let crop = vec![1u8, 2, 3, 4];
        s.write("acct-1", "alice", &embedding(vec![1.0, 0.0]), Some(&crop)).unwrap();
        assert_eq!(s.read_crop("acct-1", "alice").unwrap(), Some(crop));
        assert_eq!(s.read_crop("acct-1", "bob").unwrap(), None);
    }

    #[test]
    fn test_read_all_skips_corrupt_rows() {
        let s = store();
        s.write("acct-1", "good", &embedding(vec![1.0, 0.0]), None).unwrap();
        {
            let conn = s.conn().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO gallery (id, account, label, embedding, crop, created_at)
                 VALUES ('x', 'acct-1', 'bad', ?1, NULL, 'now')",
                params![vec![1u8, 2, 3]],
            )
            .unwrap();
        }
        let all = s.read_all("acct-1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].label, "good");
        // The corrupt label still lists; only matching skips it.
        assert_eq!(s.list_labels("acct-1").unwrap(), vec!["bad", "good"]);
    }

    #[test]
    fn test_unsafe_label_rejected() {
        let s = store();
        let err = s.write("acct-1", "../escape", &embedding(vec![1.0]), None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidLabel(_)));
        assert!(s.list_labels("acct-1").unwrap().is_empty());
    }

    #[test]
    fn test_label_roundtrips_exactly() {
        let s = store();
        let label = "Alice Badge 1";
        s.write("acct-1", label, &embedding(vec![1.0]), None).unwrap();
        assert_eq!(s.list_labels("acct-1").unwrap(), vec![label.to_string()]);
    }
}
