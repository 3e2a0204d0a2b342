//! In-memory gallery store.
//!
//! Same contract as the SQLite store, backed by a mutex-guarded map.
//! Used by tests and ephemeral deployments. `BTreeMap` keeps entries
//! label-sorted, matching the SQLite `ORDER BY label` guarantee.

use crate::{validate_label, GalleryStore, StoreError};
use gaze_core::matcher::GalleryEmbedding;
use gaze_core::Embedding;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredEntry {
    #[allow(dead_code)]
    id: Uuid,
    embedding: Embedding,
    crop: Option<Vec<u8>>,
    #[allow(dead_code)]
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<String, BTreeMap<String, StoredEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_crop(&self, account: &str, label: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let accounts = self.accounts.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(accounts
            .get(account)
            .and_then(|gallery| gallery.get(label))
            .and_then(|entry| entry.crop.clone()))
    }
}

impl GalleryStore for MemoryStore {
    fn write(
        &self,
        account: &str,
        label: &str,
        embedding: &Embedding,
        crop: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        validate_label(label)?;
        let entry = StoredEntry {
            id: Uuid::new_v4(),
            embedding: embedding.clone(),
            crop: crop.map(|c| c.to_vec()),
            created_at: chrono::Utc::now(),
        };
        let mut accounts = self.accounts.lock().map_err(|_| StoreError::LockPoisoned)?;
        // Whole-entry insert under the lock: the pair is never torn.
        accounts
            .entry(account.to_string())
            .or_default()
            .insert(label.to_string(), entry);
        Ok(())
    }

    fn remove(&self, account: &str, label: &str) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(accounts
            .get_mut(account)
            .map(|gallery| gallery.remove(label).is_some())
            .unwrap_or(false))
    }

    fn list_labels(&self, account: &str) -> Result<Vec<String>, StoreError> {
        let accounts = self.accounts.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(accounts
            .get(account)
            .map(|gallery| gallery.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read_all(&self, account: &str) -> Result<Vec<GalleryEmbedding>, StoreError> {
        let accounts = self.accounts.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(accounts
            .get(account)
            .map(|gallery| {
                gallery
                    .iter()
                    .map(|(label, entry)| GalleryEmbedding {
                        label: label.clone(),
                        embedding: entry.embedding.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(values: Vec<f32>) -> Embedding {
        Embedding::from_raw(values, None)
    }

    #[test]
    fn test_write_read_remove() {
        let s = MemoryStore::new();
        s.write("acct-1", "alice", &embedding(vec![1.0, 0.0]), Some(&[9, 9])).unwrap();
        assert_eq!(s.list_labels("acct-1").unwrap(), vec!["alice"]);
        assert_eq!(s.read_crop("acct-1", "alice").unwrap(), Some(vec![9, 9]));
        assert!(s.remove("acct-1", "alice").unwrap());
        assert!(!s.remove("acct-1", "alice").unwrap());
        assert!(s.read_all("acct-1").unwrap().is_empty());
    }

    #[test]
    fn test_overwrite_is_idempotent_on_count() {
        let s = MemoryStore::new();
        s.write("acct-1", "alice", &embedding(vec![1.0, 0.0]), None).unwrap();
        s.write("acct-1", "alice", &embedding(vec![0.0, 1.0]), None).unwrap();
        assert_eq!(s.list_labels("acct-1").unwrap().len(), 1);
        let all = s.read_all("acct-1").unwrap();
        assert!((all[0].embedding.values[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_read_all_sorted_by_label() {
        let s = MemoryStore::new();
        s.write("acct-1", "zoe", &embedding(vec![1.0]), None).unwrap();
        s.write("acct-1", "adam", &embedding(vec![1.0]), None).unwrap();
        s.write("acct-1", "mia", &embedding(vec![1.0]), None).unwrap();
        let labels: Vec<_> = s.read_all("acct-1").unwrap().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["adam", "mia", "zoe"]);
    }

    #[test]
    fn test_unknown_account_is_empty_not_error() {
        let s = MemoryStore::new();
        assert!(s.list_labels("nobody").unwrap().is_empty());
        assert!(s.read_all("nobody").unwrap().is_empty());
        assert!(!s.remove("nobody", "alice").unwrap());
    }

    #[test]
    fn test_unsafe_label_rejected() {
        let s = MemoryStore::new();
        assert!(matches!(
            s.write("acct-1", "a/b", &embedding(vec![1.0]), None),
            Err(StoreError::InvalidLabel(_))
        ));
    }
}
