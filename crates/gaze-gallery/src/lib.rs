//! gaze-gallery — Per-account embedding gallery.
//!
//! A gallery is a set of `(label, embedding)` entries scoped by an opaque
//! account key. The store guarantees label uniqueness per account
//! (overwrite-on-re-enroll) and atomic writes of the embedding/crop pair.
//!
//! Entries come back sorted by label; the matcher's tie-break inherits
//! that order, so ties resolve to the lexicographically first label.

pub mod memory;
pub mod sqlite;

use gaze_core::matcher::GalleryEmbedding;
use gaze_core::Embedding;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid label {0:?}: empty or contains path-traversal characters")]
    InvalidLabel(String),
    #[error("storage lock poisoned")]
    LockPoisoned,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent per-account gallery of named embeddings.
///
/// "No such account" and "no such label" are not errors: reads return
/// empty collections and `remove` returns `false`. Only storage-layer
/// faults surface as [`StoreError`].
pub trait GalleryStore: Send + Sync {
    /// Upsert an entry. The embedding and optional source crop are written
    /// together in one atomic step; an abort can never leave one without
    /// the other. Creates the account namespace on first write.
    fn write(
        &self,
        account: &str,
        label: &str,
        embedding: &Embedding,
        crop: Option<&[u8]>,
    ) -> Result<(), StoreError>;

    /// Delete an entry. Returns whether it existed.
    fn remove(&self, account: &str, label: &str) -> Result<bool, StoreError>;

    /// Labels currently stored for the account, sorted.
    fn list_labels(&self, account: &str) -> Result<Vec<String>, StoreError>;

    /// All `(label, embedding)` pairs for the account, sorted by label.
    /// Entries with a corrupt embedding record are skipped, not fatal.
    fn read_all(&self, account: &str) -> Result<Vec<GalleryEmbedding>, StoreError>;
}

/// Reject labels that are unsafe as storage keys.
///
/// Labels otherwise round-trip byte-exact: no case folding, no truncation.
pub fn validate_label(label: &str) -> Result<(), StoreError> {
    let unsafe_label = label.is_empty()
        || label == "."
        || label == ".."
        || label.contains('/')
        || label.contains('\\')
        || label.contains('\0');
    if unsafe_label {
        return Err(StoreError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// Serialize an embedding as little-endian f32 bytes.
pub(crate) fn embedding_to_blob(embedding: &Embedding) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.values.len() * 4);
    for v in &embedding.values {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Decode an embedding blob. `None` for corrupt records (bad length,
/// empty vector, non-finite values).
pub(crate) fn embedding_from_blob(blob: &[u8]) -> Option<Embedding> {
    if blob.is_empty() || blob.len() % 4 != 0 {
        return None;
    }
    let values: Vec<f32> = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Embedding { values, model_version: None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_label_accepts_ordinary_labels() {
        for label in ["alice_1", "glasses", "Work Badge 2", "名前", "a.b"] {
            assert!(validate_label(label).is_ok(), "rejected {label:?}");
        }
    }

    #[test]
    fn test_validate_label_rejects_unsafe() {
        for label in ["", ".", "..", "a/b", "a\\b", "a\0b", "../etc"] {
            assert!(validate_label(label).is_err(), "accepted {label:?}");
        }
    }

    #[test]
    fn test_embedding_blob_roundtrip() {
        let e = Embedding::from_raw(vec![0.25, -1.5, 3.0, 0.0], None);
        let blob = embedding_to_blob(&e);
        let back = embedding_from_blob(&blob).unwrap();
        assert_eq!(back.values, e.values);
    }

    #[test]
    fn test_embedding_blob_bad_length_is_corrupt() {
        assert!(embedding_from_blob(&[1, 2, 3]).is_none());
        assert!(embedding_from_blob(&[]).is_none());
    }

    #[test]
    fn test_embedding_blob_non_finite_is_corrupt() {
        let blob = f32::NAN.to_le_bytes().to_vec();
        assert!(embedding_from_blob(&blob).is_none());
    }
}
