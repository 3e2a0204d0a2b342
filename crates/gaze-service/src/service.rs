//! Caller-facing enrollment and recognition operations.
//!
//! Expected negative outcomes (no face, multiple faces, bad payload on
//! enroll, empty gallery, below threshold) are values the caller branches
//! on. Only infrastructure faults surface as [`ServiceError`], and none
//! are retried: the same input fails the same way again.

use crate::engine::{EngineError, EngineHandle};
use gaze_core::codec::{self, DecodeError};
use gaze_core::matcher::{CosineMatcher, Matcher};
use gaze_core::{FaceBox, RecognitionResult};
use gaze_gallery::{GalleryStore, StoreError};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("crop encode failed: {0}")]
    CropEncode(#[from] image::ImageError),
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    #[error("worker task terminated")]
    WorkerGone,
}

/// Outcome of an enrollment attempt. Anything other than `Enrolled` is a
/// routine negative outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollOutcome {
    Enrolled,
    NoFaceDetected,
    MultipleFacesDetected { count: usize },
    InvalidImage,
}

impl EnrollOutcome {
    /// The boolean the transport layer reports: true iff exactly one face
    /// was detected and the gallery write succeeded.
    pub fn accepted(&self) -> bool {
        matches!(self, EnrollOutcome::Enrolled)
    }
}

/// Face enrollment and recognition over an injected gallery store.
pub struct FaceService<S> {
    engine: EngineHandle,
    store: Arc<S>,
    recognition_threshold: f32,
    deadline: Duration,
}

impl<S: GalleryStore + 'static> FaceService<S> {
    pub fn new(
        engine: EngineHandle,
        store: Arc<S>,
        recognition_threshold: f32,
        deadline: Duration,
    ) -> Self {
        Self { engine, store, recognition_threshold, deadline }
    }

    /// Enroll one reference face under `label` for `account`.
    ///
    /// Requires exactly one detectable face. A payload that fails to decode
    /// is `InvalidImage`, leaving the gallery untouched. Re-enrolling an
    /// existing label overwrites the entry wholesale.
    pub async fn enroll(
        &self,
        account: &str,
        label: &str,
        payload: &[u8],
    ) -> Result<EnrollOutcome, ServiceError> {
        // Reject unsafe labels before spending model time.
        gaze_gallery::validate_label(label)?;

        let image = match codec::decode_payload(payload) {
            Ok(image) => image,
            Err(err) => {
                tracing::info!(account, label, error = %err, "enroll: payload not decodable");
                return Ok(EnrollOutcome::InvalidImage);
            }
        };

        let outcome = self
            .with_deadline(async {
                let faces = self.engine.analyze(image).await?;

                let face = match faces.as_slice() {
                    [] => return Ok(EnrollOutcome::NoFaceDetected),
                    [face] => face,
                    many => {
                        return Ok(EnrollOutcome::MultipleFacesDetected { count: many.len() })
                    }
                };

                let crop_png = encode_crop(&face.crop)?;

                let store = Arc::clone(&self.store);
                let account = account.to_string();
                let label = label.to_string();
                let embedding = face.embedding.clone();
                tokio::task::spawn_blocking(move || {
                    store.write(&account, &label, &embedding, Some(&crop_png))
                })
                .await
                .map_err(|_| ServiceError::WorkerGone)??;

                Ok(EnrollOutcome::Enrolled)
            })
            .await?;

        tracing::info!(account, label, ?outcome, "enroll complete");
        Ok(outcome)
    }

    /// Remove an enrolled entry. Returns whether it existed.
    pub async fn unenroll(&self, account: &str, label: &str) -> Result<bool, ServiceError> {
        let store = Arc::clone(&self.store);
        let account_owned = account.to_string();
        let label_owned = label.to_string();
        let removed = tokio::task::spawn_blocking(move || store.remove(&account_owned, &label_owned))
            .await
            .map_err(|_| ServiceError::WorkerGone)??;
        tracing::info!(account, label, removed, "unenroll complete");
        Ok(removed)
    }

    /// Labels enrolled for the account; empty for an account with no gallery.
    pub async fn list_enrolled(&self, account: &str) -> Result<Vec<String>, ServiceError> {
        let store = Arc::clone(&self.store);
        let account = account.to_string();
        let labels = tokio::task::spawn_blocking(move || store.list_labels(&account))
            .await
            .map_err(|_| ServiceError::WorkerGone)??;
        Ok(labels)
    }

    /// Match every face in the probe image against the account's gallery.
    ///
    /// One result per detected face, detection order preserved. Zero faces
    /// yields an empty list; an empty gallery yields all-"unknown" results
    /// with zero confidence.
    pub async fn recognize(
        &self,
        account: &str,
        payload: &[u8],
    ) -> Result<Vec<RecognitionResult>, ServiceError> {
        let image = codec::decode_payload(payload)?;

        let results = self
            .with_deadline(async {
                let faces = self.engine.analyze(image).await?;
                if faces.is_empty() {
                    return Ok(Vec::new());
                }

                let store = Arc::clone(&self.store);
                let account_owned = account.to_string();
                let gallery =
                    tokio::task::spawn_blocking(move || store.read_all(&account_owned))
                        .await
                        .map_err(|_| ServiceError::WorkerGone)??;

                let probes: Vec<(gaze_core::Embedding, FaceBox)> = faces
                    .into_iter()
                    .map(|face| (face.embedding, face.bbox))
                    .collect();

                Ok(CosineMatcher.match_probes(&gallery, &probes, self.recognition_threshold))
            })
            .await?;

        tracing::debug!(
            account,
            faces = results.len(),
            matched = results.iter().filter(|r| !r.is_unknown()).count(),
            "recognize complete"
        );
        Ok(results)
    }

    /// Run an operation under the configured deadline. The store commit is
    /// a single atomic statement, so expiry at any point leaves prior state
    /// unchanged.
    async fn with_deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| ServiceError::DeadlineExceeded)?
    }
}

/// Encode the enrollment crop as PNG for persistence beside the embedding.
fn encode_crop(crop: &image::RgbImage) -> Result<Vec<u8>, ServiceError> {
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(crop.clone()).write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}
