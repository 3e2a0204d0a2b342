//! Detection → crop → embedding pipeline.
//!
//! [`FaceAnalyzer`] is the seam between the service layer and the ONNX
//! models: the service never touches sessions directly, and tests drive
//! the full request path with a deterministic stub analyzer.

use crate::detector::{self, DetectorError, FaceDetector};
use crate::embedder::{EmbeddingExtractor, ExtractionError};
use crate::types::FaceObservation;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
}

/// Locate every face in a decoded image and extract its embedding.
///
/// Implementations must be deterministic for a fixed image and
/// configuration, and must return observations in detection order.
pub trait FaceAnalyzer: Send {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceObservation>, AnalyzerError>;
}

/// Production analyzer: SCRFD detection, padded cropping, ONNX embedding.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    extractor: EmbeddingExtractor,
    pad_factor: f32,
}

impl OnnxAnalyzer {
    pub fn new(detector: FaceDetector, extractor: EmbeddingExtractor, pad_factor: f32) -> Self {
        Self { detector, extractor, pad_factor }
    }

    /// Load both models and assemble the pipeline.
    pub fn load(
        detector_path: &str,
        embedder_path: &str,
        pad_factor: f32,
    ) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(detector_path)?;
        let extractor = EmbeddingExtractor::load(embedder_path)?;
        Ok(Self::new(detector, extractor, pad_factor))
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceObservation>, AnalyzerError> {
        let detections = self.detector.detect(image)?;
        tracing::debug!(faces = detections.len(), "detection complete");

        let mut observations = Vec::with_capacity(detections.len());
        for det in detections {
            let crop = detector::padded_crop(image, &det.bbox, self.pad_factor);
            let embedding = self.extractor.embed(&crop)?;
            observations.push(FaceObservation {
                embedding,
                bbox: det.bbox,
                confidence: det.confidence,
                crop,
            });
        }

        Ok(observations)
    }
}
