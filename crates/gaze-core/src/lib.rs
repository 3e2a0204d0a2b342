//! gaze-core — Face detection, embedding extraction and matching.
//!
//! Uses SCRFD for face detection and a pretrained 512-d embedding network
//! for recognition, both running via ONNX Runtime for CPU inference.

pub mod codec;
pub mod detector;
pub mod embedder;
pub mod matcher;
pub mod pipeline;
pub mod types;

pub use codec::{decode_payload, DecodeError};
pub use detector::{FaceDetector, DEFAULT_PAD_FACTOR};
pub use embedder::EmbeddingExtractor;
pub use matcher::{CosineMatcher, GalleryEmbedding, Matcher, DEFAULT_RECOGNITION_THRESHOLD};
pub use pipeline::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use types::{Detection, Embedding, FaceBox, FaceObservation, RecognitionResult, UNKNOWN_LABEL};
