use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

/// Label reported for a probe that matched nothing above the threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Axis-aligned face bounding box in source-image pixel coordinates.
///
/// Serialized as the `[top, right, bottom, left]` tuple callers draw
/// overlays from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

impl Serialize for FaceBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(4)?;
        tup.serialize_element(&self.top)?;
        tup.serialize_element(&self.right)?;
        tup.serialize_element(&self.bottom)?;
        tup.serialize_element(&self.left)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for FaceBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TupleVisitor;

        impl<'de> Visitor<'de> for TupleVisitor {
            type Value = FaceBox;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a [top, right, bottom, left] tuple")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FaceBox, A::Error> {
                let top = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let right = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let bottom = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(2, &self))?;
                let left = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(3, &self))?;
                Ok(FaceBox { top, right, bottom, left })
            }
        }

        deserializer.deserialize_tuple(4, TupleVisitor)
    }
}

/// A face located by the detector, before cropping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: FaceBox,
    /// Detector score in [0, 1]. Not a recognition confidence.
    pub confidence: f32,
}

/// Face embedding vector (512-dimensional for the deployed model).
///
/// Unit L2-normalized at creation, so dot product equals cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding.
    pub model_version: Option<String>,
}

impl Embedding {
    /// Build an embedding from raw model output, L2-normalizing to unit length.
    ///
    /// A zero vector is kept as-is; similarity against it is defined as 0.
    pub fn from_raw(raw: Vec<f32>, model_version: Option<String>) -> Self {
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };
        Self { values, model_version }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Plain dot product. Equals cosine similarity when both sides are unit-norm.
    pub fn dot(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Cosine similarity in [-1, 1].
    ///
    /// Divides by the norms explicitly, so the result stays correct even if
    /// a stored vector was produced before normalization was enforced.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// One detected face with its extracted embedding and padded crop.
///
/// Ephemeral: produced per request, persisted only as the enrollment crop.
#[derive(Debug, Clone)]
pub struct FaceObservation {
    pub embedding: Embedding,
    pub bbox: FaceBox,
    /// Detector score for this face.
    pub confidence: f32,
    /// Padded crop the embedding was extracted from.
    pub crop: image::RgbImage,
}

/// Per-face outcome of matching a probe image against a gallery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Matched gallery label, or [`UNKNOWN_LABEL`].
    pub label: String,
    pub bounding_box: FaceBox,
    /// Best observed similarity clamped to [0, 1]; 0.0 for an empty gallery.
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_unit_norm() {
        let e = Embedding::from_raw(vec![3.0, 4.0], None);
        assert!((e.norm() - 1.0).abs() < 1e-6);
        assert!((e.values[0] - 0.6).abs() < 1e-6);
        assert!((e.values[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_from_raw_zero_vector_kept() {
        let e = Embedding::from_raw(vec![0.0, 0.0, 0.0], None);
        assert_eq!(e.norm(), 0.0);
    }

    #[test]
    fn test_dot_equals_cosine_for_unit_vectors() {
        let a = Embedding::from_raw(vec![1.0, 2.0, 3.0], None);
        let b = Embedding::from_raw(vec![-2.0, 0.5, 1.0], None);
        assert!((a.dot(&b) - a.similarity(&b)).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_symmetric() {
        let a = Embedding::from_raw(vec![0.2, -0.7, 0.1], None);
        let b = Embedding::from_raw(vec![0.9, 0.3, -0.4], None);
        assert!((a.similarity(&b) - b.similarity(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_handles_non_unit_vectors() {
        let a = Embedding { values: vec![2.0, 0.0], model_version: None };
        let b = Embedding { values: vec![4.0, 0.0], model_version: None };
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = Embedding { values: vec![0.0, 0.0], model_version: None };
        let b = Embedding { values: vec![1.0, 0.0], model_version: None };
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_face_box_tuple_roundtrip() {
        let b = FaceBox { top: 10.0, right: 120.0, bottom: 90.0, left: 40.0 };
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[10.0,120.0,90.0,40.0]");
        let back: FaceBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_face_box_dimensions() {
        let b = FaceBox { top: 10.0, right: 120.0, bottom: 90.0, left: 40.0 };
        assert_eq!(b.width(), 80.0);
        assert_eq!(b.height(), 80.0);
        assert_eq!(b.area(), 6400.0);
    }

    #[test]
    fn test_face_box_degenerate_dimensions_clamped() {
        let b = FaceBox { top: 90.0, right: 40.0, bottom: 10.0, left: 120.0 };
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 0.0);
    }
}
