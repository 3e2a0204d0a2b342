//! Nearest-neighbor matching of probe embeddings against a gallery.

use crate::types::{Embedding, FaceBox, RecognitionResult, UNKNOWN_LABEL};

/// Permissive by design: the deployed calibration was tuned per installation,
/// so this stays a configurable default rather than a corrected value.
pub const DEFAULT_RECOGNITION_THRESHOLD: f32 = 0.2;

/// A gallery entry as the matcher sees it.
#[derive(Debug, Clone)]
pub struct GalleryEmbedding {
    pub label: String,
    pub embedding: Embedding,
}

/// Strategy for comparing probe embeddings against a gallery of enrolled faces.
pub trait Matcher {
    /// One result per probe, order preserved from the detection list.
    fn match_probes(
        &self,
        gallery: &[GalleryEmbedding],
        probes: &[(Embedding, FaceBox)],
        threshold: f32,
    ) -> Vec<RecognitionResult>;
}

/// Cosine similarity matcher.
///
/// Gallery and probe vectors are unit-normalized at creation, so similarity
/// is a plain dot product. Ties resolve to the first entry in gallery order;
/// the store returns entries sorted by label, making the tie-break
/// lexicographic and stable across runs.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn match_probes(
        &self,
        gallery: &[GalleryEmbedding],
        probes: &[(Embedding, FaceBox)],
        threshold: f32,
    ) -> Vec<RecognitionResult> {
        if gallery.is_empty() {
            // No gallery at all: every face is unknown with zero confidence,
            // distinguishable from "close but below threshold".
            return probes
                .iter()
                .map(|(_, bbox)| RecognitionResult {
                    label: UNKNOWN_LABEL.to_string(),
                    bounding_box: *bbox,
                    confidence: 0.0,
                })
                .collect();
        }

        probes
            .iter()
            .map(|(probe, bbox)| {
                let mut best_sim = f32::NEG_INFINITY;
                let mut best_label: Option<&str> = None;

                for entry in gallery {
                    let sim = probe.dot(&entry.embedding);
                    // Strict > keeps the first (lexicographically smallest)
                    // label on ties.
                    if sim > best_sim {
                        best_sim = sim;
                        best_label = Some(&entry.label);
                    }
                }

                let label = match best_label {
                    Some(label) if best_sim > threshold => label.to_string(),
                    _ => UNKNOWN_LABEL.to_string(),
                };

                RecognitionResult {
                    label,
                    bounding_box: *bbox,
                    // Below-threshold results still carry the best observed
                    // score; clamp for the [0, 1] caller contract.
                    confidence: best_sim.clamp(0.0, 1.0),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> FaceBox {
        FaceBox { top: 0.0, right: 10.0, bottom: 10.0, left: 0.0 }
    }

    fn unit(values: Vec<f32>) -> Embedding {
        Embedding::from_raw(values, None)
    }

    fn entry(label: &str, values: Vec<f32>) -> GalleryEmbedding {
        GalleryEmbedding { label: label.to_string(), embedding: unit(values) }
    }

    #[test]
    fn test_empty_gallery_all_unknown_zero() {
        let probes = vec![(unit(vec![1.0, 0.0]), bbox()), (unit(vec![0.0, 1.0]), bbox())];
        let results = CosineMatcher.match_probes(&[], &probes, 0.2);
        assert_eq!(results.len(), 2);
        for r in &results {
            assert!(r.is_unknown());
            assert_eq!(r.confidence, 0.0);
        }
    }

    #[test]
    fn test_no_probes_no_results() {
        let gallery = vec![entry("a", vec![1.0, 0.0])];
        assert!(CosineMatcher.match_probes(&gallery, &[], 0.2).is_empty());
    }

    #[test]
    fn test_best_match_above_threshold() {
        let gallery = vec![
            entry("alice", vec![1.0, 0.0, 0.0]),
            entry("bob", vec![0.0, 1.0, 0.0]),
        ];
        let probes = vec![(unit(vec![0.9, 0.1, 0.0]), bbox())];
        let results = CosineMatcher.match_probes(&gallery, &probes, 0.2);
        assert_eq!(results[0].label, "alice");
        assert!(results[0].confidence > 0.9);
    }

    #[test]
    fn test_below_threshold_reports_best_score() {
        let gallery = vec![entry("alice", vec![1.0, 0.0])];
        let probe = unit(vec![0.1, 0.9949874]);
        let sim = probe.dot(&gallery[0].embedding);
        assert!(sim > 0.0 && sim < 0.2, "setup: sim = {sim}");

        let results = CosineMatcher.match_probes(&gallery, &[(probe, bbox())], 0.2);
        assert!(results[0].is_unknown());
        assert!((results[0].confidence - sim).abs() < 1e-6);
        assert!(results[0].confidence > 0.0);
    }

    #[test]
    fn test_negative_similarity_clamped_to_zero() {
        let gallery = vec![entry("alice", vec![1.0, 0.0])];
        let probes = vec![(unit(vec![-1.0, 0.0]), bbox())];
        let results = CosineMatcher.match_probes(&gallery, &probes, 0.2);
        assert!(results[0].is_unknown());
        assert_eq!(results[0].confidence, 0.0);
    }

    #[test]
    fn test_exactly_threshold_is_unknown() {
        // The contract is strict: score must exceed the threshold.
        let gallery = vec![entry("alice", vec![1.0, 0.0])];
        let probes = vec![(unit(vec![1.0, 0.0]), bbox())];
        let results = CosineMatcher.match_probes(&gallery, &probes, 1.0);
        assert!(results[0].is_unknown());
    }

    #[test]
    fn test_tie_resolves_to_first_entry() {
        // Two identical embeddings under different labels; gallery arrives
        // label-sorted from the store, so "alpha" wins.
        let gallery = vec![
            entry("alpha", vec![1.0, 0.0]),
            entry("beta", vec![1.0, 0.0]),
        ];
        let probes = vec![(unit(vec![1.0, 0.0]), bbox())];
        let results = CosineMatcher.match_probes(&gallery, &probes, 0.2);
        assert_eq!(results[0].label, "alpha");
    }

    #[test]
    fn test_result_order_matches_probe_order() {
        let gallery = vec![
            entry("left", vec![1.0, 0.0]),
            entry("right", vec![0.0, 1.0]),
        ];
        let b1 = FaceBox { top: 0.0, right: 50.0, bottom: 50.0, left: 0.0 };
        let b2 = FaceBox { top: 0.0, right: 150.0, bottom: 50.0, left: 100.0 };
        let probes = vec![
            (unit(vec![0.0, 1.0]), b1),
            (unit(vec![1.0, 0.0]), b2),
        ];
        let results = CosineMatcher.match_probes(&gallery, &probes, 0.2);
        assert_eq!(results[0].label, "right");
        assert_eq!(results[0].bounding_box, b1);
        assert_eq!(results[1].label, "left");
        assert_eq!(results[1].bounding_box, b2);
    }

    #[test]
    fn test_single_entry_gallery() {
        let gallery = vec![entry("only", vec![0.0, 1.0])];
        let probes = vec![(unit(vec![0.0, 1.0]), bbox())];
        let results = CosineMatcher.match_probes(&gallery, &probes, 0.2);
        assert_eq!(results[0].label, "only");
        assert!((results[0].confidence - 1.0).abs() < 1e-6);
    }
}
