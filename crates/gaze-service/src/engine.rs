//! Inference engine thread.
//!
//! ONNX sessions want `&mut` and model work blocks, so one dedicated OS
//! thread owns the analyzer and serves requests over a bounded channel.
//! Request handlers never touch a session; one slow analysis cannot stall
//! the async acceptance path.

use gaze_core::pipeline::{AnalyzerError, FaceAnalyzer};
use gaze_core::FaceObservation;
use image::RgbImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    Analyze {
        image: RgbImage,
        reply: oneshot::Sender<Result<Vec<FaceObservation>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Detect every face in a decoded image and extract its embedding.
    /// Observations come back in detection order.
    pub async fn analyze(&self, image: RgbImage) -> Result<Vec<FaceObservation>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze { image, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The analyzer (and the model sessions inside it) moves onto the thread
/// and is never shared. The thread exits when the last handle drops.
pub fn spawn_engine<A: FaceAnalyzer + 'static>(mut analyzer: A) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("gaze-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { image, reply } => {
                        let result = analyzer.analyze(&image).map_err(EngineError::from);
                        // A dropped receiver means the caller gave up (e.g.
                        // deadline expiry); nothing to do with the result.
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaze_core::types::{Embedding, FaceBox};
    use image::Rgb;

    struct CountingAnalyzer;

    impl FaceAnalyzer for CountingAnalyzer {
        fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceObservation>, AnalyzerError> {
            let n = (image.width() / 100) as usize;
            Ok((0..n)
                .map(|i| FaceObservation {
                    embedding: Embedding::from_raw(vec![1.0, 0.0], None),
                    bbox: FaceBox {
                        top: 0.0,
                        right: (i as f32 + 1.0) * 100.0,
                        bottom: 50.0,
                        left: i as f32 * 100.0,
                    },
                    confidence: 0.9,
                    crop: RgbImage::from_pixel(32, 32, Rgb([0, 0, 0])),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_analyze_roundtrip() {
        let engine = spawn_engine(CountingAnalyzer);
        let faces = engine
            .analyze(RgbImage::from_pixel(250, 100, Rgb([0, 0, 0])))
            .await
            .unwrap();
        assert_eq!(faces.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_all_answered() {
        let engine = spawn_engine(CountingAnalyzer);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .analyze(RgbImage::from_pixel(120, 100, Rgb([0, 0, 0])))
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap().len(), 1);
        }
    }
}
